//! Frame enhancement library for MineVision
//!
//! This library provides the per-frame enhancement chain (LUT, gamma, CLAHE,
//! sharpen), the process-wide enhancement parameter store, and the JPEG
//! encoding helpers used by the MJPEG delivery path.

pub mod error;
pub mod jpeg;
pub mod lut;
pub mod params;
pub mod pipeline;

pub use error::{EnhanceError, EnhanceResult};
pub use jpeg::{black_jpeg, encode_jpeg};
pub use lut::ColorLut;
pub use params::{EnhanceParams, EnhanceParamsUpdate, ParamStore};
pub use pipeline::FrameEnhancer;
