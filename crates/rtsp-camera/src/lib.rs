//! RTSP camera ingestion library for MineVision
//!
//! This library provides the pieces between an RTSP url and raw BGR frames:
//! a reachability probe that rejects placeholder and dead endpoints before
//! any process is spawned, and a supervisor for the external FFmpeg decoder
//! (spawn, stderr drain, graceful terminate, restart).

pub mod config;
pub mod decoder;
pub mod error;
pub mod probe;

pub use config::StreamConfig;
pub use decoder::{build_decoder_args, read_frame_exact, DecoderSupervisor};
pub use error::{StreamError, StreamResult};
pub use probe::{is_placeholder_url, parse_host_port, probe_rtsp_reachable};
