//! MineVision Core - 多路视频流引擎
//!
//! 提供摄像头注册表配置、统一日志、单路视频流处理器（解码 + 增强 +
//! 帧缓存）与全局流管理器。

pub mod config;
pub mod error;
pub mod logger;
pub mod manager;
pub mod processor;
pub mod types;

// Re-export core types
pub use config::{
    load_camera_info, load_camera_records, load_rtsp_map, placeholder_rtsp_url, AppConfig,
    CameraInfo, CameraRecord, RegistryConfig, ServerConfig, StreamSettings,
};
pub use error::{MineVisionError, Result};
pub use logger::{init_logging, LogLevel, LogRotation, LoggerConfig};
pub use manager::StreamManager;
pub use processor::StreamProcessor;
pub use types::Frame;

// 参数类型统一从核心层转出，便于服务端引用
pub use video_enhance::{EnhanceParams, EnhanceParamsUpdate, ParamStore};
