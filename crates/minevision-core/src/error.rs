//! 基础错误处理

use thiserror::Error;

/// MineVision错误类型
#[derive(Error, Debug)]
pub enum MineVisionError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("相机错误: {0}")]
    Camera(String),

    #[error("视频处理错误: {0}")]
    VideoProcessing(String),
}

impl From<rtsp_camera::StreamError> for MineVisionError {
    fn from(err: rtsp_camera::StreamError) -> Self {
        MineVisionError::Camera(err.to_string())
    }
}

impl From<video_enhance::EnhanceError> for MineVisionError {
    fn from(err: video_enhance::EnhanceError) -> Self {
        MineVisionError::VideoProcessing(err.to_string())
    }
}

/// MineVision结果类型
pub type Result<T> = std::result::Result<T, MineVisionError>;
