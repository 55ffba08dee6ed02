//! 各路由共享的应用状态

use minevision_core::{CameraRecord, StreamManager, StreamSettings};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// 全局视频流管理器
    pub manager: Arc<StreamManager>,
    /// 启动时读取的摄像头注册表（只读）
    pub cameras: Arc<Vec<CameraRecord>>,
    /// 视频流配置
    pub stream: StreamSettings,
}
