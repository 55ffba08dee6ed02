//! 视频流管理器
//!
//! camera_id → StreamProcessor 的注册表：注册、查询、参数广播与
//! 生命周期管理。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rtsp_camera::StreamConfig;
use tracing::{info, warn};
use video_enhance::{EnhanceParams, EnhanceParamsUpdate, ParamStore};

use crate::processor::StreamProcessor;
use crate::types::Frame;

/// 视频流管理器
pub struct StreamManager {
    processors: Mutex<HashMap<String, Arc<StreamProcessor>>>,
    config: StreamConfig,
    params: Arc<ParamStore>,
}

impl StreamManager {
    pub fn new(config: StreamConfig) -> Self {
        info!("视频流管理器初始化完成");
        Self {
            processors: Mutex::new(HashMap::new()),
            config,
            params: Arc::new(ParamStore::new()),
        }
    }

    /// 共享参数存储句柄
    pub fn params(&self) -> Arc<ParamStore> {
        Arc::clone(&self.params)
    }

    /// 注册摄像头并启动其处理器
    ///
    /// 幂等：已存在的 camera_id 仅产生一条告警，不会重建处理器。
    /// 注册是同步的，但除探测外不等待解码器就绪。
    pub fn register_camera(
        &self,
        camera_id: &str,
        rtsp_url: &str,
        lut_path: Option<PathBuf>,
        name: Option<&str>,
        location: Option<&str>,
    ) {
        let mut processors = self.processors.lock().unwrap();
        if processors.contains_key(camera_id) {
            warn!("摄像头 {} 已存在，跳过注册", camera_id);
            return;
        }

        let processor = StreamProcessor::start(
            camera_id,
            rtsp_url,
            lut_path,
            self.config.clone(),
            Arc::clone(&self.params),
        );
        processors.insert(camera_id.to_string(), processor);
        info!(
            "摄像头 {} 注册成功（{} / {}）",
            camera_id,
            name.unwrap_or("未命名"),
            location.unwrap_or("未知位置")
        );
    }

    pub fn get_processor(&self, camera_id: &str) -> Option<Arc<StreamProcessor>> {
        self.processors.lock().unwrap().get(camera_id).cloned()
    }

    pub fn contains(&self, camera_id: &str) -> bool {
        self.processors.lock().unwrap().contains_key(camera_id)
    }

    pub fn camera_ids(&self) -> Vec<String> {
        self.processors.lock().unwrap().keys().cloned().collect()
    }

    /// 原始帧快照；摄像头不存在或尚无帧时返回 None
    pub fn get_original_frame(&self, camera_id: &str) -> Option<Frame> {
        self.get_processor(camera_id)?.original_frame()
    }

    /// 增强帧快照；摄像头不存在或尚无帧时返回 None
    pub fn get_enhanced_frame(&self, camera_id: &str) -> Option<Frame> {
        self.get_processor(camera_id)?.enhanced_frame()
    }

    pub fn is_running(&self, camera_id: &str) -> bool {
        self.get_processor(camera_id)
            .map_or(false, |p| p.is_running())
    }

    pub fn get_fps(&self, camera_id: &str) -> f64 {
        self.get_processor(camera_id).map_or(0.0, |p| p.fps())
    }

    pub fn get_params(&self) -> EnhanceParams {
        self.params.get()
    }

    pub fn reset_params(&self) -> EnhanceParams {
        self.params.reset()
    }

    /// 更新增强参数
    ///
    /// 先写入全局存储，再转发处理器钩子；camera_id 为空时广播到所有
    /// 处理器。当前钩子统一落到全局存储，两条路径语义等价。
    pub fn update_enhance_params(
        &self,
        camera_id: Option<&str>,
        update: &EnhanceParamsUpdate,
    ) -> EnhanceParams {
        let snapshot = self.params.update(update);

        match camera_id {
            Some(id) => {
                if let Some(processor) = self.get_processor(id) {
                    processor.update_params(update);
                }
            }
            None => {
                let processors: Vec<_> =
                    self.processors.lock().unwrap().values().cloned().collect();
                for processor in processors {
                    processor.update_params(update);
                }
            }
        }

        snapshot
    }

    /// 停止并移除指定摄像头；返回是否存在
    pub fn stop_processor(&self, camera_id: &str) -> bool {
        let removed = self.processors.lock().unwrap().remove(camera_id);
        match removed {
            Some(processor) => {
                processor.stop();
                info!("摄像头 {} 已停止", camera_id);
                true
            }
            None => false,
        }
    }

    /// 停止所有摄像头并清空注册表
    ///
    /// 先整体摘下映射再逐个 stop，自行退出的处理器不会造成死锁。
    pub fn stop_all(&self) {
        let drained: Vec<_> = {
            let mut processors = self.processors.lock().unwrap();
            processors.drain().collect()
        };

        for (camera_id, processor) in drained {
            processor.stop();
            info!("摄像头 {} 已停止", camera_id);
        }
        info!("所有摄像头已停止");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> StreamManager {
        StreamManager::new(StreamConfig::default())
    }

    #[test]
    fn test_register_is_idempotent() {
        let manager = manager();
        manager.register_camera("camera-1", "rtsp://localhost:8554/camera-1", None, None, None);
        manager.register_camera("camera-1", "rtsp://localhost:8554/camera-1", None, None, None);

        assert_eq!(manager.camera_ids(), vec!["camera-1".to_string()]);
    }

    #[test]
    fn test_placeholder_camera_reports_offline() {
        let manager = manager();
        manager.register_camera("camera-1", "rtsp://localhost:8554/camera-1", None, None, None);

        assert!(!manager.is_running("camera-1"));
        assert!(manager.get_original_frame("camera-1").is_none());
        assert!(manager.get_enhanced_frame("camera-1").is_none());
        assert_eq!(manager.get_fps("camera-1"), 0.0);
    }

    #[test]
    fn test_missing_camera_defaults() {
        let manager = manager();
        assert!(manager.get_processor("nope").is_none());
        assert!(!manager.is_running("nope"));
        assert_eq!(manager.get_fps("nope"), 0.0);
        assert!(manager.get_original_frame("nope").is_none());
    }

    #[test]
    fn test_stop_processor_removes_entry() {
        let manager = manager();
        manager.register_camera("camera-1", "rtsp://localhost:8554/camera-1", None, None, None);

        assert!(manager.stop_processor("camera-1"));
        assert!(!manager.contains("camera-1"));
        assert!(!manager.stop_processor("camera-1"));
    }

    #[test]
    fn test_stop_all_clears_registry() {
        let manager = manager();
        for i in 1..=5 {
            let id = format!("camera-{}", i);
            manager.register_camera(&id, &format!("rtsp://localhost:8554/{}", id), None, None, None);
        }
        assert_eq!(manager.camera_ids().len(), 5);

        manager.stop_all();
        assert!(manager.camera_ids().is_empty());

        // 再次调用不会出错
        manager.stop_all();
    }

    #[test]
    fn test_param_update_scopes() {
        let manager = manager();
        manager.register_camera("camera-1", "rtsp://localhost:8554/camera-1", None, None, None);
        manager.register_camera("camera-2", "rtsp://localhost:8554/camera-2", None, None, None);

        let snapshot = manager.update_enhance_params(
            None,
            &EnhanceParamsUpdate {
                gamma: Some(0.5),
                ..Default::default()
            },
        );
        assert_eq!(snapshot.gamma, 0.5);
        assert_eq!(manager.get_params().gamma, 0.5);

        // 指定 camera_id 的更新同样落到共享存储
        manager.update_enhance_params(
            Some("camera-2"),
            &EnhanceParamsUpdate {
                clahe_clip_limit: Some(4.0),
                ..Default::default()
            },
        );
        assert_eq!(manager.get_params().clahe_clip_limit, 4.0);
        assert_eq!(manager.get_params().gamma, 0.5);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let manager = manager();
        manager.update_enhance_params(
            None,
            &EnhanceParamsUpdate {
                gamma: Some(2.0),
                ..Default::default()
            },
        );
        manager.reset_params();
        assert_eq!(manager.get_params(), EnhanceParams::default());
    }
}
