//! 配置管理
//!
//! 应用配置（TOML）与摄像头注册表（camera_info.json + rtsp.json）。
//! 注册表文件在启动时读取一次，缺失或损坏时回退为空列表而不是崩溃。

use crate::error::{MineVisionError, Result};
use rtsp_camera::StreamConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// 应用程序配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub stream: StreamSettings,
    pub registry: RegistryConfig,
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// 视频流配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// 帧宽度
    pub width: u32,
    /// 帧高度
    pub height: u32,
    /// 每个 MJPEG 客户端的推流帧率上限
    pub fps_limit: u32,
    /// 连续空读上限（超过后处理器自动关闭）
    pub max_empty_reads: u32,
    /// 解码器连续重启上限
    pub max_restart_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            fps_limit: 25,
            max_empty_reads: 150,
            max_restart_attempts: 3,
        }
    }
}

impl StreamSettings {
    /// 转换为单路处理器的流配置
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            width: self.width,
            height: self.height,
            max_empty_reads: self.max_empty_reads,
            max_restart_attempts: self.max_restart_attempts,
        }
    }
}

/// 摄像头注册表文件路径
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub camera_info_path: String,
    pub rtsp_path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            camera_info_path: "config/camera_info.json".to_string(),
            rtsp_path: "config/rtsp.json".to_string(),
        }
    }
}

impl AppConfig {
    /// 从TOML文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MineVisionError::Config(format!("读取配置文件失败: {}", e)))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| MineVisionError::Config(format!("解析配置文件失败: {}", e)))?;

        Ok(config)
    }

    /// 配置文件缺失或损坏时回退到默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}，使用默认配置", e);
                Self::default()
            }
        }
    }
}

/// 摄像头注册记录（来自 camera_info.json）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub camera_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub lut_path: Option<String>,
}

/// 摄像头记录 + RTSP 地址
#[derive(Debug, Clone, Serialize)]
pub struct CameraRecord {
    #[serde(flatten)]
    pub info: CameraInfo,
    pub rtsp_url: String,
}

/// 缺失 RTSP 配置时的占位地址（探测阶段会将其判定为不可达）
pub fn placeholder_rtsp_url(camera_id: &str) -> String {
    format!("rtsp://localhost:8554/{}", camera_id)
}

/// 读取摄像头信息列表；文件缺失或损坏时返回空列表
pub fn load_camera_info<P: AsRef<Path>>(path: P) -> Vec<CameraInfo> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("摄像头配置文件不可读 {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(cameras) => cameras,
        Err(e) => {
            warn!("摄像头配置文件解析失败 {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// 读取 camera_id → RTSP 地址映射；文件缺失或损坏时返回空映射
pub fn load_rtsp_map<P: AsRef<Path>>(path: P) -> HashMap<String, String> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("RTSP配置文件不可读 {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(map) => map,
        Err(e) => {
            warn!("RTSP配置文件解析失败 {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

/// 合并 camera_info.json 与 rtsp.json；缺失的 RTSP 地址回退为占位流
pub fn load_camera_records<P: AsRef<Path>, Q: AsRef<Path>>(
    info_path: P,
    rtsp_path: Q,
) -> Vec<CameraRecord> {
    let cameras = load_camera_info(info_path);
    let rtsp_map = load_rtsp_map(rtsp_path);

    cameras
        .into_iter()
        .map(|info| {
            let rtsp_url = rtsp_map
                .get(&info.camera_id)
                .cloned()
                .unwrap_or_else(|| placeholder_rtsp_url(&info.camera_id));
            CameraRecord { info, rtsp_url }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.stream.width, 960);
        assert_eq!(config.stream.height, 540);
        assert_eq!(config.stream.fps_limit, 25);
        assert_eq!(config.stream.max_empty_reads, 150);
        assert_eq!(config.stream.max_restart_attempts, 3);
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[server]\nport = 9000\n\n[stream]\nmax_empty_reads = 20\n")
            .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.stream.max_empty_reads, 20);
        assert_eq!(config.stream.width, 960);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = AppConfig::load_or_default("/nonexistent/minevision.toml");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_missing_registry_files_yield_empty_list() {
        let records = load_camera_records("/nonexistent/camera_info.json", "/nonexistent/rtsp.json");
        assert!(records.is_empty());
    }

    #[test]
    fn test_malformed_registry_yields_empty_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{bad json}").unwrap();

        assert!(load_camera_info(file.path()).is_empty());
        assert!(load_rtsp_map(file.path()).is_empty());
    }

    #[test]
    fn test_missing_rtsp_entry_falls_back_to_placeholder() {
        let mut info_file = tempfile::NamedTempFile::new().unwrap();
        info_file
            .write_all(
                br#"[
                    {"camera_id": "camera-1", "name": "东巷道", "location": "一号井"},
                    {"camera_id": "camera-2"}
                ]"#,
            )
            .unwrap();

        let mut rtsp_file = tempfile::NamedTempFile::new().unwrap();
        rtsp_file
            .write_all(br#"{"camera-2": "rtsp://10.0.0.5:554/live"}"#)
            .unwrap();

        let records = load_camera_records(info_file.path(), rtsp_file.path());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].rtsp_url, "rtsp://localhost:8554/camera-1");
        assert_eq!(records[0].info.name.as_deref(), Some("东巷道"));
        assert_eq!(records[1].rtsp_url, "rtsp://10.0.0.5:554/live");
        assert!(records[1].info.lut_path.is_none());
    }
}
