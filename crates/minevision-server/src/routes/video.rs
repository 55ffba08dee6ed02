//! 视频流相关路由

use crate::error::{AppError, AppResult};
use crate::response::success_response;
use crate::state::AppState;
use async_stream::stream;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use bytes::Bytes;
use minevision_core::EnhanceParamsUpdate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// 尚无帧可推时使用的黑色占位帧几何
const PLACEHOLDER_WIDTH: u32 = 960;
const PLACEHOLDER_HEIGHT: u32 = 540;
const RATE_LIMIT_NAP: Duration = Duration::from_millis(5);
const PLACEHOLDER_NAP: Duration = Duration::from_millis(20);

fn default_camera_id() -> String {
    "camera-1".to_string()
}

fn default_stream_kind() -> String {
    "enhanced".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CameraQuery {
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
}

#[derive(Debug, Deserialize)]
pub struct FrameQuery {
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    #[serde(rename = "type", default = "default_stream_kind")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct TuningQuery {
    #[serde(default = "default_camera_id")]
    pub camera_id: String,
    pub lut_strength: Option<f64>,
    pub gamma: Option<f64>,
    pub clahe_clip_limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateParamsQuery {
    pub camera_id: Option<String>,
    pub lut_strength: Option<f64>,
    pub gamma: Option<f64>,
    pub clahe_clip_limit: Option<f64>,
}

fn tuning_update(
    lut_strength: Option<f64>,
    gamma: Option<f64>,
    clahe_clip_limit: Option<f64>,
) -> EnhanceParamsUpdate {
    EnhanceParamsUpdate {
        lut_strength,
        gamma,
        clahe_clip_limit,
        ..Default::default()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// 返回摄像头元数据与原始/增强 MJPEG 流地址
pub async fn get_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CameraQuery>,
) -> AppResult<Json<Value>> {
    let record = state
        .cameras
        .iter()
        .find(|c| c.info.camera_id == query.camera_id)
        .ok_or_else(|| AppError::not_found(format!("摄像头 {} 未注册", query.camera_id)))?;

    // 从请求 Host 推导对外地址，支持内网部署
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:8000");
    let base_url = format!("http://{}", host);

    Ok(success_response(
        json!({
            "camera_id": record.info.camera_id,
            "camera_name": record
                .info
                .name
                .clone()
                .unwrap_or_else(|| format!("摄像头 {}", record.info.camera_id)),
            "camera_location": record
                .info
                .location
                .clone()
                .unwrap_or_else(|| "未知位置".to_string()),
            "original_stream_url": format!(
                "{}/api/video/frame?camera_id={}&type=raw",
                base_url, record.info.camera_id
            ),
            "enhanced_stream_url": format!(
                "{}/api/video/frame?camera_id={}&type=enhanced",
                base_url, record.info.camera_id
            ),
        }),
        "获取视频流地址成功",
    ))
}

/// MJPEG 推流端点
///
/// 每个客户端一个独立的推流循环：自行限速，读自己的缓存快照，慢客户端
/// 不会拖累其他客户端。摄像头注册但离线时持续推送黑色占位帧；摄像头被
/// 注销后结束推流。
pub async fn get_frame(
    State(state): State<AppState>,
    Query(query): Query<FrameQuery>,
) -> AppResult<Response> {
    if state.manager.get_processor(&query.camera_id).is_none() {
        return Err(AppError::not_found(format!(
            "摄像头 {} 未注册",
            query.camera_id
        )));
    }

    info!("客户端接入 MJPEG 流: {} ({})", query.camera_id, query.kind);

    let manager = Arc::clone(&state.manager);
    let camera_id = query.camera_id;
    let kind = query.kind;
    let fps_limit = state.stream.fps_limit;
    let frame_interval = if fps_limit > 0 {
        Duration::from_secs_f64(1.0 / f64::from(fps_limit))
    } else {
        Duration::ZERO
    };

    let body_stream = stream! {
        let mut last_emit: Option<Instant> = None;
        loop {
            // 注销后结束推流
            if manager.get_processor(&camera_id).is_none() {
                break;
            }

            let now = Instant::now();
            if let Some(last) = last_emit {
                if !frame_interval.is_zero() && now.duration_since(last) < frame_interval {
                    tokio::time::sleep(RATE_LIMIT_NAP).await;
                    continue;
                }
            }

            let frame = if kind == "raw" {
                manager.get_original_frame(&camera_id)
            } else {
                manager.get_enhanced_frame(&camera_id)
            };

            let Some(frame) = frame else {
                match video_enhance::black_jpeg(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT) {
                    Ok(jpeg) => yield Ok::<_, Infallible>(mjpeg_part(&jpeg)),
                    Err(e) => warn!("[{}] 占位帧编码失败: {}", camera_id, e),
                }
                tokio::time::sleep(PLACEHOLDER_NAP).await;
                continue;
            };

            let jpeg = match video_enhance::encode_jpeg(&frame.data, frame.width, frame.height) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    warn!("[{}] JPEG 编码失败: {}", camera_id, e);
                    continue;
                }
            };

            last_emit = Some(now);
            yield Ok(mjpeg_part(&jpeg));
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            "multipart/x-mixed-replace; boundary=frame",
        )
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .header(header::EXPIRES, "0")
        .header(header::CONNECTION, "close")
        .body(Body::from_stream(body_stream))
        .map_err(|e| AppError::internal(e.to_string()))
}

/// 拼装一段 multipart 帧：边界、头部、负载、结尾 CRLF
fn mjpeg_part(jpeg: &[u8]) -> Bytes {
    let mut chunk = Vec::with_capacity(jpeg.len() + 96);
    chunk.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n");
    chunk.extend_from_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

/// 查询视频增强状态
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<CameraQuery>,
) -> AppResult<Json<Value>> {
    let is_running = state.manager.is_running(&query.camera_id);
    let fps = state.manager.get_fps(&query.camera_id);
    let params = if is_running {
        Some(state.manager.get_params())
    } else {
        None
    };

    Ok(success_response(
        json!({
            "is_running": is_running,
            "camera_id": query.camera_id,
            "fps": round2(fps),
            "params": params,
        }),
        "获取增强状态成功",
    ))
}

/// 兼容接口：增强始终开启，start 仅做参数热更新
pub async fn start_enhancement(
    State(state): State<AppState>,
    Query(query): Query<TuningQuery>,
) -> AppResult<Json<Value>> {
    let update = tuning_update(query.lut_strength, query.gamma, query.clahe_clip_limit);
    if !update.is_empty() {
        state.manager.update_enhance_params(None, &update);
    }

    if state.manager.get_processor(&query.camera_id).is_none() {
        return Err(AppError::not_found(format!(
            "摄像头 {} 未注册",
            query.camera_id
        )));
    }

    Ok(success_response(
        json!({
            "is_running": true,
            "camera_id": query.camera_id,
            "fps": round2(state.manager.get_fps(&query.camera_id)),
        }),
        "视频增强默认已开启，start 接口仅用于兼容与参数更新",
    ))
}

/// 兼容接口：增强始终开启，stop 不会真正停止解码
pub async fn stop_enhancement(
    State(state): State<AppState>,
    Query(query): Query<CameraQuery>,
) -> AppResult<Json<Value>> {
    if state.manager.get_processor(&query.camera_id).is_none() {
        return Err(AppError::not_found(format!(
            "摄像头 {} 未注册",
            query.camera_id
        )));
    }

    Ok(success_response(
        json!({
            "is_running": true,
            "camera_id": query.camera_id,
            "fps": round2(state.manager.get_fps(&query.camera_id)),
        }),
        "视频增强始终开启，stop 接口仅返回兼容状态",
    ))
}

/// 实时更新增强参数；camera_id 为空时作用于所有摄像头
pub async fn update_params(
    State(state): State<AppState>,
    Query(query): Query<UpdateParamsQuery>,
) -> AppResult<Json<Value>> {
    let update = tuning_update(query.lut_strength, query.gamma, query.clahe_clip_limit);
    let params = state
        .manager
        .update_enhance_params(query.camera_id.as_deref(), &update);

    Ok(success_response(
        json!({
            "camera_id": query.camera_id.unwrap_or_else(|| "all".to_string()),
            "params": params,
        }),
        "参数更新成功",
    ))
}

/// 查询指定摄像头的 FPS
pub async fn get_camera_fps(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> AppResult<Json<Value>> {
    let fps = state.manager.get_fps(&camera_id);
    Ok(success_response(
        json!({"camera_id": camera_id, "fps": round2(fps)}),
        "获取 FPS 成功",
    ))
}

/// 路由连通性测试
pub async fn test_route() -> Json<Value> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    success_response(json!({"timestamp": timestamp}), "Video router is working!")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mjpeg_part_framing() {
        let part = mjpeg_part(b"JPEGDATA");
        let text = String::from_utf8_lossy(&part);
        assert!(text.starts_with("--frame\r\nContent-Type: image/jpeg\r\n"));
        assert!(text.contains("Content-Length: 8\r\n\r\n"));
        assert!(text.ends_with("JPEGDATA\r\n"));
    }

    #[test]
    fn test_query_defaults() {
        let query: FrameQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.camera_id, "camera-1");
        assert_eq!(query.kind, "enhanced");

        let query: FrameQuery = serde_json::from_str(r#"{"type": "raw"}"#).unwrap();
        assert_eq!(query.kind, "raw");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(0.0), 0.0);
    }

    #[test]
    fn test_tuning_update_carries_only_given_fields() {
        let update = tuning_update(None, Some(0.5), None);
        assert!(!update.is_empty());
        assert_eq!(update.gamma, Some(0.5));
        assert!(update.lut_strength.is_none());
        assert!(update.clahe_tile_grid_size.is_none());
    }
}
