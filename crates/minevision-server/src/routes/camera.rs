//! 摄像头列表与状态路由

use crate::error::{AppError, AppResult};
use crate::response::success_response;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use minevision_core::CameraRecord;
use serde_json::{json, Value};

fn record_with_status(state: &AppState, record: &CameraRecord) -> AppResult<Value> {
    let mut value = serde_json::to_value(record)?;
    let status = if state.manager.is_running(&record.info.camera_id) {
        "online"
    } else {
        "offline"
    };
    value["status"] = json!(status);
    Ok(value)
}

/// 获取所有摄像头及其在线状态
pub async fn list_cameras(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let mut results = Vec::with_capacity(state.cameras.len());
    for record in state.cameras.iter() {
        results.push(record_with_status(&state, record)?);
    }

    Ok(success_response(results, "获取摄像头列表成功"))
}

/// 查询单个摄像头的在线状态
pub async fn camera_status(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> AppResult<Json<Value>> {
    let record = state
        .cameras
        .iter()
        .find(|c| c.info.camera_id == camera_id)
        .ok_or_else(|| AppError::not_found(format!("摄像头 {} 未注册", camera_id)))?;

    let value = record_with_status(&state, record)?;
    Ok(success_response(
        value,
        &format!("摄像头 {} 状态获取成功", camera_id),
    ))
}
