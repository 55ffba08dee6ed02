//! 增强参数路由

use crate::response::success_response;
use crate::state::AppState;
use axum::{extract::State, Json};
use minevision_core::EnhanceParamsUpdate;
use serde_json::Value;

/// 更新全局增强参数（JSON 请求体，字段全部可选）
pub async fn update_params(
    State(state): State<AppState>,
    Json(update): Json<EnhanceParamsUpdate>,
) -> Json<Value> {
    let params = state.manager.update_enhance_params(None, &update);
    success_response(params, "增强参数更新成功")
}

/// 读取当前增强参数
pub async fn get_params(State(state): State<AppState>) -> Json<Value> {
    success_response(state.manager.get_params(), "获取增强参数成功")
}

/// 重置增强参数为默认值
pub async fn reset_params(State(state): State<AppState>) -> Json<Value> {
    success_response(state.manager.reset_params(), "增强参数已重置为默认值")
}
