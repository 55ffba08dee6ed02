//! HTTP 路由

pub mod camera;
pub mod enhance;
pub mod video;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/video/stream", get(video::get_stream))
        .route("/api/video/frame", get(video::get_frame))
        .route("/api/video/status", get(video::get_status))
        .route("/api/video/start", post(video::start_enhancement))
        .route("/api/video/stop", post(video::stop_enhancement))
        .route("/api/video/update_params", post(video::update_params))
        .route("/api/video/fps/:camera_id", get(video::get_camera_fps))
        .route("/api/video/test", get(video::test_route))
        .route("/api/cameras", get(camera::list_cameras))
        .route("/api/cameras/:camera_id/status", get(camera::camera_status))
        .route("/api/update_enhance_params", post(enhance::update_params))
        .route("/api/enhance_params", get(enhance::get_params))
        .route("/api/reset_enhance_params", post(enhance::reset_params))
        .with_state(state)
}
