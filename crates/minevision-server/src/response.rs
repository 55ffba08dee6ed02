//! 统一成功响应封装

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// {success: true, data, message}
pub fn success_response<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data,
        "message": message,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let Json(value) = success_response(json!({"fps": 12.5}), "ok");
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["message"], json!("ok"));
        assert_eq!(value["data"]["fps"], json!(12.5));
    }
}
