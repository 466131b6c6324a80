// 设置 API

use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Map, Value};
use tracing::error;

use super::ApiResponse;

/// GET /api/v1/settings
/// 读取全部设置；值是 JSON 的按 JSON 返回，否则按字符串返回
pub async fn get_settings(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<Map<String, Value>>>, StatusCode> {
    let rows = app_state.catalog.all_settings().map_err(|e| {
        error!("读取设置失败: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut settings = Map::new();
    for (key, raw) in rows {
        let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        settings.insert(key, value);
    }

    Ok(Json(ApiResponse::success(settings)))
}

/// PUT /api/v1/settings
/// 批量写入设置（逐键覆盖）
pub async fn update_settings(
    State(app_state): State<AppState>,
    Json(settings): Json<Map<String, Value>>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    for (key, value) in &settings {
        let raw = value.to_string();
        if let Err(e) = app_state.catalog.set_setting(key, &raw) {
            error!("写入设置失败: key={}, {:?}", key, e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    Ok(Json(ApiResponse::success("Settings updated".to_string())))
}
