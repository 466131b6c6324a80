// 文件级 API（播放进度）

use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::error;

use super::ApiResponse;

/// 播放进度上报
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    /// 播放位置（秒）
    pub position: f64,
    /// 进度百分比
    pub progress: f64,
}

/// POST /api/v1/files/:file_id/progress
/// 记录播放位置，续播用
pub async fn update_progress(
    State(app_state): State<AppState>,
    Path(file_id): Path<i64>,
    Json(req): Json<ProgressRequest>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    match app_state
        .catalog
        .update_watch_progress(file_id, req.position, req.progress)
    {
        Ok(true) => Ok(Json(ApiResponse::success("Progress saved".to_string()))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("更新播放进度失败: file_id={}, {:?}", file_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
