// 流播放 API

use crate::server::AppState;
use crate::stream::{error_response, proxy_remote_stream, serve_local_file};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use tracing::error;

/// GET /api/v1/stream/:file_id
/// 流式播放：有本地文件引用走直读，有解析直链走代理，否则不可播放
pub async fn stream_file(
    State(app_state): State<AppState>,
    Path(file_id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let file = match app_state.catalog.get_file(file_id) {
        Ok(Some(file)) => file,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "file_not_found"),
        Err(e) => {
            error!("读取文件记录失败: file_id={}, {:?}", file_id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error");
        }
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());

    if let Some(local_path) = file.local_path.as_deref() {
        return serve_local_file(local_path, file.mime_type.as_deref(), range).await;
    }

    if let Some(stream_url) = file.stream_url.as_deref() {
        return proxy_remote_stream(&app_state.stream_client, stream_url, range, user_agent).await;
    }

    error_response(StatusCode::BAD_REQUEST, "not_streamable")
}
