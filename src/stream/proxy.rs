// 流式投递
//
// 本地文件直读与远端直链代理两条路径，均支持 HTTP Range。
// 远端路径逐块透传，不在内存中缓冲整个响应体。

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::io::SeekFrom;
use tokio::io::{AsyncSeekExt, AsyncReadExt};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use crate::stream::range::parse_range;

/// 本地流默认 Content-Type（目录行缺少 mime 时的兜底）
const DEFAULT_LOCAL_MIME: &str = "video/mp4";

/// 向客户端镜像的上游响应头
const MIRRORED_HEADERS: [&str; 4] = [
    "content-type",
    "content-length",
    "content-range",
    "accept-ranges",
];

/// 统一的 JSON 错误响应
pub fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

/// 投递本地文件，支持单个 Range 请求
///
/// 带合法 Range 时返回 206 与 Content-Range/Content-Length/Accept-Ranges；
/// 无 Range（或 Range 非法）时返回完整 200
pub async fn serve_local_file(
    path: &str,
    mime_type: Option<&str>,
    range_header: Option<&str>,
) -> Response {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("本地文件不存在或不可读: {}, 错误: {}", path, e);
            return error_response(StatusCode::NOT_FOUND, "local_file_not_found");
        }
    };

    let file_size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            error!("读取本地文件元数据失败: {}, 错误: {}", path, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "local_file_unreadable");
        }
    };

    let mime = mime_type.unwrap_or(DEFAULT_LOCAL_MIME).to_string();

    match range_header.and_then(|h| parse_range(h, file_size)) {
        Some(range) => {
            let mut file = file;
            if let Err(e) = file.seek(SeekFrom::Start(range.start)).await {
                error!("本地文件 seek 失败: {}, 错误: {}", path, e);
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "local_file_unreadable");
            }

            let stream = ReaderStream::new(file.take(range.length()));
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, mime),
                    (header::CONTENT_LENGTH, range.length().to_string()),
                    (header::CONTENT_RANGE, range.content_range(file_size)),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                Body::from_stream(stream),
            )
                .into_response()
        }
        None => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime),
                (header::CONTENT_LENGTH, file_size.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response(),
    }
}

/// 代理远端直链
///
/// 转发客户端的 Range 与 User-Agent，镜像上游状态与四个关键响应头，
/// 响应体流式透传。上游 403 意味着直链过期，映射为 410 让客户端触发
/// 重新解析而不是当成一般失败
pub async fn proxy_remote_stream(
    client: &reqwest::Client,
    remote_url: &str,
    range_header: Option<&str>,
    user_agent: Option<&str>,
) -> Response {
    let mut request = client.get(remote_url);
    if let Some(range) = range_header {
        request = request.header("Range", range);
    }
    if let Some(ua) = user_agent {
        request = request.header("User-Agent", ua);
    }

    let upstream = match request.send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("远端代理请求失败: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal_proxy_error");
        }
    };

    let upstream_status = upstream.status();

    if upstream_status == reqwest::StatusCode::FORBIDDEN {
        info!("上游返回 403，直链已过期");
        return error_response(StatusCode::GONE, "remote_link_expired");
    }
    if !upstream_status.is_success() {
        warn!("上游返回非 2xx: {}", upstream_status);
        let status = StatusCode::from_u16(upstream_status.as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return error_response(status, "remote_stream_failed");
    }

    // reqwest 与 axum 的 http 版本不同，响应头按字节转换；
    // bytes_stream 会消耗响应，先取头再取流
    let mut mirrored: Vec<(HeaderName, HeaderValue)> = Vec::new();
    for name in MIRRORED_HEADERS {
        if let Some(value) = upstream.headers().get(name) {
            if let (Ok(header_name), Ok(header_value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                mirrored.push((header_name, header_value));
            }
        }
    }

    let mut response = Body::from_stream(upstream.bytes_stream()).into_response();
    *response.status_mut() =
        StatusCode::from_u16(upstream_status.as_u16()).unwrap_or(StatusCode::OK);
    for (name, value) in mirrored {
        response.headers_mut().insert(name, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::io::Write;

    fn temp_media(size: usize) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movie.mp4");
        let bytes: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::File::create(&path)
            .unwrap()
            .write_all(&bytes)
            .unwrap();
        (dir, path.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_local_range_request() {
        let (_dir, path) = temp_media(1000);

        let response = serve_local_file(&path, None, Some("bytes=100-199")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);

        let headers = response.headers().clone();
        assert_eq!(
            headers.get(header::CONTENT_RANGE).unwrap(),
            "bytes 100-199/1000"
        );
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "100");
        assert_eq!(headers.get(header::ACCEPT_RANGES).unwrap(), "bytes");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 100);
        assert_eq!(body[0], (100 % 251) as u8);
    }

    #[tokio::test]
    async fn test_local_full_request() {
        let (_dir, path) = temp_media(1000);

        let response = serve_local_file(&path, Some("video/x-matroska"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "1000"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/x-matroska"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), 1000);
    }

    #[tokio::test]
    async fn test_local_open_ended_range() {
        let (_dir, path) = temp_media(1000);

        let response = serve_local_file(&path, None, Some("bytes=900-")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 900-999/1000"
        );
    }

    #[tokio::test]
    async fn test_local_invalid_range_falls_back_to_full() {
        let (_dir, path) = temp_media(100);

        let response = serve_local_file(&path, None, Some("bytes=broken")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "100"
        );
    }

    #[tokio::test]
    async fn test_local_missing_file() {
        let response = serve_local_file("/no/such/file.mp4", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "local_file_not_found");
    }

    /// 本地起一个上游假服务，验证代理路径的状态映射与头镜像
    async fn spawn_upstream() -> String {
        use axum::routing::get;
        use axum::Router;

        let app = Router::new()
            .route(
                "/expired",
                get(|| async { (StatusCode::FORBIDDEN, "account required") }),
            )
            .route(
                "/teapot",
                get(|| async { (StatusCode::IM_A_TEAPOT, "nope") }),
            )
            .route(
                "/clip",
                get(|| async {
                    (
                        StatusCode::PARTIAL_CONTENT,
                        [
                            (header::CONTENT_TYPE, "video/mp4".to_string()),
                            (header::CONTENT_RANGE, "bytes 0-9/100".to_string()),
                            (header::ACCEPT_RANGES, "bytes".to_string()),
                        ],
                        "0123456789",
                    )
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_upstream_403_maps_to_410_expired() {
        let base = spawn_upstream().await;
        let client = reqwest::Client::new();

        let response =
            proxy_remote_stream(&client, &format!("{}/expired", base), None, None).await;
        assert_eq!(response.status(), StatusCode::GONE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "remote_link_expired");
    }

    #[tokio::test]
    async fn test_upstream_other_errors_pass_through() {
        let base = spawn_upstream().await;
        let client = reqwest::Client::new();

        let response = proxy_remote_stream(&client, &format!("{}/teapot", base), None, None).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "remote_stream_failed");
    }

    #[tokio::test]
    async fn test_proxy_mirrors_status_headers_and_body() {
        let base = spawn_upstream().await;
        let client = reqwest::Client::new();

        let response = proxy_remote_stream(
            &client,
            &format!("{}/clip", base),
            Some("bytes=0-9"),
            Some("TestPlayer/1.0"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes 0-9/100"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "video/mp4"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"0123456789");
    }
}
