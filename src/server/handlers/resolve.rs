// 直链解析 API

use crate::catalog::CatalogStore;
use crate::resolver::{links_stale, AuthError, AuthResolver, QueueStatus, ResolveSummary};
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ApiResponse;

/// 解析响应
#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    /// 实际更新的文件行数
    pub updated: usize,
    /// 入队后的队列状态
    pub queue: QueueStatus,
}

/// 过期检查响应
#[derive(Debug, Serialize)]
pub struct StaleResponse {
    pub stale: bool,
    pub auth_fetched_at: Option<i64>,
}

/// POST /api/v1/resolve/:container_id
/// 将鉴权解析任务入队并等待其完成
///
/// 队列全局串行：同一时刻至多一个任务在请求上游，提交顺序即执行顺序
pub async fn resolve_container(
    State(app_state): State<AppState>,
    Path(container_id): Path<i64>,
) -> Result<Json<ApiResponse<ResolveResponse>>, StatusCode> {
    let container = match app_state.catalog.get_container(container_id) {
        Ok(Some(container)) if container.container_type == "terabox" => container,
        Ok(_) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("读取容器失败: {:?}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let source = match container.source {
        Some(source) if !source.is_empty() => source,
        _ => return Err(StatusCode::BAD_REQUEST),
    };

    if let Err(e) = app_state.catalog.mark_resolving(container_id) {
        error!("标记解析中失败: {:?}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let catalog = Arc::clone(&app_state.catalog);
    let resolver = Arc::clone(&app_state.auth_resolver);

    let handle = app_state.resolver_queue.enqueue(async move {
        let outcome = apply_resolution(&catalog, &resolver, container_id, &source).await;
        if let Err(ref e) = outcome {
            // 失败写到容器状态上再向调用方传播
            if let Err(me) = catalog.mark_error(container_id, &e.to_string()) {
                warn!("写入容器错误状态失败: {:?}", me);
            }
        }
        outcome
    });

    match handle.wait().await {
        Ok(summary) => Ok(Json(ApiResponse::success(ResolveResponse {
            updated: summary.updated,
            queue: app_state.resolver_queue.status(),
        }))),
        Err(e) => {
            error!("解析任务失败: container_id={}, {}", container_id, e);
            if matches!(e.downcast_ref::<AuthError>(), Some(AuthError::NotConfigured)) {
                Err(StatusCode::BAD_REQUEST)
            } else {
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// 解析任务本体：换取直链并写回目录
async fn apply_resolution(
    catalog: &CatalogStore,
    resolver: &AuthResolver,
    container_id: i64,
    source: &str,
) -> anyhow::Result<ResolveSummary> {
    let links = resolver
        .resolve(source)
        .await
        .map_err(anyhow::Error::new)?;

    let now = Utc::now().timestamp_millis();
    let mut updated = 0;
    for (fs_id, link) in &links {
        // 目录中不存在的 fs_id 静默跳过，不算部分失败
        if catalog.update_resolved_links(container_id, fs_id, link, now)? {
            updated += 1;
        }
    }

    catalog.mark_resolved(container_id)?;
    info!(
        "直链解析完成: container_id={}, 更新 {} 个文件",
        container_id, updated
    );
    Ok(ResolveSummary { updated })
}

/// GET /api/v1/resolve/status
/// 解析队列状态
pub async fn resolve_queue_status(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<QueueStatus>> {
    Json(ApiResponse::success(app_state.resolver_queue.status()))
}

/// GET /api/v1/resolve/stale/:container_id
/// 容器直链是否过期（TTL 4 小时）
pub async fn resolve_staleness(
    State(app_state): State<AppState>,
    Path(container_id): Path<i64>,
) -> Result<Json<ApiResponse<StaleResponse>>, StatusCode> {
    match app_state.catalog.latest_auth_fetched_at(container_id) {
        Ok(auth_fetched_at) => {
            let stale = links_stale(auth_fetched_at, Utc::now().timestamp_millis());
            Ok(Json(ApiResponse::success(StaleResponse {
                stale,
                auth_fetched_at,
            })))
        }
        Err(e) => {
            error!("读取直链时间失败: container_id={}, {:?}", container_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
