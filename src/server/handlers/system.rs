// 系统 API

use crate::catalog::CatalogStore;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use tracing::error;

use super::ApiResponse;

/// 本地文件核对结果
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LocalScanResult {
    /// 检查的行数
    pub checked: usize,
    /// 修正的行数
    pub updated: usize,
}

/// 核对本地文件存在性：缺失的标记为不可播放，回来的恢复可播放
pub fn run_local_scan(catalog: &CatalogStore) -> anyhow::Result<LocalScanResult> {
    let rows = catalog.local_files()?;
    let mut updated = 0;

    for (id, local_path, is_playable) in &rows {
        let path = match local_path {
            Some(path) if !path.is_empty() => path,
            _ => continue,
        };
        let exists = std::path::Path::new(path).exists();

        if !exists && *is_playable {
            catalog.set_playable(*id, false)?;
            updated += 1;
        }
        if exists && !*is_playable {
            catalog.set_playable(*id, true)?;
            updated += 1;
        }
    }

    Ok(LocalScanResult {
        checked: rows.len(),
        updated,
    })
}

/// GET /api/v1/system/scan-local
/// 手动触发本地文件核对
pub async fn scan_local(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<LocalScanResult>>, StatusCode> {
    match run_local_scan(&app_state.catalog) {
        Ok(result) => Ok(Json(ApiResponse::success(result))),
        Err(e) => {
            error!("本地文件核对失败: {:?}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
