// 容器 API

use crate::catalog::{CatalogFile, Container};
use crate::preview::NormalizedFile;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::ApiResponse;

/// 创建容器请求
#[derive(Debug, Deserialize)]
pub struct CreateContainerRequest {
    #[serde(rename = "type")]
    pub container_type: String,
    pub source: String,
    pub title: String,
}

/// 重命名容器请求
#[derive(Debug, Deserialize)]
pub struct RenameContainerRequest {
    pub title: String,
}

/// 批量写入文件响应
#[derive(Debug, Serialize)]
pub struct InsertFilesResponse {
    /// 实际插入的行数（指纹重复的被忽略）
    pub inserted: usize,
}

/// POST /api/v1/containers
/// 创建容器
pub async fn create_container(
    State(app_state): State<AppState>,
    Json(req): Json<CreateContainerRequest>,
) -> Result<Json<ApiResponse<Container>>, StatusCode> {
    if req.container_type.is_empty() || req.source.is_empty() || req.title.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let id = app_state
        .catalog
        .create_container(&req.container_type, Some(&req.source), Some(&req.title), false)
        .map_err(|e| {
            error!("创建容器失败: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!("创建容器成功: id={}, title={}", id, req.title);

    match app_state.catalog.get_container(id) {
        Ok(Some(container)) => Ok(Json(ApiResponse::success(container))),
        _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /api/v1/containers
/// 按创建时间倒序列出所有容器
pub async fn list_containers(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Container>>>, StatusCode> {
    match app_state.catalog.list_containers() {
        Ok(containers) => Ok(Json(ApiResponse::success(containers))),
        Err(e) => {
            error!("读取容器列表失败: {:?}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/v1/containers/:id
/// 获取指定容器
pub async fn get_container(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Container>>, StatusCode> {
    match app_state.catalog.get_container(id) {
        Ok(Some(container)) => Ok(Json(ApiResponse::success(container))),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("读取容器失败: id={}, {:?}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// PATCH /api/v1/containers/:id
/// 重命名容器
pub async fn rename_container(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<RenameContainerRequest>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    if req.title.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match app_state.catalog.rename_container(id, &req.title) {
        Ok(true) => Ok(Json(ApiResponse::success("Container renamed".to_string()))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("重命名容器失败: id={}, {:?}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// DELETE /api/v1/containers/:id
/// 删除容器及其文件
pub async fn delete_container(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    match app_state.catalog.delete_container(id) {
        Ok(true) => {
            info!("删除容器成功: id={}", id);
            Ok(Json(ApiResponse::success("Container deleted".to_string())))
        }
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("删除容器失败: id={}, {:?}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/v1/containers/:id/refetch
/// 重置容器到 idle，允许重新预览
pub async fn refetch_container(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    match app_state.catalog.reset_container(id) {
        Ok(true) => Ok(Json(ApiResponse::success("Container reset".to_string()))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("重置容器失败: id={}, {:?}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/v1/containers/:id/files
/// 容器内文件（按 file_index 排序）
pub async fn container_files(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<CatalogFile>>>, StatusCode> {
    match app_state.catalog.files_for_container(id) {
        Ok(files) => Ok(Json(ApiResponse::success(files))),
        Err(e) => {
            error!("读取容器文件失败: id={}, {:?}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /api/v1/containers/:id/files
/// 批量写入规范化文件（指纹重复的静默忽略）
pub async fn add_container_files(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(files): Json<Vec<NormalizedFile>>,
) -> Result<Json<ApiResponse<InsertFilesResponse>>, StatusCode> {
    match app_state.catalog.insert_files(id, &files) {
        Ok(inserted) => Ok(Json(ApiResponse::success(InsertFilesResponse { inserted }))),
        Err(e) => {
            error!("写入容器文件失败: id={}, {:?}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
