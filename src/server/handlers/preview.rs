// 预览 API

use crate::preview::{group_files, normalize_preview, FileGroup};
use crate::provider::ShareError;
use crate::resolver::{AuthSession, AUTH_SESSION_KEY};
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::ApiResponse;

/// 预览请求
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    /// 分享链接
    pub url: String,
    /// 目标容器 id
    pub container_id: i64,
    /// 是否携带已保存会话的 Cookie（部分分享仅登录可见）
    #[serde(default, rename = "useAuth")]
    pub use_auth: bool,
}

/// POST /api/v1/preview
/// 解析分享链接，规范化并写入目录
///
/// 单目录分享写入给定容器；多目录分享按目录拆分为虚拟容器
pub async fn preview_share(
    State(app_state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<ApiResponse<Vec<FileGroup>>>, StatusCode> {
    if req.url.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match app_state.catalog.get_container(req.container_id) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("读取容器失败: {:?}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    if let Err(e) = app_state.catalog.mark_previewing(req.container_id) {
        error!("标记预览中失败: {:?}", e);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let cookie = if req.use_auth {
        preview_cookie(&app_state)
    } else {
        String::new()
    };

    match run_preview(&app_state, &req, &cookie).await {
        Ok(groups) => {
            info!(
                "预览成功: container_id={}, 分组数={}",
                req.container_id,
                groups.len()
            );
            Ok(Json(ApiResponse::success(groups)))
        }
        Err(e) => {
            error!("预览失败: container_id={}, {}", req.container_id, e);
            // 失败写到容器状态上，外部不用翻日志就能看到原因
            if let Err(me) = app_state.catalog.mark_error(req.container_id, &e.to_string()) {
                error!("写入容器错误状态失败: {:?}", me);
            }
            // 提取不到 surl 是终止性失败，换链接才有意义，区别于可重试的列表失败
            if matches!(e.downcast_ref::<ShareError>(), Some(ShareError::NoSurlFound)) {
                Err(StatusCode::BAD_REQUEST)
            } else {
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// 从已保存会话取预览用 Cookie；没有会话时退回匿名预览
fn preview_cookie(app_state: &AppState) -> String {
    match app_state.catalog.get_setting(AUTH_SESSION_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<AuthSession>(&raw) {
            Ok(session) => {
                info!("预览使用已保存的登录 Cookie");
                session.cookie_header()
            }
            Err(e) => {
                warn!("登录会话反序列化失败，匿名预览: {}", e);
                String::new()
            }
        },
        Ok(None) => {
            warn!("请求要求鉴权预览，但未配置登录会话");
            String::new()
        }
        Err(e) => {
            warn!("读取登录会话失败，匿名预览: {}", e);
            String::new()
        }
    }
}

async fn run_preview(
    app_state: &AppState,
    req: &PreviewRequest,
    cookie: &str,
) -> anyhow::Result<Vec<FileGroup>> {
    let listing = app_state.listing.list_share(&req.url, cookie).await?;
    let preview = normalize_preview(&listing);
    let groups = group_files(&preview.files);

    if groups.len() == 1 && !groups[0].is_virtual {
        // root 分组没有有意义的目录名，换用预览推导出的标题
        let title = if groups[0].title == "root" {
            preview.title.clone()
        } else {
            groups[0].title.clone()
        };
        app_state
            .catalog
            .set_container_title(req.container_id, &title)?;
        app_state
            .catalog
            .insert_files(req.container_id, &groups[0].files)?;
    } else {
        for group in &groups {
            let virtual_id = app_state.catalog.create_container(
                "terabox",
                Some(&req.url),
                Some(&group.title),
                true,
            )?;
            app_state.catalog.insert_files(virtual_id, &group.files)?;
            info!("创建虚拟容器: id={}, title={}", virtual_id, group.title);
        }
    }

    app_state.catalog.mark_previewed(req.container_id)?;
    Ok(groups)
}
