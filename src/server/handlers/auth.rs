// 登录会话 API
//
// 会话本体由外部凭证采集流程生成，这里只负责保存与状态查询

use crate::resolver::{AuthSession, AUTH_LINK_TTL_MS, AUTH_SESSION_KEY};
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::ApiResponse;

/// 会话状态响应
#[derive(Debug, Serialize)]
pub struct AuthStatusResponse {
    #[serde(rename = "hasAuth")]
    pub has_auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_successful_usage_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_likely_expired: Option<bool>,
}

impl AuthStatusResponse {
    fn absent() -> Self {
        Self {
            has_auth: false,
            captured_at: None,
            last_successful_usage_at: None,
            is_likely_expired: None,
        }
    }
}

/// GET /api/v1/auth/status
/// 会话是否存在，以及按使用时间推测是否过期
pub async fn auth_status(
    State(app_state): State<AppState>,
) -> Result<Json<ApiResponse<AuthStatusResponse>>, StatusCode> {
    let raw = match app_state.catalog.get_setting(AUTH_SESSION_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Ok(Json(ApiResponse::success(AuthStatusResponse::absent()))),
        Err(e) => {
            error!("读取登录会话失败: {:?}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let session: AuthSession = match serde_json::from_str(&raw) {
        Ok(session) => session,
        Err(e) => {
            warn!("登录会话损坏: {}", e);
            return Ok(Json(ApiResponse::success(AuthStatusResponse::absent())));
        }
    };

    // 没用过就按采集时间算
    let last_used = session
        .last_successful_usage_at
        .clone()
        .or_else(|| session.captured_at.clone());
    let is_likely_expired = last_used
        .as_deref()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| {
            Utc::now().timestamp_millis() - ts.with_timezone(&Utc).timestamp_millis()
                > AUTH_LINK_TTL_MS
        })
        .unwrap_or(true);

    Ok(Json(ApiResponse::success(AuthStatusResponse {
        has_auth: true,
        captured_at: session.captured_at,
        last_successful_usage_at: session.last_successful_usage_at,
        is_likely_expired: Some(is_likely_expired),
    })))
}

/// POST /api/v1/auth/save
/// 保存凭证采集流程导出的会话
pub async fn save_auth(
    State(app_state): State<AppState>,
    Json(mut session): Json<AuthSession>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    if session.js_token.is_empty() || session.cookies.is_empty() || session.captured_at.is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // 初始的使用时间取采集时间
    session.last_successful_usage_at = session.captured_at.clone();

    let raw = serde_json::to_string(&session).map_err(|e| {
        error!("序列化登录会话失败: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    match app_state.catalog.set_setting(AUTH_SESSION_KEY, &raw) {
        Ok(()) => {
            info!("登录会话已保存, cookie 数={}", session.cookies.len());
            Ok(Json(ApiResponse::success(
                "Authentication data saved".to_string(),
            )))
        }
        Err(e) => {
            error!("保存登录会话失败: {:?}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
