use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::state::AppState;

/// 调用方携带共享密钥的请求头
pub const API_KEY_HEADER: &str = "x-api-key";

/// 鉴权失败时的固定提示
pub const UNAUTHORIZED_DETAIL: &str = "Invalid or missing API key";

/// 校验请求头中的 API Key 与配置密钥是否完全一致。
///
/// 缺失、非 ASCII 可见字符、或不一致都视为鉴权失败。
pub fn verify_api_key(headers: &HeaderMap, expected: &str) -> Result<(), AppError> {
    let Some(raw) = headers.get(API_KEY_HEADER) else {
        tracing::debug!("请求缺少 x-api-key");
        return Err(AppError::Unauthorized(UNAUTHORIZED_DETAIL.to_string()));
    };
    let matched = raw
        .to_str()
        .is_ok_and(|provided| keys_match(provided, expected));
    if !matched {
        tracing::debug!("x-api-key 校验失败");
        return Err(AppError::Unauthorized(UNAUTHORIZED_DETAIL.to_string()));
    }
    Ok(())
}

fn keys_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// 鉴权中间件：挂载在需要保护的路由上，失败时直接短路，不读取请求体。
pub async fn api_key_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth = &state.config.auth;
    if auth.enabled {
        verify_api_key(req.headers(), &auth.api_key)?;
    }
    Ok(next.run(req).await)
}
