use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// 请求追踪头
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_CLIENT_ID_LEN: usize = 128;

tokio::task_local! {
    /// 当前请求任务绑定的 request_id，错误响应与日志从这里取值。
    static TASK_REQUEST_ID: String;
}

/// 获取当前请求上下文中的 request_id；不在请求任务内时返回 None。
pub fn current_request_id() -> Option<String> {
    TASK_REQUEST_ID.try_with(Clone::clone).ok()
}

fn accept_client_id(raw: &str) -> Option<&str> {
    let v = raw.trim();
    let ok = !v.is_empty()
        && v.len() <= MAX_CLIENT_ID_LEN
        && v
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    ok.then_some(v)
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(accept_client_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("req_{}", Uuid::new_v4().simple()))
}

/// request_id 中间件：透传合法的客户端 `X-Request-Id`，否则生成新值；
/// 同时回写响应头并绑定到任务上下文。
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = resolve_request_id(&req);

    let mut res = TASK_REQUEST_ID
        .scope(request_id.clone(), next.run(req))
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::accept_client_id;

    #[test]
    fn client_id_with_safe_chars_is_kept() {
        assert_eq!(accept_client_id(" upload-42_a.b "), Some("upload-42_a.b"));
    }

    #[test]
    fn client_id_with_unsafe_chars_is_replaced() {
        assert_eq!(accept_client_id(""), None);
        assert_eq!(accept_client_id("a b"), None);
        assert_eq!(accept_client_id("../etc"), None);
        assert_eq!(accept_client_id(&"x".repeat(129)), None);
    }
}
