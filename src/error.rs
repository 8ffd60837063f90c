use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
///
/// `Display` 即对调用方展示的 `detail`，需保持稳定。
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// API Key 缺失或不匹配
    #[error("{0}")]
    Unauthorized(String),

    /// 上传内容不合法（类型不在白名单 / 空文件 / 非 multipart）
    #[error("{0}")]
    InvalidInput(String),

    /// 请求体超过上传上限
    #[error("{0}")]
    PayloadTooLarge(String),

    /// 抠图引擎执行失败
    #[error("Error processing image: {0}")]
    ProcessingFailed(String),

    /// 其余未预期的内部错误
    #[error("{0}")]
    Unhandled(String),
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 所有失败都返回结构化 JSON，`detail` 为人类可读的简短说明。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Unauthorized")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 401)]
    pub status: u16,

    /// 人类可读的详细信息。
    #[schema(example = "Invalid or missing API key")]
    pub detail: String,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "UNAUTHORIZED")]
    pub code: String,

    /// 可选：请求追踪 ID。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ProcessingFailed(_) | AppError::Unhandled(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn stable_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::ProcessingFailed(_) => "PROCESSING_FAILED",
            AppError::Unhandled(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::PAYLOAD_TOO_LARGE => "Payload Too Large",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }

    /// 组装 Problem Details 结构（不含 HTTP 包装）
    pub fn to_problem(&self) -> ProblemDetails {
        ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: self.status_code().as_u16(),
            detail: self.to_string(),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.stable_code(), "请求处理失败: {}", self);
        } else {
            tracing::debug!(code = self.stable_code(), "请求被拒绝: {}", self);
        }

        let mut res = Json(self.to_problem()).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

/// 将 handler 内 panic 转换为结构化 500 响应（供 `CatchPanicLayer` 使用）。
pub fn panic_response(payload: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let reason = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("handler panic: {}", reason);
    AppError::Unhandled("Internal server error".to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use axum::http::StatusCode;

    #[test]
    fn statuses_follow_taxonomy() {
        let cases = [
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (
                AppError::ProcessingFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Unhandled("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err:?}");
        }
    }

    #[test]
    fn processing_failure_detail_keeps_cause() {
        let err = AppError::ProcessingFailed("model exploded".into());
        let problem = err.to_problem();
        assert_eq!(problem.detail, "Error processing image: model exploded");
        assert_eq!(problem.code, "PROCESSING_FAILED");
        assert_eq!(problem.status, 500);
    }

    #[test]
    fn panic_payload_is_hidden_from_client() {
        let res = super::panic_response(Box::new("secret internals"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
