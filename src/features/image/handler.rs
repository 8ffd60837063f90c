use std::time::Instant;

use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};

use super::types::{ProcessedImage, UploadedImage, validate_media_type};
use crate::config::UploadConfig;
use crate::error::AppError;
use crate::features::auth::api_key_middleware;
use crate::features::remover::RemoverError;
use crate::state::AppState;

/// 下载时的建议文件名
pub const DOWNLOAD_FILENAME: &str = "background-removed.png";

const CONTENT_DISPOSITION_VALUE: &str = "attachment; filename=background-removed.png";
const NO_FILE_DETAIL: &str = "No file uploaded";
const NOT_MULTIPART_DETAIL: &str = "Expected a multipart/form-data body";

#[utoipa::path(
    post,
    path = "/process-image",
    summary = "移除图片背景",
    description = "上传 JPEG/PNG/WebP 图片（multipart 字段 file），返回去除背景后的 PNG。需要在 Header 中提供 x-api-key。",
    request_body(content = super::types::ProcessImageForm, content_type = "multipart/form-data"),
    params(("x-api-key" = String, Header, description = "共享密钥（config.auth.api_key）")),
    responses(
        (status = 200, description = "去除背景后的 PNG（Content-Type: image/png）"),
        (status = 400, description = "类型不支持 / 空文件", body = crate::error::ProblemDetails),
        (status = 401, description = "API Key 缺失或无效", body = crate::error::ProblemDetails),
        (status = 413, description = "超过上传上限", body = crate::error::ProblemDetails),
        (status = 500, description = "抠图失败", body = crate::error::ProblemDetails)
    ),
    security(("ApiKey" = [])),
    tag = "Image"
)]
pub async fn process_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let t_total = Instant::now();
    let multipart = multipart.map_err(|e| {
        tracing::debug!("请求体不是 multipart: {}", e);
        AppError::InvalidInput(NOT_MULTIPART_DETAIL.to_string())
    })?;

    let upload = read_upload(multipart, &state.config.upload).await?;
    tracing::info!(
        media_type = upload.media_type.as_str(),
        bytes = upload.bytes.len(),
        file_name = upload.file_name.as_deref().unwrap_or("-"),
        "上传校验通过"
    );

    let processed = delegate(&state, upload).await?;
    tracing::info!(
        bytes = processed.bytes.len(),
        elapsed_ms = t_total.elapsed().as_millis() as u64,
        "抠图完成"
    );

    Ok(compose_response(processed, state.config.processing.attachment))
}

/// 读取 multipart 中的图片字段：先校验声明类型，再读取内容并校验非空
async fn read_upload(mut multipart: Multipart, cfg: &UploadConfig) -> Result<UploadedImage, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, cfg.max_bytes))?
    {
        if field.name() != Some(cfg.field_name.as_str()) {
            continue;
        }

        let media_type = validate_media_type(field.content_type())?;
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, cfg.max_bytes))?;
        if bytes.len() > cfg.max_bytes {
            return Err(file_too_large(cfg.max_bytes));
        }
        return UploadedImage::new(media_type, bytes, file_name);
    }
    Err(AppError::InvalidInput(NO_FILE_DETAIL.to_string()))
}

fn file_too_large(max_bytes: usize) -> AppError {
    AppError::PayloadTooLarge(format!("File too large. Maximum size is {max_bytes} bytes"))
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        file_too_large(max_bytes)
    } else {
        AppError::InvalidInput(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// 处理阶段：在独立任务中调用引擎，引擎的任何失败（含 panic 与超时）都转换为 ProcessingFailed
///
/// 超时覆盖排队等待许可与引擎执行两段。
async fn delegate(state: &AppState, upload: UploadedImage) -> Result<ProcessedImage, AppError> {
    let remover = state.remover.clone();
    let semaphore = state.process_semaphore.clone();
    let engine = remover.name();
    let t_run = Instant::now();
    let task = tokio::spawn(async move {
        let t_wait = Instant::now();
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|e| RemoverError::Unavailable(format!("处理信号量已关闭: {e}")))?;
        tracing::debug!(
            wait_ms = t_wait.elapsed().as_millis() as u64,
            "获取处理许可"
        );
        remover.remove_background(upload.bytes).await
    });
    let abort = task.abort_handle();

    let joined = match state.config.processing.timeout() {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                abort.abort();
                Ok(Err(RemoverError::Timeout))
            }
        },
        None => task.await,
    };
    let outcome = joined
        .map_err(|e| RemoverError::Crashed(e.to_string()))
        .and_then(|r| r);

    match outcome {
        Ok(bytes) => {
            tracing::debug!(
                engine,
                total_ms = t_run.elapsed().as_millis() as u64,
                "引擎调用完成"
            );
            Ok(ProcessedImage { bytes })
        }
        Err(e) => {
            tracing::warn!(engine, "引擎调用失败: {}", e);
            Err(AppError::ProcessingFailed(e.to_string()))
        }
    }
}

/// 响应组装：原样返回引擎输出，类型固定为 image/png
fn compose_response(image: ProcessedImage, attachment: bool) -> Response {
    let mut res = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static("image/png"))],
        image.bytes,
    )
        .into_response();
    if attachment {
        res.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static(CONTENT_DISPOSITION_VALUE),
        );
    }
    res
}

/// 图片处理路由（含旧版路径 /remove-bg），统一受 x-api-key 保护
pub fn create_image_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/process-image", post(process_image))
        .route("/remove-bg", post(process_image))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.upload.body_limit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    #[test]
    fn composed_response_is_png_attachment() {
        let res = compose_response(
            ProcessedImage {
                bytes: Bytes::from_static(b"png"),
            },
            true,
        );
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename={DOWNLOAD_FILENAME}").as_str()
        );
    }

    #[test]
    fn inline_mode_omits_disposition() {
        let res = compose_response(
            ProcessedImage {
                bytes: Bytes::from_static(b"png"),
            },
            false,
        );
        assert!(res.headers().get(header::CONTENT_DISPOSITION).is_none());
    }
}
