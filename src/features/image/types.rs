use axum::body::Bytes;

use crate::error::AppError;

/// 媒体类型不在白名单时的固定提示
pub const INVALID_TYPE_DETAIL: &str =
    "Invalid file type. Only JPEG, PNG and WebP images are allowed";

/// 上传内容为空时的固定提示
pub const EMPTY_FILE_DETAIL: &str = "Empty file";

/// 允许上传的媒体类型（闭集）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedMediaType {
    Jpeg,
    Png,
    Webp,
}

impl AllowedMediaType {
    /// 解析声明的 Content-Type；忽略大小写与 `;` 之后的参数。
    pub fn parse(declared: &str) -> Option<Self> {
        let essence = declared.split(';').next().unwrap_or("").trim();
        if essence.eq_ignore_ascii_case("image/jpeg") {
            Some(Self::Jpeg)
        } else if essence.eq_ignore_ascii_case("image/png") {
            Some(Self::Png)
        } else if essence.eq_ignore_ascii_case("image/webp") {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

/// 校验声明的媒体类型（在读取请求体之前执行）
pub fn validate_media_type(declared: Option<&str>) -> Result<AllowedMediaType, AppError> {
    declared
        .and_then(AllowedMediaType::parse)
        .ok_or_else(|| AppError::InvalidInput(INVALID_TYPE_DETAIL.to_string()))
}

/// 已通过校验的上传图片，仅在单个请求内存活
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub media_type: AllowedMediaType,
    pub file_name: Option<String>,
}

impl UploadedImage {
    /// 组装上传图片；空内容直接拒绝
    pub fn new(
        media_type: AllowedMediaType,
        bytes: Bytes,
        file_name: Option<String>,
    ) -> Result<Self, AppError> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput(EMPTY_FILE_DETAIL.to_string()));
        }
        Ok(Self {
            bytes,
            media_type,
            file_name,
        })
    }
}

/// 引擎输出（PNG），由响应组装阶段独占
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Bytes,
}

/// OpenAPI 文档用的上传表单描述
#[derive(Debug, utoipa::ToSchema)]
#[allow(dead_code)]
pub struct ProcessImageForm {
    /// 图片文件（image/jpeg、image/png 或 image/webp）
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_is_closed() {
        assert_eq!(AllowedMediaType::parse("image/jpeg"), Some(AllowedMediaType::Jpeg));
        assert_eq!(AllowedMediaType::parse("IMAGE/PNG"), Some(AllowedMediaType::Png));
        assert_eq!(
            AllowedMediaType::parse("image/webp; q=0.9"),
            Some(AllowedMediaType::Webp)
        );
        for rejected in ["image/gif", "image/jpg", "image/svg+xml", "text/plain", "", "image"] {
            assert_eq!(AllowedMediaType::parse(rejected), None, "{rejected}");
        }
    }

    #[test]
    fn missing_declared_type_is_invalid_input() {
        let err = validate_media_type(None).expect_err("no type");
        assert_eq!(err.to_string(), INVALID_TYPE_DETAIL);
    }

    #[test]
    fn empty_upload_is_rejected() {
        let err = UploadedImage::new(AllowedMediaType::Png, Bytes::new(), None)
            .expect_err("empty");
        assert_eq!(err.to_string(), EMPTY_FILE_DETAIL);

        let ok = UploadedImage::new(AllowedMediaType::Png, Bytes::from_static(b"x"), None)
            .expect("non-empty");
        assert_eq!(ok.media_type.as_str(), "image/png");
    }
}
