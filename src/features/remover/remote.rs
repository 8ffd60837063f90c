use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};

use super::{BackgroundRemover, RemoverError};
use crate::config::RemoteRemoverConfig;

/// 错误响应体写入日志/错误信息时的截断长度
const MAX_ERROR_BODY_CHARS: usize = 256;

/// 上游只接受 JPEG/PNG/WebP 分片，按内容嗅探声明类型
fn part_media_type(image: &[u8]) -> &'static str {
    match image::guess_format(image) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

/// 转发至 rembg 兼容服务的引擎（`POST multipart/form-data`，响应体为 PNG）
#[derive(Debug, Clone)]
pub struct RemoteRemover {
    client: Client,
    url: Url,
    field_name: String,
    api_key: Option<String>,
}

impl RemoteRemover {
    pub fn new(cfg: &RemoteRemoverConfig) -> Result<Self, RemoverError> {
        let url = Url::parse(&cfg.url)
            .map_err(|e| RemoverError::Unavailable(format!("invalid url {}: {e}", cfg.url)))?;
        let mut builder = Client::builder();
        if cfg.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(cfg.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| RemoverError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            url,
            field_name: cfg.field_name.clone(),
            api_key: cfg.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl BackgroundRemover for RemoteRemover {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn remove_background(&self, image: Bytes) -> Result<Bytes, RemoverError> {
        let mime = part_media_type(&image);
        let part = Part::bytes(image.to_vec())
            .file_name("upload")
            .mime_str(mime)?;
        let form = Form::new().part(self.field_name.clone(), part);

        let mut req = self.client.post(self.url.clone()).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(status = status.as_u16(), "远端抠图服务返回错误: {}", body);
            return Err(RemoverError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::part_media_type;

    #[test]
    fn part_type_follows_magic_bytes() {
        assert_eq!(part_media_type(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(part_media_type(b"\xff\xd8\xff\xe0...."), "image/jpeg");
        assert_eq!(part_media_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(part_media_type(b"plain text"), "application/octet-stream");
    }
}
