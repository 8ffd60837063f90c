#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{Request, Response},
};

use bg_remover_backend::{AppConfig, AppState, BackgroundRemover, RemoverError, build_router};

pub const TEST_KEY: &str = "test-api-key";
pub const BOUNDARY: &str = "bgremover-test-boundary";

/// 假引擎的行为
#[derive(Debug, Clone)]
pub enum FakeMode {
    /// 返回固定字节
    Fixed(&'static [u8]),
    /// 返回错误
    Fail(&'static str),
    /// 直接 panic
    Panic,
    /// 睡眠后返回
    Slow(Duration),
}

/// 记录调用次数与入参的假引擎
#[derive(Debug)]
pub struct FakeRemover {
    mode: FakeMode,
    calls: AtomicUsize,
    inputs: Mutex<Vec<Bytes>>,
}

impl FakeRemover {
    pub fn new(mode: FakeMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<Bytes> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackgroundRemover for FakeRemover {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn remove_background(&self, image: Bytes) -> Result<Bytes, RemoverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(image);
        match &self.mode {
            FakeMode::Fixed(out) => Ok(Bytes::from_static(out)),
            FakeMode::Fail(msg) => Err(RemoverError::Unavailable((*msg).to_string())),
            FakeMode::Panic => panic!("fake remover blew up"),
            FakeMode::Slow(d) => {
                tokio::time::sleep(*d).await;
                Ok(Bytes::from_static(b"late"))
            }
        }
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.api_key = TEST_KEY.to_string();
    cfg.processing.max_parallel = 4;
    cfg
}

pub fn app_with(remover: Arc<FakeRemover>, cfg: AppConfig) -> Router {
    build_router(AppState::new(Arc::new(cfg), remover))
}

/// 构造单字段 multipart 请求体
pub fn multipart_body(field: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"photo.bin\"\r\n")
            .as_bytes(),
    );
    if let Some(ct) = content_type {
        body.extend_from_slice(format!("Content-Type: {ct}\r\n").as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// 构造 /process-image 上传请求
pub fn upload_request(
    path: &str,
    api_key: Option<&str>,
    content_type: Option<&str>,
    data: &[u8],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(multipart_body("file", content_type, data)))
        .expect("build request")
}

pub async fn body_bytes(resp: Response<Body>) -> Bytes {
    to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
}

pub async fn body_json(resp: Response<Body>) -> serde_json::Value {
    let bytes = body_bytes(resp).await;
    serde_json::from_slice(&bytes).expect("parse json")
}
