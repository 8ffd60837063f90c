use config::builder::DefaultState;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 开发环境使用的默认 API Key（生产部署必须覆盖）
pub const DEFAULT_API_KEY: &str = "bg-remover-secret-2024";

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别（RUST_LOG 未设置时生效）
    pub level: String,
    /// 日志格式：full | compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

/// CORS 配置
///
/// 每个字段单独取默认值：只覆盖 `allowed_origins` 时，其余字段仍保持前端默认策略
/// （GET/POST，请求头 Content-Type 与 x-api-key，不允许凭证）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// 是否启用 CORS
    #[serde(default = "CorsConfig::default_enabled")]
    pub enabled: bool,
    /// 允许的 Origin 列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    /// 允许的方法列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    /// 允许的请求头列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_allowed_headers")]
    pub allowed_headers: Vec<String>,
    /// 暴露的响应头列表（支持 "*" 表示任意）
    #[serde(default = "CorsConfig::default_expose_headers")]
    pub expose_headers: Vec<String>,
    /// 是否允许携带凭证（Cookie/Authorization）
    #[serde(default = "CorsConfig::default_allow_credentials")]
    pub allow_credentials: bool,
    /// 预检缓存时间（秒）
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl CorsConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_allowed_origins() -> Vec<String> {
        vec!["http://localhost:3000".to_string()]
    }

    fn default_allowed_methods() -> Vec<String> {
        vec!["GET".to_string(), "POST".to_string()]
    }

    fn default_allowed_headers() -> Vec<String> {
        vec!["content-type".to_string(), "x-api-key".to_string()]
    }

    fn default_expose_headers() -> Vec<String> {
        vec!["content-disposition".to_string(), "x-request-id".to_string()]
    }

    fn default_allow_credentials() -> bool {
        false
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            allowed_origins: Self::default_allowed_origins(),
            allowed_methods: Self::default_allowed_methods(),
            allowed_headers: Self::default_allowed_headers(),
            expose_headers: Self::default_expose_headers(),
            allow_credentials: Self::default_allow_credentials(),
            max_age_secs: None,
        }
    }
}

/// API Key 鉴权配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// 是否启用 x-api-key 校验
    pub enabled: bool,
    /// 共享密钥（Header: x-api-key）
    pub api_key: String,
    /// 为 true 时拒绝以开发默认密钥启动
    pub require_explicit_key: bool,
}

impl AuthConfig {
    /// 当前是否仍在使用开发默认密钥
    pub fn uses_default_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: DEFAULT_API_KEY.to_string(),
            require_explicit_key: false,
        }
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// multipart 中承载图片的字段名
    pub field_name: String,
    /// 单个图片文件的上限（字节）
    pub max_bytes: usize,
}

/// multipart 边界、分片头等框架开销的余量
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

impl UploadConfig {
    /// 整个请求体的上限：文件上限加上 multipart 框架余量
    pub fn body_limit(&self) -> usize {
        self.max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: "file".to_string(),
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// 处理阶段配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// 并发处理许可数（0=自动，取 CPU 核心数）
    pub max_parallel: u32,
    /// 单次抠图超时（秒，0=不限制）
    pub timeout_secs: u64,
    /// 是否附加 `Content-Disposition: attachment`
    pub attachment: bool,
}

impl ProcessingConfig {
    /// 实际生效的并发许可数
    pub fn effective_parallelism(&self) -> usize {
        if self.max_parallel == 0 {
            num_cpus::get()
        } else {
            self.max_parallel as usize
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_parallel: 0,
            timeout_secs: 120,
            attachment: true,
        }
    }
}

/// 抠图引擎类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoverEngine {
    /// 进程内启发式引擎（开发/离线环境）
    #[default]
    Builtin,
    /// 转发至 rembg 兼容的 HTTP 服务
    Remote,
}

/// 内置引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuiltinRemoverConfig {
    /// 与背景色的最大通道距离，低于该值的边缘连通像素视为背景
    pub tolerance: u8,
}

impl Default for BuiltinRemoverConfig {
    fn default() -> Self {
        Self { tolerance: 32 }
    }
}

/// 远端引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteRemoverConfig {
    /// 远端接口地址，例如 http://127.0.0.1:7000/remove-bg
    pub url: String,
    /// 上传字段名
    pub field_name: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 远端服务自身的 x-api-key（可选）
    pub api_key: Option<String>,
}

impl Default for RemoteRemoverConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7000/remove-bg".to_string(),
            field_name: "file".to_string(),
            timeout_secs: 120,
            api_key: None,
        }
    }
}

/// 抠图引擎配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RemoverConfig {
    pub engine: RemoverEngine,
    pub builtin: BuiltinRemoverConfig,
    pub remote: RemoteRemoverConfig,
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// CORS 配置
    #[serde(default)]
    pub cors: CorsConfig,
    /// API Key 鉴权配置
    #[serde(default)]
    pub auth: AuthConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 处理阶段配置
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// 抠图引擎配置
    #[serde(default)]
    pub remover: RemoverConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// 以逗号分隔解析为列表的环境变量键
const LIST_KEYS: [&str; 4] = [
    "cors.allowed_origins",
    "cors.allowed_methods",
    "cors.allowed_headers",
    "cors.expose_headers",
];

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖
    ///
    /// 配置文件缺失时仅使用默认值与环境变量，例如：`APP_AUTH__API_KEY`、`APP_SERVER__PORT`。
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false));
        Self::from_builder(builder)
    }

    /// 在给定来源之上叠加环境变量并完成校验
    pub(crate) fn from_builder(
        builder: config::ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigError> {
        let mut env = Environment::with_prefix("APP")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",");
        for key in LIST_KEYS {
            env = env.with_list_parse_key(key);
        }

        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            "配置加载完成: engine = {:?}, auth.enabled = {}",
            config.remover.engine,
            config.auth.enabled
        );

        Ok(config)
    }

    /// 获取配置文件路径（APP_CONFIG_FILE 优先）
    fn get_config_path() -> PathBuf {
        std::env::var("APP_CONFIG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"))
    }

    /// 校验启动期不可接受的组合
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.enabled && self.auth.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.enabled=true 但 auth.api_key 为空".to_string(),
            ));
        }
        if self.auth.enabled && self.auth.require_explicit_key && self.auth.uses_default_key() {
            return Err(ConfigError::Message(
                "auth.require_explicit_key=true，必须通过 APP_AUTH__API_KEY 覆盖默认密钥"
                    .to_string(),
            ));
        }
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Message("upload.max_bytes 必须大于 0".to_string()));
        }
        if self.upload.field_name.trim().is_empty() {
            return Err(ConfigError::Message("upload.field_name 不能为空".to_string()));
        }
        if self.remover.engine == RemoverEngine::Remote {
            reqwest::Url::parse(&self.remover.remote.url).map_err(|e| {
                ConfigError::Message(format!(
                    "remover.remote.url 无效 ({}): {e}",
                    self.remover.remote.url
                ))
            })?;
        }
        Ok(())
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            cors: CorsConfig::default(),
            auth: AuthConfig::default(),
            upload: UploadConfig::default(),
            processing: ProcessingConfig::default(),
            remover: RemoverConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(raw: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_builder(
            ConfigBuilder::builder().add_source(File::from_str(raw, FileFormat::Toml)),
        )
    }

    #[test]
    fn empty_source_yields_dev_defaults() {
        let cfg = from_toml("").expect("defaults");
        assert!(cfg.auth.enabled);
        assert!(cfg.auth.uses_default_key());
        assert_eq!(cfg.upload.field_name, "file");
        assert_eq!(cfg.remover.engine, RemoverEngine::Builtin);
        assert!(cfg.cors.enabled);
        assert!(!cfg.cors.allow_credentials);
    }

    #[test]
    fn toml_sections_override_defaults() {
        let cfg = from_toml(
            r#"
            [server]
            port = 9100

            [auth]
            api_key = "prod-secret"
            require_explicit_key = true

            [remover]
            engine = "remote"

            [remover.remote]
            url = "http://rembg.internal:7000/remove-bg"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.server_addr(), "0.0.0.0:9100");
        assert_eq!(cfg.auth.api_key, "prod-secret");
        assert_eq!(cfg.remover.engine, RemoverEngine::Remote);
        assert_eq!(cfg.remover.remote.field_name, "file");
    }

    #[test]
    fn partial_cors_section_keeps_frontend_policy() {
        let cfg = from_toml(
            r#"
            [cors]
            allowed_origins = ["https://app.example"]
            "#,
        )
        .expect("parse");
        assert!(cfg.cors.enabled);
        assert_eq!(cfg.cors.allowed_origins, vec!["https://app.example"]);
        assert_eq!(cfg.cors.allowed_methods, vec!["GET", "POST"]);
        assert!(cfg.cors.allowed_headers.iter().any(|h| h == "x-api-key"));
        assert!(crate::cors::build_cors_layer(&cfg.cors).is_some());
    }

    #[test]
    fn cors_can_be_switched_off() {
        let cfg = from_toml(
            r#"
            [cors]
            enabled = false
            "#,
        )
        .expect("parse");
        assert!(crate::cors::build_cors_layer(&cfg.cors).is_none());
    }

    #[test]
    fn explicit_key_requirement_rejects_default_secret() {
        let err = from_toml(
            r#"
            [auth]
            require_explicit_key = true
            "#,
        )
        .expect_err("default key must be rejected");
        assert!(err.to_string().contains("require_explicit_key"));
    }

    #[test]
    fn empty_api_key_is_rejected_when_auth_enabled() {
        let mut cfg = AppConfig::default();
        cfg.auth.api_key = "  ".to_string();
        assert!(cfg.validate().is_err());

        cfg.auth.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn remote_engine_requires_valid_url() {
        let mut cfg = AppConfig::default();
        cfg.remover.engine = RemoverEngine::Remote;
        cfg.remover.remote.url = "not a url".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn body_limit_leaves_room_for_multipart_framing() {
        let upload = UploadConfig {
            max_bytes: 10 * 1024 * 1024,
            ..UploadConfig::default()
        };
        assert!(upload.body_limit() > upload.max_bytes);

        let huge = UploadConfig {
            max_bytes: usize::MAX,
            ..UploadConfig::default()
        };
        assert_eq!(huge.body_limit(), usize::MAX);
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let p = ProcessingConfig {
            timeout_secs: 0,
            ..ProcessingConfig::default()
        };
        assert!(p.timeout().is_none());
        assert!(p.effective_parallelism() >= 1);
    }
}
