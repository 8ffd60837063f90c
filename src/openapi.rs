use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// 在 OpenAPI 中注入 `x-api-key` 的安全定义，供图片处理接口引用。
struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "ApiKey",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                crate::features::auth::API_KEY_HEADER,
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::root,
        crate::features::health::handler::health_check,
        crate::features::image::handler::process_image,
    ),
    components(schemas(
        crate::error::ProblemDetails,
        crate::features::health::handler::RootResponse,
        crate::features::health::handler::HealthResponse,
        crate::features::image::types::ProcessImageForm,
    )),
    modifiers(&ApiKeySecurity),
    tags(
        (name = "Image", description = "背景移除：上传图片，返回透明背景 PNG。"),
        (name = "Health", description = "服务信息与健康检查：无需鉴权。"),
    ),
    info(
        title = "Background Remover API",
        version = env!("CARGO_PKG_VERSION"),
        description = "图片背景移除服务（Axum + utoipa）。/process-image 需在 Header 中携带 x-api-key。"
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn document_lists_routes_and_security_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/process-image"));
        assert!(doc.paths.paths.contains_key("/"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("ApiKey"));
    }
}
