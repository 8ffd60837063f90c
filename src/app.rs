use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cors::build_cors_layer;
use crate::error::panic_response;
use crate::features::{health, image};
use crate::openapi::ApiDoc;
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// 组装完整路由（main 与集成测试共用）
///
/// 中间件由内到外：panic 兜底 -> request_id -> 访问日志 -> CORS。
/// CORS 位于最外层，预检请求不会进入鉴权。
pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors);

    let mut app = Router::<AppState>::new()
        .merge(health::create_health_router())
        .merge(image::create_image_router(&state))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http());

    if let Some(layer) = cors {
        app = app.layer(layer);
    }
    app
}
