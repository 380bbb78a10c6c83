//! HTTP surface of the gateway.

pub mod error;
pub mod routes;
pub mod state;

use std::any::Any;

use axum::{
    extract::DefaultBodyLimit,
    http::{request::Parts, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{origin_allowed, ServerSettings};
use error::ApiError;
use state::AppState;

/// Prefix all drive routes are nested under.
pub const API_PREFIX: &str = "/api/v1/drive";

pub fn build_router(state: AppState, server: &ServerSettings) -> Router {
    let drive_routes = Router::new()
        .route("/files", get(routes::list).post(routes::upload))
        .route("/files/{file_id}", get(routes::get).delete(routes::delete))
        .route("/files/{file_id}/content", get(routes::download))
        .route("/search", get(routes::search))
        .route("/folder", get(routes::folder))
        .route("/health", get(routes::health));

    let mut router = Router::new()
        .nest(API_PREFIX, drive_routes)
        .route("/health", get(routes::health));

    if let Some(static_dir) = &server.static_dir {
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let patterns = origins.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|origin| origin_allowed(&patterns, origin))
                    .unwrap_or(false)
            },
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("Unexpected error: {}", detail)).into_response()
}
