use axum::{Router, routing::get};
use std::path::Path;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::browser::SessionLauncher;
use crate::service::SearchService;

pub mod handlers;
pub mod models;

pub fn create_router<L: SessionLauncher>(
    service: Arc<SearchService<L>>,
    static_dir: impl AsRef<Path>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", get(handlers::search_handler::<L>))
        .route("/health", get(handlers::health_handler))
        .with_state(service)
        // Everything else is the search form and its assets.
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(cors)
}
