pub mod config;
pub mod error;
pub mod relay;
pub mod stats;

use std::sync::Arc;

use axum::{Router, extract::FromRef, routing::get};
use tower_http::cors::CorsLayer;

pub use config::Config;
pub use error::RelayError;
pub use relay::Relay;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

pub fn app(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/health", get(stats::health))
        .merge(relay::router())
        .with_state(AppState { relay })
        .layer(CorsLayer::permissive())
}
