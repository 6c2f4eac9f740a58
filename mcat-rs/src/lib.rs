//! mcat-rs library - Regional Sync module
//!
//! Keeps the local regional mirror in agreement with the external
//! authoritative list. Exposes the pieces to `main` and to integration tests.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod error;
pub mod regional;
pub mod scheduler;
pub mod sync;

pub use crate::error::{ApiError, ApiResult};

use crate::sync::RegionalSyncService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared secret for API authentication (0 disables auth)
    pub shared_secret: i64,
    /// Single-flight sync service shared with the scheduler
    pub sync: Arc<RegionalSyncService>,
}

impl AppState {
    pub fn new(shared_secret: i64, sync: Arc<RegionalSyncService>) -> Self {
        Self {
            shared_secret,
            sync,
        }
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api` requires authentication.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = api::regional_routes().layer(middleware::from_fn_with_state(
        state.clone(),
        api::auth_middleware,
    ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
