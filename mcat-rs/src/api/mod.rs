//! HTTP API handlers for mcat-rs

pub mod auth;
pub mod health;
pub mod regionals;

pub use auth::auth_middleware;
pub use health::health_routes;
pub use regionals::regional_routes;
