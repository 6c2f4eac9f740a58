//! Shared HTTP API functionality
//!
//! This module contains ONLY pure functions, database operations and shared
//! types. Each service wraps these with its own axum middleware.

pub mod auth;

pub use auth::{
    calculate_hash, now_millis, sign_request, validate_hash, validate_timestamp, ApiAuthError,
    AuthQuery,
};
#[cfg(feature = "sqlx")]
pub use auth::{initialize_shared_secret, load_shared_secret};
