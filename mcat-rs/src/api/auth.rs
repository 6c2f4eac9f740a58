//! Authentication middleware for mcat-rs
//!
//! Protected routes require `?timestamp=<ms>&hash=<hex>` signed with the
//! shared secret (see `mcat_common::api::auth`). A secret of 0 disables the
//! check.

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::Response,
};
use mcat_common::api::auth::{validate_hash, validate_timestamp, ApiAuthError, AuthQuery};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Validate timestamp and hash before passing the request on
///
/// Applied to protected routes only. `/health` does NOT use this middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let Query(auth) = Query::<AuthQuery>::try_from_uri(request.uri())
        .map_err(|_| ApiError::Unauthorized("missing timestamp or hash".to_string()))?;

    validate_timestamp(auth.timestamp).map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    validate_hash(&auth.hash, auth.timestamp, state.shared_secret).map_err(|e| {
        if let ApiAuthError::InvalidHash { provided, .. } = &e {
            warn!(path = %request.uri().path(), provided = %provided, "Hash validation failed");
        }
        ApiError::Unauthorized(e.to_string())
    })?;

    Ok(next.run(request).await)
}
