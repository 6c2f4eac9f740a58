//! API authentication via timestamp and hash validation
//!
//! Protected requests carry two query parameters:
//! - `timestamp`: Unix epoch milliseconds at signing time
//! - `hash`: lowercase hex SHA-256 of the canonical JSON `{"timestamp":<ms>}`
//!   followed by the decimal shared secret
//!
//! The shared secret lives in the `settings` table under `api_shared_secret`.
//! A secret of `0` disables authentication entirely.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

/// Maximum age of a signed timestamp
pub const MAX_TIMESTAMP_AGE_MS: i64 = 5_000;

/// Maximum clock drift tolerated for timestamps from the future
pub const MAX_TIMESTAMP_FUTURE_MS: i64 = 1_000;

/// Authentication fields carried in the query string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthQuery {
    pub timestamp: i64,
    pub hash: String,
}

/// Authentication error types
#[derive(Debug, Clone, Error)]
pub enum ApiAuthError {
    /// Timestamp outside acceptable window
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Hash does not match calculated value
    #[error("Invalid hash")]
    InvalidHash { provided: String, calculated: String },

    /// Database error loading or storing the shared secret
    #[error("Database error: {0}")]
    DatabaseError(String),
}

// ========================================
// Shared Secret Management
// ========================================

/// Load shared secret from database settings
///
/// Generates and stores a new secret when none exists yet.
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let stored: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(SHARED_SECRET_KEY)
            .fetch_optional(db)
            .await
            .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match stored.flatten() {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid shared secret: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate a random non-zero secret and store it
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(secret)
}

// ========================================
// Timestamp Validation
// ========================================

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Validate timestamp against the current clock
///
/// # Examples
///
/// ```
/// use mcat_common::api::auth::{now_millis, validate_timestamp};
///
/// let now = now_millis();
/// assert!(validate_timestamp(now).is_ok());
/// assert!(validate_timestamp(now - 60_000).is_err());
/// ```
pub fn validate_timestamp(timestamp: i64) -> Result<(), ApiAuthError> {
    validate_timestamp_at(timestamp, now_millis())
}

/// Validate timestamp against an explicit `now`
pub fn validate_timestamp_at(timestamp: i64, now: i64) -> Result<(), ApiAuthError> {
    // Saturating: `timestamp` is untrusted query input
    let age = now.saturating_sub(timestamp);

    if age > MAX_TIMESTAMP_AGE_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms too old (max {}ms past)",
                age, MAX_TIMESTAMP_AGE_MS
            ),
        });
    }

    if age.saturating_neg() > MAX_TIMESTAMP_FUTURE_MS {
        return Err(ApiAuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                age.saturating_neg(), MAX_TIMESTAMP_FUTURE_MS
            ),
        });
    }

    Ok(())
}

// ========================================
// Hash Calculation and Validation
// ========================================

/// Calculate the request hash for a timestamp and shared secret
pub fn calculate_hash(timestamp: i64, shared_secret: i64) -> String {
    let canonical = json!({ "timestamp": timestamp }).to_string();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(shared_secret.to_string().as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Validate a provided hash
pub fn validate_hash(provided: &str, timestamp: i64, shared_secret: i64) -> Result<(), ApiAuthError> {
    let calculated = calculate_hash(timestamp, shared_secret);

    if provided.eq_ignore_ascii_case(&calculated) {
        Ok(())
    } else {
        Err(ApiAuthError::InvalidHash {
            provided: provided.to_string(),
            calculated,
        })
    }
}

/// Produce signed query fields for the current time
pub fn sign_request(shared_secret: i64) -> AuthQuery {
    let timestamp = now_millis();
    AuthQuery {
        timestamp,
        hash: calculate_hash(timestamp, shared_secret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_window() {
        let now = 1_700_000_000_000;

        assert!(validate_timestamp_at(now, now).is_ok());
        assert!(validate_timestamp_at(now - MAX_TIMESTAMP_AGE_MS, now).is_ok());
        assert!(validate_timestamp_at(now + MAX_TIMESTAMP_FUTURE_MS, now).is_ok());

        assert!(validate_timestamp_at(now - MAX_TIMESTAMP_AGE_MS - 1, now).is_err());
        assert!(validate_timestamp_at(now + MAX_TIMESTAMP_FUTURE_MS + 1, now).is_err());
    }

    #[test]
    fn test_extreme_timestamps_rejected() {
        let now = 1_760_000_000_000;

        assert!(matches!(
            validate_timestamp_at(i64::MIN, now),
            Err(ApiAuthError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            validate_timestamp_at(i64::MAX, now),
            Err(ApiAuthError::InvalidTimestamp { .. })
        ));
        assert!(validate_timestamp_at(0, i64::MIN).is_err());
    }

    #[test]
    fn test_hash_depends_on_secret_and_timestamp() {
        let h1 = calculate_hash(1000, 42);
        assert_eq!(h1, calculate_hash(1000, 42));
        assert_ne!(h1, calculate_hash(1000, 43));
        assert_ne!(h1, calculate_hash(1001, 42));
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_signed_request_validates() {
        let signed = sign_request(12345);
        assert!(validate_timestamp(signed.timestamp).is_ok());
        assert!(validate_hash(&signed.hash, signed.timestamp, 12345).is_ok());

        match validate_hash(&signed.hash, signed.timestamp, 54321) {
            Err(ApiAuthError::InvalidHash { provided, .. }) => assert_eq!(provided, signed.hash),
            other => panic!("expected InvalidHash, got {:?}", other),
        }
    }

    #[cfg(feature = "sqlx")]
    #[tokio::test]
    async fn test_shared_secret_generated_once() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        crate::db::init::create_settings_table(&pool).await.unwrap();

        let first = load_shared_secret(&pool).await.unwrap();
        let second = load_shared_secret(&pool).await.unwrap();

        assert_ne!(first, 0);
        assert_eq!(first, second);
    }
}
