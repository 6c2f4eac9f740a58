//! # mcat Common Library
//!
//! Shared code for the mcat catalog services including:
//! - Error type used across crates
//! - Root folder and TOML configuration resolution
//! - SQLite database initialization and schema
//! - Shared-secret API authentication primitives

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;

pub use error::{Error, Result};
