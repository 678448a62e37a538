//! Core types and shared functionality for modelview.
//!
//! This crate provides:
//! - The token-keyed asset cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Bundle, BundleStat, CacheDb, CacheStats, ModelCache};
pub use config::AppConfig;
pub use error::Error;
