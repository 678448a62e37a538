//! SQLite-backed cache for downloaded 3D model bundles.
//!
//! This module provides a persistent, token-keyed cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Bundle storage keyed by share token (geometry, material, textures)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Size-bounded LRU eviction driven by a background sweep task

pub mod bundles;
pub mod connection;
pub mod manager;
pub mod migrations;

pub use crate::Error;

pub use bundles::{Bundle, BundleStat};
pub use connection::CacheDb;
pub use manager::{CacheStats, DEFAULT_CAPACITY_BYTES, ModelCache};
