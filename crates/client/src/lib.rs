//! Client code for modelview.
//!
//! This crate fetches model bundles (geometry, material, textures) from the
//! share service's HTTP API so callers can populate the asset cache after a
//! successful download.

pub mod api;
pub mod error;
pub mod mtl;

pub use api::{ApiClient, ApiConfig, BundleSource, FetchedBundle, ModelMeta, fetch_and_cache};
pub use error::ClientError;
pub use mtl::texture_refs;
