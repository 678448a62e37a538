//! HTTP client for the model share service.
//!
//! Talks to the server-side API described at the interface boundary only:
//! model metadata lookup by share token, then per-file downloads of the
//! geometry, material, and texture payloads. The asset cache itself never
//! calls this API; callers fetch a bundle here and then `save` it.

use std::collections::HashMap;
use std::time::Instant;

use bytes::Bytes;
use modelview_core::ModelCache;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use url::Url;

use crate::error::ClientError;
use crate::mtl;

/// Configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the share service (default: "http://localhost:8080")
    pub base_url: String,

    /// User agent string (default: "modelview/0.1")
    pub user_agent: String,

    /// Maximum bytes per downloaded file (default: 50MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: std::time::Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            user_agent: "modelview/0.1".to_string(),
            max_bytes: 50 * 1024 * 1024,
            timeout: std::time::Duration::from_millis(20_000),
        }
    }
}

/// Model metadata returned by the share service.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelMeta {
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub share_token: String,
    /// JSON-encoded string holding the relative file paths (the service
    /// double-encodes this field).
    pub file_paths: String,
}

/// Relative asset paths decoded from [`ModelMeta::file_paths`].
#[derive(Debug, Clone, Deserialize)]
pub struct FilePaths {
    pub obj_path: String,
    pub mtl_path: String,
    #[serde(default)]
    pub texture_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelEnvelope {
    status: String,
    #[serde(default)]
    model: Option<ModelMeta>,
    #[serde(default)]
    message: Option<String>,
}

/// A fully downloaded model bundle, ready to be cached.
#[derive(Debug, Clone)]
pub struct FetchedBundle {
    pub meta: ModelMeta,
    pub geometry: Bytes,
    pub material: Bytes,
    pub textures: HashMap<String, Bytes>,
}

impl FetchedBundle {
    /// Total payload size in bytes.
    pub fn size_bytes(&self) -> u64 {
        let texture_bytes: u64 = self.textures.values().map(|t| t.len() as u64).sum();
        self.geometry.len() as u64 + self.material.len() as u64 + texture_bytes
    }
}

/// Anything that can produce a model bundle for a share token.
///
/// Lets consumers swap the HTTP client for a stub in tests.
#[async_trait::async_trait]
pub trait BundleSource {
    async fn fetch_bundle(&self, token: &str) -> Result<FetchedBundle, ClientError>;
}

/// HTTP client for the share service.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    config: ApiConfig,
}

impl ApiClient {
    /// Create a new API client with the given configuration.
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ClientError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url, config })
    }

    /// Fetch model metadata by share token.
    pub async fn get_model(&self, token: &str) -> Result<ModelMeta, ClientError> {
        let url = self
            .base_url
            .join("php/api_get_model.php")
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .get(url)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("network error: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(token.to_string()));
        }
        if !response.status().is_success() {
            return Err(ClientError::Http(format!("status {}", response.status().as_u16())));
        }

        let envelope: ModelEnvelope = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("invalid metadata response: {}", e)))?;

        if envelope.status != "success" {
            let message = envelope.message.unwrap_or_else(|| "unknown error".to_string());
            return Err(ClientError::Http(message));
        }

        envelope
            .model
            .ok_or_else(|| ClientError::Decode("success response without model".to_string()))
    }

    /// Download one asset file by its service-relative path.
    pub async fn download_file(&self, path: &str) -> Result<Bytes, ClientError> {
        let url = self
            .base_url
            .join(&format!("files/{}", path))
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("network error: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClientError::Http(format!("status {} for {}", response.status().as_u16(), url)));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(ClientError::TooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Http(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(ClientError::TooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(%url, ?content_type, size = bytes.len(), "downloaded asset file");

        Ok(bytes)
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl BundleSource for ApiClient {
    /// Download the full bundle for a share token.
    ///
    /// Fetches the metadata, decodes the file-path listing, and downloads
    /// geometry, material, and every texture. Textures referenced by the
    /// material but absent from the listing are logged, not fatal - some
    /// models ship with incomplete texture sets.
    async fn fetch_bundle(&self, token: &str) -> Result<FetchedBundle, ClientError> {
        let start = Instant::now();
        let meta = self.get_model(token).await?;

        let paths: FilePaths = serde_json::from_str(&meta.file_paths)
            .map_err(|e| ClientError::Decode(format!("invalid file_paths: {}", e)))?;

        let geometry = self.download_file(&paths.obj_path).await?;
        let material = self.download_file(&paths.mtl_path).await?;

        let mut textures = HashMap::new();
        for path in &paths.texture_paths {
            let filename = path.rsplit('/').next().unwrap_or(path).to_string();
            let data = self.download_file(path).await?;
            textures.insert(filename, data);
        }

        for reference in mtl::texture_refs(&String::from_utf8_lossy(&material)) {
            if !textures.contains_key(&reference) {
                tracing::warn!(token, texture = %reference, "material references a texture the service did not list");
            }
        }

        let bundle = FetchedBundle { meta, geometry, material, textures };
        tracing::debug!(
            token,
            size_bytes = bundle.size_bytes(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched bundle"
        );

        Ok(bundle)
    }
}

/// Fetch a bundle and store it in the asset cache.
///
/// Returns the cached payload size in bytes. The save triggers the cache's
/// detached eviction sweep as usual.
pub async fn fetch_and_cache(
    source: &impl BundleSource, cache: &ModelCache, token: &str,
) -> Result<u64, ClientError> {
    let bundle = source.fetch_bundle(token).await?;
    let size = bundle.size_bytes();

    let textures = bundle
        .textures
        .into_iter()
        .map(|(name, data)| (name, data.to_vec()))
        .collect();
    cache
        .save(token, bundle.geometry.to_vec(), bundle.material.to_vec(), textures)
        .await?;

    Ok(size)
}
