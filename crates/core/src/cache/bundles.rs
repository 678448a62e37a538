//! Bundle CRUD operations.
//!
//! Provides store-level operations for cached model bundles: point get and
//! upsert by share token, recency touch, delete, and the recency-ordered
//! scan the eviction sweep runs on.

use std::collections::HashMap;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached model bundle.
///
/// One downloaded 3D model: serialized geometry, material definitions, and
/// texture payloads keyed by their original filenames. `size_bytes` is the
/// exact byte length of all three payload fields, recomputed at every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub token: String,
    pub geometry: Vec<u8>,
    pub material: Vec<u8>,
    pub textures: HashMap<String, Vec<u8>>,
    /// Recency marker, wall-clock milliseconds. Set at creation and bumped
    /// on every cache hit, never read from caller-supplied data.
    pub last_access: i64,
    pub size_bytes: u64,
}

impl Bundle {
    /// Build a bundle for storage, computing `size_bytes` from the payloads.
    pub fn new(
        token: impl Into<String>, geometry: Vec<u8>, material: Vec<u8>, textures: HashMap<String, Vec<u8>>,
        last_access: i64,
    ) -> Self {
        let size_bytes = payload_size(&geometry, &material, &textures);
        Self { token: token.into(), geometry, material, textures, last_access, size_bytes }
    }
}

/// Byte length of geometry + material + every texture payload.
pub fn payload_size(geometry: &[u8], material: &[u8], textures: &HashMap<String, Vec<u8>>) -> u64 {
    let texture_bytes: u64 = textures.values().map(|t| t.len() as u64).sum();
    geometry.len() as u64 + material.len() as u64 + texture_bytes
}

/// One row of the eviction sweep's snapshot: token, size, and recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStat {
    pub token: String,
    pub size_bytes: u64,
    pub last_access: i64,
}

impl CacheDb {
    /// Insert or update a cached bundle.
    ///
    /// Uses UPSERT semantics: inserts if the token doesn't exist, replaces
    /// the full payload if it does (textures included). The bundle row and
    /// its texture rows are written in one transaction, so a failed put
    /// leaves any prior entry for the token unchanged.
    pub async fn put_bundle(&self, bundle: &Bundle) -> Result<(), Error> {
        let bundle = bundle.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO bundles (token, geometry, material, last_access, size_bytes)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(token) DO UPDATE SET
                        geometry = excluded.geometry,
                        material = excluded.material,
                        last_access = excluded.last_access,
                        size_bytes = excluded.size_bytes",
                    params![
                        &bundle.token,
                        &bundle.geometry,
                        &bundle.material,
                        bundle.last_access,
                        bundle.size_bytes as i64,
                    ],
                )?;
                tx.execute("DELETE FROM bundle_textures WHERE token = ?1", params![&bundle.token])?;
                {
                    let mut stmt =
                        tx.prepare("INSERT INTO bundle_textures (token, filename, data) VALUES (?1, ?2, ?3)")?;
                    for (filename, data) in &bundle.textures {
                        stmt.execute(params![&bundle.token, filename, data])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get a bundle by share token.
    ///
    /// Returns None if the token doesn't exist in the cache.
    pub async fn get_bundle(&self, token: &str) -> Result<Option<Bundle>, Error> {
        let token = token.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Bundle>, Error> {
                let result = conn.query_row(
                    "SELECT token, geometry, material, last_access, size_bytes FROM bundles WHERE token = ?1",
                    params![token],
                    |row| {
                        Ok(Bundle {
                            token: row.get(0)?,
                            geometry: row.get(1)?,
                            material: row.get(2)?,
                            textures: HashMap::new(),
                            last_access: row.get(3)?,
                            size_bytes: row.get::<_, i64>(4)? as u64,
                        })
                    },
                );

                let mut bundle = match result {
                    Ok(b) => b,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let mut stmt = conn.prepare("SELECT filename, data FROM bundle_textures WHERE token = ?1")?;
                let rows = stmt.query_map(params![&bundle.token], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                for row in rows {
                    let (filename, data) = row?;
                    bundle.textures.insert(filename, data);
                }

                Ok(Some(bundle))
            })
            .await
            .map_err(Error::from)
    }

    /// Bump a bundle's recency timestamp without touching its payload.
    ///
    /// A no-op if the token doesn't exist.
    pub async fn touch_bundle(&self, token: &str, now_ms: i64) -> Result<(), Error> {
        let token = token.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE bundles SET last_access = ?2 WHERE token = ?1",
                    params![token, now_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bundle by token.
    ///
    /// Returns true if a row was removed; absence is a no-op, not an error.
    pub async fn delete_bundle(&self, token: &str) -> Result<bool, Error> {
        let token = token.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM bundles WHERE token = ?1", params![token])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Scan all bundles ascending by recency (oldest first).
    ///
    /// This is the snapshot the eviction sweep walks. Ties in `last_access`
    /// fall back to SQLite's scan order.
    pub async fn scan_by_recency(&self) -> Result<Vec<BundleStat>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<BundleStat>, Error> {
                let mut stmt =
                    conn.prepare("SELECT token, size_bytes, last_access FROM bundles ORDER BY last_access ASC")?;
                let rows = stmt.query_map([], |row| {
                    Ok(BundleStat {
                        token: row.get(0)?,
                        size_bytes: row.get::<_, i64>(1)? as u64,
                        last_access: row.get(2)?,
                    })
                })?;

                let mut stats = Vec::new();
                for row in rows {
                    stats.push(row?);
                }
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }

    /// Sum of `size_bytes` over all live bundles.
    pub async fn total_size(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let total: i64 =
                    conn.query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM bundles", [], |row| row.get(0))?;
                Ok(total as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of live bundles.
    pub async fn count_bundles(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM bundles", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove all bundles unconditionally.
    pub async fn clear_bundles(&self) -> Result<(), Error> {
        self.conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM bundles", [])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
