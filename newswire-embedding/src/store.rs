//! SQLite cache for title embeddings using rusqlite

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use crate::{
    error::{EmbeddingError, Result},
    similarity::normalize_title,
    types::EmbeddingVector,
};

/// SQLite cache of title embeddings, keyed by model and normalized title
#[derive(Clone)]
pub struct FingerprintCache {
    conn: Arc<Mutex<Connection>>,
}

impl FingerprintCache {
    /// Open (or create) a cache database file
    #[instrument(skip(database_path))]
    pub fn new<P: AsRef<Path> + std::fmt::Debug>(database_path: P) -> Result<Self> {
        info!("Opening fingerprint cache: {:?}", database_path.as_ref());

        if let Some(parent) = database_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EmbeddingError::Database(format!("Failed to create cache directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(database_path.as_ref()).map_err(|e| {
            EmbeddingError::Database(format!("Failed to open database: {}", e))
        })?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        cache.init_tables()?;
        Ok(cache)
    }

    /// Create an in-memory cache
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EmbeddingError::Database(format!("Failed to create in-memory DB: {}", e)))?;

        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        cache.init_tables()?;
        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| EmbeddingError::Database("fingerprint cache lock poisoned".to_string()))
    }

    /// Initialize database tables
    fn init_tables(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS title_embeddings (
                cache_key TEXT PRIMARY KEY,
                model TEXT NOT NULL,
                title TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| EmbeddingError::Database(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_title_embeddings_created
             ON title_embeddings(created_at)",
            [],
        )
        .map_err(|e| EmbeddingError::Database(e.to_string()))?;

        debug!("Fingerprint cache tables initialized");
        Ok(())
    }

    /// Cache key: SHA256 of model and normalized title
    pub fn cache_key(model: &str, title: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update(b"\n");
        hasher.update(normalize_title(title).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a cached embedding
    pub fn get(&self, model: &str, title: &str) -> Result<Option<EmbeddingVector>> {
        let key = Self::cache_key(model, title);
        let conn = self.lock()?;

        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM title_embeddings WHERE cache_key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| EmbeddingError::Database(e.to_string()))?;

        match bytes {
            Some(bytes) => {
                let (embedding, _): (EmbeddingVector, usize) =
                    bincode::decode_from_slice(&bytes, bincode::config::standard())?;
                Ok(Some(embedding))
            }
            None => Ok(None),
        }
    }

    /// Look up several titles at once, preserving input order
    pub fn get_many(&self, model: &str, titles: &[&str]) -> Result<Vec<Option<EmbeddingVector>>> {
        titles.iter().map(|title| self.get(model, title)).collect()
    }

    /// Save or replace an embedding
    pub fn put(&self, model: &str, title: &str, embedding: &[f32]) -> Result<()> {
        self.put_at(model, title, embedding, Utc::now())
    }

    /// Save or replace an embedding with an explicit creation time
    pub fn put_at(
        &self,
        model: &str,
        title: &str,
        embedding: &[f32],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let key = Self::cache_key(model, title);
        let bytes = bincode::encode_to_vec(embedding, bincode::config::standard())?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO title_embeddings
             (cache_key, model, title, embedding, dimension, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(cache_key) DO UPDATE SET
                embedding = excluded.embedding,
                dimension = excluded.dimension,
                created_at = excluded.created_at",
            params![
                &key,
                model,
                title,
                &bytes,
                embedding.len() as i64,
                created_at.timestamp(),
            ],
        )
        .map_err(|e| EmbeddingError::Database(e.to_string()))?;

        Ok(())
    }

    /// Drop entries older than `days`
    #[instrument(skip(self))]
    pub fn prune_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).timestamp();
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM title_embeddings WHERE created_at < ?",
                params![cutoff],
            )
            .map_err(|e| EmbeddingError::Database(e.to_string()))?;

        if deleted > 0 {
            info!("Pruned {} cached title embeddings", deleted);
        }

        Ok(deleted)
    }

    /// Number of cached embeddings
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM title_embeddings", [], |row| row.get(0))
            .map_err(|e| EmbeddingError::Database(e.to_string()))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_cache() -> FingerprintCache {
        FingerprintCache::new_in_memory().expect("Failed to create test cache")
    }

    #[test]
    fn test_put_and_get() {
        let cache = create_test_cache();
        cache
            .put("model-a", "PM announces new policy", &[0.25, 0.5, 0.75])
            .unwrap();

        let loaded = cache.get("model-a", "PM announces new policy").unwrap();
        assert_eq!(loaded, Some(vec![0.25, 0.5, 0.75]));
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn test_key_uses_normalized_title_and_model() {
        let cache = create_test_cache();
        cache.put("model-a", "PM announces new policy", &[1.0]).unwrap();

        assert!(cache.get("model-a", "  pm ANNOUNCES new policy").unwrap().is_some());
        assert!(cache.get("model-b", "PM announces new policy").unwrap().is_none());
    }

    #[test]
    fn test_get_many_preserves_order() {
        let cache = create_test_cache();
        cache.put("m", "first", &[1.0]).unwrap();
        cache.put("m", "third", &[3.0]).unwrap();

        let loaded = cache.get_many("m", &["first", "second", "third"]).unwrap();
        assert_eq!(loaded, vec![Some(vec![1.0]), None, Some(vec![3.0])]);
    }

    #[test]
    fn test_put_replaces() {
        let cache = create_test_cache();
        cache.put("m", "title", &[1.0]).unwrap();
        cache.put("m", "title", &[2.0]).unwrap();

        assert_eq!(cache.get("m", "title").unwrap(), Some(vec![2.0]));
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn test_prune_keeps_fresh_entries() {
        let cache = create_test_cache();
        cache.put("m", "title", &[1.0]).unwrap();
        assert_eq!(cache.prune_older_than(1).unwrap(), 0);
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn test_file_backed_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("fingerprints.db");

        {
            let cache = FingerprintCache::new(&path).unwrap();
            cache.put("m", "title", &[0.5]).unwrap();
        }

        let cache = FingerprintCache::new(&path).unwrap();
        assert_eq!(cache.get("m", "title").unwrap(), Some(vec![0.5]));
    }
}
