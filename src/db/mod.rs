//! Persistence for the episodes index.
//!
//! The index lives as one JSON document under one key. `repo` holds the
//! SQL-only functions; [`KvStore`] is the seam the service talks to, so
//! tests and other backends only need `get` and `put`.

pub mod repo;

pub use repo::*;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// [`KvStore`] backed by the `kv` table of a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: Pool,
}

impl SqliteKvStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        kv_get(&self.pool, key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        kv_put(&self.pool, key, value).await
    }
}
