//! Repository for the existing-media index and the pointer cache.
//!
//! Both tables are only ever replaced wholesale: a run reads a snapshot at the
//! start, decides everything against it, and writes its own complete result
//! at the end. Nothing is merged, so keys a run doesn't write are retired.

use crate::error::{ErrorKind, Result};
use crate::models::{CacheRecord, ExistingMediaIndex, ExistingRow, PointerCache, PointerRow, Snapshot};
use crate::{Database, IdentityKey};
use exn::ResultExt;
use sqlx::SqlitePool;
use strm_playlist::Category;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: false }
    }
}
impl Repository {
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Load both tables.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            existing: self.load_existing_media().await?,
            pointers: self.load_pointer_cache().await?,
        };
        tracing::debug!(
            existing = snapshot.existing.len(),
            pointers = snapshot.pointers.len(),
            "Loaded cache snapshot"
        );
        Ok(snapshot)
    }

    pub async fn load_existing_media(&self) -> Result<ExistingMediaIndex> {
        let rows: Vec<ExistingRow> = sqlx::query_as(include_str!("../queries/load_existing_media.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(<(IdentityKey, Category)>::try_from).collect()
    }

    pub async fn load_pointer_cache(&self) -> Result<PointerCache> {
        let rows: Vec<PointerRow> = sqlx::query_as(include_str!("../queries/load_pointer_cache.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(<(IdentityKey, CacheRecord)>::try_from).collect()
    }

    // =========================================================================
    // Replace
    // =========================================================================

    /// Replace the existing-media index in a single transaction.
    #[instrument(skip_all, fields(entries = index.len()))]
    pub async fn replace_existing_media(&self, index: &ExistingMediaIndex) -> Result<()> {
        if self.dry_run {
            tracing::info!(entries = index.len(), "Dry run: skipping existing media index replacement");
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_existing_media.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (key, category) in index {
            sqlx::query(include_str!("../queries/insert_existing_media.sql"))
                .bind(key.as_str())
                .bind(category.as_str())
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Replace the pointer cache in a single transaction. Keys missing from
    /// `cache` are gone afterwards.
    #[instrument(skip_all, fields(entries = cache.len()))]
    pub async fn replace_pointer_cache(&self, cache: &PointerCache) -> Result<()> {
        if self.dry_run {
            tracing::info!(entries = cache.len(), "Dry run: skipping pointer cache replacement");
            return Ok(());
        }
        // Convert first so a bad path can't leave a half-written transaction.
        let rows = cache.iter().map(PointerRow::try_from).collect::<Result<Vec<_>>>()?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_pointer_cache.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for row in rows {
            sqlx::query(include_str!("../queries/insert_pointer_cache.sql"))
                .bind(row.key)
                .bind(row.url)
                .bind(row.path)
                .bind(row.allowed)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }
}
