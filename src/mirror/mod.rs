//! SQLite mirror of the vector index.
//!
//! Holds the point-to-work-type mapping used for tombstone detection and
//! the recomputed per-museum statistics. Never authoritative: everything
//! in here can be rebuilt from the index.

pub mod models;

#[cfg(test)]
mod tests;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::debug;

use crate::{Result, SyncError};
use models::{MappingRow, NewMapping, StatisticEntry, StatisticRow};

pub type DbPool = Pool<Sqlite>;

/// SQL `IN` lists are chunked to stay clear of SQLite's bind limit.
const DELETE_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct MirrorStore {
    pool: DbPool,
}

impl MirrorStore {
    pub async fn connect<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        if let Some(parent) = database_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to connect: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to run migrations: {}", e)))?;

        debug!("Mirror database ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Insert or refresh the mapping row for one point.
    pub async fn upsert_mapping(&self, mapping: &NewMapping) -> Result<()> {
        let work_types = serde_json::to_string(&mapping.work_types)
            .map_err(|e| SyncError::MirrorWrite(format!("failed to encode work types: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO artwork_work_type_mapping
                (point_id, museum, object_number, work_types, last_updated)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (point_id) DO UPDATE SET
                museum = excluded.museum,
                object_number = excluded.object_number,
                work_types = excluded.work_types,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&mapping.point_id)
        .bind(&mapping.museum)
        .bind(&mapping.object_number)
        .bind(&work_types)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::MirrorWrite(format!("failed to upsert mapping: {}", e)))?;

        Ok(())
    }

    pub async fn mappings_for_museum(&self, museum: &str) -> Result<Vec<MappingRow>> {
        sqlx::query_as::<_, MappingRow>(
            r#"
            SELECT point_id, museum, object_number, work_types, last_updated
            FROM artwork_work_type_mapping
            WHERE museum = ?
            ORDER BY point_id
            "#,
        )
        .bind(museum)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::MirrorWrite(format!("failed to load mappings: {}", e)))
    }

    pub async fn mapping_ids_for_museum(&self, museum: &str) -> Result<Vec<String>> {
        let ids: Vec<(String,)> = sqlx::query_as(
            "SELECT point_id FROM artwork_work_type_mapping WHERE museum = ? ORDER BY point_id",
        )
        .bind(museum)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::MirrorWrite(format!("failed to load mapping ids: {}", e)))?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Delete mapping rows by point id inside a single transaction.
    pub async fn delete_mappings(&self, point_ids: &[String]) -> Result<u64> {
        if point_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to begin transaction: {}", e)))?;

        let mut deleted = 0;
        for chunk in point_ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM artwork_work_type_mapping WHERE point_id IN ({})",
                placeholders
            );

            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }

            let result = query.execute(&mut *tx).await.map_err(|e| {
                SyncError::MirrorWrite(format!("failed to delete mappings: {}", e))
            })?;
            deleted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to commit deletion: {}", e)))?;

        debug!("Deleted {} mapping rows", deleted);
        Ok(deleted)
    }

    /// Atomically replace the statistics for one museum. Readers observe
    /// either the previous complete set or the new one, never a mix.
    pub async fn replace_statistics(
        &self,
        museum: &str,
        entries: &[StatisticEntry],
    ) -> Result<()> {
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM artwork_statistics WHERE museum = ?")
            .bind(museum)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                SyncError::MirrorWrite(format!("failed to clear old statistics: {}", e))
            })?;

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO artwork_statistics (museum, work_type, count, last_updated)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(museum)
            .bind(&entry.work_type)
            .bind(entry.count)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to insert statistic: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| SyncError::MirrorWrite(format!("failed to commit statistics: {}", e)))?;

        debug!("Replaced statistics for '{}'", museum);
        Ok(())
    }

    /// Current statistics, optionally narrowed to one museum. The
    /// museum-wide total row (NULL work type) sorts first within each
    /// museum.
    pub async fn statistics(&self, museum: Option<&str>) -> Result<Vec<StatisticRow>> {
        let rows = match museum {
            Some(museum) => {
                sqlx::query_as::<_, StatisticRow>(
                    r#"
                    SELECT museum, work_type, count, last_updated
                    FROM artwork_statistics
                    WHERE museum = ?
                    ORDER BY work_type
                    "#,
                )
                .bind(museum)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, StatisticRow>(
                    r#"
                    SELECT museum, work_type, count, last_updated
                    FROM artwork_statistics
                    ORDER BY museum, work_type
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
        };

        rows.map_err(|e| SyncError::MirrorWrite(format!("failed to load statistics: {}", e)))
    }
}
