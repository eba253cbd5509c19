//! Usage timestamp queries.
//!
//! Usage rows are written on every registration and every successful relay;
//! the sweeper reads them to find registrations nothing has touched within
//! the TTL. A missing usage row never blocks a relay, it only makes the
//! endpoint a future eviction candidate.

use super::BATCH_SIZE;
use super::db::{DatabaseError, RelayDatabase, unix_timestamp};

impl RelayDatabase {
    /// Stamp one endpoint as used now (insert or update).
    pub async fn touch_usage(&self, hash_id: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO endpoint_usages (hash_id, time_used) VALUES (?, ?) \
             ON CONFLICT(hash_id) DO UPDATE SET time_used = excluded.time_used",
        )
        .bind(hash_id)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Stamp many endpoints as used now.
    ///
    /// Processed in chunks of at most 1000 ids per statement to bound query
    /// size; chunks are sequential, not atomic as a whole.
    pub async fn touch_usage_many(&self, ids: &[String]) -> Result<(), DatabaseError> {
        let now = unix_timestamp();
        for chunk in ids.chunks(BATCH_SIZE) {
            let placeholders = vec!["(?, ?)"; chunk.len()].join(", ");
            let sql = format!(
                "INSERT INTO endpoint_usages (hash_id, time_used) VALUES {placeholders} \
                 ON CONFLICT(hash_id) DO UPDATE SET time_used = excluded.time_used"
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id).bind(now);
            }
            query.execute(self.pool()).await?;
        }
        Ok(())
    }

    /// One page (at most 1000) of ids not used within `ttl_secs`.
    ///
    /// Callers drain a larger backlog by looping until this returns empty.
    pub async fn stale_usage_ids(&self, ttl_secs: i64) -> Result<Vec<String>, DatabaseError> {
        let cutoff = unix_timestamp() - ttl_secs;
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT hash_id FROM endpoint_usages WHERE time_used < ? LIMIT 1000",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Bulk delete usage rows by hash id.
    pub async fn delete_usage_ids(&self, ids: &[String]) -> Result<u64, DatabaseError> {
        let mut total = 0;
        for chunk in ids.chunks(BATCH_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM endpoint_usages WHERE hash_id IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            total += query.execute(self.pool()).await?.rows_affected();
        }
        Ok(total)
    }
}
