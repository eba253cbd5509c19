//! Offloaded large message queries.

use uuid::Uuid;

use super::db::{DatabaseError, RelayDatabase, unix_timestamp};
use super::models::LargeMessage;

impl RelayDatabase {
    /// Store an oversized payload and return its generated id.
    pub async fn create_large_message(&self, payload: &[u8]) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO large_messages (id, time_created, payload) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(unix_timestamp())
            .bind(payload)
            .execute(self.pool())
            .await?;

        Ok(id)
    }

    /// Exact lookup by id.
    pub async fn find_large_message(
        &self,
        id: &str,
    ) -> Result<Option<LargeMessage>, DatabaseError> {
        let message =
            sqlx::query_as::<_, LargeMessage>("SELECT * FROM large_messages WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;

        Ok(message)
    }

    /// Delete messages created before `cutoff`, read or not.
    pub async fn delete_large_messages_before(&self, cutoff: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM large_messages WHERE time_created < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
