//! Endpoint registration queries.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::BATCH_SIZE;
use super::db::{DatabaseError, RelayDatabase};
use super::models::Endpoint;

/// Derive the endpoint identifier for an `(acct_hash, destination)` triple.
///
/// SHA-256 over the UTF-8 string `"{acct_hash},{up_url},{fcm_token}"` with
/// absent fields as empty strings, URL-safe base64 without padding. Pure and
/// salt-free, so the same triple hashes identically across restarts and
/// registration stays idempotent.
pub fn endpoint_hash_id(acct_hash: &str, up_url: Option<&str>, fcm_token: Option<&str>) -> String {
    let input = format!(
        "{acct_hash},{},{}",
        up_url.unwrap_or(""),
        fcm_token.unwrap_or("")
    );
    URL_SAFE_NO_PAD.encode(Sha256::digest(input.as_bytes()))
}

impl RelayDatabase {
    /// Register every account hash in `acct_hashes` against one destination.
    ///
    /// Each row is inserted independently with `ON CONFLICT DO NOTHING`, so
    /// repeated or concurrent registrations of the same triple settle on a
    /// single row. The returned mapping covers all inputs whether or not the
    /// row was new. Destination validation (exactly one field) happens at
    /// the boundary; the table CHECK constraint backstops it.
    pub async fn upsert_endpoints(
        &self,
        acct_hashes: &[String],
        up_url: Option<&str>,
        fcm_token: Option<&str>,
    ) -> Result<BTreeMap<String, String>, DatabaseError> {
        let mut mapping = BTreeMap::new();
        for acct_hash in acct_hashes {
            let hash_id = endpoint_hash_id(acct_hash, up_url, fcm_token);
            sqlx::query(
                "INSERT INTO endpoints (hash_id, acct_hash, up_url, fcm_token) \
                 VALUES (?, ?, ?, ?) \
                 ON CONFLICT(hash_id) DO NOTHING",
            )
            .bind(&hash_id)
            .bind(acct_hash)
            .bind(up_url)
            .bind(fcm_token)
            .execute(self.pool())
            .await?;
            mapping.insert(acct_hash.clone(), hash_id);
        }
        Ok(mapping)
    }

    /// Look up an endpoint by its hash id.
    pub async fn find_endpoint(&self, hash_id: &str) -> Result<Option<Endpoint>, DatabaseError> {
        let endpoint =
            sqlx::query_as::<_, Endpoint>("SELECT * FROM endpoints WHERE hash_id = ?")
                .bind(hash_id)
                .fetch_optional(self.pool())
                .await?;

        Ok(endpoint)
    }

    /// Delete all registrations for one destination pair.
    ///
    /// `IS` comparison so an absent field only matches rows where it is NULL.
    pub async fn delete_endpoints_by_destination(
        &self,
        up_url: Option<&str>,
        fcm_token: Option<&str>,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM endpoints WHERE up_url IS ? AND fcm_token IS ?")
            .bind(up_url)
            .bind(fcm_token)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete one registration by primary key.
    pub async fn delete_endpoint_by_hash_id(&self, hash_id: &str) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM endpoints WHERE hash_id = ?")
            .bind(hash_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Bulk delete by hash id, used by the expiry sweeper.
    pub async fn delete_endpoints_by_ids(&self, ids: &[String]) -> Result<u64, DatabaseError> {
        let mut total = 0;
        for chunk in ids.chunks(BATCH_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("DELETE FROM endpoints WHERE hash_id IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            total += query.execute(self.pool()).await?.rows_affected();
        }
        Ok(total)
    }
}
