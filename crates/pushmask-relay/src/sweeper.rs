//! Background expiry sweeper.
//!
//! One long-lived task alternating between Idle (waiting out the interval)
//! and Running (one sweep pass). The delay-then-run loop re-arms only after
//! a pass finishes, so passes never overlap; cancellation interrupts a
//! pending delay immediately but lets an in-flight pass complete.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::storage::{DatabaseError, RelayDatabase, unix_timestamp};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Delay between sweep passes.
    pub interval: Duration,
    /// Registrations unused for longer than this are evicted.
    pub usage_ttl: Duration,
    /// Offloaded payloads older than this are reclaimed, read or not.
    pub large_message_ttl: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            usage_ttl: Duration::from_secs(30 * 24 * 3600),
            large_message_ttl: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

pub struct ExpirySweeper {
    db: RelayDatabase,
    config: SweeperConfig,
}

impl ExpirySweeper {
    pub const fn new(db: RelayDatabase, config: SweeperConfig) -> Self {
        Self { db, config }
    }

    /// Spawn the sweep loop. The task exits once `cancel` fires; callers
    /// join the returned handle during shutdown.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("expiry sweeper stopping");
                        break;
                    }
                    () = tokio::time::sleep(self.config.interval) => {
                        self.run_pass().await;
                    }
                }
            }
        })
    }

    /// One sweep pass. Each kind of work is error-isolated: a failing
    /// usage sweep must not block large-message reclamation, and no error
    /// escapes the pass.
    pub async fn run_pass(&self) {
        if let Err(e) = self.sweep_stale_registrations().await {
            warn!(error = %e, "stale registration sweep failed");
        }
        if let Err(e) = self.sweep_large_messages().await {
            warn!(error = %e, "large message sweep failed");
        }
    }

    /// Evict one page of registrations nothing has used within the TTL.
    ///
    /// At most 1000 ids per pass; a larger backlog drains over the next
    /// intervals, which bounds per-cycle sweep latency. An id without a
    /// matching endpoint row is not an error.
    #[allow(clippy::cast_possible_wrap)]
    async fn sweep_stale_registrations(&self) -> Result<(), DatabaseError> {
        let ids = self
            .db
            .stale_usage_ids(self.config.usage_ttl.as_secs() as i64)
            .await?;
        if ids.is_empty() {
            return Ok(());
        }

        let endpoints = self.db.delete_endpoints_by_ids(&ids).await?;
        let usages = self.db.delete_usage_ids(&ids).await?;
        info!(stale = ids.len(), endpoints, usages, "swept stale registrations");
        Ok(())
    }

    #[allow(clippy::cast_possible_wrap)]
    async fn sweep_large_messages(&self) -> Result<(), DatabaseError> {
        let cutoff = unix_timestamp() - self.config.large_message_ttl.as_secs() as i64;
        let removed = self.db.delete_large_messages_before(cutoff).await?;
        if removed > 0 {
            info!(removed, "swept expired large messages");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn test_db() -> RelayDatabase {
        RelayDatabase::open_in_memory().await.unwrap()
    }

    fn config() -> SweeperConfig {
        SweeperConfig {
            interval: Duration::from_millis(10),
            usage_ttl: Duration::from_secs(3600),
            large_message_ttl: Duration::from_secs(3600),
        }
    }

    async fn age_usage(db: &RelayDatabase, hash_id: &str, time_used: i64) {
        sqlx::query("UPDATE endpoint_usages SET time_used = ? WHERE hash_id = ?")
            .bind(time_used)
            .bind(hash_id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pass_evicts_stale_registration_and_usage() {
        let db = test_db().await;
        let mapping = db
            .upsert_endpoints(&["alice".to_string()], Some("https://push.example/a"), None)
            .await
            .unwrap();
        let hash_id = mapping.get("alice").unwrap().clone();
        db.touch_usage(&hash_id).await.unwrap();
        age_usage(&db, &hash_id, unix_timestamp() - 3601).await;

        ExpirySweeper::new(db.clone(), config()).run_pass().await;

        assert!(db.find_endpoint(&hash_id).await.unwrap().is_none());
        assert!(db.stale_usage_ids(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pass_keeps_registration_younger_than_ttl() {
        let db = test_db().await;
        let mapping = db
            .upsert_endpoints(&["alice".to_string()], Some("https://push.example/a"), None)
            .await
            .unwrap();
        let hash_id = mapping.get("alice").unwrap().clone();
        db.touch_usage(&hash_id).await.unwrap();
        // one second inside the ttl
        age_usage(&db, &hash_id, unix_timestamp() - 3599).await;

        ExpirySweeper::new(db.clone(), config()).run_pass().await;

        assert!(db.find_endpoint(&hash_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pass_tolerates_usage_without_endpoint() {
        let db = test_db().await;
        db.touch_usage("orphan").await.unwrap();
        age_usage(&db, "orphan", unix_timestamp() - 7200).await;

        ExpirySweeper::new(db.clone(), config()).run_pass().await;

        assert!(db.stale_usage_ids(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pass_reclaims_expired_large_messages() {
        let db = test_db().await;
        let old = db.create_large_message(b"old").await.unwrap();
        let fresh = db.create_large_message(b"fresh").await.unwrap();
        sqlx::query("UPDATE large_messages SET time_created = ? WHERE id = ?")
            .bind(unix_timestamp() - 7200)
            .bind(&old)
            .execute(db.pool())
            .await
            .unwrap();

        ExpirySweeper::new(db.clone(), config()).run_pass().await;

        assert!(db.find_large_message(&old).await.unwrap().is_none());
        assert!(db.find_large_message(&fresh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let db = test_db().await;
        let cancel = CancellationToken::new();
        let handle = ExpirySweeper::new(db, config()).spawn(cancel.clone());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop after cancellation")
            .unwrap();
    }
}
