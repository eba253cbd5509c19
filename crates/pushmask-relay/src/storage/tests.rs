//! Storage layer tests for the pushmask relay.

#![allow(clippy::unwrap_used)]

use super::db::{RelayDatabase, unix_timestamp};
use super::queries_endpoints::endpoint_hash_id;

async fn test_db() -> RelayDatabase {
    RelayDatabase::open_in_memory().await.unwrap()
}

async fn count(db: &RelayDatabase, sql: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(sql).fetch_one(db.pool()).await.unwrap();
    row.0
}

fn acct(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

// === Hash tests ===

#[test]
fn hash_is_deterministic() {
    let a = endpoint_hash_id("alice", Some("https://push.example/abc"), None);
    let b = endpoint_hash_id("alice", Some("https://push.example/abc"), None);
    assert_eq!(a, b);
    // 256-bit digest, url-safe base64 without padding
    assert_eq!(a.len(), 43);
    assert!(!a.contains(['+', '/', '=']));
}

#[test]
fn hash_differs_by_any_field() {
    let base = endpoint_hash_id("alice", Some("https://push.example/abc"), None);
    assert_ne!(base, endpoint_hash_id("bob", Some("https://push.example/abc"), None));
    assert_ne!(base, endpoint_hash_id("alice", Some("https://push.example/xyz"), None));
    assert_ne!(base, endpoint_hash_id("alice", None, Some("https://push.example/abc")));
}

// === Endpoint tests ===

#[tokio::test]
async fn upsert_registers_and_finds() {
    let db = test_db().await;

    let mapping = db
        .upsert_endpoints(&acct(&["alice"]), Some("https://push.example/abc"), None)
        .await
        .unwrap();
    let hash_id = mapping.get("alice").unwrap();

    let endpoint = db.find_endpoint(hash_id).await.unwrap().unwrap();
    assert_eq!(endpoint.acct_hash, "alice");
    assert_eq!(endpoint.up_url.as_deref(), Some("https://push.example/abc"));
    assert!(endpoint.fcm_token.is_none());
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let db = test_db().await;

    let first = db
        .upsert_endpoints(&acct(&["alice"]), Some("https://push.example/abc"), None)
        .await
        .unwrap();
    let second = db
        .upsert_endpoints(&acct(&["alice"]), Some("https://push.example/abc"), None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoints").await, 1);
}

#[tokio::test]
async fn upsert_maps_every_account_hash() {
    let db = test_db().await;

    let mapping = db
        .upsert_endpoints(&acct(&["a1", "a2", "a3"]), None, Some("token-1"))
        .await
        .unwrap();

    assert_eq!(mapping.len(), 3);
    for (acct_hash, hash_id) in &mapping {
        assert_eq!(*hash_id, endpoint_hash_id(acct_hash, None, Some("token-1")));
        assert!(db.find_endpoint(hash_id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn destination_is_mutually_exclusive() {
    let db = test_db().await;

    // both set and neither set violate the table CHECK
    for (up, fcm) in [(Some("u"), Some("t")), (None, None)] {
        let result = sqlx::query(
            "INSERT INTO endpoints (hash_id, acct_hash, up_url, fcm_token) VALUES (?, ?, ?, ?)",
        )
        .bind("h")
        .bind("a")
        .bind(up)
        .bind(fcm)
        .execute(db.pool())
        .await;
        assert!(result.is_err());
    }
}

#[tokio::test]
async fn find_unknown_endpoint_is_none() {
    let db = test_db().await;
    assert!(db.find_endpoint("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_by_destination_matches_nulls_exactly() {
    let db = test_db().await;

    db.upsert_endpoints(&acct(&["a1", "a2"]), Some("https://push.example/abc"), None)
        .await
        .unwrap();
    db.upsert_endpoints(&acct(&["a1"]), None, Some("token-1"))
        .await
        .unwrap();

    // deleting the fcm destination must not touch the up rows
    let removed = db
        .delete_endpoints_by_destination(None, Some("token-1"))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoints").await, 2);

    let removed = db
        .delete_endpoints_by_destination(Some("https://push.example/abc"), None)
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoints").await, 0);
}

#[tokio::test]
async fn delete_by_hash_id() {
    let db = test_db().await;

    let mapping = db
        .upsert_endpoints(&acct(&["alice"]), Some("https://push.example/abc"), None)
        .await
        .unwrap();
    let hash_id = mapping.get("alice").unwrap();

    assert_eq!(db.delete_endpoint_by_hash_id(hash_id).await.unwrap(), 1);
    assert_eq!(db.delete_endpoint_by_hash_id(hash_id).await.unwrap(), 0);
}

#[tokio::test]
async fn delete_by_ids_bulk() {
    let db = test_db().await;

    let mapping = db
        .upsert_endpoints(&acct(&["a1", "a2", "a3"]), None, Some("token-1"))
        .await
        .unwrap();
    let ids: Vec<String> = mapping.values().cloned().collect();

    assert_eq!(db.delete_endpoints_by_ids(&ids[..2]).await.unwrap(), 2);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoints").await, 1);
    assert_eq!(db.delete_endpoints_by_ids(&[]).await.unwrap(), 0);
}

// === Usage tests ===

#[tokio::test]
async fn touch_inserts_then_updates() {
    let db = test_db().await;

    db.touch_usage("h1").await.unwrap();
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoint_usages").await, 1);

    // age the row, then touch again and verify it was refreshed
    sqlx::query("UPDATE endpoint_usages SET time_used = 1000 WHERE hash_id = 'h1'")
        .execute(db.pool())
        .await
        .unwrap();
    db.touch_usage("h1").await.unwrap();

    let (time_used,): (i64,) =
        sqlx::query_as("SELECT time_used FROM endpoint_usages WHERE hash_id = 'h1'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert!(time_used >= unix_timestamp() - 5);
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoint_usages").await, 1);
}

#[tokio::test]
async fn touch_many_spans_chunk_boundaries() {
    let db = test_db().await;

    let ids: Vec<String> = (0..2500).map(|i| format!("id-{i:04}")).collect();
    db.touch_usage_many(&ids).await.unwrap();
    assert_eq!(count(&db, "SELECT COUNT(*) FROM endpoint_usages").await, 2500);

    // age everything, touch again, verify rows in every chunk were refreshed
    sqlx::query("UPDATE endpoint_usages SET time_used = 1000")
        .execute(db.pool())
        .await
        .unwrap();
    db.touch_usage_many(&ids).await.unwrap();

    let stale = count(&db, "SELECT COUNT(*) FROM endpoint_usages WHERE time_used = 1000").await;
    assert_eq!(stale, 0);
}

#[tokio::test]
async fn stale_ids_respects_ttl_and_page_limit() {
    let db = test_db().await;

    let ids: Vec<String> = (0..1200).map(|i| format!("id-{i:04}")).collect();
    db.touch_usage_many(&ids).await.unwrap();

    // nothing stale yet
    assert!(db.stale_usage_ids(3600).await.unwrap().is_empty());

    // age all rows past the ttl; a single call returns one page of 1000
    sqlx::query("UPDATE endpoint_usages SET time_used = time_used - 7200")
        .execute(db.pool())
        .await
        .unwrap();
    let page = db.stale_usage_ids(3600).await.unwrap();
    assert_eq!(page.len(), 1000);

    let removed = db.delete_usage_ids(&page).await.unwrap();
    assert_eq!(removed, 1000);
    assert_eq!(db.stale_usage_ids(3600).await.unwrap().len(), 200);
}

#[tokio::test]
async fn one_second_younger_than_cutoff_is_not_stale() {
    let db = test_db().await;
    let ttl = 3600;

    db.touch_usage("young").await.unwrap();
    db.touch_usage("old").await.unwrap();

    let cutoff = unix_timestamp() - ttl;
    sqlx::query("UPDATE endpoint_usages SET time_used = ? WHERE hash_id = 'young'")
        .bind(cutoff + 1)
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("UPDATE endpoint_usages SET time_used = ? WHERE hash_id = 'old'")
        .bind(cutoff - 1)
        .execute(db.pool())
        .await
        .unwrap();

    let stale = db.stale_usage_ids(ttl).await.unwrap();
    assert_eq!(stale, vec!["old".to_string()]);
}

// === Large message tests ===

#[tokio::test]
async fn large_message_round_trip() {
    let db = test_db().await;

    let payload = vec![0xabu8; 5000];
    let id = db.create_large_message(&payload).await.unwrap();

    let found = db.find_large_message(&id).await.unwrap().unwrap();
    assert_eq!(found.payload, payload);
    assert!(found.time_created > 0);

    assert!(db.find_large_message("other-id").await.unwrap().is_none());
}

#[tokio::test]
async fn large_message_ids_are_unique() {
    let db = test_db().await;
    let a = db.create_large_message(b"x").await.unwrap();
    let b = db.create_large_message(b"x").await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn delete_large_messages_before_cutoff() {
    let db = test_db().await;

    let old = db.create_large_message(b"old").await.unwrap();
    let fresh = db.create_large_message(b"fresh").await.unwrap();
    sqlx::query("UPDATE large_messages SET time_created = 1000 WHERE id = ?")
        .bind(&old)
        .execute(db.pool())
        .await
        .unwrap();

    let removed = db
        .delete_large_messages_before(unix_timestamp() - 60)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(db.find_large_message(&old).await.unwrap().is_none());
    assert!(db.find_large_message(&fresh).await.unwrap().is_some());
}
