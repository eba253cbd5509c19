//! Data models for pushmask relay storage.

use serde::{Deserialize, Serialize};

/// One registered relay destination. Exactly one of `up_url` / `fcm_token`
/// is set; `hash_id` is a pure function of the whole triple (see
/// [`super::endpoint_hash_id`]).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Endpoint {
    pub hash_id: String,
    pub acct_hash: String,
    pub up_url: Option<String>,
    pub fcm_token: Option<String>,
}

/// Last time a relay was forwarded to an endpoint. Stored independently of
/// [`Endpoint`]; its absence or staleness drives eviction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UsageRecord {
    pub hash_id: String,
    pub time_used: i64,
}

/// An encoded message too large to forward inline, retrievable by id until
/// its retention window expires.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LargeMessage {
    pub id: String,
    pub time_created: i64,
    pub payload: Vec<u8>,
}
