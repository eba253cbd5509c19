//! SQLite storage for the pushmask relay.
//!
//! Provides persistence for endpoint registrations, per-endpoint usage
//! timestamps, and offloaded large messages. Each table is owned by exactly
//! one query module; cross-table coordination happens only through id
//! values, never through shared in-memory state.

mod db;
mod models;
mod queries_endpoints;
mod queries_large;
mod queries_usage;

#[cfg(test)]
mod tests;

pub use db::{DatabaseError, RelayDatabase, unix_timestamp};
pub use models::*;
pub use queries_endpoints::endpoint_hash_id;

/// Upper bound on ids per SQL statement for bulk operations.
pub(crate) const BATCH_SIZE: usize = 1000;
