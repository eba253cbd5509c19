//! pushmask relay server library.
//!
//! A privacy-preserving push-notification relay: originators address an
//! opaque encrypted payload by an anonymous hash identifier, and the relay
//! forwards it to the registered destination (a UnifiedPush-style HTTP
//! endpoint or an FCM device token). The relay never learns the real
//! account identity, and the push provider never learns the originator.
//!
//! - SQLite storage for registrations, usage timestamps, offloaded payloads
//! - Dispatch decision: inline forward vs large-message offload
//! - UnifiedPush and FCM transport adapters with failure classification
//! - Background expiry sweeper for stale registrations and old payloads

pub mod dispatch;
pub mod error;
pub mod push;
pub mod server;
pub mod storage;
pub mod sweeper;
