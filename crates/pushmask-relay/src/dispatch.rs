//! Message dispatch: inline-vs-offload decision and transport selection.
//!
//! Every transport has a fixed size budget for one push. FCM additionally
//! base128-encodes the binary payload on the way out, expanding it by 8/7,
//! so the decision works on the estimated post-expansion size. A message
//! that would blow the budget is stored as a large message and replaced by
//! a strictly smaller pointer map the receiving app dereferences later.

use std::sync::Arc;

use tracing::debug;

use pushmask_codec::{Value, base128};

use crate::error::RelayError;
use crate::push::PushTransport;
use crate::storage::{Endpoint, RelayDatabase};

/// Maximum estimated bytes a single push may carry.
pub const SIZE_BUDGET: f32 = 4000.0;

/// UnifiedPush forwards the bytes as-is.
pub const UNIFIED_PUSH_RATIO: f32 = 1.0;

/// FCM data values are base128-encoded, 7 payload bits per output char.
pub const FCM_RATIO: f32 = 8.0 / 7.0;

/// Which transport carried a relayed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    UnifiedPush,
    Fcm,
}

impl Delivery {
    /// Human-readable relay result reported to the caller.
    pub const fn result_message(self) -> &'static str {
        match self {
            Self::UnifiedPush => "sent to UnifiedPush endpoint.",
            Self::Fcm => "sent to FCM.",
        }
    }
}

pub struct MessageDispatcher {
    db: RelayDatabase,
    transport: Arc<dyn PushTransport>,
}

impl MessageDispatcher {
    pub fn new(db: RelayDatabase, transport: Arc<dyn PushTransport>) -> Self {
        Self { db, transport }
    }

    /// Forward an encoded message to the endpoint's destination.
    ///
    /// On success the endpoint's usage timestamp is refreshed. Failures
    /// surface to the caller unretried; usage is left untouched so a dead
    /// destination keeps aging toward eviction.
    pub async fn dispatch(
        &self,
        endpoint: &Endpoint,
        encoded: Vec<u8>,
    ) -> Result<Delivery, RelayError> {
        let delivery = if let Some(up_url) = endpoint.up_url.as_deref() {
            let data = self.inline_or_offload(endpoint, encoded, UNIFIED_PUSH_RATIO).await?;
            self.transport.send_unified(&data, up_url).await?;
            Delivery::UnifiedPush
        } else if let Some(fcm_token) = endpoint.fcm_token.as_deref() {
            let data = self.inline_or_offload(endpoint, encoded, FCM_RATIO).await?;
            let message_id = self
                .transport
                .send_fcm(&base128::encode(&data), fcm_token)
                .await?;
            debug!(message_id = %message_id, "FCM relay delivered");
            Delivery::Fcm
        } else {
            // unreachable under the endpoint row invariant
            return Err(RelayError::Internal(format!(
                "endpoint {} has no destination",
                endpoint.hash_id
            )));
        };

        self.db.touch_usage(&endpoint.hash_id).await?;
        Ok(delivery)
    }

    /// Return the message to send: `encoded` itself when it fits the budget
    /// after transport expansion, otherwise a pointer to the stored payload.
    #[allow(clippy::cast_precision_loss)]
    async fn inline_or_offload(
        &self,
        endpoint: &Endpoint,
        encoded: Vec<u8>,
        ratio: f32,
    ) -> Result<Vec<u8>, RelayError> {
        let estimated = encoded.len() as f32 * ratio;
        if estimated <= SIZE_BUDGET {
            return Ok(encoded);
        }

        let id = self.db.create_large_message(&encoded).await?;
        debug!(
            size = encoded.len(),
            estimated, id = %id,
            "payload exceeds transport budget, offloaded"
        );

        let mut pointer = Value::empty_map();
        pointer.put("a", endpoint.acct_hash.as_str());
        pointer.put("c", endpoint.hash_id.as_str());
        pointer.put("l", id.as_str());
        Ok(pointer.encode())
    }
}
