//! Push transport adapters.
//!
//! The relay delivers through two providers: arbitrary UnifiedPush-style
//! HTTP endpoints and FCM. Adapters classify failures as permanent (the
//! destination is gone) or transient; they never retry.

pub mod fcm;
pub mod unified;

pub use fcm::FcmClient;
pub use unified::UnifiedPushClient;

use async_trait::async_trait;

/// Errors surfaced by transport adapters.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The destination is permanently unavailable (client-error status from
    /// a push server, unregistered FCM token).
    #[error("push destination gone: {0}")]
    Gone(String),

    /// Network failure or upstream server error; the caller may retry the
    /// whole relay request.
    #[error("push delivery failed: {0}")]
    Transient(String),

    /// Failed to read or parse FCM service account credentials.
    #[error("FCM credentials error: {0}")]
    Credentials(String),
}

/// Delivery seam between the dispatcher and the outside world.
///
/// Production uses [`HttpPushTransport`]; tests substitute mocks.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// POST raw bytes to a UnifiedPush endpoint.
    async fn send_unified(&self, body: &[u8], up_url: &str) -> Result<(), PushError>;

    /// Send a text-safe data payload to an FCM device token. Returns the
    /// provider message id.
    async fn send_fcm(&self, data: &str, fcm_token: &str) -> Result<String, PushError>;
}

/// Production transport: shared HTTP client for UnifiedPush plus an optional
/// FCM client (absent when the relay runs without FCM credentials).
pub struct HttpPushTransport {
    unified: UnifiedPushClient,
    fcm: Option<FcmClient>,
}

impl HttpPushTransport {
    pub const fn new(unified: UnifiedPushClient, fcm: Option<FcmClient>) -> Self {
        Self { unified, fcm }
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send_unified(&self, body: &[u8], up_url: &str) -> Result<(), PushError> {
        self.unified.send(body, up_url).await
    }

    async fn send_fcm(&self, data: &str, fcm_token: &str) -> Result<String, PushError> {
        match &self.fcm {
            Some(fcm) => fcm.send_data(fcm_token, data).await,
            None => Err(PushError::Transient(
                "FCM transport not configured".to_string(),
            )),
        }
    }
}
