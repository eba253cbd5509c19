//! UnifiedPush delivery.
//!
//! The destination is a caller-supplied URL accepting the raw message bytes
//! as a POST body. Status classification: 2xx delivered, 400-499 the
//! endpoint is permanently gone, anything else is transient.

use tracing::debug;

use super::PushError;

/// Client for generic HTTP push endpoints.
#[derive(Debug, Clone)]
pub struct UnifiedPushClient {
    http: reqwest::Client,
}

impl UnifiedPushClient {
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// POST `body` to `up_url` and classify the outcome.
    pub async fn send(&self, body: &[u8], up_url: &str) -> Result<(), PushError> {
        let response = self
            .http
            .post(up_url)
            .header("content-type", "application/octet-stream")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| PushError::Transient(format!("request to push server failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "UnifiedPush delivery accepted");
            Ok(())
        } else if status.is_client_error() {
            Err(PushError::Gone(format!(
                "push server returned permanent error {status}"
            )))
        } else {
            Err(PushError::Transient(format!(
                "push server returned {status}"
            )))
        }
    }
}
