//! FCM HTTP v1 API delivery.
//!
//! The relay only ever sends data messages: the binpack payload is already
//! text-safe (base128) by the time it reaches this client, and the receiving
//! app does its own decryption and display. A response naming the
//! `UNREGISTERED` error code means the device token is dead and the
//! registration should be treated as gone.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::PushError;

/// FCM HTTP v1 API endpoint template.
const FCM_API_URL_TEMPLATE: &str =
    "https://fcm.googleapis.com/v1/projects/{project_id}/messages:send";

/// Environment variable holding the OAuth access token for FCM requests.
const FCM_ACCESS_TOKEN_ENV: &str = "PUSHMASK_FCM_ACCESS_TOKEN";

/// Key under which the relayed payload travels in the FCM data map.
const DATA_KEY: &str = "d";

/// Service account credentials loaded from a Google Cloud JSON key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    /// The Google Cloud project ID.
    pub project_id: String,

    #[serde(default)]
    pub client_email: String,

    /// The private key in PEM format, used as a last-resort bearer value
    /// when no access token is provided via the environment.
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Serialize)]
struct FcmSendRequest<'a> {
    message: FcmDataMessage<'a>,
}

#[derive(Debug, Serialize)]
struct FcmDataMessage<'a> {
    token: &'a str,
    data: HashMap<&'a str, &'a str>,
}

/// Client for the FCM HTTP v1 API.
#[derive(Debug)]
pub struct FcmClient {
    http: reqwest::Client,
    credentials: ServiceAccountCredentials,
    api_url: String,

    /// Bearer token read from `PUSHMASK_FCM_ACCESS_TOKEN` at construction
    /// time. When `None`, falls back to `credentials.private_key`.
    access_token: Option<String>,
}

fn read_access_token_from_env() -> Option<String> {
    let token = std::env::var(FCM_ACCESS_TOKEN_ENV).ok();
    if token.is_none() {
        warn!(
            "Environment variable {FCM_ACCESS_TOKEN_ENV} is not set; \
             falling back to credentials.private_key for FCM auth"
        );
    }
    token
}

impl FcmClient {
    /// Create an FCM client by loading service account credentials from a
    /// JSON file, reusing the relay's shared HTTP client.
    pub fn from_credentials_file(path: &Path, http: reqwest::Client) -> Result<Self, PushError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PushError::Credentials(format!(
                "failed to read credentials file {}: {e}",
                path.display()
            ))
        })?;

        let credentials: ServiceAccountCredentials = serde_json::from_str(&content)
            .map_err(|e| PushError::Credentials(format!("failed to parse credentials JSON: {e}")))?;

        Ok(Self::from_credentials(credentials, http))
    }

    /// Create an FCM client from pre-parsed credentials.
    pub fn from_credentials(credentials: ServiceAccountCredentials, http: reqwest::Client) -> Self {
        let api_url = FCM_API_URL_TEMPLATE.replace("{project_id}", &credentials.project_id);
        let access_token = read_access_token_from_env();

        debug!(
            project_id = %credentials.project_id,
            has_env_token = access_token.is_some(),
            "FCM client initialized"
        );

        Self {
            http,
            credentials,
            api_url,
            access_token,
        }
    }

    /// Send `data` (already text-safe) to one device token.
    ///
    /// Returns the provider message id on success. An `UNREGISTERED` error
    /// from FCM classifies as [`PushError::Gone`]; every other failure is
    /// transient.
    pub async fn send_data(&self, fcm_token: &str, data: &str) -> Result<String, PushError> {
        let request = FcmSendRequest {
            message: FcmDataMessage {
                token: fcm_token,
                data: HashMap::from([(DATA_KEY, data)]),
            },
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("Authorization", self.auth_header())
            .json(&request)
            .send()
            .await
            .map_err(|e| PushError::Transient(format!("FCM request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| PushError::Transient(format!("FCM response unreadable: {e}")))?;
            let message_id = body
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            debug!(message_id = %message_id, "FCM delivery accepted");
            Ok(message_id)
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            if is_unregistered(&body) {
                Err(PushError::Gone("FCM device token unregistered".to_string()))
            } else {
                warn!(status = status.as_u16(), body = %body, "FCM API returned error");
                Err(PushError::Transient(format!(
                    "FCM API returned {status}"
                )))
            }
        }
    }

    /// Construct the Authorization header value.
    fn auth_header(&self) -> String {
        let token = self
            .access_token
            .as_deref()
            .unwrap_or(&self.credentials.private_key);
        format!("Bearer {token}")
    }

    /// Returns the resolved FCM API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

/// True when an FCM v1 error body carries the `UNREGISTERED` error code.
fn is_unregistered(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    value
        .get("error")
        .and_then(|e| e.get("details"))
        .and_then(serde_json::Value::as_array)
        .is_some_and(|details| {
            details.iter().any(|d| {
                d.get("errorCode").and_then(serde_json::Value::as_str) == Some("UNREGISTERED")
            })
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_credentials() -> ServiceAccountCredentials {
        ServiceAccountCredentials {
            project_id: "relay-project-123".to_string(),
            client_email: "relay@relay-project-123.iam.gserviceaccount.com".to_string(),
            private_key: "test-private-key".to_string(),
        }
    }

    #[test]
    fn from_credentials_resolves_api_url() {
        let client = FcmClient::from_credentials(test_credentials(), reqwest::Client::new());
        assert_eq!(
            client.api_url(),
            "https://fcm.googleapis.com/v1/projects/relay-project-123/messages:send"
        );
    }

    #[test]
    fn send_request_serializes_as_data_message() {
        let request = FcmSendRequest {
            message: FcmDataMessage {
                token: "tok",
                data: HashMap::from([(DATA_KEY, "payload")]),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"]["token"], "tok");
        assert_eq!(json["message"]["data"]["d"], "payload");
        assert!(json["message"].get("notification").is_none());
    }

    #[test]
    fn from_credentials_file_missing_is_credentials_error() {
        let result =
            FcmClient::from_credentials_file(Path::new("/nonexistent/key.json"), reqwest::Client::new());
        assert!(matches!(result, Err(PushError::Credentials(_))));
    }

    #[test]
    fn auth_header_falls_back_to_private_key() {
        let client = FcmClient {
            http: reqwest::Client::new(),
            credentials: test_credentials(),
            api_url: "https://example.com".to_string(),
            access_token: None,
        };
        assert_eq!(client.auth_header(), "Bearer test-private-key");
    }

    #[test]
    fn unregistered_error_body_is_detected() {
        let body = r#"{
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        }"#;
        assert!(is_unregistered(body));
    }

    #[test]
    fn other_error_bodies_are_not_unregistered() {
        let quota = r#"{"error":{"code":429,"status":"RESOURCE_EXHAUSTED","details":[{"errorCode":"QUOTA_EXCEEDED"}]}}"#;
        assert!(!is_unregistered(quota));
        assert!(!is_unregistered("not json"));
        assert!(!is_unregistered("{}"));
    }
}
