//! Route handlers.

use std::collections::{BTreeMap, HashMap};

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::info;

use pushmask_codec::Value;

use super::AppState;
use crate::error::RelayError;

/// Headers the receiving app needs to decrypt a web-push payload, forwarded
/// inside the relayed message. Names are kept lowercase on the wire.
const RELAYED_HEADERS: [&str; 3] = ["content-encoding", "crypto-key", "encryption"];

/// `GET /ping` — liveness probe, no side effects.
pub async fn ping() -> Json<JsonValue> {
    Json(json!({ "ping": "pong" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    #[serde(default)]
    acct_hash_list: Vec<String>,
    up_url: Option<String>,
    fcm_token: Option<String>,
}

/// `POST /endpoint/upsert` — register a list of account hashes against one
/// destination; responds with the acctHash → hashId mapping whether or not
/// each row already existed.
pub async fn upsert_endpoints(
    State(state): State<AppState>,
    Json(req): Json<UpsertRequest>,
) -> Result<Json<BTreeMap<String, String>>, RelayError> {
    if req.up_url.is_some() == req.fcm_token.is_some() {
        return Err(RelayError::Validation(
            "exactly one of upUrl and fcmToken must be specified".to_string(),
        ));
    }
    if req.acct_hash_list.is_empty() {
        return Err(RelayError::Validation(
            "acctHashList is null or empty".to_string(),
        ));
    }

    let mapping = state
        .db
        .upsert_endpoints(
            &req.acct_hash_list,
            req.up_url.as_deref(),
            req.fcm_token.as_deref(),
        )
        .await?;

    // seed usage so a never-relayed registration still ages from now
    let ids: Vec<String> = mapping.values().cloned().collect();
    state.db.touch_usage_many(&ids).await?;

    info!(count = mapping.len(), "endpoints registered");
    Ok(Json(mapping))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveParams {
    up_url: Option<String>,
    fcm_token: Option<String>,
    hash_id: Option<String>,
}

/// `DELETE /endpoint/remove` — deregister by hash id when given, otherwise
/// by exact destination pair; responds with the number of rows removed.
pub async fn remove_endpoints(
    State(state): State<AppState>,
    Query(params): Query<RemoveParams>,
) -> Result<Json<JsonValue>, RelayError> {
    let count = match params.hash_id.as_deref() {
        Some(hash_id) if !hash_id.is_empty() => {
            state.db.delete_endpoint_by_hash_id(hash_id).await?
        }
        _ => {
            state
                .db
                .delete_endpoints_by_destination(
                    params.up_url.as_deref(),
                    params.fcm_token.as_deref(),
                )
                .await?
        }
    };

    info!(
        count,
        up_url = params.up_url.as_deref().unwrap_or(""),
        has_fcm_token = params.fcm_token.is_some(),
        hash_id = params.hash_id.as_deref().unwrap_or(""),
        "endpoints removed"
    );
    Ok(Json(json!({ "count": count })))
}

/// Parse `/m/...` path parameters of the form `k_v/k2_v2`.
fn parse_path_params(path: &str) -> HashMap<String, String> {
    path.split('/')
        .filter_map(|segment| {
            let (key, value) = segment.split_once('_').unwrap_or((segment, ""));
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// `POST /m/{params}` — relay an opaque payload to the endpoint addressed
/// by the `a` path parameter.
pub async fn relay_message(
    State(state): State<AppState>,
    Path(params): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, RelayError> {
    let params = parse_path_params(&params);
    let hash_id = params
        .get("a")
        .ok_or_else(|| RelayError::Validation("missing path parameter 'a'".to_string()))?;

    let endpoint = state
        .db
        .find_endpoint(hash_id)
        .await?
        .ok_or_else(|| RelayError::Gone("missing endpoint for this hash".to_string()))?;

    let mut header_map = Value::empty_map();
    for name in RELAYED_HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            header_map.put(name, value);
        }
    }

    let mut message = Value::empty_map();
    message.put("a", endpoint.acct_hash.as_str());
    message.put("b", body.as_ref());
    message.put("c", endpoint.hash_id.as_str());
    message.put("h", header_map);

    let delivery = state.dispatcher.dispatch(&endpoint, message.encode()).await?;
    Ok(Json(json!({ "result": delivery.result_message() })))
}

/// `GET /l/{id}` — dereference an offloaded message; stored bytes verbatim.
pub async fn fetch_large_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, RelayError> {
    match state.db.find_large_message(&id).await? {
        Some(message) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            message.payload,
        )
            .into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "unknown large message id" })),
        )
            .into_response()),
    }
}
