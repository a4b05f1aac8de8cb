//! `POST /v1/inbound` — the single channel-agnostic entry point for
//! inbound messages. A real deployment sits a WhatsApp/GitHub/Slack
//! adapter in front of this and translates that channel's webhook payload
//! into the body below; those adapters are external collaborators and out
//! of scope here.
//!
//! Grounded on the teacher's `trigger_webhook`
//! (`gateway/src/api/webhooks.rs`): optional HMAC-SHA256 signature check
//! against a configured secret, constant-time compare.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use ac_orchestrator::InboundMessage;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct InboundPayload {
    event_id: String,
    user_id: String,
    project_id: String,
    #[serde(default)]
    task_id: Option<String>,
    text: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn verify_signature(secret: &[u8], body: &[u8], signature_header: &str) -> bool {
    let sig_hex = signature_header
        .strip_prefix("sha256=")
        .unwrap_or(signature_header);
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());
    computed.as_bytes().ct_eq(sig_hex.as_bytes()).unwrap_u8() == 1
}

pub async fn inbound(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(secret) = &state.webhook_secret {
        let sig_header = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, sig_header) {
            return api_error(StatusCode::UNAUTHORIZED, "invalid webhook signature");
        }
    }

    let payload: InboundPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, format!("malformed body: {e}")),
    };

    let msg = InboundMessage {
        event_id: payload.event_id,
        user_id: payload.user_id,
        project_id: payload.project_id,
        task_id: payload.task_id,
        text: payload.text,
    };

    match state.orchestrator.handle_message(msg).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "accepted" })))
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "inbound message handling failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
