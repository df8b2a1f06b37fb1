//! API Request Handlers

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::*;
use crate::config::{Config, MAX_WEBHOOK_BODY_BYTES};
use crate::models::{AppError, Recipient, WebhookEvent};
use crate::tasks::{Task, TaskQueue};

type HmacSha1 = Hmac<Sha1>;

/// Shared application state
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: TaskQueue,
}

impl AppState {
    pub fn new(config: Arc<Config>, queue: TaskQueue) -> Self {
        Self { config, queue }
    }
}

// ============================================
// Ping
// ============================================

pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse::now())
}

// ============================================
// Alert
// ============================================

/// Accept an alert from Zabbix and queue it for delivery to Spark.
pub async fn send_alert(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AlertRequest>,
) -> Response {
    let Some(to) = req.to.as_deref().filter(|s| !s.is_empty()) else {
        return AppError::bad_request("Required field missing: to").into_response();
    };
    let Some(subject) = req.subject.as_deref().filter(|s| !s.is_empty()) else {
        return AppError::bad_request("Required field missing: subject").into_response();
    };

    let text = AlertRequest::render_text(subject, req.message.as_deref());
    let recipient = Recipient::from_target(to);

    let taskid = match state.queue.enqueue(Task::SendSparkMessage {
        recipient,
        text: text.clone(),
        markdown: None,
    }) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Could not queue alert");
            return AppError::internal("Unable to queue the alert for delivery").into_response();
        }
    };

    info!(to, %taskid, "Alert queued");
    (
        StatusCode::OK,
        Json(AlertResponse {
            to: to.to_string(),
            message: text,
            taskid,
        }),
    )
        .into_response()
}

// ============================================
// Webhook
// ============================================

/// Receive a webhook callback from Spark.
///
/// This endpoint skips token auth (Spark cannot send our token), so it
/// defends itself differently: a hard size cap, an HMAC-SHA1 signature
/// check when `SPARK_WEBHOOK_SECRET` is set, and a trusted-user check.
/// An untrusted sender gets a 200 with an error body so that probing the
/// endpoint reveals nothing about the trust list.
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Reject anything without a sane Content-Length before looking at the
    // body at all.
    let content_length = headers
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let Some(content_length) = content_length else {
        return AppError::bad_request("Missing or invalid Content-Length header").into_response();
    };
    if content_length > MAX_WEBHOOK_BODY_BYTES || body.len() > MAX_WEBHOOK_BODY_BYTES {
        return AppError::payload_too_large("Webhook payload too large").into_response();
    }

    if let Some(secret) = state.config.spark_webhook_secret.as_deref() {
        let signature = headers
            .get("X-Spark-Signature")
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret, &body, signature) {
            warn!("Webhook signature check failed");
            return AppError::forbidden("Invalid webhook signature").into_response();
        }
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Undecodable webhook payload");
            return AppError::bad_request("Could not decode webhook payload").into_response();
        }
    };

    if event.resource != "messages" || event.event != "created" {
        return AppError::bad_request(format!(
            "Unsupported webhook callback: {}/{}",
            event.resource, event.event
        ))
        .into_response();
    }

    let sender = event.data.person_email.clone().unwrap_or_default();
    if !state.config.trusted_users.is_trusted(&sender) {
        warn!(sender, "Webhook from untrusted user ignored");
        // Deliberately a 200: do not leak the trust policy to probers.
        return (
            StatusCode::OK,
            Json(ErrorBody::new("Unable to act on this webhook callback")),
        )
            .into_response();
    }

    let taskid = match state.queue.enqueue(Task::DispatchSparkCommand { event }) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Could not queue webhook dispatch");
            return AppError::internal("Unable to queue the webhook for processing")
                .into_response();
        }
    };

    info!(sender, %taskid, "Webhook callback queued");
    (StatusCode::OK, Json(WebhookResponse { taskid })).into_response()
}

/// HMAC-SHA1 of the raw body, hex-encoded, compared against the
/// `X-Spark-Signature` header.
fn verify_signature(secret: &str, body: &[u8], signature: Option<&str>) -> bool {
    let Some(signature) = signature else {
        return false;
    };
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha1::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"resource":"messages"}"#;
        let sig = sign("s3cret", body);
        assert!(verify_signature("s3cret", body, Some(&sig)));
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let body = br#"{"resource":"messages"}"#;
        let sig = sign("other", body);
        assert!(!verify_signature("s3cret", body, Some(&sig)));
    }

    #[test]
    fn test_signature_rejects_missing_or_garbage() {
        assert!(!verify_signature("s3cret", b"x", None));
        assert!(!verify_signature("s3cret", b"x", Some("not-hex!")));
        assert!(!verify_signature("s3cret", b"x", Some("deadbeef")));
    }
}
