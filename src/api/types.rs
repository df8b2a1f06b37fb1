//! API Request/Response Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current API version, reflected in the URL prefix and the ping body.
pub const API_VERSION: u32 = 1;

/// Body of `GET /api/v1/ping`
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub hello: String,
    pub apiversion: u32,
    pub utctime: DateTime<Utc>,
}

impl PingResponse {
    pub fn now() -> Self {
        Self {
            hello: "Hello!".to_string(),
            apiversion: API_VERSION,
            utctime: Utc::now(),
        }
    }
}

/// Body of `POST /api/v1/alert`
///
/// All fields are optional at the serde level so that a missing required
/// field produces a 400 with a useful message instead of a decode error.
#[derive(Debug, Deserialize)]
pub struct AlertRequest {
    /// Email address or room id
    pub to: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

impl AlertRequest {
    /// Collapse subject and message into the text to send.
    pub fn render_text(subject: &str, message: Option<&str>) -> String {
        match message {
            Some(m) if !m.is_empty() => format!("{}\n\n{}", subject, m),
            _ => subject.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertResponse {
    pub to: String,
    pub message: String,
    pub taskid: Uuid,
}

/// Success body of `POST /api/v1/webhook`
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub taskid: Uuid,
}

/// Error envelope for every non-2xx JSON body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_response_shape() {
        let ping = PingResponse::now();
        assert_eq!(ping.hello, "Hello!");
        assert_eq!(ping.apiversion, 1);
    }

    #[test]
    fn test_alert_text_with_message() {
        let text = AlertRequest::render_text("disk full", Some("host db1 /var is at 99%"));
        assert_eq!(text, "disk full\n\nhost db1 /var is at 99%");
    }

    #[test]
    fn test_alert_text_subject_only() {
        assert_eq!(AlertRequest::render_text("disk full", None), "disk full");
        assert_eq!(AlertRequest::render_text("disk full", Some("")), "disk full");
    }
}
