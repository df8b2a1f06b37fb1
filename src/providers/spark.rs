//! Cisco Spark REST API client.
//!
//! Thin reqwest wrapper over the handful of Spark endpoints the bot uses:
//! messages, rooms, people and webhooks. Authentication is the bot's
//! bearer token. Non-2xx responses are mapped onto [`AppError`] so the
//! task layer can decide what is worth retrying (429 and 5xx are, other
//! 4xx are not).

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::models::{
    AppError, AppResult, Person, Recipient, Room, SparkMessage, SparkWebhook,
};

/// Spark list responses wrap their payload in an `items` array.
#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

pub struct SparkClient {
    http: reqwest::Client,
    base_url: String,
}

impl SparkClient {
    pub fn new(base_url: impl Into<String>, access_token: &str) -> AppResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", access_token))
            .map_err(|_| AppError::invalid_config("SPARK_ACCESS_TOKEN contains invalid bytes"))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(AppError::from)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a new message addressed to a person or a room.
    pub async fn create_message(
        &self,
        recipient: &Recipient,
        text: &str,
        markdown: Option<&str>,
    ) -> AppResult<SparkMessage> {
        let mut body = match recipient {
            Recipient::PersonEmail(email) => json!({ "toPersonEmail": email }),
            Recipient::RoomId(id) => json!({ "roomId": id }),
        };
        body["text"] = json!(text);
        if let Some(md) = markdown {
            body["markdown"] = json!(md);
        }

        debug!(recipient = recipient.as_str(), "Creating Spark message");
        self.post_json("/messages", &body).await
    }

    /// Fetch the full message a webhook callback refers to.
    pub async fn get_message(&self, message_id: &str) -> AppResult<SparkMessage> {
        self.get_json(&format!("/messages/{}", message_id)).await
    }

    pub async fn get_room(&self, room_id: &str) -> AppResult<Room> {
        self.get_json(&format!("/rooms/{}", room_id)).await
    }

    /// Group rooms the bot has been invited to.
    pub async fn list_group_rooms(&self) -> AppResult<Vec<Room>> {
        let envelope: ItemsEnvelope<Room> = self.get_json("/rooms?type=group").await?;
        Ok(envelope.items)
    }

    pub async fn get_person(&self, person_id: &str) -> AppResult<Person> {
        self.get_json(&format!("/people/{}", person_id)).await
    }

    pub async fn list_webhooks(&self) -> AppResult<Vec<SparkWebhook>> {
        let envelope: ItemsEnvelope<SparkWebhook> = self.get_json("/webhooks").await?;
        Ok(envelope.items)
    }

    pub async fn create_webhook(
        &self,
        name: &str,
        target_url: &str,
        secret: Option<&str>,
    ) -> AppResult<SparkWebhook> {
        let mut body = json!({
            "name": name,
            "targetUrl": target_url,
            "resource": "messages",
            "event": "created",
        });
        if let Some(secret) = secret {
            body["secret"] = json!(secret);
        }
        self.post_json("/webhooks", &body).await
    }

    pub async fn delete_webhook(&self, webhook_id: &str) -> AppResult<()> {
        let url = format!("{}/webhooks/{}", self.base_url, webhook_id);
        let response = self.http.delete(&url).send().await?;
        Self::check_status(&url, response).await?;
        Ok(())
    }

    // ============================================
    // Internals
    // ============================================

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        let response = Self::check_status(&url, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::with_source(
                crate::models::ErrorCode::SparkInvalidResponse,
                format!("Malformed Spark response from {}", url),
                e,
            ))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        let response = Self::check_status(&url, response).await?;
        response
            .json()
            .await
            .map_err(|e| AppError::with_source(
                crate::models::ErrorCode::SparkInvalidResponse,
                format!("Malformed Spark response from {}", url),
                e,
            ))
    }

    async fn check_status(url: &str, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(AppError::spark_status(
            status.as_u16(),
            format!("Spark API returned {} for {}: {}", status, url, detail),
        ))
    }
}
