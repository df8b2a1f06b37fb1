//! Domain types shared across the API, task and provider layers.
//!
//! The Spark-facing structs mirror the wire format of the Spark REST API
//! (camelCase fields); the Zabbix structs hold already-normalized data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Spark room type as reported by the rooms API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Direct,
    Group,
}

/// A Spark room (space).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
}

impl Room {
    pub fn is_group(&self) -> bool {
        self.room_type == RoomType::Group
    }
}

/// A Spark user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub nick_name: Option<String>,
}

impl Person {
    /// The name to address this person by in bot output.
    pub fn salutation(&self) -> &str {
        self.nick_name
            .as_deref()
            .or(self.display_name.as_deref())
            .unwrap_or("there")
    }
}

/// A message fetched from the Spark messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkMessage {
    pub id: String,
    pub room_id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Rich representation; carries the `spark-mention` tag in group rooms
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub person_email: Option<String>,
}

/// Webhook callback payload delivered by Spark.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub resource: String,
    pub event: String,
    #[serde(default)]
    pub actor_id: Option<String>,
    pub data: WebhookData,
}

/// The `data` block of a messages/created callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    /// Message id to fetch the full message with
    pub id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub person_email: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// Where an outbound Spark message is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    PersonEmail(String),
    RoomId(String),
}

impl Recipient {
    /// Crude but good enough to tell a personEmail apart from a roomId.
    pub fn from_target(target: &str) -> Self {
        if target.contains('@') {
            Self::PersonEmail(target.to_string())
        } else {
            Self::RoomId(target.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::PersonEmail(e) => e,
            Self::RoomId(id) => id,
        }
    }
}

impl From<&Room> for Recipient {
    fn from(room: &Room) -> Self {
        Self::RoomId(room.id.clone())
    }
}

/// A registered Spark webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparkWebhook {
    pub id: String,
    pub name: String,
    pub target_url: String,
    pub resource: String,
    pub event: String,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// An active Zabbix problem trigger, flattened for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZabbixIssue {
    pub host: String,
    pub description: String,
    /// Unix timestamp of the last state change
    pub last_change: i64,
}

impl ZabbixIssue {
    pub fn last_change_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_change, 0)
    }
}

/// Aggregate Zabbix server statistics for the "show status" command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZabbixStatus {
    pub version: String,
    pub hosts_enabled: u64,
    pub hosts_disabled: u64,
    pub templates: u64,
    pub items_enabled: u64,
    pub items_disabled: u64,
    pub items_unsupported: u64,
    pub triggers_enabled: u64,
    pub triggers_disabled: u64,
    pub triggers_ok: u64,
    pub triggers_problem: u64,
    pub users: u64,
    pub web_scenarios: u64,
}
