//! Data structures and error types.

pub mod errors;
pub mod types;

pub use errors::{AppError, AppResult, ErrorCode};
pub use types::{
    Person, Recipient, Room, RoomType, SparkMessage, SparkWebhook, WebhookData, WebhookEvent,
    ZabbixIssue, ZabbixStatus,
};
