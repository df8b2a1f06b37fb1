//! Zpark Library
//!
//! A bot that bridges Zabbix monitoring and Cisco Spark messaging:
//! - Relays Zabbix alerts into Spark rooms and direct messages
//! - Answers bot commands ("hello", "show issues", "show status")
//!   delivered through Spark webhook callbacks
//! - Verifies webhook callbacks with HMAC-SHA1 signatures and a
//!   trusted-user policy

pub mod api;
pub mod config;
pub mod core;
pub mod models;
pub mod providers;
pub mod tasks;

pub use config::{Config, TrustedUsers};
pub use models::{AppError, AppResult, ErrorCode};
pub use providers::{SparkClient, ZabbixClient};
pub use tasks::{Task, TaskContext, TaskQueue};
