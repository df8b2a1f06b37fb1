//! Configuration for the Zpark bot.
//!
//! Everything is environment-driven. The settings that must be present for
//! the bot to function (Spark access token, Zabbix credentials) are checked
//! at startup; the rest fall back to documented defaults.

use std::env;

use tracing::{info, warn};

use crate::models::{AppError, AppResult};

/// Default Spark API base URL. Overridable for tests via `SPARK_API_URL`.
pub const DEFAULT_SPARK_API_URL: &str = "https://api.ciscospark.com/v1";

/// Webhook callback bodies larger than this are rejected with HTTP 413.
pub const MAX_WEBHOOK_BODY_BYTES: usize = 32 * 1024;

/// Trusted-user policy for inbound bot commands.
///
/// The default (no `SPARK_TRUSTED_USERS` in the environment) trusts nobody;
/// an explicitly empty value disables the check entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedUsers {
    DenyAll,
    AllowAll,
    /// Email addresses and/or `@domain` entries
    List(Vec<String>),
}

impl TrustedUsers {
    pub fn from_env_value(value: Option<String>) -> Self {
        match value {
            None => Self::DenyAll,
            Some(v) if v.trim().is_empty() => Self::AllowAll,
            Some(v) => Self::List(
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        }
    }

    /// Check a sender's email against the policy.
    ///
    /// Entries starting with `@` match any address in that domain.
    pub fn is_trusted(&self, email: &str) -> bool {
        match self {
            Self::DenyAll => false,
            Self::AllowAll => true,
            Self::List(entries) => entries.iter().any(|entry| {
                if entry.starts_with('@') {
                    email.to_lowercase().ends_with(&entry.to_lowercase())
                } else {
                    email.eq_ignore_ascii_case(entry)
                }
            }),
        }
    }
}

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Token consumers of our API present in the `Token` header.
    /// `None` rejects every authenticated API request.
    pub api_token: Option<String>,
    /// Bearer token for the Spark API
    pub spark_access_token: String,
    /// Spark API base URL
    pub spark_api_url: String,
    /// Secret Spark uses to sign webhook callbacks (HMAC-SHA1).
    /// `None` disables webhook signature checking.
    pub spark_webhook_secret: Option<String>,
    pub trusted_users: TrustedUsers,
    /// Bot owner contact shown by the "hello" command
    pub contact_info: Option<String>,
    /// Public URL of this API; used as the webhook target by `zpark_ctl`
    pub server_url: Option<String>,

    pub zabbix_url: String,
    pub zabbix_username: String,
    pub zabbix_password: String,
    pub zabbix_tls_verify: bool,

    pub host: String,
    pub port: u16,
    /// Max concurrently running background tasks
    pub worker_concurrency: usize,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> AppResult<Self> {
        let spark_access_token = env::var("SPARK_ACCESS_TOKEN")
            .map_err(|_| AppError::missing_env("SPARK_ACCESS_TOKEN"))?;
        if spark_access_token.trim().is_empty() {
            return Err(AppError::invalid_config("SPARK_ACCESS_TOKEN is empty"));
        }

        let zabbix_username =
            env::var("ZABBIX_USERNAME").map_err(|_| AppError::missing_env("ZABBIX_USERNAME"))?;
        let zabbix_password =
            env::var("ZABBIX_PASSWORD").map_err(|_| AppError::missing_env("ZABBIX_PASSWORD"))?;

        let api_token = env::var("ZPARK_API_TOKEN").ok().filter(|t| !t.is_empty());
        if api_token.is_none() {
            warn!("ZPARK_API_TOKEN is not configured; all API requests will be rejected");
        }

        let spark_webhook_secret = env::var("SPARK_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        if spark_webhook_secret.is_none() {
            warn!("SPARK_WEBHOOK_SECRET is not configured; webhook callbacks are unauthenticated");
        }

        let trusted_users = TrustedUsers::from_env_value(env::var("SPARK_TRUSTED_USERS").ok());
        match &trusted_users {
            TrustedUsers::DenyAll => {
                warn!("SPARK_TRUSTED_USERS is not configured; all bot commands will be ignored")
            }
            TrustedUsers::AllowAll => {
                info!("Trusted user check is disabled; all Spark users may issue commands")
            }
            TrustedUsers::List(l) => info!(entries = l.len(), "Trusted user list loaded"),
        }

        let zabbix_tls_verify = match env::var("ZABBIX_TLS_CERT_VERIFY").ok().as_deref() {
            None => true,
            Some(v) => parse_bool(v)
                .ok_or_else(|| AppError::invalid_config("ZABBIX_TLS_CERT_VERIFY must be a bool"))?,
        };
        if !zabbix_tls_verify {
            warn!("Zabbix TLS certificate verification is DISABLED");
        }

        let host = env::var("ZPARK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        // Hosted platforms set PORT; ZPARK_PORT is for local dev
        let port: u16 = env::var("PORT")
            .or_else(|_| env::var("ZPARK_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let worker_concurrency: usize = env::var("ZPARK_WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8);

        Ok(Self {
            api_token,
            spark_access_token,
            spark_api_url: env::var("SPARK_API_URL")
                .unwrap_or_else(|_| DEFAULT_SPARK_API_URL.to_string()),
            spark_webhook_secret,
            trusted_users,
            contact_info: env::var("ZPARK_CONTACT_INFO").ok().filter(|s| !s.is_empty()),
            server_url: env::var("ZPARK_SERVER_URL").ok().filter(|s| !s.is_empty()),
            zabbix_url: env::var("ZABBIX_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost/zabbix".to_string()),
            zabbix_username,
            zabbix_password,
            zabbix_tls_verify,
            host,
            port,
            worker_concurrency,
        })
    }

    /// The URL Spark should deliver webhook callbacks to.
    pub fn webhook_target_url(&self) -> Option<String> {
        self.server_url
            .as_ref()
            .map(|base| format!("{}/api/v1/webhook", base.trim_end_matches('/')))
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_users_default_denies_everyone() {
        let policy = TrustedUsers::from_env_value(None);
        assert!(!policy.is_trusted("anyone@example.com"));
    }

    #[test]
    fn test_trusted_users_empty_allows_everyone() {
        let policy = TrustedUsers::from_env_value(Some(String::new()));
        assert!(policy.is_trusted("anyone@example.com"));
    }

    #[test]
    fn test_trusted_users_exact_match() {
        let policy =
            TrustedUsers::from_env_value(Some("user@example.com, other@example.org".into()));
        assert!(policy.is_trusted("user@example.com"));
        assert!(policy.is_trusted("User@Example.COM"));
        assert!(!policy.is_trusted("stranger@example.com"));
    }

    #[test]
    fn test_trusted_users_domain_match() {
        let policy = TrustedUsers::from_env_value(Some("@example.org".into()));
        assert!(policy.is_trusted("anyone@example.org"));
        assert!(!policy.is_trusted("anyone@example.com"));
    }

    #[test]
    fn test_trusted_users_mixed_entries() {
        let policy = TrustedUsers::from_env_value(Some("user@example.com,@example.org".into()));
        assert!(policy.is_trusted("user@example.com"));
        assert!(policy.is_trusted("someone@example.org"));
        assert!(!policy.is_trusted("someone@example.net"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("banana"), None);
    }
}
