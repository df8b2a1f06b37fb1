//! Zabbix JSON-RPC API client.
//!
//! Speaks JSON-RPC 2.0 to `{ZABBIX_SERVER_URL}/api_jsonrpc.php`. The auth
//! token from `user.login` is cached and transparently refreshed when
//! Zabbix reports it expired. TLS certificate verification can be turned
//! off via `ZABBIX_TLS_CERT_VERIFY` for servers with self-signed certs.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{AppError, AppResult, ZabbixIssue, ZabbixStatus};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

pub struct ZabbixClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    /// Cached auth token from user.login
    auth: RwLock<Option<String>>,
    request_id: AtomicU64,
}

impl ZabbixClient {
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        tls_verify: bool,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!tls_verify)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(AppError::from)?;

        Ok(Self {
            http,
            endpoint: format!("{}/api_jsonrpc.php", base_url.trim_end_matches('/')),
            username: username.into(),
            password: password.into(),
            auth: RwLock::new(None),
            request_id: AtomicU64::new(1),
        })
    }

    /// Zabbix API version string, e.g. "3.4.0". Unauthenticated call.
    pub async fn api_version(&self) -> AppResult<String> {
        self.call("apiinfo.version", json!([]), false).await
    }

    /// Active, monitored problem triggers, newest first.
    pub async fn active_issues(&self) -> AppResult<Vec<ZabbixIssue>> {
        #[derive(Debug, Deserialize)]
        struct TriggerRow {
            description: String,
            lastchange: Value,
            #[serde(default)]
            hosts: Vec<HostRow>,
        }
        #[derive(Debug, Deserialize)]
        struct HostRow {
            host: String,
        }

        let params = json!({
            "output": ["triggerid", "description", "lastchange", "priority"],
            "selectHosts": ["host"],
            "filter": { "value": 1 },
            "monitored": true,
            "skipDependent": true,
            "expandDescription": true,
            "sortfield": "lastchange",
            "sortorder": "DESC",
        });

        let rows: Vec<TriggerRow> = self.call("trigger.get", params, true).await?;
        Ok(rows
            .into_iter()
            .map(|row| ZabbixIssue {
                host: row
                    .hosts
                    .first()
                    .map(|h| h.host.clone())
                    .unwrap_or_else(|| "unknown host".to_string()),
                description: row.description,
                last_change: value_to_u64(&row.lastchange).unwrap_or(0) as i64,
            })
            .collect())
    }

    /// Gather the dozen count statistics behind the "show status" command.
    pub async fn server_status(&self) -> AppResult<ZabbixStatus> {
        let version = self.api_version().await?;

        let hosts_enabled = self
            .count("host.get", json!({ "filter": { "status": 0 } }))
            .await?;
        let hosts_disabled = self
            .count("host.get", json!({ "filter": { "status": 1 } }))
            .await?;
        let templates = self.count("template.get", json!({})).await?;

        let items_enabled = self
            .count("item.get", json!({ "filter": { "status": 0 } }))
            .await?;
        let items_disabled = self
            .count("item.get", json!({ "filter": { "status": 1 } }))
            .await?;
        let items_unsupported = self
            .count("item.get", json!({ "filter": { "state": 1 } }))
            .await?;

        let triggers_enabled = self
            .count("trigger.get", json!({ "filter": { "status": 0 } }))
            .await?;
        let triggers_disabled = self
            .count("trigger.get", json!({ "filter": { "status": 1 } }))
            .await?;
        let triggers_ok = self
            .count(
                "trigger.get",
                json!({ "filter": { "status": 0, "value": 0 } }),
            )
            .await?;
        let triggers_problem = self
            .count(
                "trigger.get",
                json!({ "filter": { "status": 0, "value": 1 } }),
            )
            .await?;

        let users = self.count("user.get", json!({})).await?;
        let web_scenarios = self.count("httptest.get", json!({})).await?;

        Ok(ZabbixStatus {
            version,
            hosts_enabled,
            hosts_disabled,
            templates,
            items_enabled,
            items_disabled,
            items_unsupported,
            triggers_enabled,
            triggers_disabled,
            triggers_ok,
            triggers_problem,
            users,
            web_scenarios,
        })
    }

    /// Run a countOutput query. Zabbix returns the count as a JSON string.
    async fn count(&self, method: &str, mut params: Value) -> AppResult<u64> {
        params["countOutput"] = json!(true);
        let result: Value = self.call(method, params, true).await?;
        value_to_u64(&result).ok_or_else(|| {
            AppError::zabbix_invalid_response(format!("{} countOutput was not a number", method))
        })
    }

    // ============================================
    // JSON-RPC plumbing
    // ============================================

    async fn ensure_auth(&self) -> AppResult<String> {
        if let Some(token) = self.auth.read().await.clone() {
            return Ok(token);
        }
        let token: String = self
            .call(
                "user.login",
                json!({ "user": self.username, "password": self.password }),
                false,
            )
            .await
            .map_err(|e| match e.code {
                crate::models::ErrorCode::ZabbixApiError => {
                    AppError::zabbix_auth_failed(e.message)
                }
                _ => e,
            })?;
        info!("Authenticated to the Zabbix API");
        *self.auth.write().await = Some(token.clone());
        Ok(token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        authed: bool,
    ) -> AppResult<T> {
        let auth = if authed {
            Some(Box::pin(self.ensure_auth()).await?)
        } else {
            None
        };
        debug!(method, "Zabbix JSON-RPC call");

        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "auth": auth,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    AppError::zabbix_unreachable(format!("Zabbix API unreachable: {}", e))
                } else {
                    AppError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::zabbix_unreachable(format!(
                "Zabbix API returned HTTP {}",
                status
            )));
        }

        let rpc: RpcResponse = response.json().await.map_err(|e| {
            AppError::with_source(
                crate::models::ErrorCode::ZabbixInvalidResponse,
                "Malformed Zabbix JSON-RPC response",
                e,
            )
        })?;

        if let Some(err) = rpc.error {
            // An expired session comes back as a "re-login" error; drop the
            // cached token so the next call re-authenticates.
            if err.data.as_deref().unwrap_or("").contains("re-login") {
                *self.auth.write().await = None;
            }
            return Err(AppError::zabbix_api(format!(
                "{} failed ({}): {} {}",
                method,
                err.code,
                err.message,
                err.data.unwrap_or_default()
            )));
        }

        let result = rpc.result.ok_or_else(|| {
            AppError::zabbix_invalid_response(format!("{} returned no result", method))
        })?;
        serde_json::from_value(result).map_err(|e| {
            AppError::with_source(
                crate::models::ErrorCode::ZabbixInvalidResponse,
                format!("Unexpected {} result shape", method),
                e,
            )
        })
    }
}

/// Zabbix is inconsistent about numbers: counts and timestamps arrive as
/// strings in some versions and integers in others.
fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_to_u64() {
        assert_eq!(value_to_u64(&json!(13)), Some(13));
        assert_eq!(value_to_u64(&json!("13")), Some(13));
        assert_eq!(value_to_u64(&json!(null)), None);
        assert_eq!(value_to_u64(&json!([1])), None);
    }
}
