//! Centralized error handling.
//!
//! Every failure carries a unique error code so log lines can be grepped
//! and counted in production.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - SPARK_xxx: Spark API errors
//! - ZBX_xxx: Zabbix API errors
//! - API_xxx: errors surfaced by our own HTTP API
//! - CFG_xxx: configuration errors
//! - TASK_xxx: task queue / dispatch errors

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::fmt;

/// Application-wide error type.
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Error code as string, for logging.
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Spark API errors
    // ============================================
    /// Could not reach the Spark API at all
    SparkUnreachable,
    /// Spark API request timed out
    SparkTimeout,
    /// Spark API rate limited us (HTTP 429)
    SparkRateLimited,
    /// Spark API returned a server-side error (5xx)
    SparkServerError,
    /// Spark API rejected the request (other 4xx)
    SparkApiError,
    /// Spark API response could not be parsed
    SparkInvalidResponse,

    // ============================================
    // Zabbix API errors
    // ============================================
    /// Could not reach the Zabbix API
    ZabbixUnreachable,
    /// Zabbix JSON-RPC call returned an error object
    ZabbixApiError,
    /// Zabbix rejected the configured credentials
    ZabbixAuthFailed,
    /// Zabbix response could not be parsed
    ZabbixInvalidResponse,

    // ============================================
    // Our own HTTP API errors
    // ============================================
    /// Invalid request format
    ApiBadRequest,
    /// Missing or invalid API token
    ApiUnauthorized,
    /// Webhook signature missing or mismatched
    ApiForbidden,
    /// Request body exceeded the size limit
    ApiPayloadTooLarge,
    /// Internal server error
    ApiInternalError,

    // ============================================
    // Configuration errors
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Task errors
    // ============================================
    /// Task queue is no longer accepting work
    TaskQueueClosed,

    /// Unknown error
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SparkUnreachable => "SPARK_UNREACHABLE",
            Self::SparkTimeout => "SPARK_TIMEOUT",
            Self::SparkRateLimited => "SPARK_RATE_LIMITED",
            Self::SparkServerError => "SPARK_SERVER_ERROR",
            Self::SparkApiError => "SPARK_API_ERROR",
            Self::SparkInvalidResponse => "SPARK_INVALID_RESPONSE",

            Self::ZabbixUnreachable => "ZBX_UNREACHABLE",
            Self::ZabbixApiError => "ZBX_API_ERROR",
            Self::ZabbixAuthFailed => "ZBX_AUTH_FAILED",
            Self::ZabbixInvalidResponse => "ZBX_INVALID_RESPONSE",

            Self::ApiBadRequest => "API_BAD_REQUEST",
            Self::ApiUnauthorized => "API_UNAUTHORIZED",
            Self::ApiForbidden => "API_FORBIDDEN",
            Self::ApiPayloadTooLarge => "API_PAYLOAD_TOO_LARGE",
            Self::ApiInternalError => "API_INTERNAL_ERROR",

            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::TaskQueueClosed => "TASK_QUEUE_CLOSED",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status code to surface for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiBadRequest | Self::ConfigInvalidValue => 400,
            Self::ApiUnauthorized => 401,
            Self::ApiForbidden => 403,
            Self::ApiPayloadTooLarge => 413,
            Self::SparkRateLimited => 429,
            _ => 500,
        }
    }

    /// Whether a task hitting this error should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SparkUnreachable
                | Self::SparkTimeout
                | Self::SparkRateLimited
                | Self::SparkServerError
                | Self::ZabbixUnreachable
                | Self::ZabbixApiError
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Map a non-2xx Spark API status to the right error class.
    pub fn spark_status(status: u16, msg: impl Into<String>) -> Self {
        let code = match status {
            429 => ErrorCode::SparkRateLimited,
            500..=599 => ErrorCode::SparkServerError,
            _ => ErrorCode::SparkApiError,
        };
        Self::new(code, msg)
    }

    pub fn spark_invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SparkInvalidResponse, msg)
    }

    pub fn zabbix_unreachable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ZabbixUnreachable, msg)
    }

    pub fn zabbix_api(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ZabbixApiError, msg)
    }

    pub fn zabbix_auth_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ZabbixAuthFailed, msg)
    }

    pub fn zabbix_invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ZabbixInvalidResponse, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiBadRequest, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::ApiUnauthorized, "Token authentication failed")
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiForbidden, msg)
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiPayloadTooLarge, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ApiInternalError, msg)
    }

    pub fn missing_env(name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingEnv,
            format!("Missing environment variable: {}", name),
        )
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }

    pub fn queue_closed() -> Self {
        Self::new(ErrorCode::TaskQueueClosed, "Task queue is shut down")
    }
}

/// Errors that escape an API handler become a JSON `{"error": ...}` body
/// with the status from [`ErrorCode::http_status`].
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// ============================================
// Result type alias
// ============================================

pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::SparkTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::SparkUnreachable, "Connection failed")
        } else {
            Self::with_source(ErrorCode::Unknown, "HTTP client error", err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::SparkInvalidResponse, "JSON parse error", err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}
