//! Typed transport errors and the classifier that builds them.
//!
//! Every failure in the transport surfaces as one [`ApiError`]. Callers use
//! the predicates (`is_unauthorized`, `is_rate_limited`,
//! `is_insufficient_quota`) to pick their messaging; nothing in this crate
//! retries on the basis of a classification.

use std::fmt;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Provider codes that mean the account has run out of credit.
const QUOTA_CODES: &[&str] = &["INSUFFICIENT_CREDITS", "insufficient_quota"];
const STREAM_ERROR_FALLBACK: &str = "Stream Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthMissing,
    Unauthorized,
    RateLimited,
    QuotaExhausted,
    Upstream,
    MalformedStream,
    Transport,
}

impl ErrorKind {
    /// Stable machine code for the kind.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AuthMissing => "API_KEY_MISSING",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::QuotaExhausted => "INSUFFICIENT_CREDITS",
            ErrorKind::Upstream => "API_ERROR",
            ErrorKind::MalformedStream => "MALFORMED_STREAM",
            ErrorKind::Transport => "TRANSPORT_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    kind: ErrorKind,
    status: u16,
    message: String,
    code: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            code: kind.code().to_string(),
        }
    }

    pub fn auth_missing() -> Self {
        Self::new(
            ErrorKind::AuthMissing,
            StatusCode::UNAUTHORIZED.as_u16(),
            "Please configure your API key (hubchat set api-key <KEY> or HUBCHAT_API_KEY)",
        )
    }

    pub fn malformed_stream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedStream, 0, message)
    }

    pub fn transport(err: &reqwest::Error) -> Self {
        let status = err.status().map(|status| status.as_u16()).unwrap_or(0);
        Self::new(ErrorKind::Transport, status, err.to_string())
    }

    /// Builds an error from a non-2xx response.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let message = parsed
            .as_ref()
            .and_then(extract_message)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));
        let code = parsed.as_ref().and_then(extract_code);

        Self::classified(status.as_u16(), message, code)
    }

    /// Builds an error from an error object found inside a successfully
    /// parsed payload, if there is one.
    pub fn from_payload(status: StatusCode, payload: &Value) -> Option<Self> {
        let error = payload.get("error").filter(|error| is_error_value(error))?;
        let message = error
            .get("message")
            .and_then(non_empty_str)
            .or_else(|| error.get("code").and_then(code_to_string))
            .or_else(|| non_empty_str(error))
            .unwrap_or_else(|| STREAM_ERROR_FALLBACK.to_string());
        let code = extract_code(payload);

        Some(Self::classified(status.as_u16(), message, code))
    }

    fn classified(status: u16, message: String, code: Option<String>) -> Self {
        let kind = match code.as_deref() {
            Some(code) if QUOTA_CODES.contains(&code) => ErrorKind::QuotaExhausted,
            _ => match status {
                401 => ErrorKind::Unauthorized,
                429 => ErrorKind::RateLimited,
                _ => ErrorKind::Upstream,
            },
        };

        Self {
            kind,
            status,
            message,
            code: code.unwrap_or_else(|| ErrorKind::Upstream.code().to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status that carried the error; 0 when no response was received.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Provider error code when one was supplied, else the kind's code.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    pub fn is_insufficient_quota(&self) -> bool {
        QUOTA_CODES.contains(&self.code.as_str())
    }
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Only an object or a non-empty string counts as an in-band error;
/// `false`, `0` and `""` ride along with normal deltas on some gateways.
fn is_error_value(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::String(text) => !text.trim().is_empty(),
        _ => false,
    }
}

fn code_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(code) if !code.is_empty() => Some(code.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}

fn extract_message(value: &Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(non_empty_str)
        .or_else(|| value.get("message").and_then(non_empty_str))
        .or_else(|| value.get("error").and_then(non_empty_str))
        .or_else(|| non_empty_str(value))
}

fn extract_code(value: &Value) -> Option<String> {
    value.pointer("/error/code").and_then(code_to_string)
}
