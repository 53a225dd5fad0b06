//! Response classification.
//!
//! # Responsibilities
//! - Decode 2xx bodies as JSON
//! - Map every other status to an [`ApiError`] kind
//! - Strip technical fragments from server messages before they reach the UI
//!
//! # Design Decisions
//! - 401/403 are split on substrings of the server message. The backend has
//!   no structured error code, so the wording heuristics stay until it does.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http::types::{ApiError, ApiResult, GENERIC_ERROR_MESSAGE};

/// 401 messages that mean the session is really gone.
const SESSION_EXPIRED_MARKERS: &[&str] = &[
    "expired",
    "invalid token",
    "not authenticated",
    "could not validate",
    "signature",
];

/// 403 messages that mean "busy, try later" rather than "not allowed".
const SYSTEM_BUSY_MARKERS: &[&str] = &[
    "processing",
    "busy",
    "try again",
    "temporarily",
    "in progress",
];

/// Fragments that reveal database or runtime internals.
const TECHNICAL_MARKERS: &[&str] = &[
    "sqlalchemy",
    "psycopg",
    "violates",
    "duplicate key",
    "select ",
    "insert into",
    "traceback",
    "exception",
    "foreign key",
    "asyncpg",
];

const MAX_DISPLAY_LEN: usize = 300;

/// Decode a response, classifying non-2xx statuses.
pub async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await?;
    decode_body(status, &body)
}

/// Check the status only, discarding the body (object storage uploads).
pub async fn ensure_success(response: reqwest::Response) -> ApiResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status.as_u16(), &body))
}

/// Decode `body` for `status`.
pub fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> ApiResult<T> {
    if !status.is_success() {
        return Err(classify_status(status.as_u16(), body));
    }
    if body.trim().is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_str(body)?)
}

/// Map a non-2xx status and its body to an error kind.
pub fn classify_status(status: u16, body: &str) -> ApiError {
    let raw = extract_server_message(body).unwrap_or_default();
    let lowered = raw.to_lowercase();

    match status {
        401 => {
            if contains_any(&lowered, SESSION_EXPIRED_MARKERS) {
                ApiError::SessionExpired(raw)
            } else {
                ApiError::TransientAuth(raw)
            }
        }
        402 => {
            let message = sanitize_message(&raw);
            if message == GENERIC_ERROR_MESSAGE {
                ApiError::UsageLimitReached(String::new())
            } else {
                ApiError::UsageLimitReached(message)
            }
        }
        403 => {
            if contains_any(&lowered, SYSTEM_BUSY_MARKERS) {
                ApiError::SystemBusy(raw)
            } else {
                ApiError::Forbidden(sanitize_message(&raw))
            }
        }
        429 => ApiError::RateLimited(raw),
        500..=599 => ApiError::ServerError {
            status,
            message: sanitize_message(&raw),
        },
        400..=499 => ApiError::ClientError {
            status,
            message: sanitize_message(&raw),
        },
        _ => {
            tracing::warn!(status, "Unexpected non-success status");
            ApiError::UnexpectedStatus { status }
        }
    }
}

/// Pull the human-readable message out of an error body.
///
/// Looks at `detail`, `message` and `error` (in that order); validation
/// error arrays use the first entry's `msg`. Non-JSON bodies are returned
/// as-is.
pub fn extract_server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    for field in ["detail", "message", "error"] {
        match json.get(field) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Array(items)) => {
                if let Some(msg) = items
                    .first()
                    .and_then(|item| item.get("msg"))
                    .and_then(Value::as_str)
                {
                    return Some(msg.to_string());
                }
            }
            Some(Value::Object(obj)) => {
                if let Some(msg) = obj.get("message").and_then(Value::as_str) {
                    return Some(msg.to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Replace messages that leak internals with a generic one.
pub fn sanitize_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty()
        || trimmed.len() > MAX_DISPLAY_LEN
        || contains_any(&trimmed.to_lowercase(), TECHNICAL_MARKERS)
        || contains_uuid(trimmed)
    {
        return GENERIC_ERROR_MESSAGE.to_string();
    }
    trimmed.to_string()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn contains_uuid(text: &str) -> bool {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .any(|token| token.len() == 36 && uuid::Uuid::parse_str(token).is_ok())
}
