use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::http::header::{InvalidHeaderName, InvalidHeaderValue};

/// Failure reported by the service in a text frame.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceError {
    pub error: String,
    #[serde(default, deserialize_with = "lenient_code", skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

// Non-numeric codes are dropped rather than rejected.
fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok()))
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header value error: {0}")]
    HeaderValue(#[from] InvalidHeaderValue),

    #[error("Header name error: {0}")]
    HeaderName(#[from] InvalidHeaderName),

    #[error("Text to Speech service error: {}", .0.error)]
    Service(ServiceError),

    #[error("Connection closed abnormally with code {code}: {reason}")]
    AbnormalClosure { code: u16, reason: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid synthesize options: {0}")]
    InvalidOptions(String),

    #[error("The synthesize request was already sent on this connection")]
    RequestAlreadySent,
}

pub type Result<T> = std::result::Result<T, Error>;
