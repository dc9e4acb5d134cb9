//! Response envelope types
//!
//! Defines the parsed page and the GraphQL error entries it may carry.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Error code ShipHero uses to signal credit exhaustion
pub const RATE_LIMIT_CODE: i64 = 30;

/// Vendor metadata attached to a GraphQL error entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorExtensions {
    /// Credits the rejected query would have cost
    #[serde(default)]
    pub required_credits: Option<Value>,
    /// Credits left in the account's bucket
    #[serde(default)]
    pub remaining_credits: Option<Value>,
    /// Human-readable wait, e.g. `"10 seconds"`
    #[serde(default, deserialize_with = "lenient_hint")]
    pub time_remaining: Option<String>,
}

/// One entry of the top-level `errors` list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphQlError {
    /// Numeric error code; ShipHero sometimes sends it as a string
    #[serde(default, deserialize_with = "lenient_code")]
    pub code: Option<i64>,
    /// Error message; `null` reads as empty
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,
    /// Vendor extensions; dropped when not an object
    #[serde(default, deserialize_with = "lenient_extensions")]
    pub extensions: Option<ErrorExtensions>,
    /// Wait hint some responses carry outside `extensions`
    #[serde(
        default,
        deserialize_with = "lenient_hint",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_remaining: Option<String>,
}

impl GraphQlError {
    /// Whether this entry is the rate-limit signal
    pub fn is_rate_limit(&self) -> bool {
        self.code == Some(RATE_LIMIT_CODE)
    }

    /// Wait hint, from `extensions.time_remaining` or the entry itself
    pub fn retry_hint(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.time_remaining.as_deref())
            .or(self.time_remaining.as_deref())
    }

    fn from_raw(raw: &Value) -> Self {
        serde_json::from_value(raw.clone()).unwrap_or_else(|_| Self {
            code: None,
            message: raw.to_string(),
            extensions: None,
            time_remaining: None,
        })
    }
}

impl fmt::Display for GraphQlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_message<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn lenient_hint<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_extensions<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<ErrorExtensions>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

/// A parsed page body
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    envelope: Value,
    errors: Vec<GraphQlError>,
}

impl PageResponse {
    /// Parse a raw body, keeping decimals exactly as sent
    pub fn parse(body: &str) -> Result<Self> {
        let envelope: Value = serde_json::from_str(body)
            .map_err(|e| Error::decode(format!("Response body is not valid JSON: {e}")))?;
        Ok(Self::from_value(envelope))
    }

    /// Wrap an already-parsed envelope
    pub fn from_value(envelope: Value) -> Self {
        let errors = envelope
            .get("errors")
            .and_then(Value::as_array)
            .map(|list| list.iter().map(GraphQlError::from_raw).collect())
            .unwrap_or_default();
        Self { envelope, errors }
    }

    /// The whole envelope
    pub fn envelope(&self) -> &Value {
        &self.envelope
    }

    /// Consume into the envelope
    pub fn into_envelope(self) -> Value {
        self.envelope
    }

    /// Top-level GraphQL errors
    pub fn errors(&self) -> &[GraphQlError] {
        &self.errors
    }

    /// Whether the body carries a non-empty error list
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// First rate-limit entry, if any
    pub fn rate_limit(&self) -> Option<&GraphQlError> {
        self.errors.iter().find(|e| e.is_rate_limit())
    }

    /// All error messages joined with `"; "`
    pub fn error_messages(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `data.<stream_key>`, when present and not null
    pub fn connection(&self, stream_key: &str) -> Option<&Value> {
        self.envelope
            .get("data")?
            .get(stream_key)
            .filter(|v| !v.is_null())
    }
}
