//! Signed document shapes.
//!
//! Every log payload is first parsed as a [`DocumentEnvelope`], the generic
//! shape shared by all document types. Recognized types are then re-parsed
//! into their richer shape (e.g. [`MessageDocument`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CcSearchError;

/// Generic shape of a signed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEnvelope {
    /// Type discriminator (e.g. "message")
    #[serde(rename = "type")]
    pub doc_type: String,

    /// When the signer produced the document
    #[serde(with = "signed_at")]
    pub signed_at: DateTime<Utc>,

    /// Signer identity
    #[serde(default, deserialize_with = "nullable")]
    pub signer: String,

    /// Schema URL of the body
    #[serde(default, deserialize_with = "nullable")]
    pub schema: String,

    /// Timeline scopes the document was posted to
    #[serde(default, deserialize_with = "nullable")]
    pub timelines: Vec<String>,

    /// Opaque body
    #[serde(default)]
    pub body: serde_json::Value,
}

impl DocumentEnvelope {
    /// Parse a raw payload.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self, CcSearchError> {
        serde_json::from_slice(raw.as_ref())
            .map_err(|e| CcSearchError::MalformedDocument(e.to_string()))
    }

    /// `signedAt` as epoch milliseconds.
    pub fn signed_at_ms(&self) -> i64 {
        self.signed_at.timestamp_millis()
    }
}

/// A `"message"` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDocument {
    #[serde(default)]
    pub body: serde_json::Value,

    #[serde(default, deserialize_with = "nullable")]
    pub schema: String,

    #[serde(default, deserialize_with = "nullable")]
    pub signer: String,

    #[serde(default, deserialize_with = "nullable")]
    pub timelines: Vec<String>,

    #[serde(with = "signed_at")]
    pub signed_at: DateTime<Utc>,
}

impl MessageDocument {
    /// Parse a raw payload.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self, CcSearchError> {
        serde_json::from_slice(raw.as_ref())
            .map_err(|e| CcSearchError::MalformedDocument(e.to_string()))
    }
}

/// Treat an explicit `null` the same as an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `signedAt` accepts an RFC 3339 string or integer epoch milliseconds.
mod signed_at {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireTimestamp {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match WireTimestamp::deserialize(deserializer)? {
            WireTimestamp::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| D::Error::custom(format!("signedAt out of range: {ms}"))),
            WireTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| D::Error::custom(format!("invalid signedAt '{text}': {e}"))),
        }
    }
}
