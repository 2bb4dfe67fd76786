//! Searchable record: the flat unit upserted into the search index.

use serde::{Deserialize, Serialize};

/// Recognized record kinds and their identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Message,
}

impl RecordType {
    /// One-character prefix prepended to the content identifier.
    pub fn id_prefix(&self) -> char {
        match self {
            RecordType::Message => 'm',
        }
    }

    /// Document type discriminator this record kind is produced from.
    pub fn discriminator(&self) -> &'static str {
        match self {
            RecordType::Message => "message",
        }
    }
}

/// A record in the search index. Serialized with camelCase keys, which are
/// also the attribute names the index is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchableRecord {
    /// Type prefix plus content identifier
    pub id: String,

    #[serde(rename = "type")]
    pub record_type: RecordType,

    pub body: serde_json::Value,

    pub schema: String,

    /// Epoch milliseconds
    pub signed_at: i64,

    pub signer: String,

    pub timelines: Vec<String>,
}

impl SearchableRecord {
    /// Build a record id from its type prefix and content identifier.
    pub fn make_id(record_type: RecordType, cdid: &str) -> String {
        let mut id = String::with_capacity(cdid.len() + 1);
        id.push(record_type.id_prefix());
        id.push_str(cdid);
        id
    }
}
