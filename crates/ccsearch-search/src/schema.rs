//! Tantivy schema for searchable records.
//!
//! Stored fields mirror the record's JSON keys so hits can be rebuilt in
//! the same shape Meilisearch returns. `text` holds the searchable body
//! text and is not stored.

use tantivy::schema::{Field, Schema, FAST, INDEXED, STORED, STRING, TEXT};

use crate::SearchError;

pub const FIELD_ID: &str = "id";
pub const FIELD_TYPE: &str = "type";
pub const FIELD_BODY: &str = "body";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_SCHEMA: &str = "schema";
pub const FIELD_SIGNER: &str = "signer";
pub const FIELD_TIMELINES: &str = "timelines";
pub const FIELD_SIGNED_AT: &str = "signedAt";

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct RecordSchema {
    schema: Schema,
    /// Primary key (STRING | STORED)
    pub id: Field,
    /// Record type, e.g. "message" (STRING | STORED)
    pub record_type: Field,
    /// Raw body JSON (STORED)
    pub body: Field,
    /// Flattened body text (TEXT)
    pub text: Field,
    /// Body schema URL (STRING | STORED)
    pub body_schema: Field,
    /// Signer (STRING | STORED)
    pub signer: Field,
    /// Timelines, one value per timeline (STRING | STORED)
    pub timelines: Field,
    /// Epoch milliseconds (INDEXED | STORED | FAST)
    pub signed_at: Field,
}

impl RecordSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a RecordSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            id: field(FIELD_ID)?,
            record_type: field(FIELD_TYPE)?,
            body: field(FIELD_BODY)?,
            text: field(FIELD_TEXT)?,
            body_schema: field(FIELD_SCHEMA)?,
            signer: field(FIELD_SIGNER)?,
            timelines: field(FIELD_TIMELINES)?,
            signed_at: field(FIELD_SIGNED_AT)?,
            schema,
        })
    }

    /// Exact-match string field for a record attribute.
    pub fn keyword_field(&self, attribute: &str) -> Option<Field> {
        match attribute {
            FIELD_ID => Some(self.id),
            FIELD_TYPE => Some(self.record_type),
            FIELD_SCHEMA => Some(self.body_schema),
            FIELD_SIGNER => Some(self.signer),
            FIELD_TIMELINES => Some(self.timelines),
            _ => None,
        }
    }
}

/// Build the record schema.
pub fn build_record_schema() -> RecordSchema {
    let mut schema_builder = Schema::builder();

    let id = schema_builder.add_text_field(FIELD_ID, STRING | STORED);
    let record_type = schema_builder.add_text_field(FIELD_TYPE, STRING | STORED);
    let body = schema_builder.add_text_field(FIELD_BODY, STORED);
    let text = schema_builder.add_text_field(FIELD_TEXT, TEXT);
    let body_schema = schema_builder.add_text_field(FIELD_SCHEMA, STRING | STORED);
    let signer = schema_builder.add_text_field(FIELD_SIGNER, STRING | STORED);
    let timelines = schema_builder.add_text_field(FIELD_TIMELINES, STRING | STORED);
    let signed_at = schema_builder.add_i64_field(FIELD_SIGNED_AT, INDEXED | STORED | FAST);

    RecordSchema {
        schema: schema_builder.build(),
        id,
        record_type,
        body,
        text,
        body_schema,
        signer,
        timelines,
        signed_at,
    }
}
