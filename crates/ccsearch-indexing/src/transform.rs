//! Log entry to searchable record transformation.
//!
//! Every entry is parsed as a generic [`DocumentEnvelope`] first. The
//! envelope's `type` selects a [`RecordTransformer`] from the registry;
//! unregistered types produce no record. Identifiers are derived from the
//! raw payload bytes, so adding a transformer never changes the ids of
//! types already registered.

use std::collections::HashMap;

use ccsearch_types::{
    derive_cdid, DocumentEnvelope, LogEntry, MessageDocument, RecordType, SearchableRecord,
};

use crate::error::IndexingError;

/// Turns one recognized document type into a searchable record.
pub trait RecordTransformer: Send + Sync {
    fn record_type(&self) -> RecordType;

    /// Build the record. `cdid` is the content identifier without prefix.
    fn transform(
        &self,
        entry: &LogEntry,
        envelope: &DocumentEnvelope,
        cdid: &str,
    ) -> Result<SearchableRecord, IndexingError>;
}

/// `"message"` documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageTransformer;

impl RecordTransformer for MessageTransformer {
    fn record_type(&self) -> RecordType {
        RecordType::Message
    }

    fn transform(
        &self,
        entry: &LogEntry,
        _envelope: &DocumentEnvelope,
        cdid: &str,
    ) -> Result<SearchableRecord, IndexingError> {
        let message = MessageDocument::parse(&entry.document)?;
        Ok(SearchableRecord {
            id: SearchableRecord::make_id(RecordType::Message, cdid),
            record_type: RecordType::Message,
            body: message.body,
            schema: message.schema,
            signed_at: message.signed_at.timestamp_millis(),
            signer: message.signer,
            timelines: message.timelines,
        })
    }
}

/// Discriminator to transformer dispatch.
pub struct TransformerRegistry {
    transformers: HashMap<&'static str, Box<dyn RecordTransformer>>,
}

impl Default for TransformerRegistry {
    /// Registry with the built-in message transformer.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(MessageTransformer));
        registry
    }
}

impl TransformerRegistry {
    pub fn empty() -> Self {
        Self {
            transformers: HashMap::new(),
        }
    }

    /// Register a transformer under its type's discriminator, replacing any
    /// previous one.
    pub fn register(&mut self, transformer: Box<dyn RecordTransformer>) {
        let discriminator = transformer.record_type().discriminator();
        self.transformers.insert(discriminator, transformer);
    }

    pub fn is_registered(&self, doc_type: &str) -> bool {
        self.transformers.contains_key(doc_type)
    }

    /// Transform one entry.
    ///
    /// `Ok(None)` for unregistered types; `Err` when the payload is not a
    /// valid document of its declared shape.
    pub fn transform(&self, entry: &LogEntry) -> Result<Option<SearchableRecord>, IndexingError> {
        let envelope = DocumentEnvelope::parse(&entry.document)?;

        let Some(transformer) = self.transformers.get(envelope.doc_type.as_str()) else {
            return Ok(None);
        };

        let cdid = derive_cdid(entry.payload(), envelope.signed_at_ms());
        transformer.transform(entry, &envelope, &cdid).map(Some)
    }
}
