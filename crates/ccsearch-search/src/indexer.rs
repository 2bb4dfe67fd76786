//! Upserts records into the embedded index.
//!
//! Documents are not visible until the batch commits and the reader is
//! reloaded; a failed batch is rolled back as a whole.

use tantivy::{IndexWriter, Term};
use tracing::{debug, warn};

use ccsearch_types::SearchableRecord;

use crate::document::record_to_doc;
use crate::error::SearchError;
use crate::index::SearchIndex;

/// Insert or replace `records` by id, then commit. Returns the count written.
pub fn upsert_records(index: &SearchIndex, records: &[SearchableRecord]) -> Result<usize, SearchError> {
    let mut writer = index
        .writer()
        .lock()
        .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

    if let Err(e) = stage(index, &writer, records) {
        warn!(error = %e, "Upsert failed, rolling back");
        writer.rollback()?;
        return Err(e);
    }

    let opstamp = writer.commit()?;
    index.reader().reload()?;
    debug!(count = records.len(), opstamp, "Committed records");
    Ok(records.len())
}

fn stage(index: &SearchIndex, writer: &IndexWriter, records: &[SearchableRecord]) -> Result<(), SearchError> {
    let schema = index.schema();
    for record in records {
        // A later delete removes every earlier add, including earlier adds
        // of the same id within this batch.
        writer.delete_term(Term::from_field_text(schema.id, &record.id));
        writer.add_document(record_to_doc(schema, record))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchIndexConfig;
    use ccsearch_types::RecordType;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(id: &str, text: &str) -> SearchableRecord {
        SearchableRecord {
            id: id.into(),
            record_type: RecordType::Message,
            body: json!({ "body": text }),
            schema: "https://schema.example/m.json".into(),
            signed_at: 1_700_000_000_000,
            signer: "con1abc".into(),
            timelines: vec!["tl1".into()],
        }
    }

    fn num_docs(index: &SearchIndex) -> u64 {
        index.reader().searcher().num_docs()
    }

    #[test]
    fn test_upsert_is_visible_on_return() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::create(&SearchIndexConfig::new(temp_dir.path())).unwrap();

        let written = upsert_records(&index, &[record("m1", "a"), record("m2", "b")]).unwrap();
        assert_eq!(written, 2);
        assert_eq!(num_docs(&index), 2);
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::create(&SearchIndexConfig::new(temp_dir.path())).unwrap();

        upsert_records(&index, &[record("m1", "first")]).unwrap();
        upsert_records(&index, &[record("m1", "second")]).unwrap();
        assert_eq!(num_docs(&index), 1);
    }

    #[test]
    fn test_duplicate_ids_in_one_batch() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::create(&SearchIndexConfig::new(temp_dir.path())).unwrap();

        upsert_records(&index, &[record("m1", "x"), record("m1", "x")]).unwrap();
        assert_eq!(num_docs(&index), 1);
    }
}
