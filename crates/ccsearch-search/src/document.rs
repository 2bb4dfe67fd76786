//! Mapping between searchable records and Tantivy documents.

use serde_json::{Map, Value};
use tantivy::schema::Value as _;
use tantivy::TantivyDocument;

use ccsearch_types::SearchableRecord;

use crate::engine::Hit;
use crate::schema::{
    RecordSchema, FIELD_BODY, FIELD_ID, FIELD_SCHEMA, FIELD_SIGNED_AT, FIELD_SIGNER,
    FIELD_TIMELINES, FIELD_TYPE,
};

/// Convert a record to a Tantivy document.
pub fn record_to_doc(schema: &RecordSchema, record: &SearchableRecord) -> TantivyDocument {
    let mut doc = TantivyDocument::default();
    doc.add_text(schema.id, &record.id);
    doc.add_text(schema.record_type, record.record_type.discriminator());
    doc.add_text(schema.body, record.body.to_string());
    doc.add_text(schema.text, extract_text(&record.body));
    doc.add_text(schema.body_schema, &record.schema);
    doc.add_text(schema.signer, &record.signer);
    for timeline in &record.timelines {
        doc.add_text(schema.timelines, timeline);
    }
    doc.add_i64(schema.signed_at, record.signed_at);
    doc
}

/// Rebuild the stored record as a JSON hit.
pub fn doc_to_hit(schema: &RecordSchema, doc: &TantivyDocument) -> Hit {
    let text = |field| {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .map(|s| Value::String(s.to_string()))
    };

    let mut hit = Map::new();
    if let Some(id) = text(schema.id) {
        hit.insert(FIELD_ID.into(), id);
    }
    if let Some(record_type) = text(schema.record_type) {
        hit.insert(FIELD_TYPE.into(), record_type);
    }
    if let Some(raw) = doc.get_first(schema.body).and_then(|v| v.as_str()) {
        let body = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        hit.insert(FIELD_BODY.into(), body);
    }
    if let Some(body_schema) = text(schema.body_schema) {
        hit.insert(FIELD_SCHEMA.into(), body_schema);
    }
    if let Some(signed_at) = doc.get_first(schema.signed_at).and_then(|v| v.as_i64()) {
        hit.insert(FIELD_SIGNED_AT.into(), Value::from(signed_at));
    }
    if let Some(signer) = text(schema.signer) {
        hit.insert(FIELD_SIGNER.into(), signer);
    }
    let timelines: Vec<Value> = doc
        .get_all(schema.timelines)
        .filter_map(|v| v.as_str().map(|s| Value::String(s.to_string())))
        .collect();
    hit.insert(FIELD_TIMELINES.into(), Value::Array(timelines));
    hit
}

/// Collect every string leaf of a JSON body into one searchable text.
pub fn extract_text(body: &Value) -> String {
    let mut parts = Vec::new();
    collect_strings(body, &mut parts);
    parts.join(" ")
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_record_schema;
    use ccsearch_types::RecordType;
    use serde_json::json;

    fn sample() -> SearchableRecord {
        SearchableRecord {
            id: "mabc".into(),
            record_type: RecordType::Message,
            body: json!({"body": "hello world", "emojis": {"x": {"imageURL": "https://e"}}}),
            schema: "https://schema.example/m.json".into(),
            signed_at: 1_700_000_000_000,
            signer: "con1abc".into(),
            timelines: vec!["tl1".into(), "tl2".into()],
        }
    }

    #[test]
    fn test_extract_text() {
        let text = extract_text(&json!({"body": "hello", "tags": ["a", 1, "b"], "n": 3}));
        assert!(text.contains("hello"));
        assert!(text.contains('a'));
        assert!(text.contains('b'));
        assert!(!text.contains('3'));
    }

    #[test]
    fn test_record_hit_roundtrip() {
        let schema = build_record_schema();
        let record = sample();
        let doc = record_to_doc(&schema, &record);
        let hit = doc_to_hit(&schema, &doc);

        let rebuilt: SearchableRecord = serde_json::from_value(Value::Object(hit)).unwrap();
        assert_eq!(rebuilt, record);
    }
}
