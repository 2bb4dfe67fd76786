//! The sync engine: log pages in, index upserts out, cursor forward.
//!
//! One cycle reads the cursor, then repeatedly fetches a page after it,
//! transforms the page into records, upserts them and persists the new
//! cursor. The cursor is written only after its page's upsert succeeded,
//! so a crash or failure replays at most one page; replays are harmless
//! because record ids are content-addressed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use ccsearch_search::SearchEngine;
use ccsearch_types::SyncSettings;

use crate::checkpoint::CheckpointStore;
use crate::error::IndexingError;
use crate::guard::SyncGuard;
use crate::source::LogSource;
use crate::transform::TransformerRegistry;

/// Paging parameters for a cycle.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum entries fetched per page
    pub page_size: usize,
    /// Pause between consecutive full pages
    pub page_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 512,
            page_delay: Duration::from_secs(1),
        }
    }
}

impl SyncConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            page_size: settings.page_size.max(1),
            page_delay: Duration::from_millis(settings.page_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Another cycle was already running
    Skipped,
    /// Ran until caught up or until a page produced no records
    Completed,
    /// Stopped early on an error; the cursor reflects the last good page
    Failed,
}

/// Outcome of one `run_cycle` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub status: CycleStatus,
    /// Non-empty pages fetched
    pub pages: usize,
    /// Records upserted into the index
    pub upserted: usize,
    /// Entries of unregistered types
    pub skipped_entries: usize,
    /// Entries that failed to parse
    pub malformed_entries: usize,
    pub cursor_before: u64,
    pub cursor_after: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CycleReport {
    fn new(status: CycleStatus) -> Self {
        Self {
            status,
            pages: 0,
            upserted: 0,
            skipped_entries: 0,
            malformed_entries: 0,
            cursor_before: 0,
            cursor_after: 0,
            error: None,
        }
    }
}

pub struct SyncEngine {
    log: Arc<dyn LogSource>,
    checkpoint: Arc<dyn CheckpointStore>,
    engine: Arc<dyn SearchEngine>,
    registry: TransformerRegistry,
    config: SyncConfig,
    guard: SyncGuard,
}

impl SyncEngine {
    pub fn new(
        log: Arc<dyn LogSource>,
        checkpoint: Arc<dyn CheckpointStore>,
        engine: Arc<dyn SearchEngine>,
        registry: TransformerRegistry,
        config: SyncConfig,
    ) -> Self {
        Self {
            log,
            checkpoint,
            engine,
            registry,
            config,
            guard: SyncGuard::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether a cycle is in flight.
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Run one sync cycle. Never fails; errors are logged and reported.
    ///
    /// Returns immediately with `Skipped` if a cycle is already running.
    pub async fn run_cycle(&self) -> CycleReport {
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("Sync cycle already running, skipping");
            return CycleReport::new(CycleStatus::Skipped);
        };

        let mut report = CycleReport::new(CycleStatus::Completed);
        if let Err(e) = self.sync_pages(&mut report).await {
            error!(error = %e, cursor = report.cursor_after, "Sync cycle failed");
            report.status = CycleStatus::Failed;
            report.error = Some(e.to_string());
        }
        report
    }

    async fn load_cursor(&self) -> Result<u64, IndexingError> {
        match self.checkpoint.load().await? {
            None => {
                info!("No cursor stored, starting from the beginning");
                Ok(0)
            }
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(cursor) => Ok(cursor),
                Err(_) => {
                    warn!(value = %raw, "Stored cursor is not an integer, starting from the beginning");
                    Ok(0)
                }
            },
        }
    }

    async fn sync_pages(&self, report: &mut CycleReport) -> Result<(), IndexingError> {
        let mut cursor = self.load_cursor().await?;
        report.cursor_before = cursor;
        report.cursor_after = cursor;

        let page_size = self.config.page_size;

        loop {
            let entries = self.log.fetch_after(cursor, page_size).await?;
            if entries.is_empty() {
                debug!(cursor, "Caught up");
                break;
            }
            report.pages += 1;

            let mut next_cursor = cursor;
            let mut records = Vec::with_capacity(entries.len());
            for entry in &entries {
                match self.registry.transform(entry) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => report.skipped_entries += 1,
                    Err(e) => {
                        warn!(sequence = entry.sequence, error = %e, "Skipping malformed entry");
                        report.malformed_entries += 1;
                    }
                }
                next_cursor = next_cursor.max(entry.sequence);
            }

            if records.is_empty() {
                debug!(cursor, fetched = entries.len(), "Page produced no records");
                break;
            }

            if let Err(e) = self.engine.add_documents(&records).await {
                error!(error = %e, cursor, count = records.len(), "Upsert failed");
                return Err(e.into());
            }
            report.upserted += records.len();

            self.checkpoint.save(next_cursor).await?;
            cursor = next_cursor;
            report.cursor_after = cursor;
            info!(cursor, count = records.len(), "Indexed until");

            if entries.len() < page_size {
                break;
            }

            tokio::time::sleep(self.config.page_delay).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ccsearch_search::{SearchError, SearchQuery, SearchResponse};
    use ccsearch_types::{LogEntry, SearchableRecord};
    use serde_json::json;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct MemoryLog {
        entries: Mutex<Vec<LogEntry>>,
        fetches: Mutex<Vec<u64>>,
    }

    impl MemoryLog {
        fn push(&self, document: impl Into<Vec<u8>>) {
            let mut entries = self.entries.lock().unwrap();
            let sequence = entries.len() as u64 + 1;
            entries.push(LogEntry::new(sequence, document));
        }
    }

    #[async_trait]
    impl LogSource for MemoryLog {
        async fn fetch_after(&self, cursor: u64, limit: usize) -> Result<Vec<LogEntry>, IndexingError> {
            self.fetches.lock().unwrap().push(cursor);
            Ok(self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.sequence > cursor)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct MemoryCheckpoint {
        value: Mutex<Option<String>>,
        writes: Mutex<Vec<u64>>,
        fail_load: AtomicBool,
        fail_save: AtomicBool,
    }

    impl MemoryCheckpoint {
        fn with_value(value: &str) -> Self {
            let store = Self::default();
            *store.value.lock().unwrap() = Some(value.to_string());
            store
        }

        fn value(&self) -> Option<String> {
            self.value.lock().unwrap().clone()
        }

        fn writes(&self) -> Vec<u64> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CheckpointStore for MemoryCheckpoint {
        async fn load(&self) -> Result<Option<String>, IndexingError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(IndexingError::Checkpoint("connection refused".into()));
            }
            Ok(self.value())
        }

        async fn save(&self, cursor: u64) -> Result<(), IndexingError> {
            if self.fail_save.load(Ordering::SeqCst) {
                return Err(IndexingError::Checkpoint("connection refused".into()));
            }
            *self.value.lock().unwrap() = Some(cursor.to_string());
            self.writes.lock().unwrap().push(cursor);
            Ok(())
        }
    }

    /// Records upserts by id; can fail or block on demand.
    #[derive(Default)]
    struct RecordingEngine {
        records: Mutex<HashMap<String, SearchableRecord>>,
        batches: Mutex<Vec<usize>>,
        fail: AtomicBool,
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl RecordingEngine {
        /// Engine whose first upsert signals `entered` then waits for `release`.
        fn gated(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
            Self {
                gate: Some((entered, release)),
                ..Default::default()
            }
        }

        fn batches(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }

        fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SearchEngine for RecordingEngine {
        fn index_name(&self) -> &str {
            "test"
        }

        async fn index_exists(&self) -> Result<bool, SearchError> {
            Ok(true)
        }

        async fn create_index(&self) -> Result<(), SearchError> {
            Ok(())
        }

        async fn filterable_attributes(&self) -> Result<Vec<String>, SearchError> {
            Ok(Vec::new())
        }

        async fn set_filterable_attributes(&self, _: &[String]) -> Result<(), SearchError> {
            Ok(())
        }

        async fn sortable_attributes(&self) -> Result<Vec<String>, SearchError> {
            Ok(Vec::new())
        }

        async fn set_sortable_attributes(&self, _: &[String]) -> Result<(), SearchError> {
            Ok(())
        }

        async fn add_documents(&self, records: &[SearchableRecord]) -> Result<(), SearchError> {
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SearchError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            self.batches.lock().unwrap().push(records.len());
            let mut stored = self.records.lock().unwrap();
            for record in records {
                stored.insert(record.id.clone(), record.clone());
            }
            Ok(())
        }

        async fn search(&self, _: &SearchQuery) -> Result<SearchResponse, SearchError> {
            Ok(SearchResponse::default())
        }
    }

    fn message(n: usize) -> String {
        json!({
            "signer": "con1abc",
            "type": "message",
            "schema": "https://schema.concrnt.world/m/markdown.json",
            "body": { "body": format!("message {}", n) },
            "signedAt": "2024-03-01T12:00:00Z",
            "timelines": ["tl1"]
        })
        .to_string()
    }

    fn unknown() -> String {
        json!({"type": "association", "signedAt": "2024-03-01T12:00:00Z"}).to_string()
    }

    struct Harness {
        log: Arc<MemoryLog>,
        checkpoint: Arc<MemoryCheckpoint>,
        engine: Arc<RecordingEngine>,
        sync: Arc<SyncEngine>,
    }

    fn harness_with(checkpoint: MemoryCheckpoint, engine: RecordingEngine) -> Harness {
        let log = Arc::new(MemoryLog::default());
        let checkpoint = Arc::new(checkpoint);
        let engine = Arc::new(engine);
        let sync = Arc::new(SyncEngine::new(
            log.clone(),
            checkpoint.clone(),
            engine.clone(),
            TransformerRegistry::default(),
            SyncConfig::default(),
        ));
        Harness {
            log,
            checkpoint,
            engine,
            sync,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryCheckpoint::default(), RecordingEngine::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_pages_600_messages() {
        let h = harness();
        for n in 0..600 {
            h.log.push(message(n));
        }

        let report = h.sync.run_cycle().await;

        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(report.pages, 2);
        assert_eq!(report.upserted, 600);
        assert_eq!(report.cursor_before, 0);
        assert_eq!(report.cursor_after, 600);
        assert_eq!(h.engine.batches(), vec![512, 88]);
        assert_eq!(h.checkpoint.writes(), vec![512, 600]);
        assert_eq!(*h.log.fetches.lock().unwrap(), vec![0, 512]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_page_waits_before_next_fetch() {
        let h = harness();
        for n in 0..513 {
            h.log.push(message(n));
        }

        let started = tokio::time::Instant::now();
        let report = h.sync.run_cycle().await;
        assert_eq!(report.cursor_after, 513);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_exact_page_multiple_ends_on_empty_fetch() {
        let log = Arc::new(MemoryLog::default());
        for n in 0..4 {
            log.push(message(n));
        }
        let checkpoint = Arc::new(MemoryCheckpoint::default());
        let engine = Arc::new(RecordingEngine::default());
        let sync = SyncEngine::new(
            log.clone(),
            checkpoint.clone(),
            engine.clone(),
            TransformerRegistry::default(),
            SyncConfig {
                page_size: 2,
                page_delay: Duration::from_millis(1),
            },
        );

        let report = sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(engine.batches(), vec![2, 2]);
        assert_eq!(checkpoint.writes(), vec![2, 4]);
        assert_eq!(*log.fetches.lock().unwrap(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_resumes_from_stored_cursor() {
        let h = harness_with(MemoryCheckpoint::with_value("2"), RecordingEngine::default());
        for n in 0..5 {
            h.log.push(message(n));
        }

        let report = h.sync.run_cycle().await;
        assert_eq!(report.cursor_before, 2);
        assert_eq!(report.cursor_after, 5);
        assert_eq!(report.upserted, 3);
    }

    #[tokio::test]
    async fn test_non_numeric_cursor_starts_from_zero() {
        let h = harness_with(MemoryCheckpoint::with_value("garbage"), RecordingEngine::default());
        h.log.push(message(0));

        let report = h.sync.run_cycle().await;
        assert_eq!(report.cursor_before, 0);
        assert_eq!(report.cursor_after, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_read_failure_ends_cycle() {
        let checkpoint = MemoryCheckpoint::default();
        checkpoint.fail_load.store(true, Ordering::SeqCst);
        let h = harness_with(checkpoint, RecordingEngine::default());
        h.log.push(message(0));

        let report = h.sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Failed);
        assert!(h.log.fetches.lock().unwrap().is_empty());
        assert!(h.engine.batches().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_failure_does_not_advance_cursor() {
        let engine = RecordingEngine::default();
        engine.fail.store(true, Ordering::SeqCst);
        let h = harness_with(MemoryCheckpoint::with_value("0"), engine);
        for n in 0..3 {
            h.log.push(message(n));
        }

        let report = h.sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Failed);
        assert_eq!(report.cursor_after, 0);
        assert!(h.checkpoint.writes().is_empty());
        assert_eq!(h.checkpoint.value(), Some("0".to_string()));

        // Recovery replays the same page
        h.engine.fail.store(false, Ordering::SeqCst);
        let report = h.sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(report.cursor_after, 3);
    }

    #[tokio::test]
    async fn test_cursor_write_failure_is_reported() {
        let checkpoint = MemoryCheckpoint::default();
        checkpoint.fail_save.store(true, Ordering::SeqCst);
        let h = harness_with(checkpoint, RecordingEngine::default());
        h.log.push(message(0));

        let report = h.sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Failed);
        assert_eq!(report.upserted, 1);
        assert_eq!(report.cursor_after, 0);
    }

    #[tokio::test]
    async fn test_type_filtering_advances_past_unknown() {
        let h = harness();
        h.log.push(message(0));
        h.log.push(unknown());
        h.log.push(message(1));
        h.log.push(unknown());

        let report = h.sync.run_cycle().await;
        assert_eq!(report.upserted, 2);
        assert_eq!(report.skipped_entries, 2);
        assert_eq!(report.cursor_after, 4);
        assert_eq!(h.engine.len(), 2);
        assert_eq!(h.checkpoint.value(), Some("4".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_entry_is_skipped_and_passed() {
        let h = harness();
        h.log.push("{broken".to_string());
        h.log.push(message(0));

        let report = h.sync.run_cycle().await;
        assert_eq!(report.malformed_entries, 1);
        assert_eq!(report.upserted, 1);
        assert_eq!(report.cursor_after, 2);
    }

    #[tokio::test]
    async fn test_non_utf8_entry_is_skipped_and_passed() {
        let h = harness();
        h.log.push(vec![0xff, 0xfe, b'{']);
        h.log.push(message(0));

        let report = h.sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(report.malformed_entries, 1);
        assert_eq!(report.upserted, 1);
        assert_eq!(report.cursor_after, 2);
        assert_eq!(h.checkpoint.value(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_page_without_records_leaves_cursor() {
        let h = harness_with(MemoryCheckpoint::with_value("0"), RecordingEngine::default());
        h.log.push(unknown());
        h.log.push(unknown());

        let report = h.sync.run_cycle().await;
        assert_eq!(report.status, CycleStatus::Completed);
        assert_eq!(report.upserted, 0);
        assert!(h.checkpoint.writes().is_empty());
        assert!(h.engine.batches().is_empty());
    }

    #[tokio::test]
    async fn test_identical_payloads_collapse_to_one_record() {
        let h = harness();
        h.log.push(message(7));
        h.log.push(message(7));

        let report = h.sync.run_cycle().await;
        assert_eq!(report.upserted, 2);
        assert_eq!(h.engine.len(), 1);
    }

    #[tokio::test]
    async fn test_second_trigger_while_running_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let h = harness_with(
            MemoryCheckpoint::default(),
            RecordingEngine::gated(entered.clone(), release.clone()),
        );
        h.log.push(message(0));

        let sync = h.sync.clone();
        let first = tokio::spawn(async move { sync.run_cycle().await });

        entered.notified().await;
        assert!(h.sync.is_running());

        let second = h.sync.run_cycle().await;
        assert_eq!(second.status, CycleStatus::Skipped);
        assert_eq!(second.upserted, 0);

        release.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.status, CycleStatus::Completed);
        assert_eq!(first.upserted, 1);
        assert!(!h.sync.is_running());
        assert_eq!(h.checkpoint.writes(), vec![1]);
    }
}
