//! Topic orchestration.
//!
//! For every topic the [`Orchestrator`] fetches PubMed and then Semantic
//! Scholar, deduplicates the combined set, exports it, uploads the file and
//! schedules removal of the local copy. Failures are contained per topic: a
//! provider failure degrades to an empty set and an export or upload failure
//! marks the topic failed without stopping the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::export::Exporter;
use crate::models::{topic_file_stem, NormalizedRecord, TOPICS};
use crate::sources::{PubMedSource, SemanticScholarSource, Source, SourceError};
use crate::storage::ObjectStore;
use crate::utils::{deduplicate_records, HttpClient};

/// Default wait between upload and local file removal
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_secs(5);

/// Format of the run timestamp embedded in export names
pub const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Timestamp for a run starting now
pub fn run_timestamp() -> String {
    chrono::Utc::now().format(RUN_TIMESTAMP_FORMAT).to_string()
}

/// State shared by every topic of one run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Suffix of every export file name in this run
    pub run_timestamp: String,
    pub pubmed: Arc<dyn Source>,
    pub scholar: Arc<dyn Source>,
}

impl RunContext {
    pub fn new(
        run_timestamp: impl Into<String>,
        pubmed: Arc<dyn Source>,
        scholar: Arc<dyn Source>,
    ) -> Self {
        Self {
            run_timestamp: run_timestamp.into(),
            pubmed,
            scholar,
        }
    }

    /// Build both fetchers, each with its own HTTP client, from configuration
    pub fn from_config(config: &Config, run_timestamp: impl Into<String>) -> Result<Self, SourceError> {
        let pubmed_client = Self::client_builder(config, "PubMed").build()?;

        let mut scholar_builder = Self::client_builder(config, "Semantic Scholar");
        if let Some(key) = &config.api_keys.semantic_scholar {
            scholar_builder = scholar_builder.header("x-api-key", key.clone());
        }
        let scholar_client = scholar_builder.build()?;

        let pacing = config.pacing();
        Ok(Self::new(
            run_timestamp,
            Arc::new(PubMedSource::new(pubmed_client, pacing)),
            Arc::new(SemanticScholarSource::new(scholar_client, pacing)),
        ))
    }

    fn client_builder(config: &Config, label: &str) -> crate::utils::HttpClientBuilder {
        let mut builder = HttpClient::builder(label)
            .timeout(config.http_timeout())
            .retry(config.retry_config());
        if let Some(user_agent) = &config.http.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder
    }
}

/// What happened to one topic
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicOutcome {
    pub topic: String,
    pub pubmed_count: usize,
    pub scholar_count: usize,
    pub duplicates_removed: usize,
    /// Records written after deduplication
    pub exported_count: usize,
    pub export_path: Option<PathBuf>,
    pub upload_location: Option<String>,
    /// Export or upload failure, if any
    pub error: Option<String>,
}

impl TopicOutcome {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a full run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_timestamp: String,
    pub topics: Vec<TopicOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.topics.iter().filter(|t| t.is_success()).count()
    }

    pub fn failed(&self) -> Vec<&TopicOutcome> {
        self.topics.iter().filter(|t| !t.is_success()).collect()
    }

    pub fn total_records(&self) -> usize {
        self.topics.iter().map(|t| t.exported_count).sum()
    }
}

/// Runs the per-topic pipeline over a topic list
#[derive(Debug, Clone)]
pub struct Orchestrator {
    exporter: Arc<dyn Exporter>,
    store: Option<Arc<dyn ObjectStore>>,
    cleanup_delay: Duration,
    topics: Vec<String>,
}

impl Orchestrator {
    /// Orchestrator over the fixed topic list, without uploads
    pub fn new(exporter: Arc<dyn Exporter>) -> Self {
        Self {
            exporter,
            store: None,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
            topics: TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Upload every export to this store
    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    /// Replace the topic list
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Process every topic in order, then wait for pending cleanups
    pub async fn run(&self, ctx: &RunContext) -> RunSummary {
        let mut cleanups = JoinSet::new();
        let mut outcomes = Vec::with_capacity(self.topics.len());

        info!(
            "Starting run {} over {} topics",
            ctx.run_timestamp,
            self.topics.len()
        );

        for topic in &self.topics {
            let outcome = self.run_topic(ctx, topic, &mut cleanups).await;
            match &outcome.error {
                None => info!(
                    "Topic '{}' done: {} records exported",
                    topic, outcome.exported_count
                ),
                Some(e) => warn!("Topic '{}' failed: {}", topic, e),
            }
            outcomes.push(outcome);
        }

        if !cleanups.is_empty() {
            debug!("Waiting for {} pending cleanups", cleanups.len());
        }
        while let Some(result) = cleanups.join_next().await {
            if let Err(e) = result {
                warn!("Cleanup task failed: {}", e);
            }
        }

        let summary = RunSummary {
            run_timestamp: ctx.run_timestamp.clone(),
            topics: outcomes,
        };
        info!(
            "Run {} finished: {}/{} topics succeeded, {} records",
            summary.run_timestamp,
            summary.succeeded(),
            summary.topics.len(),
            summary.total_records()
        );
        summary
    }

    async fn run_topic(
        &self,
        ctx: &RunContext,
        topic: &str,
        cleanups: &mut JoinSet<()>,
    ) -> TopicOutcome {
        let mut outcome = TopicOutcome::new(topic);
        info!("Processing topic: {}", topic);

        let pubmed = fetch_or_empty(ctx.pubmed.as_ref(), topic).await;
        let scholar = fetch_or_empty(ctx.scholar.as_ref(), topic).await;
        outcome.pubmed_count = pubmed.len();
        outcome.scholar_count = scholar.len();

        let mut combined = pubmed;
        combined.extend(scholar);
        let before = combined.len();
        let records = deduplicate_records(combined);
        outcome.duplicates_removed = before - records.len();
        outcome.exported_count = records.len();
        info!(
            "Topic '{}': {} records, {} duplicates removed",
            topic,
            records.len(),
            outcome.duplicates_removed
        );

        let stem = topic_file_stem(topic, &ctx.run_timestamp);
        let path = match self.exporter.export(&records, &stem).await {
            Ok(path) => path,
            Err(e) => {
                outcome.error = Some(format!("export failed: {}", e));
                return outcome;
            }
        };
        outcome.export_path = Some(path.clone());

        let Some(store) = &self.store else {
            return outcome;
        };

        match store.upload(&path).await {
            Ok(location) => {
                info!("Uploaded {} to {}", path.display(), location);
                outcome.upload_location = Some(location);
                cleanups.spawn(remove_after(path, self.cleanup_delay));
            }
            Err(e) => outcome.error = Some(format!("upload failed: {}", e)),
        }

        outcome
    }
}

/// Run one fetcher, degrading a failure to no records
async fn fetch_or_empty(source: &dyn Source, topic: &str) -> Vec<NormalizedRecord> {
    match source.fetch_topic(topic).await {
        Ok(records) => {
            info!("{} returned {} records for '{}'", source.name(), records.len(), topic);
            records
        }
        Err(e) => {
            warn!("{} fetch failed for '{}': {}", source.name(), topic, e);
            Vec::new()
        }
    }
}

async fn remove_after(path: PathBuf, delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    remove_local(&path).await;
}

async fn remove_local(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed local file {}", path.display()),
        Err(e) => warn!("Failed to remove local file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{CsvExporter, ExportError};
    use crate::models::SourceKind;
    use crate::sources::mock::{make_pubmed, make_scholar};
    use crate::sources::MockSource;
    use crate::storage::{MemoryStore, StorageError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every export and fails targets starting with a prefix
    #[derive(Debug)]
    struct RecordingExporter {
        inner: CsvExporter,
        fail_prefix: Option<String>,
        targets: Mutex<Vec<(String, usize)>>,
    }

    impl RecordingExporter {
        fn new(dir: &Path, fail_prefix: Option<&str>) -> Self {
            Self {
                inner: CsvExporter::new(dir),
                fail_prefix: fail_prefix.map(str::to_string),
                targets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Exporter for RecordingExporter {
        async fn export(
            &self,
            records: &[NormalizedRecord],
            target: &str,
        ) -> Result<PathBuf, ExportError> {
            self.targets
                .lock()
                .unwrap()
                .push((target.to_string(), records.len()));
            if let Some(prefix) = &self.fail_prefix {
                if target.starts_with(prefix.as_str()) {
                    return Err(ExportError::Io(std::io::Error::other("disk full")));
                }
            }
            self.inner.export(records, target).await
        }
    }

    /// Rejects uploads of files whose name starts with a prefix
    #[derive(Debug)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_prefix: String,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn upload(&self, path: &Path) -> Result<String, StorageError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with(self.fail_prefix.as_str()) {
                return Err(StorageError::Backend("bucket unavailable".to_string()));
            }
            self.inner.upload(path).await
        }

        async fn clear_bucket(&self) -> Result<usize, StorageError> {
            self.inner.clear_bucket().await
        }
    }

    fn context(pubmed: Arc<MockSource>, scholar: Arc<MockSource>) -> RunContext {
        RunContext::new("20240101T000000Z", pubmed, scholar)
    }

    #[tokio::test]
    async fn test_cross_source_records_all_survive() {
        let dir = tempfile::tempdir().unwrap();
        let topic = "Telehealth healthcare";

        let pubmed = Arc::new(MockSource::new(SourceKind::PubMedArticle));
        pubmed.set_records(
            topic,
            vec![make_pubmed("111", "Remote care"), make_pubmed("222", "Video visits")],
        );
        let scholar = Arc::new(MockSource::new(SourceKind::ScholarPaper));
        scholar.set_records(
            topic,
            vec![make_scholar("111", "Remote care"), make_scholar("A2", "Tele-ICU")],
        );

        let exporter = Arc::new(RecordingExporter::new(dir.path(), None));
        let orchestrator = Orchestrator::new(exporter.clone()).with_topics([topic]);

        let summary = orchestrator.run(&context(pubmed, scholar)).await;

        assert_eq!(summary.topics.len(), 1);
        let outcome = &summary.topics[0];
        assert!(outcome.is_success());
        assert_eq!(outcome.pubmed_count, 2);
        assert_eq!(outcome.scholar_count, 2);
        assert_eq!(outcome.duplicates_removed, 0);
        assert_eq!(outcome.exported_count, 4);

        let targets = exporter.targets.lock().unwrap().clone();
        assert_eq!(
            targets,
            vec![("Telehealth_healthcare_20240101T000000Z".to_string(), 4)]
        );
        // Without a store the export stays on disk.
        assert!(outcome.export_path.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn test_duplicates_removed_within_source() {
        let dir = tempfile::tempdir().unwrap();
        let pubmed = Arc::new(MockSource::new(SourceKind::PubMedArticle));
        pubmed.set_records(
            "topic",
            vec![make_pubmed("1", "a"), make_pubmed("1", "a again"), make_pubmed("2", "b")],
        );
        let scholar = Arc::new(MockSource::new(SourceKind::ScholarPaper));

        let exporter = Arc::new(RecordingExporter::new(dir.path(), None));
        let summary = Orchestrator::new(exporter)
            .with_topics(["topic"])
            .run(&context(pubmed, scholar))
            .await;

        assert_eq!(summary.topics[0].duplicates_removed, 1);
        assert_eq!(summary.topics[0].exported_count, 2);
    }

    #[tokio::test]
    async fn test_export_failure_does_not_stop_next_topic() {
        let dir = tempfile::tempdir().unwrap();
        let pubmed = Arc::new(MockSource::new(SourceKind::PubMedArticle));
        pubmed.set_records("Broken topic", vec![make_pubmed("1", "a")]);
        pubmed.set_records("Next topic", vec![make_pubmed("2", "b")]);
        let scholar = Arc::new(MockSource::new(SourceKind::ScholarPaper));

        let exporter = Arc::new(RecordingExporter::new(dir.path(), Some("Broken")));
        let store = Arc::new(MemoryStore::new());
        let summary = Orchestrator::new(exporter)
            .with_store(store.clone())
            .with_cleanup_delay(Duration::ZERO)
            .with_topics(["Broken topic", "Next topic"])
            .run(&context(pubmed.clone(), scholar))
            .await;

        assert_eq!(pubmed.calls(), vec!["Broken topic", "Next topic"]);
        assert_eq!(summary.succeeded(), 1);

        let failed = summary.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].topic, "Broken topic");
        assert!(failed[0].error.as_ref().unwrap().contains("export failed"));

        assert_eq!(store.keys(), vec!["Next_topic_20240101T000000Z.csv"]);
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_stop_next_topic() {
        let dir = tempfile::tempdir().unwrap();
        let pubmed = Arc::new(MockSource::new(SourceKind::PubMedArticle));
        pubmed.set_records("Broken topic", vec![make_pubmed("1", "a")]);
        pubmed.set_records("Next topic", vec![make_pubmed("2", "b")]);
        let scholar = Arc::new(MockSource::new(SourceKind::ScholarPaper));

        let exporter = Arc::new(RecordingExporter::new(dir.path(), None));
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            fail_prefix: "Broken".to_string(),
        });
        let summary = Orchestrator::new(exporter)
            .with_store(store.clone())
            .with_cleanup_delay(Duration::ZERO)
            .with_topics(["Broken topic", "Next topic"])
            .run(&context(pubmed.clone(), scholar))
            .await;

        assert_eq!(pubmed.calls(), vec!["Broken topic", "Next topic"]);
        assert_eq!(summary.succeeded(), 1);

        let failed = summary.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].topic, "Broken topic");
        assert!(failed[0].error.as_ref().unwrap().contains("upload failed"));
        assert!(failed[0].upload_location.is_none());
        // Nothing was uploaded, so the local export is kept.
        assert!(failed[0].export_path.as_ref().unwrap().exists());

        let next = &summary.topics[1];
        assert_eq!(
            next.upload_location.as_deref(),
            Some("memory://Next_topic_20240101T000000Z.csv")
        );
        assert!(!next.export_path.as_ref().unwrap().exists());
        assert_eq!(store.inner.keys(), vec!["Next_topic_20240101T000000Z.csv"]);
    }

    #[tokio::test]
    async fn test_source_failure_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pubmed = Arc::new(MockSource::new(SourceKind::PubMedArticle));
        pubmed.set_failure("topic", 503);
        let scholar = Arc::new(MockSource::new(SourceKind::ScholarPaper));
        scholar.set_records("topic", vec![make_scholar("A1", "x")]);

        let exporter = Arc::new(RecordingExporter::new(dir.path(), None));
        let summary = Orchestrator::new(exporter)
            .with_topics(["topic"])
            .run(&context(pubmed, scholar.clone()))
            .await;

        assert_eq!(scholar.calls(), vec!["topic"]);
        let outcome = &summary.topics[0];
        assert!(outcome.is_success());
        assert_eq!(outcome.pubmed_count, 0);
        assert_eq!(outcome.exported_count, 1);
    }

    #[tokio::test]
    async fn test_local_file_removed_after_upload() {
        let dir = tempfile::tempdir().unwrap();
        let pubmed = Arc::new(MockSource::new(SourceKind::PubMedArticle));
        pubmed.set_records("topic", vec![make_pubmed("1", "a")]);
        let scholar = Arc::new(MockSource::new(SourceKind::ScholarPaper));

        let store = Arc::new(MemoryStore::new());
        let exporter = Arc::new(RecordingExporter::new(dir.path(), None));
        let summary = Orchestrator::new(exporter)
            .with_store(store.clone())
            .with_cleanup_delay(Duration::from_millis(10))
            .with_topics(["topic"])
            .run(&context(pubmed, scholar))
            .await;

        let outcome = &summary.topics[0];
        assert_eq!(
            outcome.upload_location.as_deref(),
            Some("memory://topic_20240101T000000Z.csv")
        );
        assert!(!outcome.export_path.as_ref().unwrap().exists());
        assert!(store.get("topic_20240101T000000Z.csv").is_some());
    }

    #[test]
    fn test_run_timestamp_format() {
        let ts = run_timestamp();
        assert_eq!(ts.len(), 16);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[8..9], "T");
    }
}
