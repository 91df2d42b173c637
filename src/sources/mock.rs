//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{NormalizedRecord, PubMedArticle, ScholarPaper, SourceKind};
use crate::sources::{Source, SourceError};

/// Canned outcome for one topic
#[derive(Debug, Clone)]
enum MockResponse {
    Records(Vec<NormalizedRecord>),
    Failure(u16),
}

/// A mock source for testing that returns predefined responses.
///
/// Topics without a configured response yield no records.
#[derive(Debug)]
pub struct MockSource {
    kind: SourceKind,
    responses: Mutex<HashMap<String, MockResponse>>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return these records for the topic.
    pub fn set_records(&self, topic: &str, records: Vec<NormalizedRecord>) {
        let mut guard = self.responses.lock().unwrap();
        guard.insert(topic.to_string(), MockResponse::Records(records));
    }

    /// Fail the topic with an HTTP status error.
    pub fn set_failure(&self, topic: &str, status: u16) {
        let mut guard = self.responses.lock().unwrap();
        guard.insert(topic.to_string(), MockResponse::Failure(status));
    }

    /// Topics requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Source for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_topic(&self, topic: &str) -> Result<Vec<NormalizedRecord>, SourceError> {
        self.calls.lock().unwrap().push(topic.to_string());

        let guard = self.responses.lock().unwrap();
        match guard.get(topic) {
            Some(MockResponse::Records(records)) => Ok(records.clone()),
            Some(MockResponse::Failure(status)) => Err(SourceError::Status {
                status: *status,
                message: "mock failure".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Helper function to create a mock PubMed record for testing.
pub fn make_pubmed(pmid: &str, title: &str) -> NormalizedRecord {
    PubMedArticle::new(pmid, title).into()
}

/// Helper function to create a mock Semantic Scholar record for testing.
pub fn make_scholar(paper_id: &str, title: &str) -> NormalizedRecord {
    ScholarPaper::new(paper_id, title).into()
}
