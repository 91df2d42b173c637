//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::{pause, Pacing, Source, SourceError};
use crate::models::{NormalizedRecord, ScholarPaper, SearchCursor, SourceKind};
use crate::utils::HttpClient;

/// Semantic Scholar Graph API base URL
pub const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested for every search page
const SEARCH_FIELDS: &str = "paperId,title,abstract,year,venue,authors,citationCount,\
influentialCitationCount,referenceCount,openAccessPdf,fieldsOfStudy,publicationTypes";

/// Fields requested for the per-paper detail fetch
const DETAIL_FIELDS: &str = "paperId,title,abstract,year,venue,authors,citationCount,\
influentialCitationCount,referenceCount,openAccessPdf,fieldsOfStudy,publicationTypes,\
references,citations,embedding";

/// Semantic Scholar research source
///
/// Pages through `/paper/search` and enriches each hit with `/paper/{id}`.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: HttpClient,
    base_url: String,
    pacing: Pacing,
}

impl SemanticScholarSource {
    /// Create a new Semantic Scholar source
    ///
    /// The API key, if any, belongs on the client as an `x-api-key` header.
    pub fn new(client: HttpClient, pacing: Pacing) -> Self {
        Self::with_base_url(client, pacing, SEMANTIC_API_BASE)
    }

    /// Create against a different API host (for testing)
    pub fn with_base_url(client: HttpClient, pacing: Pacing, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            pacing,
        }
    }

    /// Build search query parameters for one page
    fn search_params(topic: &str, cursor: SearchCursor) -> Vec<(&'static str, String)> {
        vec![
            ("query", topic.to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
            ("publicationTypes", "Review,JournalArticle".to_string()),
            ("fieldsOfStudy", "Medicine".to_string()),
            ("minCitationCount", "1".to_string()),
            ("year", "2018-2023".to_string()),
            ("offset", cursor.offset.to_string()),
            ("limit", cursor.limit.to_string()),
        ]
    }

    /// Build the detail URL for a paper, escaping the id as a path segment
    fn detail_url(&self, paper_id: &str) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::InvalidRequest(format!("Bad base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidRequest("Base URL cannot have a path".to_string()))?
            .push("paper")
            .push(paper_id);
        Ok(url)
    }

    async fn search_page(
        &self,
        topic: &str,
        cursor: SearchCursor,
    ) -> Result<S2SearchResponse, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        self.client
            .get_json(&url, &Self::search_params(topic, cursor), "paper search")
            .await
    }

    async fn fetch_details(&self, paper_id: &str) -> Result<S2Paper, SourceError> {
        let url = self.detail_url(paper_id)?;
        self.client
            .get_json(
                url.as_str(),
                &[("fields", DETAIL_FIELDS.to_string())],
                "paper details",
            )
            .await
    }

    /// Merge the detail record into a page hit; on failure keep the page fields
    async fn enrich(&self, paper: &mut S2Paper) {
        let Some(paper_id) = paper.paper_id.clone() else {
            return;
        };

        match self.fetch_details(&paper_id).await {
            Ok(detail) => paper.merge(detail),
            Err(e) => {
                tracing::warn!(
                    "Semantic Scholar details for {} failed, keeping search fields: {}",
                    paper_id,
                    e
                );
            }
        }

        // Full-text retrieval is not performed; the wait keeps the request
        // rate where the provider expects it.
        if paper.pdf_url().is_some() {
            pause(self.pacing.scholar_pdf_delay).await;
        }
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn kind(&self) -> SourceKind {
        SourceKind::ScholarPaper
    }

    async fn fetch_topic(&self, topic: &str) -> Result<Vec<NormalizedRecord>, SourceError> {
        let mut records = Vec::new();
        let mut offset = 0u32;
        let mut page_number = 0u32;

        loop {
            let Some(cursor) = SearchCursor::at(offset) else {
                tracing::info!(
                    "Semantic Scholar offset ceiling reached at {} for '{}'",
                    offset,
                    topic
                );
                break;
            };
            page_number += 1;

            let page = match self.search_page(topic, cursor).await {
                Ok(page) => page,
                Err(e) if e.status() == Some(400) => {
                    tracing::info!(
                        "Semantic Scholar limit reached on page {} for '{}': {}",
                        page_number,
                        topic,
                        e
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "Semantic Scholar pagination for '{}' stopped on page {}: {}",
                        topic,
                        page_number,
                        e
                    );
                    break;
                }
            };

            if page.data.is_empty() {
                break;
            }

            tracing::debug!(
                "Semantic Scholar page {} for '{}': {} papers (offset {}, total {:?})",
                page_number,
                topic,
                page.data.len(),
                cursor.offset,
                page.total
            );

            for mut paper in page.data {
                self.enrich(&mut paper).await;
                match paper.into_record() {
                    Some(record) => records.push(NormalizedRecord::from(record)),
                    None => tracing::debug!("Dropping Semantic Scholar paper without an id"),
                }
            }

            match page.next {
                Some(next) if next > offset => {
                    offset = next;
                    pause(self.pacing.scholar_page_delay).await;
                }
                Some(next) => {
                    tracing::warn!(
                        "Semantic Scholar returned non-advancing offset {} after {}",
                        next,
                        offset
                    );
                    break;
                }
                None => break,
            }
        }

        tracing::info!(
            "Semantic Scholar returned {} papers for '{}'",
            records.len(),
            topic
        );
        Ok(records)
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<u64>,
    next: Option<u32>,
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    venue: Option<String>,
    authors: Option<Vec<S2Author>>,
    citation_count: Option<u32>,
    influential_citation_count: Option<u32>,
    reference_count: Option<u32>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    fields_of_study: Option<Vec<String>>,
    publication_types: Option<Vec<String>>,
    references: Option<Vec<S2PaperRef>>,
    citations: Option<Vec<S2PaperRef>>,
    embedding: Option<S2Embedding>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2PaperRef {
    paper_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Embedding {
    #[serde(default)]
    vector: Vec<f32>,
}

impl S2Paper {
    fn pdf_url(&self) -> Option<&str> {
        self.open_access_pdf
            .as_ref()
            .and_then(|pdf| pdf.url.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Overwrite every field the detail response carries
    fn merge(&mut self, detail: S2Paper) {
        macro_rules! overwrite {
            ($($field:ident),*) => {
                $(if detail.$field.is_some() {
                    self.$field = detail.$field;
                })*
            };
        }

        overwrite!(
            paper_id,
            title,
            abstract_text,
            year,
            venue,
            authors,
            citation_count,
            influential_citation_count,
            reference_count,
            open_access_pdf,
            fields_of_study,
            publication_types,
            references,
            citations,
            embedding
        );
    }

    fn into_record(self) -> Option<ScholarPaper> {
        let pdf_url = self.pdf_url().map(str::to_string);
        let paper_id = self.paper_id.filter(|id| !id.is_empty())?;

        let ref_ids = |refs: Option<Vec<S2PaperRef>>| -> Vec<String> {
            refs.unwrap_or_default()
                .into_iter()
                .filter_map(|r| r.paper_id)
                .collect()
        };

        let mut paper = ScholarPaper::new(paper_id, self.title.unwrap_or_default());
        paper.abstract_text = self.abstract_text.unwrap_or_default();
        paper.authors = self
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .collect();
        paper.year = self.year;
        paper.venue = self.venue.unwrap_or_default();
        paper.citation_count = self.citation_count;
        paper.influential_citation_count = self.influential_citation_count;
        paper.reference_count = self.reference_count;
        paper.open_access_pdf = pdf_url;
        paper.fields_of_study = self.fields_of_study.unwrap_or_default();
        paper.publication_types = self.publication_types.unwrap_or_default();
        paper.reference_ids = ref_ids(self.references);
        paper.citation_ids = ref_ids(self.citations);
        paper.embedding = self.embedding.map(|e| e.vector);

        Some(paper)
    }
}
