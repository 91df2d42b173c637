//! Normalized record model shared by every provider.

use serde::{Deserialize, Serialize};

/// The provider-specific shape a record was normalized from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    PubMedArticle,
    ScholarPaper,
}

impl SourceKind {
    /// Returns the discriminant used as the identity prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PubMedArticle => "PubMedArticle",
            SourceKind::ScholarPaper => "ScholarPaper",
        }
    }

    /// Returns the human-readable provider name (used in exports)
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::PubMedArticle => "PubMed",
            SourceKind::ScholarPaper => "Semantic Scholar",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An article retrieved from PubMed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubMedArticle {
    /// PubMed ID
    pub pmid: String,

    /// Article title
    pub title: String,

    /// Abstract paragraphs joined with a single space
    pub abstract_text: String,

    /// Authors as "LastName ForeName"
    pub authors: Vec<String>,

    /// Year, month and day tokens joined with spaces
    pub publication_date: String,

    /// Journal title
    pub journal: String,

    /// Digital Object Identifier
    pub doi: Option<String>,
}

impl PubMedArticle {
    /// Create an article with the required fields
    pub fn new(pmid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            publication_date: String::new(),
            journal: String::new(),
            doi: None,
        }
    }
}

/// A paper retrieved from Semantic Scholar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScholarPaper {
    /// Semantic Scholar paper ID
    pub paper_id: String,

    /// Paper title
    pub title: String,

    /// Abstract text (may be empty)
    pub abstract_text: String,

    /// Author display names
    pub authors: Vec<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Venue name
    pub venue: String,

    /// Citation count
    pub citation_count: Option<u32>,

    /// Influential citation count
    pub influential_citation_count: Option<u32>,

    /// Number of references
    pub reference_count: Option<u32>,

    /// Open-access PDF location, if any
    pub open_access_pdf: Option<String>,

    /// Fields of study
    pub fields_of_study: Vec<String>,

    /// Publication types (Review, JournalArticle, ...)
    pub publication_types: Vec<String>,

    /// IDs of referenced papers (detail fetch only)
    pub reference_ids: Vec<String>,

    /// IDs of citing papers (detail fetch only)
    pub citation_ids: Vec<String>,

    /// SPECTER embedding vector (detail fetch only)
    pub embedding: Option<Vec<f32>>,
}

impl ScholarPaper {
    /// Create a paper with the required fields
    pub fn new(paper_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            year: None,
            venue: String::new(),
            citation_count: None,
            influential_citation_count: None,
            reference_count: None,
            open_access_pdf: None,
            fields_of_study: Vec::new(),
            publication_types: Vec::new(),
            reference_ids: Vec::new(),
            citation_ids: Vec::new(),
            embedding: None,
        }
    }
}

/// A bibliographic record from either provider
///
/// Downstream code (identity, export rows) matches on the variant rather than
/// probing for provider-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NormalizedRecord {
    PubMedArticle(PubMedArticle),
    ScholarPaper(ScholarPaper),
}

impl NormalizedRecord {
    /// The variant discriminant
    pub fn kind(&self) -> SourceKind {
        match self {
            NormalizedRecord::PubMedArticle(_) => SourceKind::PubMedArticle,
            NormalizedRecord::ScholarPaper(_) => SourceKind::ScholarPaper,
        }
    }

    /// Provider-assigned identifier
    pub fn native_id(&self) -> &str {
        match self {
            NormalizedRecord::PubMedArticle(a) => &a.pmid,
            NormalizedRecord::ScholarPaper(p) => &p.paper_id,
        }
    }

    /// Provider-qualified key, e.g. `PubMedArticle-111`
    pub fn identity(&self) -> String {
        format!("{}-{}", self.kind(), self.native_id())
    }

    pub fn title(&self) -> &str {
        match self {
            NormalizedRecord::PubMedArticle(a) => &a.title,
            NormalizedRecord::ScholarPaper(p) => &p.title,
        }
    }

    pub fn abstract_text(&self) -> &str {
        match self {
            NormalizedRecord::PubMedArticle(a) => &a.abstract_text,
            NormalizedRecord::ScholarPaper(p) => &p.abstract_text,
        }
    }

    pub fn authors(&self) -> &[String] {
        match self {
            NormalizedRecord::PubMedArticle(a) => &a.authors,
            NormalizedRecord::ScholarPaper(p) => &p.authors,
        }
    }

    /// Free-form date for PubMed, year only for Semantic Scholar
    pub fn publication_date(&self) -> String {
        match self {
            NormalizedRecord::PubMedArticle(a) => a.publication_date.clone(),
            NormalizedRecord::ScholarPaper(p) => {
                p.year.map(|y| y.to_string()).unwrap_or_default()
            }
        }
    }

    /// Journal title or venue name
    pub fn venue(&self) -> &str {
        match self {
            NormalizedRecord::PubMedArticle(a) => &a.journal,
            NormalizedRecord::ScholarPaper(p) => &p.venue,
        }
    }

    /// DOI, only ever present on PubMed records
    pub fn doi(&self) -> Option<&str> {
        match self {
            NormalizedRecord::PubMedArticle(a) => a.doi.as_deref(),
            NormalizedRecord::ScholarPaper(_) => None,
        }
    }
}

impl From<PubMedArticle> for NormalizedRecord {
    fn from(article: PubMedArticle) -> Self {
        NormalizedRecord::PubMedArticle(article)
    }
}

impl From<ScholarPaper> for NormalizedRecord {
    fn from(paper: ScholarPaper) -> Self {
        NormalizedRecord::ScholarPaper(paper)
    }
}
