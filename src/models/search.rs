//! Topic list and pagination cursor models.

use serde::{Deserialize, Serialize};

/// Healthcare research topics driven through the pipeline, in run order
pub const TOPICS: [&str; 15] = [
    "Telehealth healthcare",
    "Artificial intelligence in healthcare",
    "Electronic health records interoperability",
    "Value-based care",
    "Population health management",
    "Remote patient monitoring",
    "Chronic disease management",
    "Mental health services access",
    "Health equity and disparities",
    "Healthcare workforce burnout",
    "Hospital readmission reduction",
    "Patient engagement technology",
    "Healthcare cybersecurity",
    "Precision medicine",
    "Healthcare cost containment",
];

/// File stem for a topic's export: whitespace runs become `_`, then the run timestamp
pub fn topic_file_stem(topic: &str, run_timestamp: &str) -> String {
    let topic = topic.split_whitespace().collect::<Vec<_>>().join("_");
    format!("{}_{}", topic, run_timestamp)
}

/// Semantic Scholar rejects any request whose offset + limit reaches this value
pub const SCHOLAR_OFFSET_CEILING: u32 = 999;

/// Requests are clamped to end at this offset, below the hard ceiling
pub const SCHOLAR_OFFSET_MARGIN: u32 = 899;

/// Largest page the search endpoint accepts
pub const SCHOLAR_PAGE_SIZE: u32 = 100;

/// Offset/limit pair for a Semantic Scholar search page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCursor {
    pub offset: u32,
    pub limit: u32,
}

impl SearchCursor {
    /// Cursor for a page at `offset`, or `None` once the provider ceiling is reached
    pub fn at(offset: u32) -> Option<Self> {
        if offset.saturating_add(SCHOLAR_PAGE_SIZE) >= SCHOLAR_OFFSET_CEILING {
            return None;
        }

        Some(Self {
            offset,
            limit: SCHOLAR_PAGE_SIZE.min(SCHOLAR_OFFSET_MARGIN - offset),
        })
    }
}
