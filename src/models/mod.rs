//! Core data models for harvested records and search state.

mod record;
mod search;

pub use record::{NormalizedRecord, PubMedArticle, ScholarPaper, SourceKind};
pub use search::{
    topic_file_stem, SearchCursor, SCHOLAR_OFFSET_CEILING, SCHOLAR_OFFSET_MARGIN,
    SCHOLAR_PAGE_SIZE, TOPICS,
};
