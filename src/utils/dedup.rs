//! Deduplication of records across sources.

use std::collections::HashSet;

use crate::models::NormalizedRecord;

/// Keep the first record for every identity key, preserving order
///
/// Identity is provider-qualified, so a PubMed article and a Semantic Scholar
/// paper never collapse into one another even when their native ids coincide.
pub fn deduplicate_records(records: Vec<NormalizedRecord>) -> Vec<NormalizedRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());

    records
        .into_iter()
        .filter(|record| seen.insert(record.identity()))
        .collect()
}
