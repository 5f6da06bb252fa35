#[cfg(test)]
mod tests;

use std::collections::HashSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cleaner::CleanedRecord;

/// A cleaned record that passed the length gate and the duplicate check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredRecord {
    /// Contiguous position of the record in the filtered batch
    pub index: usize,
    pub record: CleanedRecord,
}

/// Case and whitespace insensitive form of a semantic text
#[inline]
pub fn fingerprint(text: &str) -> String {
    text.to_lowercase().split_whitespace().join(" ")
}

/// Drop records shorter than `min_chars` characters and records whose fingerprint
/// was already seen earlier in the batch.
///
/// The first occurrence of a fingerprint wins. Output order follows input order and
/// indices are renumbered from zero.
#[inline]
pub fn filter_and_dedup(records: Vec<CleanedRecord>, min_chars: usize) -> Vec<FilteredRecord> {
    let initial = records.len();
    info!(
        "Filtering and deduplicating {} records (min {} chars)",
        initial, min_chars
    );

    let mut seen = HashSet::with_capacity(initial);
    let mut too_short = 0;
    let mut duplicates = 0;

    let filtered: Vec<FilteredRecord> = records
        .into_iter()
        .filter(|record| {
            let long_enough = record.semantic_text.chars().count() >= min_chars;
            if !long_enough {
                too_short += 1;
            }
            long_enough
        })
        .filter(|record| {
            let first_seen = seen.insert(fingerprint(&record.semantic_text));
            if !first_seen {
                duplicates += 1;
            }
            first_seen
        })
        .enumerate()
        .map(|(index, record)| FilteredRecord { index, record })
        .collect();

    debug!(
        "Removed {} short records and {} duplicates",
        too_short, duplicates
    );
    info!("{} of {} records kept", filtered.len(), initial);

    filtered
}
