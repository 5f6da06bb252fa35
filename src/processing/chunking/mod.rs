#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cleaner::CleanedRecord;
use super::dedup::FilteredRecord;
use super::{ProcessingError, validate_chunk_params};

/// Provenance tag stored on every chunk
pub const SOURCE_TAG: &str = "openagenda";

/// Split boundaries, most preferred first: paragraph, line, sentence, word, character
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Metadata kept alongside a chunk for filtering and display at query time.
///
/// Only allow-listed event fields appear here; the semantic text never does.
/// A field counts as present only when it is non-empty after cleaning: absent fields
/// and fields that clean down to an empty string are both `None` and left out when
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "titre", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "date_debut", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "date_fin", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(rename = "ville", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "code_postal", default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(rename = "adresse", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "lieu", default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(rename = "mots_cles", default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `{event id}_{chunk index within the event}`
    pub chunk_id: String,
    pub source: String,
}

/// Serialized keys a `ChunkMetadata` may contain
pub const METADATA_KEYS: [&str; 12] = [
    "id",
    "titre",
    "date_debut",
    "date_fin",
    "ville",
    "code_postal",
    "adresse",
    "lieu",
    "mots_cles",
    "url",
    "chunk_id",
    "source",
];

impl ChunkMetadata {
    /// Snapshot of the allow-listed fields of a record, without chunk identity
    fn snapshot(record: &CleanedRecord) -> Self {
        Self {
            event_id: record.id.clone(),
            title: non_empty(&record.title),
            start_date: record.start_date.clone(),
            end_date: record.end_date.clone(),
            city: non_empty(&record.city),
            postal_code: non_empty(&record.postal_code),
            address: non_empty(&record.address),
            location_name: non_empty(&record.location_name),
            keywords: non_empty(&record.keywords),
            url: record.url.clone(),
            chunk_id: String::new(),
            source: SOURCE_TAG.to_string(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Recursive, boundary-preferring character splitter.
///
/// Text is split on the first separator it contains; pieces still longer than the
/// chunk size are split again with the next separators. Small pieces are then merged
/// greedily into chunks of at most `chunk_size` characters. When a chunk is emitted,
/// whole pieces are dropped from its front until at most `chunk_overlap` characters
/// remain, and those trailing pieces open the next chunk.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ProcessingError> {
        validate_chunk_params(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(ToString::to_string).collect(),
        })
    }

    #[inline]
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    #[inline]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into trimmed, non-empty chunks
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let splits = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut good_splits = Vec::new();

        for split in splits {
            if char_len(split) < self.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                chunks.push(split.to_string());
            } else {
                chunks.extend(self.split_recursive(split, remaining));
            }
        }

        if !good_splits.is_empty() {
            chunks.extend(self.merge_splits(&good_splits));
        }

        chunks
    }

    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for &split in splits {
            let len = char_len(split);

            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, longer than the configured {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current) {
                        docs.push(doc);
                    }

                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        let Some((_, front_len)) = current.pop_front() else {
                            break;
                        };
                        total -= front_len;
                    }
                }
            }

            current.push_back((split, len));
            total += len;
        }

        if let Some(doc) = join_pieces(&current) {
            docs.push(doc);
        }

        docs
    }
}

/// First separator present in the text, and the finer separators after it
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[i + 1..]);
        }
    }
    (separators.last().map_or("", String::as_str), &[])
}

/// Split on a separator, attaching each separator to the piece that follows it.
/// The empty separator splits into single characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);

    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn join_pieces(pieces: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = pieces.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split every record's semantic text and attach a metadata snapshot to each chunk.
///
/// Returns index-aligned chunk texts and metadata. All chunks of a record come before
/// those of the next record. A record without an identifier uses its batch index in
/// place of one when building `chunk_id`, unprefixed, so it shares the key space of real
/// identifiers: a missing id at index 0 and an id of `"0"` both produce `0_0`.
#[inline]
pub fn chunk_records(
    records: &[FilteredRecord],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<(Vec<String>, Vec<ChunkMetadata>), ProcessingError> {
    let splitter = TextSplitter::new(chunk_size, chunk_overlap)?;

    info!("Creating chunks for {} records", records.len());

    let mut texts = Vec::new();
    let mut metadatas = Vec::new();

    for filtered in records {
        let record = &filtered.record;
        let chunks = splitter.split_text(&record.semantic_text);
        let snapshot = ChunkMetadata::snapshot(record);
        let event_key = record
            .id
            .clone()
            .unwrap_or_else(|| filtered.index.to_string());

        debug!("Record {} split into {} chunks", event_key, chunks.len());

        for (i, chunk) in chunks.into_iter().enumerate() {
            texts.push(chunk);
            metadatas.push(ChunkMetadata {
                chunk_id: format!("{}_{}", event_key, i),
                ..snapshot.clone()
            });
        }
    }

    info!("Split {} records into {} chunks", records.len(), texts.len());
    Ok((texts, metadatas))
}
