use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A question-answer record as stored in the document collection.
///
/// Serializes to the document-store JSON shape (`_id`, `$vector`). The
/// engine only ever holds read snapshots of these; the collection owns
/// the live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRecord {
    /// Document identifier (opaque, unique within the collection).
    #[serde(rename = "_id")]
    pub id: String,

    pub question: String,

    pub answer: String,

    /// Label of the source document this pair was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Date of the source document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_date: Option<NaiveDate>,

    /// When the record entered the collection.
    pub upload_timestamp: DateTime<Utc>,

    /// Content revision counter; starts at 1, bumped on every edit.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Embedding of the question text. Records without one are skipped
    /// by semantic clustering but still join exact clustering.
    #[serde(rename = "$vector", default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn default_version() -> u32 {
    1
}

impl QaRecord {
    #[must_use]
    pub fn new(id: String, question: String, answer: String) -> Self {
        Self {
            id,
            question,
            answer,
            source_file: None,
            category: None,
            document_date: None,
            upload_timestamp: Utc::now(),
            version: 1,
            embedding: None,
        }
    }

    /// Answer length in characters (the unit `keep-longest-answer` ranks by).
    #[must_use]
    pub fn answer_len(&self) -> usize {
        self.answer.chars().count()
    }

    #[must_use]
    pub const fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}
