//! The capability interface onto the record collection.
//!
//! Deliberately narrow: the engine consumes exactly this surface and does
//! any richer filtering client-side over fetched records. Backends are
//! free to push filters down when they can.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::model::QaRecord;

/// Metadata filter applied by `fetch_page` and `vector_neighbors`.
///
/// Every set field must hold; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub category: Option<String>,
    pub source_file: Option<String>,
    /// Inclusive lower bound on `document_date`.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on `document_date`.
    pub date_to: Option<NaiveDate>,
    /// Exact answer text (used for placeholder pruning).
    pub answer: Option<String>,
}

impl RecordFilter {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.source_file.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && self.answer.is_none()
    }

    /// Whether `record` satisfies every set field. This is the reference
    /// semantics; backends that push filters down must agree with it.
    #[must_use]
    pub fn matches(&self, record: &QaRecord) -> bool {
        if let Some(category) = &self.category {
            if record.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source_file {
            if record.source_file.as_deref() != Some(source.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            match record.document_date {
                Some(date) if date >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.date_to {
            match record.document_date {
                Some(date) if date <= to => {}
                _ => return false,
            }
        }
        if let Some(answer) = &self.answer {
            if record.answer != *answer {
                return false;
            }
        }
        true
    }
}

/// Partial update of a record's editable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub category: Option<String>,
    pub source_file: Option<String>,
    pub document_date: Option<NaiveDate>,
}

impl RecordPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.question.is_none()
            && self.answer.is_none()
            && self.category.is_none()
            && self.source_file.is_none()
            && self.document_date.is_none()
    }

    /// Apply the set fields to `record` and bump its version.
    pub fn apply_to(&self, record: &mut QaRecord) {
        if let Some(question) = &self.question {
            record.question.clone_from(question);
        }
        if let Some(answer) = &self.answer {
            record.answer.clone_from(answer);
        }
        if let Some(category) = &self.category {
            record.category = Some(category.clone());
        }
        if let Some(source) = &self.source_file {
            record.source_file = Some(source.clone());
        }
        if let Some(date) = self.document_date {
            record.document_date = Some(date);
        }
        record.version += 1;
    }
}

/// One page of a batched fetch.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<QaRecord>,
    /// Opaque continuation token; `None` on the last page.
    pub next_page_state: Option<String>,
}

/// A similarity-search hit: a record snapshot plus its score against the
/// query vector.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub record: QaRecord,
    pub score: f64,
}

/// Read/write access to the question-answer collection.
///
/// Implementations must keep `RecordFilter::matches` semantics for any
/// filter they push down, and must return `Error::ProviderUnavailable`
/// for transient backend failures so callers can retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one page of records matching `filter`, at most `limit`.
    async fn fetch_page(
        &self,
        filter: &RecordFilter,
        limit: usize,
        page_state: Option<String>,
    ) -> Result<RecordPage>;

    /// Records within `scope` whose embedding scores ≥ `threshold` against
    /// `vector`, best first, at most `limit`. `exclude_id` drops a known
    /// record (typically the query vector's own source) from the results.
    async fn vector_neighbors(
        &self,
        vector: &[f32],
        threshold: f64,
        limit: usize,
        exclude_id: Option<&str>,
        scope: &RecordFilter,
    ) -> Result<Vec<Neighbor>>;

    async fn get(&self, id: &str) -> Result<Option<QaRecord>>;

    /// Apply `patch` to an existing record, bumping its version.
    /// Returns `false` when no record has `id`.
    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<bool>;

    /// Overwrite the stored record with `record` verbatim, version
    /// included. Undo replay and merge writes use this since they carry
    /// complete prepared states. Returns `false` when no record has
    /// `record.id`.
    async fn replace(&self, record: &QaRecord) -> Result<bool>;

    /// Returns `false` when no record had `id`.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Insert a new record; fails if the id already exists.
    async fn insert(&self, record: &QaRecord) -> Result<()>;

    /// First-page convenience for bounded reads.
    async fn fetch(&self, filter: &RecordFilter, limit: usize) -> Result<Vec<QaRecord>> {
        Ok(self.fetch_page(filter, limit, None).await?.records)
    }
}
