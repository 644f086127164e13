//! In-memory `DocumentStore` with real cosine similarity.
//!
//! The reference backend: filter and similarity semantics here define
//! what the HTTP adapter must agree with. Used by engine tests and for
//! offline experimentation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use qurate_core::error::{Error, Result};
use qurate_core::model::QaRecord;
use qurate_core::store::{DocumentStore, Neighbor, RecordFilter, RecordPage, RecordPatch};

/// Cosine similarity of two vectors, 0.0 when either is empty, zero, or
/// the dimensions disagree.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let x = f64::from(*x);
        let y = f64::from(*y);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Map-backed document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, QaRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `records`.
    #[must_use]
    pub fn seeded(records: impl IntoIterator<Item = QaRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Mutex::new(map),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, QaRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_page(
        &self,
        filter: &RecordFilter,
        limit: usize,
        page_state: Option<String>,
    ) -> Result<RecordPage> {
        let offset = match page_state {
            Some(state) => state
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("bad page state '{state}'")))?,
            None => 0,
        };

        // Stable id order so paging never skips or repeats
        let mut matching: Vec<QaRecord> = self
            .table()
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let total = matching.len();
        let records: Vec<QaRecord> = matching.into_iter().skip(offset).take(limit).collect();
        let consumed = offset + records.len();
        let next_page_state = (consumed < total).then(|| consumed.to_string());

        Ok(RecordPage {
            records,
            next_page_state,
        })
    }

    async fn vector_neighbors(
        &self,
        vector: &[f32],
        threshold: f64,
        limit: usize,
        exclude_id: Option<&str>,
        scope: &RecordFilter,
    ) -> Result<Vec<Neighbor>> {
        let mut neighbors: Vec<Neighbor> = self
            .table()
            .values()
            .filter(|r| Some(r.id.as_str()) != exclude_id && scope.matches(r))
            .filter_map(|r| {
                let embedding = r.embedding.as_deref()?;
                let score = cosine_similarity(vector, embedding);
                (score >= threshold).then(|| Neighbor {
                    record: r.clone(),
                    score,
                })
            })
            .collect();

        // Best first; ties in id order for determinism
        neighbors.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        neighbors.truncate(limit);
        Ok(neighbors)
    }

    async fn get(&self, id: &str) -> Result<Option<QaRecord>> {
        Ok(self.table().get(id).cloned())
    }

    async fn update(&self, id: &str, patch: &RecordPatch) -> Result<bool> {
        let mut table = self.table();
        match table.get_mut(id) {
            Some(record) => {
                patch.apply_to(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace(&self, record: &QaRecord) -> Result<bool> {
        let mut table = self.table();
        match table.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.table().remove(id).is_some())
    }

    async fn insert(&self, record: &QaRecord) -> Result<()> {
        let mut table = self.table();
        if table.contains_key(&record.id) {
            return Err(Error::InvalidInput(format!(
                "record {} already exists",
                record.id
            )));
        }
        table.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: &str, embedding: Option<Vec<f32>>) -> QaRecord {
        let mut r = QaRecord::new(
            id.to_string(),
            format!("question {id}"),
            format!("answer {id}"),
        );
        r.category = Some(category.to_string());
        r.embedding = embedding;
        r
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-9);
        // Dimension mismatch and zero vectors never panic
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[tokio::test]
    async fn test_fetch_pages_in_id_order() {
        let store = MemoryStore::seeded(vec![
            record("qa-3", "a", None),
            record("qa-1", "a", None),
            record("qa-2", "a", None),
        ]);

        let page = store
            .fetch_page(&RecordFilter::default(), 2, None)
            .await
            .unwrap();
        let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["qa-1", "qa-2"]);
        assert_eq!(page.next_page_state.as_deref(), Some("2"));

        let page = store
            .fetch_page(&RecordFilter::default(), 2, page.next_page_state)
            .await
            .unwrap();
        let ids: Vec<_> = page.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["qa-3"]);
        assert!(page.next_page_state.is_none());
    }

    #[tokio::test]
    async fn test_fetch_applies_filter() {
        let store = MemoryStore::seeded(vec![
            record("qa-1", "billing", None),
            record("qa-2", "shipping", None),
            record("qa-3", "billing", None),
        ]);

        let filter = RecordFilter {
            category: Some("billing".to_string()),
            ..Default::default()
        };
        let records = store.fetch(&filter, 10).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["qa-1", "qa-3"]);
    }

    #[tokio::test]
    async fn test_vector_neighbors_threshold_and_order() {
        let store = MemoryStore::seeded(vec![
            record("qa-1", "a", Some(vec![1.0, 0.0])),
            record("qa-2", "a", Some(vec![0.9, 0.1])),
            record("qa-3", "a", Some(vec![0.0, 1.0])),
            record("qa-4", "a", None), // no embedding, never a neighbor
        ]);

        let neighbors = store
            .vector_neighbors(&[1.0, 0.0], 0.5, 10, None, &RecordFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = neighbors.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(ids, vec!["qa-1", "qa-2"]);
        assert!(neighbors[0].score > neighbors[1].score);
    }

    #[tokio::test]
    async fn test_vector_neighbors_exclude_and_scope() {
        let store = MemoryStore::seeded(vec![
            record("qa-1", "billing", Some(vec![1.0, 0.0])),
            record("qa-2", "billing", Some(vec![1.0, 0.0])),
            record("qa-3", "shipping", Some(vec![1.0, 0.0])),
        ]);

        let scope = RecordFilter {
            category: Some("billing".to_string()),
            ..Default::default()
        };
        let neighbors = store
            .vector_neighbors(&[1.0, 0.0], 0.9, 10, Some("qa-1"), &scope)
            .await
            .unwrap();
        let ids: Vec<_> = neighbors.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(ids, vec!["qa-2"]);
    }

    #[tokio::test]
    async fn test_update_patches_and_bumps_version() {
        let store = MemoryStore::seeded(vec![record("qa-1", "billing", None)]);

        let patch = RecordPatch {
            answer: Some("new answer".to_string()),
            ..Default::default()
        };
        assert!(store.update("qa-1", &patch).await.unwrap());
        assert!(!store.update("qa-404", &patch).await.unwrap());

        let updated = store.get("qa-1").await.unwrap().unwrap();
        assert_eq!(updated.answer, "new answer");
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_replace_is_verbatim() {
        let store = MemoryStore::seeded(vec![record("qa-1", "billing", None)]);

        let mut replacement = record("qa-1", "shipping", Some(vec![0.5, 0.5]));
        replacement.version = 7;
        assert!(store.replace(&replacement).await.unwrap());

        let stored = store.get("qa-1").await.unwrap().unwrap();
        assert_eq!(stored, replacement);

        let missing = record("qa-404", "x", None);
        assert!(!store.replace(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let r = record("qa-1", "a", None);
        store.insert(&r).await.unwrap();
        assert!(store.insert(&r).await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let store = MemoryStore::seeded(vec![record("qa-1", "a", None)]);
        assert!(store.delete("qa-1").await.unwrap());
        assert!(!store.delete("qa-1").await.unwrap());
        assert!(store.is_empty());
    }
}
