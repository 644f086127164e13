//! Duplicate cluster construction.
//!
//! Two builders over the same record set: exact clustering groups records
//! whose normalized question text is identical, and semantic clustering
//! connects records through embedding-similarity edges and takes the
//! connected components. Both return clusters of at least two members
//! with deterministic member and cluster ordering.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use qurate_core::error::Result;
use qurate_core::model::{Cluster, QaRecord, ScoredEdge};
use qurate_core::normalize::normalize_question;
use qurate_core::store::{DocumentStore, RecordFilter};

/// Group records whose questions are byte-identical after normalization.
///
/// Singleton groups are dropped. Questions that normalize to nothing
/// (punctuation-only text) carry no grouping signal and are skipped.
#[must_use]
pub fn build_exact_clusters(records: &[QaRecord]) -> Vec<Cluster> {
    let mut groups: HashMap<String, Vec<&QaRecord>> = HashMap::new();
    for record in records {
        let key = normalize_question(&record.question);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(record);
    }

    let mut clusters: Vec<Cluster> = groups
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|members| Cluster::exact(members.into_iter().cloned().collect()))
        .collect();
    sort_clusters(&mut clusters);

    log::debug!(
        "Exact clustering: {} cluster(s) across {} record(s)",
        clusters.len(),
        records.len()
    );
    clusters
}

/// Connect records through similarity edges at or above `threshold` and
/// return the connected components as clusters.
///
/// Every record with an embedding is queried against the store; records
/// without one are skipped. Neighbors surfaced by a query join the
/// component even when they are not part of `records` (their snapshots
/// come from the store's response). Any provider failure fails the whole
/// scan rather than returning a partial result.
pub async fn build_semantic_clusters<S>(
    store: &S,
    records: &[QaRecord],
    threshold: f64,
    scope: &RecordFilter,
    neighbor_limit: usize,
) -> Result<Vec<Cluster>>
where
    S: DocumentStore + ?Sized,
{
    let mut snapshots: HashMap<String, QaRecord> = HashMap::new();
    let mut scores: HashMap<(String, String), f64> = HashMap::new();

    let mut queried = 0_usize;
    for record in records {
        let Some(vector) = record.embedding.as_deref() else {
            continue;
        };
        queried += 1;

        let neighbors = store
            .vector_neighbors(vector, threshold, neighbor_limit, Some(&record.id), scope)
            .await?;

        if neighbors.is_empty() {
            continue;
        }
        snapshots
            .entry(record.id.clone())
            .or_insert_with(|| record.clone());

        for neighbor in neighbors {
            if neighbor.record.id == record.id {
                continue;
            }
            let edge = ScoredEdge::new(record.id.clone(), neighbor.record.id.clone(), neighbor.score);
            snapshots.entry(neighbor.record.id.clone()).or_insert(neighbor.record);
            // The same pair can surface from both endpoints' queries;
            // keep the strongest observation.
            let slot = scores.entry((edge.left, edge.right)).or_insert(edge.score);
            if edge.score > *slot {
                *slot = edge.score;
            }
        }
    }

    let clusters = components_from_edges(&snapshots, &scores, threshold);
    log::debug!(
        "Semantic clustering: {} cluster(s) from {} queried record(s), {} edge(s)",
        clusters.len(),
        queried,
        scores.len()
    );
    Ok(clusters)
}

/// Union-find over the edge endpoints; components with at least two
/// members become clusters.
fn components_from_edges(
    snapshots: &HashMap<String, QaRecord>,
    scores: &HashMap<(String, String), f64>,
    threshold: f64,
) -> Vec<Cluster> {
    let mut ids: Vec<&str> = snapshots.keys().map(String::as_str).collect();
    ids.sort_unstable();
    let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut union = UnionFind::<usize>::new(ids.len());
    for (left, right) in scores.keys() {
        if let (Some(&a), Some(&b)) = (index.get(left.as_str()), index.get(right.as_str())) {
            union.union(a, b);
        }
    }

    let mut components: HashMap<usize, Vec<&str>> = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        components.entry(union.find_mut(i)).or_default().push(id);
    }

    let mut clusters: Vec<Cluster> = components
        .into_values()
        .filter(|members| members.len() >= 2)
        .map(|member_ids| {
            let members: Vec<QaRecord> = member_ids
                .iter()
                .filter_map(|id| snapshots.get(*id).cloned())
                .collect();
            let edges: Vec<ScoredEdge> = scores
                .iter()
                .filter(|((left, _), _)| member_ids.contains(&left.as_str()))
                .map(|((left, right), score)| {
                    ScoredEdge::new(left.clone(), right.clone(), *score)
                })
                .collect();
            Cluster::semantic(members, edges, threshold)
        })
        .collect();
    sort_clusters(&mut clusters);
    clusters
}

/// Order clusters by their first member id so scan output is stable
/// across runs. Members are already sorted within each cluster.
fn sort_clusters(clusters: &mut [Cluster]) {
    clusters.sort_by(|a, b| {
        let a_first = a.members.first().map(|r| r.id.as_str()).unwrap_or_default();
        let b_first = b.members.first().map(|r| r.id.as_str()).unwrap_or_default();
        a_first.cmp(b_first)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use qurate_core::error::Error;
    use qurate_core::model::ClusterMethod;
    use qurate_core::store::{Neighbor, RecordPage, RecordPatch};
    use qurate_store::MemoryStore;

    fn record(id: &str, question: &str) -> QaRecord {
        QaRecord::new(id.to_string(), question.to_string(), "answer".to_string())
    }

    fn embedded(id: &str, question: &str, vector: Vec<f32>) -> QaRecord {
        let mut r = record(id, question);
        r.embedding = Some(vector);
        r
    }

    // -------------------------------------------------------------------
    // Exact clustering
    // -------------------------------------------------------------------

    #[test]
    fn test_exact_groups_normalized_questions() {
        let records = vec![
            record("qa-1", "What is the refund policy?"),
            record("qa-2", "what is the refund policy"),
            record("qa-3", "WHAT   IS THE REFUND POLICY?!"),
            record("qa-4", "How do I reset my password?"),
        ];

        let clusters = build_exact_clusters(&records);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].method, ClusterMethod::Exact);
        assert_eq!(clusters[0].member_ids(), vec!["qa-1", "qa-2", "qa-3"]);
    }

    #[test]
    fn test_exact_requires_identical_normal_forms() {
        // Near-duplicates with different wording stay apart.
        let records = vec![
            record("qa-1", "What is the refund policy?"),
            record("qa-2", "What's the refund policy?"),
        ];
        assert!(build_exact_clusters(&records).is_empty());
    }

    #[test]
    fn test_exact_drops_singletons_and_empty_keys() {
        let records = vec![
            record("qa-1", "Unique question one?"),
            record("qa-2", "Unique question two?"),
            record("qa-3", "???"),
            record("qa-4", "..."),
        ];
        // The two punctuation-only questions normalize to "" but must not
        // be clustered together on that accident.
        assert!(build_exact_clusters(&records).is_empty());
    }

    #[test]
    fn test_exact_cluster_ordering_is_stable() {
        let records = vec![
            record("qa-9", "beta question"),
            record("qa-5", "alpha question"),
            record("qa-2", "beta question"),
            record("qa-1", "alpha question"),
        ];
        let clusters = build_exact_clusters(&records);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_ids(), vec!["qa-1", "qa-5"]);
        assert_eq!(clusters[1].member_ids(), vec!["qa-2", "qa-9"]);
    }

    // -------------------------------------------------------------------
    // Semantic clustering
    // -------------------------------------------------------------------

    /// Test store with a fixed pairwise score table, for shapes real
    /// vectors cannot produce.
    struct ScriptedStore {
        records: Vec<QaRecord>,
        scores: HashMap<(String, String), f64>,
    }

    impl ScriptedStore {
        fn new(records: Vec<QaRecord>, pairs: &[(&str, &str, f64)]) -> Self {
            let mut scores = HashMap::new();
            for (a, b, score) in pairs {
                let edge = ScoredEdge::new((*a).to_string(), (*b).to_string(), *score);
                scores.insert((edge.left, edge.right), edge.score);
            }
            Self { records, scores }
        }

        fn score(&self, a: &str, b: &str) -> Option<f64> {
            let key = if a <= b { (a, b) } else { (b, a) };
            self.scores.get(&(key.0.to_string(), key.1.to_string())).copied()
        }
    }

    #[async_trait]
    impl DocumentStore for ScriptedStore {
        async fn fetch_page(
            &self,
            filter: &RecordFilter,
            limit: usize,
            _page_state: Option<String>,
        ) -> Result<RecordPage> {
            let records: Vec<QaRecord> = self
                .records
                .iter()
                .filter(|r| filter.matches(r))
                .take(limit)
                .cloned()
                .collect();
            Ok(RecordPage {
                records,
                next_page_state: None,
            })
        }

        async fn vector_neighbors(
            &self,
            _vector: &[f32],
            threshold: f64,
            limit: usize,
            exclude_id: Option<&str>,
            scope: &RecordFilter,
        ) -> Result<Vec<Neighbor>> {
            let own = exclude_id.unwrap_or_default();
            let mut hits: Vec<Neighbor> = self
                .records
                .iter()
                .filter(|r| r.id != own && scope.matches(r))
                .filter_map(|r| {
                    self.score(own, &r.id).map(|score| Neighbor {
                        record: r.clone(),
                        score,
                    })
                })
                .filter(|n| n.score >= threshold)
                .collect();
            hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.record.id.cmp(&b.record.id)));
            hits.truncate(limit);
            Ok(hits)
        }

        async fn get(&self, id: &str) -> Result<Option<QaRecord>> {
            Ok(self.records.iter().find(|r| r.id == id).cloned())
        }

        async fn update(&self, _id: &str, _patch: &RecordPatch) -> Result<bool> {
            Err(Error::InvalidInput("scripted store is read-only".to_string()))
        }

        async fn replace(&self, _record: &QaRecord) -> Result<bool> {
            Err(Error::InvalidInput("scripted store is read-only".to_string()))
        }

        async fn delete(&self, _id: &str) -> Result<bool> {
            Err(Error::InvalidInput("scripted store is read-only".to_string()))
        }

        async fn insert(&self, _record: &QaRecord) -> Result<()> {
            Err(Error::InvalidInput("scripted store is read-only".to_string()))
        }
    }

    #[tokio::test]
    async fn test_semantic_transitive_closure() {
        // A-B and B-C clear the threshold, A-C does not; all three land
        // in one cluster through B.
        let records = vec![
            embedded("qa-a", "q a", vec![1.0]),
            embedded("qa-b", "q b", vec![1.0]),
            embedded("qa-c", "q c", vec![1.0]),
        ];
        let store = ScriptedStore::new(
            records.clone(),
            &[
                ("qa-a", "qa-b", 0.92),
                ("qa-b", "qa-c", 0.91),
                ("qa-a", "qa-c", 0.60),
            ],
        );

        let clusters =
            build_semantic_clusters(&store, &records, 0.90, &RecordFilter::default(), 10)
                .await
                .unwrap();

        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.method, ClusterMethod::Semantic);
        assert_eq!(cluster.member_ids(), vec!["qa-a", "qa-b", "qa-c"]);
        assert_eq!(cluster.threshold, Some(0.90));
        // Only the two qualifying edges are recorded.
        assert_eq!(cluster.edges.len(), 2);
        assert_eq!(cluster.min_edge_score(), Some(0.91));
    }

    #[tokio::test]
    async fn test_semantic_separate_components() {
        let records = vec![
            embedded("qa-a", "q a", vec![1.0]),
            embedded("qa-b", "q b", vec![1.0]),
            embedded("qa-c", "q c", vec![1.0]),
            embedded("qa-d", "q d", vec![1.0]),
        ];
        let store = ScriptedStore::new(
            records.clone(),
            &[("qa-a", "qa-b", 0.95), ("qa-c", "qa-d", 0.93)],
        );

        let clusters =
            build_semantic_clusters(&store, &records, 0.90, &RecordFilter::default(), 10)
                .await
                .unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_ids(), vec!["qa-a", "qa-b"]);
        assert_eq!(clusters[1].member_ids(), vec!["qa-c", "qa-d"]);
    }

    #[tokio::test]
    async fn test_semantic_skips_records_without_embeddings() {
        let records = vec![
            record("qa-a", "q a"),
            record("qa-b", "q b"),
        ];
        let store = ScriptedStore::new(records.clone(), &[("qa-a", "qa-b", 0.99)]);

        // No embeddings means no queries, so the scripted edge is never seen.
        let clusters =
            build_semantic_clusters(&store, &records, 0.90, &RecordFilter::default(), 10)
                .await
                .unwrap();
        assert!(clusters.is_empty());
    }

    #[tokio::test]
    async fn test_semantic_against_real_cosine_store() {
        // Unit vectors at 0, 25, and 50 degrees: adjacent pairs score
        // cos(25°) ≈ 0.906, the far pair cos(50°) ≈ 0.643.
        let a = embedded("qa-a", "q a", vec![1.0, 0.0]);
        let b = embedded("qa-b", "q b", vec![0.9063, 0.4226]);
        let c = embedded("qa-c", "q c", vec![0.6428, 0.7660]);
        let records = vec![a.clone(), b.clone(), c.clone()];
        let store = MemoryStore::seeded(records.clone());

        let clusters =
            build_semantic_clusters(&store, &records, 0.90, &RecordFilter::default(), 10)
                .await
                .unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_ids(), vec!["qa-a", "qa-b", "qa-c"]);
        let min = clusters[0].min_edge_score().unwrap();
        assert!(min >= 0.90, "weakest kept edge {min} fell below threshold");
    }

    #[tokio::test]
    async fn test_semantic_scope_filter_limits_candidates() {
        let mut a = embedded("qa-a", "q a", vec![1.0, 0.0]);
        let mut b = embedded("qa-b", "q b", vec![0.9900, 0.1411]);
        let mut c = embedded("qa-c", "q c", vec![0.9800, 0.1990]);
        a.category = Some("billing".to_string());
        b.category = Some("billing".to_string());
        c.category = Some("shipping".to_string());
        let store = MemoryStore::seeded(vec![a.clone(), b.clone(), c.clone()]);

        let scope = RecordFilter {
            category: Some("billing".to_string()),
            ..Default::default()
        };
        // Only billing records are scanned or matched, so qa-c stays out
        // even though its vector is close.
        let clusters = build_semantic_clusters(&store, &[a, b], 0.90, &scope, 10)
            .await
            .unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_ids(), vec!["qa-a", "qa-b"]);
    }

    #[tokio::test]
    async fn test_semantic_provider_failure_fails_scan() {
        struct FailingStore;

        #[async_trait]
        impl DocumentStore for FailingStore {
            async fn fetch_page(
                &self,
                _filter: &RecordFilter,
                _limit: usize,
                _page_state: Option<String>,
            ) -> Result<RecordPage> {
                Ok(RecordPage::default())
            }

            async fn vector_neighbors(
                &self,
                _vector: &[f32],
                _threshold: f64,
                _limit: usize,
                _exclude_id: Option<&str>,
                _scope: &RecordFilter,
            ) -> Result<Vec<Neighbor>> {
                Err(Error::provider("test provider", "connection reset"))
            }

            async fn get(&self, _id: &str) -> Result<Option<QaRecord>> {
                Ok(None)
            }

            async fn update(&self, _id: &str, _patch: &RecordPatch) -> Result<bool> {
                Ok(false)
            }

            async fn replace(&self, _record: &QaRecord) -> Result<bool> {
                Ok(false)
            }

            async fn delete(&self, _id: &str) -> Result<bool> {
                Ok(false)
            }

            async fn insert(&self, _record: &QaRecord) -> Result<()> {
                Ok(())
            }
        }

        let records = vec![embedded("qa-a", "q a", vec![1.0])];
        let err = build_semantic_clusters(
            &FailingStore,
            &records,
            0.90,
            &RecordFilter::default(),
            10,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
    }
}
