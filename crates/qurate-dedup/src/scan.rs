//! Collection scanning: batched fetches feeding the cluster builders.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use qurate_core::error::{Error, Result};
use qurate_core::model::{Cluster, QaRecord};
use qurate_core::store::{DocumentStore, RecordFilter};

use crate::cluster::{build_exact_clusters, build_semantic_clusters};

/// Which duplicate detector(s) a scan runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMethod {
    Exact,
    Semantic,
    /// Exact clusters first, then semantic. The two reports can overlap;
    /// apply re-reads state, so resolving one after the other stays safe.
    Both,
}

impl ScanMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
            Self::Both => "both",
        }
    }

    #[must_use]
    pub const fn includes_exact(self) -> bool {
        matches!(self, Self::Exact | Self::Both)
    }

    #[must_use]
    pub const fn includes_semantic(self) -> bool {
        matches!(self, Self::Semantic | Self::Both)
    }
}

impl fmt::Display for ScanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(Self::Exact),
            "semantic" => Ok(Self::Semantic),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidInput(format!(
                "unknown scan method '{other}' (expected one of: exact, semantic, both)"
            ))),
        }
    }
}

/// Everything a scan needs, passed explicitly per call.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub method: ScanMethod,

    /// Similarity floor for semantic edges.
    pub threshold: f64,

    /// Metadata filter narrowing which records are scanned and matched.
    pub scope: RecordFilter,

    /// Page size for the batched fetch.
    pub batch_size: usize,

    /// Per-record cap on similarity candidates.
    pub neighbor_limit: usize,

    /// Stop fetching after this many records; `None` scans everything.
    pub sample: Option<usize>,
}

impl ScanOptions {
    #[must_use]
    pub fn new(method: ScanMethod) -> Self {
        Self {
            method,
            threshold: 0.90,
            scope: RecordFilter::default(),
            batch_size: 100,
            neighbor_limit: 20,
            sample: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::InvalidInput(format!(
                "threshold {} out of range (expected 0.0 ..= 1.0)",
                self.threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.neighbor_limit == 0 {
            return Err(Error::InvalidInput(
                "neighbor limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a scan found. Serializes for machine-readable scan output.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Records fetched and examined.
    pub scanned: usize,
    pub clusters: Vec<Cluster>,
}

impl ScanReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Records belonging to any cluster.
    #[must_use]
    pub fn total_members(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }

    /// Records that would be removed if every cluster kept one survivor.
    #[must_use]
    pub fn removable(&self) -> usize {
        self.clusters
            .iter()
            .map(|c| c.len().saturating_sub(1))
            .sum()
    }
}

/// Fetch every record matching `filter`, `batch_size` at a time,
/// stopping early at `cap` when one is given.
pub async fn fetch_all<S>(
    store: &S,
    filter: &RecordFilter,
    batch_size: usize,
    cap: Option<usize>,
) -> Result<Vec<QaRecord>>
where
    S: DocumentStore + ?Sized,
{
    let mut records = Vec::new();
    let mut page_state: Option<String> = None;
    loop {
        let remaining = cap.map(|c| c.saturating_sub(records.len()));
        if remaining == Some(0) {
            break;
        }
        let limit = remaining.map_or(batch_size, |r| batch_size.min(r));

        let page = store.fetch_page(filter, limit, page_state.take()).await?;
        let got = page.records.len();
        records.extend(page.records);
        log::debug!("Fetched {got} record(s) ({} so far)", records.len());

        match page.next_page_state {
            Some(state) if got > 0 => page_state = Some(state),
            _ => break,
        }
    }
    Ok(records)
}

/// Fetch the scanned population and run the configured detector(s).
pub async fn scan<S>(store: &S, options: &ScanOptions) -> Result<ScanReport>
where
    S: DocumentStore + ?Sized,
{
    options.validate()?;

    let records = fetch_all(store, &options.scope, options.batch_size, options.sample).await?;
    log::info!(
        "Scanning {} record(s) for {} duplicates",
        records.len(),
        options.method
    );

    let mut clusters = Vec::new();
    if options.method.includes_exact() {
        clusters.extend(build_exact_clusters(&records));
    }
    if options.method.includes_semantic() {
        clusters.extend(
            build_semantic_clusters(
                store,
                &records,
                options.threshold,
                &options.scope,
                options.neighbor_limit,
            )
            .await?,
        );
    }

    let report = ScanReport {
        scanned: records.len(),
        clusters,
    };
    log::info!(
        "Found {} cluster(s) covering {} record(s)",
        report.clusters.len(),
        report.total_members()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    use qurate_core::model::ClusterMethod;
    use qurate_store::MemoryStore;

    fn record(id: &str, question: &str) -> QaRecord {
        QaRecord::new(id.to_string(), question.to_string(), "answer".to_string())
    }

    #[tokio::test]
    async fn test_fetch_all_walks_every_page() {
        let records: Vec<QaRecord> = (0..25)
            .map(|i| record(&format!("qa-{i:02}"), &format!("question {i}")))
            .collect();
        let store = MemoryStore::seeded(records);

        let fetched = fetch_all(&store, &RecordFilter::default(), 10, None)
            .await
            .unwrap();
        assert_eq!(fetched.len(), 25);

        // Paging must not skip or repeat.
        let mut ids: Vec<String> = fetched.iter().map(|r| r.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 25);
    }

    #[tokio::test]
    async fn test_fetch_all_honors_cap() {
        let records: Vec<QaRecord> = (0..25)
            .map(|i| record(&format!("qa-{i:02}"), &format!("question {i}")))
            .collect();
        let store = MemoryStore::seeded(records);

        let fetched = fetch_all(&store, &RecordFilter::default(), 10, Some(13))
            .await
            .unwrap();
        assert_eq!(fetched.len(), 13);
    }

    #[tokio::test]
    async fn test_scan_exact_reports_duplicates() {
        let store = MemoryStore::seeded(vec![
            record("qa-1", "What is the refund policy?"),
            record("qa-2", "WHAT IS THE REFUND POLICY"),
            record("qa-3", "How do I reset my password?"),
        ]);

        let report = scan(&store, &ScanOptions::new(ScanMethod::Exact))
            .await
            .unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.total_members(), 2);
        assert_eq!(report.removable(), 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_scan_semantic_uses_embeddings() {
        let mut a = record("qa-1", "How long do refunds take?");
        a.embedding = Some(vec![1.0, 0.0]);
        let mut b = record("qa-2", "What is the refund turnaround?");
        b.embedding = Some(vec![0.9800, 0.1990]);
        let c = record("qa-3", "Unrelated question?");
        let store = MemoryStore::seeded(vec![a, b, c]);

        let mut options = ScanOptions::new(ScanMethod::Semantic);
        options.threshold = 0.95;
        let report = scan(&store, &options).await.unwrap();

        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].method, ClusterMethod::Semantic);
        assert_eq!(report.clusters[0].member_ids(), vec!["qa-1", "qa-2"]);
    }

    #[tokio::test]
    async fn test_scan_both_runs_each_detector() {
        let mut a = record("qa-1", "What is the refund policy?");
        a.embedding = Some(vec![1.0, 0.0]);
        let b = record("qa-2", "What is the refund policy!");
        let mut c = record("qa-3", "Refund policy details?");
        c.embedding = Some(vec![0.9900, 0.1411]);
        let store = MemoryStore::seeded(vec![a, b, c]);

        let mut options = ScanOptions::new(ScanMethod::Both);
        options.threshold = 0.95;
        let report = scan(&store, &options).await.unwrap();

        let methods: Vec<ClusterMethod> = report.clusters.iter().map(|c| c.method).collect();
        assert!(methods.contains(&ClusterMethod::Exact));
        assert!(methods.contains(&ClusterMethod::Semantic));
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_options() {
        let store = MemoryStore::new();

        let mut options = ScanOptions::new(ScanMethod::Exact);
        options.threshold = 1.5;
        assert!(scan(&store, &options).await.is_err());

        let mut options = ScanOptions::new(ScanMethod::Exact);
        options.batch_size = 0;
        assert!(scan(&store, &options).await.is_err());
    }

    #[test]
    fn test_scan_method_parse() {
        assert_eq!("exact".parse::<ScanMethod>().unwrap(), ScanMethod::Exact);
        assert_eq!("both".parse::<ScanMethod>().unwrap(), ScanMethod::Both);
        assert!("fuzzy".parse::<ScanMethod>().is_err());
        assert!(ScanMethod::Both.includes_exact());
        assert!(!ScanMethod::Exact.includes_semantic());
    }
}
