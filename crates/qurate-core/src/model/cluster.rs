use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::record::QaRecord;

/// How a cluster's members were judged duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMethod {
    /// Identical normalized question text.
    Exact,
    /// Connected through embedding-similarity edges at or above a threshold.
    Semantic,
}

impl ClusterMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for ClusterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An undirected similarity edge between two cluster members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEdge {
    pub left: String,
    pub right: String,
    pub score: f64,
}

impl ScoredEdge {
    /// Normalizes endpoint order so the same pair always compares equal.
    #[must_use]
    pub fn new(a: String, b: String, score: f64) -> Self {
        if a <= b {
            Self {
                left: a,
                right: b,
                score,
            }
        } else {
            Self {
                left: b,
                right: a,
                score,
            }
        }
    }
}

/// A set of records believed to be duplicates or near-duplicates.
///
/// Members are full read snapshots, sorted by id for deterministic
/// iteration. At least 2 members by construction; the builders drop
/// singleton groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub method: ClusterMethod,

    /// Member snapshots, sorted by id.
    pub members: Vec<QaRecord>,

    /// The scored edges that connected the members (semantic clusters only;
    /// empty for exact clusters).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<ScoredEdge>,

    /// Similarity threshold in force when the cluster was built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl Cluster {
    #[must_use]
    pub fn exact(mut members: Vec<QaRecord>) -> Self {
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            method: ClusterMethod::Exact,
            members,
            edges: Vec::new(),
            threshold: None,
        }
    }

    #[must_use]
    pub fn semantic(mut members: Vec<QaRecord>, mut edges: Vec<ScoredEdge>, threshold: f64) -> Self {
        members.sort_by(|a, b| a.id.cmp(&b.id));
        edges.sort_by(|a, b| (&a.left, &a.right).cmp(&(&b.left, &b.right)));
        Self {
            method: ClusterMethod::Semantic,
            members,
            edges,
            threshold: Some(threshold),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|r| r.id == id)
    }

    #[must_use]
    pub fn member(&self, id: &str) -> Option<&QaRecord> {
        self.members.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|r| r.id.clone()).collect()
    }

    /// Weakest recorded link between members, if any edges were recorded.
    #[must_use]
    pub fn min_edge_score(&self) -> Option<f64> {
        self.edges
            .iter()
            .map(|e| e.score)
            .min_by(|a, b| a.total_cmp(b))
    }
}
