use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::model::cluster::ClusterMethod;
use crate::model::record::QaRecord;

/// Conflict-resolution strategies (closed set).
///
/// Every strategy is deterministic for a given cluster: ties fall back to
/// upload timestamp and finally to id order, so repeated runs pick the
/// same survivor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Lowest upload timestamp wins.
    KeepFirst,
    /// Highest document date wins; ties by upload timestamp, then id.
    KeepMostRecent,
    /// Longest answer (in characters) wins; ties as `KeepMostRecent`.
    KeepLongestAnswer,
    /// First match against an ordered preferred-source list wins;
    /// no match falls back to `KeepFirst`.
    KeepPreferredSource,
    /// An operator-supplied choice; validated against cluster membership.
    Manual,
}

impl Strategy {
    pub const ALL: [Self; 5] = [
        Self::KeepFirst,
        Self::KeepMostRecent,
        Self::KeepLongestAnswer,
        Self::KeepPreferredSource,
        Self::Manual,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepFirst => "keep-first",
            Self::KeepMostRecent => "keep-most-recent",
            Self::KeepLongestAnswer => "keep-longest-answer",
            Self::KeepPreferredSource => "keep-preferred-source",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "unknown strategy '{s}' (expected one of: keep-first, keep-most-recent, \
                     keep-longest-answer, keep-preferred-source, manual)"
                ))
            })
    }
}

/// Explicit inputs a resolution draws on, passed per call rather than
/// read from ambient configuration.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Ordered source labels for `keep-preferred-source`.
    pub preferred_sources: Vec<String>,

    /// Surviving id for `manual`.
    pub choice: Option<String>,

    /// Synthesize a merged record (winner's answer, union of metadata)
    /// instead of keeping the survivor verbatim.
    pub consolidate: bool,

    /// With `consolidate`, write the merged record under a fresh id and
    /// delete every original member, instead of overwriting the winner.
    pub assign_new_id: bool,
}

/// The storage effect a resolution decided on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    /// Keep the survivor untouched, delete the discarded records.
    KeepOne {
        survivor: QaRecord,
        discarded: Vec<QaRecord>,
    },
    /// Write the synthesized record (in place when its id equals
    /// `survivor_id`, as an insert otherwise), then delete the discarded
    /// records.
    Merge {
        merged: QaRecord,
        /// Id of the member the merge derived from.
        survivor_id: String,
        discarded: Vec<QaRecord>,
    },
    /// No storage effect, no ledger entry.
    Skip,
}

/// The outcome of resolving one cluster.
///
/// Immutable once created; consumed by the executor (moved, not reused).
/// Carries enough snapshot data to render a preview without further
/// storage reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: Strategy,
    pub cluster_method: ClusterMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub action: Action,
}

impl Resolution {
    /// An operator-declined cluster: nothing to apply, nothing to audit.
    #[must_use]
    pub const fn skip(strategy: Strategy, cluster_method: ClusterMethod) -> Self {
        Self {
            strategy,
            cluster_method,
            threshold: None,
            action: Action::Skip,
        }
    }

    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self.action, Action::Skip)
    }

    #[must_use]
    pub fn survivor_id(&self) -> Option<&str> {
        match &self.action {
            Action::KeepOne { survivor, .. } => Some(&survivor.id),
            Action::Merge { merged, .. } => Some(&merged.id),
            Action::Skip => None,
        }
    }

    #[must_use]
    pub fn discarded_ids(&self) -> Vec<String> {
        match &self.action {
            Action::KeepOne { discarded, .. } | Action::Merge { discarded, .. } => {
                discarded.iter().map(|r| r.id.clone()).collect()
            }
            Action::Skip => Vec::new(),
        }
    }

    /// One-line human description, used in logs and previews.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.action {
            Action::KeepOne {
                survivor,
                discarded,
            } => format!(
                "keep {}, delete {} duplicate(s)",
                survivor.id,
                discarded.len()
            ),
            Action::Merge {
                merged,
                survivor_id,
                discarded,
            } => {
                if merged.id == *survivor_id {
                    format!(
                        "consolidate into {}, delete {} duplicate(s)",
                        merged.id,
                        discarded.len()
                    )
                } else {
                    format!(
                        "merge {} record(s) into new {} (from {})",
                        discarded.len(),
                        merged.id,
                        survivor_id
                    )
                }
            }
            Action::Skip => "skip".to_string(),
        }
    }
}
