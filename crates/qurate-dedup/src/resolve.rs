//! Survivor selection and merge synthesis.
//!
//! `resolve` is a pure function from a cluster, a strategy, and explicit
//! context to a `Resolution`. It never touches storage; the executor in
//! [`crate::execute`] turns the resolution into mutations. Every strategy
//! ranks members under a total order ending in id, so the same cluster
//! always resolves the same way.

use std::cmp::Ordering;

use uuid::Uuid;

use qurate_core::error::{Error, Result};
use qurate_core::model::{Action, Cluster, QaRecord, Resolution, ResolveContext, Strategy};

/// Resolve `cluster` under `strategy`.
///
/// Fails with `InvalidCluster` for fewer than two members, with
/// `InvalidChoice` when a manual choice is not a member, and with
/// `InvalidInput` when `manual` is asked for without a choice.
pub fn resolve(
    cluster: &Cluster,
    strategy: Strategy,
    context: &ResolveContext,
) -> Result<Resolution> {
    if cluster.len() < 2 {
        return Err(Error::InvalidCluster(format!(
            "resolution needs at least 2 members, got {}",
            cluster.len()
        )));
    }

    let survivor = select_survivor(cluster, strategy, context)?;
    let action = if context.consolidate {
        synthesize_merge(cluster, survivor, context)
    } else {
        Action::KeepOne {
            survivor: survivor.clone(),
            discarded: all_except(cluster, &survivor.id),
        }
    };

    Ok(Resolution {
        strategy,
        cluster_method: cluster.method,
        threshold: cluster.threshold,
        action,
    })
}

fn select_survivor<'a>(
    cluster: &'a Cluster,
    strategy: Strategy,
    context: &ResolveContext,
) -> Result<&'a QaRecord> {
    let members = &cluster.members;
    let survivor = match strategy {
        Strategy::KeepFirst => members.iter().min_by(|a, b| arrival_order(a, b)),
        Strategy::KeepMostRecent => members.iter().max_by(|a, b| recency_rank(a, b)),
        Strategy::KeepLongestAnswer => members.iter().max_by(|a, b| answer_length_rank(a, b)),
        Strategy::KeepPreferredSource => {
            return preferred_source_survivor(cluster, context);
        }
        Strategy::Manual => {
            let choice = context.choice.as_deref().ok_or_else(|| {
                Error::InvalidInput("manual resolution requires a chosen survivor id".to_string())
            })?;
            return cluster.member(choice).ok_or_else(|| Error::InvalidChoice {
                choice: choice.to_string(),
            });
        }
    };
    // Guarded non-empty above.
    survivor.ok_or_else(|| Error::InvalidCluster("empty cluster".to_string()))
}

/// Earliest upload wins; ids settle exact ties.
fn arrival_order(a: &QaRecord, b: &QaRecord) -> Ordering {
    a.upload_timestamp
        .cmp(&b.upload_timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

/// Ranks recency for `max_by`: higher document date is better, records
/// without a date rank below any dated record, then later upload, then
/// lower id.
fn recency_rank(a: &QaRecord, b: &QaRecord) -> Ordering {
    a.document_date
        .cmp(&b.document_date)
        .then_with(|| a.upload_timestamp.cmp(&b.upload_timestamp))
        .then_with(|| b.id.cmp(&a.id))
}

/// Ranks answer length (in characters) for `max_by`; ties fall back to
/// the recency ranking.
fn answer_length_rank(a: &QaRecord, b: &QaRecord) -> Ordering {
    a.answer_len()
        .cmp(&b.answer_len())
        .then_with(|| recency_rank(a, b))
}

/// Walk the preferred-source list in order; the first label with any
/// member match wins, and `arrival_order` breaks ties among the matches.
/// No label matching at all falls back to `keep-first`.
fn preferred_source_survivor<'a>(
    cluster: &'a Cluster,
    context: &ResolveContext,
) -> Result<&'a QaRecord> {
    for source in &context.preferred_sources {
        if let Some(winner) = cluster
            .members
            .iter()
            .filter(|r| r.source_file.as_deref() == Some(source.as_str()))
            .min_by(|a, b| arrival_order(a, b))
        {
            return Ok(winner);
        }
    }
    cluster
        .members
        .iter()
        .min_by(|a, b| arrival_order(a, b))
        .ok_or_else(|| Error::InvalidCluster("empty cluster".to_string()))
}

fn all_except(cluster: &Cluster, id: &str) -> Vec<QaRecord> {
    cluster
        .members
        .iter()
        .filter(|r| r.id != id)
        .cloned()
        .collect()
}

/// Build the consolidated record: the winner's question and answer, with
/// any metadata the winner lacks filled from other members (in id order,
/// so the fill is deterministic). Conflicting non-null values keep the
/// winner's.
fn synthesize_merge(cluster: &Cluster, winner: &QaRecord, context: &ResolveContext) -> Action {
    let mut merged = winner.clone();
    for member in &cluster.members {
        if member.id == winner.id {
            continue;
        }
        if merged.source_file.is_none() {
            merged.source_file.clone_from(&member.source_file);
        }
        if merged.category.is_none() {
            merged.category.clone_from(&member.category);
        }
        if merged.document_date.is_none() {
            merged.document_date = member.document_date;
        }
        if merged.embedding.is_none() {
            merged.embedding.clone_from(&member.embedding);
        }
    }
    // The consolidation is an edit of the winning lineage either way.
    merged.version = winner.version + 1;

    let discarded = if context.assign_new_id {
        merged.id = Uuid::new_v4().to_string();
        // Every original member goes, the winner included.
        cluster.members.clone()
    } else {
        all_except(cluster, &winner.id)
    };

    Action::Merge {
        merged,
        survivor_id: winner.id.clone(),
        discarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, TimeZone, Utc};
    use qurate_core::model::ClusterMethod;

    fn record(id: &str, uploaded_day: u32) -> QaRecord {
        let mut r = QaRecord::new(
            id.to_string(),
            "What is the refund policy?".to_string(),
            "30 days.".to_string(),
        );
        r.upload_timestamp = Utc.with_ymd_and_hms(2024, 3, uploaded_day, 12, 0, 0).unwrap();
        r
    }

    fn cluster_of(members: Vec<QaRecord>) -> Cluster {
        Cluster::exact(members)
    }

    // -------------------------------------------------------------------
    // keep-first
    // -------------------------------------------------------------------

    #[test]
    fn test_keep_first_earliest_upload_wins() {
        let cluster = cluster_of(vec![record("qa-b", 5), record("qa-a", 9), record("qa-c", 7)]);
        let resolution =
            resolve(&cluster, Strategy::KeepFirst, &ResolveContext::default()).unwrap();

        assert_eq!(resolution.survivor_id(), Some("qa-b"));
        assert_eq!(resolution.discarded_ids(), vec!["qa-a", "qa-c"]);
        assert_eq!(resolution.strategy, Strategy::KeepFirst);
        assert_eq!(resolution.cluster_method, ClusterMethod::Exact);
    }

    #[test]
    fn test_keep_first_timestamp_tie_falls_to_id() {
        let cluster = cluster_of(vec![record("qa-z", 5), record("qa-a", 5)]);
        let resolution =
            resolve(&cluster, Strategy::KeepFirst, &ResolveContext::default()).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-a"));
    }

    // -------------------------------------------------------------------
    // keep-most-recent
    // -------------------------------------------------------------------

    #[test]
    fn test_keep_most_recent_prefers_document_date() {
        let mut older = record("qa-1", 9);
        older.document_date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let mut newer = record("qa-2", 1);
        newer.document_date = NaiveDate::from_ymd_opt(2024, 6, 1);

        let cluster = cluster_of(vec![older, newer]);
        let resolution =
            resolve(&cluster, Strategy::KeepMostRecent, &ResolveContext::default()).unwrap();
        // Document date outranks upload order.
        assert_eq!(resolution.survivor_id(), Some("qa-2"));
    }

    #[test]
    fn test_keep_most_recent_dated_beats_undated() {
        let undated = record("qa-1", 9);
        let mut dated = record("qa-2", 1);
        dated.document_date = NaiveDate::from_ymd_opt(2020, 1, 1);

        let cluster = cluster_of(vec![undated, dated]);
        let resolution =
            resolve(&cluster, Strategy::KeepMostRecent, &ResolveContext::default()).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-2"));
    }

    #[test]
    fn test_keep_most_recent_date_tie_falls_to_upload_then_id() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut a = record("qa-a", 3);
        a.document_date = date;
        let mut b = record("qa-b", 8);
        b.document_date = date;
        let cluster = cluster_of(vec![a, b]);
        let resolution =
            resolve(&cluster, Strategy::KeepMostRecent, &ResolveContext::default()).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-b"));

        // Full tie: lower id survives.
        let mut c = record("qa-c", 8);
        c.document_date = date;
        let mut d = record("qa-d", 8);
        d.document_date = date;
        let cluster = cluster_of(vec![d, c]);
        let resolution =
            resolve(&cluster, Strategy::KeepMostRecent, &ResolveContext::default()).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-c"));
    }

    // -------------------------------------------------------------------
    // keep-longest-answer
    // -------------------------------------------------------------------

    #[test]
    fn test_keep_longest_answer_by_char_count() {
        let mut short = record("qa-1", 1);
        short.answer = "a".repeat(40);
        let mut long = record("qa-2", 2);
        long.answer = "b".repeat(55);
        let mut shortest = record("qa-3", 3);
        shortest.answer = "c".repeat(30);

        let cluster = cluster_of(vec![short, long, shortest]);
        let resolution =
            resolve(&cluster, Strategy::KeepLongestAnswer, &ResolveContext::default()).unwrap();

        assert_eq!(resolution.survivor_id(), Some("qa-2"));
        assert_eq!(resolution.discarded_ids(), vec!["qa-1", "qa-3"]);
    }

    #[test]
    fn test_keep_longest_answer_counts_chars_not_bytes() {
        let mut multibyte = record("qa-1", 1);
        multibyte.answer = "é".repeat(10); // 10 chars, 20 bytes
        let mut ascii = record("qa-2", 2);
        ascii.answer = "x".repeat(12); // 12 chars, 12 bytes

        let cluster = cluster_of(vec![multibyte, ascii]);
        let resolution =
            resolve(&cluster, Strategy::KeepLongestAnswer, &ResolveContext::default()).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-2"));
    }

    #[test]
    fn test_keep_longest_answer_tie_falls_to_recency() {
        let mut a = record("qa-a", 2);
        a.answer = "same length!".to_string();
        let mut b = record("qa-b", 6);
        b.answer = "same width!!".to_string();
        b.document_date = NaiveDate::from_ymd_opt(2024, 1, 1);

        let cluster = cluster_of(vec![a, b]);
        let resolution =
            resolve(&cluster, Strategy::KeepLongestAnswer, &ResolveContext::default()).unwrap();
        // Equal lengths; qa-b has a document date and wins on recency.
        assert_eq!(resolution.survivor_id(), Some("qa-b"));
    }

    // -------------------------------------------------------------------
    // keep-preferred-source
    // -------------------------------------------------------------------

    fn sourced(id: &str, uploaded_day: u32, source: &str) -> QaRecord {
        let mut r = record(id, uploaded_day);
        r.source_file = Some(source.to_string());
        r
    }

    #[test]
    fn test_preferred_source_walks_list_in_order() {
        let cluster = cluster_of(vec![
            sourced("qa-1", 1, "legacy_export.csv"),
            sourced("qa-2", 2, "policies_2024.pdf"),
            sourced("qa-3", 3, "handbook.pdf"),
        ]);
        let context = ResolveContext {
            preferred_sources: vec!["handbook.pdf".to_string(), "policies_2024.pdf".to_string()],
            ..Default::default()
        };
        let resolution = resolve(&cluster, Strategy::KeepPreferredSource, &context).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-3"));
    }

    #[test]
    fn test_preferred_source_ties_resolved_by_arrival() {
        let cluster = cluster_of(vec![
            sourced("qa-1", 5, "handbook.pdf"),
            sourced("qa-2", 2, "handbook.pdf"),
            sourced("qa-3", 1, "legacy_export.csv"),
        ]);
        let context = ResolveContext {
            preferred_sources: vec!["handbook.pdf".to_string()],
            ..Default::default()
        };
        let resolution = resolve(&cluster, Strategy::KeepPreferredSource, &context).unwrap();
        // Earliest-uploaded handbook record, not the overall earliest.
        assert_eq!(resolution.survivor_id(), Some("qa-2"));
    }

    #[test]
    fn test_preferred_source_falls_back_to_keep_first() {
        let cluster = cluster_of(vec![
            sourced("qa-1", 5, "a.pdf"),
            sourced("qa-2", 2, "b.pdf"),
        ]);
        let context = ResolveContext {
            preferred_sources: vec!["missing.pdf".to_string()],
            ..Default::default()
        };
        let resolution = resolve(&cluster, Strategy::KeepPreferredSource, &context).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-2"));

        // An empty preference list degrades the same way.
        let resolution =
            resolve(&cluster, Strategy::KeepPreferredSource, &ResolveContext::default()).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-2"));
    }

    // -------------------------------------------------------------------
    // manual
    // -------------------------------------------------------------------

    #[test]
    fn test_manual_choice_must_be_member() {
        let cluster = cluster_of(vec![record("qa-1", 1), record("qa-2", 2)]);

        let context = ResolveContext {
            choice: Some("qa-2".to_string()),
            ..Default::default()
        };
        let resolution = resolve(&cluster, Strategy::Manual, &context).unwrap();
        assert_eq!(resolution.survivor_id(), Some("qa-2"));

        let context = ResolveContext {
            choice: Some("qa-99".to_string()),
            ..Default::default()
        };
        let err = resolve(&cluster, Strategy::Manual, &context).unwrap_err();
        assert!(matches!(err, Error::InvalidChoice { choice } if choice == "qa-99"));
    }

    #[test]
    fn test_manual_without_choice_rejected() {
        let cluster = cluster_of(vec![record("qa-1", 1), record("qa-2", 2)]);
        let err = resolve(&cluster, Strategy::Manual, &ResolveContext::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    // -------------------------------------------------------------------
    // cluster validity and determinism
    // -------------------------------------------------------------------

    #[test]
    fn test_undersized_clusters_rejected() {
        let empty = Cluster::exact(Vec::new());
        let err = resolve(&empty, Strategy::KeepFirst, &ResolveContext::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCluster(_)));

        let singleton = cluster_of(vec![record("qa-1", 1)]);
        let err =
            resolve(&singleton, Strategy::KeepFirst, &ResolveContext::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCluster(_)));
    }

    #[test]
    fn test_resolution_is_order_independent() {
        let a = record("qa-a", 3);
        let b = record("qa-b", 1);
        let c = record("qa-c", 2);

        let forward = cluster_of(vec![a.clone(), b.clone(), c.clone()]);
        let backward = cluster_of(vec![c, b, a]);

        for strategy in [
            Strategy::KeepFirst,
            Strategy::KeepMostRecent,
            Strategy::KeepLongestAnswer,
        ] {
            let lhs = resolve(&forward, strategy, &ResolveContext::default()).unwrap();
            let rhs = resolve(&backward, strategy, &ResolveContext::default()).unwrap();
            assert_eq!(lhs, rhs, "strategy {strategy} depended on member order");
        }
    }

    // -------------------------------------------------------------------
    // consolidation
    // -------------------------------------------------------------------

    #[test]
    fn test_consolidate_in_place_unions_metadata() {
        let mut winner = record("qa-2", 1);
        winner.answer = "The full answer.".to_string();
        winner.category = Some("billing".to_string());
        winner.version = 3;

        let mut other = record("qa-1", 2);
        other.answer = "Short.".to_string();
        other.category = Some("shipping".to_string());
        other.source_file = Some("faq.pdf".to_string());
        other.document_date = NaiveDate::from_ymd_opt(2024, 2, 2);
        other.embedding = Some(vec![0.5, 0.5]);

        let cluster = cluster_of(vec![winner, other]);
        let context = ResolveContext {
            consolidate: true,
            ..Default::default()
        };
        let resolution = resolve(&cluster, Strategy::KeepFirst, &context).unwrap();

        let Action::Merge {
            merged,
            survivor_id,
            discarded,
        } = resolution.action
        else {
            panic!("expected a merge action");
        };
        assert_eq!(survivor_id, "qa-2");
        assert_eq!(merged.id, "qa-2");
        // Winner's content and non-null metadata stand.
        assert_eq!(merged.answer, "The full answer.");
        assert_eq!(merged.category.as_deref(), Some("billing"));
        // Gaps filled from the other member.
        assert_eq!(merged.source_file.as_deref(), Some("faq.pdf"));
        assert_eq!(merged.document_date, NaiveDate::from_ymd_opt(2024, 2, 2));
        assert!(merged.has_embedding());
        assert_eq!(merged.version, 4);
        // In place: only the losing member is deleted.
        assert_eq!(discarded.len(), 1);
        assert_eq!(discarded[0].id, "qa-1");
    }

    #[test]
    fn test_consolidate_with_new_id_discards_all_members() {
        let cluster = cluster_of(vec![record("qa-1", 1), record("qa-2", 2)]);
        let context = ResolveContext {
            consolidate: true,
            assign_new_id: true,
            ..Default::default()
        };
        let resolution = resolve(&cluster, Strategy::KeepFirst, &context).unwrap();

        let Action::Merge {
            merged,
            survivor_id,
            discarded,
        } = resolution.action
        else {
            panic!("expected a merge action");
        };
        assert_eq!(survivor_id, "qa-1");
        assert_ne!(merged.id, "qa-1");
        assert_ne!(merged.id, "qa-2");
        let mut discarded_ids: Vec<String> = discarded.iter().map(|r| r.id.clone()).collect();
        discarded_ids.sort();
        assert_eq!(discarded_ids, vec!["qa-1", "qa-2"]);
    }
}
