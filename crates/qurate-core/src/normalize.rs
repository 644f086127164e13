//! Question-text normalization, the exact-duplicate key.

/// Canonical form of a question used for exact-duplicate grouping:
/// lowercased, punctuation and symbols dropped, whitespace runs
/// collapsed to single spaces, trimmed.
///
/// Two records are exact duplicates iff their normalized questions are
/// byte-identical. The rule is part of the engine's contract and must
/// not drift: it decides what "identical question" means.
#[must_use]
pub fn normalize_question(text: &str) -> String {
    let filtered: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}
