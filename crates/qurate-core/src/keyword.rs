//! Client-side keyword filtering over fetched records.
//!
//! The document store's query surface is deliberately narrow, so text
//! search is a pure function over records the caller already fetched.
//! Plain case-insensitive substring matching; no relevance scoring.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::model::QaRecord;

/// Which record text a keyword search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    Question,
    Answer,
    #[default]
    Both,
}

impl SearchField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question" => Ok(Self::Question),
            "answer" => Ok(Self::Answer),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidInput(format!(
                "unknown search field '{other}' (expected question, answer, or both)"
            ))),
        }
    }
}

/// Whether `record` contains `term` (case-insensitive) in the chosen field.
#[must_use]
pub fn matches(record: &QaRecord, term: &str, field: SearchField) -> bool {
    let needle = term.to_lowercase();
    let hit = |text: &str| text.to_lowercase().contains(&needle);
    match field {
        SearchField::Question => hit(&record.question),
        SearchField::Answer => hit(&record.answer),
        SearchField::Both => hit(&record.question) || hit(&record.answer),
    }
}

/// Keep only records matching `term` in the chosen field.
#[must_use]
pub fn filter_records(records: Vec<QaRecord>, term: &str, field: SearchField) -> Vec<QaRecord> {
    records
        .into_iter()
        .filter(|r| matches(r, term, field))
        .collect()
}
