//! # Qurate
//!
//! Audited duplicate cleanup for question-answer collections.
//!
//! Qurate is a CLI-first tool for finding and resolving duplicate
//! question-answer records in a vector-capable document collection. It
//! groups records by normalized question text or embedding similarity,
//! resolves each group to a survivor under a named strategy, and records
//! every destructive change in a local audit ledger so any operation can
//! be undone.
