//! Core domain model for qurate.
//!
//! This crate defines the question-answer record model, duplicate
//! clusters and resolution decisions, the `DocumentStore` capability
//! trait, and the SQLite-backed audit ledger that makes every
//! destructive change inspectable and reversible.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod error;
pub mod keyword;
pub mod ledger;
pub mod model;
pub mod normalize;
pub mod store;

pub use error::{ApplyFailure, Error, Result};
