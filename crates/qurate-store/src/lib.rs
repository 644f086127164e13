//! Document-store backends for qurate.
//!
//! Two `DocumentStore` implementations: [`DataApiStore`] speaks the
//! JSON command protocol of a vector-capable document API over HTTP,
//! and [`MemoryStore`] keeps records in a map with real cosine
//! similarity, serving tests and offline work.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod dataapi;
pub mod memory;

pub use dataapi::{DataApiSettings, DataApiStore};
pub use memory::{cosine_similarity, MemoryStore};
