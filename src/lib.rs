//! # termstore-core
//!
//! Async client library for a remote taxonomy (managed metadata) term store.
//! Looks up terms, term sets, groups and labels, walks term hierarchies, and
//! creates terms, all through a declare-then-execute protocol where every
//! operation costs a known number of round trips.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use termstore_core::protocol::InMemoryTaxonomy;
//! use termstore_core::{TermId, TermStore, TermStoreConfig};
//!
//! # async fn demo() -> termstore_core::TermStoreResult<()> {
//! let service = Arc::new(InMemoryTaxonomy::new());
//! let store = TermStore::new(service, TermStoreConfig::new("https://contoso.example/sites/hr"));
//!
//! let term = store.get_term_by_id(&TermId::new("c2f4")).await?;
//! let ancestors = store.get_term_parents(&term.id).await?; // cached afterwards
//! let subtree = store.get_terms_sub_tree_flat(&term.id).await?;
//! # let _ = (ancestors, subtree);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`protocol`] | Wire model (`ObjectRef`, `QueryBatch`, `ServiceError`), the `TaxonomyService` trait, and an in-memory service |
//! | [`bridge`] | Sessions: declare loads and writes, then run exactly one round trip |
//! | [`cache`] | Write-once memoization of term-set members and ancestor lists |
//! | [`tree`] | Path parsing, ancestor resolution, subtree flattening, and remote ancestor walks |
//! | [`store`] | The `TermStore` facade exposing every operation |
//! | [`types`] | Domain records: `Term`, `TermSet`, `TermGroup`, `Label`, ids |
//! | [`config`] | Site binding and round-trip timeout |
//! | [`error`] | `TermStoreError` with thiserror; remote failures are carried verbatim |

pub mod bridge;
pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod store;
pub mod tree;
pub mod types;

pub use config::TermStoreConfig;
pub use error::{TermStoreError, TermStoreResult};
pub use store::TermStore;
pub use types::*;
