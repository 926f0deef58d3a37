//! Contract with the remote taxonomy service.
//!
//! The service speaks a deferred "declare interest, then execute" protocol:
//! callers describe remote objects as [`ObjectRef`]s, stage [`Mutation`]s, and
//! ship everything in one [`QueryBatch`] per round trip. The transport and wire
//! format sit behind [`TaxonomyService`]; [`memory::InMemoryTaxonomy`] is an
//! in-process implementation for tests and local use.

pub mod memory;
pub mod service;
pub mod types;

pub use memory::InMemoryTaxonomy;
pub use service::TaxonomyService;
pub use types::{
    error_codes, LoadedObject, Mutation, ObjectRef, QueryBatch, QueryResponse, ServiceError,
};
