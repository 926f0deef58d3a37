//! The round-trip primitive of the remote term store.

use async_trait::async_trait;

use super::types::{QueryBatch, QueryResponse, ServiceError};

/// A remote taxonomy service reachable through batched round trips.
///
/// One call to [`execute_query`](TaxonomyService::execute_query) is one
/// network exchange. Mutations in the batch are applied before its loads are
/// resolved, and the batch is all-or-nothing: on failure no declared object is
/// resolved and no staged mutation is persisted.
#[async_trait]
pub trait TaxonomyService: Send + Sync {
    async fn execute_query(&self, batch: QueryBatch) -> Result<QueryResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety check
    #[test]
    fn service_is_object_safe() {
        fn _assert_object_safe(_: &dyn TaxonomyService) {}
    }
}
