//! Ancestor walks that follow parent links on the remote service.
//!
//! Unlike the pure path algorithms in the parent module, every hop here can
//! cost a round trip, so the walks are written against [`TermNavigator`].

use async_trait::async_trait;

use crate::error::TermStoreResult;
use crate::types::{Term, TermId};

/// Remote navigation primitives the walks are built on.
#[async_trait]
pub trait TermNavigator: Send + Sync {
    /// Load a term by id.
    async fn term(&self, id: &TermId) -> TermStoreResult<Term>;

    /// Load the immediate parent of `term` (one round trip).
    async fn parent_of(&self, term: &Term) -> TermStoreResult<Term>;

    /// Follow the parent link `hops` times and load the result in one round trip.
    async fn ancestor_of(&self, term: &Term, hops: usize) -> TermStoreResult<Term>;
}

/// The root-most ancestor of a term.
///
/// A single-segment term is returned as-is without touching its parent link.
pub async fn top_level_ancestor<N>(nav: &N, id: &TermId) -> TermStoreResult<Term>
where
    N: TermNavigator + ?Sized,
{
    let term = nav.term(id).await?;
    let hops = term.path.depth().saturating_sub(1);
    if hops == 0 {
        return Ok(term);
    }
    nav.ancestor_of(&term, hops).await
}

/// The nearest ancestor satisfying `predicate`, hopping one level per round trip.
///
/// A top-level term is returned as-is and the predicate is never evaluated
/// for it. Returns `None` once every ancestor has been rejected.
pub async fn first_matching_ancestor<N, F>(
    nav: &N,
    id: &TermId,
    predicate: F,
) -> TermStoreResult<Option<Term>>
where
    N: TermNavigator + ?Sized,
    F: Fn(&Term) -> bool + Send + Sync,
{
    let term = nav.term(id).await?;
    let hops = term.path.depth().saturating_sub(1);
    if hops == 0 {
        return Ok(Some(term));
    }

    let mut current = term;
    for _ in 0..hops {
        current = nav.parent_of(&current).await?;
        if predicate(&current) {
            return Ok(Some(current));
        }
    }
    Ok(None)
}
