//! Process-lifetime memoization of term-set membership and ancestor lists.
//!
//! Entries are write-once: the first value stored under a key wins and is
//! handed back to every later writer, so racing fetches of the same key are
//! wasted work but never change what callers observe. There is no eviction
//! and no invalidation; scope a cache to a session whose taxonomy is not
//! expected to change and drop it afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::types::{Term, TermId, TermSet, TermSetId};

/// Hit/miss counters across every lookup kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
pub struct TaxonomyCache {
    term_sets_by_term: DashMap<TermId, TermSet>,
    terms_by_term_set: DashMap<TermSetId, Arc<Vec<Term>>>,
    parents_by_term: DashMap<TermId, Arc<Vec<Term>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TaxonomyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record<T>(&self, kind: &'static str, key: &str, found: Option<T>) -> Option<T> {
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(kind, key, "cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(kind, key, "cache miss");
        }
        found
    }

    /// Owning term set of a term, if known.
    pub fn term_set_of(&self, term: &TermId) -> Option<TermSet> {
        let found = self.term_sets_by_term.get(term).map(|e| e.value().clone());
        self.record("term_set", term.as_str(), found)
    }

    pub fn remember_term_set(&self, term: TermId, set: TermSet) -> TermSet {
        self.term_sets_by_term.entry(term).or_insert(set).value().clone()
    }

    /// Every term of a term set, at any depth, if known.
    pub fn members_of(&self, set: &TermSetId) -> Option<Arc<Vec<Term>>> {
        let found = self.terms_by_term_set.get(set).map(|e| Arc::clone(e.value()));
        self.record("members", set.as_str(), found)
    }

    /// Store a term set's members and associate each member with the set.
    ///
    /// When the set is already cached the stored members are returned and
    /// `terms` is discarded.
    pub fn remember_members(&self, set: &TermSet, terms: Vec<Term>) -> Arc<Vec<Term>> {
        let members = match self.terms_by_term_set.entry(set.id.clone()) {
            Entry::Occupied(existing) => return Arc::clone(existing.get()),
            Entry::Vacant(slot) => Arc::clone(slot.insert(Arc::new(terms)).value()),
        };
        for term in members.iter() {
            self.term_sets_by_term
                .entry(term.id.clone())
                .or_insert_with(|| set.clone());
        }
        debug!(term_set = %set.id, members = members.len(), "cached term set members");
        members
    }

    /// Resolved ancestors of a term, if known.
    pub fn ancestors_of(&self, term: &TermId) -> Option<Arc<Vec<Term>>> {
        let found = self.parents_by_term.get(term).map(|e| Arc::clone(e.value()));
        self.record("ancestors", term.as_str(), found)
    }

    pub fn remember_ancestors(&self, term: TermId, ancestors: Vec<Term>) -> Arc<Vec<Term>> {
        Arc::clone(
            self.parents_by_term
                .entry(term)
                .or_insert_with(|| Arc::new(ancestors))
                .value(),
        )
    }

    pub fn cached_term_sets(&self) -> usize {
        self.terms_by_term_set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::fixtures::members;
    use crate::types::GroupId;

    fn set(id: &str) -> TermSet {
        TermSet {
            id: TermSetId::new(id),
            name: id.to_uppercase(),
            group_id: GroupId::new("g"),
        }
    }

    #[test]
    fn lookups_count_hits_and_misses() {
        let cache = TaxonomyCache::new();
        assert!(cache.term_set_of(&TermId::new("A")).is_none());
        cache.remember_term_set(TermId::new("A"), set("s1"));
        assert_eq!(cache.term_set_of(&TermId::new("A")), Some(set("s1")));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn first_writer_wins() {
        let cache = TaxonomyCache::new();
        cache.remember_term_set(TermId::new("A"), set("s1"));
        let stored = cache.remember_term_set(TermId::new("A"), set("s2"));
        assert_eq!(stored, set("s1"));

        let first = cache.remember_ancestors(TermId::new("C"), members(&["A"]));
        let second = cache.remember_ancestors(TermId::new("C"), members(&["A", "A;B"]));
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn remembering_members_associates_every_member() {
        let cache = TaxonomyCache::new();
        let s1 = set("s1");
        let stored = cache.remember_members(&s1, members(&["A", "A;B", "A;B;C"]));
        assert_eq!(stored.len(), 3);
        assert_eq!(cache.cached_term_sets(), 1);
        for id in ["A", "B", "C"] {
            assert_eq!(cache.term_set_of(&TermId::new(id)), Some(s1.clone()));
        }
    }

    #[test]
    fn remembering_members_twice_keeps_original() {
        let cache = TaxonomyCache::new();
        let s1 = set("s1");
        cache.remember_members(&s1, members(&["A"]));
        let again = cache.remember_members(&s1, members(&["A", "A;B"]));
        assert_eq!(again.len(), 1);
        assert!(cache.term_set_of(&TermId::new("B")).is_none());
    }

    #[test]
    fn member_association_does_not_overwrite() {
        let cache = TaxonomyCache::new();
        cache.remember_term_set(TermId::new("A"), set("s0"));
        cache.remember_members(&set("s1"), members(&["A"]));
        assert_eq!(cache.term_set_of(&TermId::new("A")), Some(set("s0")));
    }

    #[test]
    fn concurrent_population_is_consistent() {
        let cache = Arc::new(TaxonomyCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.remember_members(&set("s1"), members(&["A", "A;B"])))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
