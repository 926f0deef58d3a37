//! Term store facade: the public operation set.
//!
//! Every operation is a direct composition of the [`ExecutionBridge`], the
//! [`TaxonomyCache`] and the [`tree`] algorithms; there is no extra business
//! logic here.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bridge::{ExecutionBridge, QueryResult};
use crate::cache::TaxonomyCache;
use crate::config::TermStoreConfig;
use crate::error::TermStoreResult;
use crate::protocol::{Mutation, ObjectRef, TaxonomyService};
use crate::tree::{self, walk, walk::TermNavigator};
use crate::types::{Label, PropertyValue, Term, TermGroup, TermId, TermSet, TermSetId};

/// Async facade over a remote term store.
///
/// Cheap to share behind an `Arc`; the cache is shared by every clone of that
/// `Arc` and lives as long as the store does unless injected explicitly.
pub struct TermStore {
    bridge: ExecutionBridge,
    cache: Arc<TaxonomyCache>,
}

impl TermStore {
    pub fn new(service: Arc<dyn TaxonomyService>, config: TermStoreConfig) -> Self {
        Self::with_cache(service, config, Arc::new(TaxonomyCache::new()))
    }

    pub fn with_cache(
        service: Arc<dyn TaxonomyService>,
        config: TermStoreConfig,
        cache: Arc<TaxonomyCache>,
    ) -> Self {
        Self {
            bridge: ExecutionBridge::new(service, config),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<TaxonomyCache> {
        &self.cache
    }

    pub fn bridge(&self) -> &ExecutionBridge {
        &self.bridge
    }

    // ─── Terms ──────────────────────────────────────────────────────────────

    pub async fn get_term_by_id(&self, id: &TermId) -> TermStoreResult<Term> {
        self.bridge
            .execute(|ctx| {
                let term = ctx.load(ObjectRef::term(id.clone()));
                move |r: &QueryResult| r.term(&term)
            })
            .await
    }

    /// Load several terms in one round trip, in request order.
    pub async fn get_terms(&self, ids: &[TermId]) -> TermStoreResult<Vec<Term>> {
        self.bridge
            .execute(|ctx| {
                let refs: Vec<ObjectRef> = ids
                    .iter()
                    .map(|id| ctx.load(ObjectRef::term(id.clone())))
                    .collect();
                move |r: &QueryResult| -> TermStoreResult<Vec<Term>> {
                    refs.iter().map(|term| r.term(term)).collect()
                }
            })
            .await
    }

    /// Bulk lookup; unknown ids are skipped by the service.
    pub async fn get_terms_by_ids(&self, ids: &[TermId]) -> TermStoreResult<Vec<Term>> {
        self.bridge
            .execute(|ctx| {
                let terms = ctx.load(ObjectRef::terms_by_id(ids.iter().cloned()));
                move |r: &QueryResult| r.terms(&terms)
            })
            .await
    }

    /// Direct children of a term.
    pub async fn get_terms_by_term_id(&self, id: &TermId) -> TermStoreResult<Vec<Term>> {
        self.bridge
            .execute(|ctx| {
                let children = ctx.load(ObjectRef::term(id.clone()).children());
                move |r: &QueryResult| r.terms(&children)
            })
            .await
    }

    /// Direct children of several terms in one round trip.
    pub async fn get_terms_by_term_ids(&self, ids: &[TermId]) -> TermStoreResult<Vec<Vec<Term>>> {
        self.bridge
            .execute(|ctx| {
                let refs: Vec<ObjectRef> = ids
                    .iter()
                    .map(|id| ctx.load(ObjectRef::term(id.clone()).children()))
                    .collect();
                move |r: &QueryResult| -> TermStoreResult<Vec<Vec<Term>>> {
                    refs.iter().map(|children| r.terms(children)).collect()
                }
            })
            .await
    }

    // ─── Term sets ──────────────────────────────────────────────────────────

    /// Top-level terms of a term set.
    pub async fn get_terms_by_term_set_id(&self, id: &TermSetId) -> TermStoreResult<Vec<Term>> {
        self.bridge
            .execute(|ctx| {
                let terms = ctx.load(ObjectRef::term_set(id.clone()).terms());
                move |r: &QueryResult| r.terms(&terms)
            })
            .await
    }

    /// Every term of a term set, at any depth.
    pub async fn get_all_terms_by_term_set_id(&self, id: &TermSetId) -> TermStoreResult<Vec<Term>> {
        self.bridge
            .execute(|ctx| {
                let terms = ctx.load(ObjectRef::term_set(id.clone()).all_terms());
                move |r: &QueryResult| r.terms(&terms)
            })
            .await
    }

    pub async fn get_term_set_by_term_id(&self, id: &TermId) -> TermStoreResult<TermSet> {
        self.bridge
            .execute(|ctx| {
                let set = ctx.load(ObjectRef::term(id.clone()).term_set_of());
                move |r: &QueryResult| r.term_set(&set)
            })
            .await
    }

    /// Term set a managed-metadata field is bound to, looked up on the configured web.
    pub async fn term_set_id_from_taxonomy_field(
        &self,
        field_internal_name: &str,
    ) -> TermStoreResult<TermSetId> {
        let web_url = self.bridge.config().web_url().to_string();
        self.bridge
            .execute_on(Some(&web_url), |ctx| {
                let field = ctx.load(ObjectRef::taxonomy_field(field_internal_name));
                move |r: &QueryResult| r.field(&field).map(|f| f.term_set_id)
            })
            .await
    }

    // ─── Labels ─────────────────────────────────────────────────────────────

    pub async fn get_term_labels(&self, term: &Term) -> TermStoreResult<Vec<Label>> {
        self.get_term_labels_by_id(&term.id).await
    }

    pub async fn get_term_labels_by_id(&self, id: &TermId) -> TermStoreResult<Vec<Label>> {
        self.bridge
            .execute(|ctx| {
                let labels = ctx.load(ObjectRef::term(id.clone()).labels());
                move |r: &QueryResult| r.labels(&labels)
            })
            .await
    }

    /// Labels of several terms in one round trip, one list per term.
    pub async fn get_labels_for_terms(&self, terms: &[Term]) -> TermStoreResult<Vec<Vec<Label>>> {
        self.bridge
            .execute(|ctx| {
                let refs: Vec<ObjectRef> = terms
                    .iter()
                    .map(|term| ctx.load(ObjectRef::term(term.id.clone()).labels()))
                    .collect();
                move |r: &QueryResult| -> TermStoreResult<Vec<Vec<Label>>> {
                    refs.iter().map(|labels| r.labels(labels)).collect()
                }
            })
            .await
    }

    // ─── Groups ─────────────────────────────────────────────────────────────

    /// The site collection's own term group, created on access when asked.
    pub async fn get_site_collection_term_group(
        &self,
        create_if_missing: bool,
    ) -> TermStoreResult<TermGroup> {
        let site_url = self.bridge.config().site_url.clone();
        self.bridge
            .execute_on(Some(&site_url), |ctx| {
                let group = ctx.load(ObjectRef::site_collection_group(create_if_missing));
                move |r: &QueryResult| r.group(&group)
            })
            .await
    }

    pub async fn get_all_term_sets_in_site_collection_group(
        &self,
        create_if_missing: bool,
    ) -> TermStoreResult<Vec<TermSet>> {
        let site_url = self.bridge.config().site_url.clone();
        self.bridge
            .execute_on(Some(&site_url), |ctx| {
                let sets = ctx.load(ObjectRef::site_collection_group(create_if_missing).term_sets());
                move |r: &QueryResult| r.term_sets(&sets)
            })
            .await
    }

    // ─── Parents and ancestors ──────────────────────────────────────────────

    pub async fn get_parent_term_by_id(&self, id: &TermId) -> TermStoreResult<Term> {
        self.bridge
            .execute(|ctx| {
                let parent = ctx.load(ObjectRef::term(id.clone()).parent());
                move |r: &QueryResult| r.term(&parent)
            })
            .await
    }

    pub async fn get_parent_term_by_term(&self, term: &Term) -> TermStoreResult<Term> {
        self.get_parent_term_by_id(&term.id).await
    }

    /// Every ancestor of a term, in term-set member order.
    ///
    /// Cached per term for the life of the cache; a repeat call costs no
    /// round trip. The first call also caches the owning term set's members.
    pub async fn get_term_parents(&self, id: &TermId) -> TermStoreResult<Vec<Term>> {
        if let Some(cached) = self.cache.ancestors_of(id) {
            return Ok(cached.as_ref().clone());
        }

        let (term, set, members) = self
            .bridge
            .execute(|ctx| {
                let term = ctx.load(ObjectRef::term(id.clone()));
                let set = ctx.load(term.clone().term_set_of());
                let all = ctx.load(set.clone().all_terms());
                move |r: &QueryResult| -> TermStoreResult<(Term, TermSet, Vec<Term>)> {
                    Ok((r.term(&term)?, r.term_set(&set)?, r.terms(&all)?))
                }
            })
            .await?;

        let members = self.cache.remember_members(&set, members);
        let ancestors = tree::resolve_ancestors(&term.path, &members);
        debug!(term = %id, ancestors = ancestors.len(), "resolved ancestors");
        Ok(self.cache.remember_ancestors(id.clone(), ancestors).as_ref().clone())
    }

    /// The term and every descendant, flattened, in term-set member order.
    ///
    /// Unknown ids inside a known term set yield an empty list.
    pub async fn get_terms_sub_tree_flat(&self, id: &TermId) -> TermStoreResult<Vec<Term>> {
        let mut ctx = self.bridge.open_session(None);

        let set = match self.cache.term_set_of(id) {
            Some(set) => set,
            None => {
                let set_ref = ctx.load(ObjectRef::term(id.clone()).term_set_of());
                let set = ctx.execute_query().await?.term_set(&set_ref)?;
                self.cache.remember_term_set(id.clone(), set)
            }
        };

        let members = match self.cache.members_of(&set.id) {
            Some(members) => members,
            None => {
                let all = ctx.load(ObjectRef::term_set(set.id.clone()).all_terms());
                let terms = ctx.run(move |r| r.terms(&all)).await?;
                self.cache.remember_members(&set, terms)
            }
        };

        Ok(tree::flatten_subtree(id, &members))
    }

    /// Root-most ancestor of a term; a top-level term is returned as-is.
    pub async fn get_top_level_parent_of_term(&self, id: &TermId) -> TermStoreResult<Term> {
        walk::top_level_ancestor(self, id).await
    }

    /// Nearest ancestor satisfying `predicate`, one round trip per level.
    ///
    /// A top-level term is returned as-is without consulting `predicate`.
    pub async fn get_parent_that_satisfies<F>(
        &self,
        id: &TermId,
        predicate: F,
    ) -> TermStoreResult<Option<Term>>
    where
        F: Fn(&Term) -> bool + Send + Sync,
    {
        walk::first_matching_ancestor(self, id, predicate).await
    }

    // ─── Writes ─────────────────────────────────────────────────────────────

    /// Create a child term under `parent`, write its custom properties, and
    /// commit, all in one round trip. Returns the term as committed.
    pub async fn create_term(
        &self,
        parent: &Term,
        name: &str,
        locale: u32,
        id: TermId,
        properties: &[PropertyValue],
    ) -> TermStoreResult<Term> {
        let created = self
            .bridge
            .execute(|ctx| {
                ctx.queue(Mutation::CreateChildTerm {
                    parent: parent.id.clone(),
                    name: name.to_string(),
                    locale,
                    id: id.clone(),
                });
                for property in properties {
                    ctx.queue(Mutation::SetCustomProperty {
                        term: id.clone(),
                        key: property.id.clone(),
                        value: property.label.clone(),
                    });
                }
                ctx.queue(Mutation::CommitAll);
                let term = ctx.load(ObjectRef::term(id.clone()));
                move |r: &QueryResult| r.term(&term)
            })
            .await?;
        info!(term = %created.id, parent = %parent.id, path = %created.path, "created term");
        Ok(created)
    }
}

#[async_trait]
impl TermNavigator for TermStore {
    async fn term(&self, id: &TermId) -> TermStoreResult<Term> {
        self.get_term_by_id(id).await
    }

    async fn parent_of(&self, term: &Term) -> TermStoreResult<Term> {
        self.get_parent_term_by_term(term).await
    }

    async fn ancestor_of(&self, term: &Term, hops: usize) -> TermStoreResult<Term> {
        self.bridge
            .execute(|ctx| {
                let ancestor = ctx.load(ObjectRef::term(term.id.clone()).ancestor(hops));
                move |r: &QueryResult| r.term(&ancestor)
            })
            .await
    }
}
