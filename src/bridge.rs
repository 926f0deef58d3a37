//! Execution bridge: turns the declare/execute protocol into plain async calls.
//!
//! A [`ClientContext`] is one session against a site. Callers declare the
//! objects they need with [`ClientContext::load`], stage writes with
//! [`ClientContext::queue`], and then either:
//!
//! - [`ClientContext::run`]: one round trip, then a selector picks the result
//!   out of the [`QueryResult`] and the session is consumed, or
//! - [`ClientContext::execute_query`]: one round trip that leaves the session
//!   open, for lookups whose results decide what to declare next.
//!
//! Nothing is ever flushed implicitly: declarations only travel when one of
//! those two is awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::TermStoreConfig;
use crate::error::{TermStoreError, TermStoreResult};
use crate::protocol::{LoadedObject, Mutation, ObjectRef, QueryBatch, TaxonomyService};
use crate::types::{Label, TaxonomyField, Term, TermGroup, TermSet};

/// Opens sessions against the taxonomy service.
#[derive(Clone)]
pub struct ExecutionBridge {
    service: Arc<dyn TaxonomyService>,
    config: TermStoreConfig,
}

impl ExecutionBridge {
    pub fn new(service: Arc<dyn TaxonomyService>, config: TermStoreConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &TermStoreConfig {
        &self.config
    }

    /// A fresh session bound to `site_url`, or to the configured site.
    pub fn open_session(&self, site_url: Option<&str>) -> ClientContext {
        let site_url = site_url.unwrap_or(&self.config.site_url).to_string();
        ClientContext {
            service: Arc::clone(&self.service),
            pending: QueryBatch::new(site_url.clone()),
            site_url,
            timeout: self.config.round_trip_timeout(),
        }
    }

    /// Declare on a fresh session, run one round trip, and resolve the selection.
    ///
    /// `declare` runs synchronously before anything is sent and returns the
    /// selector that designates the result.
    pub async fn execute<T, D, S>(&self, declare: D) -> TermStoreResult<T>
    where
        D: FnOnce(&mut ClientContext) -> S,
        S: FnOnce(&QueryResult) -> TermStoreResult<T>,
    {
        self.execute_on(None, declare).await
    }

    /// [`execute`](Self::execute) against an explicit site.
    pub async fn execute_on<T, D, S>(&self, site_url: Option<&str>, declare: D) -> TermStoreResult<T>
    where
        D: FnOnce(&mut ClientContext) -> S,
        S: FnOnce(&QueryResult) -> TermStoreResult<T>,
    {
        let mut ctx = self.open_session(site_url);
        let select = declare(&mut ctx);
        ctx.run(select).await
    }
}

/// One session: pending declarations plus the round-trip primitive.
pub struct ClientContext {
    service: Arc<dyn TaxonomyService>,
    site_url: String,
    timeout: Option<Duration>,
    pending: QueryBatch,
}

impl ClientContext {
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Declare interest in `object` for the next round trip.
    ///
    /// Returns the reference so it can be used to pick the object out of the
    /// [`QueryResult`]. Declaring the same object twice is harmless.
    pub fn load(&mut self, object: ObjectRef) -> ObjectRef {
        self.pending.load(object.clone());
        object
    }

    /// Stage a write for the next round trip.
    pub fn queue(&mut self, mutation: Mutation) {
        self.pending.mutate(mutation);
    }

    pub fn pending(&self) -> &QueryBatch {
        &self.pending
    }

    /// Ship every pending declaration in exactly one round trip.
    ///
    /// The session stays usable afterwards with an empty pending batch. On
    /// failure nothing is resolved and the service's error is returned as-is.
    pub async fn execute_query(&mut self) -> TermStoreResult<QueryResult> {
        let batch = std::mem::replace(&mut self.pending, QueryBatch::new(self.site_url.clone()));
        let loads = batch.loads.len();
        let mutations = batch.mutations.len();
        debug!(site = %self.site_url, loads, mutations, "executing round trip");

        let started = Instant::now();
        let exchange = self.service.execute_query(batch);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    warn!(site = %self.site_url, elapsed_ms, "round trip timed out");
                    return Err(TermStoreError::Timeout { elapsed_ms });
                }
            },
            None => exchange.await,
        };

        match outcome {
            Ok(response) => {
                debug!(
                    site = %self.site_url,
                    objects = response.objects.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "round trip completed"
                );
                Ok(QueryResult {
                    objects: response.objects,
                })
            }
            Err(err) => {
                warn!(site = %self.site_url, code = err.code, message = %err.message, "round trip failed");
                Err(TermStoreError::Remote(err))
            }
        }
    }

    /// One round trip, then hand the result to `select`. Consumes the session.
    pub async fn run<T, S>(mut self, select: S) -> TermStoreResult<T>
    where
        S: FnOnce(&QueryResult) -> TermStoreResult<T>,
    {
        let result = self.execute_query().await?;
        select(&result)
    }
}

/// Objects materialized by one round trip, keyed by their declaration.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    objects: HashMap<ObjectRef, LoadedObject>,
}

impl QueryResult {
    pub fn get(&self, object: &ObjectRef) -> TermStoreResult<&LoadedObject> {
        self.objects
            .get(object)
            .ok_or_else(|| TermStoreError::NotLoaded {
                object: object.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn pick<'a, T, F>(&'a self, object: &ObjectRef, expected: &'static str, pick: F) -> TermStoreResult<T>
    where
        T: Clone + 'a,
        F: FnOnce(&'a LoadedObject) -> Option<&'a T>,
    {
        pick(self.get(object)?)
            .cloned()
            .ok_or_else(|| TermStoreError::UnexpectedObject {
                object: object.to_string(),
                expected,
            })
    }

    pub fn term(&self, object: &ObjectRef) -> TermStoreResult<Term> {
        self.pick(object, "term", |o| match o {
            LoadedObject::Term(t) => Some(t),
            _ => None,
        })
    }

    pub fn terms(&self, object: &ObjectRef) -> TermStoreResult<Vec<Term>> {
        self.pick(object, "term collection", |o| match o {
            LoadedObject::Terms(t) => Some(t),
            _ => None,
        })
    }

    pub fn term_set(&self, object: &ObjectRef) -> TermStoreResult<TermSet> {
        self.pick(object, "term set", |o| match o {
            LoadedObject::TermSet(s) => Some(s),
            _ => None,
        })
    }

    pub fn term_sets(&self, object: &ObjectRef) -> TermStoreResult<Vec<TermSet>> {
        self.pick(object, "term set collection", |o| match o {
            LoadedObject::TermSets(s) => Some(s),
            _ => None,
        })
    }

    pub fn group(&self, object: &ObjectRef) -> TermStoreResult<TermGroup> {
        self.pick(object, "term group", |o| match o {
            LoadedObject::Group(g) => Some(g),
            _ => None,
        })
    }

    pub fn labels(&self, object: &ObjectRef) -> TermStoreResult<Vec<Label>> {
        self.pick(object, "label collection", |o| match o {
            LoadedObject::Labels(l) => Some(l),
            _ => None,
        })
    }

    pub fn field(&self, object: &ObjectRef) -> TermStoreResult<TaxonomyField> {
        self.pick(object, "taxonomy field", |o| match o {
            LoadedObject::Field(f) => Some(f),
            _ => None,
        })
    }
}
