//! In-memory term store for testing and local use.
//!
//! Mirrors the service's semantics closely enough to exercise the client:
//! paths are derived from parent links, every call counts as one round trip,
//! mutations are applied to a staged copy that only replaces the live data when
//! the batch commits, and failures can be injected per round trip.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::tree::TermPath;
use crate::types::{GroupId, Label, TaxonomyField, Term, TermGroup, TermId, TermSet, TermSetId};

use super::service::TaxonomyService;
use super::types::{LoadedObject, Mutation, ObjectRef, QueryBatch, QueryResponse, ServiceError};

/// Locale used for labels created without an explicit one (en-US).
pub const DEFAULT_LOCALE: u32 = 1033;

#[derive(Debug, Clone)]
struct TermRecord {
    id: TermId,
    name: String,
    term_set_id: TermSetId,
    parent: Option<TermId>,
    labels: Vec<Label>,
    custom_properties: BTreeMap<String, String>,
    is_deprecated: bool,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct TaxonomyData {
    groups: Vec<TermGroup>,
    term_sets: Vec<TermSet>,
    terms: Vec<TermRecord>,
    fields: Vec<TaxonomyField>,
}

impl TaxonomyData {
    fn record(&self, id: &TermId) -> Result<&TermRecord, ServiceError> {
        self.terms
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| ServiceError::not_found(ObjectRef::term(id.clone())))
    }

    fn record_mut(&mut self, id: &TermId) -> Result<&mut TermRecord, ServiceError> {
        self.terms
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| ServiceError::not_found(ObjectRef::term(id.clone())))
    }

    fn term_set(&self, id: &TermSetId) -> Result<&TermSet, ServiceError> {
        self.term_sets
            .iter()
            .find(|s| &s.id == id)
            .ok_or_else(|| ServiceError::not_found(ObjectRef::term_set(id.clone())))
    }

    fn path_of(&self, record: &TermRecord) -> TermPath {
        let mut segments = vec![record.id.to_string()];
        let mut parent = record.parent.clone();
        while let Some(id) = parent {
            // Guards against a corrupted parent cycle.
            if segments.len() > self.terms.len() {
                break;
            }
            segments.push(id.to_string());
            parent = self
                .terms
                .iter()
                .find(|t| t.id == id)
                .and_then(|t| t.parent.clone());
        }
        segments.reverse();
        TermPath::from_segments(segments)
    }

    fn to_term(&self, record: &TermRecord) -> Term {
        Term {
            id: record.id.clone(),
            name: record.name.clone(),
            path: self.path_of(record),
            term_set_id: record.term_set_id.clone(),
            custom_properties: record.custom_properties.clone(),
            is_deprecated: record.is_deprecated,
            last_modified: Some(record.last_modified),
        }
    }

    fn terms_where(&self, keep: impl Fn(&TermRecord) -> bool) -> Vec<Term> {
        self.terms
            .iter()
            .filter(|t| keep(t))
            .map(|t| self.to_term(t))
            .collect()
    }

    fn term_id(&self, object: &ObjectRef) -> Result<TermId, ServiceError> {
        match object {
            ObjectRef::Term { id } => {
                self.record(id)?;
                Ok(id.clone())
            }
            ObjectRef::Parent { of } => {
                let child = self.term_id(of)?;
                self.record(&child)?.parent.clone().ok_or_else(|| {
                    ServiceError::invalid_operation(format!("Term {child} has no parent term"))
                })
            }
            other => Err(ServiceError::invalid_operation(format!(
                "{other} does not designate a term"
            ))),
        }
    }

    fn term_set_id(&self, object: &ObjectRef) -> Result<TermSetId, ServiceError> {
        match object {
            ObjectRef::TermSet { id } => Ok(self.term_set(id)?.id.clone()),
            ObjectRef::TermSetOf { of } => {
                let term = self.term_id(of)?;
                Ok(self.record(&term)?.term_set_id.clone())
            }
            other => Err(ServiceError::invalid_operation(format!(
                "{other} does not designate a term set"
            ))),
        }
    }

    fn group_id(
        &mut self,
        object: &ObjectRef,
        site_url: &str,
        created: &mut Vec<TermGroup>,
    ) -> Result<GroupId, ServiceError> {
        let ObjectRef::SiteCollectionGroup { create_if_missing } = object else {
            return Err(ServiceError::invalid_operation(format!(
                "{object} does not designate a term group"
            )));
        };
        if let Some(group) = self
            .groups
            .iter()
            .find(|g| g.site_collection.as_deref() == Some(site_url))
        {
            return Ok(group.id.clone());
        }
        if !create_if_missing {
            return Err(ServiceError::not_found(format!(
                "site collection group for {site_url}"
            )));
        }
        let group = TermGroup {
            id: GroupId::generate(),
            name: site_collection_group_name(site_url),
            site_collection: Some(site_url.to_string()),
        };
        self.groups.push(group.clone());
        created.push(group.clone());
        Ok(group.id)
    }

    fn resolve(
        &mut self,
        object: &ObjectRef,
        site_url: &str,
        created: &mut Vec<TermGroup>,
    ) -> Result<LoadedObject, ServiceError> {
        let loaded = match object {
            ObjectRef::Term { .. } | ObjectRef::Parent { .. } => {
                let id = self.term_id(object)?;
                LoadedObject::Term(self.to_term(self.record(&id)?))
            }
            ObjectRef::TermSet { .. } | ObjectRef::TermSetOf { .. } => {
                let id = self.term_set_id(object)?;
                LoadedObject::TermSet(self.term_set(&id)?.clone())
            }
            ObjectRef::TermsById { ids } => LoadedObject::Terms(
                ids.iter()
                    .filter_map(|id| self.terms.iter().find(|t| &t.id == id))
                    .map(|t| self.to_term(t))
                    .collect(),
            ),
            ObjectRef::SiteCollectionGroup { .. } => {
                let id = self.group_id(object, site_url, created)?;
                let group = self
                    .groups
                    .iter()
                    .find(|g| g.id == id)
                    .cloned()
                    .ok_or_else(|| ServiceError::not_found(object))?;
                LoadedObject::Group(group)
            }
            ObjectRef::TaxonomyField { internal_name } => {
                let field = self
                    .fields
                    .iter()
                    .find(|f| &f.internal_name == internal_name || &f.title == internal_name)
                    .cloned()
                    .ok_or_else(|| ServiceError::not_found(object))?;
                LoadedObject::Field(field)
            }
            ObjectRef::Children { of } => {
                let id = self.term_id(of)?;
                LoadedObject::Terms(self.terms_where(|t| t.parent.as_ref() == Some(&id)))
            }
            ObjectRef::Labels { of } => {
                let id = self.term_id(of)?;
                LoadedObject::Labels(self.record(&id)?.labels.clone())
            }
            ObjectRef::Terms { of } => {
                let set = self.term_set_id(of)?;
                LoadedObject::Terms(
                    self.terms_where(|t| t.term_set_id == set && t.parent.is_none()),
                )
            }
            ObjectRef::AllTerms { of } => {
                let set = self.term_set_id(of)?;
                LoadedObject::Terms(self.terms_where(|t| t.term_set_id == set))
            }
            ObjectRef::TermSets { of } => {
                let group = self.group_id(of, site_url, created)?;
                LoadedObject::TermSets(
                    self.term_sets
                        .iter()
                        .filter(|s| s.group_id == group)
                        .cloned()
                        .collect(),
                )
            }
        };
        Ok(loaded)
    }

    fn insert_term(
        &mut self,
        set: &TermSetId,
        parent: Option<&TermId>,
        id: TermId,
        name: &str,
        locale: u32,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.term_set(set)?;
        if let Some(parent) = parent {
            let parent_set = &self.record(parent)?.term_set_id;
            if parent_set != set {
                return Err(ServiceError::invalid_operation(format!(
                    "Parent term {parent} belongs to term set {parent_set}, not {set}"
                )));
            }
        }
        if self.terms.iter().any(|t| t.id == id) {
            return Err(ServiceError::new(
                super::types::error_codes::CONFLICT,
                format!("A term with id {id} already exists"),
            ));
        }
        self.terms.push(TermRecord {
            id,
            name: name.to_string(),
            term_set_id: set.clone(),
            parent: parent.cloned(),
            labels: vec![Label::new(locale, name, true)],
            custom_properties: BTreeMap::new(),
            is_deprecated: false,
            last_modified: now,
        });
        Ok(())
    }

    fn apply(&mut self, mutation: &Mutation, now: DateTime<Utc>) -> Result<(), ServiceError> {
        match mutation {
            Mutation::CreateChildTerm {
                parent,
                name,
                locale,
                id,
            } => {
                let set = self.record(parent)?.term_set_id.clone();
                self.insert_term(&set, Some(parent), id.clone(), name, *locale, now)
            }
            Mutation::SetCustomProperty { term, key, value } => {
                let record = self.record_mut(term)?;
                record.custom_properties.insert(key.clone(), value.clone());
                record.last_modified = now;
                Ok(())
            }
            Mutation::CommitAll => Ok(()),
        }
    }
}

fn site_collection_group_name(site_url: &str) -> String {
    let host_and_path = site_url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("Site Collection - {}", host_and_path.replace('/', "-"))
}

/// An in-process [`TaxonomyService`].
///
/// Thread-safe via `RwLock`; each `execute_query` call resolves its whole batch
/// under one write lock, so concurrent round trips are serialized.
pub struct InMemoryTaxonomy {
    data: RwLock<TaxonomyData>,
    round_trips: AtomicUsize,
    executed: Mutex<Vec<QueryBatch>>,
    failures: Mutex<VecDeque<ServiceError>>,
    latency: Option<Duration>,
}

impl InMemoryTaxonomy {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(TaxonomyData::default()),
            round_trips: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            latency: None,
        }
    }

    /// Delay every round trip by `latency` before it is resolved.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn add_group(
        &self,
        id: impl Into<GroupId>,
        name: impl Into<String>,
        site_collection: Option<&str>,
    ) -> GroupId {
        let group = TermGroup {
            id: id.into(),
            name: name.into(),
            site_collection: site_collection.map(str::to_string),
        };
        let id = group.id.clone();
        self.write().groups.push(group);
        id
    }

    pub fn add_term_set(
        &self,
        id: impl Into<TermSetId>,
        group: &GroupId,
        name: impl Into<String>,
    ) -> TermSetId {
        let set = TermSet {
            id: id.into(),
            name: name.into(),
            group_id: group.clone(),
        };
        let id = set.id.clone();
        self.write().term_sets.push(set);
        id
    }

    /// Add a term under `parent`, or at the top of `set` when `parent` is `None`.
    pub fn add_term(
        &self,
        set: &TermSetId,
        parent: Option<&TermId>,
        id: impl Into<TermId>,
        name: &str,
    ) -> Result<TermId, ServiceError> {
        let id = id.into();
        self.write()
            .insert_term(set, parent, id.clone(), name, DEFAULT_LOCALE, Utc::now())?;
        Ok(id)
    }

    /// Attach a label; a new default label demotes the previous default of its locale.
    pub fn add_label(&self, term: &TermId, label: Label) -> Result<(), ServiceError> {
        let mut data = self.write();
        let record = data.record_mut(term)?;
        if label.is_default {
            for existing in record
                .labels
                .iter_mut()
                .filter(|l| l.locale == label.locale)
            {
                existing.is_default = false;
            }
        }
        record.labels.push(label);
        Ok(())
    }

    pub fn set_custom_property(
        &self,
        term: &TermId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ServiceError> {
        let mut data = self.write();
        data.record_mut(term)?
            .custom_properties
            .insert(key.into(), value.into());
        Ok(())
    }

    pub fn deprecate_term(&self, term: &TermId) -> Result<(), ServiceError> {
        self.write().record_mut(term)?.is_deprecated = true;
        Ok(())
    }

    pub fn add_field(&self, field: TaxonomyField) {
        self.write().fields.push(field);
    }

    /// Make the next round trip fail with `error`. Queued failures fire in order.
    pub fn fail_next(&self, error: ServiceError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(error);
    }

    /// Number of round trips served so far, failed ones included.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn executed_batches(&self) -> Vec<QueryBatch> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn term_count(&self) -> usize {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .terms
            .len()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, TaxonomyData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn serve(&self, batch: &QueryBatch) -> Result<QueryResponse, ServiceError> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());

        let injected = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(err) = injected {
            return Err(err);
        }

        let mut data = self.write();
        let mut staged = data.clone();
        let mut created = Vec::new();
        let now = Utc::now();

        for mutation in &batch.mutations {
            staged.apply(mutation, now)?;
        }

        let mut response = QueryResponse::new();
        for object in &batch.loads {
            let loaded = staged.resolve(object, &batch.site_url, &mut created)?;
            response.insert(object.clone(), loaded);
        }

        if batch.commits() {
            *data = staged;
        } else {
            // Groups created on access persist even without a commit.
            data.groups.extend(created);
        }
        Ok(response)
    }
}

impl Default for InMemoryTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaxonomyService for InMemoryTaxonomy {
    async fn execute_query(&self, batch: QueryBatch) -> Result<QueryResponse, ServiceError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.serve(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::error_codes;

    const SITE: &str = "https://contoso.example/sites/hr";

    fn seeded() -> InMemoryTaxonomy {
        let service = InMemoryTaxonomy::new();
        let group = service.add_group("g1", "People", Some(SITE));
        let set = service.add_term_set("s1", &group, "Departments");
        let a = service.add_term(&set, None, "A", "Engineering").unwrap();
        let b = service.add_term(&set, Some(&a), "B", "Platform").unwrap();
        service.add_term(&set, Some(&b), "C", "Storage").unwrap();
        service.add_term(&set, Some(&a), "D", "Design").unwrap();
        service
    }

    fn batch(loads: Vec<ObjectRef>) -> QueryBatch {
        let mut batch = QueryBatch::new(SITE);
        for load in loads {
            batch.load(load);
        }
        batch
    }

    #[tokio::test]
    async fn resolves_term_with_derived_path() {
        let service = seeded();
        let resp = service
            .execute_query(batch(vec![ObjectRef::term("C")]))
            .await
            .unwrap();
        let LoadedObject::Term(term) = &resp.objects[&ObjectRef::term("C")] else {
            panic!("expected a term");
        };
        assert_eq!(term.path.as_str(), "A;B;C");
        assert_eq!(term.name, "Storage");
        assert_eq!(service.round_trips(), 1);
    }

    #[tokio::test]
    async fn resolves_collections() {
        let service = seeded();
        let children = ObjectRef::term("A").children();
        let top = ObjectRef::term_set("s1").terms();
        let all = ObjectRef::term_set("s1").all_terms();
        let resp = service
            .execute_query(batch(vec![children.clone(), top.clone(), all.clone()]))
            .await
            .unwrap();

        let count = |obj: &ObjectRef| match &resp.objects[obj] {
            LoadedObject::Terms(terms) => terms.len(),
            other => panic!("unexpected {}", other.kind()),
        };
        assert_eq!(count(&children), 2);
        assert_eq!(count(&top), 1);
        assert_eq!(count(&all), 4);
        assert_eq!(service.round_trips(), 1);
    }

    #[tokio::test]
    async fn ancestor_chain_resolves_in_one_batch() {
        let service = seeded();
        let obj = ObjectRef::term("C").ancestor(2);
        let resp = service.execute_query(batch(vec![obj.clone()])).await.unwrap();
        assert!(matches!(&resp.objects[&obj], LoadedObject::Term(t) if t.id == TermId::new("A")));
    }

    #[tokio::test]
    async fn parent_of_top_level_term_fails() {
        let service = seeded();
        let err = service
            .execute_query(batch(vec![ObjectRef::term("A").parent()]))
            .await
            .unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_OPERATION);
    }

    #[tokio::test]
    async fn unknown_term_fails_whole_batch() {
        let service = seeded();
        let err = service
            .execute_query(batch(vec![ObjectRef::term("A"), ObjectRef::term("missing")]))
            .await
            .unwrap_err();
        assert_eq!(err.code, error_codes::NOT_FOUND);
    }

    #[tokio::test]
    async fn site_group_created_only_when_asked() {
        let service = InMemoryTaxonomy::new();
        let group = ObjectRef::site_collection_group(false);
        assert!(service.execute_query(batch(vec![group])).await.is_err());

        let group = ObjectRef::site_collection_group(true);
        let resp = service
            .execute_query(batch(vec![group.clone()]))
            .await
            .unwrap();
        let LoadedObject::Group(created) = &resp.objects[&group] else {
            panic!("expected a group");
        };
        assert_eq!(created.name, "Site Collection - contoso.example-sites-hr");

        // Persisted without a commit.
        let again = ObjectRef::site_collection_group(false);
        let resp = service
            .execute_query(batch(vec![again.clone()]))
            .await
            .unwrap();
        assert!(matches!(&resp.objects[&again], LoadedObject::Group(g) if g.id == created.id));
    }

    #[tokio::test]
    async fn mutations_persist_only_on_commit() {
        let service = seeded();
        let mut uncommitted = QueryBatch::new(SITE);
        uncommitted.mutate(Mutation::CreateChildTerm {
            parent: TermId::new("A"),
            name: "Research".into(),
            locale: DEFAULT_LOCALE,
            id: TermId::new("R"),
        });
        uncommitted.load(ObjectRef::term("R"));
        service.execute_query(uncommitted.clone()).await.unwrap();
        assert_eq!(service.term_count(), 4);

        uncommitted.mutate(Mutation::CommitAll);
        service.execute_query(uncommitted).await.unwrap();
        assert_eq!(service.term_count(), 5);
    }

    #[tokio::test]
    async fn failed_mutation_rolls_back_batch() {
        let service = seeded();
        let mut b = QueryBatch::new(SITE);
        b.mutate(Mutation::CreateChildTerm {
            parent: TermId::new("A"),
            name: "Dup".into(),
            locale: DEFAULT_LOCALE,
            id: TermId::new("B"),
        });
        b.mutate(Mutation::CommitAll);
        let err = service.execute_query(b).await.unwrap_err();
        assert_eq!(err.code, error_codes::CONFLICT);
        assert_eq!(service.term_count(), 4);
    }

    #[tokio::test]
    async fn injected_failure_is_returned_once() {
        let service = seeded();
        service.fail_next(ServiceError::new(error_codes::ACCESS_DENIED, "Access denied"));
        let err = service
            .execute_query(batch(vec![ObjectRef::term("A")]))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Access denied");
        assert!(service
            .execute_query(batch(vec![ObjectRef::term("A")]))
            .await
            .is_ok());
        assert_eq!(service.round_trips(), 2);
        assert_eq!(service.executed_batches().len(), 2);
    }

    #[test]
    fn new_default_label_demotes_previous() {
        let service = seeded();
        let a = TermId::new("A");
        service.add_label(&a, Label::new(1033, "Eng", true)).unwrap();
        let data = service.data.read().unwrap();
        let labels = &data.record(&a).unwrap().labels;
        assert_eq!(labels.iter().filter(|l| l.is_default).count(), 1);
        assert!(labels.iter().any(|l| l.value == "Eng" && l.is_default));
    }

    #[test]
    fn add_term_rejects_cross_set_parent() {
        let service = seeded();
        let other = service.add_term_set("s2", &GroupId::new("g1"), "Locations");
        let err = service
            .add_term(&other, Some(&TermId::new("A")), "X", "Oslo")
            .unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_OPERATION);
    }
}
