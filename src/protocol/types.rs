//! Object references, mutations and batches exchanged with the term store service.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Label, TaxonomyField, Term, TermGroup, TermId, TermSet, TermSetId};

/// A lazily-described remote object.
///
/// Building or navigating a reference never talks to the service; the object
/// only materializes once it is declared on a session and a round trip runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectRef {
    Term { id: TermId },
    TermSet { id: TermSetId },
    TermsById { ids: Vec<TermId> },
    SiteCollectionGroup { create_if_missing: bool },
    TaxonomyField { internal_name: String },
    /// Parent term of a term.
    Parent { of: Box<ObjectRef> },
    /// Owning term set of a term.
    TermSetOf { of: Box<ObjectRef> },
    /// Direct child terms of a term.
    Children { of: Box<ObjectRef> },
    Labels { of: Box<ObjectRef> },
    /// Top-level terms of a term set.
    Terms { of: Box<ObjectRef> },
    /// Every term of a term set, at any depth.
    AllTerms { of: Box<ObjectRef> },
    /// Term sets of a group.
    TermSets { of: Box<ObjectRef> },
}

impl ObjectRef {
    pub fn term(id: impl Into<TermId>) -> Self {
        ObjectRef::Term { id: id.into() }
    }

    pub fn term_set(id: impl Into<TermSetId>) -> Self {
        ObjectRef::TermSet { id: id.into() }
    }

    pub fn terms_by_id(ids: impl IntoIterator<Item = TermId>) -> Self {
        ObjectRef::TermsById {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn site_collection_group(create_if_missing: bool) -> Self {
        ObjectRef::SiteCollectionGroup { create_if_missing }
    }

    pub fn taxonomy_field(internal_name: impl Into<String>) -> Self {
        ObjectRef::TaxonomyField {
            internal_name: internal_name.into(),
        }
    }

    pub fn parent(self) -> Self {
        ObjectRef::Parent { of: Box::new(self) }
    }

    /// Follow the parent link `hops` times.
    pub fn ancestor(self, hops: usize) -> Self {
        (0..hops).fold(self, |obj, _| obj.parent())
    }

    pub fn term_set_of(self) -> Self {
        ObjectRef::TermSetOf { of: Box::new(self) }
    }

    pub fn children(self) -> Self {
        ObjectRef::Children { of: Box::new(self) }
    }

    pub fn labels(self) -> Self {
        ObjectRef::Labels { of: Box::new(self) }
    }

    pub fn terms(self) -> Self {
        ObjectRef::Terms { of: Box::new(self) }
    }

    pub fn all_terms(self) -> Self {
        ObjectRef::AllTerms { of: Box::new(self) }
    }

    pub fn term_sets(self) -> Self {
        ObjectRef::TermSets { of: Box::new(self) }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Term { id } => write!(f, "term({id})"),
            ObjectRef::TermSet { id } => write!(f, "term_set({id})"),
            ObjectRef::TermsById { ids } => write!(f, "terms_by_id[{}]", ids.len()),
            ObjectRef::SiteCollectionGroup { create_if_missing } => {
                write!(f, "site_collection_group(create={create_if_missing})")
            }
            ObjectRef::TaxonomyField { internal_name } => write!(f, "field({internal_name})"),
            ObjectRef::Parent { of } => write!(f, "{of}.parent"),
            ObjectRef::TermSetOf { of } => write!(f, "{of}.term_set"),
            ObjectRef::Children { of } => write!(f, "{of}.children"),
            ObjectRef::Labels { of } => write!(f, "{of}.labels"),
            ObjectRef::Terms { of } => write!(f, "{of}.terms"),
            ObjectRef::AllTerms { of } => write!(f, "{of}.all_terms"),
            ObjectRef::TermSets { of } => write!(f, "{of}.term_sets"),
        }
    }
}

/// A materialized object returned by a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LoadedObject {
    Term(Term),
    Terms(Vec<Term>),
    TermSet(TermSet),
    TermSets(Vec<TermSet>),
    Group(TermGroup),
    Labels(Vec<Label>),
    Field(TaxonomyField),
}

impl LoadedObject {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadedObject::Term(_) => "term",
            LoadedObject::Terms(_) => "term collection",
            LoadedObject::TermSet(_) => "term set",
            LoadedObject::TermSets(_) => "term set collection",
            LoadedObject::Group(_) => "term group",
            LoadedObject::Labels(_) => "label collection",
            LoadedObject::Field(_) => "taxonomy field",
        }
    }
}

/// A write staged on a session, applied by the next round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateChildTerm {
        parent: TermId,
        name: String,
        locale: u32,
        id: TermId,
    },
    SetCustomProperty {
        term: TermId,
        key: String,
        value: String,
    },
    /// Persist every staged change of the batch.
    CommitAll,
}

/// Everything one round trip carries: declared loads and staged mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBatch {
    pub site_url: String,
    pub loads: Vec<ObjectRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mutations: Vec<Mutation>,
}

impl QueryBatch {
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            loads: Vec::new(),
            mutations: Vec::new(),
        }
    }

    /// Declare an object; declaring the same object twice is a no-op.
    pub fn load(&mut self, object: ObjectRef) {
        if !self.loads.contains(&object) {
            self.loads.push(object);
        }
    }

    pub fn mutate(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty() && self.mutations.is_empty()
    }

    /// True when the batch ends up persisting its mutations.
    pub fn commits(&self) -> bool {
        self.mutations.contains(&Mutation::CommitAll)
    }
}

/// Objects materialized by one successful round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub objects: HashMap<ObjectRef, LoadedObject>,
}

impl QueryResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: ObjectRef, loaded: LoadedObject) {
        self.objects.insert(object, loaded);
    }
}

/// Failure payload reported by the service for a whole round trip.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ServiceError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ServiceError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            correlation_id: None,
        }
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(error_codes::NOT_FOUND, format!("Object not found: {what}"))
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_OPERATION, message)
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Well-known service error codes.
pub mod error_codes {
    pub const INVALID_OPERATION: i32 = 400;
    pub const ACCESS_DENIED: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const INTERNAL_ERROR: i32 = 500;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn navigation_builds_nested_refs() {
        let obj = ObjectRef::term("t1").parent().labels();
        assert_eq!(obj.to_string(), "term(t1).parent.labels");
        assert_eq!(
            ObjectRef::term("t1").ancestor(2),
            ObjectRef::term("t1").parent().parent()
        );
        assert_eq!(ObjectRef::term("t1").ancestor(0), ObjectRef::term("t1"));
    }

    #[test]
    fn batch_load_is_idempotent() {
        let mut batch = QueryBatch::new("https://contoso.example/sites/hr");
        batch.load(ObjectRef::term("a"));
        batch.load(ObjectRef::term("a"));
        batch.load(ObjectRef::term("b"));
        assert_eq!(batch.loads.len(), 2);
        assert!(!batch.commits());
        batch.mutate(Mutation::CommitAll);
        assert!(batch.commits());
    }

    #[test]
    fn empty_batch() {
        let batch = QueryBatch::new("https://contoso.example");
        assert!(batch.is_empty());
    }

    #[test]
    fn object_ref_serializes_tagged() {
        let obj = ObjectRef::term_set("s1").all_terms();
        let value = serde_json::to_value(&obj).unwrap();
        assert_eq!(
            value,
            json!({"kind": "all_terms", "of": {"kind": "term_set", "id": "s1"}})
        );
        let back: ObjectRef = serde_json::from_value(value).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn mutation_serializes_tagged() {
        let m = Mutation::SetCustomProperty {
            term: TermId::new("t"),
            key: "hex".into(),
            value: "#FF0000".into(),
        };
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["op"], "set_custom_property");
        assert_eq!(value["value"], "#FF0000");
    }

    #[test]
    fn service_error_display() {
        let err = ServiceError::not_found(ObjectRef::term("x"));
        assert_eq!(err.code, error_codes::NOT_FOUND);
        assert_eq!(err.to_string(), "Object not found: term(x) (code 404)");
    }
}
