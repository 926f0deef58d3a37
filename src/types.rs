use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::TermPath;

// ─── Identifiers ────────────────────────────────────────────────────────────

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// A fresh random (UUID v4) identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id.to_string())
            }
        }
    };
}

id_type!(
    /// Opaque identifier of a term.
    TermId
);
id_type!(
    /// Opaque identifier of a term set.
    TermSetId
);
id_type!(
    /// Opaque identifier of a term group.
    GroupId
);

// ─── Taxonomy Entities ──────────────────────────────────────────────────────

/// A node in the taxonomy hierarchy.
///
/// The parent is not a field; it is navigated lazily through
/// [`crate::protocol::ObjectRef::parent`] and costs a round trip to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub name: String,
    pub path: TermPath,
    pub term_set_id: TermSetId,
    #[serde(default)]
    pub custom_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Term {
    pub fn custom_property(&self, key: &str) -> Option<&str> {
        self.custom_properties.get(key).map(String::as_str)
    }

    /// True when the term sits directly under its term set.
    pub fn is_top_level(&self) -> bool {
        self.path.depth() <= 1
    }
}

/// A collection of terms forming one tree, owned by a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSet {
    pub id: TermSetId,
    pub name: String,
    pub group_id: GroupId,
}

/// A container of term sets, optionally scoped to a site collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_collection: Option<String>,
}

/// A localized label attached to a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Locale identifier (LCID, e.g. 1033 for en-US).
    pub locale: u32,
    pub value: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Label {
    pub fn new(locale: u32, value: impl Into<String>, is_default: bool) -> Self {
        Self {
            locale,
            value: value.into(),
            is_default,
        }
    }
}

/// A managed-metadata column definition bound to a term set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyField {
    pub internal_name: String,
    pub title: String,
    pub term_set_id: TermSetId,
}

/// A custom property written onto a newly created term (`id = label`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub id: String,
    pub label: String,
}

impl PropertyValue {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}
