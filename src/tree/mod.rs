//! Path-based tree algorithms over a flat list of terms.
//!
//! The remote service exposes a term's position as a delimited path string of
//! identifiers, root first and the term itself last. Ancestor and descendant
//! relations are derived from that path rather than from an explicit graph:
//!
//! ```text
//! "A;B;C"  ──ancestor_paths──▶  ["A", "A;B"]
//! ```
//!
//! [`walk`] holds the algorithms that need to hop parent links remotely.

pub mod walk;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Term, TermId};

/// Separator between path segments.
pub const PATH_DELIMITER: char = ';';

/// A term's position in its tree: ordered identifier segments, root to self.
///
/// The raw string is kept so that subtree matching can use the same literal
/// prefix comparison the service's path strings imply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TermPath {
    raw: String,
    segments: Vec<String>,
}

impl TermPath {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let segments = raw.split(PATH_DELIMITER).map(str::to_string).collect();
        Self { raw, segments }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let raw = segments.join(&PATH_DELIMITER.to_string());
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments, the term itself included.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The last segment, i.e. the term's own identifier.
    pub fn leaf(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Paths of every proper ancestor, root-most first.
    ///
    /// A path of N segments yields N−1 paths; the self segment is excluded.
    pub fn ancestor_paths(&self) -> Vec<TermPath> {
        (1..self.segments.len())
            .map(|len| TermPath::from_segments(self.segments[..len].iter().cloned()))
            .collect()
    }

    pub fn parent(&self) -> Option<TermPath> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(TermPath::from_segments(
            self.segments[..self.segments.len() - 1].iter().cloned(),
        ))
    }

    /// Segment-wise ancestry: `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &TermPath) -> bool {
        self.segments.len() < other.segments.len()
            && other.segments.starts_with(&self.segments)
    }

    /// Literal string prefix test used for subtree membership.
    pub fn starts_with(&self, prefix: &TermPath) -> bool {
        self.raw.starts_with(&prefix.raw)
    }
}

impl fmt::Display for TermPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for TermPath {
    fn from(raw: String) -> Self {
        TermPath::parse(raw)
    }
}

impl From<&str> for TermPath {
    fn from(raw: &str) -> Self {
        TermPath::parse(raw)
    }
}

impl From<TermPath> for String {
    fn from(path: TermPath) -> Self {
        path.raw
    }
}

/// Members whose path equals one of `path`'s ancestor paths.
///
/// Filter order follows `members`; the result is not sorted by depth.
pub fn resolve_ancestors(path: &TermPath, members: &[Term]) -> Vec<Term> {
    let wanted: HashSet<String> = path
        .ancestor_paths()
        .into_iter()
        .map(String::from)
        .collect();
    members
        .iter()
        .filter(|term| wanted.contains(term.path.as_str()))
        .cloned()
        .collect()
}

/// Every member whose path has the target term's path as a literal prefix.
///
/// Includes the target itself. Returns an empty list when `term_id` is not
/// among `members`.
pub fn flatten_subtree(term_id: &TermId, members: &[Term]) -> Vec<Term> {
    let Some(root) = members.iter().find(|term| &term.id == term_id) else {
        return Vec::new();
    };
    members
        .iter()
        .filter(|term| term.path.starts_with(&root.path))
        .cloned()
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::{members, term};
    use super::*;

    fn paths(terms: &[Term]) -> Vec<&str> {
        terms.iter().map(|t| t.path.as_str()).collect()
    }

    #[test]
    fn ancestor_paths_of_three_segments() {
        let path = TermPath::parse("A;B;C");
        let ancestors: Vec<String> = path.ancestor_paths().into_iter().map(String::from).collect();
        assert_eq!(ancestors, vec!["A", "A;B"]);
    }

    #[test]
    fn ancestor_paths_are_proper_prefixes_root_first() {
        let path = TermPath::parse("r;s;t;u;v");
        let ancestors = path.ancestor_paths();
        assert_eq!(ancestors.len(), path.depth() - 1);
        for (i, ancestor) in ancestors.iter().enumerate() {
            assert_eq!(ancestor.depth(), i + 1);
            assert!(ancestor.is_ancestor_of(&path));
            assert!(path.as_str().starts_with(ancestor.as_str()));
            assert_ne!(ancestor.as_str(), path.as_str());
        }
    }

    #[test]
    fn single_segment_has_no_ancestors() {
        let path = TermPath::parse("A");
        assert!(path.ancestor_paths().is_empty());
        assert!(path.parent().is_none());
        assert_eq!(path.leaf(), Some("A"));
    }

    #[test]
    fn parent_drops_last_segment() {
        let path = TermPath::parse("A;B;C");
        assert_eq!(path.parent(), Some(TermPath::parse("A;B")));
    }

    #[test]
    fn serializes_as_raw_string() {
        let path = TermPath::from_segments(["a", "b"]);
        assert_eq!(serde_json::to_string(&path).unwrap(), "\"a;b\"");
        let back: TermPath = serde_json::from_str("\"a;b\"").unwrap();
        assert_eq!(back.segments(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn resolve_ancestors_keeps_member_order() {
        let all = members(&["A;B", "A;D", "A", "A;B;C"]);
        let target = TermPath::parse("A;B;C");
        let found = resolve_ancestors(&target, &all);
        assert_eq!(paths(&found), vec!["A;B", "A"]);
    }

    #[test]
    fn resolve_ancestors_ignores_siblings_and_self() {
        let all = members(&["A", "A;B", "A;B;C", "A;D", "A;B;E"]);
        let found = resolve_ancestors(&TermPath::parse("A;B;C"), &all);
        let mut got = paths(&found);
        got.sort();
        assert_eq!(got, vec!["A", "A;B"]);
    }

    #[test]
    fn flatten_subtree_matches_prefix() {
        let all = members(&["A", "A;B", "A;B;C", "A;D"]);
        let sub = flatten_subtree(&TermId::new("B"), &all);
        assert_eq!(paths(&sub), vec!["A;B", "A;B;C"]);
    }

    #[test]
    fn flatten_subtree_includes_self_and_is_subset() {
        let all = members(&["A", "A;B", "A;B;C", "A;D", "A;D;F"]);
        for t in &all {
            let sub = flatten_subtree(&t.id, &all);
            assert!(sub.contains(t));
            assert!(sub.iter().all(|s| all.contains(s)));
        }
    }

    #[test]
    fn flatten_subtree_unknown_id_is_empty() {
        let all = members(&["A", "A;B"]);
        assert!(flatten_subtree(&TermId::new("Z"), &all).is_empty());
    }

    #[test]
    fn flatten_subtree_uses_literal_prefix() {
        // "A;B" is a literal prefix of "A;BX" even though BX is a sibling.
        let all = vec![term("A;B"), term("A;BX")];
        let sub = flatten_subtree(&TermId::new("B"), &all);
        assert_eq!(paths(&sub), vec!["A;B", "A;BX"]);
    }
}
