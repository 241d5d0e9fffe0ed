//! Tag reconciliation.
//!
//! A [`TagSet`] is a multi-valued mapping from tag name to a set of values.
//! Merging is the core combinator: later sources may *add* values to a name
//! but never remove earlier ones, so the five tag sources of
//! [`resolver::TagResolver`] can be folded in precedence order without any
//! source overriding another.
//!
//! # Invariants
//!
//! - A tag name with no explicit value maps to a set containing the empty
//!   string, never an absent entry: presence of the key signals "tag exists
//!   with no value".
//! - Values are lower-cased and deduplicated at insertion. Names are
//!   case-sensitive and kept verbatim.
//! - Merge is a per-name set union, hence idempotent and commutative within a
//!   name.

mod grammar;
mod resolver;

pub use resolver::TagResolver;

pub(crate) use grammar::{parse_colon_item, parse_var_list, split_csv, split_lines};

use std::collections::{BTreeMap, BTreeSet};

/// Deduplicated multi-valued tag mapping.
///
/// Backed by ordered maps so rendering to the transport's flat tag list is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a `name:value` pair. The value is lower-cased before
    /// insertion; duplicates are absorbed by the value set.
    pub fn insert(&mut self, name: impl Into<String>, value: &str) {
        self.entries
            .entry(name.into())
            .or_default()
            .insert(value.to_lowercase());
    }

    /// Inserts a bare tag name, recorded as the empty-string value.
    pub fn insert_bare(&mut self, name: impl Into<String>) {
        self.insert(name, "");
    }

    /// Unions `other` into `self`, name by name.
    pub fn merge(&mut self, other: TagSet) {
        for (name, values) in other.entries {
            self.entries.entry(name).or_default().extend(values);
        }
    }

    /// Returns the value set for `name`, if the tag is present.
    #[must_use]
    pub fn values(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(name)
    }

    /// Whether the tag `name` is present (with or without values).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of distinct tag names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no tags at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the set as the transport's flat tag list: `name:value` for
    /// valued entries, the bare `name` for empty-string values. Order is
    /// deterministic (names, then values, lexicographically).
    #[must_use]
    pub fn render(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (name, values) in &self.entries {
            for value in values {
                if value.is_empty() {
                    out.push(name.clone());
                } else {
                    out.push(format!("{name}:{value}"));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_lowercases_values() {
        let mut tags = TagSet::new();
        tags.insert("team", "PLATFORM");
        assert!(tags.values("team").unwrap().contains("platform"));
    }

    #[test]
    fn names_stay_case_sensitive() {
        let mut tags = TagSet::new();
        tags.insert("Team", "a");
        tags.insert("team", "a");
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn bare_name_maps_to_empty_string_value() {
        let mut tags = TagSet::new();
        tags.insert_bare("canary");
        let values = tags.values("canary").unwrap();
        assert_eq!(values.len(), 1);
        assert!(values.contains(""));
        assert_eq!(tags.render(), vec!["canary".to_string()]);
    }

    #[test]
    fn merge_unions_values_per_name() {
        let mut a = TagSet::new();
        a.insert("env", "prod");
        let mut b = TagSet::new();
        b.insert("env", "staging");
        b.insert("team", "ci");
        a.merge(b);
        assert_eq!(a.values("env").unwrap().len(), 2);
        assert!(a.contains("team"));
    }

    #[test]
    fn merge_never_removes_earlier_values() {
        let mut a = TagSet::new();
        a.insert("env", "prod");
        a.merge(TagSet::new());
        assert!(a.values("env").unwrap().contains("prod"));
    }

    #[test]
    fn render_is_deterministic() {
        let mut tags = TagSet::new();
        tags.insert("b", "2");
        tags.insert("a", "1");
        tags.insert("a", "0");
        assert_eq!(tags.render(), vec!["a:0", "a:1", "b:2"]);
    }

    fn arb_tagset() -> impl Strategy<Value = TagSet> {
        proptest::collection::vec(("[a-z]{1,6}", "[a-z0-9]{0,6}"), 0..12).prop_map(|pairs| {
            let mut tags = TagSet::new();
            for (name, value) in pairs {
                tags.insert(name, &value);
            }
            tags
        })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(tags in arb_tagset()) {
            let mut merged = tags.clone();
            merged.merge(tags.clone());
            prop_assert_eq!(merged, tags);
        }

        #[test]
        fn merge_only_adds(a in arb_tagset(), b in arb_tagset()) {
            let mut merged = a.clone();
            merged.merge(b);
            for (name, values) in &a.entries {
                let after = merged.values(name).unwrap();
                prop_assert!(values.is_subset(after));
            }
        }
    }
}
