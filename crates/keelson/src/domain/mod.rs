//! Domain types for the hierarchical task tracker.
//!
//! This module contains the core entity types (Project, Feature, Task,
//! Section, Template, Dependency) and the value types shared across them
//! (status, priority, tags, entity type).

mod dependency;
mod feature;
mod project;
mod section;
mod tag;
mod task;
mod template;

pub use dependency::{Dependency, DependencyType, NewDependency};
pub use feature::{Feature, FeatureFilter, FeatureUpdate, NewFeature};
pub use project::{NewProject, Project, ProjectFilter, ProjectUpdate};
pub use section::{
    ContentFormat, NewSection, Section, SectionFilter, SectionUpdate,
};
pub use tag::{TagSortOrder, TagUsage};
pub use task::{NewTask, Task, TaskFilter, TaskUpdate};
pub use template::{NewSectionPrototype, NewTemplate, SectionPrototype, Template};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The kind of entity a [`Section`] is attached to or a template targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// A top-level project.
    Project,
    /// A feature, optionally owned by a project.
    Feature,
    /// A task, optionally owned by a feature and/or project.
    Task,
    /// A template (owns its own prototype sections).
    Template,
}

/// Priority level shared by features and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Highest priority.
    High,
    /// Default priority.
    Medium,
    /// Lowest priority.
    Low,
}

impl Priority {
    /// Lowercase form used when rendering into Markdown front matter.
    #[must_use]
    pub fn as_lowercase(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A status value, e.g. `"backlog"`, `"in-development"`, `"completed"`.
///
/// Status vocabularies are defined by the workflow configuration rather than
/// fixed at compile time (see the status workflow engine), so this is a thin
/// validated string wrapper rather than a closed enum. Equality is exact
/// (flow configs are expected to use one canonical spelling per status).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    /// Construct a status from a kebab-case identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the status as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A case-preserving, case-insensitively-matching set of tags.
///
/// Insertion keeps the casing of the first occurrence of a given tag and
/// silently discards subsequent case-variant duplicates, matching the data
/// model's "case-preserving but case-insensitive matching" requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    /// An empty tag set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a tag set from an iterator, deduplicating case-insensitively.
    pub fn from_iter_dedup(iter: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }

    /// Insert a tag, preserving the first-seen casing for duplicates.
    pub fn insert(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.contains(&tag) {
            self.0.push(tag);
        }
    }

    /// Case-insensitive membership test.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// True if every tag in `required` is present (AND semantics), matching
    /// case-insensitively.
    #[must_use]
    pub fn contains_all(&self, required: &[String]) -> bool {
        required.iter().all(|t| self.contains(t))
    }

    /// Iterate over the tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct (case-insensitively) tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the set has no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rename every tag matching `from` (case-insensitively) to `to`,
    /// returning true if a rename occurred.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for t in &mut self.0 {
            if t.eq_ignore_ascii_case(from) {
                *t = to.to_string();
                changed = true;
            }
        }
        changed
    }

    /// Distinct case-insensitive keys, for building tag usage reports.
    #[must_use]
    pub fn canonical_keys(&self) -> BTreeSet<String> {
        self.0.iter().map(|t| t.to_lowercase()).collect()
    }
}

impl FromIterator<String> for Tags {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::from_iter_dedup(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_dedup_case_insensitively_keeping_first_casing() {
        let tags = Tags::from_iter_dedup(
            ["Backend", "backend", "BACKEND", "frontend"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["Backend", "frontend"]);
    }

    #[test]
    fn tags_contains_is_case_insensitive() {
        let tags = Tags::from_iter_dedup(["Backend".to_string()]);
        assert!(tags.contains("backend"));
        assert!(tags.contains("BACKEND"));
    }

    #[test]
    fn tags_contains_all_requires_every_tag() {
        let tags = Tags::from_iter_dedup(["a".to_string(), "b".to_string()]);
        assert!(tags.contains_all(&["a".to_string(), "B".to_string()]));
        assert!(!tags.contains_all(&["a".to_string(), "c".to_string()]));
    }

    #[test]
    fn tags_rename_is_atomic_across_matches() {
        let mut tags =
            Tags::from_iter_dedup(["bug".to_string(), "other".to_string()]);
        assert!(tags.rename("bug", "defect"));
        assert!(tags.contains("defect"));
        assert!(!tags.contains("bug"));
    }

    #[test]
    fn priority_lowercase_rendering() {
        assert_eq!(Priority::High.as_lowercase(), "high");
        assert_eq!(Priority::Medium.as_lowercase(), "medium");
        assert_eq!(Priority::Low.as_lowercase(), "low");
    }
}
