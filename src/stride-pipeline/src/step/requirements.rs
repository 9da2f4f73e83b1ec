//! Executor capabilities required by steps.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A capability the executor must maintain for elements flowing through a
/// step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Requirement {
    /// The traversed object itself.
    Object,
    /// Bulk counting of equivalent traversers.
    Bulk,
    /// A side-effect store.
    SideEffects,
    /// Full path history.
    Path,
    /// A sack value per traverser.
    Sack,
    /// Path history restricted to labeled steps.
    LabeledPath,
    /// A single loop counter.
    SingleLoop,
    /// Nested loop counters.
    NestedLoop,
}

/// An ordered set of [`Requirement`]s.
///
/// Ordered so that aggregation, display, and the serialized form are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSet(BTreeSet<Requirement>);

impl RequirementSet {
    /// Create an empty requirement set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set from the given requirements.
    pub fn of<I: IntoIterator<Item = Requirement>>(requirements: I) -> Self {
        Self(requirements.into_iter().collect())
    }

    /// Insert a requirement.
    pub fn insert(&mut self, requirement: Requirement) {
        self.0.insert(requirement);
    }

    /// Check membership.
    pub fn contains(&self, requirement: Requirement) -> bool {
        self.0.contains(&requirement)
    }

    /// Union another set into this one.
    pub fn extend(&mut self, other: &Self) {
        self.0.extend(other.0.iter().copied());
    }

    /// Union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.extend(other);
        merged
    }

    /// Check whether `self` is a subset of `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Iterate requirements in order.
    pub fn iter(&self) -> impl Iterator<Item = Requirement> + '_ {
        self.0.iter().copied()
    }

    /// Number of requirements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Requirement> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for RequirementSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r:?}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_and_subset() {
        let a = RequirementSet::of([Requirement::Object]);
        let b = RequirementSet::of([Requirement::Object, Requirement::Bulk]);

        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert_eq!(a.union(&b), b);
    }

    #[test]
    fn test_deterministic_order() {
        let set = RequirementSet::of([
            Requirement::SideEffects,
            Requirement::Object,
            Requirement::Bulk,
        ]);
        let collected: Vec<_> = set.iter().collect();
        assert_eq!(
            collected,
            vec![
                Requirement::Object,
                Requirement::Bulk,
                Requirement::SideEffects
            ]
        );
    }
}
