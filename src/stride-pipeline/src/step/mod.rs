//! Step catalog for traversal pipelines.
//!
//! A [`Step`] is one stage of a pipeline: a tagged [`StepKind`] with its
//! arguments, user labels, nested child pipelines, and the executor
//! capabilities it requires. Kinds carry their semantic attributes
//! (barrier, filter, side effects, selectivity) so rewrite rules never
//! special-case on names.

mod requirements;

pub use requirements::{Requirement, RequirementSet};

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use stride_core::{Predicate, Value};

use crate::pipeline::Pipeline;

/// Reserved `has` key addressing the element identity rather than a
/// property.
pub const KEY_ID: &str = "~id";

/// Stable identifier of a step, unique within its pipeline tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StepId(pub u64);

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Generate a new unique step ID.
fn fresh_step_id() -> StepId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    StepId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Key/predicate constraint carried by `has`-family steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasContainer {
    /// Property key, or [`KEY_ID`] for the element identity.
    pub key: String,
    /// Predicate over the keyed value.
    pub predicate: Predicate,
}

impl HasContainer {
    /// Constrain a property key.
    pub fn new(key: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            key: key.into(),
            predicate,
        }
    }

    /// Constrain the element identity.
    pub fn id(predicate: Predicate) -> Self {
        Self::new(KEY_ID, predicate)
    }

    /// Check whether this container constrains the element identity.
    pub fn is_id_constraint(&self) -> bool {
        self.key == KEY_ID
    }
}

impl std::fmt::Display for HasContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.key, self.predicate)
    }
}

/// Discriminant of a [`StepKind`], used for structural queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepTag {
    /// `VertexSource`
    VertexSource,
    /// `EdgeSource`
    EdgeSource,
    /// `Out`
    Out,
    /// `In`
    In,
    /// `Both`
    Both,
    /// `OutEdges`
    OutEdges,
    /// `InEdges`
    InEdges,
    /// `Has`
    Has,
    /// `HasTraversal`
    HasTraversal,
    /// `Count`
    Count,
    /// `Is`
    Is,
    /// `Range`
    Range,
    /// `Identity`
    Identity,
    /// `Filter`
    Filter,
    /// `GroupCount`
    GroupCount,
    /// `Fold`
    Fold,
    /// `Order`
    Order,
    /// `Profile`
    Profile,
    /// `ProfileProbe`
    ProfileProbe,
    /// `SideEffect`
    SideEffect,
    /// `Select`
    Select,
}

/// Tagged variant of a pipeline step with its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
    /// Source of vertices; a non-empty id list makes it a direct lookup.
    VertexSource {
        /// Identities to look up directly; empty means full scan.
        ids: Vec<Value>,
    },
    /// Source of edges.
    EdgeSource,
    /// Adjacent vertices over outgoing edges.
    Out {
        /// Edge labels to follow; empty means all.
        edge_labels: Vec<String>,
    },
    /// Adjacent vertices over incoming edges.
    In {
        /// Edge labels to follow; empty means all.
        edge_labels: Vec<String>,
    },
    /// Adjacent vertices over edges in both directions.
    Both {
        /// Edge labels to follow; empty means all.
        edge_labels: Vec<String>,
    },
    /// Outgoing incident edges.
    OutEdges {
        /// Edge labels to follow; empty means all.
        edge_labels: Vec<String>,
    },
    /// Incoming incident edges.
    InEdges {
        /// Edge labels to follow; empty means all.
        edge_labels: Vec<String>,
    },
    /// Keep elements whose keyed value satisfies the predicate.
    Has(HasContainer),
    /// Keep elements for which the child pipeline yields a result.
    HasTraversal {
        /// Invert the match.
        negate: bool,
    },
    /// Reduce the stream to its element count.
    Count,
    /// Keep values satisfying the predicate.
    Is(Predicate),
    /// Keep the elements at positions `low..high`; `-1` means unbounded.
    Range {
        /// Inclusive start position.
        low: i64,
        /// Exclusive end position, or `-1` for unbounded.
        high: i64,
    },
    /// Pass elements through unchanged.
    Identity,
    /// Generic pure filter with a declared selectivity hint.
    Filter {
        /// Diagnostic name of the filter.
        name: String,
        /// Expected fraction of elements kept, in `[0, 1]`.
        selectivity: f64,
    },
    /// Count occurrences per element into a side-effect store.
    GroupCount {
        /// Side-effect key the counts are stored under.
        side_effect_key: Option<String>,
    },
    /// Materialize the stream into a single list.
    Fold,
    /// Order the full stream.
    Order,
    /// Enable per-step profiling for the pipeline.
    Profile,
    /// Internal measurement point inserted by profile injection.
    ProfileProbe,
    /// Invoke an executor-side effect per element.
    SideEffect {
        /// Diagnostic name of the side effect.
        name: String,
    },
    /// Emit previously labeled values.
    Select {
        /// Labels to resolve.
        labels: Vec<String>,
    },
}

impl StepKind {
    /// Sentinel meaning "unbounded" in a `Range` step.
    pub const UNBOUNDED: i64 = -1;

    /// Get the discriminant tag.
    pub const fn tag(&self) -> StepTag {
        match self {
            Self::VertexSource { .. } => StepTag::VertexSource,
            Self::EdgeSource => StepTag::EdgeSource,
            Self::Out { .. } => StepTag::Out,
            Self::In { .. } => StepTag::In,
            Self::Both { .. } => StepTag::Both,
            Self::OutEdges { .. } => StepTag::OutEdges,
            Self::InEdges { .. } => StepTag::InEdges,
            Self::Has(_) => StepTag::Has,
            Self::HasTraversal { .. } => StepTag::HasTraversal,
            Self::Count => StepTag::Count,
            Self::Is(_) => StepTag::Is,
            Self::Range { .. } => StepTag::Range,
            Self::Identity => StepTag::Identity,
            Self::Filter { .. } => StepTag::Filter,
            Self::GroupCount { .. } => StepTag::GroupCount,
            Self::Fold => StepTag::Fold,
            Self::Order => StepTag::Order,
            Self::Profile => StepTag::Profile,
            Self::ProfileProbe => StepTag::ProfileProbe,
            Self::SideEffect { .. } => StepTag::SideEffect,
            Self::Select { .. } => StepTag::Select,
        }
    }

    /// Get the step kind name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::VertexSource { .. } => "VertexSource",
            Self::EdgeSource => "EdgeSource",
            Self::Out { .. } => "Out",
            Self::In { .. } => "In",
            Self::Both { .. } => "Both",
            Self::OutEdges { .. } => "OutEdges",
            Self::InEdges { .. } => "InEdges",
            Self::Has(_) => "Has",
            Self::HasTraversal { .. } => "HasTraversal",
            Self::Count => "Count",
            Self::Is(_) => "Is",
            Self::Range { .. } => "Range",
            Self::Identity => "Identity",
            Self::Filter { .. } => "Filter",
            Self::GroupCount { .. } => "GroupCount",
            Self::Fold => "Fold",
            Self::Order => "Order",
            Self::Profile => "Profile",
            Self::ProfileProbe => "ProfileProbe",
            Self::SideEffect { .. } => "SideEffect",
            Self::Select { .. } => "Select",
        }
    }

    /// Check if this kind starts a pipeline.
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::VertexSource { .. } | Self::EdgeSource)
    }

    /// Check if this kind materializes all upstream elements before
    /// emitting any downstream.
    pub const fn is_barrier(&self) -> bool {
        matches!(
            self,
            Self::Count | Self::Fold | Self::Order | Self::GroupCount { .. }
        )
    }

    /// Check if this kind only drops elements from the stream.
    pub const fn is_filter(&self) -> bool {
        matches!(
            self,
            Self::Has(_)
                | Self::HasTraversal { .. }
                | Self::Is(_)
                | Self::Range { .. }
                | Self::Filter { .. }
        )
    }

    /// Check if this kind writes to a side-effect store.
    pub const fn has_side_effects(&self) -> bool {
        matches!(self, Self::GroupCount { .. } | Self::SideEffect { .. })
    }

    /// Check if this kind is a filter with no side effects of its own.
    ///
    /// Nested children and labels are attributes of the [`Step`], not the
    /// kind; callers reordering filters must check those separately.
    pub const fn is_pure_filter(&self) -> bool {
        self.is_filter() && !self.has_side_effects()
    }

    /// Declared selectivity hint, for filter kinds only.
    pub fn selectivity_hint(&self) -> Option<f64> {
        match self {
            Self::Has(_) => Some(0.25),
            Self::Range { .. } => Some(0.4),
            Self::Is(_) => Some(0.5),
            Self::HasTraversal { .. } => Some(0.75),
            Self::Filter { selectivity, .. } => Some(*selectivity),
            _ => None,
        }
    }

    /// Labels this kind resolves from earlier steps.
    pub fn consumed_labels(&self) -> &[String] {
        match self {
            Self::Select { labels } => labels.as_slice(),
            _ => &[],
        }
    }

    /// Executor capabilities required by this kind alone.
    pub fn requirements(&self) -> RequirementSet {
        let mut set = RequirementSet::of([Requirement::Object]);
        if self.is_barrier() || matches!(self, Self::ProfileProbe) {
            set.insert(Requirement::Bulk);
        }
        if self.has_side_effects() {
            set.insert(Requirement::SideEffects);
        }
        if matches!(self, Self::Select { .. }) {
            set.insert(Requirement::LabeledPath);
        }
        set
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VertexSource { ids } if !ids.is_empty() => {
                write!(f, "VertexSource({})", Value::List(ids.clone()))
            }
            Self::Out { edge_labels }
            | Self::In { edge_labels }
            | Self::Both { edge_labels }
            | Self::OutEdges { edge_labels }
            | Self::InEdges { edge_labels }
                if !edge_labels.is_empty() =>
            {
                write!(f, "{}({})", self.name(), edge_labels.join(", "))
            }
            Self::Has(container) => write!(f, "Has({container})"),
            Self::HasTraversal { negate: true } => write!(f, "HasTraversal(not)"),
            Self::Is(predicate) => write!(f, "Is({predicate})"),
            Self::Range { low, high } => write!(f, "Range({low}, {high})"),
            Self::Filter { name, selectivity } => write!(f, "Filter({name}, {selectivity})"),
            Self::GroupCount {
                side_effect_key: Some(key),
            } => write!(f, "GroupCount({key})"),
            Self::SideEffect { name } => write!(f, "SideEffect({name})"),
            Self::Select { labels } => write!(f, "Select({})", labels.join(", ")),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// One stage of a pipeline.
///
/// Owns its nested child pipelines; identity is stable across edits of the
/// surrounding pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    id: StepId,
    kind: StepKind,
    labels: Vec<String>,
    children: Vec<Pipeline>,
}

impl Step {
    /// Create a step of the given kind with a freshly allocated identifier.
    pub fn new(kind: StepKind) -> Self {
        Self {
            id: fresh_step_id(),
            kind,
            labels: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Attach a user label (builder form).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Attach a nested child pipeline (builder form).
    pub fn with_child(mut self, child: Pipeline) -> Self {
        self.children.push(child);
        self
    }

    /// Get the step identifier.
    pub const fn id(&self) -> StepId {
        self.id
    }

    /// Get the step kind.
    pub const fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// Get the step kind mutably.
    ///
    /// Obtainable only through [`Pipeline::step_mut`] on a mutable pipeline,
    /// which enforces the frozen check.
    pub fn kind_mut(&mut self) -> &mut StepKind {
        &mut self.kind
    }

    /// Get the user labels.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Check if the step carries any label.
    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }

    /// Attach a user label.
    pub fn add_label(&mut self, label: impl Into<String>) {
        self.labels.push(label.into());
    }

    /// Move all labels from another step onto this one.
    pub fn adopt_labels(&mut self, other: &mut Self) {
        self.labels.append(&mut other.labels);
    }

    /// Get the nested child pipelines.
    pub fn children(&self) -> &[Pipeline] {
        &self.children
    }

    /// Get the nested child pipelines mutably.
    pub fn children_mut(&mut self) -> &mut Vec<Pipeline> {
        &mut self.children
    }

    /// Attach a nested child pipeline.
    pub fn attach_child(&mut self, child: Pipeline) {
        self.children.push(child);
    }

    pub(crate) fn explain_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&self.kind.to_string());
        for label in &self.labels {
            out.push_str(" @");
            out.push_str(label);
        }
        out.push_str(&format!(" [{}]\n", self.id));

        for child in &self.children {
            child.explain_into(out, depth + 1);
        }
    }

    /// Executor capabilities required by this step, its labels, and its
    /// nested children.
    pub fn requirements(&self) -> RequirementSet {
        let mut set = self.kind.requirements();
        if self.is_labeled() {
            set.insert(Requirement::LabeledPath);
        }
        for child in &self.children {
            set.extend(&child.requirements());
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = Step::new(StepKind::Identity);
        let b = Step::new(StepKind::Identity);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_kind_classification() {
        assert!(StepKind::Count.is_barrier());
        assert!(StepKind::Order.is_barrier());
        assert!(!StepKind::Identity.is_barrier());

        assert!(StepKind::Is(Predicate::eq(0i64)).is_pure_filter());
        assert!(StepKind::Has(HasContainer::id(Predicate::eq(1i64))).is_pure_filter());
        assert!(!StepKind::Count.is_filter());

        assert!(StepKind::SideEffect {
            name: "store".to_string()
        }
        .has_side_effects());
        assert!(StepKind::GroupCount {
            side_effect_key: None
        }
        .has_side_effects());
    }

    #[test]
    fn test_kind_requirements() {
        let count = StepKind::Count.requirements();
        assert!(count.contains(Requirement::Object));
        assert!(count.contains(Requirement::Bulk));

        let group = StepKind::GroupCount {
            side_effect_key: None,
        }
        .requirements();
        assert!(group.contains(Requirement::SideEffects));
        assert!(group.contains(Requirement::Bulk));

        let select = StepKind::Select {
            labels: vec!["a".to_string()],
        }
        .requirements();
        assert!(select.contains(Requirement::LabeledPath));
    }

    #[test]
    fn test_labeled_step_requires_labeled_path() {
        let step = Step::new(StepKind::Identity).with_label("a");
        assert!(step.requirements().contains(Requirement::LabeledPath));
    }

    #[test]
    fn test_selectivity_hints() {
        assert!(StepKind::Has(HasContainer::id(Predicate::eq(1i64))).selectivity_hint()
            < StepKind::Is(Predicate::eq(0i64)).selectivity_hint());
        assert_eq!(StepKind::Count.selectivity_hint(), None);
        assert_eq!(
            StepKind::Filter {
                name: "sample".to_string(),
                selectivity: 0.1
            }
            .selectivity_hint(),
            Some(0.1)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StepKind::Range { low: 0, high: 4 }.to_string(),
            "Range(0, 4)"
        );
        assert_eq!(
            StepKind::Out {
                edge_labels: vec!["created".to_string()]
            }
            .to_string(),
            "Out(created)"
        );
        assert_eq!(StepKind::Is(Predicate::eq(0i64)).to_string(), "Is(eq(0))");
    }
}
