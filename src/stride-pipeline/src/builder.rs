//! Fluent construction of pipelines.

use stride_core::Predicate;

use crate::pipeline::Pipeline;
use crate::step::{HasContainer, Step, StepKind};

/// Fluent builder for pipelines.
///
/// `PipelineBuilder::new()` starts an anonymous pipeline, used as the body
/// of nested traversals; `vertices()`/`edges()` start a rooted one.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    steps: Vec<Step>,
}

impl PipelineBuilder {
    /// Start an anonymous pipeline (no source step).
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a full vertex scan.
    pub fn vertices() -> Self {
        Self::new().push(StepKind::VertexSource { ids: vec![] })
    }

    /// Start from a direct vertex lookup.
    pub fn vertices_by_id<I, V>(ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<stride_core::Value>,
    {
        Self::new().push(StepKind::VertexSource {
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    /// Start from a full edge scan.
    pub fn edges() -> Self {
        Self::new().push(StepKind::EdgeSource)
    }

    /// Adjacent vertices over outgoing edges.
    pub fn out<I, S>(self, edge_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(StepKind::Out {
            edge_labels: edge_labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Adjacent vertices over incoming edges.
    pub fn in_<I, S>(self, edge_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(StepKind::In {
            edge_labels: edge_labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Adjacent vertices over edges in both directions.
    pub fn both<I, S>(self, edge_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(StepKind::Both {
            edge_labels: edge_labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Outgoing incident edges.
    pub fn out_edges<I, S>(self, edge_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(StepKind::OutEdges {
            edge_labels: edge_labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Incoming incident edges.
    pub fn in_edges<I, S>(self, edge_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(StepKind::InEdges {
            edge_labels: edge_labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Keep elements whose keyed value satisfies the predicate.
    pub fn has(self, key: impl Into<String>, predicate: Predicate) -> Self {
        self.push(StepKind::Has(HasContainer::new(key, predicate)))
    }

    /// Keep elements whose identity satisfies the predicate.
    pub fn has_id(self, predicate: Predicate) -> Self {
        self.push(StepKind::Has(HasContainer::id(predicate)))
    }

    /// Keep elements for which the nested pipeline yields a result.
    pub fn has_traversal(mut self, body: Pipeline) -> Self {
        self.steps
            .push(Step::new(StepKind::HasTraversal { negate: false }).with_child(body));
        self
    }

    /// Keep elements for which the nested pipeline yields no result.
    pub fn has_not_traversal(mut self, body: Pipeline) -> Self {
        self.steps
            .push(Step::new(StepKind::HasTraversal { negate: true }).with_child(body));
        self
    }

    /// Reduce the stream to its element count.
    pub fn count(self) -> Self {
        self.push(StepKind::Count)
    }

    /// Keep values satisfying the predicate.
    pub fn is(self, predicate: Predicate) -> Self {
        self.push(StepKind::Is(predicate))
    }

    /// Keep the elements at positions `low..high`; `-1` means unbounded.
    pub fn range(self, low: i64, high: i64) -> Self {
        self.push(StepKind::Range { low, high })
    }

    /// Pass elements through unchanged.
    pub fn identity(self) -> Self {
        self.push(StepKind::Identity)
    }

    /// Generic pure filter with a declared selectivity hint.
    pub fn filter(self, name: impl Into<String>, selectivity: f64) -> Self {
        self.push(StepKind::Filter {
            name: name.into(),
            selectivity,
        })
    }

    /// Count occurrences per element into a side-effect store.
    pub fn group_count(self) -> Self {
        self.push(StepKind::GroupCount {
            side_effect_key: None,
        })
    }

    /// Materialize the stream into a single list.
    pub fn fold(self) -> Self {
        self.push(StepKind::Fold)
    }

    /// Order the full stream.
    pub fn order(self) -> Self {
        self.push(StepKind::Order)
    }

    /// Enable per-step profiling.
    pub fn profile(self) -> Self {
        self.push(StepKind::Profile)
    }

    /// Invoke an executor-side effect per element.
    pub fn side_effect(self, name: impl Into<String>) -> Self {
        self.push(StepKind::SideEffect { name: name.into() })
    }

    /// Emit previously labeled values.
    pub fn select<I, S>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(StepKind::Select {
            labels: labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Label the most recently appended step. No-op on an empty builder.
    pub fn label(mut self, name: impl Into<String>) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.add_label(name);
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> Pipeline {
        Pipeline::from_steps(self.steps)
    }

    fn push(mut self, kind: StepKind) -> Self {
        self.steps.push(Step::new(kind));
        self
    }
}
