//! Pipeline structure and lifecycle.

use common_error::{StrideError, StrideResult};
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::step::{RequirementSet, Step, StepId, StepKind};

/// Lifecycle state of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    /// Under construction or being rewritten; edits are allowed.
    Mutable,
    /// Strategies have been applied; the pipeline is read-only.
    Applied,
}

/// Ordered sequence of steps representing a traversal query.
///
/// The pipeline is an arena: it exclusively owns its steps, steps own their
/// nested child pipelines, and steps are addressed by position or by
/// [`StepId`]. Predecessor/successor relationships are recomputed from
/// position, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    steps: Vec<Step>,
    engine: Option<Engine>,
    state: PipelineState,
}

impl Pipeline {
    /// Create an empty mutable pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            engine: None,
            state: PipelineState::Mutable,
        }
    }

    /// Number of steps at this level.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the pipeline has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get the steps in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get a step by identifier.
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id() == id)
    }

    /// Get the zero-based position of a step.
    pub fn index_of(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id() == id)
    }

    /// Get a step by position.
    pub fn step_at(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Get a step mutably by identifier.
    ///
    /// Fails with `Frozen` on an applied pipeline and `Invariant` if the
    /// step is not present.
    pub fn step_mut(&mut self, id: StepId) -> StrideResult<&mut Step> {
        self.ensure_mutable()?;
        self.steps
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| StrideError::invariant_at(id.0, "not in pipeline"))
    }

    /// Append a step.
    pub fn push(&mut self, step: Step) -> StrideResult<StepId> {
        self.ensure_mutable()?;
        let id = step.id();
        self.steps.push(step);
        Ok(id)
    }

    /// Append a step of the given kind, returning its identifier.
    pub fn append(&mut self, kind: StepKind) -> StrideResult<StepId> {
        self.push(Step::new(kind))
    }

    /// Attach a nested child pipeline to a step.
    pub fn attach_child(&mut self, parent: StepId, child: Pipeline) -> StrideResult<()> {
        self.step_mut(parent)?.attach_child(child);
        Ok(())
    }

    /// Label a step, keeping labels unique across this pipeline tree.
    pub fn label_step(&mut self, id: StepId, label: impl Into<String>) -> StrideResult<()> {
        let label = label.into();
        if self.labels_deep().contains(&label) {
            return Err(StrideError::invariant_at(
                id.0,
                format!("duplicate label '{label}'"),
            ));
        }
        self.step_mut(id)?.add_label(label);
        Ok(())
    }

    /// Get the engine tag, if set.
    pub fn engine(&self) -> Option<Engine> {
        self.engine
    }

    /// Set the engine tag. Locked once the pipeline is applied.
    pub fn set_engine(&mut self, engine: Engine) -> StrideResult<()> {
        self.ensure_mutable()?;
        self.engine = Some(engine);
        Ok(())
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Check if the pipeline has been applied.
    pub fn is_frozen(&self) -> bool {
        self.state == PipelineState::Applied
    }

    /// Fail with `Frozen` if the pipeline has been applied.
    pub fn ensure_mutable(&self) -> StrideResult<()> {
        match self.state {
            PipelineState::Mutable => Ok(()),
            PipelineState::Applied => Err(StrideError::frozen(
                "pipeline has been applied and is read-only",
            )),
        }
    }

    /// Transition the whole pipeline tree to the applied state.
    pub fn freeze(&mut self) {
        self.state = PipelineState::Applied;
        for step in &mut self.steps {
            for child in step.children_mut() {
                child.freeze();
            }
        }
    }

    /// Requirement set aggregated over all steps and nested children.
    pub fn requirements(&self) -> RequirementSet {
        let mut set = RequirementSet::new();
        for step in &self.steps {
            set.extend(&step.requirements());
        }
        set
    }

    /// All step identifiers in this pipeline tree, pre-order.
    pub fn ids_deep(&self) -> Vec<StepId> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, out: &mut Vec<StepId>) {
        for step in &self.steps {
            out.push(step.id());
            for child in step.children() {
                child.collect_ids(out);
            }
        }
    }

    /// All labels in this pipeline tree, pre-order.
    pub fn labels_deep(&self) -> Vec<String> {
        let mut labels = Vec::new();
        self.collect_labels(&mut labels);
        labels
    }

    fn collect_labels(&self, out: &mut Vec<String>) {
        for step in &self.steps {
            out.extend(step.labels().iter().cloned());
            for child in step.children() {
                child.collect_labels(out);
            }
        }
    }

    /// Display the pipeline as an indented tree.
    ///
    /// One line per step: the kind with its arguments, any labels as
    /// `@label`, and the step identifier. Nested child pipelines render
    /// beneath their host step, one level deeper.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.explain_into(&mut out, 0);
        out
    }

    pub(crate) fn explain_into(&self, out: &mut String, depth: usize) {
        out.push_str(&"  ".repeat(depth));
        out.push_str("Pipeline[");
        match self.engine {
            Some(engine) => out.push_str(&engine.to_string()),
            None => out.push_str("untagged"),
        }
        if self.state == PipelineState::Applied {
            out.push_str(", applied");
        }
        out.push_str("]\n");

        for step in &self.steps {
            step.explain_into(out, depth + 1);
        }
    }

    /// Encode to the executor-facing JSON form.
    pub fn to_json(&self) -> StrideResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from the executor-facing JSON form.
    pub fn from_json(json: &str) -> StrideResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Consume the pipeline, returning its steps in order.
    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }

    pub(crate) fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            engine: None,
            state: PipelineState::Mutable,
        }
    }

    pub(crate) fn insert_at(&mut self, index: usize, step: Step) -> StrideResult<StepId> {
        self.ensure_mutable()?;
        if index > self.steps.len() {
            return Err(StrideError::invariant(format!(
                "insert position {index} out of bounds for pipeline of length {}",
                self.steps.len()
            )));
        }
        let id = step.id();
        self.steps.insert(index, step);
        Ok(id)
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> StrideResult<Step> {
        self.ensure_mutable()?;
        if index >= self.steps.len() {
            return Err(StrideError::invariant(format!(
                "remove position {index} out of bounds for pipeline of length {}",
                self.steps.len()
            )));
        }
        Ok(self.steps.remove(index))
    }

    /// Get the steps mutably for slice-level edits.
    ///
    /// Fails with `Frozen` on an applied pipeline. Callers are responsible
    /// for keeping the structural invariants; `apply` re-validates the whole
    /// tree after every strategy pass.
    pub fn steps_mut(&mut self) -> StrideResult<&mut Vec<Step>> {
        self.ensure_mutable()?;
        Ok(&mut self.steps)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.explain())
    }
}
