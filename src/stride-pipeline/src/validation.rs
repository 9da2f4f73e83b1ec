//! Structural validation for pipelines.
//!
//! Checks the pipeline invariants:
//! - step identifiers unique across the pipeline tree
//! - labels unique across the pipeline tree
//! - consumed labels resolve to a defined label
//! - child requirement sets are a subset of their parent step's
//! - per-kind argument constraints (range bounds, traversal arity)
//! - lifecycle state consistent between parent and children

use std::collections::HashSet;

use common_error::{StrideError, StrideResult};

use crate::pipeline::Pipeline;
use crate::step::{Step, StepId, StepKind};

/// A structural validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A step identifier occurs more than once in the tree.
    DuplicateStepId {
        /// The offending identifier.
        id: StepId,
    },

    /// A label occurs on more than one step in the tree.
    DuplicateLabel {
        /// The offending label.
        label: String,
    },

    /// A step consumes a label no step defines.
    DanglingLabel {
        /// The consuming step.
        step: StepId,
        /// The unresolved label.
        label: String,
    },

    /// A nested pipeline requires more than its parent step reports.
    ChildRequirementsExceedParent {
        /// The parent step.
        step: StepId,
    },

    /// A range step with impossible bounds.
    InvalidRange {
        /// The offending step.
        step: StepId,
        /// Inclusive start position.
        low: i64,
        /// Exclusive end position, or `-1`.
        high: i64,
    },

    /// A `has-traversal` step without exactly one child pipeline.
    TraversalArity {
        /// The offending step.
        step: StepId,
        /// Number of children found.
        actual: usize,
    },

    /// A mutable child pipeline under an applied parent.
    InconsistentState {
        /// The parent step owning the child.
        step: StepId,
    },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateStepId { id } => write!(f, "duplicate step id {id}"),
            Self::DuplicateLabel { label } => write!(f, "duplicate label '{label}'"),
            Self::DanglingLabel { step, label } => {
                write!(f, "step {step} references undefined label '{label}'")
            }
            Self::ChildRequirementsExceedParent { step } => {
                write!(f, "child requirements of step {step} exceed the parent's")
            }
            Self::InvalidRange { step, low, high } => {
                write!(f, "step {step} has invalid range [{low}, {high})")
            }
            Self::TraversalArity { step, actual } => {
                write!(
                    f,
                    "has-traversal step {step} needs exactly one child, found {actual}"
                )
            }
            Self::InconsistentState { step } => {
                write!(f, "applied pipeline holds a mutable child under step {step}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Structural validator for pipelines.
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate the structural integrity of a pipeline tree.
    ///
    /// Returns `Ok(())` if all invariants hold, or the list of violations.
    pub fn validate(pipeline: &Pipeline) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut ids = HashSet::new();
        let mut labels = HashSet::new();
        Self::collect(pipeline, &mut ids, &mut labels, &mut errors);

        Self::check_label_references(pipeline, &labels, &mut errors);
        Self::check_steps(pipeline, pipeline.is_frozen(), &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold any violations into a single `Invariant` error.
    pub fn check(pipeline: &Pipeline) -> StrideResult<()> {
        Self::validate(pipeline).map_err(|errors| {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            StrideError::invariant(reasons.join("; "))
        })
    }

    fn collect(
        pipeline: &Pipeline,
        ids: &mut HashSet<StepId>,
        labels: &mut HashSet<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        for step in pipeline.steps() {
            if !ids.insert(step.id()) {
                errors.push(ValidationError::DuplicateStepId { id: step.id() });
            }
            for label in step.labels() {
                if !labels.insert(label.clone()) {
                    errors.push(ValidationError::DuplicateLabel {
                        label: label.clone(),
                    });
                }
            }
            for child in step.children() {
                Self::collect(child, ids, labels, errors);
            }
        }
    }

    fn check_label_references(
        pipeline: &Pipeline,
        defined: &HashSet<String>,
        errors: &mut Vec<ValidationError>,
    ) {
        for step in pipeline.steps() {
            for label in step.kind().consumed_labels() {
                if !defined.contains(label) {
                    errors.push(ValidationError::DanglingLabel {
                        step: step.id(),
                        label: label.clone(),
                    });
                }
            }
            for child in step.children() {
                Self::check_label_references(child, defined, errors);
            }
        }
    }

    fn check_steps(pipeline: &Pipeline, frozen: bool, errors: &mut Vec<ValidationError>) {
        for step in pipeline.steps() {
            Self::check_step(step, frozen, errors);
        }
    }

    fn check_step(step: &Step, frozen: bool, errors: &mut Vec<ValidationError>) {
        match step.kind() {
            StepKind::Range { low, high } => {
                let empty = *high != StepKind::UNBOUNDED && *high <= *low;
                if *low < 0 || (*high != StepKind::UNBOUNDED && *high < 0) || empty {
                    errors.push(ValidationError::InvalidRange {
                        step: step.id(),
                        low: *low,
                        high: *high,
                    });
                }
            }
            StepKind::HasTraversal { .. } => {
                if step.children().len() != 1 {
                    errors.push(ValidationError::TraversalArity {
                        step: step.id(),
                        actual: step.children().len(),
                    });
                }
            }
            _ => {}
        }

        let parent_requirements = step.requirements();
        for child in step.children() {
            if !child.requirements().is_subset(&parent_requirements) {
                errors.push(ValidationError::ChildRequirementsExceedParent { step: step.id() });
            }
            if frozen && !child.is_frozen() {
                errors.push(ValidationError::InconsistentState { step: step.id() });
            }
            Self::check_steps(child, child.is_frozen(), errors);
        }
    }
}

/// Count the total number of steps in a pipeline tree.
pub fn step_count(pipeline: &Pipeline) -> usize {
    pipeline
        .steps()
        .iter()
        .map(|s| 1 + s.children().iter().map(step_count).sum::<usize>())
        .sum()
}

/// Get the maximum nesting depth of a pipeline tree.
pub fn nesting_depth(pipeline: &Pipeline) -> usize {
    1 + pipeline
        .steps()
        .iter()
        .flat_map(|s| s.children().iter().map(nesting_depth))
        .max()
        .unwrap_or(0)
}
