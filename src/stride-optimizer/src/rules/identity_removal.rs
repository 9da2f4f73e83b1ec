//! Removal of no-op identity steps.

use common_error::StrideResult;
use stride_pipeline::{Engine, Pipeline, PipelineHelper, StepTag};

use crate::strategy::Strategy;

/// Remove `identity` steps that are neither labeled nor the sole step in
/// their pipeline.
///
/// Runs before `RangeMerge` and `FilterReordering` so removals expose
/// adjacencies for both.
pub struct IdentityRemoval;

impl Strategy for IdentityRemoval {
    fn id(&self) -> &'static str {
        "IdentityRemoval"
    }

    fn run_before(&self) -> &'static [&'static str] {
        &["RangeMerge", "FilterReordering"]
    }

    fn apply_to(&self, pipeline: &mut Pipeline, _engine: Engine) -> StrideResult<bool> {
        let mut changed = false;

        for id in PipelineHelper::steps_of_kind(pipeline, StepTag::Identity) {
            if pipeline.len() <= 1 {
                break;
            }
            let Some(step) = pipeline.step(id) else {
                continue;
            };
            if step.is_labeled() {
                continue;
            }
            PipelineHelper::remove(pipeline, id)?;
            changed = true;
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::Predicate;
    use stride_pipeline::PipelineBuilder;

    #[test]
    fn test_removes_unlabeled_identity() {
        let mut p = PipelineBuilder::vertices()
            .identity()
            .is(Predicate::eq(0i64))
            .build();

        assert!(IdentityRemoval.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(p.len(), 2);
        assert!(PipelineHelper::steps_of_kind(&p, StepTag::Identity).is_empty());
    }

    #[test]
    fn test_keeps_labeled_identity() {
        let mut p = PipelineBuilder::vertices().identity().label("here").build();

        assert!(!IdentityRemoval.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_keeps_sole_identity() {
        let mut p = PipelineBuilder::new().identity().build();

        assert!(!IdentityRemoval.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(p.len(), 1);

        // Two bare identities collapse to one, not zero.
        let mut q = PipelineBuilder::new().identity().identity().build();
        assert!(IdentityRemoval.apply_to(&mut q, Engine::Standard).unwrap());
        assert_eq!(q.len(), 1);
    }
}
