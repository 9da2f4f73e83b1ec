//! Injection of profiling probes.

use common_error::StrideResult;
use stride_pipeline::{Engine, Pipeline, PipelineHelper, Step, StepId, StepKind, StepTag};

use crate::strategy::Strategy;

/// When a `profile` step is present anywhere in the pipeline tree, precede
/// every other step with an internal measurement probe.
///
/// Probes carry the `Bulk` requirement; this is the only rule allowed to add
/// a requirement. Runs after every other catalog rule so probes wrap the
/// final step sequence.
pub struct ProfileInjection;

impl Strategy for ProfileInjection {
    fn id(&self) -> &'static str {
        "ProfileInjection"
    }

    fn run_after(&self) -> &'static [&'static str] {
        &[
            "IdentityRemoval",
            "RangeByIsCount",
            "RangeMerge",
            "FilterReordering",
            "VerticesByIdFolding",
        ]
    }

    fn apply_to(&self, pipeline: &mut Pipeline, _engine: Engine) -> StrideResult<bool> {
        if PipelineHelper::steps_of_kind_deep(pipeline, StepTag::Profile).is_empty() {
            return Ok(false);
        }
        inject(pipeline)
    }
}

fn inject(pipeline: &mut Pipeline) -> StrideResult<bool> {
    let mut changed = false;

    let ids: Vec<StepId> = pipeline.steps().iter().map(Step::id).collect();
    for id in ids {
        let Some(position) = pipeline.index_of(id) else {
            continue;
        };
        let tag = pipeline.steps()[position].kind().tag();
        if matches!(tag, StepTag::Profile | StepTag::ProfileProbe) {
            continue;
        }
        let already_probed = position
            .checked_sub(1)
            .map(|i| pipeline.steps()[i].kind().tag() == StepTag::ProfileProbe)
            .unwrap_or(false);
        if !already_probed {
            PipelineHelper::insert_before(pipeline, Step::new(StepKind::ProfileProbe), id)?;
            changed = true;
        }
    }

    for step in pipeline.steps_mut()? {
        for child in step.children_mut() {
            changed |= inject(child)?;
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::Predicate;
    use stride_pipeline::PipelineBuilder;

    fn tags(pipeline: &Pipeline) -> Vec<StepTag> {
        pipeline.steps().iter().map(|s| s.kind().tag()).collect()
    }

    #[test]
    fn test_no_profile_step_no_probes() {
        let mut p = PipelineBuilder::vertices().out(["knows"]).build();
        assert!(!ProfileInjection.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_probes_precede_every_step() {
        let mut p = PipelineBuilder::vertices().out(["knows"]).profile().build();

        assert!(ProfileInjection.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(
            tags(&p),
            vec![
                StepTag::ProfileProbe,
                StepTag::VertexSource,
                StepTag::ProfileProbe,
                StepTag::Out,
                StepTag::Profile
            ]
        );
    }

    #[test]
    fn test_idempotent() {
        let mut p = PipelineBuilder::vertices().out(["knows"]).profile().build();
        assert!(ProfileInjection.apply_to(&mut p, Engine::Standard).unwrap());
        let snapshot = p.clone();

        assert!(!ProfileInjection.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(p, snapshot);
    }

    #[test]
    fn test_reaches_nested_children() {
        let body = PipelineBuilder::new()
            .out_edges(["created"])
            .count()
            .is(Predicate::eq(0i64))
            .build();
        let mut p = PipelineBuilder::vertices()
            .has_traversal(body)
            .profile()
            .build();

        assert!(ProfileInjection.apply_to(&mut p, Engine::Standard).unwrap());

        let child = &p.steps()[3].children()[0];
        let probe_count = child
            .steps()
            .iter()
            .filter(|s| s.kind().tag() == StepTag::ProfileProbe)
            .count();
        assert_eq!(probe_count, 3);
    }
}
