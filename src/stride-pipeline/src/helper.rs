//! Structural queries and edits over pipelines.
//!
//! Every rewrite rule goes through these services. Queries are pure
//! functions of the current pipeline; edits mutate in place and preserve the
//! structural invariants or fail with `Invariant`.

use common_error::{StrideError, StrideResult};

use crate::pipeline::Pipeline;
use crate::step::{Step, StepId, StepTag};

/// Structural helper over pipelines.
pub struct PipelineHelper;

impl PipelineHelper {
    /// Zero-based position of a step at this pipeline level.
    pub fn position_of(pipeline: &Pipeline, id: StepId) -> Option<usize> {
        pipeline.index_of(id)
    }

    /// All steps of the given kind at this pipeline level, in order.
    pub fn steps_of_kind(pipeline: &Pipeline, tag: StepTag) -> Vec<StepId> {
        pipeline
            .steps()
            .iter()
            .filter(|s| s.kind().tag() == tag)
            .map(Step::id)
            .collect()
    }

    /// All steps of the given kind in the whole pipeline tree, pre-order.
    pub fn steps_of_kind_deep(pipeline: &Pipeline, tag: StepTag) -> Vec<StepId> {
        let mut out = Vec::new();
        Self::walk(pipeline, &mut |step| {
            if step.kind().tag() == tag {
                out.push(step.id());
            }
        });
        out
    }

    /// The step immediately before the given one, or `None` at the boundary.
    pub fn predecessor(pipeline: &Pipeline, id: StepId) -> Option<&Step> {
        let position = pipeline.index_of(id)?;
        position.checked_sub(1).and_then(|i| pipeline.step_at(i))
    }

    /// The step immediately after the given one, or `None` at the boundary.
    pub fn successor(pipeline: &Pipeline, id: StepId) -> Option<&Step> {
        let position = pipeline.index_of(id)?;
        pipeline.step_at(position + 1)
    }

    /// Insert a step immediately before an existing one.
    pub fn insert_before(
        pipeline: &mut Pipeline,
        step: Step,
        anchor: StepId,
    ) -> StrideResult<StepId> {
        let position = Self::require_position(pipeline, anchor)?;
        pipeline.insert_at(position, step)
    }

    /// Insert a step immediately after an existing one.
    pub fn insert_after(
        pipeline: &mut Pipeline,
        step: Step,
        anchor: StepId,
    ) -> StrideResult<StepId> {
        let position = Self::require_position(pipeline, anchor)?;
        pipeline.insert_at(position + 1, step)
    }

    /// Replace a step in place. The replacement adopts the old step's
    /// labels so references elsewhere keep resolving.
    pub fn replace(pipeline: &mut Pipeline, old: StepId, mut new: Step) -> StrideResult<StepId> {
        let position = Self::require_position(pipeline, old)?;
        let mut removed = pipeline.remove_at(position)?;
        new.adopt_labels(&mut removed);
        pipeline.insert_at(position, new)
    }

    /// Remove a step.
    ///
    /// Fails with `Invariant` if the step carries a label that another step
    /// in this pipeline tree still consumes.
    pub fn remove(pipeline: &mut Pipeline, id: StepId) -> StrideResult<Step> {
        let position = Self::require_position(pipeline, id)?;
        let consumed = Self::consumed_labels_deep(pipeline);
        let step = &pipeline.steps()[position];
        if let Some(label) = step.labels().iter().find(|l| consumed.contains(*l)) {
            return Err(StrideError::invariant_at(
                id.0,
                format!("label '{label}' is still referenced"),
            ));
        }
        pipeline.remove_at(position)
    }

    /// Splice a nested child pipeline's steps into the parent.
    ///
    /// The child at `child_index` of `host` is detached and its steps are
    /// inserted starting at `at_position` in the parent pipeline.
    pub fn lift(
        pipeline: &mut Pipeline,
        host: StepId,
        child_index: usize,
        at_position: usize,
    ) -> StrideResult<()> {
        pipeline.ensure_mutable()?;
        if at_position > pipeline.len() {
            return Err(StrideError::invariant(format!(
                "lift position {at_position} out of bounds for pipeline of length {}",
                pipeline.len()
            )));
        }
        let host_step = pipeline.step_mut(host)?;
        if child_index >= host_step.children().len() {
            return Err(StrideError::invariant_at(
                host.0,
                format!("no child pipeline at index {child_index}"),
            ));
        }
        let child = host_step.children_mut().remove(child_index);
        for (offset, step) in child.into_steps().into_iter().enumerate() {
            pipeline.insert_at(at_position + offset, step)?;
        }
        Ok(())
    }

    /// Pre-order traversal over the pipeline tree, including nested
    /// children.
    pub fn walk<'a, F>(pipeline: &'a Pipeline, visitor: &mut F)
    where
        F: FnMut(&'a Step),
    {
        for step in pipeline.steps() {
            visitor(step);
            for child in step.children() {
                Self::walk(child, visitor);
            }
        }
    }

    /// All labels consumed by steps in this pipeline tree.
    pub fn consumed_labels_deep(pipeline: &Pipeline) -> Vec<String> {
        let mut out = Vec::new();
        Self::walk(pipeline, &mut |step| {
            out.extend(step.kind().consumed_labels().iter().cloned());
        });
        out
    }

    fn require_position(pipeline: &Pipeline, id: StepId) -> StrideResult<usize> {
        pipeline
            .index_of(id)
            .ok_or_else(|| StrideError::invariant_at(id.0, "not in pipeline"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepKind;
    use stride_core::Predicate;

    fn out_count_is() -> Pipeline {
        let mut p = Pipeline::new();
        p.append(StepKind::Out {
            edge_labels: vec![],
        })
        .unwrap();
        p.append(StepKind::Count).unwrap();
        p.append(StepKind::Is(Predicate::eq(0i64))).unwrap();
        p
    }

    #[test]
    fn test_position_and_neighbors() {
        let p = out_count_is();
        let count_id = p.steps()[1].id();

        assert_eq!(PipelineHelper::position_of(&p, count_id), Some(1));
        assert_eq!(
            PipelineHelper::predecessor(&p, count_id).unwrap().kind(),
            &StepKind::Out {
                edge_labels: vec![]
            }
        );
        assert_eq!(
            PipelineHelper::successor(&p, count_id).unwrap().kind(),
            &StepKind::Is(Predicate::eq(0i64))
        );

        let first = p.steps()[0].id();
        let last = p.steps()[2].id();
        assert!(PipelineHelper::predecessor(&p, first).is_none());
        assert!(PipelineHelper::successor(&p, last).is_none());
    }

    #[test]
    fn test_steps_of_kind_shallow_and_deep() {
        let mut child = Pipeline::new();
        child.append(StepKind::Count).unwrap();

        let mut p = out_count_is();
        let host = p
            .append(StepKind::HasTraversal { negate: false })
            .unwrap();
        p.attach_child(host, child).unwrap();

        assert_eq!(PipelineHelper::steps_of_kind(&p, StepTag::Count).len(), 1);
        assert_eq!(
            PipelineHelper::steps_of_kind_deep(&p, StepTag::Count).len(),
            2
        );
    }

    #[test]
    fn test_insert_before_and_after() {
        let mut p = out_count_is();
        let count_id = p.steps()[1].id();

        let range_id = PipelineHelper::insert_before(
            &mut p,
            Step::new(StepKind::Range { low: 0, high: 1 }),
            count_id,
        )
        .unwrap();

        assert_eq!(PipelineHelper::position_of(&p, range_id), Some(1));
        assert_eq!(PipelineHelper::position_of(&p, count_id), Some(2));

        let identity_id =
            PipelineHelper::insert_after(&mut p, Step::new(StepKind::Identity), count_id).unwrap();
        assert_eq!(PipelineHelper::position_of(&p, identity_id), Some(3));
    }

    #[test]
    fn test_insert_with_missing_anchor_fails() {
        let mut p = out_count_is();
        let err = PipelineHelper::insert_before(
            &mut p,
            Step::new(StepKind::Identity),
            StepId(u64::MAX),
        )
        .unwrap_err();
        assert!(matches!(err, StrideError::Invariant(_)));
    }

    #[test]
    fn test_replace_rewires_labels() {
        let mut p = out_count_is();
        let out_id = p.steps()[0].id();
        p.label_step(out_id, "a").unwrap();

        let new_id = PipelineHelper::replace(
            &mut p,
            out_id,
            Step::new(StepKind::Both {
                edge_labels: vec![],
            }),
        )
        .unwrap();

        let replaced = p.step(new_id).unwrap();
        assert_eq!(replaced.labels(), ["a".to_string()]);
        assert!(p.step(out_id).is_none());
    }

    #[test]
    fn test_remove_referenced_label_fails() {
        let mut p = out_count_is();
        let out_id = p.steps()[0].id();
        p.label_step(out_id, "a").unwrap();
        p.append(StepKind::Select {
            labels: vec!["a".to_string()],
        })
        .unwrap();

        let err = PipelineHelper::remove(&mut p, out_id).unwrap_err();
        assert!(matches!(err, StrideError::Invariant(_)));

        // Unreferenced steps come out fine.
        let is_id = p.steps()[2].id();
        let removed = PipelineHelper::remove(&mut p, is_id).unwrap();
        assert_eq!(removed.kind(), &StepKind::Is(Predicate::eq(0i64)));
    }

    #[test]
    fn test_lift_splices_child_steps() {
        let mut child = Pipeline::new();
        child
            .append(StepKind::OutEdges {
                edge_labels: vec!["created".to_string()],
            })
            .unwrap();
        child.append(StepKind::Count).unwrap();

        let mut p = Pipeline::new();
        p.append(StepKind::VertexSource { ids: vec![] }).unwrap();
        let host = p
            .append(StepKind::HasTraversal { negate: false })
            .unwrap();
        p.attach_child(host, child).unwrap();

        PipelineHelper::lift(&mut p, host, 0, 1).unwrap();

        assert_eq!(p.len(), 4);
        assert_eq!(p.steps()[1].kind().tag(), StepTag::OutEdges);
        assert_eq!(p.steps()[2].kind().tag(), StepTag::Count);
        assert!(p.step(host).unwrap().children().is_empty());
    }

    #[test]
    fn test_walk_is_preorder() {
        let mut child = Pipeline::new();
        child.append(StepKind::Count).unwrap();

        let mut p = Pipeline::new();
        p.append(StepKind::VertexSource { ids: vec![] }).unwrap();
        let host = p
            .append(StepKind::HasTraversal { negate: false })
            .unwrap();
        p.attach_child(host, child).unwrap();
        p.append(StepKind::Identity).unwrap();

        let mut names = Vec::new();
        PipelineHelper::walk(&p, &mut |step| names.push(step.kind().name()));
        assert_eq!(
            names,
            vec!["VertexSource", "HasTraversal", "Count", "Identity"]
        );
    }

    #[test]
    fn test_edits_rejected_on_frozen_pipeline() {
        let mut p = out_count_is();
        let count_id = p.steps()[1].id();
        p.freeze();

        let err = PipelineHelper::insert_before(
            &mut p,
            Step::new(StepKind::Range { low: 0, high: 1 }),
            count_id,
        )
        .unwrap_err();
        assert!(matches!(err, StrideError::Frozen(_)));
    }
}
