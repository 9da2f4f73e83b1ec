//! Reordering of pure filters by selectivity.

use common_error::StrideResult;
use stride_pipeline::{Engine, Pipeline, Requirement, Step, StepKind};

use crate::strategy::Strategy;

/// Within each contiguous run of pure element-wise filters, sort by the
/// declared selectivity hint ascending so the cheapest rejections happen
/// first. The sort is stable; ties keep their original order.
///
/// A step participates only when it filters per element with no labels, no
/// side effects, and no side-effecting nested traversal. `range` is
/// positional rather than element-wise and therefore breaks a run.
///
/// Runs before `VerticesByIdFolding` so id constraints surface next to
/// their source.
pub struct FilterReordering;

impl Strategy for FilterReordering {
    fn id(&self) -> &'static str {
        "FilterReordering"
    }

    fn run_before(&self) -> &'static [&'static str] {
        &["VerticesByIdFolding"]
    }

    fn apply_to(&self, pipeline: &mut Pipeline, _engine: Engine) -> StrideResult<bool> {
        let steps = pipeline.steps_mut()?;
        let mut changed = false;

        let mut start = 0;
        while start < steps.len() {
            if !reorderable(&steps[start]) {
                start += 1;
                continue;
            }
            let mut end = start + 1;
            while end < steps.len() && reorderable(&steps[end]) {
                end += 1;
            }

            if end - start > 1 {
                let before: Vec<_> = steps[start..end].iter().map(Step::id).collect();
                steps[start..end].sort_by(|x, y| {
                    let sx = x.kind().selectivity_hint().unwrap_or(1.0);
                    let sy = y.kind().selectivity_hint().unwrap_or(1.0);
                    sx.partial_cmp(&sy).unwrap_or(std::cmp::Ordering::Equal)
                });
                let after: Vec<_> = steps[start..end].iter().map(Step::id).collect();
                changed |= before != after;
            }

            start = end;
        }

        Ok(changed)
    }
}

fn reorderable(step: &Step) -> bool {
    step.kind().is_pure_filter()
        && !matches!(step.kind(), StepKind::Range { .. })
        && !step.is_labeled()
        && !step.requirements().contains(Requirement::SideEffects)
}
