//! Collapsing of adjacent range steps.

use common_error::StrideResult;
use stride_pipeline::{Engine, Pipeline, StepKind};

use crate::strategy::Strategy;

/// Collapse adjacent `range(a, b)` and `range(c, d)` into
/// `range(a + c, min(b, a + d))`, with `-1` acting as infinity.
///
/// The second range reads positions of the stream the first already
/// truncated, so the bounds compose. Labels on the second step move onto the
/// merged one. Pairs whose composition would be empty are left alone; an
/// empty range is not representable for the executor.
pub struct RangeMerge;

impl Strategy for RangeMerge {
    fn id(&self) -> &'static str {
        "RangeMerge"
    }

    fn apply_to(&self, pipeline: &mut Pipeline, _engine: Engine) -> StrideResult<bool> {
        let steps = pipeline.steps_mut()?;
        let mut changed = false;

        let mut i = 0;
        while i + 1 < steps.len() {
            let pair = (steps[i].kind().clone(), steps[i + 1].kind().clone());
            if let (
                StepKind::Range { low: a, high: b },
                StepKind::Range { low: c, high: d },
            ) = pair
            {
                if let Some((low, high)) = compose(a, b, c, d) {
                    let mut second = steps.remove(i + 1);
                    let first = &mut steps[i];
                    first.adopt_labels(&mut second);
                    *first.kind_mut() = StepKind::Range { low, high };
                    changed = true;
                    // The merged step may be adjacent to yet another range.
                    continue;
                }
            }
            i += 1;
        }

        Ok(changed)
    }
}

/// Compose two stacked range bounds, or `None` when the result would be
/// empty or overflow.
fn compose(a: i64, b: i64, c: i64, d: i64) -> Option<(i64, i64)> {
    let low = a.checked_add(c)?;
    let high = if d == StepKind::UNBOUNDED {
        b
    } else if b == StepKind::UNBOUNDED {
        a.checked_add(d)?
    } else {
        b.min(a.checked_add(d)?)
    };
    if high != StepKind::UNBOUNDED && high <= low {
        return None;
    }
    Some((low, high))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pipeline::{PipelineBuilder, StepTag};

    fn bounds(pipeline: &Pipeline) -> Vec<(i64, i64)> {
        pipeline
            .steps()
            .iter()
            .filter_map(|s| match s.kind() {
                StepKind::Range { low, high } => Some((*low, *high)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_merges_adjacent_ranges() {
        let mut p = PipelineBuilder::vertices()
            .range(2, 10)
            .range(1, 5)
            .build();

        assert!(RangeMerge.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(bounds(&p), vec![(3, 7)]);
    }

    #[test]
    fn test_merges_a_whole_run() {
        let mut p = PipelineBuilder::vertices()
            .range(0, 100)
            .range(0, 10)
            .range(0, 1)
            .build();

        assert!(RangeMerge.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(bounds(&p), vec![(0, 1)]);
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_unbounded_composition() {
        let mut p = PipelineBuilder::vertices().range(3, -1).range(2, -1).build();
        assert!(RangeMerge.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(bounds(&p), vec![(5, -1)]);

        let mut q = PipelineBuilder::vertices().range(0, -1).range(2, 7).build();
        assert!(RangeMerge.apply_to(&mut q, Engine::Standard).unwrap());
        assert_eq!(bounds(&q), vec![(2, 7)]);

        let mut r = PipelineBuilder::vertices().range(1, 9).range(0, -1).build();
        assert!(RangeMerge.apply_to(&mut r, Engine::Standard).unwrap());
        assert_eq!(bounds(&r), vec![(1, 9)]);
    }

    #[test]
    fn test_empty_composition_is_left_alone() {
        // The second range starts past everything the first lets through.
        let mut p = PipelineBuilder::vertices().range(0, 2).range(5, 9).build();

        assert!(!RangeMerge.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(bounds(&p), vec![(0, 2), (5, 9)]);
    }

    #[test]
    fn test_label_moves_onto_merged_step() {
        let mut p = PipelineBuilder::vertices()
            .range(0, 10)
            .range(0, 5)
            .label("window")
            .build();

        assert!(RangeMerge.apply_to(&mut p, Engine::Standard).unwrap());
        let range = p
            .steps()
            .iter()
            .find(|s| s.kind().tag() == StepTag::Range)
            .unwrap();
        assert_eq!(range.labels(), ["window".to_string()]);
    }

    #[test]
    fn test_non_adjacent_ranges_untouched() {
        let mut p = PipelineBuilder::vertices()
            .range(0, 10)
            .identity()
            .range(0, 5)
            .build();

        assert!(!RangeMerge.apply_to(&mut p, Engine::Standard).unwrap());
        assert_eq!(bounds(&p).len(), 2);
    }
}
