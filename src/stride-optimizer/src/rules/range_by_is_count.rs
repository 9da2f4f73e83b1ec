//! Range truncation ahead of count comparisons.
//!
//! `X … count is(P)` enumerates the whole upstream even though the
//! comparison can usually be decided after a bounded number of elements.
//! This rule derives that bound and truncates the upstream.
//!
//! # Example
//!
//! Before:
//! ```text
//! Out -> Count -> Is(eq(0))
//! ```
//!
//! After:
//! ```text
//! Out -> Range(0, 1) -> Count -> Is(eq(0))
//! ```

use common_error::StrideResult;
use stride_core::{Predicate, Value};
use stride_pipeline::{Engine, Pipeline, PipelineHelper, Requirement, Step, StepKind, StepTag};

use crate::strategy::Strategy;

/// Truncation rule for count-based comparisons.
///
/// The bound is the smallest `k` such that observing the first `k` upstream
/// elements decides the comparison for the exact count of the full stream.
/// When `count` is followed by several `is` steps, the bound is the maximum
/// over the run; if any comparison in the run is not derivable the rule does
/// not fire at all.
///
/// Runs before `RangeMerge` so merges can absorb the inserted range.
pub struct RangeByIsCount;

impl Strategy for RangeByIsCount {
    fn id(&self) -> &'static str {
        "RangeByIsCount"
    }

    fn run_before(&self) -> &'static [&'static str] {
        &["RangeMerge"]
    }

    fn apply_to(&self, pipeline: &mut Pipeline, engine: Engine) -> StrideResult<bool> {
        let mut changed = false;

        for count_id in PipelineHelper::steps_of_kind(pipeline, StepTag::Count) {
            let Some(position) = pipeline.index_of(count_id) else {
                continue;
            };

            let Some(high) = comparison_bound(&pipeline.steps()[position + 1..]) else {
                continue;
            };
            if high <= 0 {
                // The executor expects non-empty ranges; the comparison is
                // already decided on the empty stream.
                tracing::trace!(strategy = self.id(), %count_id, "bound is zero, skipped");
                continue;
            }

            if engine == Engine::Computer && !computer_safe(pipeline, position) {
                tracing::trace!(
                    strategy = self.id(),
                    %count_id,
                    "unsafe to truncate before a bulk barrier, skipped"
                );
                continue;
            }

            // Fold into an immediately preceding range(0, m) instead of
            // stacking a second one.
            if let Some(previous) = position.checked_sub(1).map(|i| &pipeline.steps()[i]) {
                if let StepKind::Range { low: 0, high: m } = *previous.kind() {
                    let merged = if m == StepKind::UNBOUNDED {
                        high
                    } else {
                        m.min(high)
                    };
                    if merged != m {
                        let previous_id = previous.id();
                        if let StepKind::Range { high: h, .. } =
                            pipeline.step_mut(previous_id)?.kind_mut()
                        {
                            *h = merged;
                        }
                        changed = true;
                    }
                    continue;
                }
            }

            PipelineHelper::insert_before(
                pipeline,
                Step::new(StepKind::Range { low: 0, high }),
                count_id,
            )?;
            changed = true;
        }

        Ok(changed)
    }
}

/// Bound for the run of `is` steps immediately following a `count`.
///
/// `None` when the run is empty or any comparison in it is not derivable;
/// truncating on behalf of a comparison we cannot bound would be unsound.
fn comparison_bound(downstream: &[Step]) -> Option<i64> {
    let mut bound: Option<i64> = None;
    for step in downstream {
        match step.kind() {
            StepKind::Is(predicate) => {
                let k = high_range(predicate)?;
                bound = Some(bound.map_or(k, |b| b.max(k)));
            }
            _ => break,
        }
    }
    bound
}

/// Smallest number of upstream elements sufficient to decide the predicate
/// for the exact count of the full stream.
fn high_range(predicate: &Predicate) -> Option<i64> {
    match predicate {
        // One past n distinguishes "exactly n" from "more than n".
        Predicate::Eq(v) | Predicate::Neq(v) | Predicate::Lte(v) => plus_one(non_negative(v)?),
        // Seeing n elements already witnesses count >= n.
        Predicate::Lt(v) | Predicate::Gte(v) => non_negative(v),
        Predicate::Gt(v) => plus_one(non_negative(v)?),
        // The strict upper bound decides; the strict lower bound is implied.
        Predicate::Inside(_, hi) => non_negative(hi),
        Predicate::Outside(_, hi) => plus_one(non_negative(hi)?),
        Predicate::Within(set) => plus_one(max_count(set)?),
        Predicate::Without(set) => max_count(set),
        _ => None,
    }
}

fn non_negative(value: &Value) -> Option<i64> {
    let n = value.as_count()?;
    (n >= 0).then_some(n)
}

fn plus_one(n: i64) -> Option<i64> {
    n.checked_add(1)
}

fn max_count(set: &[Value]) -> Option<i64> {
    set.iter()
        .map(Value::as_count)
        .collect::<Option<Vec<_>>>()?
        .into_iter()
        .max()
}

/// Under `Computer`, elements flow in bulks: truncation is only legal when
/// the window between the last barrier and the `count` neither produces
/// side effects nor defines a label consumed downstream of the `count`.
fn computer_safe(pipeline: &Pipeline, count_position: usize) -> bool {
    let steps = pipeline.steps();
    let window_start = steps[..count_position]
        .iter()
        .rposition(|s| s.kind().is_barrier())
        .map_or(0, |i| i + 1);
    let window = &steps[window_start..count_position];

    if window
        .iter()
        .any(|s| s.requirements().contains(Requirement::SideEffects))
    {
        return false;
    }

    let mut downstream_consumed = Vec::new();
    for step in &steps[count_position + 1..] {
        downstream_consumed.extend(step.kind().consumed_labels().iter().cloned());
        for child in step.children() {
            downstream_consumed.extend(PipelineHelper::consumed_labels_deep(child));
        }
    }

    !window
        .iter()
        .any(|s| s.labels().iter().any(|l| downstream_consumed.contains(l)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_pipeline::PipelineBuilder;

    fn apply(pipeline: &mut Pipeline, engine: Engine) -> bool {
        RangeByIsCount.apply_to(pipeline, engine).unwrap()
    }

    fn range_bounds(pipeline: &Pipeline) -> Vec<(i64, i64)> {
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
    fn test_inserts_range_before_count() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::eq(0i64))
            .build();

        assert!(apply(&mut p, Engine::Standard));
        assert_eq!(range_bounds(&p), vec![(0, 1)]);
        assert_eq!(p.steps()[2].kind().tag(), StepTag::Range);
        assert_eq!(p.steps()[3].kind().tag(), StepTag::Count);
    }

    #[test]
    fn test_idempotent_via_merge() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::neq(4i64))
            .build();

        assert!(apply(&mut p, Engine::Standard));
        let snapshot = p.clone();
        assert!(!apply(&mut p, Engine::Standard));
        assert_eq!(p, snapshot);
    }

    #[test]
    fn test_merges_with_existing_range() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .range(0, 10)
            .count()
            .is(Predicate::eq(0i64))
            .build();

        assert!(apply(&mut p, Engine::Standard));
        assert_eq!(range_bounds(&p), vec![(0, 1)]);

        // A tighter pre-existing range wins.
        let mut q = PipelineBuilder::vertices()
            .out(["knows"])
            .range(0, 2)
            .count()
            .is(Predicate::neq(4i64))
            .build();

        assert!(!apply(&mut q, Engine::Standard));
        assert_eq!(range_bounds(&q), vec![(0, 2)]);
    }

    #[test]
    fn test_unbounded_existing_range_is_tightened() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .range(0, -1)
            .count()
            .is(Predicate::lt(3i64))
            .build();

        assert!(apply(&mut p, Engine::Standard));
        assert_eq!(range_bounds(&p), vec![(0, 3)]);
    }

    #[test]
    fn test_conjunction_takes_maximum() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::gte(2i64))
            .is(Predicate::lte(5i64))
            .build();

        assert!(apply(&mut p, Engine::Standard));
        assert_eq!(range_bounds(&p), vec![(0, 6)]);
    }

    #[test]
    fn test_underivable_conjunct_blocks_the_run() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::gte(2i64))
            .is(Predicate::opaque("userPredicate"))
            .build();

        assert!(!apply(&mut p, Engine::Standard));
        assert!(range_bounds(&p).is_empty());
    }

    #[test]
    fn test_does_not_fire_without_pattern() {
        // Negative value.
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::eq(-1i64))
            .build();
        assert!(!apply(&mut p, Engine::Standard));

        // lt(0) bounds at zero elements.
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::lt(0i64))
            .build();
        assert!(!apply(&mut p, Engine::Standard));

        // is not immediately after count.
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .identity()
            .is(Predicate::eq(0i64))
            .build();
        assert!(!apply(&mut p, Engine::Standard));

        // Non-numeric comparison value.
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::eq("zero"))
            .build();
        assert!(!apply(&mut p, Engine::Standard));

        // No count upstream.
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .is(Predicate::eq(0i64))
            .build();
        assert!(!apply(&mut p, Engine::Standard));
    }

    #[test]
    fn test_computer_skips_consumed_label_in_window() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .label("friend")
            .count()
            .is(Predicate::eq(0i64))
            .select(["friend"])
            .build();

        assert!(!apply(&mut p, Engine::Computer));
        assert!(range_bounds(&p).is_empty());

        // The same pipeline is fine on the in-process engine.
        let mut q = PipelineBuilder::vertices()
            .out(["knows"])
            .label("friend")
            .count()
            .is(Predicate::eq(0i64))
            .select(["friend"])
            .build();
        assert!(apply(&mut q, Engine::Standard));
    }

    #[test]
    fn test_computer_skips_side_effects_in_window() {
        let mut p = PipelineBuilder::vertices()
            .out(["knows"])
            .side_effect("collect")
            .count()
            .is(Predicate::eq(0i64))
            .build();

        assert!(!apply(&mut p, Engine::Computer));

        // A barrier between the side effect and the count clears the window.
        let mut q = PipelineBuilder::vertices()
            .out(["knows"])
            .side_effect("collect")
            .order()
            .count()
            .is(Predicate::eq(0i64))
            .build();
        assert!(apply(&mut q, Engine::Computer));
        assert_eq!(range_bounds(&q), vec![(0, 1)]);
    }
}
