//! Folding of id constraints into the vertex source.

use common_error::StrideResult;
use stride_core::{Predicate, Value};
use stride_pipeline::{Engine, Pipeline, PipelineHelper, StepId, StepKind, StepTag};

use crate::strategy::Strategy;

/// Fold `vertex-source` followed by `has(id, eq|within, …)` into a direct
/// id lookup on the source.
///
/// Only a full-scan source qualifies, and only an unlabeled `has` step may
/// be absorbed. Runs after `FilterReordering`, which surfaces id constraints
/// next to the source.
pub struct VerticesByIdFolding;

impl Strategy for VerticesByIdFolding {
    fn id(&self) -> &'static str {
        "VerticesByIdFolding"
    }

    fn apply_to(&self, pipeline: &mut Pipeline, _engine: Engine) -> StrideResult<bool> {
        let mut changed = false;

        for source_id in PipelineHelper::steps_of_kind(pipeline, StepTag::VertexSource) {
            changed |= try_fold(pipeline, source_id)?;
        }

        Ok(changed)
    }
}

/// Fold the step after a full-scan source into it, when it is an
/// absorbable id constraint.
fn try_fold(pipeline: &mut Pipeline, source_id: StepId) -> StrideResult<bool> {
    let Some(position) = pipeline.index_of(source_id) else {
        return Ok(false);
    };
    match pipeline.steps()[position].kind() {
        StepKind::VertexSource { ids } if ids.is_empty() => {}
        _ => return Ok(false),
    }

    let Some(next) = pipeline.step_at(position + 1) else {
        return Ok(false);
    };
    if next.is_labeled() {
        tracing::trace!(step = %next.id(), "labeled id constraint left in place");
        return Ok(false);
    }
    let StepKind::Has(container) = next.kind() else {
        return Ok(false);
    };
    if !container.is_id_constraint() {
        return Ok(false);
    }
    let Some(lookup) = lookup_ids(&container.predicate) else {
        return Ok(false);
    };

    let has_id = next.id();
    if let StepKind::VertexSource { ids } = pipeline.step_mut(source_id)?.kind_mut() {
        *ids = lookup;
    }
    PipelineHelper::remove(pipeline, has_id)?;
    Ok(true)
}

/// Ids a direct lookup can serve, for `eq` and non-empty `within` only.
fn lookup_ids(predicate: &Predicate) -> Option<Vec<Value>> {
    match predicate {
        Predicate::Eq(v) => Some(vec![v.clone()]),
        Predicate::Within(vs) if !vs.is_empty() => Some(vs.clone()),
        _ => None,
    }
}
