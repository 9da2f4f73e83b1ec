//! Optimizer for Stride traversal pipelines.
//!
//! `stride-optimizer` rewrites pipelines into semantically equivalent but
//! cheaper ones. It provides the strategy framework (registration, ordering,
//! one-shot application) and the catalog of rewrite rules.
//!
//! # Overview
//!
//! A [`Strategy`] is a deterministic in-place rewrite of one pipeline level.
//! Strategies declare ordering edges against their peers; [`apply`] computes
//! a topological order once, runs each strategy exactly once per level —
//! parents before nested children — validates the structural invariants, and
//! freezes the pipeline for the executor.
//!
//! # Implemented Rules
//!
//! - **RangeByIsCount**: truncate the upstream of `count is(P)` to the
//!   smallest prefix that decides the comparison
//! - **IdentityRemoval**: drop no-op identity steps
//! - **RangeMerge**: collapse adjacent range steps
//! - **FilterReordering**: order pure filters by selectivity
//! - **ProfileInjection**: wrap steps with measurement probes
//! - **VerticesByIdFolding**: turn id constraints into direct lookups
//!
//! # Example
//!
//! ```rust
//! use stride_core::Predicate;
//! use stride_pipeline::{Engine, PipelineBuilder};
//! use stride_optimizer::{apply, default_strategies};
//!
//! let mut pipeline = PipelineBuilder::vertices()
//!     .out(["knows"])
//!     .count()
//!     .is(Predicate::eq(0i64))
//!     .build();
//!
//! apply(&mut pipeline, Engine::Standard, default_strategies()).unwrap();
//!
//! // A range(0, 1) now truncates the upstream, and the pipeline is frozen.
//! println!("{}", pipeline.explain());
//! ```

pub mod rules;
mod strategy;

pub use rules::{
    FilterReordering, IdentityRemoval, ProfileInjection, RangeByIsCount, RangeMerge,
    VerticesByIdFolding,
};
pub use strategy::{default_strategies, OptimizedReport, RuleTrace, Strategy, StrategySet};

use common_error::StrideResult;
use stride_pipeline::{Engine, Pipeline, PipelineValidator};

/// Apply a strategy set to a pipeline under the given engine tag.
///
/// Mutates the pipeline in place, then freezes it. Fails with
/// `Configuration` before any rewrite runs if the strategy ordering is
/// cyclic, with `Frozen` if the pipeline was already applied, and with
/// `Invariant` if a rewrite left the pipeline structurally broken — in which
/// case the pipeline must be discarded.
pub fn apply(
    pipeline: &mut Pipeline,
    engine: Engine,
    strategies: &StrategySet,
) -> StrideResult<()> {
    apply_inner(pipeline, engine, strategies, false).map(|_| ())
}

/// Like [`apply`], returning a trace of every strategy application.
pub fn apply_with_trace(
    pipeline: &mut Pipeline,
    engine: Engine,
    strategies: &StrategySet,
) -> StrideResult<OptimizedReport> {
    apply_inner(pipeline, engine, strategies, true)
}

fn apply_inner(
    pipeline: &mut Pipeline,
    engine: Engine,
    strategies: &StrategySet,
    traced: bool,
) -> StrideResult<OptimizedReport> {
    pipeline.ensure_mutable()?;
    let ordered = strategies.ordered()?;
    pipeline.set_engine(engine)?;

    let mut trace = if traced { Some(Vec::new()) } else { None };
    let mut applied = 0;
    strategy::apply_tree(pipeline, engine, &ordered, &mut trace, &mut applied)?;

    PipelineValidator::check(pipeline)?;
    pipeline.freeze();

    Ok(OptimizedReport {
        strategies_applied: applied,
        trace: trace.unwrap_or_default(),
    })
}
