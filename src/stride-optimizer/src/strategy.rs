//! Strategy trait and application framework.
//!
//! A strategy is a deterministic in-place rewrite of a pipeline. Strategies
//! declare ordering edges against their peers as data; the framework computes
//! one topological order per pipeline and applies each strategy exactly once
//! per pipeline level, parents before nested children.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use common_error::{StrideError, StrideResult};
use stride_pipeline::{Engine, Pipeline};

use crate::rules::{
    FilterReordering, IdentityRemoval, ProfileInjection, RangeByIsCount, RangeMerge,
    VerticesByIdFolding,
};

/// A pipeline rewrite.
///
/// Implementations must be idempotent: a second application to an already
/// rewritten pipeline is a no-op. A strategy that recognizes its pattern but
/// fails a precondition simply does not fire; that is not an error.
pub trait Strategy: Send + Sync {
    /// Stable identifier, unique within a strategy set.
    fn id(&self) -> &'static str;

    /// Check whether this strategy is legal under the given engine.
    ///
    /// Strategies that are incorrect on one engine declare the restriction
    /// here and are skipped when the tag does not match.
    fn applies_to(&self, engine: Engine) -> bool {
        let _ = engine;
        true
    }

    /// Identifiers of strategies this one must run before.
    fn run_before(&self) -> &'static [&'static str] {
        &[]
    }

    /// Identifiers of strategies this one must run after.
    fn run_after(&self) -> &'static [&'static str] {
        &[]
    }

    /// Rewrite one pipeline level in place. Returns whether anything
    /// changed. Nested child pipelines are visited by the framework, not by
    /// the strategy.
    fn apply_to(&self, pipeline: &mut Pipeline, engine: Engine) -> StrideResult<bool>;
}

/// A trace entry for a single strategy application.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    /// Identifier of the strategy that ran.
    pub strategy: String,
    /// The pipeline before the strategy ran (as explain string).
    pub before: String,
    /// The pipeline after the strategy ran (as explain string).
    pub after: String,
    /// Whether the strategy changed the pipeline.
    pub changed: bool,
}

/// The result of an `apply_with_trace` invocation.
#[derive(Debug, Clone, Default)]
pub struct OptimizedReport {
    /// Number of strategy applications that changed the pipeline.
    pub strategies_applied: usize,
    /// Detailed trace of strategy applications.
    pub trace: Vec<RuleTrace>,
}

impl OptimizedReport {
    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Optimization applied {} strategies\n",
            self.strategies_applied
        ));

        for entry in self.trace.iter().filter(|t| t.changed) {
            output.push_str(&format!("\n--- {} ---\n", entry.strategy));
            output.push_str("Before:\n");
            output.push_str(&entry.before);
            output.push_str("After:\n");
            output.push_str(&entry.after);
        }

        output
    }
}

/// An ordered catalog of strategies.
#[derive(Clone, Default)]
pub struct StrategySet {
    strategies: Vec<Arc<dyn Strategy>>,
}

impl StrategySet {
    /// Create an empty strategy set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full catalog of built-in rewrite rules.
    pub fn standard() -> Self {
        Self::new()
            .with(Arc::new(IdentityRemoval))
            .with(Arc::new(RangeByIsCount))
            .with(Arc::new(RangeMerge))
            .with(Arc::new(FilterReordering))
            .with(Arc::new(ProfileInjection))
            .with(Arc::new(VerticesByIdFolding))
    }

    /// Add a strategy (builder form). Re-adding an identifier replaces the
    /// previous registration.
    pub fn with(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategies.retain(|s| s.id() != strategy.id());
        self.strategies.push(strategy);
        self
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Look up a strategy by identifier.
    pub fn get(&self, id: &str) -> StrideResult<&Arc<dyn Strategy>> {
        self.strategies
            .iter()
            .find(|s| s.id() == id)
            .ok_or_else(|| StrideError::configuration(format!("unknown strategy '{id}'")))
    }

    /// Restrict the set to the given identifiers, keeping their ordering
    /// edges. Unknown identifiers fail with `Configuration`.
    pub fn select(&self, ids: &[&str]) -> StrideResult<Self> {
        let mut selected = Self::new();
        for id in ids {
            selected = selected.with(Arc::clone(self.get(id)?));
        }
        Ok(selected)
    }

    /// Compute the application order from the declared before/after edges.
    ///
    /// Edges referencing identifiers not in the set only constrain when that
    /// peer is present. Cycles fail with `Configuration`; ties are broken by
    /// identifier so the order is deterministic.
    pub fn ordered(&self) -> StrideResult<Vec<Arc<dyn Strategy>>> {
        // id -> indegree, id -> successors
        let mut indegree: BTreeMap<&str, usize> =
            self.strategies.iter().map(|s| (s.id(), 0)).collect();
        let mut successors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        let registered: Vec<&str> = indegree.keys().copied().collect();
        let mut add_edge = |from: &'static str, to: &'static str| {
            // An edge only constrains when both endpoints are registered.
            if !registered.contains(&from) {
                return;
            }
            if let Some(d) = indegree.get_mut(to) {
                successors.entry(from).or_default().push(to);
                *d += 1;
            }
        };
        for strategy in &self.strategies {
            for before in strategy.run_before() {
                add_edge(strategy.id(), *before);
            }
            for after in strategy.run_after() {
                add_edge(*after, strategy.id());
            }
        }

        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.strategies.len());

        while let Some(id) = ready.first().copied() {
            ready.remove(0);
            order.push(id);
            for next in successors.remove(id).unwrap_or_default() {
                let d = indegree
                    .get_mut(next)
                    .ok_or_else(|| StrideError::internal("edge to unregistered strategy"))?;
                *d -= 1;
                if *d == 0 {
                    // Keep the ready list sorted for deterministic ties.
                    let at = ready.partition_point(|r| *r < next);
                    ready.insert(at, next);
                }
            }
        }

        if order.len() != self.strategies.len() {
            let stuck: Vec<&str> = self
                .strategies
                .iter()
                .map(|s| s.id())
                .filter(|id| !order.contains(id))
                .collect();
            return Err(StrideError::configuration(format!(
                "strategy ordering cycle among: {}",
                stuck.join(", ")
            )));
        }

        Ok(order
            .into_iter()
            .map(|id| {
                Arc::clone(
                    self.strategies
                        .iter()
                        .find(|s| s.id() == id)
                        .expect("ordered ids come from the set"),
                )
            })
            .collect())
    }
}

impl std::fmt::Debug for StrategySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.id()))
            .finish()
    }
}

/// The process-wide default strategy catalog, assembled once.
pub fn default_strategies() -> &'static StrategySet {
    static DEFAULT: OnceLock<StrategySet> = OnceLock::new();
    DEFAULT.get_or_init(StrategySet::standard)
}

/// Apply the ordered strategies to a pipeline level, then to its nested
/// children, depth-first.
pub(crate) fn apply_tree(
    pipeline: &mut Pipeline,
    engine: Engine,
    ordered: &[Arc<dyn Strategy>],
    trace: &mut Option<Vec<RuleTrace>>,
    applied: &mut usize,
) -> StrideResult<()> {
    for strategy in ordered {
        if !strategy.applies_to(engine) {
            tracing::trace!(
                strategy = strategy.id(),
                %engine,
                "strategy restricted to another engine, skipped"
            );
            continue;
        }

        let before = trace.as_ref().map(|_| pipeline.explain());
        let changed = strategy.apply_to(pipeline, engine)?;
        tracing::debug!(strategy = strategy.id(), %engine, changed, "strategy ran");

        if changed {
            *applied += 1;
        }
        if let Some(entries) = trace.as_mut() {
            entries.push(RuleTrace {
                strategy: strategy.id().to_string(),
                before: before.unwrap_or_default(),
                after: pipeline.explain(),
                changed,
            });
        }
    }

    // Parent rewrites may have added or removed children; visit what is
    // there now.
    let step_ids: Vec<_> = pipeline.steps().iter().map(|s| s.id()).collect();
    for id in step_ids {
        let child_count = match pipeline.step(id) {
            Some(step) => step.children().len(),
            None => continue,
        };
        for child_index in 0..child_count {
            let step = pipeline.step_mut(id)?;
            let mut child = std::mem::take(&mut step.children_mut()[child_index]);
            let result = apply_tree(&mut child, engine, ordered, trace, applied);
            pipeline.step_mut(id)?.children_mut()[child_index] = child;
            result?;
        }
    }

    Ok(())
}
