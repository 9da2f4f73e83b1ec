//! Pipeline intermediate representation for Stride traversals.
//!
//! `stride-pipeline` provides the shared data model the optimizer rewrites:
//!
//! - **Step catalog**: the tagged step variants with their semantic
//!   attributes (barrier, filter, side effects, requirements)
//! - **Pipeline**: an arena of ordered steps with stable identities,
//!   nested child pipelines, an engine tag, and a freeze lifecycle
//! - **Helper**: structural queries and invariant-preserving edits
//! - **Validation**: wholesale checks of the structural invariants
//! - **Builder**: fluent construction for clients and tests
//!
//! # Example
//!
//! ```rust
//! use stride_core::Predicate;
//! use stride_pipeline::PipelineBuilder;
//!
//! let pipeline = PipelineBuilder::vertices()
//!     .out(["created"])
//!     .count()
//!     .is(Predicate::eq(0i64))
//!     .build();
//!
//! println!("{}", pipeline.explain());
//! ```

mod builder;
mod engine;
mod helper;
mod pipeline;
mod step;
pub mod validation;

pub use builder::PipelineBuilder;
pub use engine::Engine;
pub use helper::PipelineHelper;
pub use pipeline::{Pipeline, PipelineState};
pub use step::{
    HasContainer, Requirement, RequirementSet, Step, StepId, StepKind, StepTag, KEY_ID,
};
pub use validation::{PipelineValidator, ValidationError};

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::Predicate;

    #[test]
    fn test_construct_validate_freeze() {
        let mut pipeline = PipelineBuilder::vertices()
            .out(["knows"])
            .count()
            .is(Predicate::gt(2i64))
            .build();

        assert!(PipelineValidator::validate(&pipeline).is_ok());

        pipeline.set_engine(Engine::Standard).unwrap();
        pipeline.freeze();
        assert!(pipeline.is_frozen());
        assert_eq!(pipeline.engine(), Some(Engine::Standard));
    }

    #[test]
    fn test_requirements_aggregate_at_root() {
        let body = PipelineBuilder::new().group_count().build();
        let pipeline = PipelineBuilder::vertices().has_traversal(body).build();

        let reqs = pipeline.requirements();
        assert!(reqs.contains(Requirement::SideEffects));
    }
}
