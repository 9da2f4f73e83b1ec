//! Stride - graph-traversal pipeline IR and rewrite-based optimizer
//!
//! Stride models traversal queries as pipelines of steps and rewrites them
//! into semantically equivalent but cheaper pipelines before handing them to
//! an execution engine.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_error as error;
pub use stride_core as core;
pub use stride_optimizer as optimizer;
pub use stride_pipeline as pipeline;

/// Stride version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
