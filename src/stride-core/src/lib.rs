//! Core data model for the Stride traversal machine.
//!
//! This crate provides the fundamental types shared by the pipeline model and
//! the optimizer:
//! - `Value` for comparable runtime data
//! - `Predicate` for the closed set of comparison predicates
//! - `ElementRef` for opaque graph-element identities

pub mod types;

// Re-export commonly used types
pub use types::{ElementKind, ElementRef, OpaquePredicate, Predicate, Value};
