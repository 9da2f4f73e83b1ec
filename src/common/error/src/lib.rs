//! Error types and result aliases for Stride.
//!
//! This module provides the core error handling infrastructure shared by the
//! pipeline model and the optimizer.

mod error;

pub use error::{StrideError, StrideResult};
