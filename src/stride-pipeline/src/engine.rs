//! Execution engine tag.

use serde::{Deserialize, Serialize};

/// Class of execution backend a pipeline is optimized for.
///
/// The tag is the only engine information a rewrite rule may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    /// Single-machine, in-process iteration.
    Standard,
    /// Bulk, partitioned iteration over vertex programs.
    Computer,
}

impl Engine {
    /// Both engine tags, in declaration order.
    pub const ALL: [Self; 2] = [Self::Standard, Self::Computer];
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "STANDARD"),
            Self::Computer => write!(f, "COMPUTER"),
        }
    }
}
