//! Comparison predicates over runtime values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::Value;

/// Handle for a user-supplied predicate the optimizer cannot inspect.
///
/// Opaque predicates are compared for identity only and are never
/// pattern-matched by rewrite rules. Evaluation happens in the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpaquePredicate {
    id: u64,
    name: String,
}

impl OpaquePredicate {
    /// Register a new opaque predicate under a diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
        }
    }

    /// Get the diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the identity of this predicate.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for OpaquePredicate {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaquePredicate {}

/// A comparison predicate carried by `is` and `has` steps.
///
/// The set is closed: rewrite rules pattern-match these variants and treat
/// [`Predicate::Opaque`] as a black box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Equal to the value.
    Eq(Value),
    /// Not equal to the value.
    Neq(Value),
    /// Strictly less than the value.
    Lt(Value),
    /// Less than or equal to the value.
    Lte(Value),
    /// Strictly greater than the value.
    Gt(Value),
    /// Greater than or equal to the value.
    Gte(Value),
    /// Strictly between the two bounds.
    Inside(Value, Value),
    /// Strictly outside the two bounds.
    Outside(Value, Value),
    /// Member of the finite set.
    Within(Vec<Value>),
    /// Not a member of the finite set.
    Without(Vec<Value>),
    /// User-supplied predicate; no rewrite assumed.
    Opaque(OpaquePredicate),
}

impl Predicate {
    /// `eq` predicate.
    pub fn eq(value: impl Into<Value>) -> Self {
        Self::Eq(value.into())
    }

    /// `neq` predicate.
    pub fn neq(value: impl Into<Value>) -> Self {
        Self::Neq(value.into())
    }

    /// `lt` predicate.
    pub fn lt(value: impl Into<Value>) -> Self {
        Self::Lt(value.into())
    }

    /// `lte` predicate.
    pub fn lte(value: impl Into<Value>) -> Self {
        Self::Lte(value.into())
    }

    /// `gt` predicate.
    pub fn gt(value: impl Into<Value>) -> Self {
        Self::Gt(value.into())
    }

    /// `gte` predicate.
    pub fn gte(value: impl Into<Value>) -> Self {
        Self::Gte(value.into())
    }

    /// `inside` predicate, strict on both sides.
    pub fn inside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Inside(low.into(), high.into())
    }

    /// `outside` predicate, strict on both sides.
    pub fn outside(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Outside(low.into(), high.into())
    }

    /// `within` predicate over a finite set.
    pub fn within<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Within(values.into_iter().map(Into::into).collect())
    }

    /// `without` predicate over a finite set.
    pub fn without<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Without(values.into_iter().map(Into::into).collect())
    }

    /// Wrap a user-supplied predicate.
    pub fn opaque(name: impl Into<String>) -> Self {
        Self::Opaque(OpaquePredicate::new(name))
    }

    /// Check if this is a user-supplied predicate.
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// Get the predicate tag for display and serialization diagnostics.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Eq(_) => "eq",
            Self::Neq(_) => "neq",
            Self::Lt(_) => "lt",
            Self::Lte(_) => "lte",
            Self::Gt(_) => "gt",
            Self::Gte(_) => "gte",
            Self::Inside(_, _) => "inside",
            Self::Outside(_, _) => "outside",
            Self::Within(_) => "within",
            Self::Without(_) => "without",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Evaluate the predicate against a value.
    ///
    /// Opaque predicates are executor-evaluated; here they test `false` so a
    /// caller cannot accidentally treat them as decidable.
    pub fn test(&self, value: &Value) -> bool {
        match self {
            Self::Eq(v) => value == v,
            Self::Neq(v) => value != v,
            Self::Lt(v) => value < v,
            Self::Lte(v) => value <= v,
            Self::Gt(v) => value > v,
            Self::Gte(v) => value >= v,
            Self::Inside(lo, hi) => value > lo && value < hi,
            Self::Outside(lo, hi) => value < lo || value > hi,
            Self::Within(set) => set.contains(value),
            Self::Without(set) => !set.contains(value),
            Self::Opaque(_) => false,
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eq(v)
            | Self::Neq(v)
            | Self::Lt(v)
            | Self::Lte(v)
            | Self::Gt(v)
            | Self::Gte(v) => write!(f, "{}({})", self.tag(), v),
            Self::Inside(lo, hi) | Self::Outside(lo, hi) => {
                write!(f, "{}({}, {})", self.tag(), lo, hi)
            }
            Self::Within(set) | Self::Without(set) => {
                write!(f, "{}({})", self.tag(), Value::List(set.clone()))
            }
            Self::Opaque(p) => write!(f, "opaque({})", p.name()),
        }
    }
}
