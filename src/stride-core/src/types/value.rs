//! Runtime value representation.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Kind of graph element an [`ElementRef`] points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// A vertex.
    Vertex,
    /// An edge.
    Edge,
}

/// Opaque identity of a graph element.
///
/// The optimizer only compares element references; it never inspects the
/// element itself. The graph layer owns the actual elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Kind of the referenced element.
    pub kind: ElementKind,
    /// Identity within the graph layer.
    pub id: u64,
}

impl ElementRef {
    /// Create a vertex reference.
    pub fn vertex(id: u64) -> Self {
        Self {
            kind: ElementKind::Vertex,
            id,
        }
    }

    /// Create an edge reference.
    pub fn edge(id: u64) -> Self {
        Self {
            kind: ElementKind::Edge,
            id,
        }
    }
}

/// Comparable runtime value.
///
/// Values are totally ordered: variants compare by a fixed type rank, values
/// within a variant by natural order. `Int64` and `Float64` share a rank and
/// compare numerically against each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Opaque graph-element identity.
    Element(ElementRef),
    /// Finite ordered sequence of values.
    List(Vec<Self>),
}

impl Value {
    /// Try to get as i64.
    pub const fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub const fn as_float64(&self) -> Option<f64> {
        match self {
            Self::Float64(f) => Some(*f),
            Self::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a list slice.
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    /// Interpret this value as an exact integer count.
    ///
    /// Count-derived rewrites only apply to values that represent an exact
    /// integer. Integral floats qualify; everything else does not. The sign
    /// is preserved so callers can reject negative bounds themselves.
    pub fn as_count(&self) -> Option<i64> {
        match self {
            Self::Int64(i) => Some(*i),
            Self::Float64(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Check if this value is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int64(_) | Self::Float64(_))
    }

    /// Get the type name for error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::Int64(_) => "Int64",
            Self::Float64(_) => "Float64",
            Self::String(_) => "String",
            Self::Element(_) => "Element",
            Self::List(_) => "List",
        }
    }

    /// Rank used to order values of different types.
    const fn type_rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Int64(_) | Self::Float64(_) => 1,
            Self::String(_) => 2,
            Self::Element(_) => 3,
            Self::List(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int64(a), Self::Int64(b)) => a.cmp(b),
            (Self::Float64(a), Self::Float64(b)) => a.total_cmp(b),
            (Self::Int64(a), Self::Float64(b)) => (*a as f64).total_cmp(b),
            (Self::Float64(a), Self::Int64(b)) => a.total_cmp(&(*b as f64)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Element(a), Self::Element(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Float64(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Element(e) => write!(f, "{:?}#{}", e.kind, e.id),
            Self::List(vs) => {
                write!(f, "[")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int64(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int64(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float64(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<ElementRef> for Value {
    fn from(e: ElementRef) -> Self {
        Self::Element(e)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}
