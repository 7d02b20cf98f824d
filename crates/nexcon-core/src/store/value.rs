use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Wire token for "no further transform" in a depends_on value
pub const ORIGIN_SENTINEL: &str = ".";

/// Typed depends_on pointer
///
/// Holds a node id rather than a path so that renaming or moving the target
/// never invalidates the reference. The wire form is `"."` or the target's
/// absolute path, produced by [`super::Store::wire_form`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependsOn {
    /// Already at the origin
    #[default]
    Origin,
    /// Next transform nearer the origin
    Node(NodeId),
}

impl DependsOn {
    pub fn target(&self) -> Option<NodeId> {
        match self {
            DependsOn::Origin => None,
            DependsOn::Node(id) => Some(*id),
        }
    }

    pub fn is_origin(&self) -> bool {
        matches!(self, DependsOn::Origin)
    }
}

impl From<Option<NodeId>> for DependsOn {
    fn from(target: Option<NodeId>) -> Self {
        target.map_or(DependsOn::Origin, DependsOn::Node)
    }
}

/// A typed value held by a dataset or an attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Float(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    FloatArray(Vec<f64>),
    IntArray(Vec<i64>),
    StrArray(Vec<String>),
    Reference(DependsOn),
}

impl Value {
    /// Numeric value widened to f64 (ints included)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f64]> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<DependsOn> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Name of the type as it appears in exported structures
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Float(_) | Value::FloatArray(_) => "double",
            Value::Int(_) | Value::IntArray(_) => "int64",
            Value::Bool(_) => "bool",
            Value::Str(_) | Value::StrArray(_) | Value::Reference(_) => "string",
        }
    }

    /// Number of elements for array values, `None` for scalars
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::FloatArray(v) => Some(v.len()),
            Value::IntArray(v) => Some(v.len()),
            Value::StrArray(v) => Some(v.len()),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatArray(v)
    }
}

impl From<DependsOn> for Value {
    fn from(v: DependsOn) -> Self {
        Value::Reference(v)
    }
}
