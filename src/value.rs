use std::collections::HashMap;

use crate::error::ContextError;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    /// Integers above `i64::MAX`, kept exact instead of rounding to a float.
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
    /// A path that did not resolve, or an explicit JSON `null`.
    Missing,
}

static MISSING: Value = Value::Missing;

impl Value {
    /// Falsy values: empty string, `false`, zero, empty sequence, missing.
    /// Mappings are always truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) => !s.is_empty(),
            Value::Integer(n) => *n != 0,
            Value::Unsigned(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Array(a) => !a.is_empty(),
            Value::Map(_) => true,
            Value::Missing => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) | Value::Unsigned(_) | Value::Float(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Array(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Missing => "missing",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Look up `key` in a mapping. Anything else has no keys.
    pub fn get(&self, key: &str) -> &Value {
        match self {
            Value::Map(m) => m.get(key).unwrap_or(&MISSING),
            _ => &MISSING,
        }
    }

    /// Text form of a scalar; `None` for sequences and mappings.
    ///
    /// Booleans print as `true`/`false`, missing prints as the empty string
    /// and floats use the shortest form that round-trips (`3.0` prints `3`).
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(n) => Some(n.to_string()),
            Value::Unsigned(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Missing => Some(String::new()),
            Value::Array(_) | Value::Map(_) => None,
        }
    }

    /// Scalar equality used by `==` / `!=`. Integers and floats compare numerically.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            (Value::Unsigned(a), Value::Float(b)) | (Value::Float(b), Value::Unsigned(a)) => {
                (*a as f64) == *b
            }
            (Value::Integer(a), Value::Unsigned(b)) | (Value::Unsigned(b), Value::Integer(a)) => {
                i128::from(*a) == i128::from(*b)
            }
            _ => self == other,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Unsigned(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(Value::Unsigned(n), Value::Integer)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<Context> for Value {
    fn from(ctx: Context) -> Self {
        Value::Map(ctx.root)
    }
}

/// Read-only data a template is rendered against: a mapping of names to values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    root: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Context::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.root.insert(key.into(), value.into());
    }

    /// Build a context from a JSON object.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ContextError> {
        match Value::from(value) {
            Value::Map(root) => Ok(Self { root }),
            other => Err(ContextError::NotAnObject(other.kind())),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ContextError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json(value)
    }

    /// Resolve a dotted path. Any absent segment yields [`Value::Missing`].
    pub fn lookup<S: AsRef<str>>(&self, segments: &[S]) -> &Value {
        let Some((first, rest)) = segments.split_first() else {
            return &MISSING;
        };
        let mut current = self.root.get(first.as_ref()).unwrap_or(&MISSING);
        for segment in rest {
            current = current.get(segment.as_ref());
        }
        current
    }
}

impl TryFrom<serde_json::Value> for Context {
    type Error = ContextError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}
