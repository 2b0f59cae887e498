// src/value.rs - Process values carried on the signal bus
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process value stored on the signal bus
///
/// Digital alarms observe `Bool` signals and analog alarms observe `Float`
/// signals; conversions between the two follow the usual PLC conventions.
///
/// # Examples
///
/// ```rust
/// use alarmon::Value;
///
/// let input = Value::Bool(true);
/// let level = Value::Float(0.45);
///
/// assert_eq!(input.as_float(), Some(1.0));
/// assert_eq!(level.as_bool(), Some(true));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Floating-point value (64-bit)
    Float(f64),
}

/// Value type enumeration for type checking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Float,
}

impl Value {
    /// Convert to boolean if possible
    ///
    /// NaN never converts.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(*f != 0.0),
        }
    }

    /// Convert to float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
        }
    }

    /// Get the ValueType for this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Float(_) => ValueType::Float,
        }
    }

    /// Default value for a signal of the given type
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Bool => Value::Bool(false),
            ValueType::Float => Value::Float(0.0),
        }
    }
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Float => "float",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
