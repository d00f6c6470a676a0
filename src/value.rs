//! Script value representation
//!
//! The core `Value` type and the pure coercions between value kinds. Coercions
//! that need the object heap (`ToObject`, `ToFunction`, class-aware `ToString`)
//! live on [`crate::Vm`].

use std::fmt;
use std::rc::Rc;

use crate::gc::ObjectId;
use crate::prelude::math;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// This makes it explicit when a clone is cheap (just incrementing a reference
/// count) vs when it might copy data.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A runtime value.
///
/// Objects are referenced by [`ObjectId`]; two `Object` values are equal only
/// when they reference the same object.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Integer(i32),
    Float(f64),
    String(AsString),
    Object(ObjectId),
}

impl CheapClone for Value {}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Value::Object(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Kind name for diagnostics. Functions report as "object" here; use
    /// `Vm::type_of` for the callable-aware answer.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Convert to a float (ToFloat)
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Integer(n) => f64::from(*n),
            Value::Float(n) => *n,
            Value::String(s) => parse_number(s.as_str()),
            Value::Object(_) => f64::NAN,
        }
    }

    /// Convert to a 32-bit integer (ToInteger).
    ///
    /// Floats truncate toward zero, NaN becomes 0 and out-of-range values
    /// saturate at the `i32` bounds.
    pub fn to_integer(&self) -> i32 {
        match self {
            Value::Integer(n) => *n,
            Value::Boolean(b) => i32::from(*b),
            other => float_to_integer(other.to_float()),
        }
    }

    /// Convert to string (ToString). Objects format generically; class-aware
    /// formatting goes through `Vm::to_display_string`.
    pub fn to_as_string(&self) -> AsString {
        match self {
            Value::Undefined => AsString::from("undefined"),
            Value::Null => AsString::from("null"),
            Value::Boolean(true) => AsString::from("true"),
            Value::Boolean(false) => AsString::from("false"),
            Value::Integer(n) => AsString::from(n.to_string()),
            Value::Float(n) => AsString::from(format_float(*n)),
            Value::String(s) => s.cheap_clone(),
            Value::Object(_) => AsString::from("[object Object]"),
        }
    }

    /// Equality: primitives by value, objects by identity.
    ///
    /// Integers and floats compare numerically; NaN is never equal to anything.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.to_float() == other.to_float()
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// Truncate toward zero, mapping NaN to 0 and saturating at the `i32` bounds.
pub fn float_to_integer(n: f64) -> i32 {
    if n.is_nan() {
        return 0;
    }
    // `as` saturates on overflow
    math::trunc(n) as i32
}

/// Parse a numeric string: decimal or `0x` hexadecimal, surrounding whitespace ignored.
pub fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return match i64::from_str_radix(hex, 16) {
            Ok(n) if negative => -(n as f64),
            Ok(n) => n as f64,
            Err(_) => f64::NAN,
        };
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Format a float the way scripts print numbers: integral values without a
/// fractional part, the special names for NaN and the infinities, and
/// exponent form (`1e+21`, `1.5e-7`) outside [1e-6, 1e21).
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{:e}", n);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{}e+{}", mantissa, exponent)
            }
            _ => formatted,
        }
    } else {
        n.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", format_float(*n)),
            Value::String(s) => write!(f, "\"{}\"", s.as_str()),
            Value::Object(id) => write!(f, "[object {:?}]", id),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

// Conversions from Rust types

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(AsString::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(AsString::from(s))
    }
}

impl From<AsString> for Value {
    fn from(s: AsString) -> Self {
        Value::String(s)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(id)
    }
}

/// Reference-counted immutable string
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsString(Rc<str>);

impl CheapClone for AsString {}

impl AsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in characters, as scripts observe it
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl AsRef<str> for AsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for AsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for AsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for AsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for AsString {
    fn from(s: &str) -> Self {
        AsString(s.into())
    }
}

impl From<String> for AsString {
    fn from(s: String) -> Self {
        AsString(s.into())
    }
}

impl fmt::Debug for AsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for AsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<&str> for AsString {
    type Output = AsString;

    fn add(self, other: &str) -> AsString {
        let mut s = String::from(&*self.0);
        s.push_str(other);
        AsString::from(s)
    }
}
