//! The value domain synchronized between stores and query strings.
//!
//! Values are either one of three primitives (string, number, boolean) or a
//! [`TaggedValue`]: an arbitrary serde-representable payload carrying an
//! explicit [`TypeTag`]. Serializer dispatch for complex values is keyed by
//! that tag, never by runtime type identity.
//!
//! # Primitive text form
//!
//! | Value | Text |
//! |-------|------|
//! | `Str(s)` | `s` verbatim |
//! | `Bool(b)` | `true` / `false` |
//! | `Number(n)` integral | `5`, `-12` (no fractional part) |
//! | `Number(n)` fractional | shortest round-trip decimal, e.g. `0.1` |
//! | `Number(NaN)` / `±inf` | `NaN`, `Infinity`, `-Infinity` |
//!
//! [`parse_number`] accepts everything [`format_number`] produces, so the
//! primitive text form round-trips exactly for every `f64` except the sign of
//! negative zero.

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Explicit type tag naming the kind of a complex value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// Create a tag from a static or owned name.
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Create a tag from a static name in const context.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The tag name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// A complex value: a JSON-shaped payload plus the tag that selects its serializer.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedValue {
    pub tag: TypeTag,
    pub payload: serde_json::Value,
}

impl TaggedValue {
    /// Wrap an already-built payload.
    #[must_use]
    pub fn new(tag: impl Into<TypeTag>, payload: serde_json::Value) -> Self {
        Self {
            tag: tag.into(),
            payload,
        }
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Coarse classification of a [`Value`], used in diagnostics and coercion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Str,
    Number,
    Bool,
    Tagged(TypeTag),
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Bool => write!(f, "boolean"),
            Self::Tagged(tag) => write!(f, "tagged value `{tag}`"),
        }
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Number(f64),
    Bool(bool),
    Tagged(TaggedValue),
}

impl Value {
    /// Build a tagged value by serializing `value` into a JSON payload.
    pub fn tagged<T: Serialize + ?Sized>(
        tag: impl Into<TypeTag>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::Tagged(TaggedValue::new(tag, serde_json::to_value(value)?)))
    }

    /// The kind of this value.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Str(_) => ValueKind::Str,
            Self::Number(_) => ValueKind::Number,
            Self::Bool(_) => ValueKind::Bool,
            Self::Tagged(t) => ValueKind::Tagged(t.tag.clone()),
        }
    }

    /// Whether the value is a string, number or boolean.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Self::Tagged(_))
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_tagged(&self) -> Option<&TaggedValue> {
        match self {
            Self::Tagged(t) => Some(t),
            _ => None,
        }
    }

    /// Text form of the value.
    ///
    /// Primitives use the table in the module docs; tagged values render as
    /// compact JSON of their payload.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Tagged(t) => t.payload.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<TaggedValue> for Value {
    fn from(t: TaggedValue) -> Self {
        Self::Tagged(t)
    }
}

/// Render a number in its primitive text form.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_owned()
    } else if n == 0.0 {
        // Collapse -0.
        "0".to_owned()
    } else {
        n.to_string()
    }
}

/// Parse the primitive text form of a number.
#[must_use]
pub fn parse_number(raw: &str) -> Option<f64> {
    match raw {
        "NaN" => Some(f64::NAN),
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => {
            let body = raw.strip_prefix(['+', '-']).unwrap_or(raw);
            // Rust also accepts "inf"/"nan" spellings; the text form does not.
            if body.is_empty() || !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
                return None;
            }
            raw.parse().ok()
        }
    }
}

/// Parse the primitive text form of a boolean.
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
