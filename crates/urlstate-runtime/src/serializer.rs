//! Serializer pairs and the tag-keyed serializer table.
//!
//! A [`Serializer`] is a matched `serialize`/`deserialize` pair forming a
//! round-trip contract: `deserialize(serialize(v))` must be observably
//! equivalent to `v` for every value the field takes. The contract is not
//! checked; caller-supplied pairs are trusted.
//!
//! # Resolution
//!
//! [`SerializerRegistry::resolve`] returns:
//! 1. the built-in primitive serializer for strings, numbers and booleans;
//! 2. otherwise the first registered entry whose tag equals the value's tag;
//! 3. otherwise `None`, which is not an error by itself.
//!
//! The built-in primitive serializer writes the value's text form and reads
//! every parameter back as a string. Turning `"7"` back into a number is the
//! store's job (see [`ObservableStore`](urlstate_core::ObservableStore)).

use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use urlstate_core::{DeserializeError, TaggedValue, TypeTag, Value};

/// Value to query-parameter text. Must be total over the field's domain.
pub type SerializeFn = Rc<dyn Fn(&Value) -> String>;

/// Query-parameter text back to a value.
pub type DeserializeFn = Rc<dyn Fn(&str) -> Result<Value, DeserializeError>>;

/// A matched serialize/deserialize pair.
#[derive(Clone)]
pub struct Serializer {
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl Serializer {
    /// Build a pair from two closures.
    pub fn new(
        serialize: impl Fn(&Value) -> String + 'static,
        deserialize: impl Fn(&str) -> Result<Value, DeserializeError> + 'static,
    ) -> Self {
        Self {
            serialize: Rc::new(serialize),
            deserialize: Rc::new(deserialize),
        }
    }

    /// Build a pair from shared halves.
    #[must_use]
    pub fn from_parts(serialize: SerializeFn, deserialize: DeserializeFn) -> Self {
        Self {
            serialize,
            deserialize,
        }
    }

    /// Built-in serializer for strings, numbers and booleans.
    #[must_use]
    pub fn primitive() -> Self {
        Self::new(Value::to_query_string, |raw| Ok(Value::Str(raw.to_owned())))
    }

    /// Compact JSON of a tagged payload; reads any JSON document back under `tag`.
    #[must_use]
    pub fn json(tag: impl Into<TypeTag>) -> Self {
        let tag = tag.into();
        Self::new(Value::to_query_string, move |raw| {
            serde_json::from_str::<serde_json::Value>(raw)
                .map(|payload| Value::Tagged(TaggedValue::new(tag.clone(), payload)))
                .map_err(|e| DeserializeError::new(raw, e.to_string()))
        })
    }

    /// Like [`Serializer::json`], but only accepts documents that decode as `T`.
    #[must_use]
    pub fn serde<T>(tag: impl Into<TypeTag>) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        let tag = tag.into();
        Self::new(Value::to_query_string, move |raw| {
            let invalid = |e: serde_json::Error| DeserializeError::new(raw, e.to_string());
            let decoded: T = serde_json::from_str(raw).map_err(invalid)?;
            Value::tagged(tag.clone(), &decoded).map_err(invalid)
        })
    }

    /// Serialize `value`.
    #[must_use]
    pub fn serialize(&self, value: &Value) -> String {
        (self.serialize)(value)
    }

    /// Deserialize `raw`.
    pub fn deserialize(&self, raw: &str) -> Result<Value, DeserializeError> {
        (self.deserialize)(raw)
    }

    #[must_use]
    pub fn serialize_fn(&self) -> SerializeFn {
        Rc::clone(&self.serialize)
    }

    #[must_use]
    pub fn deserialize_fn(&self) -> DeserializeFn {
        Rc::clone(&self.deserialize)
    }
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer").finish_non_exhaustive()
    }
}

/// Ordered table of serializers for tagged values.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    entries: Vec<(TypeTag, Serializer)>,
}

impl SerializerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, tag: impl Into<TypeTag>, serializer: Serializer) -> Self {
        self.register(tag, serializer);
        self
    }

    /// Append an entry. Earlier entries win on lookup.
    pub fn register(&mut self, tag: impl Into<TypeTag>, serializer: Serializer) {
        self.entries.push((tag.into(), serializer));
    }

    /// Resolve a serializer for `value`.
    #[must_use]
    pub fn resolve(&self, value: &Value) -> Option<Serializer> {
        match value {
            Value::Tagged(tagged) => self
                .entries
                .iter()
                .find(|(tag, _)| *tag == tagged.tag)
                .map(|(_, serializer)| serializer.clone()),
            _ => Some(Serializer::primitive()),
        }
    }

    /// Registered tags in lookup order.
    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.entries.iter().map(|(tag, _)| tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("tags", &self.tags().collect::<Vec<_>>())
            .finish()
    }
}
