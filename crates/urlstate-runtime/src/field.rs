//! Field bindings and the registry that owns them.
//!
//! A [`FieldEntry`] binds one store property to one query parameter together
//! with its serializer pair and default value. [`FieldRegistry`] keeps the
//! entries in registration order, indexed by query parameter.
//!
//! # Invariants
//!
//! 1. A query parameter maps to at most one entry.
//! 2. `default_text` is always `serializer.serialize(default_value)`.
//! 3. Entries hold their store weakly; the engine never keeps a store alive.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Duplicate parameter | Key already bound | `SyncError::DuplicateParameter`, registry unchanged |
//! | No serializer | Tagged default with no entry and no explicit pair | `SyncError::MissingSerializer` |
//! | No default | No explicit default, property undefined | `SyncError::MissingProperty` |
//! | Store dropped | Host released the store | Entry contributes no parameter |

use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use urlstate_core::{DeserializeError, PropertyStore, Subscription, Value};

use crate::error::{Result, SyncError};
use crate::serializer::{DeserializeFn, SerializeFn, Serializer, SerializerRegistry};

/// Optional per-field settings for [`SyncEngine::register`](crate::SyncEngine::register).
#[derive(Clone, Default)]
pub struct FieldOptions {
    default_value: Option<Value>,
    serialize: Option<SerializeFn>,
    deserialize: Option<DeserializeFn>,
}

impl FieldOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value whose serialization makes the parameter absent. Defaults to the
    /// property's value at registration time.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_serialize(mut self, f: impl Fn(&Value) -> String + 'static) -> Self {
        self.serialize = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn with_deserialize(
        mut self,
        f: impl Fn(&str) -> std::result::Result<Value, DeserializeError> + 'static,
    ) -> Self {
        self.deserialize = Some(Rc::new(f));
        self
    }

    /// Supply both halves at once.
    #[must_use]
    pub fn with_serializer(mut self, serializer: &Serializer) -> Self {
        self.serialize = Some(serializer.serialize_fn());
        self.deserialize = Some(serializer.deserialize_fn());
        self
    }
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("default_value", &self.default_value)
            .field("serialize", &self.serialize.is_some())
            .field("deserialize", &self.deserialize.is_some())
            .finish()
    }
}

/// One registered binding.
pub struct FieldEntry {
    store: Weak<dyn PropertyStore>,
    property: String,
    query_param: String,
    default_value: Value,
    default_text: String,
    serializer: Serializer,
    subscription: Option<Subscription>,
}

impl FieldEntry {
    /// Resolve default value and serializer pair for a new binding.
    ///
    /// Without an explicit default, the property's current value is used.
    pub fn resolve(
        store: &Rc<dyn PropertyStore>,
        property: &str,
        query_param: &str,
        options: FieldOptions,
        serializers: &SerializerRegistry,
    ) -> Result<Self> {
        let FieldOptions {
            default_value,
            serialize,
            deserialize,
        } = options;
        let default_value = default_value
            .or_else(|| store.get(property))
            .ok_or_else(|| SyncError::MissingProperty {
                property: property.to_owned(),
            })?;

        let serializer = match (serialize, deserialize) {
            (Some(s), Some(d)) => Serializer::from_parts(s, d),
            (s, d) => {
                let resolved = serializers.resolve(&default_value);
                let s = s.or_else(|| resolved.as_ref().map(Serializer::serialize_fn));
                let d = d.or_else(|| resolved.as_ref().map(Serializer::deserialize_fn));
                match (s, d) {
                    (Some(s), Some(d)) => Serializer::from_parts(s, d),
                    _ => {
                        return Err(SyncError::MissingSerializer {
                            property: property.to_owned(),
                            kind: default_value.kind(),
                        });
                    }
                }
            }
        };

        let default_text = serializer.serialize(&default_value);
        Ok(Self {
            store: Rc::downgrade(store),
            property: property.to_owned(),
            query_param: query_param.to_owned(),
            default_value,
            default_text,
            serializer,
            subscription: None,
        })
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    #[must_use]
    pub fn query_param(&self) -> &str {
        &self.query_param
    }

    #[must_use]
    pub fn default_value(&self) -> &Value {
        &self.default_value
    }

    /// Serialized default; a parameter with this text is elided.
    #[must_use]
    pub fn default_text(&self) -> &str {
        &self.default_text
    }

    #[must_use]
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// The bound store, if still alive.
    #[must_use]
    pub fn store(&self) -> Option<Rc<dyn PropertyStore>> {
        self.store.upgrade()
    }

    /// Current property value, if the store is alive and defines it.
    #[must_use]
    pub fn current_value(&self) -> Option<Value> {
        self.store()?.get(&self.property)
    }

    /// Serialized current value.
    #[must_use]
    pub fn current_text(&self) -> Option<String> {
        self.current_value().map(|v| self.serializer.serialize(&v))
    }

    /// The parameter this entry contributes to the URL, or `None` when the
    /// value is at its default (or unavailable).
    #[must_use]
    pub fn desired_param(&self) -> Option<(&str, String)> {
        let text = self.current_text()?;
        (text != self.default_text).then_some((self.query_param.as_str(), text))
    }

    pub(crate) fn attach(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl fmt::Debug for FieldEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEntry")
            .field("property", &self.property)
            .field("query_param", &self.query_param)
            .field("default_text", &self.default_text)
            .field("store_alive", &(self.store.strong_count() > 0))
            .field("observed", &self.is_observed())
            .finish()
    }
}

/// Entries in registration order, indexed by query parameter.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    entries: Vec<FieldEntry>,
    index: AHashMap<String, usize>,
}

impl FieldRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, query_param: &str) -> bool {
        self.index.contains_key(query_param)
    }

    #[must_use]
    pub fn get(&self, query_param: &str) -> Option<&FieldEntry> {
        self.index.get(query_param).map(|&i| &self.entries[i])
    }

    /// Fail with `DuplicateParameter` if `query_param` is taken.
    pub fn ensure_free(&self, query_param: &str) -> Result<()> {
        match self.get(query_param) {
            Some(existing) => Err(SyncError::DuplicateParameter {
                param: query_param.to_owned(),
                property: existing.property.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Add an entry; the registry is unchanged on error.
    pub fn insert(&mut self, entry: FieldEntry) -> Result<()> {
        self.ensure_free(&entry.query_param)?;
        self.index
            .insert(entry.query_param.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Remove and return the entry bound to `query_param`.
    pub fn remove(&mut self, query_param: &str) -> Option<FieldEntry> {
        let idx = self.index.remove(query_param)?;
        let entry = self.entries.remove(idx);
        for slot in self.index.values_mut() {
            if *slot > idx {
                *slot -= 1;
            }
        }
        Some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldEntry> {
        self.entries.iter()
    }

    /// Bound query parameters in registration order.
    #[must_use]
    pub fn params(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.query_param.clone()).collect()
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
