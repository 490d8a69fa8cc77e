//! Error types shared by stores, host collaborators and deserializers.

use crate::value::ValueKind;

/// Errors raised by a [`PropertyStore`](crate::PropertyStore).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The property is not defined on the store.
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
    /// A textual value could not be coerced into the property's kind.
    #[error("cannot coerce {raw:?} into {expected} for property '{property}'")]
    Coercion {
        property: String,
        expected: ValueKind,
        raw: String,
    },
    /// A value of a different kind was assigned to the property.
    #[error("property '{property}' holds {expected}, got {found}")]
    KindMismatch {
        property: String,
        expected: ValueKind,
        found: ValueKind,
    },
}

/// Errors raised by host collaborators (location, history, timers).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// A required host facility is missing (e.g. no `window` object).
    #[error("host facility unavailable: {0}")]
    Unavailable(&'static str),
    /// The host reported a failure.
    #[error("host call failed: {0}")]
    Js(String),
}

/// A query-parameter value could not be turned back into a property value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to deserialize {raw:?}: {message}")]
pub struct DeserializeError {
    /// The raw parameter text.
    pub raw: String,
    /// What went wrong.
    pub message: String,
}

impl DeserializeError {
    /// Create an error for `raw` with a human-readable reason.
    #[must_use]
    pub fn new(raw: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            message: message.into(),
        }
    }
}
