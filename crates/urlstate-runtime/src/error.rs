//! Registration and engine errors.

use urlstate_core::{HostError, StoreError, ValueKind};

/// Errors surfaced by [`SyncEngine`](crate::SyncEngine).
///
/// Registration errors are fatal to that one call and leave existing
/// bindings untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// The query parameter is already bound to another field.
    #[error("query parameter '{param}' is already bound to property '{property}'")]
    DuplicateParameter { param: String, property: String },
    /// No serializer was supplied and none resolves for the default value.
    #[error("no serializer for property '{property}' holding {kind}")]
    MissingSerializer { property: String, kind: ValueKind },
    /// Neither an explicit default nor a current store value exists.
    #[error("property '{property}' has no current value and no default")]
    MissingProperty { property: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
