#![forbid(unsafe_code)]

//! Synchronization engine keeping store properties and URL query parameters
//! in step.
//!
//! # Architecture
//!
//! - [`SerializerRegistry`] resolves a [`Serializer`] for a value: built in for
//!   primitives, by explicit [`TypeTag`](urlstate_core::TypeTag) otherwise.
//! - [`FieldRegistry`] owns every [`FieldEntry`] (one per query parameter).
//! - [`url_state`] computes the parameter set the URL should carry and
//!   compares it with the one it does carry.
//! - [`UpdateScheduler`] decides whether a change is written now or deferred,
//!   coalescing bursts into one write.
//! - [`SyncEngine`] wires these to the host collaborators.
//!
//! # Invariants
//!
//! 1. A query parameter binds to at most one field.
//! 2. A parameter whose serialized value equals its serialized default is
//!    absent from the URL after a flush.
//! 3. At most one deferred write is pending engine-wide.
//! 4. A flush whose desired parameters equal the current ones never touches
//!    the history collaborator.
//! 5. Only the flush step writes to the location host.

pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod scheduler;
pub mod serializer;
pub mod url_state;

pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncEngineBuilder, SyncStats};
pub use error::{Result, SyncError};
pub use field::{FieldEntry, FieldOptions, FieldRegistry};
pub use scheduler::{DirtyAction, UpdateScheduler};
pub use serializer::{DeserializeFn, SerializeFn, Serializer, SerializerRegistry};
