#![forbid(unsafe_code)]

//! Core building blocks for urlstate.
//!
//! This crate provides:
//! - [`Value`] and [`TypeTag`], the tagged value domain synchronized into URLs
//! - [`reactive`] change-tracking primitives and the [`ObservableStore`]
//!   reference implementation of [`PropertyStore`]
//! - [`host`] collaborator traits for clocks, one-shot timers and the
//!   browser location/history pair
//! - [`QueryParams`], the `application/x-www-form-urlencoded` wire codec
//!
//! With the `test-helpers` feature, [`testing`] exposes a deterministic
//! simulated host for driving timing-sensitive code in tests.

pub mod error;
pub mod host;
pub mod query;
pub mod reactive;
pub mod store;
#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;
pub mod value;

pub use error::{DeserializeError, HostError, StoreError};
pub use host::{
    Clock, LocationHost, LocationSnapshot, SystemClock, TimerCallback, TimerHandle, TimerHost,
};
pub use query::QueryParams;
pub use reactive::{Observable, Subscription};
pub use store::{ObservableStore, PropertyChange, PropertyStore};
pub use value::{TaggedValue, TypeTag, Value, ValueKind};
