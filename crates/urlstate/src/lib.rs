#![forbid(unsafe_code)]

//! Two-way synchronization between observable store properties and the
//! page's URL query string.
//!
//! Register a property against a query parameter and the engine will
//!
//! - hydrate the property from the URL at registration,
//! - rewrite the query string (via history replacement) when it changes,
//! - coalesce bursts of changes into one write per throttle window,
//! - omit parameters whose value serializes to the registered default.
//!
//! ```
//! use std::rc::Rc;
//! use urlstate::prelude::*;
//! use urlstate::core::testing::SimulatedHost;
//!
//! let host = SimulatedHost::new("/items?page=3");
//! let engine = SyncEngine::builder()
//!     .clock(host.clock.clone())
//!     .timers(host.timers.clone())
//!     .location(host.location.clone())
//!     .build()?;
//!
//! let store = Rc::new(ObservableStore::new().with("page", 1));
//! engine.register(&store, "page", "page", FieldOptions::new().with_default(1))?;
//! assert_eq!(store.get("page"), Some(Value::Number(3.0)));
//!
//! store.set("page", Value::from(1))?;
//! host.advance_ms(500);
//! assert_eq!(host.location.url(), "/items");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! In a browser, [`web::browser_engine`] wires the engine to
//! `window.location`, `history.replaceState` and `setTimeout`.

pub use urlstate_core as core;
pub use urlstate_runtime as runtime;
#[cfg(feature = "web")]
pub use urlstate_web as web;

pub use urlstate_core::{
    Clock, HostError, LocationHost, ObservableStore, PropertyStore, QueryParams, StoreError,
    SystemClock, TaggedValue, TimerHost, TypeTag, Value, ValueKind,
};
pub use urlstate_runtime::{
    FieldOptions, Serializer, SerializerRegistry, SyncConfig, SyncEngine, SyncError, SyncStats,
};

pub mod prelude {
    //! Common imports for binding stores to the URL.
    pub use urlstate_core::{ObservableStore, PropertyStore, Value};
    pub use urlstate_runtime::{
        FieldOptions, Serializer, SerializerRegistry, SyncConfig, SyncEngine, SyncError,
    };
    #[cfg(feature = "web")]
    pub use urlstate_web::browser_engine;
}
