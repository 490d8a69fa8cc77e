#![forbid(unsafe_code)]

//! Browser collaborators for the sync engine.
//!
//! [`BrowserLocation`] reads `window.location` and writes through
//! `history.replaceState`, so synchronization never adds history entries.
//! [`BrowserTimers`] arms deferred flushes with `setTimeout`.
//!
//! Outside `wasm32` both hosts report [`HostError::Unavailable`]; an engine
//! built on them still registers fields (hydration is skipped with a warning)
//! and flushes degrade to logged failures.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | No `window` | Worker or non-browser target | `HostError::Unavailable("window")` |
//! | `replaceState` throws | Cross-origin URL, security policy | `HostError::Js` with the exception text |
//! | `setTimeout` throws | Host refused the timer | Engine flushes immediately |

use std::fmt;
use std::time::Duration;

use urlstate_core::{
    HostError, LocationHost, LocationSnapshot, SystemClock, TimerCallback, TimerHandle, TimerHost,
};
use urlstate_runtime::{SerializerRegistry, SyncConfig, SyncEngine};

/// `window.location` plus `history.replaceState`.
#[derive(Default, Clone, Copy)]
pub struct BrowserLocation;

impl BrowserLocation {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl fmt::Debug for BrowserLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BrowserLocation")
    }
}

/// `setTimeout` / `clearTimeout` on the global window.
#[derive(Default, Clone, Copy)]
pub struct BrowserTimers;

impl BrowserTimers {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl fmt::Debug for BrowserTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BrowserTimers")
    }
}

/// Build an engine wired to the page's location, history and timers.
///
/// # Errors
///
/// Propagates [`SyncEngineBuilder::build`](urlstate_runtime::SyncEngineBuilder::build)
/// failures; the browser hosts themselves never fail to construct.
pub fn browser_engine(
    serializers: SerializerRegistry,
    config: SyncConfig,
) -> urlstate_runtime::Result<SyncEngine> {
    SyncEngine::builder()
        .serializers(serializers)
        .config(config)
        .clock(SystemClock::new())
        .timers(BrowserTimers::new())
        .location(BrowserLocation::new())
        .build()
}

// ---------------------------------------------------------------------------
// wasm32
// ---------------------------------------------------------------------------

#[cfg(target_arch = "wasm32")]
mod imp {
    use wasm_bindgen::JsCast;
    use wasm_bindgen::JsValue;
    use wasm_bindgen::closure::Closure;

    use super::*;

    fn js_error(err: JsValue) -> HostError {
        HostError::Js(err.as_string().unwrap_or_else(|| format!("{err:?}")))
    }

    fn window() -> Result<web_sys::Window, HostError> {
        web_sys::window().ok_or(HostError::Unavailable("window"))
    }

    impl LocationHost for BrowserLocation {
        fn snapshot(&self) -> Result<LocationSnapshot, HostError> {
            let location = window()?.location();
            let path = location.pathname().map_err(js_error)?;
            let search = location.search().map_err(js_error)?;
            let hash = location.hash().map_err(js_error)?;
            Ok(LocationSnapshot::parse(&format!("{path}{search}{hash}")))
        }

        fn replace(&self, url: &str) -> Result<(), HostError> {
            let history = window()?.history().map_err(js_error)?;
            history
                .replace_state_with_url(&JsValue::NULL, "", Some(url))
                .map_err(js_error)
        }
    }

    impl TimerHost for BrowserTimers {
        fn schedule(
            &self,
            after: Duration,
            callback: TimerCallback,
        ) -> Result<TimerHandle, HostError> {
            let timeout = i32::try_from(after.as_millis()).unwrap_or(i32::MAX);
            // A cancelled callback is reclaimed with the page.
            let handler = Closure::once_into_js(move || callback());
            let id = window()?
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    handler.unchecked_ref::<js_sys::Function>(),
                    timeout,
                )
                .map_err(js_error)?;
            u64::try_from(id)
                .map(TimerHandle::new)
                .map_err(|_| HostError::Js(format!("negative timer id {id}")))
        }

        fn cancel(&self, handle: TimerHandle) {
            let Ok(id) = i32::try_from(handle.raw()) else {
                tracing::warn!(%handle, "timer handle out of range for clearTimeout");
                return;
            };
            match web_sys::window() {
                Some(window) => window.clear_timeout_with_handle(id),
                None => tracing::warn!(%handle, "no window to clear timer on"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Native stand-ins
// ---------------------------------------------------------------------------

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use super::*;

    impl LocationHost for BrowserLocation {
        fn snapshot(&self) -> Result<LocationSnapshot, HostError> {
            Err(HostError::Unavailable("window"))
        }

        fn replace(&self, _url: &str) -> Result<(), HostError> {
            Err(HostError::Unavailable("window"))
        }
    }

    impl TimerHost for BrowserTimers {
        fn schedule(
            &self,
            _after: Duration,
            _callback: TimerCallback,
        ) -> Result<TimerHandle, HostError> {
            Err(HostError::Unavailable("setTimeout"))
        }

        fn cancel(&self, _handle: TimerHandle) {}
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;
    use urlstate_core::{ObservableStore, PropertyStore};
    use urlstate_runtime::FieldOptions;

    #[test]
    fn native_location_is_unavailable() {
        let location = BrowserLocation::new();
        assert_eq!(
            location.snapshot().unwrap_err(),
            HostError::Unavailable("window")
        );
        assert!(location.replace("/?a=1").is_err());
    }

    #[test]
    fn native_timers_refuse_to_schedule() {
        let timers = BrowserTimers::new();
        let err = timers
            .schedule(Duration::from_millis(10), Box::new(|| {}))
            .unwrap_err();
        assert_eq!(err, HostError::Unavailable("setTimeout"));
    }

    #[test]
    fn engine_degrades_without_a_browser() {
        let engine = browser_engine(SerializerRegistry::new(), SyncConfig::new()).unwrap();
        let store = Rc::new(ObservableStore::new().with("page", 1));
        engine
            .register(&store, "page", "page", FieldOptions::new())
            .unwrap();
        assert_eq!(store.get("page").and_then(|v| v.as_number()), Some(1.0));

        store.set("page", 2.into()).unwrap();
        let stats = engine.stats();
        assert_eq!(stats.hydration_errors, 1);
        assert_eq!(stats.failed_writes, 1);
    }
}
