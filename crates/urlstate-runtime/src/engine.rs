//! The synchronization engine.
//!
//! [`SyncEngine`] owns the field registry and the scheduler and talks to the
//! host through three injected collaborators: a [`Clock`], a [`TimerHost`]
//! and a [`LocationHost`]. It holds no ambient state; two engines never
//! interfere.
//!
//! # Lifecycle of a binding
//!
//! 1. `register` resolves default and serializer, failing without side
//!    effects on a duplicate parameter or a missing serializer.
//! 2. The engine subscribes to the property. A store that refuses the
//!    subscription fails the registration before anything is written.
//! 3. Hydration: if the URL carries the parameter, the deserialized value is
//!    written to the store. Failures are logged and swallowed; the property
//!    keeps its value. The write is not reported as a change.
//! 4. From then on every committed change is a dirty signal for the
//!    scheduler. Registration counts as a sync point, so changes made within
//!    `delay` of it are deferred and coalesced.
//!
//! # Flushing
//!
//! A flush recomputes the desired parameters from all fields, compares them
//! with the live URL and replaces the history entry only if they differ.
//! Values that fail to serialize are a programmer error: serializers are
//! total by type (`Fn(&Value) -> String`).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace, warn};
use urlstate_core::{
    Clock, HostError, LocationHost, PropertyChange, PropertyStore, SystemClock, TimerHost,
};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::field::{FieldEntry, FieldOptions, FieldRegistry};
use crate::scheduler::{DirtyAction, UpdateScheduler};
use crate::serializer::SerializerRegistry;
use crate::url_state;

/// Counters describing what the engine has done so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    /// Change signals received.
    pub dirty_signals: u64,
    /// Flushes performed synchronously on a change signal.
    pub immediate_flushes: u64,
    /// Flushes performed by a deferred timer.
    pub deferred_flushes: u64,
    /// Flushes that found the URL already up to date.
    pub noop_flushes: u64,
    /// History entries replaced.
    pub writes: u64,
    /// Location reads or writes the host rejected.
    pub failed_writes: u64,
    /// Properties set from the URL at registration.
    pub hydrations: u64,
    /// URL values that could not be applied at registration.
    pub hydration_errors: u64,
}

/// Builder for [`SyncEngine`].
#[derive(Default)]
pub struct SyncEngineBuilder {
    serializers: SerializerRegistry,
    config: SyncConfig,
    clock: Option<Rc<dyn Clock>>,
    timers: Option<Rc<dyn TimerHost>>,
    location: Option<Rc<dyn LocationHost>>,
}

impl SyncEngineBuilder {
    #[must_use]
    pub fn serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    #[must_use]
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for `config(config.with_delay(delay))`.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Time source. Defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Rc::new(clock));
        self
    }

    #[must_use]
    pub fn timers(mut self, timers: impl TimerHost + 'static) -> Self {
        self.timers = Some(Rc::new(timers));
        self
    }

    #[must_use]
    pub fn location(mut self, location: impl LocationHost + 'static) -> Self {
        self.location = Some(Rc::new(location));
        self
    }

    /// Build the engine. Timers and location are required.
    pub fn build(self) -> Result<SyncEngine> {
        let timers = self.timers.ok_or(HostError::Unavailable("timer host"))?;
        let location = self
            .location
            .ok_or(HostError::Unavailable("location host"))?;
        let clock = self
            .clock
            .unwrap_or_else(|| Rc::new(SystemClock::new()) as Rc<dyn Clock>);
        Ok(SyncEngine::with_hosts(
            self.serializers,
            self.config,
            clock,
            timers,
            location,
        ))
    }
}

impl fmt::Debug for SyncEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngineBuilder")
            .field("serializers", &self.serializers)
            .field("config", &self.config)
            .field("clock", &self.clock.is_some())
            .field("timers", &self.timers.is_some())
            .field("location", &self.location.is_some())
            .finish()
    }
}

struct EngineInner {
    this: Weak<EngineInner>,
    config: SyncConfig,
    serializers: SerializerRegistry,
    registry: RefCell<FieldRegistry>,
    scheduler: RefCell<UpdateScheduler>,
    stats: Cell<SyncStats>,
    clock: Rc<dyn Clock>,
    timers: Rc<dyn TimerHost>,
    location: Rc<dyn LocationHost>,
}

/// Keeps registered store properties and URL query parameters in sync.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use urlstate_core::testing::SimulatedHost;
/// use urlstate_core::{ObservableStore, PropertyStore, Value};
/// use urlstate_runtime::{FieldOptions, SyncEngine};
///
/// let host = SimulatedHost::new("/?counter=7");
/// let engine = SyncEngine::builder()
///     .clock(host.clock.clone())
///     .timers(host.timers.clone())
///     .location(host.location.clone())
///     .build()
///     .unwrap();
///
/// let store = Rc::new(ObservableStore::new().with("counter", 0));
/// engine.register(&store, "counter", "counter", FieldOptions::new()).unwrap();
/// assert_eq!(store.get("counter"), Some(Value::Number(7.0)));
///
/// store.set("counter", Value::from(0)).unwrap();
/// host.advance_ms(500);
/// assert_eq!(host.location.url(), "/");
/// ```
pub struct SyncEngine {
    inner: Rc<EngineInner>,
}

impl SyncEngine {
    #[must_use]
    pub fn builder() -> SyncEngineBuilder {
        SyncEngineBuilder::default()
    }

    /// Construct an engine from explicit collaborators.
    #[must_use]
    pub fn with_hosts(
        serializers: SerializerRegistry,
        config: SyncConfig,
        clock: Rc<dyn Clock>,
        timers: Rc<dyn TimerHost>,
        location: Rc<dyn LocationHost>,
    ) -> Self {
        let scheduler = UpdateScheduler::new(config.delay);
        let inner = Rc::new_cyclic(|this| EngineInner {
            this: this.clone(),
            config,
            serializers,
            registry: RefCell::new(FieldRegistry::new()),
            scheduler: RefCell::new(scheduler),
            stats: Cell::new(SyncStats::default()),
            clock,
            timers,
            location,
        });
        Self { inner }
    }

    /// Bind `store.property` to the query parameter `query_param`.
    ///
    /// On success the property has been hydrated from the URL (if present)
    /// and is observed for the lifetime of the engine or until
    /// [`unregister`](Self::unregister).
    ///
    /// # Errors
    ///
    /// - [`SyncError::DuplicateParameter`](crate::SyncError::DuplicateParameter)
    /// - [`SyncError::MissingSerializer`](crate::SyncError::MissingSerializer)
    /// - [`SyncError::MissingProperty`](crate::SyncError::MissingProperty)
    /// - [`SyncError::Store`](crate::SyncError::Store) if the store refuses
    ///   the subscription
    pub fn register<S: PropertyStore + 'static>(
        &self,
        store: &Rc<S>,
        property: &str,
        query_param: &str,
        options: FieldOptions,
    ) -> Result<()> {
        let store: Rc<dyn PropertyStore> = store.clone();
        self.inner.register(&store, property, query_param, options)
    }

    /// Remove the binding for `query_param`; returns whether one existed.
    ///
    /// The property stops being observed and the URL is recomputed through
    /// the scheduler as for any other change.
    pub fn unregister(&self, query_param: &str) -> bool {
        let removed = self.inner.registry.borrow_mut().remove(query_param);
        let Some(entry) = removed else {
            return false;
        };
        debug!(param = query_param, property = entry.property(), "field unregistered");
        drop(entry);
        self.inner.mark_dirty();
        true
    }

    /// Flush synchronously, cancelling any pending deferred write.
    pub fn flush_now(&self) {
        let pending = self.inner.scheduler.borrow_mut().take_pending();
        if let Some(handle) = pending {
            self.inner.timers.cancel(handle);
        }
        self.inner.flush();
    }

    /// Whether a deferred write is scheduled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.scheduler.borrow().is_pending()
    }

    /// Bound query parameters in registration order.
    #[must_use]
    pub fn query_params(&self) -> Vec<String> {
        self.inner.registry.borrow().params()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.registry.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.registry.borrow().is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.inner.stats.get()
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.inner.config)
            .field("params", &self.query_params())
            .field("pending", &self.is_pending())
            .field("stats", &self.stats())
            .finish()
    }
}

impl EngineInner {
    fn bump(&self, f: impl FnOnce(&mut SyncStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn register(
        &self,
        store: &Rc<dyn PropertyStore>,
        property: &str,
        query_param: &str,
        options: FieldOptions,
    ) -> Result<()> {
        self.registry.borrow().ensure_free(query_param)?;
        let mut entry =
            FieldEntry::resolve(store, property, query_param, options, &self.serializers)?;

        // A refused subscription must leave the store untouched. The gate stays
        // closed during hydration: that write is not a dirty signal.
        let live = Rc::new(Cell::new(false));
        let weak = self.this.clone();
        let param = query_param.to_owned();
        let gate = Rc::clone(&live);
        let subscription = store.observe(
            property,
            Box::new(move |change: &PropertyChange<'_>| {
                if !gate.get() {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    trace!(param = %param, property = change.property, "property changed");
                    inner.mark_dirty();
                }
            }),
        )?;

        self.hydrate(store.as_ref(), &entry);
        live.set(true);
        entry.attach(subscription);

        self.registry.borrow_mut().insert(entry)?;
        self.scheduler.borrow_mut().synced(self.clock.now());
        debug!(param = query_param, property, "field registered");
        Ok(())
    }

    fn hydrate(&self, store: &dyn PropertyStore, entry: &FieldEntry) {
        let params = match url_state::current_params(self.location.as_ref()) {
            Ok((_, params)) => params,
            Err(err) => {
                warn!(
                    param = entry.query_param(),
                    error = %err,
                    "location unreadable; skipping hydration"
                );
                self.bump(|s| s.hydration_errors += 1);
                return;
            }
        };
        let Some(raw) = params.get(entry.query_param()) else {
            return;
        };
        let applied = entry
            .serializer()
            .deserialize(raw)
            .map_err(|e| e.to_string())
            .and_then(|value| {
                store
                    .set(entry.property(), value)
                    .map_err(|e| e.to_string())
            });
        match applied {
            Ok(()) => {
                debug!(param = entry.query_param(), raw, "hydrated from url");
                self.bump(|s| s.hydrations += 1);
            }
            Err(error) => {
                warn!(
                    param = entry.query_param(),
                    raw,
                    error = %error,
                    "ignoring url value that failed to hydrate"
                );
                self.bump(|s| s.hydration_errors += 1);
            }
        }
    }

    fn mark_dirty(&self) {
        self.bump(|s| s.dirty_signals += 1);
        let now = self.clock.now();
        let action = self.scheduler.borrow_mut().on_dirty(now);
        match action {
            DirtyAction::FlushNow { cancel } => {
                if let Some(handle) = cancel {
                    self.timers.cancel(handle);
                }
                self.bump(|s| s.immediate_flushes += 1);
                self.flush();
            }
            DirtyAction::Arm {
                after,
                replace,
                token,
            } => {
                if let Some(handle) = replace {
                    self.timers.cancel(handle);
                }
                let weak = self.this.clone();
                let armed = self.timers.schedule(
                    after,
                    Box::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_timer(token);
                        }
                    }),
                );
                match armed {
                    Ok(handle) => {
                        let delay_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX);
                        trace!(delay_ms, %handle, "flush deferred");
                        self.scheduler.borrow_mut().armed(token, handle);
                    }
                    Err(err) => {
                        warn!(error = %err, "could not arm flush timer; flushing now");
                        self.scheduler.borrow_mut().take_pending();
                        self.bump(|s| s.immediate_flushes += 1);
                        self.flush();
                    }
                }
            }
        }
    }

    fn on_timer(&self, token: u64) {
        if !self.scheduler.borrow_mut().on_timer(token) {
            trace!(token, "stale flush timer ignored");
            return;
        }
        self.bump(|s| s.deferred_flushes += 1);
        self.flush();
    }

    fn flush(&self) {
        let _span = tracing::debug_span!("urlstate.flush").entered();
        let now = self.clock.now();
        self.scheduler.borrow_mut().flushed(now);

        let (snapshot, current) = match url_state::current_params(self.location.as_ref()) {
            Ok(read) => read,
            Err(err) => {
                warn!(error = %err, "location unreadable; flush skipped");
                self.bump(|s| s.failed_writes += 1);
                return;
            }
        };
        let desired = url_state::desired_params(
            &self.registry.borrow(),
            &current,
            self.config.preserve_unmanaged,
        );
        if url_state::params_equal(&current, &desired) {
            trace!("url already up to date");
            self.bump(|s| s.noop_flushes += 1);
            return;
        }

        let url = url_state::render(&snapshot, &desired);
        match self.location.replace(&url) {
            Ok(()) => {
                debug!(url = %url, "history entry replaced");
                self.bump(|s| s.writes += 1);
            }
            Err(err) => {
                warn!(url = %url, error = %err, "history write rejected");
                self.bump(|s| s.failed_writes += 1);
            }
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if let Some(handle) = self.scheduler.get_mut().take_pending() {
            self.timers.cancel(handle);
        }
    }
}
