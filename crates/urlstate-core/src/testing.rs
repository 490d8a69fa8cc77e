//! Deterministic simulated host for tests.
//!
//! [`SimulatedHost`] bundles a [`ManualClock`], [`ManualTimers`] driven by
//! that clock, and an in-memory [`MemoryLocation`]. Time only moves when the
//! test calls [`SimulatedHost::advance`], which fires due timers in
//! `(due, arm order)` order with the clock set to each timer's due instant.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::HostError;
use crate::host::{Clock, LocationHost, LocationSnapshot, TimerCallback, TimerHandle, TimerHost};

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

struct PendingTimer {
    handle: TimerHandle,
    due: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct TimerState {
    next_id: u64,
    pending: Vec<PendingTimer>,
    scheduled: usize,
    cancelled: usize,
    fired: usize,
}

/// Timers that fire only when the owning clock is advanced through them.
#[derive(Clone)]
pub struct ManualTimers {
    clock: ManualClock,
    state: Rc<RefCell<TimerState>>,
}

impl ManualTimers {
    #[must_use]
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Rc::new(RefCell::new(TimerState::default())),
        }
    }

    /// Move the clock to `target`, firing every timer due on the way.
    pub fn advance_to(&self, target: Duration) {
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let idx = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.handle))
                    .map(|(i, _)| i);
                idx.map(|i| {
                    state.fired += 1;
                    state.pending.remove(i)
                })
            };
            let Some(timer) = next else { break };
            if timer.due > self.clock.now() {
                self.clock.set(timer.due);
            }
            (timer.callback)();
        }
        if target > self.clock.now() {
            self.clock.set(target);
        }
    }

    /// Timers armed and not yet fired or cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Due instant of the earliest pending timer.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.state.borrow().pending.iter().map(|t| t.due).min()
    }

    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.state.borrow().scheduled
    }

    #[must_use]
    pub fn cancelled_count(&self) -> usize {
        self.state.borrow().cancelled
    }

    #[must_use]
    pub fn fired_count(&self) -> usize {
        self.state.borrow().fired
    }
}

impl fmt::Debug for ManualTimers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimers")
            .field("now", &self.clock.now())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl TimerHost for ManualTimers {
    fn schedule(&self, after: Duration, callback: TimerCallback) -> Result<TimerHandle, HostError> {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.scheduled += 1;
        let handle = TimerHandle::new(state.next_id);
        state.pending.push(PendingTimer {
            handle,
            due: self.clock.now() + after,
            callback,
        });
        Ok(handle)
    }

    fn cancel(&self, handle: TimerHandle) {
        let mut state = self.state.borrow_mut();
        let before = state.pending.len();
        state.pending.retain(|t| t.handle != handle);
        if state.pending.len() != before {
            state.cancelled += 1;
        }
    }
}

#[derive(Debug, Default)]
struct LocationState {
    current: LocationSnapshot,
    writes: Vec<String>,
    fail_writes: bool,
}

/// In-memory address bar recording every history replacement.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    state: Rc<RefCell<LocationState>>,
}

impl MemoryLocation {
    /// Start at `url` (path-relative, e.g. `/?counter=7`).
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(LocationState {
                current: LocationSnapshot::parse(url),
                ..LocationState::default()
            })),
        }
    }

    /// The current URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.state.borrow().current.to_string()
    }

    /// The current raw query string (without `?`).
    #[must_use]
    pub fn query(&self) -> String {
        self.state.borrow().current.query.clone()
    }

    /// Change the URL as a user would, without recording a write.
    pub fn navigate(&self, url: &str) {
        self.state.borrow_mut().current = LocationSnapshot::parse(url);
    }

    /// Every URL passed to [`LocationHost::replace`], oldest first.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.state.borrow().writes.clone()
    }

    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.borrow().writes.len()
    }

    /// Make subsequent writes fail with [`HostError::Js`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }
}

impl LocationHost for MemoryLocation {
    fn snapshot(&self) -> Result<LocationSnapshot, HostError> {
        Ok(self.state.borrow().current.clone())
    }

    fn replace(&self, url: &str) -> Result<(), HostError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(HostError::Js("replaceState rejected".into()));
        }
        state.current = LocationSnapshot::parse(url);
        state.writes.push(url.to_owned());
        Ok(())
    }
}

/// Clock, timers and location wired together.
#[derive(Debug, Clone)]
pub struct SimulatedHost {
    pub clock: ManualClock,
    pub timers: ManualTimers,
    pub location: MemoryLocation,
}

impl SimulatedHost {
    /// A host at time zero whose address bar shows `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        let clock = ManualClock::new();
        Self {
            timers: ManualTimers::new(clock.clone()),
            clock,
            location: MemoryLocation::new(url),
        }
    }

    /// Advance simulated time by `by`, firing due timers.
    pub fn advance(&self, by: Duration) {
        self.timers.advance_to(self.clock.now() + by);
    }

    /// Advance simulated time by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn timers_fire_in_due_order_with_clock_at_due_time() {
        let host = SimulatedHost::new("/");
        let log = Rc::new(RefCell::new(Vec::new()));
        for (delay, name) in [(30, "c"), (10, "a"), (20, "b")] {
            let (l, clock) = (Rc::clone(&log), host.clock.clone());
            host.timers
                .schedule(ms(delay), Box::new(move || l.borrow_mut().push((name, clock.now()))))
                .unwrap();
        }

        host.advance_ms(25);
        assert_eq!(*log.borrow(), vec![("a", ms(10)), ("b", ms(20))]);
        assert_eq!(host.now(), ms(25));
        assert_eq!(host.timers.pending_count(), 1);
        assert_eq!(host.timers.next_due(), Some(ms(30)));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let host = SimulatedHost::new("/");
        let fired = Rc::new(Cell::new(false));
        let f = Rc::clone(&fired);
        let handle = host
            .timers
            .schedule(ms(5), Box::new(move || f.set(true)))
            .unwrap();
        host.timers.cancel(handle);
        host.advance_ms(10);
        assert!(!fired.get());
        assert_eq!(host.timers.cancelled_count(), 1);
    }

    #[test]
    fn callback_may_arm_followup_timer() {
        let host = SimulatedHost::new("/");
        let hits = Rc::new(Cell::new(0));
        let (h, timers) = (Rc::clone(&hits), host.timers.clone());
        host.timers
            .schedule(
                ms(5),
                Box::new(move || {
                    h.set(h.get() + 1);
                    let h2 = Rc::clone(&h);
                    let _ = timers.schedule(ms(5), Box::new(move || h2.set(h2.get() + 1)));
                }),
            )
            .unwrap();

        host.advance_ms(20);
        assert_eq!(hits.get(), 2);
        assert_eq!(host.timers.fired_count(), 2);
    }

    #[test]
    fn memory_location_records_writes() {
        let loc = MemoryLocation::new("/app?x=1#frag");
        loc.replace("/app?x=2#frag").unwrap();
        assert_eq!(loc.url(), "/app?x=2#frag");
        assert_eq!(loc.writes(), vec!["/app?x=2#frag"]);

        loc.navigate("/other");
        assert_eq!(loc.write_count(), 1);
        assert_eq!(loc.query(), "");
    }

    #[test]
    fn memory_location_can_fail_writes() {
        let loc = MemoryLocation::new("/");
        loc.set_fail_writes(true);
        assert!(loc.replace("/?a=1").is_err());
        assert_eq!(loc.url(), "/");
    }
}
