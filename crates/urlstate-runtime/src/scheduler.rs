//! Throttled, coalescing URL write scheduler.
//!
//! The scheduler is a pure state machine: it is told the current time and
//! answers what to do, and it is told when a timer was armed, fired, or a
//! flush happened. Arming and cancelling real timers is the engine's job.
//!
//! # State Machine
//!
//! ```text
//!            on_dirty, elapsed >= delay (or never flushed)
//!   IDLE ───────────────────────────────────────────────► FLUSHING ──► IDLE
//!    │                                                       ▲
//!    │ on_dirty, elapsed < delay                             │ on_timer(current token)
//!    ▼                                                       │
//!  PENDING ──────────────────────────────────────────────────┘
//!    │ on_dirty, elapsed < delay: cancel + re-arm for delay - elapsed
//!    └──► PENDING
//! ```
//!
//! # Invariants
//!
//! 1. At most one timer is pending at any instant; re-arming always names the
//!    handle to cancel.
//! 2. A timer callback carrying a token other than the pending one is stale
//!    and is ignored.
//! 3. Every flush records `last_flush`, including no-op flushes. A
//!    registration (URL to store sync) records it too, so a burst right after
//!    registering is coalesced like a burst right after a write.
//! 4. Writes are spaced at least `delay` apart as long as timers fire on time.

use std::time::Duration;

use urlstate_core::TimerHandle;

/// What the engine must do after a dirty signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyAction {
    /// Flush synchronously, first cancelling `cancel` if set.
    FlushNow { cancel: Option<TimerHandle> },
    /// Cancel `replace` if set, then arm a timer for `after` whose callback
    /// reports `token`.
    Arm {
        after: Duration,
        replace: Option<TimerHandle>,
        token: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingFlush {
    token: u64,
    handle: Option<TimerHandle>,
    due: Duration,
}

/// Scheduling state for one engine.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    delay: Duration,
    last_flush: Option<Duration>,
    pending: Option<PendingFlush>,
    next_token: u64,
}

impl UpdateScheduler {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_flush: None,
            pending: None,
            next_token: 0,
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time of the last flush, if any.
    #[must_use]
    pub fn last_flush(&self) -> Option<Duration> {
        self.last_flush
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending flush is due.
    #[must_use]
    pub fn pending_due(&self) -> Option<Duration> {
        self.pending.map(|p| p.due)
    }

    /// React to a change signal at `now`.
    pub fn on_dirty(&mut self, now: Duration) -> DirtyAction {
        let held = self.pending.and_then(|p| p.handle);
        let remaining = self
            .last_flush
            .map(|last| now.saturating_sub(last))
            .filter(|elapsed| *elapsed < self.delay)
            .map(|elapsed| self.delay - elapsed);

        match remaining {
            None => {
                self.pending = None;
                DirtyAction::FlushNow { cancel: held }
            }
            Some(after) => {
                self.next_token += 1;
                let token = self.next_token;
                self.pending = Some(PendingFlush {
                    token,
                    handle: None,
                    due: now + after,
                });
                DirtyAction::Arm {
                    after,
                    replace: held,
                    token,
                }
            }
        }
    }

    /// Record the handle of the timer armed for `token`.
    pub fn armed(&mut self, token: u64, handle: TimerHandle) {
        if let Some(pending) = self.pending.as_mut().filter(|p| p.token == token) {
            pending.handle = Some(handle);
        }
    }

    /// A timer carrying `token` fired. Returns whether it is the pending one;
    /// if so the scheduler leaves `PENDING` and the caller must flush.
    pub fn on_timer(&mut self, token: u64) -> bool {
        match self.pending {
            Some(p) if p.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending flush, returning its timer handle for cancellation.
    pub fn take_pending(&mut self) -> Option<TimerHandle> {
        self.pending.take().and_then(|p| p.handle)
    }

    /// Record a flush (write or no-op) at `now`.
    pub fn flushed(&mut self, now: Duration) {
        self.last_flush = Some(now);
    }

    /// Record that the URL was read into the stores at `now`.
    ///
    /// The URL and the stores agree at this instant, which opens a throttle
    /// window exactly as a flush does. Never moves `last_flush` backwards.
    pub fn synced(&mut self, now: Duration) {
        if self.last_flush.is_none_or(|last| last < now) {
            self.last_flush = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_dirty_flushes_immediately() {
        let mut s = UpdateScheduler::new(ms(500));
        assert_eq!(s.on_dirty(ms(0)), DirtyAction::FlushNow { cancel: None });
        assert!(!s.is_pending());
    }

    #[test]
    fn dirty_inside_window_defers_for_remaining_time() {
        let mut s = UpdateScheduler::new(ms(500));
        s.flushed(ms(100));
        let action = s.on_dirty(ms(250));
        assert_eq!(
            action,
            DirtyAction::Arm {
                after: ms(350),
                replace: None,
                token: 1,
            }
        );
        assert_eq!(s.pending_due(), Some(ms(600)));
    }

    #[test]
    fn rearming_names_the_timer_to_cancel() {
        let mut s = UpdateScheduler::new(ms(500));
        s.flushed(ms(0));
        let DirtyAction::Arm { token, .. } = s.on_dirty(ms(10)) else {
            panic!("expected arm");
        };
        s.armed(token, TimerHandle::new(7));

        let action = s.on_dirty(ms(20));
        assert_eq!(
            action,
            DirtyAction::Arm {
                after: ms(480),
                replace: Some(TimerHandle::new(7)),
                token: 2,
            }
        );
        assert!(!s.on_timer(1), "old token is stale");
        assert!(s.is_pending());
        assert!(s.on_timer(2));
        assert!(!s.is_pending());
    }

    #[test]
    fn sync_opens_a_window() {
        let mut s = UpdateScheduler::new(ms(500));
        s.synced(ms(0));
        assert_eq!(s.last_flush(), Some(ms(0)));
        assert_eq!(
            s.on_dirty(ms(3)),
            DirtyAction::Arm {
                after: ms(497),
                replace: None,
                token: 1,
            }
        );
        assert_eq!(s.pending_due(), Some(ms(500)));
    }

    #[test]
    fn sync_never_rewinds_last_flush() {
        let mut s = UpdateScheduler::new(ms(500));
        s.flushed(ms(900));
        s.synced(ms(400));
        assert_eq!(s.last_flush(), Some(ms(900)));
        s.synced(ms(1_000));
        assert_eq!(s.last_flush(), Some(ms(1_000)));
    }

    #[test]
    fn dirty_after_quiescence_flushes_immediately() {
        let mut s = UpdateScheduler::new(ms(500));
        s.flushed(ms(0));
        assert_eq!(s.on_dirty(ms(500)), DirtyAction::FlushNow { cancel: None });
        s.flushed(ms(500));
        assert_eq!(s.on_dirty(ms(2_000)), DirtyAction::FlushNow { cancel: None });
    }

    #[test]
    fn late_timer_is_cancelled_by_immediate_flush() {
        let mut s = UpdateScheduler::new(ms(500));
        s.flushed(ms(0));
        let DirtyAction::Arm { token, .. } = s.on_dirty(ms(100)) else {
            panic!("expected arm");
        };
        s.armed(token, TimerHandle::new(3));

        // Host delivered the dirty signal before the overdue timer.
        let action = s.on_dirty(ms(700));
        assert_eq!(
            action,
            DirtyAction::FlushNow {
                cancel: Some(TimerHandle::new(3))
            }
        );
        assert!(!s.on_timer(token));
    }

    #[test]
    fn armed_ignores_stale_token() {
        let mut s = UpdateScheduler::new(ms(500));
        s.flushed(ms(0));
        let _ = s.on_dirty(ms(1));
        let _ = s.on_dirty(ms(2));
        s.armed(1, TimerHandle::new(99));
        assert_eq!(s.take_pending(), None);
    }

    #[test]
    fn zero_delay_always_flushes() {
        let mut s = UpdateScheduler::new(Duration::ZERO);
        s.flushed(ms(5));
        assert_eq!(s.on_dirty(ms(5)), DirtyAction::FlushNow { cancel: None });
    }

    #[test]
    fn flushed_records_time() {
        let mut s = UpdateScheduler::new(ms(500));
        assert_eq!(s.last_flush(), None);
        s.flushed(ms(42));
        assert_eq!(s.last_flush(), Some(ms(42)));
    }
}
