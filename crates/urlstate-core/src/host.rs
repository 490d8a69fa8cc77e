//! Host collaborators: monotonic clock, one-shot timers, location/history.
//!
//! The engine never touches a browser API directly. Everything time- or
//! URL-related goes through these traits so that tests can drive the engine
//! with simulated time (see `testing`, behind the `test-helpers` feature) and
//! the browser backend lives in its own crate.

use std::fmt;
use std::time::Duration;

use web_time::Instant;

use crate::error::HostError;
use crate::query::QueryParams;

/// Monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`]; works natively and on wasm32.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Opaque identifier of an armed one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Work to run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce()>;

/// "Run this callback once after a duration" primitive.
pub trait TimerHost {
    /// Arm a one-shot timer.
    fn schedule(&self, after: Duration, callback: TimerCallback) -> Result<TimerHandle, HostError>;

    /// Disarm a timer. Unknown or already-fired handles are ignored.
    fn cancel(&self, handle: TimerHandle);
}

/// The parts of the current URL the engine reads.
///
/// `query` and `fragment` are stored without their `?` / `#` sigils.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocationSnapshot {
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl LocationSnapshot {
    /// Split a path-relative URL (`/a/b?x=1#top`) into its parts.
    #[must_use]
    pub fn parse(url: &str) -> Self {
        let (rest, fragment) = url.split_once('#').unwrap_or((url, ""));
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        Self {
            path: path.to_owned(),
            query: query.to_owned(),
            fragment: fragment.to_owned(),
        }
    }

    /// Decoded query parameters.
    #[must_use]
    pub fn params(&self) -> QueryParams {
        QueryParams::parse(&self.query)
    }

    /// The URL this snapshot would have with `params` as its query.
    ///
    /// Yields `path` alone for empty params, `path?query` otherwise; the
    /// fragment is carried over.
    #[must_use]
    pub fn render(&self, params: &QueryParams) -> String {
        let mut url = self.path.clone();
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.to_query_string());
        }
        if !self.fragment.is_empty() {
            url.push('#');
            url.push_str(&self.fragment);
        }
        url
    }
}

impl fmt::Display for LocationSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}

/// Read the address bar; replace the current history entry.
pub trait LocationHost {
    /// Current path, query and fragment.
    fn snapshot(&self) -> Result<LocationSnapshot, HostError>;

    /// Replace the current history entry with `url` without navigating or
    /// adding a history entry.
    fn replace(&self, url: &str) -> Result<(), HostError>;
}
