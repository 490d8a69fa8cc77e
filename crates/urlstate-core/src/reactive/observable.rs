#![forbid(unsafe_code)]

//! Shared observable values with previous/next change notification.
//!
//! # Usage
//!
//! ```
//! use urlstate_core::reactive::Observable;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let count = Observable::new(0);
//! let seen = Rc::new(Cell::new(0));
//! let s = Rc::clone(&seen);
//! let _sub = count.subscribe(move |v| s.set(*v));
//!
//! count.set(5);
//! assert_eq!(seen.get(), 5);
//! assert_eq!(count.version(), 1);
//! ```
//!
//! # Failure Modes
//!
//! - Callback panic: propagates to the caller of `set()`; the value has
//!   already been committed.
//! - Observable dropped while a `Subscription` is alive: the subscription
//!   simply never fires again.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type ChangeFn<T> = dyn Fn(&T, &T);

struct Inner<T> {
    value: T,
    version: u64,
    subscribers: Vec<Weak<ChangeFn<T>>>,
}

/// A shared, version-tracked value that notifies subscribers on change.
///
/// Cloning an `Observable` yields another handle to the same value.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create an observable holding `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                value,
                version: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone out the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Number of committed changes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn set(&self, value: T) {
        let (previous, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            let previous = std::mem::replace(&mut inner.value, value);
            inner.version += 1;
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let callbacks: Vec<Rc<ChangeFn<T>>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (previous, callbacks)
        };
        if callbacks.is_empty() {
            return;
        }
        let current = self.get();
        for callback in callbacks {
            callback(&previous, &current);
        }
    }

    /// Modify the value in place through a clone, then `set` it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// Subscribe to new values.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.subscribe_change(move |_, next| callback(next))
    }

    /// Subscribe to changes, receiving `(previous, next)`.
    pub fn subscribe_change(&self, callback: impl Fn(&T, &T) + 'static) -> Subscription {
        let strong: Rc<ChangeFn<T>> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _callback: Box::new(strong),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

/// RAII guard keeping a subscriber callback alive.
///
/// Dropping the guard detaches the callback.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
