//! The reactive-store collaborator contract and its reference implementation.
//!
//! A [`PropertyStore`] is any host object exposing named, observable
//! properties. The synchronization engine only ever needs three things from
//! it: read a property, write a property (during hydration), and observe
//! writes to one property.
//!
//! Observation is a notification tap: callbacks run after the write has been
//! committed and cannot veto or rewrite it.
//!
//! [`ObservableStore`] backs each property with an [`Observable<Value>`].
//! Each property keeps the kind of its first value; textual writes into a
//! number or boolean property are coerced, so a query-string value can be
//! assigned directly.

use std::cell::RefCell;
use std::fmt;

use ahash::AHashMap;

use crate::error::StoreError;
use crate::reactive::{Observable, Subscription};
use crate::value::{Value, ValueKind, parse_bool, parse_number};

/// A committed property change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertyChange<'a> {
    pub property: &'a str,
    pub old: &'a Value,
    pub new: &'a Value,
}

/// Callback invoked after every committed write to an observed property.
pub type ChangeCallback = Box<dyn Fn(&PropertyChange<'_>)>;

/// Capability required of any object whose properties are synchronized.
pub trait PropertyStore {
    /// Read the current value of `property`, or `None` if it is undefined.
    fn get(&self, property: &str) -> Option<Value>;

    /// Write `value` to `property`.
    fn set(&self, property: &str, value: Value) -> Result<(), StoreError>;

    /// Observe committed writes to `property` until the subscription drops.
    fn observe(&self, property: &str, callback: ChangeCallback)
    -> Result<Subscription, StoreError>;
}

/// Reference [`PropertyStore`] built from per-property observables.
#[derive(Default)]
pub struct ObservableStore {
    properties: RefCell<AHashMap<String, Observable<Value>>>,
}

impl ObservableStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property definition.
    #[must_use]
    pub fn with(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.define(property, value);
        self
    }

    /// Define (or redefine) `property` with an initial value and kind.
    ///
    /// Redefining keeps existing subscribers and notifies them if the value
    /// changed.
    pub fn define(&self, property: impl Into<String>, value: impl Into<Value>) {
        let property = property.into();
        let value = value.into();
        let existing = self.observable(&property);
        match existing {
            Some(obs) => obs.set(value),
            None => {
                self.properties
                    .borrow_mut()
                    .insert(property, Observable::new(value));
            }
        }
    }

    /// Handle to the observable backing `property`.
    #[must_use]
    pub fn observable(&self, property: &str) -> Option<Observable<Value>> {
        self.properties.borrow().get(property).cloned()
    }

    /// Number of committed changes to `property`.
    #[must_use]
    pub fn version(&self, property: &str) -> Option<u64> {
        self.observable(property).map(|obs| obs.version())
    }

    /// Defined property names, sorted.
    #[must_use]
    pub fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.properties.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ObservableStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableStore")
            .field("properties", &self.property_names())
            .finish()
    }
}

impl PropertyStore for ObservableStore {
    fn get(&self, property: &str) -> Option<Value> {
        self.observable(property).map(|obs| obs.get())
    }

    fn set(&self, property: &str, value: Value) -> Result<(), StoreError> {
        let Some(obs) = self.observable(property) else {
            self.define(property, value);
            return Ok(());
        };
        let expected = obs.with(Value::kind);
        let value = coerce(property, &expected, value)?;
        obs.set(value);
        Ok(())
    }

    fn observe(
        &self,
        property: &str,
        callback: ChangeCallback,
    ) -> Result<Subscription, StoreError> {
        let obs = self
            .observable(property)
            .ok_or_else(|| StoreError::UnknownProperty(property.to_owned()))?;
        let name = property.to_owned();
        Ok(obs.subscribe_change(move |old, new| {
            callback(&PropertyChange {
                property: &name,
                old,
                new,
            });
        }))
    }
}

fn coerce(property: &str, expected: &ValueKind, value: Value) -> Result<Value, StoreError> {
    if value.kind() == *expected {
        return Ok(value);
    }
    let coerced = match (expected, &value) {
        (ValueKind::Number, Value::Str(raw)) => parse_number(raw).map(Value::Number),
        (ValueKind::Bool, Value::Str(raw)) => parse_bool(raw).map(Value::Bool),
        _ => {
            return Err(StoreError::KindMismatch {
                property: property.to_owned(),
                expected: expected.clone(),
                found: value.kind(),
            });
        }
    };
    coerced.ok_or_else(|| StoreError::Coercion {
        property: property.to_owned(),
        expected: expected.clone(),
        raw: value.to_query_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn builder_defines_properties() {
        let store = ObservableStore::new().with("counter", 0).with("q", "");
        assert_eq!(store.get("counter"), Some(Value::Number(0.0)));
        assert_eq!(store.get("q"), Some(Value::Str(String::new())));
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.property_names(), vec!["counter", "q"]);
    }

    #[test]
    fn string_writes_coerce_into_numbers_and_bools() {
        let store = ObservableStore::new().with("n", 1).with("flag", false);
        store.set("n", Value::from("7")).unwrap();
        store.set("flag", Value::from("true")).unwrap();
        assert_eq!(store.get("n"), Some(Value::Number(7.0)));
        assert_eq!(store.get("flag"), Some(Value::Bool(true)));
    }

    #[test]
    fn failed_coercion_leaves_value_untouched() {
        let store = ObservableStore::new().with("n", 3);
        let err = store.set("n", Value::from("seven")).unwrap_err();
        assert!(matches!(err, StoreError::Coercion { .. }));
        assert_eq!(store.get("n"), Some(Value::Number(3.0)));
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let store = ObservableStore::new().with("q", "text");
        let err = store.set("q", Value::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            StoreError::KindMismatch {
                property: "q".into(),
                expected: ValueKind::Str,
                found: ValueKind::Bool,
            }
        );
    }

    #[test]
    fn set_on_unknown_property_defines_it() {
        let store = ObservableStore::new();
        store.set("late", Value::from(2)).unwrap();
        assert_eq!(store.get("late"), Some(Value::Number(2.0)));
    }

    #[test]
    fn observe_reports_old_and_new() {
        let store = ObservableStore::new().with("n", 1);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = store
            .observe(
                "n",
                Box::new(move |change| {
                    l.borrow_mut().push((
                        change.property.to_owned(),
                        change.old.clone(),
                        change.new.clone(),
                    ));
                }),
            )
            .unwrap();

        store.set("n", Value::from(2)).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![("n".to_owned(), Value::Number(1.0), Value::Number(2.0))]
        );
    }

    #[test]
    fn observe_unknown_property_fails() {
        let store = ObservableStore::new();
        let err = store.observe("nope", Box::new(|_| {})).unwrap_err();
        assert_eq!(err, StoreError::UnknownProperty("nope".into()));
    }

    #[test]
    fn observer_is_scoped_to_one_property() {
        let store = ObservableStore::new().with("a", 0).with("b", 0);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = store
            .observe("a", Box::new(move |_| h.set(h.get() + 1)))
            .unwrap();

        store.set("b", Value::from(1)).unwrap();
        assert_eq!(hits.get(), 0);
        store.set("a", Value::from(1)).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn observer_can_read_store_reentrantly() {
        let store = Rc::new(ObservableStore::new().with("a", 0).with("b", 5));
        let seen = Rc::new(RefCell::new(None));
        let (s, st) = (Rc::clone(&seen), Rc::clone(&store));
        let _sub = store
            .observe(
                "a",
                Box::new(move |_| {
                    *s.borrow_mut() = st.get("b");
                }),
            )
            .unwrap();

        store.set("a", Value::from(1)).unwrap();
        assert_eq!(*seen.borrow(), Some(Value::Number(5.0)));
    }
}
