//! Desired-vs-current query parameter computation.
//!
//! These functions are pure with respect to the engine: they read the live
//! field registry and a location snapshot, and return parameter sets.
//!
//! Comparison is by rendered text, not by value: two values that serialize
//! identically are indistinguishable here, and parameter order matters.

use urlstate_core::{HostError, LocationHost, LocationSnapshot, QueryParams};

use crate::field::FieldRegistry;

/// Read the live location and its decoded query parameters.
pub fn current_params(
    location: &dyn LocationHost,
) -> Result<(LocationSnapshot, QueryParams), HostError> {
    let snapshot = location.snapshot()?;
    let params = snapshot.params();
    Ok((snapshot, params))
}

/// The parameters the URL should carry.
///
/// One pair per entry in registration order, except entries whose serialized
/// value equals their serialized default. With `preserve_unmanaged`, pairs in
/// `current` whose key no entry manages come first, in their current order.
#[must_use]
pub fn desired_params(
    registry: &FieldRegistry,
    current: &QueryParams,
    preserve_unmanaged: bool,
) -> QueryParams {
    let mut desired = QueryParams::new();
    if preserve_unmanaged {
        desired.extend(current.iter().filter(|(key, _)| !registry.contains(key)));
    }
    for entry in registry.iter() {
        if let Some((param, text)) = entry.desired_param() {
            desired.push(param, text);
        }
    }
    desired
}

/// Whether two parameter sets render to the same query string.
#[must_use]
pub fn params_equal(a: &QueryParams, b: &QueryParams) -> bool {
    a.to_query_string() == b.to_query_string()
}

/// Path (plus fragment) of `snapshot` with `params` as the query.
#[must_use]
pub fn render(snapshot: &LocationSnapshot, params: &QueryParams) -> String {
    snapshot.render(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldEntry, FieldOptions};
    use crate::serializer::SerializerRegistry;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;
    use urlstate_core::testing::MemoryLocation;
    use urlstate_core::{ObservableStore, PropertyStore, Value};

    fn registry_for(store: &Rc<dyn PropertyStore>, bindings: &[(&str, &str)]) -> FieldRegistry {
        let mut registry = FieldRegistry::new();
        for (property, param) in bindings {
            let entry = FieldEntry::resolve(
                store,
                property,
                param,
                FieldOptions::new(),
                &SerializerRegistry::new(),
            )
            .unwrap();
            registry.insert(entry).unwrap();
        }
        registry
    }

    #[test]
    fn defaults_are_elided() {
        let concrete = Rc::new(ObservableStore::new().with("counter", 0).with("q", ""));
        let store: Rc<dyn PropertyStore> = concrete.clone();
        let registry = registry_for(&store, &[("counter", "counter"), ("q", "q")]);

        let desired = desired_params(&registry, &QueryParams::new(), false);
        assert!(desired.is_empty());

        concrete.set("counter", Value::from(5)).unwrap();
        let desired = desired_params(&registry, &QueryParams::new(), false);
        assert_eq!(desired.to_query_string(), "counter=5");

        concrete.set("counter", Value::from(0)).unwrap();
        assert!(desired_params(&registry, &QueryParams::new(), false).is_empty());
    }

    #[test]
    fn registration_order_drives_param_order() {
        let concrete = Rc::new(ObservableStore::new().with("a", 0).with("b", 0));
        let store: Rc<dyn PropertyStore> = concrete.clone();
        let registry = registry_for(&store, &[("b", "b"), ("a", "a")]);
        concrete.set("a", Value::from(1)).unwrap();
        concrete.set("b", Value::from(2)).unwrap();

        let desired = desired_params(&registry, &QueryParams::new(), false);
        assert_eq!(desired.to_query_string(), "b=2&a=1");
    }

    #[test]
    fn unmanaged_params_dropped_unless_preserved() {
        let concrete = Rc::new(ObservableStore::new().with("counter", 0));
        let store: Rc<dyn PropertyStore> = concrete.clone();
        let registry = registry_for(&store, &[("counter", "counter")]);
        concrete.set("counter", Value::from(2)).unwrap();
        let current = QueryParams::parse("utm=mail&counter=1");

        assert_eq!(
            desired_params(&registry, &current, false).to_query_string(),
            "counter=2"
        );
        assert_eq!(
            desired_params(&registry, &current, true).to_query_string(),
            "utm=mail&counter=2"
        );
    }

    #[test]
    fn equality_is_order_sensitive() {
        let a = QueryParams::parse("x=1&y=2");
        let b = QueryParams::parse("y=2&x=1");
        assert!(params_equal(&a, &a.clone()));
        assert!(!params_equal(&a, &b));
    }

    #[test]
    fn equality_compares_encoded_text() {
        let a = QueryParams::parse("q=a+b");
        let b = QueryParams::parse("q=a%20b");
        assert!(params_equal(&a, &b));
    }

    #[test]
    fn current_params_reads_location() {
        let location = MemoryLocation::new("/search?q=rust#top");
        let (snapshot, params) = current_params(&location).unwrap();
        assert_eq!(params.get("q"), Some("rust"));
        assert_eq!(render(&snapshot, &QueryParams::new()), "/search#top");
    }
}
