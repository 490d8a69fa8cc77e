#![forbid(unsafe_code)]

use std::rc::Rc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use urlstate::core::testing::SimulatedHost;
use urlstate::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Range {
    min: u32,
    max: u32,
}

#[test]
fn filter_page_round_trip() {
    let host =
        SimulatedHost::new("/search?q=lamp&price=%7B%22max%22%3A80%2C%22min%22%3A20%7D#results");
    let serializers =
        SerializerRegistry::new().with("range", Serializer::serde::<Range>("range"));
    let engine = SyncEngine::builder()
        .serializers(serializers)
        .delay(Duration::from_millis(250))
        .clock(host.clock.clone())
        .timers(host.timers.clone())
        .location(host.location.clone())
        .build()
        .unwrap();

    let unbounded = Value::tagged("range", &Range { min: 0, max: 1000 }).unwrap();
    let filters = Rc::new(
        ObservableStore::new()
            .with("query", "")
            .with("price", unbounded.clone())
            .with("in_stock", false),
    );
    engine.register(&filters, "query", "q", FieldOptions::new()).unwrap();
    engine.register(&filters, "price", "price", FieldOptions::new()).unwrap();
    engine
        .register(&filters, "in_stock", "stock", FieldOptions::new())
        .unwrap();

    assert_eq!(filters.get("query"), Some(Value::from("lamp")));
    let price: Range = filters
        .get("price")
        .unwrap()
        .as_tagged()
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(price, Range { min: 20, max: 80 });

    host.advance_ms(300);
    filters.set("in_stock", Value::from(true)).unwrap();
    assert_eq!(
        host.location.url(),
        "/search?q=lamp&price=%7B%22max%22%3A80%2C%22min%22%3A20%7D&stock=true#results"
    );

    host.advance_ms(50);
    filters.set("price", unbounded).unwrap();
    filters.set("query", Value::from("desk lamp")).unwrap();
    assert_eq!(host.location.write_count(), 1);

    host.advance_ms(200);
    assert_eq!(host.location.url(), "/search?q=desk+lamp&stock=true#results");
    assert_eq!(engine.stats().writes, 2);
}
