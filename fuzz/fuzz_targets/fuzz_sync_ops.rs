#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use urlstate_core::testing::SimulatedHost;
use urlstate_core::{ObservableStore, PropertyStore, Value};
use urlstate_runtime::{FieldOptions, SyncEngine};

#[derive(Debug, Arbitrary)]
enum Op {
    SetCount(i16),
    SetLabel(String),
    SetFlag(bool),
    Advance(u16),
    FlushNow,
}

fuzz_target!(|input: (String, Vec<Op>)| {
    let (initial_query, ops) = input;
    let host = SimulatedHost::new(&format!("/?{initial_query}"));
    let Ok(engine) = SyncEngine::builder()
        .clock(host.clock.clone())
        .timers(host.timers.clone())
        .location(host.location.clone())
        .build()
    else {
        return;
    };
    let store = Rc::new(
        ObservableStore::new()
            .with("count", 0)
            .with("label", "")
            .with("flag", false),
    );
    for name in ["count", "label", "flag"] {
        let registered = engine.register(&store, name, name, FieldOptions::new());
        assert!(registered.is_ok());
    }

    for op in ops.into_iter().take(64) {
        let result = match op {
            Op::SetCount(n) => store.set("count", Value::from(i32::from(n))),
            Op::SetLabel(s) => store.set("label", Value::from(s)),
            Op::SetFlag(b) => store.set("flag", Value::from(b)),
            Op::Advance(ms) => {
                host.advance_ms(u64::from(ms));
                Ok(())
            }
            Op::FlushNow => {
                engine.flush_now();
                Ok(())
            }
        };
        assert!(result.is_ok());
    }
    host.advance_ms(1_000);
    assert!(!engine.is_pending());

    // Whatever the URL settled on hydrates a fresh store to the same values.
    let reader_host = SimulatedHost::new(&host.location.url());
    let Ok(reader) = SyncEngine::builder()
        .clock(reader_host.clock.clone())
        .timers(reader_host.timers.clone())
        .location(reader_host.location.clone())
        .build()
    else {
        return;
    };
    let mirror = Rc::new(
        ObservableStore::new()
            .with("count", 0)
            .with("label", "")
            .with("flag", false),
    );
    for name in ["count", "label", "flag"] {
        assert!(reader.register(&mirror, name, name, FieldOptions::new()).is_ok());
    }
    for name in ["count", "label", "flag"] {
        let text = |s: &ObservableStore| s.get(name).map(|v| v.to_query_string());
        assert_eq!(text(&mirror), text(&store), "{name}");
    }
});
