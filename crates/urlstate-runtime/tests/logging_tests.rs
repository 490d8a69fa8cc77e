#![forbid(unsafe_code)]

//! Diagnostics emitted by the engine, captured with a registry layer.

use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use urlstate_core::testing::SimulatedHost;
use urlstate_core::{ObservableStore, PropertyStore, Value};
use urlstate_runtime::{FieldOptions, SyncEngine};

#[derive(Debug, Clone)]
struct Captured {
    level: Level,
    message: String,
    fields: Vec<(String, String)>,
    span: Option<String>,
}

impl Captured {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Default)]
struct Capture {
    events: Arc<Mutex<Vec<Captured>>>,
    spans: Arc<Mutex<Vec<String>>>,
}

impl Capture {
    fn events(&self) -> Vec<Captured> {
        self.events.lock().unwrap().clone()
    }

    fn at(&self, level: Level) -> Vec<Captured> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }

    fn span_count(&self, name: &str) -> usize {
        self.spans.lock().unwrap().iter().filter(|s| *s == name).count()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{value:?}");
        if field.name() == "message" {
            self.message = text;
        } else {
            self.fields.push((field.name().to_owned(), text));
        }
    }
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        self.spans
            .lock()
            .unwrap()
            .push(attrs.metadata().name().to_owned());
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let span = ctx.event_span(event).map(|s| s.name().to_owned());
        self.events.lock().unwrap().push(Captured {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
            span,
        });
    }
}

fn with_capture(f: impl FnOnce()) -> Capture {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    tracing::subscriber::with_default(subscriber, f);
    capture
}

fn engine_for(host: &SimulatedHost) -> SyncEngine {
    SyncEngine::builder()
        .clock(host.clock.clone())
        .timers(host.timers.clone())
        .location(host.location.clone())
        .build()
        .expect("engine builds")
}

#[test]
fn hydration_failure_is_reported_as_warning() {
    let capture = with_capture(|| {
        let host = SimulatedHost::new("/?counter=many");
        let engine = engine_for(&host);
        let store = Rc::new(ObservableStore::new().with("counter", 1));
        engine
            .register(&store, "counter", "counter", FieldOptions::new())
            .unwrap();
        assert_eq!(store.get("counter"), Some(Value::Number(1.0)));
    });

    let warnings = capture.at(Level::WARN);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    let warning = &warnings[0];
    assert!(warning.message.contains("failed to hydrate"));
    assert_eq!(warning.field("param"), Some("counter"));
    assert_eq!(warning.field("raw"), Some("many"));
}

#[test]
fn successful_hydration_logs_no_warning() {
    let capture = with_capture(|| {
        let host = SimulatedHost::new("/?counter=4");
        let engine = engine_for(&host);
        let store = Rc::new(ObservableStore::new().with("counter", 1));
        engine
            .register(&store, "counter", "counter", FieldOptions::new())
            .unwrap();
    });

    assert!(capture.at(Level::WARN).is_empty());
    assert!(
        capture
            .at(Level::DEBUG)
            .iter()
            .any(|e| e.message == "hydrated from url")
    );
}

#[test]
fn writes_happen_inside_flush_span() {
    let capture = with_capture(|| {
        let host = SimulatedHost::new("/");
        let engine = engine_for(&host);
        let store = Rc::new(ObservableStore::new().with("counter", 0));
        engine
            .register(&store, "counter", "counter", FieldOptions::new())
            .unwrap();
        store.set("counter", Value::from(2)).unwrap();
        engine.flush_now();
        engine.flush_now();
    });

    assert_eq!(capture.span_count("urlstate.flush"), 2);
    let write = capture
        .events()
        .into_iter()
        .find(|e| e.message == "history entry replaced")
        .expect("write logged");
    assert_eq!(write.span.as_deref(), Some("urlstate.flush"));
    assert_eq!(write.field("url"), Some("/?counter=2"));
    assert!(
        capture
            .events()
            .iter()
            .any(|e| e.message == "url already up to date")
    );
}

#[test]
fn rejected_write_is_reported_as_warning() {
    let capture = with_capture(|| {
        let host = SimulatedHost::new("/");
        host.location.set_fail_writes(true);
        let engine = engine_for(&host);
        let store = Rc::new(ObservableStore::new().with("counter", 0));
        engine
            .register(&store, "counter", "counter", FieldOptions::new())
            .unwrap();
        store.set("counter", Value::from(1)).unwrap();
        host.advance_ms(500);
        assert_eq!(engine.stats().failed_writes, 1);
    });

    let warnings = capture.at(Level::WARN);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert_eq!(warnings[0].message, "history write rejected");
}
