//! Mock stores shared by the middleware tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use strata_store::{InMemoryStore, Operation, SharedStore, Store, StoreError, StoreResult, Value};

/// One call observed by a [`MockStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Call {
    pub operation: Operation,
    pub key: Option<String>,
}

/// In-memory store that records every call and can be told to fail.
#[derive(Default)]
pub(crate) struct MockStore {
    data: InMemoryStore,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Operation, StoreError>>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A store whose `operation` always fails with `message`.
    pub fn failing(operation: Operation, message: &str) -> Arc<Self> {
        let store = Self::new();
        store.fail(operation, StoreError::message(message));
        store
    }

    pub fn fail(&self, operation: Operation, err: StoreError) {
        self.failures.lock().unwrap().insert(operation, err);
    }

    /// Insert directly, without recording a call.
    pub fn seed(&self, key: &str, value: &[u8]) {
        self.data.set(key, value).unwrap();
    }

    /// Read directly, without recording a call.
    pub fn peek(&self, key: &str) -> Option<Value> {
        if self.data.is_closed() {
            return None;
        }
        self.data.get(key).unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn shared(self: &Arc<Self>) -> SharedStore {
        Arc::clone(self) as SharedStore
    }

    fn record(&self, operation: Operation, key: Option<&str>) -> StoreResult<()> {
        self.calls.lock().unwrap().push(Call {
            operation,
            key: key.map(str::to_owned),
        });
        match self.failures.lock().unwrap().get(&operation) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Store for MockStore {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.record(Operation::Set, Some(key))?;
        self.data.set(key, value)
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.record(Operation::Get, Some(key))?;
        self.data.get(key)
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.record(Operation::Delete, Some(key))?;
        self.data.delete(key)
    }

    fn close(&self) -> StoreResult<()> {
        self.record(Operation::Close, None)?;
        self.data.close()
    }
}

// ---------------------------------------------------------------------------
// Trace capture
// ---------------------------------------------------------------------------

pub(crate) use capture::capture;

mod capture {
    use std::collections::BTreeMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;
    use tracing_subscriber::Registry;

    #[derive(Clone, Debug)]
    pub(crate) struct CapturedEvent {
        pub level: Level,
        pub fields: BTreeMap<String, String>,
    }

    impl CapturedEvent {
        pub fn message(&self) -> &str {
            self.field("message").unwrap_or_default()
        }

        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields.get(name).map(String::as_str)
        }
    }

    #[derive(Clone, Debug)]
    pub(crate) struct CapturedSpan {
        pub id: u64,
        pub name: &'static str,
        pub parent: Option<u64>,
        pub fields: BTreeMap<String, String>,
        pub closed: bool,
    }

    impl CapturedSpan {
        pub fn field(&self, name: &str) -> Option<&str> {
            self.fields.get(name).map(String::as_str)
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct Captures {
        events: Arc<Mutex<Vec<CapturedEvent>>>,
        spans: Arc<Mutex<Vec<CapturedSpan>>>,
    }

    impl Captures {
        pub fn events(&self) -> Vec<CapturedEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn spans(&self) -> Vec<CapturedSpan> {
            self.spans.lock().unwrap().clone()
        }

        fn with_open_span(&self, id: &Id, f: impl FnOnce(&mut CapturedSpan)) {
            let mut spans = self.spans.lock().unwrap();
            if let Some(span) = spans
                .iter_mut()
                .rev()
                .find(|s| s.id == id.into_u64() && !s.closed)
            {
                f(span);
            }
        }
    }

    /// Run `f` with a subscriber that records every event and span.
    pub(crate) fn capture<R>(f: impl FnOnce() -> R) -> (R, Captures) {
        let captures = Captures::default();
        let subscriber = Registry::default().with(CaptureLayer(captures.clone()));
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, captures)
    }

    struct CaptureLayer(Captures);

    impl<S> Layer<S> for CaptureLayer
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
            let mut fields = FieldMap::default();
            attrs.record(&mut fields);
            let parent = ctx
                .span(id)
                .and_then(|span| span.parent())
                .map(|parent| parent.id().into_u64());
            self.0.spans.lock().unwrap().push(CapturedSpan {
                id: id.into_u64(),
                name: attrs.metadata().name(),
                parent,
                fields: fields.0,
                closed: false,
            });
        }

        fn on_record(&self, id: &Id, values: &Record<'_>, _ctx: Context<'_, S>) {
            let mut fields = FieldMap::default();
            values.record(&mut fields);
            self.0.with_open_span(id, |span| span.fields.extend(fields.0));
        }

        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = FieldMap::default();
            event.record(&mut fields);
            self.0.events.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                fields: fields.0,
            });
        }

        fn on_close(&self, id: Id, _ctx: Context<'_, S>) {
            self.0.with_open_span(&id, |span| span.closed = true);
        }
    }

    #[derive(Default)]
    struct FieldMap(BTreeMap<String, String>);

    impl Visit for FieldMap {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_owned(), value.to_owned());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_owned(), format!("{value:?}"));
        }
    }
}
