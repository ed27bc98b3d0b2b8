//! The instrumentation core.
//!
//! [`wrap`] decorates a store with per-call identity, timing and result
//! callbacks. Every observability wrapper in this crate ([`crate::logging`],
//! [`crate::span`], [`crate::metrics`]) is a thin set of
//! [`InstrumentOption`]s handed to this core.
//!
//! # Call sequence
//!
//! For every set/get/delete/close on an [`Instrumented`] store:
//!
//! 1. hit counters for the operation are incremented;
//! 2. a [`TraceId`] is minted from the configured [`RandomSource`];
//! 3. trace callbacks run in registration order and may hand back a
//!    [`Completion`];
//! 4. the inner call runs, and only the inner call is timed;
//! 5. get-miss counters are incremented when a get found nothing;
//! 6. per-operation callbacks run in registration order, success or not;
//! 7. duration observers receive the elapsed time in seconds;
//! 8. completions run in reverse registration order;
//! 9. the inner result is returned untouched.
//!
//! Callbacks run sequentially on the calling thread, so they all see the same
//! duration, outcome and trace id without synchronising among themselves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_store::{Operation, SharedStore, Store, StoreError, StoreResult, Value};

use crate::stats::{Incrementer, Observer};
use crate::trace::{CallArgs, CallContext, RandomSource, ThreadRandom, TraceId};

// ---------------------------------------------------------------------------
// Callback shapes
// ---------------------------------------------------------------------------

/// Runs after the inner call of the call that produced it.
pub type Completion = Box<dyn FnOnce(&CallContext, Option<&StoreError>) + Send>;

/// Runs before the inner call; may return a [`Completion`] to bracket it.
pub type TraceCallback =
    Arc<dyn Fn(&CallContext, &CallArgs<'_>) -> Option<Completion> + Send + Sync>;

pub type SetCallback = Arc<dyn Fn(&SetEvent<'_>) + Send + Sync>;
pub type GetCallback = Arc<dyn Fn(&GetEvent<'_>) + Send + Sync>;
pub type DeleteCallback = Arc<dyn Fn(&DeleteEvent<'_>) + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn(&CloseEvent<'_>) + Send + Sync>;

/// Box a closure as a [`Completion`].
pub fn completion<F>(f: F) -> Completion
where
    F: FnOnce(&CallContext, Option<&StoreError>) + Send + 'static,
{
    Box::new(f)
}

/// A finished set.
#[derive(Debug)]
pub struct SetEvent<'a> {
    pub context: &'a CallContext,
    pub duration: Duration,
    pub key: &'a str,
    pub value: &'a [u8],
    pub error: Option<&'a StoreError>,
}

/// A finished get.
#[derive(Debug)]
pub struct GetEvent<'a> {
    pub context: &'a CallContext,
    pub duration: Duration,
    pub key: &'a str,
    /// The value read, if the key was found.
    pub value: Option<&'a [u8]>,
    pub found: bool,
    pub error: Option<&'a StoreError>,
}

/// A finished delete.
#[derive(Debug)]
pub struct DeleteEvent<'a> {
    pub context: &'a CallContext,
    pub duration: Duration,
    pub key: &'a str,
    pub error: Option<&'a StoreError>,
}

/// A finished close.
#[derive(Debug)]
pub struct CloseEvent<'a> {
    pub context: &'a CallContext,
    pub duration: Duration,
    pub error: Option<&'a StoreError>,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// One discrete instrumentation setting, applied in order by [`wrap`].
pub enum InstrumentOption {
    /// Replace the trace id source. The last one given wins.
    RandomSource(Arc<dyn RandomSource>),
    Trace(TraceCallback),
    Set(SetCallback),
    Get(GetCallback),
    Delete(DeleteCallback),
    Close(CloseCallback),
    SetHitCounter(Arc<dyn Incrementer>),
    GetHitCounter(Arc<dyn Incrementer>),
    GetMissCounter(Arc<dyn Incrementer>),
    DeleteHitCounter(Arc<dyn Incrementer>),
    SetDurationObserver(Arc<dyn Observer>),
    GetDurationObserver(Arc<dyn Observer>),
    DeleteDurationObserver(Arc<dyn Observer>),
}

impl InstrumentOption {
    pub fn random_source(source: impl RandomSource + 'static) -> Self {
        Self::RandomSource(Arc::new(source))
    }

    pub fn on_trace<F>(f: F) -> Self
    where
        F: Fn(&CallContext, &CallArgs<'_>) -> Option<Completion> + Send + Sync + 'static,
    {
        Self::Trace(Arc::new(f))
    }

    pub fn on_set<F>(f: F) -> Self
    where
        F: Fn(&SetEvent<'_>) + Send + Sync + 'static,
    {
        Self::Set(Arc::new(f))
    }

    pub fn on_get<F>(f: F) -> Self
    where
        F: Fn(&GetEvent<'_>) + Send + Sync + 'static,
    {
        Self::Get(Arc::new(f))
    }

    pub fn on_delete<F>(f: F) -> Self
    where
        F: Fn(&DeleteEvent<'_>) + Send + Sync + 'static,
    {
        Self::Delete(Arc::new(f))
    }

    pub fn on_close<F>(f: F) -> Self
    where
        F: Fn(&CloseEvent<'_>) + Send + Sync + 'static,
    {
        Self::Close(Arc::new(f))
    }
}

/// Immutable instrumentation settings, built once from a list of options.
pub struct InstrumentConfig {
    random: Arc<dyn RandomSource>,

    trace_callbacks: Vec<TraceCallback>,
    set_callbacks: Vec<SetCallback>,
    get_callbacks: Vec<GetCallback>,
    delete_callbacks: Vec<DeleteCallback>,
    close_callbacks: Vec<CloseCallback>,

    set_hit_counters: Vec<Arc<dyn Incrementer>>,
    get_hit_counters: Vec<Arc<dyn Incrementer>>,
    get_miss_counters: Vec<Arc<dyn Incrementer>>,
    delete_hit_counters: Vec<Arc<dyn Incrementer>>,

    set_observers: Vec<Arc<dyn Observer>>,
    get_observers: Vec<Arc<dyn Observer>>,
    delete_observers: Vec<Arc<dyn Observer>>,
}

impl InstrumentConfig {
    pub fn from_options<I>(options: I) -> Self
    where
        I: IntoIterator<Item = InstrumentOption>,
    {
        let mut config = Self::default();
        for option in options {
            config.apply(option);
        }
        config
    }

    fn apply(&mut self, option: InstrumentOption) {
        match option {
            InstrumentOption::RandomSource(source) => self.random = source,
            InstrumentOption::Trace(cb) => self.trace_callbacks.push(cb),
            InstrumentOption::Set(cb) => self.set_callbacks.push(cb),
            InstrumentOption::Get(cb) => self.get_callbacks.push(cb),
            InstrumentOption::Delete(cb) => self.delete_callbacks.push(cb),
            InstrumentOption::Close(cb) => self.close_callbacks.push(cb),
            InstrumentOption::SetHitCounter(c) => self.set_hit_counters.push(c),
            InstrumentOption::GetHitCounter(c) => self.get_hit_counters.push(c),
            InstrumentOption::GetMissCounter(c) => self.get_miss_counters.push(c),
            InstrumentOption::DeleteHitCounter(c) => self.delete_hit_counters.push(c),
            InstrumentOption::SetDurationObserver(o) => self.set_observers.push(o),
            InstrumentOption::GetDurationObserver(o) => self.get_observers.push(o),
            InstrumentOption::DeleteDurationObserver(o) => self.delete_observers.push(o),
        }
    }
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            random: Arc::new(ThreadRandom),
            trace_callbacks: Vec::new(),
            set_callbacks: Vec::new(),
            get_callbacks: Vec::new(),
            delete_callbacks: Vec::new(),
            close_callbacks: Vec::new(),
            set_hit_counters: Vec::new(),
            get_hit_counters: Vec::new(),
            get_miss_counters: Vec::new(),
            delete_hit_counters: Vec::new(),
            set_observers: Vec::new(),
            get_observers: Vec::new(),
            delete_observers: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Instrumented store
// ---------------------------------------------------------------------------

/// Decorate `inner` with the given options.
///
/// With no options the very same `Arc` is returned, so unused
/// instrumentation costs nothing.
pub fn wrap<I>(inner: SharedStore, options: I) -> SharedStore
where
    I: IntoIterator<Item = InstrumentOption>,
{
    let options: Vec<InstrumentOption> = options.into_iter().collect();
    if options.is_empty() {
        return inner;
    }
    Arc::new(Instrumented::new(inner, InstrumentConfig::from_options(options)))
}

/// A store whose calls are traced, timed, counted and reported.
pub struct Instrumented {
    inner: SharedStore,
    config: InstrumentConfig,
}

impl Instrumented {
    pub fn new(inner: SharedStore, config: InstrumentConfig) -> Self {
        Self { inner, config }
    }

    fn begin(&self, operation: Operation, args: CallArgs<'_>) -> (CallContext, Vec<Completion>) {
        let context = CallContext {
            trace_id: TraceId::from_u64(self.config.random.next_u64()),
            operation,
        };
        let completions = self
            .config
            .trace_callbacks
            .iter()
            .filter_map(|callback| callback(&context, &args))
            .collect();
        (context, completions)
    }
}

fn increment(counters: &[Arc<dyn Incrementer>]) {
    for counter in counters {
        counter.inc();
    }
}

fn observe(observers: &[Arc<dyn Observer>], duration: Duration) {
    let seconds = duration.as_secs_f64();
    for observer in observers {
        observer.observe(seconds);
    }
}

fn finish(context: &CallContext, completions: Vec<Completion>, error: Option<&StoreError>) {
    for done in completions.into_iter().rev() {
        done(context, error);
    }
}

impl Store for Instrumented {
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        increment(&self.config.set_hit_counters);
        let args = CallArgs {
            key: Some(key),
            value: Some(value),
        };
        let (context, completions) = self.begin(Operation::Set, args);

        let begin = Instant::now();
        let result = self.inner.set(key, value);
        let duration = begin.elapsed();

        let error = result.as_ref().err();
        let event = SetEvent {
            context: &context,
            duration,
            key,
            value,
            error,
        };
        for callback in &self.config.set_callbacks {
            callback(&event);
        }
        observe(&self.config.set_observers, duration);
        finish(&context, completions, error);

        result
    }

    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        increment(&self.config.get_hit_counters);
        let args = CallArgs {
            key: Some(key),
            value: None,
        };
        let (context, completions) = self.begin(Operation::Get, args);

        let begin = Instant::now();
        let result = self.inner.get(key);
        let duration = begin.elapsed();

        if matches!(result, Ok(None)) {
            increment(&self.config.get_miss_counters);
        }

        let (value, error) = match &result {
            Ok(value) => (value.as_deref(), None),
            Err(err) => (None, Some(err)),
        };
        let event = GetEvent {
            context: &context,
            duration,
            key,
            value,
            found: value.is_some(),
            error,
        };
        for callback in &self.config.get_callbacks {
            callback(&event);
        }
        observe(&self.config.get_observers, duration);
        finish(&context, completions, error);

        result
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        increment(&self.config.delete_hit_counters);
        let args = CallArgs {
            key: Some(key),
            value: None,
        };
        let (context, completions) = self.begin(Operation::Delete, args);

        let begin = Instant::now();
        let result = self.inner.delete(key);
        let duration = begin.elapsed();

        let error = result.as_ref().err();
        let event = DeleteEvent {
            context: &context,
            duration,
            key,
            error,
        };
        for callback in &self.config.delete_callbacks {
            callback(&event);
        }
        observe(&self.config.delete_observers, duration);
        finish(&context, completions, error);

        result
    }

    fn close(&self) -> StoreResult<()> {
        let (context, completions) = self.begin(Operation::Close, CallArgs::default());

        let begin = Instant::now();
        let result = self.inner.close();
        let duration = begin.elapsed();

        let error = result.as_ref().err();
        let event = CloseEvent {
            context: &context,
            duration,
            error,
        };
        for callback in &self.config.close_callbacks {
            callback(&event);
        }
        finish(&context, completions, error);

        result
    }
}
