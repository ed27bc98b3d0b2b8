//! Numeric sink capabilities consumed by the instrumentation core.
//!
//! The core only knows two shapes: an increment-only [`Incrementer`] and a
//! value-observing [`Observer`]. Metric libraries that expose a different
//! shape ("add a delta", "add a float") are adapted at the boundary with
//! [`adder_to_incrementer`] and [`float_adder_to_incrementer`]. Prometheus
//! counters and histograms implement the capabilities directly.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Increment-only counter.
pub trait Incrementer: Send + Sync {
    fn inc(&self);
}

/// Sink for observed values, e.g. durations in seconds.
pub trait Observer: Send + Sync {
    fn observe(&self, value: f64);
}

/// Counter that accepts an integer delta.
pub trait Adder: Send + Sync {
    fn add(&self, delta: i64);
}

/// Counter that accepts a floating point delta.
pub trait FloatAdder: Send + Sync {
    fn add(&self, delta: f64);
}

/// Presents an [`Adder`] as an [`Incrementer`]: each `inc` is one `add(1)`.
pub struct AdderIncrementer<A: ?Sized>(Arc<A>);

impl<A: Adder + ?Sized> Incrementer for AdderIncrementer<A> {
    fn inc(&self) {
        self.0.add(1);
    }
}

/// Presents a [`FloatAdder`] as an [`Incrementer`]: each `inc` is one
/// `add(1.0)`.
pub struct FloatAdderIncrementer<A: ?Sized>(Arc<A>);

impl<A: FloatAdder + ?Sized> Incrementer for FloatAdderIncrementer<A> {
    fn inc(&self) {
        self.0.add(1.0);
    }
}

pub fn adder_to_incrementer<A>(adder: Arc<A>) -> Arc<dyn Incrementer>
where
    A: Adder + ?Sized + 'static,
{
    Arc::new(AdderIncrementer(adder))
}

pub fn float_adder_to_incrementer<A>(adder: Arc<A>) -> Arc<dyn Incrementer>
where
    A: FloatAdder + ?Sized + 'static,
{
    Arc::new(FloatAdderIncrementer(adder))
}

impl Incrementer for AtomicU64 {
    fn inc(&self) {
        self.fetch_add(1, Ordering::Relaxed);
    }
}

impl Adder for AtomicI64 {
    fn add(&self, delta: i64) {
        self.fetch_add(delta, Ordering::Relaxed);
    }
}

impl Incrementer for prometheus::IntCounter {
    fn inc(&self) {
        prometheus::IntCounter::inc(self);
    }
}

impl Incrementer for prometheus::Counter {
    fn inc(&self) {
        prometheus::Counter::inc(self);
    }
}

impl Adder for prometheus::IntGauge {
    fn add(&self, delta: i64) {
        prometheus::IntGauge::add(self, delta);
    }
}

impl FloatAdder for prometheus::Counter {
    fn add(&self, delta: f64) {
        self.inc_by(delta);
    }
}

impl Observer for prometheus::Histogram {
    fn observe(&self, value: f64) {
        prometheus::Histogram::observe(self, value);
    }
}
