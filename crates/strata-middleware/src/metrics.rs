//! Prometheus metrics built on the instrumentation core.
//!
//! [`StoreMetrics`] registers an `operation`-labelled call counter, an error
//! counter, a get-miss counter and, when enabled, a latency histogram on a
//! [`prometheus::Registry`]. [`wrap`] attaches one `StoreMetrics` to a store;
//! the same instance can be attached to several stores to aggregate them.

use std::sync::Arc;

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use serde::{Deserialize, Serialize};
use strata_store::{Operation, SharedStore};

use crate::instrument::{self, InstrumentOption};

pub const DEFAULT_COUNTER_NAME: &str = "strata_handled_total";
pub const DEFAULT_HISTOGRAM_NAME: &str = "strata_handling_seconds";
const ERRORS_NAME: &str = "strata_errors_total";
const MISSES_NAME: &str = "strata_get_misses_total";
const OPERATION_LABEL: &str = "operation";

/// Which metrics to collect and under which names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub counter_name: String,
    /// Record set/get/delete latency histograms.
    pub latency_histograms: bool,
    pub histogram_name: String,
    /// Histogram bucket upper bounds in seconds, strictly increasing.
    pub buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            counter_name: DEFAULT_COUNTER_NAME.to_owned(),
            latency_histograms: false,
            histogram_name: DEFAULT_HISTOGRAM_NAME.to_owned(),
            buckets: prometheus::DEFAULT_BUCKETS.to_vec(),
        }
    }
}

/// One child metric per data operation.
struct ByOperation<T> {
    set: T,
    get: T,
    delete: T,
}

impl<T> ByOperation<T> {
    fn try_new<F>(child: F) -> prometheus::Result<Self>
    where
        F: Fn(Operation) -> prometheus::Result<T>,
    {
        Ok(Self {
            set: child(Operation::Set)?,
            get: child(Operation::Get)?,
            delete: child(Operation::Delete)?,
        })
    }
}

/// Counters and histograms for one or more stores.
pub struct StoreMetrics {
    registry: Registry,
    handled: ByOperation<IntCounter>,
    errors: ByOperation<IntCounter>,
    close_errors: IntCounter,
    get_misses: IntCounter,
    latency: Option<ByOperation<Histogram>>,
}

impl StoreMetrics {
    /// Register the metrics on a fresh registry.
    pub fn new(config: &MetricsConfig) -> prometheus::Result<Self> {
        Self::with_registry(config, Registry::new())
    }

    /// Register the metrics on `registry`. Fails on invalid metric names,
    /// buckets that are not strictly increasing, or a name already taken in
    /// `registry`.
    pub fn with_registry(config: &MetricsConfig, registry: Registry) -> prometheus::Result<Self> {
        let handled_vec = IntCounterVec::new(
            Opts::new(
                config.counter_name.clone(),
                "total number of store calls per operation",
            ),
            &[OPERATION_LABEL],
        )?;
        registry.register(Box::new(handled_vec.clone()))?;

        let errors_vec = IntCounterVec::new(
            Opts::new(ERRORS_NAME, "total number of failed store calls per operation"),
            &[OPERATION_LABEL],
        )?;
        registry.register(Box::new(errors_vec.clone()))?;

        let get_misses = IntCounter::new(MISSES_NAME, "total number of gets that found nothing")?;
        registry.register(Box::new(get_misses.clone()))?;

        let latency = if config.latency_histograms {
            let histogram_vec = HistogramVec::new(
                HistogramOpts::new(
                    config.histogram_name.clone(),
                    "latency in seconds of store calls per operation",
                )
                .buckets(config.buckets.clone()),
                &[OPERATION_LABEL],
            )?;
            registry.register(Box::new(histogram_vec.clone()))?;
            Some(ByOperation::try_new(|op| {
                histogram_vec.get_metric_with_label_values(&[op.as_str()])
            })?)
        } else {
            None
        };

        Ok(Self {
            handled: ByOperation::try_new(|op| {
                handled_vec.get_metric_with_label_values(&[op.as_str()])
            })?,
            errors: ByOperation::try_new(|op| {
                errors_vec.get_metric_with_label_values(&[op.as_str()])
            })?,
            close_errors: errors_vec
                .get_metric_with_label_values(&[Operation::Close.as_str()])?,
            get_misses,
            latency,
            registry,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The instrumentation options that feed these metrics.
    pub fn options(&self) -> Vec<InstrumentOption> {
        let mut options = vec![
            InstrumentOption::SetHitCounter(Arc::new(self.handled.set.clone())),
            InstrumentOption::GetHitCounter(Arc::new(self.handled.get.clone())),
            InstrumentOption::GetMissCounter(Arc::new(self.get_misses.clone())),
            InstrumentOption::DeleteHitCounter(Arc::new(self.handled.delete.clone())),
        ];

        let errors = self.errors.set.clone();
        options.push(InstrumentOption::on_set(move |event| {
            count_error(&errors, event.error.is_some())
        }));
        let errors = self.errors.get.clone();
        options.push(InstrumentOption::on_get(move |event| {
            count_error(&errors, event.error.is_some())
        }));
        let errors = self.errors.delete.clone();
        options.push(InstrumentOption::on_delete(move |event| {
            count_error(&errors, event.error.is_some())
        }));
        let errors = self.close_errors.clone();
        options.push(InstrumentOption::on_close(move |event| {
            count_error(&errors, event.error.is_some())
        }));

        if let Some(latency) = &self.latency {
            options.push(InstrumentOption::SetDurationObserver(Arc::new(latency.set.clone())));
            options.push(InstrumentOption::GetDurationObserver(Arc::new(latency.get.clone())));
            options.push(InstrumentOption::DeleteDurationObserver(Arc::new(
                latency.delete.clone(),
            )));
        }
        options
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let summary = |h: &Histogram| LatencySummary {
            count: h.get_sample_count(),
            sum_seconds: h.get_sample_sum(),
        };
        MetricsSnapshot {
            sets: self.handled.set.get(),
            gets: self.handled.get.get(),
            get_misses: self.get_misses.get(),
            deletes: self.handled.delete.get(),
            errors: self.errors.set.get()
                + self.errors.get.get()
                + self.errors.delete.get()
                + self.close_errors.get(),
            set_latency: self.latency.as_ref().map(|l| summary(&l.set)),
            get_latency: self.latency.as_ref().map(|l| summary(&l.get)),
            delete_latency: self.latency.as_ref().map(|l| summary(&l.delete)),
        }
    }

    /// The registry in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

fn count_error(errors: &IntCounter, failed: bool) {
    if failed {
        errors.inc();
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub sum_seconds: f64,
}

/// Point-in-time copy of [`StoreMetrics`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub sets: u64,
    pub gets: u64,
    pub get_misses: u64,
    pub deletes: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_latency: Option<LatencySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get_latency: Option<LatencySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_latency: Option<LatencySummary>,
}

/// Feed every call on `inner` into `metrics`.
pub fn wrap(inner: SharedStore, metrics: &StoreMetrics) -> SharedStore {
    instrument::wrap(inner, metrics.options())
}
