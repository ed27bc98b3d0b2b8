//! Pipeline configuration and assembly.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strata_middleware::policy::{readonly, retry, throttle, RateConfig, RetryConfig};
use strata_middleware::{
    logging, metrics, shard, span, LoggingConfig, MetricsConfig, Multilevel, StoreMetrics,
};
use strata_store::{InMemoryStore, SharedStore};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of in-memory backends behind the shard router.
    pub shards: usize,
    /// In-memory cache levels in front of the shards.
    pub cache_levels: usize,
    /// Refuse set and delete.
    pub readonly: bool,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    /// Token bucket in front of the cascade; unlimited by default.
    pub rate: RateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shards: 2,
            cache_levels: 1,
            readonly: false,
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            retry: None,
            rate: RateConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

/// An assembled store together with the handles used to report on it.
pub struct Pipeline {
    pub store: SharedStore,
    pub metrics: Arc<StoreMetrics>,
    backfill_failures: Arc<AtomicU64>,
}

impl Pipeline {
    pub fn backfill_failures(&self) -> u64 {
        self.backfill_failures.load(Ordering::Relaxed)
    }
}

/// Assemble the store described by `config`, outermost layer first:
/// logging, metrics, readonly, retry, throttle, then the cascade of cache
/// levels in front of the span-traced shards.
pub fn build(config: &PipelineConfig) -> anyhow::Result<Pipeline> {
    let shards = (0..config.shards)
        .map(|_| span::wrap(Arc::new(InMemoryStore::new())))
        .collect();
    let sharded = shard::wrap(shards).context("building shard router")?;

    let mut levels: Vec<SharedStore> = (0..config.cache_levels)
        .map(|_| Arc::new(InMemoryStore::new()) as SharedStore)
        .collect();
    levels.push(sharded);

    let backfill_failures = Arc::new(AtomicU64::new(0));
    let cascade = Multilevel::new(levels)
        .context("building cache cascade")?
        .with_backfill_failures(backfill_failures.clone());
    let mut store: SharedStore = Arc::new(cascade);

    store = throttle::wrap(store, throttle::limiter(&config.rate));
    if let Some(retry_config) = &config.retry {
        store = retry::wrap(store, retry_config);
    }
    if config.readonly {
        store = readonly::wrap(store);
    }

    let store_metrics =
        Arc::new(StoreMetrics::new(&config.metrics).context("registering metrics")?);
    store = metrics::wrap(store, &store_metrics);
    store = logging::wrap(store, config.logging.clone());

    debug!(
        shards = config.shards,
        cache_levels = config.cache_levels,
        readonly = config.readonly,
        retry = config.retry.is_some(),
        rate = ?config.rate.per_second,
        "pipeline assembled"
    );

    Ok(Pipeline {
        store,
        metrics: store_metrics,
        backfill_failures,
    })
}
