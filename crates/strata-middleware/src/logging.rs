//! Structured call logging through `tracing`.
//!
//! [`wrap`] emits one event per completed call. Successful calls are logged
//! at [`LoggingConfig::success_level`], failed ones at
//! [`LoggingConfig::error_level`] with the error attached.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_store::{SharedStore, StoreError};
use tracing::Level;

use crate::instrument::{self, InstrumentOption};
use crate::trace::CallContext;

/// A `tracing` level that can be read from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub success_level: LogLevel,
    pub error_level: LogLevel,
    /// Also log each call before it reaches the inner store, at TRACE.
    pub log_calls: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            success_level: LogLevel::Debug,
            error_level: LogLevel::Warn,
            log_calls: false,
        }
    }
}

// `tracing` levels are part of the callsite, so a runtime level needs one
// callsite per arm.
macro_rules! event_at {
    ($level:expr, $($args:tt)+) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($args)+),
            LogLevel::Debug => tracing::debug!($($args)+),
            LogLevel::Info => tracing::info!($($args)+),
            LogLevel::Warn => tracing::warn!($($args)+),
            LogLevel::Error => tracing::error!($($args)+),
        }
    };
}

struct Outcome<'a> {
    context: &'a CallContext,
    key: Option<&'a str>,
    found: Option<bool>,
    duration: Duration,
    error: Option<&'a StoreError>,
}

fn emit(config: &LoggingConfig, outcome: Outcome<'_>) {
    let Outcome {
        context,
        key,
        found,
        duration,
        error,
    } = outcome;
    match error {
        Some(err) => event_at!(
            config.error_level,
            operation = %context.operation,
            key,
            found,
            duration = ?duration,
            trace_id = %context.trace_id,
            error = %err,
            "store returned error"
        ),
        None => event_at!(
            config.success_level,
            operation = %context.operation,
            key,
            found,
            duration = ?duration,
            trace_id = %context.trace_id,
            "store returned success"
        ),
    }
}

/// The instrumentation options that implement `config`.
pub fn options(config: LoggingConfig) -> Vec<InstrumentOption> {
    let config = Arc::new(config);
    let mut options = Vec::with_capacity(5);

    if config.log_calls {
        options.push(InstrumentOption::on_trace(|context, args| {
            tracing::trace!(
                operation = %context.operation,
                key = args.key,
                trace_id = %context.trace_id,
                "store call"
            );
            None
        }));
    }

    let c = Arc::clone(&config);
    options.push(InstrumentOption::on_set(move |event| {
        emit(
            &c,
            Outcome {
                context: event.context,
                key: Some(event.key),
                found: None,
                duration: event.duration,
                error: event.error,
            },
        )
    }));
    let c = Arc::clone(&config);
    options.push(InstrumentOption::on_get(move |event| {
        emit(
            &c,
            Outcome {
                context: event.context,
                key: Some(event.key),
                found: Some(event.found),
                duration: event.duration,
                error: event.error,
            },
        )
    }));
    let c = Arc::clone(&config);
    options.push(InstrumentOption::on_delete(move |event| {
        emit(
            &c,
            Outcome {
                context: event.context,
                key: Some(event.key),
                found: None,
                duration: event.duration,
                error: event.error,
            },
        )
    }));
    options.push(InstrumentOption::on_close(move |event| {
        emit(
            &config,
            Outcome {
                context: event.context,
                key: None,
                found: None,
                duration: event.duration,
                error: event.error,
            },
        )
    }));
    options
}

/// Log every call on `inner`.
pub fn wrap(inner: SharedStore, config: LoggingConfig) -> SharedStore {
    instrument::wrap(inner, options(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{capture, MockStore};
    use crate::trace::SeededRandom;
    use strata_store::{Operation, Store};

    #[test]
    fn success_logged_at_success_level() {
        let store = wrap(MockStore::new().shared(), LoggingConfig::default());

        let (_, captures) = capture(|| store.set("user:1", b"x").unwrap());

        let events = captures.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::DEBUG);
        assert_eq!(events[0].message(), "store returned success");
        assert_eq!(events[0].field("operation"), Some("set"));
        assert_eq!(events[0].field("key"), Some("user:1"));
        assert!(events[0].field("duration").is_some());
        assert!(events[0].field("error").is_none());
        assert!(events[0].field("found").is_none());
    }

    #[test]
    fn failure_logged_at_error_level_with_error() {
        let inner = MockStore::failing(Operation::Delete, "disk on fire");
        let store = wrap(inner.shared(), LoggingConfig::default());

        let (result, captures) = capture(|| store.delete("k"));

        assert_eq!(result.unwrap_err().to_string(), "disk on fire");
        let events = captures.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::WARN);
        assert_eq!(events[0].message(), "store returned error");
        assert_eq!(events[0].field("error"), Some("disk on fire"));
    }

    #[test]
    fn get_reports_found() {
        let inner = MockStore::new();
        inner.seed("present", b"1");
        let store = wrap(inner.shared(), LoggingConfig::default());

        let (_, captures) = capture(|| {
            store.get("present").unwrap();
            store.get("absent").unwrap();
        });

        let found: Vec<_> = captures
            .events()
            .iter()
            .map(|e| e.field("found").map(str::to_owned))
            .collect();
        assert_eq!(found, vec![Some("true".to_owned()), Some("false".to_owned())]);
    }

    #[test]
    fn trace_id_matches_random_source() {
        let options = std::iter::once(InstrumentOption::random_source(|| 0xabcd_u64))
            .chain(options(LoggingConfig::default()));
        let store = instrument::wrap(MockStore::new().shared(), options);

        let (_, captures) = capture(|| store.close().unwrap());

        let events = captures.events();
        let logged = events
            .iter()
            .find(|e| e.message() == "store returned success")
            .expect("close logged");
        assert_eq!(logged.field("trace_id"), Some("000000000000abcd"));
        assert_eq!(logged.field("operation"), Some("close"));
        assert!(logged.field("key").is_none());
    }

    #[test]
    fn log_calls_adds_trace_event_first() {
        let config = LoggingConfig {
            success_level: LogLevel::Info,
            log_calls: true,
            ..LoggingConfig::default()
        };
        let options = std::iter::once(InstrumentOption::random_source(SeededRandom::new(7)))
            .chain(options(config));
        let store = instrument::wrap(MockStore::new().shared(), options);

        let (_, captures) = capture(|| store.set("k", b"v").unwrap());

        let events = captures.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, Level::TRACE);
        assert_eq!(events[0].message(), "store call");
        assert_eq!(events[1].level, Level::INFO);
        assert_eq!(events[0].field("trace_id"), events[1].field("trace_id"));
    }

    #[test]
    fn config_levels_are_lower_case() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"success_level":"info","error_level":"error"}"#).unwrap();
        assert_eq!(config.success_level, LogLevel::Info);
        assert_eq!(config.error_level, LogLevel::Error);
        assert!(!config.log_calls);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
    }
}
