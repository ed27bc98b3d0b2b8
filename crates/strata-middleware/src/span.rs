//! One `tracing` span per store call.
//!
//! The span is entered for the duration of the inner call, so spans opened by
//! stacked wrappers nest and events emitted by inner stores are attributed to
//! the call that caused them.

use strata_store::SharedStore;
use tracing::field;

use crate::instrument::{self, completion, InstrumentOption};

/// The instrumentation option that opens a `store_call` span per call.
pub fn option() -> InstrumentOption {
    InstrumentOption::on_trace(|context, args| {
        let span = tracing::info_span!(
            "store_call",
            operation = %context.operation,
            trace_id = %context.trace_id,
            key = args.key,
            error = field::Empty,
        );
        span.with_subscriber(|(id, dispatch)| dispatch.enter(id));
        Some(completion(move |_, error| {
            if let Some(err) = error {
                span.record("error", field::display(err));
            }
            span.with_subscriber(|(id, dispatch)| dispatch.exit(id));
        }))
    })
}

/// Trace every call on `inner` with a span.
pub fn wrap(inner: SharedStore) -> SharedStore {
    instrument::wrap(inner, [option()])
}
