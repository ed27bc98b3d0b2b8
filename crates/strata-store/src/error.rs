use std::error::Error as StdError;
use std::sync::Arc;

use crate::traits::Operation;

/// Errors produced by stores and the middleware layered on top of them.
///
/// Inner-store errors travel through every wrapper unmodified, so a caller
/// sees exactly the variant the failing backend returned. Only the cascade
/// wraps errors (in [`StoreError::Level`]) to say which level failed.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    /// The key was the empty string.
    #[error("the passed key is an empty string, which is invalid")]
    EmptyKey,

    /// The backend has been closed.
    #[error("store is closed")]
    Closed,

    /// A write was refused because the store is read-only.
    #[error("operation not permitted: store is read-only")]
    ReadOnly,

    /// An operation failed on one level of a cascade.
    #[error("unable to perform {operation}({key:?}) on store level #{level}: {source}")]
    Level {
        operation: Operation,
        key: String,
        level: usize,
        source: Box<StoreError>,
    },

    /// Several independent failures, e.g. from closing every shard.
    ///
    /// Built through [`StoreError::join`], never with fewer than two errors.
    #[error("{}", render_aggregate(.0))]
    Aggregate(Vec<StoreError>),

    /// A composite store was built from an empty store list.
    #[error("{middleware} requires at least one inner store")]
    NoStores { middleware: &'static str },

    /// A value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// An opaque error raised by a concrete backend.
    #[error("{0}")]
    Backend(Arc<dyn StdError + Send + Sync>),
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend(Arc::new(err))
    }

    /// Wrap a plain message as a backend error.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Backend(Arc::new(Message(msg.into())))
    }

    /// Combine independent failures into a single result.
    ///
    /// No errors yields `Ok(())`, a single error is returned as-is, and two
    /// or more become [`StoreError::Aggregate`].
    pub fn join(mut errors: Vec<StoreError>) -> StoreResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Aggregate(errors)),
        }
    }

    /// The errors behind this one: the members of an aggregate, or itself.
    pub fn errors(&self) -> Vec<&StoreError> {
        match self {
            Self::Aggregate(errors) => errors.iter().collect(),
            other => vec![other],
        }
    }
}

fn render_aggregate(errors: &[StoreError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug)]
struct Message(String);

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for Message {}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
