//! Unified error types for ticklake.
//!
//! All errors are represented by [`LakeError`], using `thiserror` for
//! ergonomic error definitions. Library code never uses `unwrap()` —
//! all fallible operations return `Result<T, LakeError>`.

use thiserror::Error;

/// The unified error type for all ticklake operations.
#[derive(Error, Debug)]
pub enum LakeError {
    /// Invalid configuration: unknown backend name, cyclic `extends` chain,
    /// or a merged config missing required fields.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// A backend could not be constructed or a storage operation failed.
    /// The core performs no retries of its own.
    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The requested key was not found in storage.
    #[error("Not found: {key}")]
    NotFound {
        /// The storage key that was not found.
        key: String,
    },

    /// The normalization quality gate rejected a partition. Only the
    /// partition being processed is affected; previously committed
    /// partitions are untouched.
    #[error("Validation failed for partition {partition}: {} offending row(s)", failures.len())]
    Validation {
        /// The partition that failed, e.g. `"daily_prices/date=2024-01-15"`.
        partition: String,
        /// One description per offending row.
        failures: Vec<String>,
    },

    /// A read was given contradictory filters.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of the filter conflict.
        message: String,
    },

    /// Encoding or decoding data failed (Arrow, Parquet, JSON).
    #[error("Schema error: {message}")]
    Schema {
        /// Description of the encode/decode failure.
        message: String,
    },

    /// An internal error (bug).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl LakeError {
    /// Create a backend-unavailable error from a message and source error.
    pub fn unavailable(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a backend-unavailable error from a message only.
    pub fn unavailable_msg(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a schema error from a message.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
