//! Error types shared across crates.

use std::time::Duration;

/// Errors reported by a [`Ledger`](crate::backend::Ledger) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The backend cannot serve requests.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// A named entity does not exist.
    #[error("{what} not found: {key}")]
    NotFound {
        /// Kind of entity.
        what: &'static str,
        /// Lookup key.
        key: String,
    },

    /// Caller-supplied input was rejected.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// A contract script failed to compile.
    #[error("script compilation failed: {0}")]
    Compile(String),

    /// The backend refused a subscription.
    #[error("subscription {key} rejected: {reason}")]
    Subscription {
        /// Subscription key.
        key: String,
        /// Rejection reason.
        reason: String,
    },

    /// A backend call exceeded its deadline.
    #[error("backend call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The level directive could not be parsed.
    #[error("invalid log filter '{directive}': {message}")]
    Filter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}
