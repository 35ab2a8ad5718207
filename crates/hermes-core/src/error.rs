//! Error types for Hermes.
//!
//! [`DispatchError`] is the one error type that crosses the dispatch engine.
//! Failures raised by handlers and middleware are captured onto the
//! invocation context as a `DispatchError`; the mediator's non-capturing
//! calls return it to the caller.
//!
//! # Aggregation
//!
//! A dispatch can record more than one failure (parallel handlers, for
//! example). [`DispatchError::merge`] implements the accumulation rule:
//!
//! | Previous | Added | Result |
//! |---|---|---|
//! | none | `e` | `e` |
//! | single `a` | `e` | `Aggregate([a, e])` |
//! | `Aggregate([a, b])` | `e` | `Aggregate([a, b, e])` |
//! | single `a` | `Aggregate([b, c])` | `Aggregate([a, b, c])` |
//!
//! Aggregates never nest.

use crate::contract::RouteKey;
use crate::di::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`DispatchError`].
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Categories of dispatch failures, used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No pipeline is registered for the route.
    Routing,
    /// The pipeline for the route is misconfigured.
    Configuration,
    /// A middleware, handler or strategy could not be resolved.
    Resolution,
    /// User code failed.
    Handler,
    /// The caller cancelled the dispatch.
    Cancelled,
    /// User code panicked.
    Panic,
    /// More than one failure was recorded.
    Aggregate,
}

/// Standard error type for Hermes.
///
/// # Example
///
/// ```
/// use hermes_core::{DispatchError, ErrorCategory};
///
/// let err = DispatchError::handler(std::io::Error::other("disk full"));
/// assert_eq!(err.category(), ErrorCategory::Handler);
/// assert!(err.downcast_ref::<std::io::Error>().is_some());
/// ```
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No handler is registered for the dispatched route.
    #[error("no handler registered for contract {route}")]
    NotFound {
        /// The route that was dispatched.
        route: RouteKey,
    },

    /// The pipeline for a route could not be built.
    #[error("invalid pipeline configuration for {route}: {reason}")]
    Configuration {
        /// The misconfigured route.
        route: RouteKey,
        /// Why the pipeline is invalid.
        reason: String,
    },

    /// A component resolver failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A handler received a contract of an unexpected type.
    #[error("contract type mismatch: expected {expected}, got {actual}")]
    ContractMismatch {
        /// The contract type the handler accepts.
        expected: &'static str,
        /// The contract type that was delivered.
        actual: &'static str,
    },

    /// The caller's cancel signal was observed.
    #[error("dispatch was cancelled")]
    Cancelled,

    /// User code panicked while the dispatch was running.
    #[error("handler panicked: {message}")]
    Panicked {
        /// The panic payload, if it was a string.
        message: String,
    },

    /// User code returned an error.
    #[error(transparent)]
    Handler(anyhow::Error),

    /// Two or more failures recorded during one dispatch, in insertion order.
    #[error("{} errors occurred during dispatch: {}", .0.len(), AggregateDisplay(.0))]
    Aggregate(Vec<DispatchError>),
}

impl DispatchError {
    /// Wraps a user error.
    pub fn handler(error: impl Into<anyhow::Error>) -> Self {
        Self::Handler(error.into())
    }

    /// Creates a routing failure for `route`.
    #[must_use]
    pub const fn not_found(route: RouteKey) -> Self {
        Self::NotFound { route }
    }

    /// Creates a configuration error for `route`.
    #[must_use]
    pub fn configuration(route: RouteKey, reason: impl Into<String>) -> Self {
        Self::Configuration {
            route,
            reason: reason.into(),
        }
    }

    /// Creates an error from a panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Accumulates `added` onto an optional previous error.
    ///
    /// See the module documentation for the rule.
    #[must_use]
    pub fn merge(previous: Option<Self>, added: Self) -> Self {
        let mut errors = match previous {
            None => return added,
            Some(Self::Aggregate(errors)) => errors,
            Some(single) => vec![single],
        };
        match added {
            Self::Aggregate(inner) => errors.extend(inner),
            single => errors.push(single),
        }
        Self::Aggregate(errors)
    }

    /// Returns the recorded errors as a slice.
    ///
    /// A non-aggregate error yields itself.
    #[must_use]
    pub fn errors(&self) -> &[DispatchError] {
        match self {
            Self::Aggregate(errors) => errors.as_slice(),
            single => std::slice::from_ref(single),
        }
    }

    /// Returns `true` if this is an aggregate of several errors.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate(_))
    }

    /// Returns `true` if this is a routing failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the user error as `E`, if this wraps one.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Handler(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::Routing,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Resolve(_) | Self::ContractMismatch { .. } => ErrorCategory::Resolution,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Panicked { .. } => ErrorCategory::Panic,
            Self::Handler(_) => ErrorCategory::Handler,
            Self::Aggregate(_) => ErrorCategory::Aggregate,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Resolve(_) => "RESOLVE_ERROR",
            Self::ContractMismatch { .. } => "CONTRACT_MISMATCH",
            Self::Cancelled => "CANCELLED",
            Self::Panicked { .. } => "PANICKED",
            Self::Handler(_) => "HANDLER_ERROR",
            Self::Aggregate(_) => "AGGREGATE_ERROR",
        }
    }
}

impl From<anyhow::Error> for DispatchError {
    fn from(error: anyhow::Error) -> Self {
        Self::Handler(error)
    }
}

struct AggregateDisplay<'a>(&'a [DispatchError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "[{i}] {error}")?;
        }
        Ok(())
    }
}
