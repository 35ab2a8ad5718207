//! Built-in middleware stages.
//!
//! Neither stage is installed by default; register them as
//! [`MiddlewareItem`](crate::MiddlewareItem)s like any other middleware.
//!
//! - [`tracing`] - Wraps the dispatch in a `tracing` span
//! - [`telemetry`] - Emits dispatch metrics

pub mod telemetry;
pub mod tracing;

pub use self::telemetry::{DispatchTelemetry, TelemetryMiddleware};
pub use self::tracing::TracingMiddleware;
