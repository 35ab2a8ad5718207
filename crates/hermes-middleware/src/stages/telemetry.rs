//! Telemetry emission middleware.
//!
//! Records dispatch metrics once the rest of the chain has settled.
//!
//! # Metrics Emitted
//!
//! - `hermes_dispatches_total` - Counter by contract, kind and outcome
//! - `hermes_dispatch_duration_seconds` - Histogram of dispatch latency
//! - `hermes_in_flight_dispatches` - Gauge of dispatches in progress
//!
//! The outcome label is `success` or the error code of the captured error
//! (`NOT_FOUND`, `HANDLER_ERROR`, `AGGREGATE_ERROR`, ...).

use crate::middleware::{Middleware, MiddlewareResult, Next};
use hermes_core::{BoxFuture, CancelSignal, DispatchError, InvocationContext};
use hermes_telemetry::metrics::{record_dispatch, InFlightGuard};
use std::time::Instant;

/// Telemetry data for one dispatch, stored as a context extension.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTelemetry {
    /// Contract type, without module path.
    pub contract: &'static str,
    /// `request`, `command` or `event`.
    pub kind: &'static str,
    /// `success` or an error code.
    pub outcome: &'static str,
    /// Time spent in the rest of the chain, in milliseconds.
    pub duration_ms: f64,
}

/// Middleware that emits metrics for every dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryMiddleware {
    record_extension: bool,
}

impl TelemetryMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            record_extension: false,
        }
    }

    /// Also stores a [`DispatchTelemetry`] extension on the context.
    #[must_use]
    pub const fn with_extension(mut self) -> Self {
        self.record_extension = true;
        self
    }
}

impl Middleware for TelemetryMiddleware {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            let start = Instant::now();
            let in_flight = InFlightGuard::new();

            let result = next.run(ctx, cancel).await;

            drop(in_flight);
            let duration = start.elapsed();

            let outcome = result
                .as_ref()
                .err()
                .or_else(|| ctx.error())
                .map_or("success", DispatchError::code);
            let contract = ctx.request_type().short_name();
            let kind = ctx.kind().as_str();

            record_dispatch(contract, kind, outcome, duration);

            if self.record_extension {
                ctx.set_extension(DispatchTelemetry {
                    contract,
                    kind,
                    outcome,
                    duration_ms: duration.as_secs_f64() * 1000.0,
                });
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{CommandResponse, Envelope, EventResponse, TypeKey};

    struct CreateUser;
    struct UserCreated;

    #[test]
    fn test_middleware_name() {
        assert_eq!(TelemetryMiddleware::new().name(), "telemetry");
    }

    #[tokio::test]
    async fn test_records_success() {
        let middleware = TelemetryMiddleware::new().with_extension();
        let mut ctx = InvocationContext::new(
            Envelope::new(CreateUser),
            TypeKey::of::<CommandResponse>(),
        );

        middleware
            .process(&mut ctx, &CancelSignal::none(), Next::noop())
            .await
            .unwrap();

        let data = ctx.extension::<DispatchTelemetry>().unwrap();
        assert_eq!(data.contract, "CreateUser");
        assert_eq!(data.kind, "command");
        assert_eq!(data.outcome, "success");
        assert!(data.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_records_captured_error_code() {
        let middleware = TelemetryMiddleware::new().with_extension();
        let mut ctx = InvocationContext::new(
            Envelope::new(UserCreated),
            TypeKey::of::<EventResponse>(),
        );
        let next = Next::terminal(|ctx, _cancel| {
            Box::pin(async move {
                ctx.add_error(DispatchError::handler(anyhow::anyhow!("listener failed")));
                Ok(())
            })
        });

        middleware
            .process(&mut ctx, &CancelSignal::none(), next)
            .await
            .unwrap();

        let data = ctx.extension::<DispatchTelemetry>().unwrap();
        assert_eq!(data.kind, "event");
        assert_eq!(data.outcome, "HANDLER_ERROR");
    }

    #[tokio::test]
    async fn test_without_extension() {
        let middleware = TelemetryMiddleware::new();
        let mut ctx = InvocationContext::new(
            Envelope::new(CreateUser),
            TypeKey::of::<CommandResponse>(),
        );

        middleware
            .process(&mut ctx, &CancelSignal::none(), Next::noop())
            .await
            .unwrap();
        assert!(ctx.extension::<DispatchTelemetry>().is_none());
    }
}
