//! Tracing middleware.
//!
//! Opens a span for the rest of the chain so every event logged by inner
//! middleware and handlers carries the dispatch fields.
//!
//! ## Span Fields
//!
//! - `dispatch_id` - The context's UUID v7
//! - `request_type` - Contract type, without module path
//! - `response_type` - Response type, without module path
//! - `kind` - `request`, `command` or `event`

use crate::middleware::{Middleware, MiddlewareResult, Next};
use hermes_core::{BoxFuture, CancelSignal, InvocationContext};
use tracing::{Instrument, Level};

/// Middleware that runs the rest of the chain inside a `tracing` span.
///
/// # Example
///
/// ```
/// use hermes_middleware::{MiddlewareItem, TracingMiddleware};
///
/// let item = MiddlewareItem::singleton(TracingMiddleware::new()).with_order(i32::MIN);
/// # let _ = item;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TracingMiddleware {
    level: Level,
}

impl TracingMiddleware {
    /// Creates the middleware with `INFO` spans.
    #[must_use]
    pub const fn new() -> Self {
        Self { level: Level::INFO }
    }

    /// Creates the middleware with `DEBUG` spans.
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }

    fn span(&self, ctx: &InvocationContext) -> tracing::Span {
        let request_type = ctx.request_type().short_name();
        let response_type = ctx.response_type().short_name();
        let kind = ctx.kind().as_str();

        if self.level == Level::DEBUG {
            tracing::debug_span!(
                "dispatch",
                dispatch_id = %ctx.id(),
                request_type,
                response_type,
                kind
            )
        } else {
            tracing::info_span!(
                "dispatch",
                dispatch_id = %ctx.id(),
                request_type,
                response_type,
                kind
            )
        }
    }
}

impl Default for TracingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        let span = self.span(ctx);
        Box::pin(
            async move {
                let result = next.run(ctx, cancel).await;
                tracing::debug!(
                    success = result.is_ok() && ctx.is_success(),
                    duration_ms = ctx.elapsed().as_secs_f64() * 1000.0,
                    "chain settled"
                );
                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{DispatchError, Envelope, TypeKey};

    struct Ping;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Envelope::new(Ping), TypeKey::of::<String>())
    }

    #[test]
    fn test_middleware_name() {
        assert_eq!(TracingMiddleware::new().name(), "tracing");
    }

    #[tokio::test]
    async fn test_passes_through_response() {
        let middleware = TracingMiddleware::new();
        let mut ctx = ctx();
        let next = Next::terminal(|ctx, _cancel| {
            Box::pin(async move {
                ctx.set_response("pong".to_string());
                Ok(())
            })
        });

        middleware
            .process(&mut ctx, &CancelSignal::none(), next)
            .await
            .unwrap();
        assert_eq!(ctx.response::<String>().unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_passes_through_error() {
        let middleware = TracingMiddleware::debug();
        let mut ctx = ctx();
        let next = Next::terminal(|_ctx, _cancel| Box::pin(async { Err::<(), _>(DispatchError::Cancelled) }));

        let result = middleware.process(&mut ctx, &CancelSignal::none(), next).await;
        assert!(matches!(result, Err(DispatchError::Cancelled)));
    }
}
