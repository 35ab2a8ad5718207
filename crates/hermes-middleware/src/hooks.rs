//! The two hook frames of every chain and the dispatch observer.
//!
//! ```text
//! PrePipelineHook → middleware[0] → … → middleware[n] → PreHandlerHook → fan-out
//! ```
//!
//! Both hooks run the rest of the chain inside a capture boundary: an `Err`
//! returned downstream, or a panic, is added to the context and the hook
//! returns `Ok(())`. The pre-pipeline hook therefore guarantees that a
//! dispatch always yields a context. The pre-handler hook keeps handler
//! failures from unwinding through the middleware, so every middleware still
//! runs its post-processing.

use crate::middleware::{Middleware, MiddlewareResult, Next};
use futures_util::FutureExt;
use hermes_core::{BoxFuture, CancelSignal, DispatchError, InvocationContext};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Observes dispatches at the two hook points.
///
/// All methods default to doing nothing.
pub trait DispatchObserver: Send + Sync + 'static {
    /// Called before the first middleware runs.
    fn on_dispatch_start(&self, _ctx: &InvocationContext) {}

    /// Called after the whole chain settled, errors included.
    fn on_dispatch_end(&self, _ctx: &InvocationContext) {}

    /// Called after the last middleware, before the handlers.
    fn on_handlers_start(&self, _ctx: &InvocationContext) {}

    /// Called after the handlers settled.
    fn on_handlers_end(&self, _ctx: &InvocationContext) {}
}

/// A [`DispatchObserver`] that writes `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl DispatchObserver for LoggingObserver {
    fn on_dispatch_start(&self, ctx: &InvocationContext) {
        tracing::debug!(
            dispatch_id = %ctx.id(),
            request_type = ctx.request_type().short_name(),
            response_type = ctx.response_type().short_name(),
            kind = ctx.kind().as_str(),
            "dispatch started"
        );
    }

    fn on_dispatch_end(&self, ctx: &InvocationContext) {
        let duration_ms = ctx.elapsed().as_secs_f64() * 1000.0;
        match ctx.error() {
            None => tracing::debug!(
                dispatch_id = %ctx.id(),
                request_type = ctx.request_type().short_name(),
                has_response = ctx.has_response(),
                duration_ms,
                "dispatch completed"
            ),
            Some(error) => tracing::warn!(
                dispatch_id = %ctx.id(),
                request_type = ctx.request_type().short_name(),
                error_code = error.code(),
                error = %error,
                duration_ms,
                "dispatch failed"
            ),
        }
    }

    fn on_handlers_start(&self, ctx: &InvocationContext) {
        tracing::trace!(dispatch_id = %ctx.id(), "invoking handlers");
    }

    fn on_handlers_end(&self, ctx: &InvocationContext) {
        tracing::trace!(
            dispatch_id = %ctx.id(),
            success = ctx.is_success(),
            "handlers settled"
        );
    }
}

/// Runs `next`, capturing its error or panic onto the context.
async fn run_captured(
    next: Next<'_>,
    ctx: &mut InvocationContext,
    cancel: &CancelSignal,
    capture_panics: bool,
    frame: &'static str,
) {
    let outcome = if capture_panics {
        match AssertUnwindSafe(next.run(ctx, cancel)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let error = DispatchError::from_panic(&*payload);
                tracing::error!(frame, error = %error, "panic captured during dispatch");
                Err(error)
            }
        }
    } else {
        next.run(ctx, cancel).await
    };

    if let Err(error) = outcome {
        ctx.add_error(error);
    }
}

/// Outermost frame of every chain.
#[derive(Clone)]
pub struct PrePipelineHook {
    observer: Option<Arc<dyn DispatchObserver>>,
    capture_panics: bool,
}

impl PrePipelineHook {
    /// Creates the hook.
    pub fn new(observer: Option<Arc<dyn DispatchObserver>>, capture_panics: bool) -> Self {
        Self {
            observer,
            capture_panics,
        }
    }
}

impl Middleware for PrePipelineHook {
    fn name(&self) -> &'static str {
        "pre_pipeline"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            if let Some(observer) = &self.observer {
                observer.on_dispatch_start(ctx);
            }

            run_captured(next, ctx, cancel, self.capture_panics, self.name()).await;

            if let Some(observer) = &self.observer {
                observer.on_dispatch_end(ctx);
            }
            Ok(())
        })
    }
}

/// Innermost frame of every chain, wrapping the fan-out strategy.
#[derive(Clone)]
pub struct PreHandlerHook {
    observer: Option<Arc<dyn DispatchObserver>>,
    capture_panics: bool,
}

impl PreHandlerHook {
    /// Creates the hook.
    pub fn new(observer: Option<Arc<dyn DispatchObserver>>, capture_panics: bool) -> Self {
        Self {
            observer,
            capture_panics,
        }
    }
}

impl Middleware for PreHandlerHook {
    fn name(&self) -> &'static str {
        "pre_handler"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            if let Some(observer) = &self.observer {
                observer.on_handlers_start(ctx);
            }

            run_captured(next, ctx, cancel, self.capture_panics, self.name()).await;

            if let Some(observer) = &self.observer {
                observer.on_handlers_end(ctx);
            }
            Ok(())
        })
    }
}
