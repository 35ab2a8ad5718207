//! Handler fan-out strategies.
//!
//! A strategy is the terminal stage of a chain. It resolves the handlers
//! registered for the route, invokes them and settles their outcomes onto
//! the context.
//!
//! | Strategy | Handlers | On failure |
//! |----------|----------|------------|
//! | [`SingleStrategy`] | exactly one | error returned to the pre-handler hook |
//! | [`SequentialStrategy`] | all, in registration order | later handlers are skipped |
//! | [`ParallelStrategy`] | all, concurrently | siblings still run; every error is recorded |
//! | [`NoOpStrategy`] | none | routing failure, except for events |

use futures_util::future::{join_all, ready};
use futures_util::FutureExt;
use hermes_core::{
    BoxFuture, BoxedResponse, CancelSignal, ComponentResolver, DispatchError, ErasedHandler,
    FanOut, InvocationContext, RouteKey,
};
use hermes_middleware::MiddlewareResult;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Resolves one handler instance.
pub type HandlerResolver = Arc<dyn ComponentResolver<dyn ErasedHandler>>;

type HandlerOutcome = Result<Option<BoxedResponse>, DispatchError>;

/// Invokes the handlers of one route.
pub trait FanOutStrategy: Send + Sync + 'static {
    /// Returns which fan-out this strategy implements.
    fn fan_out(&self) -> FanOut;

    /// Returns the number of registered handlers.
    fn handler_count(&self) -> usize;

    /// Checks the strategy against its route when the chain is built.
    ///
    /// An `Err` holds the reason the route is misconfigured.
    fn validate(&self, _route: RouteKey) -> Result<(), String> {
        Ok(())
    }

    /// Invokes the handlers.
    fn execute<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, MiddlewareResult>;
}

/// Builds the built-in strategy for `fan_out`.
pub fn strategy_for(fan_out: FanOut, handlers: Vec<HandlerResolver>) -> Arc<dyn FanOutStrategy> {
    match fan_out {
        FanOut::Single => Arc::new(SingleStrategy::new(handlers)),
        FanOut::Sequential => Arc::new(SequentialStrategy::new(handlers)),
        FanOut::Parallel => Arc::new(ParallelStrategy::new(handlers)),
        FanOut::NoOp => Arc::new(NoOpStrategy),
    }
}

/// Exactly one handler.
pub struct SingleStrategy {
    handlers: Vec<HandlerResolver>,
}

impl SingleStrategy {
    /// Creates the strategy. Anything but one handler fails validation.
    pub fn new(handlers: Vec<HandlerResolver>) -> Self {
        Self { handlers }
    }
}

impl FanOutStrategy for SingleStrategy {
    fn fan_out(&self) -> FanOut {
        FanOut::Single
    }

    fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn validate(&self, _route: RouteKey) -> Result<(), String> {
        match self.handlers.len() {
            1 => Ok(()),
            0 => Err("single fan-out requires a handler, none registered".to_string()),
            n => Err(format!(
                "single fan-out requires exactly one handler, {n} registered"
            )),
        }
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            let [resolver] = self.handlers.as_slice() else {
                let route = RouteKey::new(ctx.request_type(), ctx.response_type());
                return Err(DispatchError::configuration(
                    route,
                    format!("single fan-out with {} handlers", self.handlers.len()),
                ));
            };

            let handler = resolver.resolve()?;
            let request = ctx.request().clone();
            let response = handler.handle_erased(&request, cancel).await?;
            ctx.set_response_boxed(response);
            Ok(())
        })
    }
}

/// Every handler in registration order, stopping at the first failure.
pub struct SequentialStrategy {
    handlers: Vec<HandlerResolver>,
}

impl SequentialStrategy {
    /// Creates the strategy.
    pub fn new(handlers: Vec<HandlerResolver>) -> Self {
        Self { handlers }
    }
}

impl FanOutStrategy for SequentialStrategy {
    fn fan_out(&self) -> FanOut {
        FanOut::Sequential
    }

    fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            let request = ctx.request().clone();
            for (index, resolver) in self.handlers.iter().enumerate() {
                let handler = resolver.resolve()?;
                match handler.handle_erased(&request, cancel).await {
                    Ok(Some(response)) => ctx.set_response_boxed(Some(response)),
                    Ok(None) => {}
                    Err(error) => {
                        let skipped = self.handlers.len() - index - 1;
                        if skipped > 0 {
                            tracing::debug!(
                                handler = handler.handler_name(),
                                skipped,
                                "sequential fan-out stopped at failing handler"
                            );
                        }
                        return Err(error);
                    }
                }
            }
            Ok(())
        })
    }
}

/// Every handler concurrently.
///
/// All resolvers are called once before any handler starts. A failure, a
/// panic included, never cancels the other handlers; every failure is added
/// to the context in registration order. When several handlers respond, the
/// last one in registration order wins.
pub struct ParallelStrategy {
    handlers: Vec<HandlerResolver>,
}

impl ParallelStrategy {
    /// Creates the strategy.
    pub fn new(handlers: Vec<HandlerResolver>) -> Self {
        Self { handlers }
    }
}

impl FanOutStrategy for ParallelStrategy {
    fn fan_out(&self) -> FanOut {
        FanOut::Parallel
    }

    fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            let resolved: Vec<_> = self.handlers.iter().map(|r| r.resolve()).collect();
            let request = ctx.request().clone();

            let mut invocations: Vec<BoxFuture<'_, HandlerOutcome>> =
                Vec::with_capacity(resolved.len());
            for handler in &resolved {
                let invocation: BoxFuture<'_, HandlerOutcome> = match handler {
                    Ok(handler) => Box::pin(
                        AssertUnwindSafe(handler.handle_erased(&request, cancel))
                            .catch_unwind()
                            .map(|outcome| {
                                outcome.unwrap_or_else(|payload| {
                                    Err(DispatchError::from_panic(&*payload))
                                })
                            }),
                    ),
                    Err(error) => Box::pin(ready(Err(DispatchError::from(error.clone())))),
                };
                invocations.push(invocation);
            }
            let outcomes = join_all(invocations).await;

            for outcome in outcomes {
                match outcome {
                    Ok(Some(response)) => ctx.set_response_boxed(Some(response)),
                    Ok(None) => {}
                    Err(error) => ctx.add_error(error),
                }
            }
            Ok(())
        })
    }
}

/// Used when no pipeline is registered for a route.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStrategy;

impl FanOutStrategy for NoOpStrategy {
    fn fan_out(&self) -> FanOut {
        FanOut::NoOp
    }

    fn handler_count(&self) -> usize {
        0
    }

    fn execute<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        _cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            if ctx.is_event() {
                return Ok(());
            }
            Err(DispatchError::not_found(RouteKey::new(
                ctx.request_type(),
                ctx.response_type(),
            )))
        })
    }
}
