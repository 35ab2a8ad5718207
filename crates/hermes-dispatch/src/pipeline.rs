//! Invocation pipelines.
//!
//! One [`InvocationPipeline`] exists per route. On its first dispatch it
//! builds its chain:
//!
//! 1. resolve and validate the fan-out strategy
//! 2. keep the middleware items that apply to the route, sorted by order
//!
//! The chain is stored in a [`OnceLock`]; concurrent first dispatches wait
//! for a single build and every later dispatch reuses it. Each dispatch then
//! resolves the middleware instances and runs
//!
//! ```text
//! PrePipelineHook → middleware[0] → … → middleware[n] → PreHandlerHook → strategy
//! ```
//!
//! [`InvocationPipeline::handle`] never fails: every error ends up on the
//! returned context.

use crate::fanout::{FanOutStrategy, NoOpStrategy};
use hermes_core::{
    CancelSignal, ComponentResolver, ContextFactory, DefaultContextFactory, DispatchError,
    Envelope, InvocationContext, RouteKey, Singleton,
};
use hermes_middleware::{
    applicable_items, DispatchObserver, Middleware, MiddlewareItem, Next, PreHandlerHook,
    PrePipelineHook,
};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Resolves the fan-out strategy of a route.
pub type StrategyResolver = Arc<dyn ComponentResolver<dyn FanOutStrategy>>;

/// Collaborators shared by every pipeline of a mediator.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Observer notified by the hook frames.
    pub observer: Option<Arc<dyn DispatchObserver>>,
    /// Whether the hook frames catch panics.
    pub capture_panics: bool,
    /// Creates the context of each dispatch.
    pub context_factory: Arc<dyn ContextFactory>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            observer: None,
            capture_panics: true,
            context_factory: Arc::new(DefaultContextFactory),
        }
    }
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("observer", &self.observer.is_some())
            .field("capture_panics", &self.capture_panics)
            .finish_non_exhaustive()
    }
}

/// The memoized part of a pipeline.
struct Chain {
    items: Vec<MiddlewareItem>,
    strategy: Arc<dyn FanOutStrategy>,
}

/// The dispatch pipeline of one route.
pub struct InvocationPipeline {
    route: RouteKey,
    items: Arc<[MiddlewareItem]>,
    strategy: StrategyResolver,
    context_factory: Arc<dyn ContextFactory>,
    pre_pipeline: PrePipelineHook,
    pre_handler: PreHandlerHook,
    chain: OnceLock<Result<Chain, String>>,
}

impl InvocationPipeline {
    /// Creates a pipeline.
    ///
    /// `items` holds every registered middleware; the ones that apply to
    /// `route` are selected when the chain is built.
    pub fn new(
        route: RouteKey,
        items: Arc<[MiddlewareItem]>,
        strategy: StrategyResolver,
        options: &PipelineOptions,
    ) -> Self {
        Self {
            route,
            items,
            strategy,
            context_factory: Arc::clone(&options.context_factory),
            pre_pipeline: PrePipelineHook::new(options.observer.clone(), options.capture_panics),
            pre_handler: PreHandlerHook::new(options.observer.clone(), options.capture_panics),
            chain: OnceLock::new(),
        }
    }

    /// Creates the pipeline used for a route nothing was registered for.
    ///
    /// Applicable middleware still runs; the strategy is [`NoOpStrategy`].
    pub fn no_op(route: RouteKey, items: Arc<[MiddlewareItem]>, options: &PipelineOptions) -> Self {
        let strategy: Arc<dyn FanOutStrategy> = Arc::new(NoOpStrategy);
        Self::new(route, items, Arc::new(Singleton::new(strategy)), options)
    }

    /// Returns the route of this pipeline.
    pub const fn route(&self) -> RouteKey {
        self.route
    }

    /// Returns `true` once the chain has been built.
    pub fn is_built(&self) -> bool {
        self.chain.get().is_some()
    }

    /// Builds the chain if needed and returns the configuration error, if any.
    pub fn chain_error(&self) -> Option<DispatchError> {
        self.chain()
            .as_ref()
            .err()
            .map(|reason| DispatchError::configuration(self.route, reason.clone()))
    }

    fn chain(&self) -> &Result<Chain, String> {
        self.chain.get_or_init(|| self.build_chain())
    }

    fn build_chain(&self) -> Result<Chain, String> {
        let built = self
            .strategy
            .resolve()
            .map_err(|e| format!("fan-out strategy could not be resolved: {e}"))
            .and_then(|strategy| {
                strategy.validate(self.route)?;
                Ok(strategy)
            });

        match built {
            Ok(strategy) => {
                let items = applicable_items(&self.items, self.route);
                tracing::debug!(
                    route = %self.route,
                    fan_out = strategy.fan_out().as_str(),
                    handlers = strategy.handler_count(),
                    middleware = items.len(),
                    "pipeline chain built"
                );
                Ok(Chain { items, strategy })
            }
            Err(reason) => {
                tracing::warn!(route = %self.route, reason = %reason, "pipeline misconfigured");
                Err(reason)
            }
        }
    }

    /// Dispatches `request` and returns its settled context.
    ///
    /// # Panics
    ///
    /// Panics if the runtime type of `request` is not the route's request
    /// type, or if a panic escapes while panic capture is disabled.
    pub async fn handle(&self, request: Envelope, cancel: &CancelSignal) -> InvocationContext {
        let mut ctx = self
            .context_factory
            .create(self.route.request, self.route.response, request);

        let outcome = match self.chain() {
            Ok(chain) => match resolve_middleware(&chain.items) {
                Ok(middleware) => {
                    let strategy = Arc::clone(&chain.strategy);
                    let mut next = Next::new(
                        &self.pre_handler,
                        Next::terminal(move |ctx, cancel| {
                            Box::pin(async move { strategy.execute(ctx, cancel).await })
                        }),
                    );
                    for stage in middleware.iter().rev() {
                        next = Next::new(stage.as_ref(), next);
                    }
                    Next::new(&self.pre_pipeline, next)
                        .run(&mut ctx, cancel)
                        .await
                }
                Err(error) => self.fail(&mut ctx, cancel, error).await,
            },
            Err(reason) => {
                let error = DispatchError::configuration(self.route, reason.clone());
                self.fail(&mut ctx, cancel, error).await
            }
        };

        if let Err(error) = outcome {
            ctx.add_error(error);
        }
        ctx
    }

    /// Runs the pre-pipeline frame around a terminal that reports `error`.
    async fn fail(
        &self,
        ctx: &mut InvocationContext,
        cancel: &CancelSignal,
        error: DispatchError,
    ) -> Result<(), DispatchError> {
        Next::new(
            &self.pre_pipeline,
            Next::terminal(move |_ctx, _cancel| Box::pin(async move { Err::<(), _>(error) })),
        )
        .run(ctx, cancel)
        .await
    }
}

fn resolve_middleware(items: &[MiddlewareItem]) -> Result<Vec<Arc<dyn Middleware>>, DispatchError> {
    items
        .iter()
        .map(|item| item.resolve().map_err(DispatchError::from))
        .collect()
}

impl fmt::Debug for InvocationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationPipeline")
            .field("route", &self.route)
            .field("built", &self.is_built())
            .finish_non_exhaustive()
    }
}
