//! Registration surface for [`Mediator`].
//!
//! # Example
//!
//! ```
//! use hermes_core::{CancelSignal, DispatchError, Request};
//! use hermes_dispatch::Mediator;
//! use hermes_middleware::{MiddlewareItem, TracingMiddleware};
//! use std::sync::Arc;
//!
//! struct Ping;
//!
//! impl Request for Ping {
//!     type Response = &'static str;
//! }
//!
//! # tokio_test::block_on(async {
//! let mediator = Mediator::builder()
//!     .handler_fn(|_ping: Arc<Ping>, _cancel| async { Ok::<_, DispatchError>("pong") })
//!     .middleware(MiddlewareItem::singleton(TracingMiddleware::new()))
//!     .build();
//!
//! let reply = mediator.send(Ping, &CancelSignal::none()).await.unwrap();
//! assert_eq!(reply, Some("pong"));
//! # });
//! ```

use crate::config::DispatchConfig;
use crate::fanout::{strategy_for, HandlerResolver};
use crate::mediator::Mediator;
use crate::pipeline::{InvocationPipeline, PipelineOptions, StrategyResolver};
use hermes_core::{
    CancelSignal, CommandResponse, ContextFactory, ContractKind, DefaultContextFactory, DispatchError,
    ErasedHandler, EventResponse, FanOut, FnHandler, Handler, HandlerAdapter, Request,
    ResolveError, RouteKey, Singleton, Transient,
};
use hermes_middleware::{DispatchObserver, LoggingObserver, MiddlewareItem};
use indexmap::IndexMap;
use std::future::Future;
use std::sync::Arc;

#[derive(Default)]
struct RouteRegistration {
    handlers: Vec<HandlerResolver>,
    fan_out: Option<FanOut>,
    strategy: Option<StrategyResolver>,
}

/// Collects handlers, middleware and collaborators, then builds a
/// [`Mediator`].
///
/// Registration is closed once [`build`](Self::build) runs.
#[derive(Default)]
pub struct MediatorBuilder {
    routes: IndexMap<RouteKey, RouteRegistration>,
    middleware: Vec<MiddlewareItem>,
    observer: Option<Arc<dyn DispatchObserver>>,
    context_factory: Option<Arc<dyn ContextFactory>>,
    config: DispatchConfig,
}

impl Mediator {
    /// Creates a builder.
    pub fn builder() -> MediatorBuilder {
        MediatorBuilder::new()
    }
}

impl MediatorBuilder {
    /// Creates an empty builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler instance shared by every dispatch.
    pub fn handler<C, R, H>(self, handler: H) -> Self
    where
        H: Handler<C, R>,
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let erased: Arc<dyn ErasedHandler> = Arc::new(HandlerAdapter::new(handler));
        self.handler_resolver(RouteKey::of::<C, R>(), Arc::new(Singleton::new(erased)))
    }

    /// Registers a handler built anew for every dispatch.
    pub fn handler_factory<C, R, H, F>(self, factory: F) -> Self
    where
        H: Handler<C, R>,
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        F: Fn() -> Result<H, ResolveError> + Send + Sync + 'static,
    {
        let resolver = Transient::new(move || {
            factory().map(|handler| Arc::new(HandlerAdapter::new(handler)) as Arc<dyn ErasedHandler>)
        });
        self.handler_resolver(RouteKey::of::<C, R>(), Arc::new(resolver))
    }

    /// Registers a closure handler.
    pub fn handler_fn<C, R, F, Fut>(self, func: F) -> Self
    where
        F: Fn(Arc<C>, CancelSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, DispatchError>> + Send + 'static,
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        let erased: Arc<dyn ErasedHandler> = Arc::new(FnHandler::new(func));
        self.handler_resolver(RouteKey::of::<C, R>(), Arc::new(Singleton::new(erased)))
    }

    /// Registers a command handler.
    pub fn command_handler<C, H>(self, handler: H) -> Self
    where
        H: Handler<C, CommandResponse>,
        C: Send + Sync + 'static,
    {
        self.handler::<C, CommandResponse, H>(handler)
    }

    /// Registers an event handler. Events accept any number of handlers.
    pub fn event_handler<C, H>(self, handler: H) -> Self
    where
        H: Handler<C, EventResponse>,
        C: Send + Sync + 'static,
    {
        self.handler::<C, EventResponse, H>(handler)
    }

    /// Registers the handler of a [`Request`].
    pub fn request_handler<C, H>(self, handler: H) -> Self
    where
        C: Request,
        H: Handler<C, C::Response>,
    {
        self.handler::<C, C::Response, H>(handler)
    }

    /// Registers a handler resolver for `route`.
    ///
    /// Handlers of one route run in registration order.
    pub fn handler_resolver(mut self, route: RouteKey, resolver: HandlerResolver) -> Self {
        self.routes.entry(route).or_default().handlers.push(resolver);
        self
    }

    /// Chooses the fan-out of the route `(C, R)`.
    pub fn fan_out<C: 'static, R: 'static>(mut self, fan_out: FanOut) -> Self {
        self.routes.entry(RouteKey::of::<C, R>()).or_default().fan_out = Some(fan_out);
        self
    }

    /// Replaces the fan-out strategy of `route` with a custom one.
    ///
    /// Handlers registered for the route are then ignored.
    pub fn strategy_resolver(mut self, route: RouteKey, resolver: StrategyResolver) -> Self {
        self.routes.entry(route).or_default().strategy = Some(resolver);
        self
    }

    /// Registers a middleware.
    pub fn middleware(mut self, item: MiddlewareItem) -> Self {
        self.middleware.push(item);
        self
    }

    /// Sets the dispatch observer.
    pub fn observer(mut self, observer: impl DispatchObserver) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Sets the context factory.
    pub fn context_factory(mut self, factory: impl ContextFactory) -> Self {
        self.context_factory = Some(Arc::new(factory));
        self
    }

    /// Applies dispatch settings.
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the mediator.
    ///
    /// Chains are built lazily; call [`Mediator::validate`] to build them
    /// all up front and surface misconfigured routes.
    pub fn build(self) -> Mediator {
        let observer = self.observer.or_else(|| {
            self.config
                .log_dispatches
                .then(|| Arc::new(LoggingObserver) as Arc<dyn DispatchObserver>)
        });
        let options = PipelineOptions {
            observer,
            capture_panics: self.config.capture_panics,
            context_factory: self
                .context_factory
                .unwrap_or_else(|| Arc::new(DefaultContextFactory)),
        };
        let items: Arc<[MiddlewareItem]> = self.middleware.into();

        let config = &self.config;
        let pipelines: IndexMap<_, _> = self
            .routes
            .into_iter()
            .map(|(route, registration)| {
                let strategy = registration.strategy.unwrap_or_else(|| {
                    let fan_out = registration.fan_out.unwrap_or_else(|| match route.kind() {
                        ContractKind::Event => config.event_fan_out,
                        kind => FanOut::default_for(kind),
                    });
                    let resolver: StrategyResolver =
                        Arc::new(Singleton::new(strategy_for(fan_out, registration.handlers)));
                    resolver
                });
                let pipeline =
                    InvocationPipeline::new(route, Arc::clone(&items), strategy, &options);
                (route, Arc::new(pipeline))
            })
            .collect();

        tracing::debug!(
            routes = pipelines.len(),
            middleware = items.len(),
            capture_panics = options.capture_panics,
            "mediator built"
        );
        Mediator::new(pipelines, items, options)
    }
}
