//! The mediator facade.
//!
//! [`Mediator`] maps a contract and the response type chosen by the caller
//! to the pipeline registered for that route, and offers two call shapes for
//! every contract kind:
//!
//! | Capturing (never fails) | Non-capturing |
//! |-------------------------|---------------|
//! | [`Mediator::execute_and_capture`] | [`Mediator::execute`] |
//! | [`Mediator::send_and_capture`] | [`Mediator::send`] |
//! | [`Mediator::invoke_and_capture`] | [`Mediator::invoke`] |
//! | [`Mediator::publish_and_capture`] | [`Mediator::publish`] |
//!
//! A capturing call returns the settled [`InvocationContext`]. A
//! non-capturing call returns the captured error as `Err`: the single error
//! when one was recorded, the aggregate otherwise.

use crate::pipeline::{InvocationPipeline, PipelineOptions};
use hermes_core::{
    CancelSignal, CommandResponse, DispatchError, Envelope, EventResponse, InvocationContext,
    Request, RouteKey, TypeKey,
};
use hermes_middleware::MiddlewareItem;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Routes contracts to their pipelines.
///
/// Built by [`MediatorBuilder`](crate::MediatorBuilder). Cheap to share
/// behind an `Arc`; every method takes `&self`.
pub struct Mediator {
    pipelines: IndexMap<RouteKey, Arc<InvocationPipeline>>,
    missing: RwLock<HashMap<RouteKey, Arc<InvocationPipeline>>>,
    items: Arc<[MiddlewareItem]>,
    options: PipelineOptions,
}

impl Mediator {
    pub(crate) fn new(
        pipelines: IndexMap<RouteKey, Arc<InvocationPipeline>>,
        items: Arc<[MiddlewareItem]>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            pipelines,
            missing: RwLock::new(HashMap::new()),
            items,
            options,
        }
    }

    /// Returns the registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = RouteKey> + '_ {
        self.pipelines.keys().copied()
    }

    /// Returns `true` if a pipeline was registered for `route`.
    pub fn contains(&self, route: RouteKey) -> bool {
        self.pipelines.contains_key(&route)
    }

    /// Returns the pipeline for `route`.
    ///
    /// Routes nothing was registered for get a no-op pipeline, kept apart
    /// from the registered ones.
    pub fn pipeline_for(&self, route: RouteKey) -> Arc<InvocationPipeline> {
        if let Some(pipeline) = self.pipelines.get(&route) {
            return Arc::clone(pipeline);
        }

        if let Some(pipeline) = self.missing.read().get(&route) {
            return Arc::clone(pipeline);
        }

        let mut missing = self.missing.write();
        let pipeline = missing.entry(route).or_insert_with(|| {
            tracing::debug!(route = %route, "no pipeline registered, using no-op");
            Arc::new(InvocationPipeline::no_op(
                route,
                Arc::clone(&self.items),
                &self.options,
            ))
        });
        Arc::clone(pipeline)
    }

    /// Builds every registered chain and reports the misconfigured ones.
    ///
    /// Returns a [`DispatchError::Configuration`] for a single faulty route
    /// and an aggregate of them otherwise.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let mut failure = None;
        for pipeline in self.pipelines.values() {
            if let Some(error) = pipeline.chain_error() {
                failure = Some(DispatchError::merge(failure, error));
            }
        }
        failure.map_or(Ok(()), Err)
    }

    /// Dispatches an erased contract as `response`.
    pub async fn dispatch(
        &self,
        request: Envelope,
        response: TypeKey,
        cancel: &CancelSignal,
    ) -> InvocationContext {
        let route = RouteKey::new(request.contract_type(), response);
        self.pipeline_for(route).handle(request, cancel).await
    }

    /// Dispatches `contract`, answered with `R`, and returns its context.
    pub async fn execute_and_capture<C, R>(
        &self,
        contract: C,
        cancel: &CancelSignal,
    ) -> InvocationContext
    where
        C: Send + Sync + 'static,
        R: 'static,
    {
        self.dispatch(Envelope::new(contract), TypeKey::of::<R>(), cancel)
            .await
    }

    /// Dispatches `contract`, answered with `R`.
    ///
    /// Returns `Ok(None)` when the dispatch succeeded without a response of
    /// type `R`.
    pub async fn execute<C, R>(
        &self,
        contract: C,
        cancel: &CancelSignal,
    ) -> Result<Option<R>, DispatchError>
    where
        C: Send + Sync + 'static,
        R: 'static,
    {
        let ctx = self.execute_and_capture::<C, R>(contract, cancel).await;
        into_response(ctx)
    }

    /// Dispatches a request and returns its context.
    pub async fn send_and_capture<C: Request>(
        &self,
        request: C,
        cancel: &CancelSignal,
    ) -> InvocationContext {
        self.execute_and_capture::<C, C::Response>(request, cancel)
            .await
    }

    /// Dispatches a request.
    pub async fn send<C: Request>(
        &self,
        request: C,
        cancel: &CancelSignal,
    ) -> Result<Option<C::Response>, DispatchError> {
        self.execute::<C, C::Response>(request, cancel).await
    }

    /// Dispatches a command and returns its context.
    pub async fn invoke_and_capture<C>(&self, command: C, cancel: &CancelSignal) -> InvocationContext
    where
        C: Send + Sync + 'static,
    {
        self.execute_and_capture::<C, CommandResponse>(command, cancel)
            .await
    }

    /// Dispatches a command.
    pub async fn invoke<C>(&self, command: C, cancel: &CancelSignal) -> Result<(), DispatchError>
    where
        C: Send + Sync + 'static,
    {
        into_outcome(self.invoke_and_capture(command, cancel).await)
    }

    /// Publishes an event and returns its context.
    ///
    /// An event nobody listens to succeeds.
    pub async fn publish_and_capture<C>(&self, event: C, cancel: &CancelSignal) -> InvocationContext
    where
        C: Send + Sync + 'static,
    {
        self.execute_and_capture::<C, EventResponse>(event, cancel)
            .await
    }

    /// Publishes an event.
    pub async fn publish<C>(&self, event: C, cancel: &CancelSignal) -> Result<(), DispatchError>
    where
        C: Send + Sync + 'static,
    {
        into_outcome(self.publish_and_capture(event, cancel).await)
    }
}

fn into_response<R: 'static>(mut ctx: InvocationContext) -> Result<Option<R>, DispatchError> {
    match ctx.take_error() {
        Some(error) => Err(error),
        None => Ok(ctx.take_response::<R>()),
    }
}

fn into_outcome(mut ctx: InvocationContext) -> Result<(), DispatchError> {
    ctx.take_error().map_or(Ok(()), Err)
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("routes", &self.pipelines.len())
            .field("middleware", &self.items.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
