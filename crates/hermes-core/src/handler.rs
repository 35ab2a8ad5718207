//! Handler traits.
//!
//! User code implements the typed [`Handler`] trait. The dispatch engine
//! stores handlers behind the object-safe [`ErasedHandler`] trait; the
//! [`HandlerAdapter`] bridges the two.

use crate::cancel::CancelSignal;
use crate::context::BoxedResponse;
use crate::contract::{Envelope, TypeKey};
use crate::error::DispatchError;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future used at the object-safe seams of the engine.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A trait for handling typed contracts.
///
/// `C` is the contract type and `R` the response type. Command handlers use
/// [`CommandResponse`](crate::CommandResponse) as `R`, event handlers use
/// [`EventResponse`](crate::EventResponse).
///
/// # Example
///
/// ```rust
/// use hermes_core::{CancelSignal, DispatchError, Handler};
///
/// struct GetGreeting {
///     name: String,
/// }
///
/// struct GreetingHandler;
///
/// impl Handler<GetGreeting, String> for GreetingHandler {
///     async fn handle(
///         &self,
///         request: &GetGreeting,
///         cancel: &CancelSignal,
///     ) -> Result<String, DispatchError> {
///         cancel.check()?;
///         Ok(format!("Hello, {}!", request.name))
///     }
/// }
/// ```
pub trait Handler<C, R>: Send + Sync + 'static
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Handles a contract and returns its response.
    ///
    /// # Errors
    ///
    /// Any failure is returned as a [`DispatchError`]; wrap domain errors
    /// with [`DispatchError::handler`] or propagate an `anyhow::Error`
    /// with `?`.
    fn handle(
        &self,
        contract: &C,
        cancel: &CancelSignal,
    ) -> impl Future<Output = Result<R, DispatchError>> + Send;
}

/// A type-erased handler as stored by the engine.
///
/// Returns `Ok(None)` when the handler completed without a response value,
/// which is always the case for commands and events.
pub trait ErasedHandler: Send + Sync + 'static {
    /// Returns the handler's type name, for logs.
    fn handler_name(&self) -> &'static str;

    /// Handles an erased contract.
    fn handle_erased<'a>(
        &'a self,
        request: &'a Envelope,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<Option<BoxedResponse>, DispatchError>>;
}

/// Boxes a handler response, dropping sentinel markers.
fn erase_response<R: Send + Sync + 'static>(response: R) -> Option<BoxedResponse> {
    if TypeKey::of::<R>().is_sentinel() {
        None
    } else {
        Some(Box::new(response))
    }
}

fn contract_mismatch<C: 'static>(request: &Envelope) -> DispatchError {
    DispatchError::ContractMismatch {
        expected: std::any::type_name::<C>(),
        actual: request.contract_type().name(),
    }
}

/// Exposes a typed [`Handler`] as an [`ErasedHandler`].
pub struct HandlerAdapter<H, C, R> {
    handler: Arc<H>,
    _marker: PhantomData<fn(C) -> R>,
}

impl<H, C, R> HandlerAdapter<H, C, R>
where
    H: Handler<C, R>,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Wraps a handler.
    pub fn new(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Wraps a shared handler.
    pub const fn from_arc(handler: Arc<H>) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<H, C, R> ErasedHandler for HandlerAdapter<H, C, R>
where
    H: Handler<C, R>,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn handler_name(&self) -> &'static str {
        std::any::type_name::<H>()
    }

    fn handle_erased<'a>(
        &'a self,
        request: &'a Envelope,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<Option<BoxedResponse>, DispatchError>> {
        Box::pin(async move {
            let contract = request
                .downcast_ref::<C>()
                .ok_or_else(|| contract_mismatch::<C>(request))?;
            let response = self.handler.handle(contract, cancel).await?;
            Ok(erase_response(response))
        })
    }
}

/// A closure-based handler.
///
/// The closure receives a shared handle to the contract and a clone of the
/// cancel signal, so the returned future can be `'static`.
///
/// # Example
///
/// ```rust
/// use hermes_core::{DispatchError, FnHandler};
/// use std::sync::Arc;
///
/// struct Add(u32, u32);
///
/// let handler = FnHandler::new(|add: Arc<Add>, _cancel| async move {
///     Ok::<_, DispatchError>(add.0 + add.1)
/// });
/// # let _ = handler;
/// ```
pub struct FnHandler<F, C, R> {
    func: F,
    _marker: PhantomData<fn(C) -> R>,
}

impl<F, C, R, Fut> FnHandler<F, C, R>
where
    F: Fn(Arc<C>, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, DispatchError>> + Send + 'static,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// Creates a new function-based handler.
    pub const fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

impl<F, C, R, Fut> ErasedHandler for FnHandler<F, C, R>
where
    F: Fn(Arc<C>, CancelSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, DispatchError>> + Send + 'static,
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn handler_name(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn handle_erased<'a>(
        &'a self,
        request: &'a Envelope,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<Option<BoxedResponse>, DispatchError>> {
        Box::pin(async move {
            let contract = request
                .downcast_arc::<C>()
                .ok_or_else(|| contract_mismatch::<C>(request))?;
            let response = (self.func)(contract, cancel.clone()).await?;
            Ok(erase_response(response))
        })
    }
}
