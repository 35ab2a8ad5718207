//! Invocation context types.
//!
//! An [`InvocationContext`] is the mutable record of one in-flight dispatch:
//! the contract, the response slot and the captured error. It is created by
//! a [`ContextFactory`] at the start of a pipeline invocation, threaded
//! through every middleware and the fan-out strategy, and handed back to the
//! caller.

use crate::contract::{ContractKind, Envelope, NoResponse, TypeKey};
use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A unique identifier for each dispatch, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps log lines of one dispatch easy to
/// correlate.
///
/// # Example
///
/// ```
/// use hermes_core::DispatchId;
///
/// let id = DispatchId::new();
/// println!("Dispatch ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Creates a new unique dispatch ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `DispatchId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A type-erased response value.
pub type BoxedResponse = Box<dyn Any + Send + Sync>;

/// Mutable state of one dispatch.
///
/// The request and the response type are fixed at construction. The
/// response and the error are written by middleware and handlers.
///
/// # Example
///
/// ```
/// use hermes_core::{DispatchError, Envelope, InvocationContext, TypeKey};
///
/// struct GetGreeting;
///
/// let mut ctx = InvocationContext::new(Envelope::new(GetGreeting), TypeKey::of::<String>());
/// assert!(ctx.is_request());
/// assert!(!ctx.has_response());
///
/// ctx.set_response(String::from("hello"));
/// assert_eq!(ctx.response::<String>().map(String::as_str), Some("hello"));
///
/// ctx.add_error(DispatchError::Cancelled);
/// assert!(!ctx.is_success());
/// ```
pub struct InvocationContext {
    id: DispatchId,
    request: Envelope,
    response_type: TypeKey,
    response: Option<BoxedResponse>,
    error: Option<DispatchError>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl InvocationContext {
    /// Creates a context for `request` expecting `response_type`.
    #[must_use]
    pub fn new(request: Envelope, response_type: TypeKey) -> Self {
        Self {
            id: DispatchId::new(),
            request,
            response_type,
            response: None,
            error: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the dispatch ID.
    #[must_use]
    pub const fn id(&self) -> DispatchId {
        self.id
    }

    /// Returns the contract being dispatched.
    #[must_use]
    pub const fn request(&self) -> &Envelope {
        &self.request
    }

    /// Returns the runtime type of the contract.
    #[must_use]
    pub const fn request_type(&self) -> TypeKey {
        self.request.contract_type()
    }

    /// Returns the contract as `C`, if that is its type.
    #[must_use]
    pub fn request_as<C: 'static>(&self) -> Option<&C> {
        self.request.downcast_ref::<C>()
    }

    /// Returns the expected response type.
    #[must_use]
    pub const fn response_type(&self) -> TypeKey {
        self.response_type
    }

    /// Returns the contract kind implied by the response type.
    #[must_use]
    pub fn kind(&self) -> ContractKind {
        ContractKind::of(self.response_type)
    }

    /// Returns `true` for events.
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.kind() == ContractKind::Event
    }

    /// Returns `true` for commands.
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.kind() == ContractKind::Command
    }

    /// Returns `true` for requests.
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.kind() == ContractKind::Request
    }

    /// Returns `false` only when the response type is [`NoResponse`].
    #[must_use]
    pub fn has_response_type(&self) -> bool {
        self.response_type != TypeKey::of::<NoResponse>()
    }

    /// Returns `true` if a response has been set.
    #[must_use]
    pub const fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Sets the response, replacing any previous one.
    pub fn set_response<T: Send + Sync + 'static>(&mut self, response: T) {
        self.response = Some(Box::new(response));
    }

    /// Overwrites the response slot, including clearing it with `None`.
    pub fn set_response_boxed(&mut self, response: Option<BoxedResponse>) {
        self.response = response;
    }

    /// Clears the response.
    pub fn clear_response(&mut self) {
        self.response = None;
    }

    /// Returns the response as `T`, if one is set and has that type.
    #[must_use]
    pub fn response<T: 'static>(&self) -> Option<&T> {
        self.response.as_ref().and_then(|r| r.downcast_ref::<T>())
    }

    /// Takes the response out as `T`.
    ///
    /// A response of another type is left in place.
    pub fn take_response<T: 'static>(&mut self) -> Option<T> {
        match self.response.take() {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(value) => Some(*value),
                Err(original) => {
                    self.response = Some(original);
                    None
                }
            },
            None => None,
        }
    }

    /// Returns the captured error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&DispatchError> {
        self.error.as_ref()
    }

    /// Returns `true` if an error has been captured.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if no error has been captured.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Replaces the captured error wholesale.
    pub fn set_error(&mut self, error: DispatchError) {
        self.error = Some(error);
    }

    /// Merges `error` into the captured error.
    ///
    /// The first error is kept as is; a second one turns the slot into an
    /// aggregate; later ones are appended to it.
    pub fn add_error(&mut self, error: DispatchError) {
        self.error = Some(DispatchError::merge(self.error.take(), error));
    }

    /// Removes and returns the captured error.
    pub fn take_error(&mut self) -> Option<DispatchError> {
        self.error.take()
    }

    /// Returns the time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a value for later middleware, keyed by its type.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Returns a value stored by [`set_extension`](Self::set_extension).
    #[must_use]
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Removes a stored value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("id", &self.id)
            .field("request_type", &self.request.contract_type())
            .field("response_type", &self.response_type)
            .field("has_response", &self.response.is_some())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Creates the context for each dispatch.
pub trait ContextFactory: Send + Sync + 'static {
    /// Creates a context for `request`.
    ///
    /// # Panics
    ///
    /// Implementations must panic if the runtime type of `request` differs
    /// from `request_type`: that is an integration bug, not a dispatch
    /// failure.
    fn create(
        &self,
        request_type: TypeKey,
        response_type: TypeKey,
        request: Envelope,
    ) -> InvocationContext;
}

/// The default [`ContextFactory`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextFactory;

impl ContextFactory for DefaultContextFactory {
    fn create(
        &self,
        request_type: TypeKey,
        response_type: TypeKey,
        request: Envelope,
    ) -> InvocationContext {
        assert_eq!(
            request.contract_type(),
            request_type,
            "contract of type {} dispatched to a pipeline for {}",
            request.contract_type(),
            request_type
        );
        InvocationContext::new(request, response_type)
    }
}
