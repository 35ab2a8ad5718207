//! Contract identity and routing keys.
//!
//! A contract is any `Send + Sync + 'static` value. Its runtime type together
//! with the response type the caller expects form the [`RouteKey`] used to
//! find the pipeline that handles it.
//!
//! Commands and events are ordinary contracts whose response type is one of
//! the sentinel markers [`CommandResponse`] or [`EventResponse`].
//!
//! # Example
//!
//! ```
//! use hermes_core::contract::{ContractKind, EventResponse, RouteKey, TypeKey};
//!
//! struct UserCreated;
//!
//! let route = RouteKey::of::<UserCreated, EventResponse>();
//! assert_eq!(route.kind(), ContractKind::Event);
//! assert_eq!(route.request, TypeKey::of::<UserCreated>());
//! ```

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a Rust type.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for
/// diagnostics and log fields.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying type id.
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Returns `true` if this key is one of the response sentinels.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::of::<CommandResponse>()
            || *self == Self::of::<EventResponse>()
            || *self == Self::of::<NoResponse>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Response marker for fire-and-forget commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CommandResponse;

/// Response marker for broadcast events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventResponse;

/// Response marker for contracts that produce no response type at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NoResponse;

/// The three conventional contract kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    /// A contract expecting a domain response.
    Request,
    /// A contract answered with [`CommandResponse`].
    Command,
    /// A contract answered with [`EventResponse`].
    Event,
}

impl ContractKind {
    /// Classifies a response type.
    #[must_use]
    pub fn of(response: TypeKey) -> Self {
        if response == TypeKey::of::<EventResponse>() {
            Self::Event
        } else if response == TypeKey::of::<CommandResponse>() {
            Self::Command
        } else {
            Self::Request
        }
    }

    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Command => "command",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the handlers registered for a route are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    /// Exactly one handler.
    Single,
    /// Every handler in registration order, stopping at the first failure.
    Sequential,
    /// Every handler concurrently; failures never cancel siblings.
    Parallel,
    /// No handler; used when no pipeline was registered.
    NoOp,
}

impl FanOut {
    /// Returns the default fan-out for a contract kind.
    #[must_use]
    pub const fn default_for(kind: ContractKind) -> Self {
        match kind {
            ContractKind::Event => Self::Parallel,
            ContractKind::Request | ContractKind::Command => Self::Single,
        }
    }

    /// Returns the label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::NoOp => "no_op",
        }
    }
}

/// The `(request type, response type)` pair that selects a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    /// Runtime type of the contract.
    pub request: TypeKey,
    /// Response type expected by the caller.
    pub response: TypeKey,
}

impl RouteKey {
    /// Creates a key from two type keys.
    #[must_use]
    pub const fn new(request: TypeKey, response: TypeKey) -> Self {
        Self { request, response }
    }

    /// Creates the key for contract `C` answered with `R`.
    #[must_use]
    pub fn of<C: ?Sized + 'static, R: ?Sized + 'static>() -> Self {
        Self::new(TypeKey::of::<C>(), TypeKey::of::<R>())
    }

    /// Returns the contract kind implied by the response type.
    #[must_use]
    pub fn kind(&self) -> ContractKind {
        ContractKind::of(self.response)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} -> {})", self.request, self.response)
    }
}

/// A contract with a statically known response type.
///
/// Implementing this trait is optional; it only lets the mediator infer the
/// response type in `send`.
///
/// ```
/// use hermes_core::Request;
///
/// struct GetGreeting {
///     name: String,
/// }
///
/// impl Request for GetGreeting {
///     type Response = String;
/// }
/// ```
pub trait Request: Send + Sync + 'static {
    /// The response produced by the handler of this request.
    type Response: Send + Sync + 'static;
}

/// A type-erased contract value tagged with its runtime type.
///
/// Envelopes are cheap to clone; every clone shares the same contract.
#[derive(Clone)]
pub struct Envelope {
    key: TypeKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    /// Wraps a contract value.
    pub fn new<C: Send + Sync + 'static>(contract: C) -> Self {
        Self::from_arc(Arc::new(contract))
    }

    /// Wraps an already shared contract value.
    pub fn from_arc<C: Send + Sync + 'static>(contract: Arc<C>) -> Self {
        Self {
            key: TypeKey::of::<C>(),
            value: contract,
        }
    }

    /// Returns the runtime type of the contract.
    #[must_use]
    pub const fn contract_type(&self) -> TypeKey {
        self.key
    }

    /// Returns the erased contract value.
    #[must_use]
    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }

    /// Returns the contract as `C` if that is its runtime type.
    #[must_use]
    pub fn downcast_ref<C: 'static>(&self) -> Option<&C> {
        self.value.downcast_ref::<C>()
    }

    /// Returns a shared handle to the contract as `C`.
    #[must_use]
    pub fn downcast_arc<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.value).downcast::<C>().ok()
    }

    /// Returns `true` if the contract is a `C`.
    #[must_use]
    pub fn is<C: 'static>(&self) -> bool {
        self.value.is::<C>()
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("contract_type", &self.key)
            .finish_non_exhaustive()
    }
}
