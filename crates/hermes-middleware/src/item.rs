//! Middleware chain items.
//!
//! A [`MiddlewareItem`] is one registration: an order, a filter over the
//! request type, a filter over the response type, and a resolver that yields
//! the middleware instance. A pipeline keeps the items whose filters accept
//! its route, sorted by order with ties kept in registration order.
//!
//! # Example
//!
//! ```
//! use hermes_core::{CommandResponse, RouteKey};
//! use hermes_middleware::{MiddlewareItem, TracingMiddleware};
//!
//! struct CreateUser;
//! struct GetUser;
//!
//! // Every command, whatever its contract type
//! let item = MiddlewareItem::singleton(TracingMiddleware::new())
//!     .with_order(-10)
//!     .for_commands();
//!
//! assert!(item.applies_to(RouteKey::of::<CreateUser, CommandResponse>()));
//! assert!(!item.applies_to(RouteKey::of::<GetUser, String>()));
//! ```

use crate::middleware::Middleware;
use hermes_core::{
    CommandResponse, ComponentResolver, EventResponse, ResolveError, RouteKey, Singleton,
    Transient, TypeKey,
};
use std::fmt;
use std::sync::Arc;

/// Matches one half of a route key.
#[derive(Clone, Default)]
pub enum TypeFilter {
    /// Matches every type.
    #[default]
    Any,
    /// Matches exactly one type.
    Exact(TypeKey),
    /// Matches the types accepted by a predicate.
    Predicate(Arc<dyn Fn(TypeKey) -> bool + Send + Sync>),
}

impl TypeFilter {
    /// Matches exactly `T`.
    #[must_use]
    pub fn exact<T: ?Sized + 'static>() -> Self {
        Self::Exact(TypeKey::of::<T>())
    }

    /// Matches the types accepted by `predicate`.
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(TypeKey) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Returns `true` if `key` is accepted.
    #[must_use]
    pub fn matches(&self, key: TypeKey) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => *expected == key,
            Self::Predicate(predicate) => predicate(key),
        }
    }
}

impl fmt::Debug for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Exact(key) => f.debug_tuple("Exact").field(key).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A registered middleware.
#[derive(Clone)]
pub struct MiddlewareItem {
    order: i32,
    request: TypeFilter,
    response: TypeFilter,
    resolver: Arc<dyn ComponentResolver<dyn Middleware>>,
}

impl MiddlewareItem {
    /// Creates an item for every route, with order 0.
    pub fn new<R>(resolver: R) -> Self
    where
        R: ComponentResolver<dyn Middleware> + 'static,
    {
        Self::from_resolver(Arc::new(resolver))
    }

    /// Creates an item from a shared resolver.
    pub fn from_resolver(resolver: Arc<dyn ComponentResolver<dyn Middleware>>) -> Self {
        Self {
            order: 0,
            request: TypeFilter::Any,
            response: TypeFilter::Any,
            resolver,
        }
    }

    /// Creates an item that shares one middleware instance across dispatches.
    pub fn singleton<M: Middleware>(middleware: M) -> Self {
        Self::new(Singleton::new(Arc::new(middleware) as Arc<dyn Middleware>))
    }

    /// Creates an item that builds a fresh middleware for every dispatch.
    pub fn transient<M, F>(factory: F) -> Self
    where
        M: Middleware,
        F: Fn() -> Result<M, ResolveError> + Send + Sync + 'static,
    {
        Self::new(Transient::new(move || {
            factory().map(|m| Arc::new(m) as Arc<dyn Middleware>)
        }))
    }

    /// Sets the order. Lower runs first (outermost).
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Restricts the item to contracts of type `T`.
    #[must_use]
    pub fn for_request<T: ?Sized + 'static>(mut self) -> Self {
        self.request = TypeFilter::exact::<T>();
        self
    }

    /// Restricts the item to routes answered with `T`.
    #[must_use]
    pub fn for_response<T: ?Sized + 'static>(mut self) -> Self {
        self.response = TypeFilter::exact::<T>();
        self
    }

    /// Restricts the item to commands.
    #[must_use]
    pub fn for_commands(self) -> Self {
        self.for_response::<CommandResponse>()
    }

    /// Restricts the item to events.
    #[must_use]
    pub fn for_events(self) -> Self {
        self.for_response::<EventResponse>()
    }

    /// Restricts the item to requests (non-sentinel response types).
    #[must_use]
    pub fn for_requests(mut self) -> Self {
        self.response = TypeFilter::predicate(|key| !key.is_sentinel());
        self
    }

    /// Sets the request filter.
    #[must_use]
    pub fn with_request_filter(mut self, filter: TypeFilter) -> Self {
        self.request = filter;
        self
    }

    /// Sets the response filter.
    #[must_use]
    pub fn with_response_filter(mut self, filter: TypeFilter) -> Self {
        self.response = filter;
        self
    }

    /// Returns the order.
    #[must_use]
    pub const fn order(&self) -> i32 {
        self.order
    }

    /// Returns `true` if this item participates in the chain for `route`.
    #[must_use]
    pub fn applies_to(&self, route: RouteKey) -> bool {
        self.request.matches(route.request) && self.response.matches(route.response)
    }

    /// Resolves the middleware instance.
    pub fn resolve(&self) -> Result<Arc<dyn Middleware>, ResolveError> {
        self.resolver.resolve()
    }
}

impl fmt::Debug for MiddlewareItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareItem")
            .field("order", &self.order)
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Keeps the items that apply to `route`, sorted by order.
///
/// The sort is stable: items with equal order keep their relative position.
#[must_use]
pub fn applicable_items(items: &[MiddlewareItem], route: RouteKey) -> Vec<MiddlewareItem> {
    let mut applicable: Vec<MiddlewareItem> = items
        .iter()
        .filter(|item| item.applies_to(route))
        .cloned()
        .collect();
    applicable.sort_by_key(MiddlewareItem::order);
    applicable
}
