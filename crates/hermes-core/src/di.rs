//! Component resolution.
//!
//! The dispatch engine never constructs middleware, handlers or fan-out
//! strategies itself. It asks a [`ComponentResolver`] for an instance each
//! time it needs one, so lifetime management (shared instance versus a fresh
//! instance per dispatch) stays with whoever registered the component.
//!
//! A small type-keyed [`Container`] is also provided for factories that need
//! shared services.
//!
//! # Example
//!
//! ```rust
//! use hermes_core::di::{ComponentResolver, Container, Singleton, Transient};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct Repository {
//!     db: Arc<Database>,
//! }
//!
//! let mut container = Container::new();
//! container.register(Arc::new(Database { url: "postgres://localhost/db".into() }));
//! let container = Arc::new(container);
//!
//! // A fresh repository for every resolve, sharing the registered database.
//! let repositories = Transient::new(move || {
//!     Ok(Arc::new(Repository { db: container.resolve_required::<Database>()? }))
//! });
//! let repo: Arc<Repository> = repositories.resolve().unwrap();
//! assert_eq!(repo.db.url, "postgres://localhost/db");
//!
//! let shared = Singleton::new(Arc::new(42_u32));
//! assert!(Arc::ptr_eq(&shared.resolve().unwrap(), &shared.resolve().unwrap()));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Error when a component cannot be resolved.
#[derive(Debug, Clone)]
pub struct ResolveError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
    /// The reason for the failure.
    pub reason: String,
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to resolve {}: {}", self.type_name, self.reason)
    }
}

impl std::error::Error for ResolveError {}

impl ResolveError {
    /// Creates a resolve error for a missing service.
    pub fn not_registered<T: ?Sized>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: "service not registered".to_string(),
        }
    }

    /// Creates a resolve error with a custom reason.
    pub fn custom<T: ?Sized>(reason: impl Into<String>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// Yields an instance of a component on demand.
///
/// `T` is usually a trait object such as `dyn Middleware`.
pub trait ComponentResolver<T: ?Sized>: Send + Sync {
    /// Returns an instance of the component.
    fn resolve(&self) -> Result<Arc<T>, ResolveError>;
}

/// Resolves the same shared instance every time.
pub struct Singleton<T: ?Sized> {
    instance: Arc<T>,
}

impl<T: ?Sized> Singleton<T> {
    /// Creates a resolver that always returns `instance`.
    pub fn new(instance: Arc<T>) -> Self {
        Self { instance }
    }
}

impl<T: ?Sized + Send + Sync> ComponentResolver<T> for Singleton<T> {
    fn resolve(&self) -> Result<Arc<T>, ResolveError> {
        Ok(Arc::clone(&self.instance))
    }
}

impl<T: ?Sized> fmt::Debug for Singleton<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Singleton")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Builds a new instance on every resolve.
pub struct Transient<T: ?Sized, F> {
    factory: F,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized, F> Transient<T, F>
where
    F: Fn() -> Result<Arc<T>, ResolveError> + Send + Sync,
{
    /// Creates a resolver that calls `factory` on every resolve.
    pub const fn new(factory: F) -> Self {
        Self {
            factory,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized, F> ComponentResolver<T> for Transient<T, F>
where
    F: Fn() -> Result<Arc<T>, ResolveError> + Send + Sync,
{
    fn resolve(&self) -> Result<Arc<T>, ResolveError> {
        (self.factory)()
    }
}

impl<T: ?Sized, F> fmt::Debug for Transient<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transient")
            .field("type", &std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

/// A type-keyed service container.
///
/// Services are registered once at startup and looked up by type from
/// component factories.
///
/// # Thread Safety
///
/// The container is `Send + Sync` and can be shared across threads behind an
/// `Arc`.
#[derive(Default)]
pub struct Container {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Registers a service, replacing any previous service of the same type.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Resolves a service, or `None` if it is not registered.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|s| Arc::clone(s).downcast::<T>().ok())
    }

    /// Resolves a service or returns an error.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve().ok_or_else(ResolveError::not_registered::<T>)
    }

    /// Checks if a service is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.services.len())
            .finish()
    }
}
