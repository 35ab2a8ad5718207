//! # Hermes
//!
//! **In-process mediator with middleware pipelines and handler fan-out**
//!
//! Hermes routes commands, events and requests to their handlers through an
//! ordered middleware chain:
//!
//! - **Typed routes** – a pipeline per (contract, response type) pair
//! - **Middleware filters** – items apply by request type, response type or contract kind
//! - **Fan-out strategies** – single, sequential, parallel and no-op handler invocation
//! - **Captured failures** – errors and panics are recorded on the invocation context
//!
//! ## Quick Start
//!
//! ```
//! use hermes::prelude::*;
//! use std::sync::Arc;
//!
//! struct GetGreeting {
//!     name: String,
//! }
//!
//! impl Request for GetGreeting {
//!     type Response = String;
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::new().with_development().load()?;
//!
//! let mediator = hermes::builder(&config)
//!     .handler_fn(|req: Arc<GetGreeting>, _cancel| async move {
//!         Ok::<_, DispatchError>(format!("hello, {}", req.name))
//!     })
//!     .build();
//! mediator.validate()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Every dispatch runs the same frame, built once per route:
//!
//! ```text
//! PrePipelineHook → Middleware (ascending order) → PreHandlerHook → FanOutStrategy → Handlers
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use hermes_config::HermesConfig;
use hermes_dispatch::{Mediator, MediatorBuilder};
use hermes_middleware::{MiddlewareItem, TelemetryMiddleware, TracingMiddleware};

// Re-export core types
pub use hermes_core as core;

// Re-export middleware types
pub use hermes_middleware as middleware;

// Re-export dispatch types
pub use hermes_dispatch as dispatch;

// Re-export telemetry setup
pub use hermes_telemetry as telemetry;

// Re-export configuration
pub use hermes_config as config;

/// Starts a [`MediatorBuilder`] from loaded configuration.
///
/// Applies the dispatch section and registers [`TracingMiddleware`]. When
/// metrics are enabled, [`TelemetryMiddleware`] is registered after it.
pub fn builder(config: &HermesConfig) -> MediatorBuilder {
    let builder = Mediator::builder()
        .with_config(config.dispatch.clone())
        .middleware(MiddlewareItem::singleton(TracingMiddleware::new()));

    if config.telemetry.metrics.enabled {
        builder.middleware(MiddlewareItem::singleton(TelemetryMiddleware::new()))
    } else {
        builder
    }
}

/// Installs logging and metrics as described by `config`.
///
/// Call once, at startup.
pub fn init_telemetry(config: &HermesConfig) -> hermes_telemetry::TelemetryResult<()> {
    hermes_telemetry::init_telemetry(&config.telemetry)
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use hermes_core::{
        BoxFuture, CancelSignal, CommandResponse, ContractKind, DispatchError, DispatchResult,
        Envelope, EventResponse, FanOut, Handler, InvocationContext, Request, RouteKey, TypeKey,
    };

    // Re-export DI types
    pub use hermes_core::{ComponentResolver, ResolveError, Singleton, Transient};

    // Re-export middleware types
    pub use hermes_middleware::{
        DispatchObserver, Middleware, MiddlewareItem, MiddlewareResult, Next,
        TelemetryMiddleware, TracingMiddleware, TypeFilter,
    };

    // Re-export dispatch types
    pub use hermes_dispatch::{DispatchConfig, Mediator, MediatorBuilder};

    // Re-export configuration types
    pub use hermes_config::{ConfigError, ConfigLoader, HermesConfig};
}
