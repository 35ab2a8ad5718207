//! # Hermes Middleware
//!
//! Middleware chain primitives for the Hermes dispatch engine.
//!
//! Every dispatch runs through a chain of this shape:
//!
//! ```text
//! PrePipelineHook → middleware (by order) → PreHandlerHook → fan-out strategy
//!        ↑                                        ↓
//!        └──────────── unwinds in reverse ────────┘
//! ```
//!
//! - [`Middleware`] / [`Next`] - The stage trait and its continuation
//! - [`MiddlewareItem`] - A registration: order, applicability filters, resolver
//! - [`PrePipelineHook`] / [`PreHandlerHook`] - Capture boundaries of every chain
//! - [`DispatchObserver`] - Optional callbacks at the hook points
//! - [`TracingMiddleware`] / [`TelemetryMiddleware`] - Built-in stages
//!
//! ## Example
//!
//! ```
//! use hermes_core::{CommandResponse, RouteKey};
//! use hermes_middleware::{applicable_items, MiddlewareItem, TelemetryMiddleware, TracingMiddleware};
//!
//! struct CreateUser;
//!
//! let items = vec![
//!     MiddlewareItem::singleton(TelemetryMiddleware::new()).with_order(10),
//!     MiddlewareItem::singleton(TracingMiddleware::new()).with_order(0),
//! ];
//!
//! let chain = applicable_items(&items, RouteKey::of::<CreateUser, CommandResponse>());
//! assert_eq!(chain[0].resolve().unwrap().name(), "tracing");
//! assert_eq!(chain[1].resolve().unwrap().name(), "telemetry");
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod hooks;
pub mod item;
pub mod middleware;
pub mod stages;

pub use hooks::{DispatchObserver, LoggingObserver, PreHandlerHook, PrePipelineHook};
pub use item::{applicable_items, MiddlewareItem, TypeFilter};
pub use middleware::{FnMiddleware, Middleware, MiddlewareResult, Next, Terminal};
pub use stages::{DispatchTelemetry, TelemetryMiddleware, TracingMiddleware};
