//! # Hermes Core
//!
//! Core types and traits for the Hermes in-process dispatch engine.
//!
//! This crate provides the foundational types used throughout Hermes:
//!
//! - [`TypeKey`] / [`RouteKey`] - Identity of contracts and the pipeline lookup key
//! - [`Envelope`] - A type-erased contract value
//! - [`InvocationContext`] - Mutable state of one dispatch
//! - [`DispatchError`] - Error taxonomy and aggregation
//! - [`ComponentResolver`] - On-demand component instances
//! - [`Handler`] / [`ErasedHandler`] - Handler traits
//! - [`CancelSignal`] - Caller-supplied cancellation

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod context;
pub mod contract;
pub mod di;
mod error;
mod handler;

pub use cancel::CancelSignal;
pub use context::{BoxedResponse, ContextFactory, DefaultContextFactory, DispatchId, InvocationContext};
pub use contract::{
    CommandResponse, ContractKind, Envelope, EventResponse, FanOut, NoResponse, Request, RouteKey,
    TypeKey,
};
pub use di::{ComponentResolver, Container, ResolveError, Singleton, Transient};
pub use error::{DispatchError, DispatchResult, ErrorCategory};
pub use handler::{BoxFuture, ErasedHandler, FnHandler, Handler, HandlerAdapter};
