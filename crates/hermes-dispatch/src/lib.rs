//! # Hermes Dispatch
//!
//! Invocation pipelines and the mediator facade.
//!
//! - [`Mediator`] - Routes contracts to pipelines; capturing and non-capturing calls
//! - [`MediatorBuilder`] - Registers handlers, middleware and collaborators
//! - [`InvocationPipeline`] - The memoized chain of one route
//! - [`FanOutStrategy`] - How the handlers of a route are invoked
//! - [`DispatchConfig`] - Dispatch settings
//!
//! ## Example
//!
//! ```
//! use hermes_core::{CancelSignal, CommandResponse, DispatchError, Handler};
//! use hermes_dispatch::Mediator;
//!
//! struct RenameUser {
//!     name: String,
//! }
//!
//! struct UserRenamed;
//!
//! struct RenameHandler;
//!
//! impl Handler<RenameUser, CommandResponse> for RenameHandler {
//!     async fn handle(
//!         &self,
//!         command: &RenameUser,
//!         _cancel: &CancelSignal,
//!     ) -> Result<CommandResponse, DispatchError> {
//!         if command.name.is_empty() {
//!             return Err(DispatchError::handler(anyhow::anyhow!("name is required")));
//!         }
//!         Ok(CommandResponse)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mediator = Mediator::builder()
//!     .command_handler::<RenameUser, _>(RenameHandler)
//!     .build();
//! let cancel = CancelSignal::none();
//!
//! mediator.invoke(RenameUser { name: "ada".into() }, &cancel).await.unwrap();
//! assert!(mediator.invoke(RenameUser { name: String::new() }, &cancel).await.is_err());
//!
//! // Nobody listens to UserRenamed: publishing still succeeds.
//! mediator.publish(UserRenamed, &cancel).await.unwrap();
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-dispatch/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod builder;
mod config;
pub mod fanout;
mod mediator;
pub mod pipeline;

pub use builder::MediatorBuilder;
pub use config::DispatchConfig;
pub use fanout::{
    strategy_for, FanOutStrategy, HandlerResolver, NoOpStrategy, ParallelStrategy,
    SequentialStrategy, SingleStrategy,
};
pub use mediator::Mediator;
pub use pipeline::{InvocationPipeline, PipelineOptions, StrategyResolver};
