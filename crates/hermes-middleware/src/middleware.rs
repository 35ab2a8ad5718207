//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that every chain stage
//! implements. A middleware receives the invocation context, the caller's
//! cancel signal and a [`Next`] continuation. Work done before
//! `next.run(..)` happens on the way in; work done after it happens on the
//! way out, in reverse registration order.
//!
//! # Example
//!
//! ```
//! use hermes_core::{BoxFuture, CancelSignal, InvocationContext};
//! use hermes_middleware::{Middleware, MiddlewareResult, Next};
//!
//! struct Audit;
//!
//! impl Middleware for Audit {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut InvocationContext,
//!         cancel: &'a CancelSignal,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, MiddlewareResult> {
//!         Box::pin(async move {
//!             println!("dispatching {}", ctx.request_type().short_name());
//!             let result = next.run(ctx, cancel).await;
//!             println!("success: {}", ctx.is_success());
//!             result
//!         })
//!     }
//! }
//! ```

use hermes_core::{BoxFuture, CancelSignal, DispatchError, InvocationContext};

/// What a middleware stage returns.
///
/// An `Err` is captured onto the context by the nearest enclosing hook
/// frame; it never escapes the pipeline.
pub type MiddlewareResult = Result<(), DispatchError>;

/// The core middleware trait.
///
/// # Invariants
///
/// - Middleware calls `next.run()` at most once; not calling it
///   short-circuits the rest of the chain, handlers included
/// - Middleware never replaces the context; it mutates it in place
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Processes one dispatch.
    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult>;
}

/// The end of a chain: the code that runs after the last middleware.
pub type Terminal<'a> = Box<
    dyn for<'b> FnOnce(&'b mut InvocationContext, &'b CancelSignal) -> BoxFuture<'b, MiddlewareResult>
        + Send
        + 'a,
>;

/// Continuation to the rest of the chain.
///
/// `run` consumes `self`, so the rest of the chain runs at most once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Terminal(Terminal<'a>),
}

impl<'a> Next<'a> {
    /// Creates a continuation that runs `middleware`, then `next`.
    pub fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates the terminal continuation.
    pub fn terminal<F>(f: F) -> Self
    where
        F: for<'b> FnOnce(&'b mut InvocationContext, &'b CancelSignal) -> BoxFuture<'b, MiddlewareResult>
            + Send
            + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// Creates a terminal continuation that does nothing.
    pub fn noop() -> Self {
        Self::terminal(|_ctx, _cancel| Box::pin(async { Ok(()) }))
    }

    /// Invokes the next middleware, or the terminal.
    pub fn run<'b>(
        self,
        ctx: &'b mut InvocationContext,
        cancel: &'b CancelSignal,
    ) -> BoxFuture<'b, MiddlewareResult>
    where
        'a: 'b,
    {
        match self.inner {
            NextInner::Chain { middleware, next } => middleware.process(ctx, cancel, *next),
            NextInner::Terminal(terminal) => terminal(ctx, cancel),
        }
    }
}

/// A middleware built from a closure.
///
/// # Example
///
/// ```
/// use hermes_middleware::FnMiddleware;
///
/// let timing = FnMiddleware::new("timing", |ctx, cancel, next| {
///     Box::pin(async move {
///         let result = next.run(ctx, cancel).await;
///         println!("took {:?}", ctx.elapsed());
///         result
///     })
/// });
/// # let _ = timing;
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut InvocationContext, &'a CancelSignal, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut InvocationContext, &'a CancelSignal, Next<'a>) -> BoxFuture<'a, MiddlewareResult>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        (self.func)(ctx, cancel, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{Envelope, TypeKey};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Ping;

    fn ctx() -> InvocationContext {
        InvocationContext::new(Envelope::new(Ping), TypeKey::of::<String>())
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut InvocationContext,
            cancel: &'a CancelSignal,
            next: Next<'a>,
        ) -> BoxFuture<'a, MiddlewareResult> {
            Box::pin(async move {
                self.log.lock().push(format!("{}-before", self.name));
                let result = next.run(ctx, cancel).await;
                self.log.lock().push(format!("{}-after", self.name));
                result
            })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn process<'a>(
            &'a self,
            ctx: &'a mut InvocationContext,
            _cancel: &'a CancelSignal,
            _next: Next<'a>,
        ) -> BoxFuture<'a, MiddlewareResult> {
            Box::pin(async move {
                ctx.set_response("cached".to_string());
                Ok(())
            })
        }
    }

    #[test]
    fn test_default_name_is_type_name() {
        assert!(ShortCircuit.name().ends_with("ShortCircuit"));
    }

    #[tokio::test]
    async fn test_terminal_runs() {
        let mut ctx = ctx();
        let next = Next::terminal(|ctx, _cancel| {
            Box::pin(async move {
                ctx.set_response("done".to_string());
                Ok(())
            })
        });

        next.run(&mut ctx, &CancelSignal::none()).await.unwrap();
        assert_eq!(ctx.response::<String>().unwrap(), "done");
    }

    #[tokio::test]
    async fn test_chain_unwinds_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let outer = Recorder {
            name: "outer",
            log: Arc::clone(&log),
        };
        let inner = Recorder {
            name: "inner",
            log: Arc::clone(&log),
        };

        let terminal_log = Arc::clone(&log);
        let terminal = Next::terminal(move |_ctx, _cancel| {
            Box::pin(async move {
                terminal_log.lock().push("handler".to_string());
                Ok(())
            })
        });
        let next = Next::new(&outer, Next::new(&inner, terminal));

        let mut ctx = ctx();
        next.run(&mut ctx, &CancelSignal::none()).await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["outer-before", "inner-before", "handler", "inner-after", "outer-after"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_terminal() {
        let reached = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&reached);
        let next = Next::new(
            &ShortCircuit,
            Next::terminal(move |_ctx, _cancel| {
                Box::pin(async move {
                    *flag.lock() = true;
                    Ok(())
                })
            }),
        );

        let mut ctx = ctx();
        next.run(&mut ctx, &CancelSignal::none()).await.unwrap();
        assert_eq!(ctx.response::<String>().unwrap(), "cached");
        assert!(!*reached.lock());
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let middleware = FnMiddleware::new("tagger", |ctx, cancel, next| {
            Box::pin(async move {
                ctx.set_extension(7_u32);
                next.run(ctx, cancel).await
            })
        });
        assert_eq!(middleware.name(), "tagger");

        let mut ctx = ctx();
        middleware
            .process(&mut ctx, &CancelSignal::none(), Next::noop())
            .await
            .unwrap();
        assert_eq!(ctx.extension::<u32>(), Some(&7));
    }

    #[tokio::test]
    async fn test_error_propagates_to_caller() {
        let failing = FnMiddleware::new("failing", |_ctx, _cancel, _next| {
            Box::pin(async { Err::<(), _>(DispatchError::handler(anyhow::anyhow!("rejected"))) })
        });

        let mut ctx = ctx();
        let err = failing
            .process(&mut ctx, &CancelSignal::none(), Next::noop())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rejected");
    }
}
