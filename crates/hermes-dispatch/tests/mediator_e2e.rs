//! End-to-end mediator tests.
//!
//! These dispatch through the public builder and mediator and check:
//!
//! 1. Middleware ordering - onion order, ties in registration order
//! 2. Applicability - `(Any, Any)` versus contract-specific middleware
//! 3. Fan-out - single, sequential stop, parallel partial failure
//! 4. Missing routes - silent for events, "not found" otherwise
//! 5. Error capture - aggregation, panics, cancellation, misconfiguration

use futures_util::FutureExt;
use hermes_core::{
    BoxFuture, CancelSignal, CommandResponse, DispatchError, EventResponse, FanOut, Handler,
    InvocationContext, Request, RouteKey,
};
use hermes_dispatch::{DispatchConfig, Mediator};
use hermes_middleware::{DispatchObserver, Middleware, MiddlewareItem, MiddlewareResult, Next};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

// Contracts

struct GetGreeting {
    name: String,
}

impl Request for GetGreeting {
    type Response = String;
}

struct RenameUser;

struct UserCreated;

// Handlers

struct Greeter;

impl Handler<GetGreeting, String> for Greeter {
    async fn handle(
        &self,
        request: &GetGreeting,
        _cancel: &CancelSignal,
    ) -> Result<String, DispatchError> {
        if request.name == "ok" {
            return Ok("ok".to_string());
        }
        Ok(format!("hello {}", request.name))
    }
}

struct Renamer;

impl Handler<RenameUser, CommandResponse> for Renamer {
    async fn handle(
        &self,
        _command: &RenameUser,
        _cancel: &CancelSignal,
    ) -> Result<CommandResponse, DispatchError> {
        Ok(CommandResponse)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("listener {0} failed")]
struct ListenerFailed(usize);

struct Listener {
    id: usize,
    fail: bool,
    log: Log,
}

impl Listener {
    fn new(id: usize, log: &Log) -> Self {
        Self {
            id,
            fail: false,
            log: Arc::clone(log),
        }
    }

    fn failing(id: usize, log: &Log) -> Self {
        Self {
            fail: true,
            ..Self::new(id, log)
        }
    }
}

impl Handler<UserCreated, EventResponse> for Listener {
    async fn handle(
        &self,
        _event: &UserCreated,
        _cancel: &CancelSignal,
    ) -> Result<EventResponse, DispatchError> {
        self.log.lock().push(format!("listener-{}", self.id));
        if self.fail {
            return Err(DispatchError::handler(ListenerFailed(self.id)));
        }
        Ok(EventResponse)
    }
}

struct Exploding;

impl Handler<GetGreeting, String> for Exploding {
    async fn handle(
        &self,
        _request: &GetGreeting,
        _cancel: &CancelSignal,
    ) -> Result<String, DispatchError> {
        panic!("greeter exploded")
    }
}

struct Patient;

impl Handler<GetGreeting, String> for Patient {
    async fn handle(
        &self,
        _request: &GetGreeting,
        cancel: &CancelSignal,
    ) -> Result<String, DispatchError> {
        cancel.check()?;
        Ok("finished".to_string())
    }
}

// Middleware

struct Recorder {
    tag: String,
    log: Log,
}

impl Middleware for Recorder {
    fn process<'a>(
        &'a self,
        ctx: &'a mut InvocationContext,
        cancel: &'a CancelSignal,
        next: Next<'a>,
    ) -> BoxFuture<'a, MiddlewareResult> {
        Box::pin(async move {
            self.log.lock().push(format!("{}-before", self.tag));
            let result = next.run(ctx, cancel).await;
            self.log.lock().push(format!("{}-after", self.tag));
            result
        })
    }
}

fn recorder(tag: impl Into<String>, log: &Log) -> MiddlewareItem {
    MiddlewareItem::singleton(Recorder {
        tag: tag.into(),
        log: Arc::clone(log),
    })
}

fn greeting(name: &str) -> GetGreeting {
    GetGreeting {
        name: name.to_string(),
    }
}

fn count(log: &Log, entry: &str) -> usize {
    log.lock().iter().filter(|e| *e == entry).count()
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn test_middleware_unwinds_like_an_onion() {
    let log = new_log();
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .middleware(recorder("mw10", &log).with_order(10))
        .middleware(recorder("mw0", &log).with_order(0))
        .build();

    let response = mediator
        .send(greeting("ok"), &CancelSignal::none())
        .await
        .unwrap();

    assert_eq!(response.as_deref(), Some("ok"));
    assert_eq!(
        *log.lock(),
        vec!["mw0-before", "mw10-before", "mw10-after", "mw0-after"]
    );
}

#[tokio::test]
async fn test_equal_order_runs_in_registration_order() {
    let log = new_log();
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .middleware(recorder("first", &log).with_order(5))
        .middleware(recorder("second", &log).with_order(5))
        .build();

    mediator
        .send(greeting("ada"), &CancelSignal::none())
        .await
        .unwrap();

    assert_eq!(
        *log.lock(),
        vec!["first-before", "second-before", "second-after", "first-after"]
    );
}

proptest! {
    #[test]
    fn prop_middleware_order_is_stable(orders in prop::collection::vec(-3i32..3, 1..8)) {
        let log = new_log();
        let mut builder = Mediator::builder().request_handler::<GetGreeting, _>(Greeter);
        for (index, order) in orders.iter().enumerate() {
            builder = builder.middleware(recorder(index.to_string(), &log).with_order(*order));
        }
        let mediator = builder.build();

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let response = runtime
            .block_on(mediator.send(greeting("ada"), &CancelSignal::none()))
            .unwrap();
        prop_assert_eq!(response.as_deref(), Some("hello ada"));

        let mut expected: Vec<usize> = (0..orders.len()).collect();
        expected.sort_by_key(|&index| orders[index]);

        let phase = |suffix: &str| -> Vec<usize> {
            log.lock()
                .iter()
                .filter_map(|entry| entry.strip_suffix(suffix))
                .map(|tag| tag.parse().unwrap())
                .collect()
        };
        let before = phase("-before");
        let mut after = phase("-after");
        after.reverse();

        prop_assert_eq!(&before, &expected);
        prop_assert_eq!(&after, &expected);
    }
}

// =============================================================================
// Applicability
// =============================================================================

#[tokio::test]
async fn test_any_middleware_sees_every_kind() {
    let log = new_log();
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .command_handler::<RenameUser, _>(Renamer)
        .middleware(recorder("all", &log))
        .middleware(recorder("greeting", &log).for_request::<GetGreeting>())
        .build();
    let cancel = CancelSignal::none();

    mediator.send(greeting("ada"), &cancel).await.unwrap();
    mediator.invoke(RenameUser, &cancel).await.unwrap();
    mediator.publish(UserCreated, &cancel).await.unwrap();
    let unmarked = mediator.execute_and_capture::<u64, u64>(7, &cancel).await;

    assert!(unmarked.error().unwrap().is_not_found());
    assert_eq!(count(&log, "all-before"), 4);
    assert_eq!(count(&log, "all-after"), 4);
    assert_eq!(count(&log, "greeting-before"), 1);
}

#[tokio::test]
async fn test_kind_filtered_middleware() {
    let log = new_log();
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .command_handler::<RenameUser, _>(Renamer)
        .event_handler::<UserCreated, _>(Listener::new(1, &log))
        .middleware(recorder("commands", &log).for_commands())
        .middleware(recorder("events", &log).for_events())
        .middleware(recorder("requests", &log).for_requests())
        .build();
    let cancel = CancelSignal::none();

    mediator.invoke(RenameUser, &cancel).await.unwrap();
    assert_eq!(*log.lock(), vec!["commands-before", "commands-after"]);

    log.lock().clear();
    mediator.publish(UserCreated, &cancel).await.unwrap();
    assert_eq!(*log.lock(), vec!["events-before", "listener-1", "events-after"]);

    log.lock().clear();
    mediator.send(greeting("ada"), &cancel).await.unwrap();
    assert_eq!(*log.lock(), vec!["requests-before", "requests-after"]);
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn test_parallel_failure_does_not_stop_siblings() {
    let log = new_log();
    let mediator = Mediator::builder()
        .event_handler::<UserCreated, _>(Listener::new(1, &log))
        .event_handler::<UserCreated, _>(Listener::failing(2, &log))
        .event_handler::<UserCreated, _>(Listener::new(3, &log))
        .build();

    let ctx = mediator
        .publish_and_capture(UserCreated, &CancelSignal::none())
        .await;

    for id in 1..=3 {
        assert_eq!(count(&log, &format!("listener-{id}")), 1);
    }
    let error = ctx.error().unwrap();
    assert!(!error.is_aggregate());
    assert_eq!(error.downcast_ref::<ListenerFailed>().unwrap().0, 2);
}

#[tokio::test]
async fn test_parallel_failures_aggregate_in_registration_order() {
    let log = new_log();
    let mediator = Mediator::builder()
        .event_handler::<UserCreated, _>(Listener::failing(1, &log))
        .event_handler::<UserCreated, _>(Listener::new(2, &log))
        .event_handler::<UserCreated, _>(Listener::failing(3, &log))
        .build();

    let error = mediator
        .publish(UserCreated, &CancelSignal::none())
        .await
        .unwrap_err();

    assert!(error.is_aggregate());
    let failed: Vec<usize> = error
        .errors()
        .iter()
        .map(|e| e.downcast_ref::<ListenerFailed>().unwrap().0)
        .collect();
    assert_eq!(failed, vec![1, 3]);
}

#[tokio::test]
async fn test_sequential_stops_at_first_failure() {
    let log = new_log();
    let mediator = Mediator::builder()
        .fan_out::<UserCreated, EventResponse>(FanOut::Sequential)
        .event_handler::<UserCreated, _>(Listener::failing(1, &log))
        .event_handler::<UserCreated, _>(Listener::new(2, &log))
        .event_handler::<UserCreated, _>(Listener::new(3, &log))
        .build();

    let error = mediator
        .publish(UserCreated, &CancelSignal::none())
        .await
        .unwrap_err();

    assert_eq!(*log.lock(), vec!["listener-1"]);
    assert_eq!(error.to_string(), "listener 1 failed");
}

#[tokio::test]
async fn test_config_selects_event_fan_out() {
    let log = new_log();
    let config = DispatchConfig {
        event_fan_out: FanOut::Sequential,
        ..DispatchConfig::default()
    };
    let mediator = Mediator::builder()
        .with_config(config)
        .event_handler::<UserCreated, _>(Listener::new(1, &log))
        .event_handler::<UserCreated, _>(Listener::failing(2, &log))
        .event_handler::<UserCreated, _>(Listener::new(3, &log))
        .build();

    assert!(mediator.publish(UserCreated, &CancelSignal::none()).await.is_err());
    assert_eq!(*log.lock(), vec!["listener-1", "listener-2"]);
}

// =============================================================================
// Missing routes
// =============================================================================

#[tokio::test]
async fn test_event_without_listeners_succeeds() {
    let mediator = Mediator::builder().build();

    let ctx = mediator
        .publish_and_capture(UserCreated, &CancelSignal::none())
        .await;

    assert!(ctx.is_success());
    assert!(!ctx.has_response());
    assert!(mediator.publish(UserCreated, &CancelSignal::none()).await.is_ok());
}

#[tokio::test]
async fn test_request_without_handler_is_not_found() {
    let mediator = Mediator::builder().build();
    let cancel = CancelSignal::none();

    let ctx = mediator.send_and_capture(greeting("ada"), &cancel).await;
    match ctx.error() {
        Some(DispatchError::NotFound { route }) => {
            assert_eq!(*route, RouteKey::of::<GetGreeting, String>());
        }
        other => panic!("expected not found, got {other:?}"),
    }

    let error = mediator.send(greeting("ada"), &cancel).await.unwrap_err();
    assert!(error.is_not_found());

    let error = mediator.invoke(RenameUser, &cancel).await.unwrap_err();
    assert!(error.is_not_found());
}

#[tokio::test]
async fn test_response_type_is_part_of_the_route() {
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .build();

    let error = mediator
        .execute::<GetGreeting, u32>(greeting("ada"), &CancelSignal::none())
        .await
        .unwrap_err();

    assert!(error.is_not_found());
}

// =============================================================================
// Error capture
// =============================================================================

#[tokio::test]
async fn test_panicking_handler_is_captured_and_middleware_unwinds() {
    let log = new_log();
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Exploding)
        .middleware(recorder("outer", &log))
        .build();

    let error = mediator
        .send(greeting("ada"), &CancelSignal::none())
        .await
        .unwrap_err();

    match error {
        DispatchError::Panicked { message } => assert_eq!(message, "greeter exploded"),
        other => panic!("expected a captured panic, got {other:?}"),
    }
    assert_eq!(*log.lock(), vec!["outer-before", "outer-after"]);
}

#[tokio::test]
async fn test_panic_escapes_when_capture_disabled() {
    let mediator = Mediator::builder()
        .with_config(DispatchConfig {
            capture_panics: false,
            ..DispatchConfig::default()
        })
        .request_handler::<GetGreeting, _>(Exploding)
        .build();

    let cancel = CancelSignal::none();
    let outcome = AssertUnwindSafe(mediator.send(greeting("ada"), &cancel))
        .catch_unwind()
        .await;

    assert!(outcome.is_err());
}

#[tokio::test]
async fn test_cancelled_signal_reaches_handler() {
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Patient)
        .build();
    let cancel = CancelSignal::new();
    cancel.cancel();

    let error = mediator.send(greeting("ada"), &cancel).await.unwrap_err();

    assert!(matches!(error, DispatchError::Cancelled));
}

#[tokio::test]
async fn test_multiple_single_handlers_is_configuration_error() {
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .request_handler::<GetGreeting, _>(Patient)
        .fan_out::<RenameUser, CommandResponse>(FanOut::Single)
        .build();

    let error = mediator.validate().unwrap_err();
    assert_eq!(error.errors().len(), 2);
    assert!(error
        .errors()
        .iter()
        .all(|e| matches!(e, DispatchError::Configuration { .. })));

    let error = mediator
        .send(greeting("ada"), &CancelSignal::none())
        .await
        .unwrap_err();
    match error {
        DispatchError::Configuration { reason, .. } => assert!(reason.contains("2 registered")),
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_middleware_error_is_captured() {
    struct Rejecting;

    impl Middleware for Rejecting {
        fn process<'a>(
            &'a self,
            _ctx: &'a mut InvocationContext,
            _cancel: &'a CancelSignal,
            _next: Next<'a>,
        ) -> BoxFuture<'a, MiddlewareResult> {
            Box::pin(async { Err::<(), _>(DispatchError::handler(anyhow::anyhow!("rejected"))) })
        }
    }

    let log = new_log();
    let mediator = Mediator::builder()
        .event_handler::<UserCreated, _>(Listener::new(1, &log))
        .middleware(MiddlewareItem::singleton(Rejecting))
        .build();

    let ctx = mediator
        .publish_and_capture(UserCreated, &CancelSignal::none())
        .await;

    assert_eq!(ctx.error().unwrap().to_string(), "rejected");
    assert!(log.lock().is_empty());
}

// =============================================================================
// Collaborators
// =============================================================================

struct Journal(Log);

impl DispatchObserver for Journal {
    fn on_dispatch_start(&self, ctx: &InvocationContext) {
        self.0
            .lock()
            .push(format!("start:{}", ctx.request_type().short_name()));
    }

    fn on_dispatch_end(&self, ctx: &InvocationContext) {
        self.0.lock().push(format!("end:{}", ctx.is_success()));
    }
}

#[tokio::test]
async fn test_observer_sees_every_dispatch() {
    let log = new_log();
    let mediator = Mediator::builder()
        .command_handler::<RenameUser, _>(Renamer)
        .observer(Journal(Arc::clone(&log)))
        .build();
    let cancel = CancelSignal::none();

    mediator.invoke(RenameUser, &cancel).await.unwrap();
    let _ = mediator.send_and_capture(greeting("ada"), &cancel).await;

    assert_eq!(
        *log.lock(),
        vec![
            "start:RenameUser",
            "end:true",
            "start:GetGreeting",
            "end:false"
        ]
    );
}

#[tokio::test]
async fn test_routes_listed_in_registration_order() {
    let log = new_log();
    let mediator = Mediator::builder()
        .command_handler::<RenameUser, _>(Renamer)
        .event_handler::<UserCreated, _>(Listener::new(1, &log))
        .request_handler::<GetGreeting, _>(Greeter)
        .build();

    let routes: Vec<RouteKey> = mediator.routes().collect();
    assert_eq!(
        routes,
        vec![
            RouteKey::of::<RenameUser, CommandResponse>(),
            RouteKey::of::<UserCreated, EventResponse>(),
            RouteKey::of::<GetGreeting, String>(),
        ]
    );
    assert!(mediator.validate().is_ok());
}

#[tokio::test]
async fn test_handler_factory_builds_per_dispatch() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let mediator = Mediator::builder()
        .handler_factory::<GetGreeting, String, _, _>(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Greeter)
        })
        .build();
    let cancel = CancelSignal::none();

    mediator.send(greeting("a"), &cancel).await.unwrap();
    mediator.send(greeting("b"), &cancel).await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_middleware_short_circuits_with_cached_response() {
    let log = new_log();
    let cache = hermes_middleware::FnMiddleware::new("cache", |ctx, _cancel, _next| {
        Box::pin(async move {
            ctx.set_response("cached".to_string());
            Ok(())
        })
    });
    let mediator = Mediator::builder()
        .request_handler::<GetGreeting, _>(Greeter)
        .middleware(MiddlewareItem::singleton(cache).with_order(1))
        .middleware(recorder("outer", &log))
        .build();

    let response = mediator
        .send(greeting("ada"), &CancelSignal::none())
        .await
        .unwrap();

    assert_eq!(response.as_deref(), Some("cached"));
    assert_eq!(*log.lock(), vec!["outer-before", "outer-after"]);
}
