//! Tests for the facade: configuration flowing into a working mediator.

use hermes::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

struct GetGreeting {
    name: String,
}

impl Request for GetGreeting {
    type Response = String;
}

struct OrderPlaced;

fn counting_listener(
    calls: &Arc<AtomicUsize>,
    fail: bool,
) -> impl Fn(Arc<OrderPlaced>, CancelSignal) -> BoxFuture<'static, Result<EventResponse, DispatchError>>
       + Send
       + Sync
       + 'static {
    let calls = Arc::clone(calls);
    move |_event, _cancel| {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                Err(DispatchError::handler(anyhow::anyhow!("listener failed")))
            } else {
                Ok(EventResponse)
            }
        })
    }
}

#[tokio::test]
async fn test_builder_from_default_config_sends_requests() {
    let config = ConfigLoader::new().load().unwrap();

    let mediator = hermes::builder(&config)
        .handler_fn(|req: Arc<GetGreeting>, _cancel| async move {
            Ok::<_, DispatchError>(format!("hello, {}", req.name))
        })
        .build();

    mediator.validate().unwrap();

    let reply = mediator
        .send(
            GetGreeting {
                name: "ada".to_string(),
            },
            &CancelSignal::none(),
        )
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("hello, ada"));
}

#[tokio::test]
async fn test_sequential_fan_out_from_config_stops_at_first_failure() {
    let toml = r#"
        [dispatch]
        event_fan_out = "sequential"
        log_dispatches = false

        [telemetry.metrics]
        enabled = true
    "#;
    let config = ConfigLoader::new()
        .with_string(toml, "toml")
        .unwrap()
        .load()
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let mediator = hermes::builder(&config)
        .handler_fn(counting_listener(&calls, true))
        .handler_fn(counting_listener(&calls, false))
        .build();

    let result = mediator.publish(OrderPlaced, &CancelSignal::none()).await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parallel_fan_out_by_default_runs_every_listener() {
    let config = HermesConfig::default();

    let calls = Arc::new(AtomicUsize::new(0));
    let mediator = hermes::builder(&config)
        .handler_fn(counting_listener(&calls, true))
        .handler_fn(counting_listener(&calls, false))
        .build();

    let result = mediator.publish(OrderPlaced, &CancelSignal::none()).await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unhandled_command_is_not_found() {
    struct ShipOrder;

    let mediator = hermes::builder(&HermesConfig::production()).build();
    let err = mediator
        .invoke(ShipOrder, &CancelSignal::none())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}
