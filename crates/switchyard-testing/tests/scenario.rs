//! End-to-end dispatch through a wired bus.

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use switchyard_core::{
    async_trait, message, AllowAll, BusBuilder, BusConfig, DenyAll, DispatchError, Envelope,
    ErrorKind, FnPolicy, Handler, MessageContext, MessageKind, PolicyDenied, PolicyMiddleware,
    PolicyResult, RequireCaller, Response, TracingMiddleware,
};
use switchyard_testing::{
    assert_error_kind, assert_success, CallLog, CountingHandler, FailingHandler,
    RecordingHandler, RecordingMiddleware, ShortCircuitMiddleware,
};

#[derive(Debug, Clone, Serialize)]
struct Ping {
    value: String,
}

message!(Ping: Query, serializable);

#[derive(Debug, Clone)]
struct RenameUser {
    id: u32,
    name: String,
}

message!(RenameUser: Command);

#[derive(Debug, Clone)]
struct UserRenamed {
    id: u32,
}

message!(UserRenamed: Event);

struct EchoHandler;

#[async_trait]
impl Handler<Ping> for EchoHandler {
    async fn handle(&self, message: Ping, _ctx: &MessageContext) -> Result<Response> {
        Ok(Response::success(message.value))
    }
}

fn ping(value: &str) -> Ping {
    Ping {
        value: value.to_string(),
    }
}

#[tokio::test]
async fn ping_passes_tracing_and_allow_all() {
    let bus = BusBuilder::new()
        .with_middleware(MessageKind::Query, TracingMiddleware::default())
        .with_middleware(MessageKind::Query, PolicyMiddleware::new(AllowAll))
        .with_handler::<Ping, _>(EchoHandler)
        .build()
        .unwrap();

    let response = bus.dispatch(ping("hi")).await.unwrap();

    assert_eq!(response, Response::success("hi"));
}

#[tokio::test]
async fn deny_all_stops_ping_before_the_handler() {
    let handler = CountingHandler::<Ping>::new(Response::success("unreachable"));
    let calls = handler.counter();
    let bus = BusBuilder::new()
        .with_middleware(MessageKind::Query, TracingMiddleware::default())
        .with_middleware(
            MessageKind::Query,
            PolicyMiddleware::new(DenyAll::new("queries are closed")),
        )
        .with_handler::<Ping, _>(handler)
        .build()
        .unwrap();

    let response = bus.dispatch(ping("hi")).await.unwrap();

    assert_error_kind(&response, ErrorKind::PolicyDenied);
    assert_eq!(response.as_error().unwrap().message(), "queries are closed");
    assert_eq!(calls.get(), 0);
}

#[tokio::test]
async fn middlewares_nest_in_registration_order() {
    let log = CallLog::new();
    let bus = BusBuilder::new()
        .with_middleware(MessageKind::Query, RecordingMiddleware::new("A", log.clone()))
        .with_middleware(MessageKind::Query, RecordingMiddleware::new("B", log.clone()))
        .with_middleware(MessageKind::Query, RecordingMiddleware::new("C", log.clone()))
        .with_handler::<Ping, _>(
            CountingHandler::<Ping>::new(Response::empty()).with_log(log.clone()),
        )
        .build()
        .unwrap();

    bus.dispatch(ping("hi")).await.unwrap();

    assert_eq!(
        log.entries(),
        [
            "A-before", "B-before", "C-before", "handler", "C-after", "B-after", "A-after"
        ]
    );
}

#[tokio::test]
async fn chains_are_selected_by_kind() {
    let log = CallLog::new();
    let renames = RecordingHandler::<RenameUser>::new(Response::empty());
    let received = renames.received();
    let bus = BusBuilder::new()
        .with_middleware(MessageKind::Command, RecordingMiddleware::new("audit", log.clone()))
        .with_middleware(MessageKind::Query, RecordingMiddleware::new("cache", log.clone()))
        .with_handler::<Ping, _>(EchoHandler)
        .with_handler::<RenameUser, _>(renames)
        .with_handler::<UserRenamed, _>(CountingHandler::<UserRenamed>::new(Response::empty()))
        .build()
        .unwrap();

    bus.dispatch(RenameUser {
        id: 7,
        name: "ada".into(),
    })
    .await
    .unwrap();
    assert_eq!(log.entries(), ["audit-before", "audit-after"]);

    log.clear();
    bus.dispatch(UserRenamed { id: 7 }).await.unwrap();
    assert!(log.is_empty());

    let renamed = received.messages();
    assert_eq!(renamed.len(), 1);
    assert_eq!((renamed[0].id, renamed[0].name.as_str()), (7, "ada"));
}

#[tokio::test]
async fn short_circuit_skips_inner_middlewares_and_handler() {
    let log = CallLog::new();
    let gate = ShortCircuitMiddleware::deny("maintenance");
    let hits = gate.counter();
    let handler = CountingHandler::<Ping>::new(Response::empty()).with_log(log.clone());
    let calls = handler.counter();
    let bus = BusBuilder::new()
        .with_middleware(MessageKind::Query, RecordingMiddleware::new("outer", log.clone()))
        .with_middleware(MessageKind::Query, gate)
        .with_middleware(MessageKind::Query, RecordingMiddleware::new("inner", log.clone()))
        .with_handler::<Ping, _>(handler)
        .build()
        .unwrap();

    let response = bus.dispatch(ping("hi")).await.unwrap();

    assert_error_kind(&response, ErrorKind::PolicyDenied);
    assert_eq!(log.entries(), ["outer-before", "outer-after"]);
    assert_eq!((hits.get(), calls.get()), (1, 0));
}

#[tokio::test]
async fn handler_failure_is_a_fault_not_a_response() {
    let bus = BusBuilder::new()
        .with_handler::<Ping, _>(FailingHandler::<Ping>::new("storage offline"))
        .build()
        .unwrap();

    let err = bus.dispatch(ping("hi")).await.unwrap_err();

    assert!(matches!(err, DispatchError::MiddlewareFault { .. }));
    assert_eq!(err.fault().unwrap().to_string(), "storage offline");
}

#[tokio::test]
async fn unknown_message_type_is_handler_not_found() {
    let bus = BusBuilder::new()
        .with_handler::<Ping, _>(EchoHandler)
        .build()
        .unwrap();

    let err = bus.dispatch(UserRenamed { id: 1 }).await.unwrap_err();

    assert!(err.is_handler_not_found());
}

#[tokio::test]
async fn caller_policy_and_context_reach_the_handler() {
    let renames = RecordingHandler::<RenameUser>::new(Response::success(json!({ "ok": true })));
    let received = renames.received();
    let bus = BusBuilder::new()
        .with_middleware(MessageKind::Command, PolicyMiddleware::new(RequireCaller))
        .with_handler::<RenameUser, _>(renames)
        .build()
        .unwrap();
    let rename = RenameUser {
        id: 3,
        name: "grace".into(),
    };

    let anonymous = bus.dispatch(rename.clone()).await.unwrap();
    assert_error_kind(&anonymous, ErrorKind::PolicyDenied);
    assert!(received.is_empty());

    let ctx = MessageContext::new().with_caller("admin");
    let correlation = ctx.correlation_id();
    let response = bus.dispatch_with_context(rename, ctx).await.unwrap();
    assert_eq!(assert_success(&response), &json!({ "ok": true }));

    let contexts = received.contexts();
    assert_eq!(contexts[0].caller(), Some("admin"));
    assert_eq!(contexts[0].correlation_id(), correlation);
}

fn cached_config() -> BusConfig {
    let mut config = BusConfig::default();
    config.cache.enabled = true;
    config
}

#[tokio::test]
async fn standard_middlewares_serve_repeated_queries_from_cache() {
    let handler = CountingHandler::<Ping>::new(Response::success("pong"));
    let calls = handler.counter();
    let bus = BusBuilder::new()
        .with_standard_middlewares(&cached_config())
        .with_handler::<Ping, _>(handler)
        .build()
        .unwrap();

    for _ in 0..3 {
        let response = bus.dispatch(ping("same")).await.unwrap();
        assert_eq!(assert_success(&response), &json!("pong"));
    }
    bus.dispatch(ping("other")).await.unwrap();

    assert_eq!(calls.get(), 2);
}

#[tokio::test]
async fn closing_the_gate_denies_a_query_that_was_cached() {
    let open = Arc::new(AtomicBool::new(true));
    let gate = open.clone();
    let handler = CountingHandler::<Ping>::new(Response::success("hi"));
    let calls = handler.counter();
    let bus = BusBuilder::new()
        .with_standard_middlewares(&cached_config())
        .with_middleware(
            MessageKind::Query,
            PolicyMiddleware::new(FnPolicy::new(move |_: &Envelope| -> PolicyResult<()> {
                if gate.load(Ordering::SeqCst) {
                    Ok(())
                } else {
                    Err(PolicyDenied::new("queries are closed"))
                }
            })),
        )
        .with_handler::<Ping, _>(handler)
        .build()
        .unwrap();

    let response = bus.dispatch(ping("hi")).await.unwrap();
    assert_eq!(response, Response::success("hi"));
    assert_eq!(calls.get(), 1);

    open.store(false, Ordering::SeqCst);
    let response = bus.dispatch(ping("hi")).await.unwrap();

    assert_error_kind(&response, ErrorKind::PolicyDenied);
    assert_eq!(calls.get(), 1);
}

#[tokio::test]
async fn default_config_dispatches_every_query() {
    let handler = CountingHandler::<Ping>::new(Response::success("pong"));
    let calls = handler.counter();
    let bus = BusBuilder::new()
        .with_standard_middlewares(&BusConfig::default())
        .with_handler::<Ping, _>(handler)
        .build()
        .unwrap();

    bus.dispatch(ping("same")).await.unwrap();
    bus.dispatch(ping("same")).await.unwrap();

    assert_eq!(calls.get(), 2);
}
