//! Server interceptor chain tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use http::{HeaderMap, HeaderValue};
use tower::{service_fn, ServiceExt};

use rpc_interceptors::interceptor::{LogContext, MethodKind, ServerCall};
use rpc_interceptors::lifecycle::BackgroundTasks;
use rpc_interceptors::metadata::{CallMetadata, CTX_LOG_METADATA_KEY, REQUEST_ID_METADATA_KEY};
use rpc_interceptors::{Code, Status};

mod common;

use common::{HelloRequest, LogCapture, SAY_HELLO};

fn call(message: HelloRequest, inbound: HeaderMap) -> ServerCall<HelloRequest> {
    ServerCall::new(SAY_HELLO, MethodKind::Unary, CallMetadata::new(inbound), message)
        .with_peer("ipv4:10.1.2.3:5555")
}

#[tokio::test]
async fn test_successful_call_emits_one_record() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let factory = common::factory(BackgroundTasks::new());
    let svc = factory.default_server(service_fn(|call: ServerCall<HelloRequest>| async move {
        Ok::<_, Status>(format!("Hello, {}!", call.message.name))
    }));

    let reply = svc.oneshot(call(HelloRequest::new("ada"), HeaderMap::new())).await.unwrap();
    assert_eq!(reply, "Hello, ada!");

    let records = logs.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["message"], "finished call");
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["source"], "ApiRequestLog");
    assert_eq!(record["service"], "Greeter");
    assert_eq!(record["method"], "SayHello");
    assert_eq!(record["method_type"], "unary");
    assert_eq!(record["component"], "server");
    assert_eq!(record["protocol"], "grpc");
    assert_eq!(record["peer_address"], "10.1.2.3:5555");
    assert_eq!(record["code"], "OK");
    assert_eq!(record["request_id"].as_str().unwrap().len(), 8);
    assert!(record["time_ms"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_inbound_request_id_is_kept() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let seen = Arc::new(Mutex::new(None));
    let factory = common::factory(BackgroundTasks::new());
    let svc = factory.default_server(service_fn({
        let seen = seen.clone();
        move |call: ServerCall<HelloRequest>| {
            let seen = seen.clone();
            async move {
                *seen.lock().unwrap() = Some(call.context.correlation_id.clone());
                Ok::<_, Status>(())
            }
        }
    }));

    let mut inbound = HeaderMap::new();
    inbound.insert(REQUEST_ID_METADATA_KEY, HeaderValue::from_static("caller-1"));
    svc.oneshot(call(HelloRequest::new("ada"), inbound)).await.unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("caller-1"));
    assert_eq!(logs.records()[0]["request_id"], "caller-1");
}

#[tokio::test]
async fn test_handler_sees_redacted_context() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let seen: Arc<Mutex<Option<(LogContext, Option<LogContext>)>>> = Arc::new(Mutex::new(None));
    let factory = common::factory(BackgroundTasks::new());
    let svc = factory.default_server(service_fn({
        let seen = seen.clone();
        move |call: ServerCall<HelloRequest>| {
            let seen = seen.clone();
            async move {
                tracing::info!("inside handler");
                let threaded = call.context.log_context.clone().unwrap();
                let side_channel = LogContext::from_metadata(&call.metadata);
                *seen.lock().unwrap() = Some((threaded, side_channel));
                Ok::<_, Status>(())
            }
        }
    }));

    svc.oneshot(call(HelloRequest::new("ada"), HeaderMap::new())).await.unwrap();

    let (threaded, side_channel) = seen.lock().unwrap().take().unwrap();
    assert_eq!(side_channel.as_ref(), Some(&threaded));
    assert_eq!(threaded.method, SAY_HELLO);
    assert_eq!(threaded.source, "CtxLog");
    assert_eq!(threaded.request["name"], "ada");
    assert!(!threaded.request.contains_key("email"));
    assert_eq!(threaded.request["address"]["city"], "Springfield");
    assert!(threaded.request["address"].get("street").is_none());

    let inside = logs.messages_containing("inside handler");
    assert_eq!(inside.len(), 1);
    assert_eq!(inside[0]["span"]["name"], "ctx_log");
    assert_eq!(inside[0]["span"]["source"], "CtxLog");
    assert_eq!(inside[0]["span"]["request_id"], threaded.request_id.as_str());

    let all = logs.lines().iter().map(|l| l.to_string()).collect::<Vec<_>>().join("\n");
    assert!(!all.contains("ada@example.com"));
    assert!(!all.contains("1 Main St"));
}

#[tokio::test]
async fn test_validation_failure_is_logged_once() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let invoked = Arc::new(AtomicU32::new(0));
    let factory = common::factory(BackgroundTasks::new());
    let svc = factory.default_server(service_fn({
        let invoked = invoked.clone();
        move |_call: ServerCall<HelloRequest>| {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Status>(()) }
        }
    }));

    let status = svc
        .oneshot(call(HelloRequest::new(""), HeaderMap::new()))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.message(), "name: value is required");
    assert_eq!(invoked.load(Ordering::SeqCst), 0);

    let records = logs.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "ERROR");
    assert_eq!(records[0]["code"], "INVALID_ARGUMENT");
    assert_eq!(records[0]["error"], "name: value is required");
}

#[tokio::test]
async fn test_handler_error_returned_unchanged() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let factory = common::factory(BackgroundTasks::new());
    let svc = factory.default_server(service_fn(|_call: ServerCall<HelloRequest>| async {
        Err::<(), _>(Status::new(Code::NotFound, "no such greeter"))
    }));

    let status = svc
        .oneshot(call(HelloRequest::new("ada"), HeaderMap::new()))
        .await
        .unwrap_err();
    assert_eq!(status, Status::new(Code::NotFound, "no such greeter"));

    let thrown = logs.messages_containing("Error thrown by /greeter.v1.Greeter/SayHello");
    assert_eq!(thrown.len(), 1);
    assert_eq!(thrown[0]["level"], "ERROR");

    let records = logs.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_side_channel_does_not_fail_call() {
    let logs = LogCapture::new();
    let _guard = logs.install();

    let mut metadata = CallMetadata::default();
    metadata
        .inbound
        .insert(CTX_LOG_METADATA_KEY, HeaderValue::from_static("{broken"));
    assert!(LogContext::from_metadata(&metadata).is_none());
    assert_eq!(logs.messages_containing("Ignoring malformed log context").len(), 1);

    // The chain overwrites the stale value with a fresh context.
    let factory = common::factory(BackgroundTasks::new());
    let svc = factory.default_server(service_fn(|call: ServerCall<HelloRequest>| async move {
        Ok::<_, Status>(LogContext::from_metadata(&call.metadata).is_some())
    }));
    let parsed = svc
        .oneshot(call(HelloRequest::new("ada"), metadata.inbound))
        .await
        .unwrap();
    assert!(parsed);
}
