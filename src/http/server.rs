//! Demo HTTP server hosting an instrumented greeter.
//!
//! # Responsibilities
//! - Serve `POST /greeter.v1.Greeter/SayHello` through the server chain
//! - Record each greeting through the client chain on a downstream audit service
//! - Echo any other request with its classified operation
//! - Wrap everything in the HTTP server logging layer
//!
//! # Design Decisions
//! - Chains are built per request from a shared `InterceptorFactory`; the
//!   stages are cheap to construct and hold only `Arc`/clonable state
//! - Statuses map back to HTTP codes, with the status as a JSON body

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{Extensions, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::{service_fn, ServiceExt};

use crate::http::classify::RequestClassifier;
use crate::http::logging::HttpLogLayer;
use crate::interceptor::{ClientCall, InterceptorFactory, MethodKind, ServerCall, Validate};
use crate::lifecycle::Shutdown;
use crate::metadata::CallMetadata;
use crate::redact::Message;
use crate::status::{Code, Status};

/// Full method name of the greeting call.
pub const SAY_HELLO: &str = "/greeter.v1.Greeter/SayHello";

/// Full method name of the downstream audit call.
pub const RECORD_GREETING: &str = "/audit.v1.Audit/RecordGreeting";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

impl Message for HelloRequest {
    const TYPE_NAME: &'static str = "greeter.v1.HelloRequest";
}

impl Validate for HelloRequest {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.name.trim().is_empty() {
            return Err(vec!["name: value is required".to_string()]);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloReply {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
struct GreetingRecorded {
    name: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    code: Code,
    message: String,
}

#[derive(Debug, Serialize)]
struct EchoBody {
    method: String,
    path: String,
    operation: String,
}

/// Shared state of the demo application.
#[derive(Clone)]
pub struct AppState {
    factory: Arc<InterceptorFactory>,
    classifier: Arc<RequestClassifier>,
}

impl AppState {
    pub fn new(factory: InterceptorFactory, classifier: Arc<RequestClassifier>) -> Self {
        Self {
            factory: Arc::new(factory),
            classifier,
        }
    }
}

/// Demo server wiring the interceptor chains into axum.
pub struct DemoServer {
    router: Router,
}

impl DemoServer {
    pub fn new(factory: InterceptorFactory, classifier: Arc<RequestClassifier>) -> Self {
        let state = AppState::new(factory, classifier.clone());
        Self {
            router: build_router(state, classifier),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the router with the HTTP logging layer applied.
pub fn build_router(state: AppState, classifier: Arc<RequestClassifier>) -> Router {
    Router::new()
        .route(SAY_HELLO, post(say_hello))
        .route("/", any(echo))
        .route("/{*path}", any(echo))
        .with_state(state)
        .layer(HttpLogLayer::server(classifier))
}

async fn say_hello(
    State(state): State<AppState>,
    extensions: Extensions,
    headers: HeaderMap,
    Json(request): Json<HelloRequest>,
) -> Response {
    let mut call = ServerCall::new(SAY_HELLO, MethodKind::Unary, CallMetadata::new(headers), request);
    if let Some(ConnectInfo(peer)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        call = call.with_peer(&peer.to_string());
    }

    let factory = state.factory.clone();
    let handler = service_fn(move |call: ServerCall<HelloRequest>| greet(factory.clone(), call));

    match state.factory.default_server(handler).oneshot(call).await {
        Ok(reply) => Json(reply).into_response(),
        Err(status) => status_response(&status),
    }
}

async fn greet(factory: Arc<InterceptorFactory>, call: ServerCall<HelloRequest>) -> Result<HelloReply, Status> {
    if let Some(context) = call.log_context() {
        tracing::debug!(request_id = %context.request_id, "Greeting");
    }

    let audit = service_fn(|call: ClientCall<GreetingRecorded>| async move {
        tracing::debug!(name = %call.message.name, "Greeting recorded");
        Ok::<_, Status>(())
    });
    let recorded = GreetingRecorded {
        name: call.message.name.clone(),
    };
    let event = ClientCall::unary(RECORD_GREETING, recorded).with_forwarded(call.forwardable());
    factory.default_client(audit).oneshot(event).await?;

    Ok(HelloReply {
        message: format!("Hello, {}!", call.message.name),
    })
}

async fn echo(State(state): State<AppState>, method: Method, uri: Uri) -> Json<EchoBody> {
    let operation = state.classifier.classify(method.as_str(), &uri.to_string());
    Json(EchoBody {
        method: method.to_string(),
        path: uri.path().to_string(),
        operation: operation.to_string(),
    })
}

fn status_response(status: &Status) -> Response {
    let http_status =
        StatusCode::from_u16(status.code().to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = StatusBody {
        code: status.code(),
        message: status.message().to_string(),
    };
    (http_status, Json(body)).into_response()
}
