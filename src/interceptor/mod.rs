//! Interceptor chains for RPC calls.
//!
//! # Data Flow
//! ```text
//! Server call:
//!     → request_id.rs (resolve correlation id)
//!     → api_log.rs (one `finished call` record when the call settles)
//!     → ctx_log.rs (redacted request → LogContext, `ctx_log` span)
//!     → validation.rs (INVALID_ARGUMENT before the handler)
//!     → handler
//!
//! Client call:
//!     → retry.rs (bounded backoff, unary only)
//!     → md_forward.rs (inherit serving call's metadata)
//!     → client_log.rs (record per attempt on a background task)
//!     → transport
//! ```
//!
//! # Design Decisions
//! - Every stage is a `tower::Layer`, so any transport driving a `Service`
//!   can host the chains
//! - Validation sits inside the record stage so rejected calls are logged
//! - Client logging sits inside retry so every attempt is logged

pub mod api_log;
pub mod call;
pub mod client_log;
pub mod ctx_log;
pub mod md_forward;
pub mod request_id;
pub mod retry;
pub mod validation;

use std::sync::Arc;

use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;

pub use api_log::{ApiRequestLogLayer, ApiRequestLogService};
pub use call::{CallContext, ClientCall, MethodKind, ServerCall};
pub use client_log::{ClientLogLayer, ClientLogService};
pub use ctx_log::{CtxLogLayer, CtxLogService, LogContext};
pub use md_forward::{MdForwardLayer, MdForwardService};
pub use request_id::{CorrelationLayer, CorrelationService};
pub use retry::{RetryLayer, RetryService};
pub use validation::{Validate, ValidationLayer, ValidationService};

use crate::config::InterceptorConfig;
use crate::lifecycle::BackgroundTasks;
use crate::redact::{RedactionEngine, SchemaError, SchemaRegistry};
use crate::resilience::RetryPolicy;

/// Layers of the default server chain.
pub type ServerStack =
    Stack<ValidationLayer, Stack<CtxLogLayer, Stack<ApiRequestLogLayer, Stack<CorrelationLayer, Identity>>>>;

/// Layers of the default client chain.
pub type ClientStack = Stack<ClientLogLayer, Stack<MdForwardLayer, Stack<RetryLayer, Identity>>>;

/// A handler wrapped in the default server chain.
pub type ServerService<S> = CorrelationService<ApiRequestLogService<CtxLogService<ValidationService<S>>>>;

/// A transport wrapped in the default client chain.
pub type ClientService<S> = RetryService<MdForwardService<ClientLogService<S>>>;

/// Builds the default interceptor chains from shared configuration.
#[derive(Debug, Clone)]
pub struct InterceptorFactory {
    engine: RedactionEngine,
    policy: RetryPolicy,
    tasks: BackgroundTasks,
    fail_fast: bool,
}

impl InterceptorFactory {
    pub fn new(engine: RedactionEngine, policy: RetryPolicy, tasks: BackgroundTasks) -> Self {
        Self {
            engine,
            policy,
            tasks,
            fail_fast: false,
        }
    }

    /// Factory with the schemas and retry settings of `config`.
    pub fn from_config(config: &InterceptorConfig, tasks: BackgroundTasks) -> Result<Self, SchemaError> {
        let registry = SchemaRegistry::from_schemas(config.schemas.iter().cloned())?;
        Ok(Self::new(
            RedactionEngine::new(Arc::new(registry)),
            RetryPolicy::from_config(&config.retry),
            tasks,
        ))
    }

    /// Report only the first validation violation.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Correlation → record → context → validation.
    pub fn server_layers(&self) -> ServiceBuilder<ServerStack> {
        ServiceBuilder::new()
            .layer(CorrelationLayer::new())
            .layer(ApiRequestLogLayer::new())
            .layer(CtxLogLayer::new(self.engine.clone()))
            .layer(ValidationLayer::new().fail_fast(self.fail_fast))
    }

    /// Retry → metadata forwarding → logging.
    pub fn client_layers(&self) -> ServiceBuilder<ClientStack> {
        ServiceBuilder::new()
            .layer(RetryLayer::new(self.policy.clone()))
            .layer(MdForwardLayer::new())
            .layer(ClientLogLayer::new(self.tasks.clone()))
    }

    pub fn default_server<S>(&self, handler: S) -> ServerService<S> {
        self.server_layers().service(handler)
    }

    pub fn default_client<S>(&self, transport: S) -> ClientService<S> {
        self.client_layers().service(transport)
    }
}
