//! Instrumentation and resilience interceptors for RPC and HTTP calls

pub mod config;
pub mod correlation;
pub mod http;
pub mod interceptor;
pub mod lifecycle;
pub mod metadata;
pub mod observability;
pub mod redact;
pub mod resilience;
pub mod status;

pub use config::schema::InterceptorConfig;
pub use http::{HttpLogLayer, RequestClassifier};
pub use interceptor::{ClientCall, InterceptorFactory, ServerCall};
pub use lifecycle::{BackgroundTasks, Shutdown};
pub use status::{Code, Status};
