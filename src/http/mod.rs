//! HTTP call instrumentation subsystem.
//!
//! # Data Flow
//! ```text
//! Request (inbound to axum, or outbound through a client service)
//!     → logging.rs (HttpLogLayer: correlation id, timing)
//!     → classify.rs (verb + URL → operation label)
//!     → trim.rs (URL reduced to scheme/host/path + api-version)
//!     → inner service
//!     → one ApiRequestRecord per completed request
//! ```

pub mod classify;
pub mod logging;
pub mod server;
pub mod trim;

pub use classify::{ClassifiedOperation, OperationKind, RequestClassifier};
pub use logging::{HttpLogLayer, HttpLogService};
pub use server::DemoServer;
pub use trim::trim_url;
