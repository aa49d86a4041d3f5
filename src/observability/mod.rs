//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every completed call produces one ApiRequestRecord:
//!     → logging.rs (structured `finished call` event)
//!     → metrics.rs (counter + latency histogram)
//!
//! Consumers:
//!     → Log aggregation (stdout JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Correlation id is a field on every record
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

pub use logging::{format_start_time, init_logging, ApiRequestRecord, Component};
