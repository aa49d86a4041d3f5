//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound unary call:
//!     → retries.rs (classify failure, decide retry or give up)
//!     → backoff.rs (delay = base × 2^attempt, optional jitter)
//!     → next attempt, or the original failure returned unchanged
//! ```
//!
//! # Design Decisions
//! - Retries only for unary calls; streaming calls pass through
//! - Only ABORTED and UNAVAILABLE are retried by default
//! - Cancellation wins over both the attempt and the backoff wait

pub mod backoff;
pub mod retries;

pub use retries::{RetryDecision, RetryPolicy, RetryState};
