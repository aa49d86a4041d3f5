//! Retry logic for outbound unary calls.
//!
//! # State Transitions
//! ```text
//! attempt n completes:
//!     Ok                                → terminal success
//!     Err(code ∈ retryable) and n < N   → wait base × 2^n, attempt n + 1
//!     Err(_)                            → terminal failure (original status)
//! cancellation at any point             → terminal CANCELLED, never retried
//! ```
//!
//! # Design Decisions
//! - Callers are responsible for only wrapping idempotent calls
//! - The last failure is returned verbatim, never wrapped
//! - Backoff suspends only this call's attempt sequence

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::resilience::backoff::{apply_jitter, calculate_backoff};
use crate::status::{Code, Status};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then run the next attempt.
    Retry { delay: Duration },
    /// Stop and surface the failure.
    GiveUp,
}

/// Progress of a single call through the retry state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    last_failure: Option<Code>,
    delay: Option<Duration>,
    terminal: bool,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempt: 0,
            last_failure: None,
            delay: None,
            terminal: false,
        }
    }

    /// Index of the attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_failure(&self) -> Option<Code> {
        self.last_failure
    }

    /// Delay scheduled before the current attempt, if it is a retry.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Record a failed attempt and advance.
    pub fn on_failure(&mut self, code: Code, policy: &RetryPolicy) -> RetryDecision {
        if self.terminal {
            return RetryDecision::GiveUp;
        }
        self.last_failure = Some(code);

        if !policy.is_retryable(code) || self.attempt >= policy.max_retries {
            self.terminal = true;
            return RetryDecision::GiveUp;
        }

        let delay = policy.delay_for(self.attempt);
        self.attempt += 1;
        self.delay = Some(delay);
        RetryDecision::Retry { delay }
    }

    /// Record a successful attempt.
    pub fn on_success(&mut self) {
        self.terminal = true;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded exponential-backoff retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_ratio: f64,
    retryable: Vec<Code>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            jitter_ratio: 0.0,
            retryable: vec![Code::Aborted, Code::Unavailable],
        }
    }
}

impl RetryPolicy {
    /// Build a policy from validated configuration.
    ///
    /// Unknown code names were already rejected by validation and are
    /// skipped here. A disabled config yields a policy that never retries.
    pub fn from_config(config: &RetryConfig) -> Self {
        let retryable = config
            .retryable_codes
            .iter()
            .filter_map(|name| name.parse::<Code>().ok())
            .collect();
        Self {
            max_retries: if config.enabled { config.max_retries } else { 0 },
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_ratio: config.jitter_ratio,
            retryable,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Cancellation is never retryable, whatever the configuration says.
    pub fn is_retryable(&self, code: Code) -> bool {
        code != Code::Cancelled && self.retryable.contains(&code)
    }

    /// Backoff before the retry that follows attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = calculate_backoff(
            attempt,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        );
        apply_jitter(delay, self.jitter_ratio)
    }

    /// Run `op` until it succeeds, fails terminally, or `cancel` fires.
    ///
    /// `op` receives the attempt index.
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, Status>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        let mut state = RetryState::new();
        loop {
            let attempt = state.attempt();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(attempt)),
                outcome = op(attempt) => outcome,
            };

            let status = match outcome {
                Ok(value) => {
                    state.on_success();
                    if attempt > 0 {
                        tracing::info!(attempt, "Call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(status) => status,
            };

            match state.on_failure(status.code(), self) {
                RetryDecision::Retry { delay } => {
                    tracing::info!(
                        attempt,
                        code = %status.code(),
                        delay_ms = delay.as_millis() as u64,
                        "Retrying call"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled(attempt)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryDecision::GiveUp => {
                    if attempt > 0 {
                        tracing::warn!(attempt, code = %status.code(), "Retries exhausted");
                    }
                    return Err(status);
                }
            }
        }
    }
}

fn cancelled(attempt: u32) -> Status {
    tracing::debug!(attempt, "Call cancelled by caller");
    Status::cancelled("call cancelled by caller")
}
