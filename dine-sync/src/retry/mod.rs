//! Retry executor with classified exponential backoff
//!
//! - [`RetryConfig`] - attempt budget, backoff curve, observability hooks
//! - [`with_retry`] - structured outcome, never errors
//! - [`with_retry_or_throw`] - `Result` variant
//! - [`with_retry_batch`] - per-item isolation, partial success

mod config;
mod executor;

pub use config::{FailureHook, JITTER_RATIO, RetryConfig, RetryHook, RetryPredicate};
pub use executor::{
    BatchOutcome, RetryOutcome, with_retry, with_retry_batch, with_retry_or_throw,
};
