//! Retry configuration and backoff computation

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::backend::BackendError;

/// Jitter applied to every computed delay (±25%)
pub const JITTER_RATIO: f64 = 0.25;

/// Custom retryability predicate, overrides the built-in classification
pub type RetryPredicate = Arc<dyn Fn(&BackendError) -> bool + Send + Sync>;
/// Called before sleeping: `(attempt, error, delay)`
pub type RetryHook = Arc<dyn Fn(u32, &BackendError, Duration) + Send + Sync>;
/// Called once on final failure: `(error, attempts)`
pub type FailureHook = Arc<dyn Fn(&BackendError, u32) + Send + Sync>;

/// Retry policy for one operation
///
/// Hooks are for observability only; they cannot influence the decision.
#[derive(Clone)]
pub struct RetryConfig {
    /// Total invocations allowed, first attempt included
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub is_retryable: Option<RetryPredicate>,
    pub on_retry: Option<RetryHook>,
    pub on_failure: Option<FailureHook>,
}

impl RetryConfig {
    /// Reads: fail fast, short first delay
    pub fn read() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 300,
            max_delay_ms: 3_000,
            ..Self::default()
        }
    }

    /// Writes: a few more attempts
    pub fn write() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            ..Self::default()
        }
    }

    /// Guest order placement: must survive short outages
    pub fn critical() -> Self {
        Self {
            max_attempts: 7,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_initial_delay_ms(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_retryable(
        mut self,
        predicate: impl Fn(&BackendError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    pub fn on_retry(
        mut self,
        hook: impl Fn(u32, &BackendError, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    pub fn on_failure(mut self, hook: impl Fn(&BackendError, u32) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(hook));
        self
    }

    /// Whether `err` should be retried under this policy
    pub fn should_retry(&self, err: &BackendError) -> bool {
        match &self.is_retryable {
            Some(predicate) => predicate(err),
            None => err.is_retryable(),
        }
    }

    /// `min(initial × multiplier^attempt, max)` before jitter
    ///
    /// `attempt` is zero-based: 0 is the delay before the first retry.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let ms = (self.initial_delay_ms as f64 * exp).min(self.max_delay_ms as f64);
        Duration::from_millis(ms.round() as u64)
    }

    /// Base delay jittered uniformly within ±25%, never above `max_delay_ms`
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let factor = 1.0 + rand::thread_rng().gen_range(-JITTER_RATIO..=JITTER_RATIO);
        let ms = (base * factor).min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(ms.round() as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            is_retryable: None,
            on_retry: None,
            on_failure: None,
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay_ms", &self.initial_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("custom_predicate", &self.is_retryable.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendErrorKind;

    #[test]
    fn test_base_delay_is_capped_exponential() {
        let config = RetryConfig::default()
            .with_initial_delay_ms(100)
            .with_max_delay_ms(1_000);
        assert_eq!(config.base_delay(0), Duration::from_millis(100));
        assert_eq!(config.base_delay(1), Duration::from_millis(200));
        assert_eq!(config.base_delay(3), Duration::from_millis(800));
        assert_eq!(config.base_delay(4), Duration::from_millis(1_000));
        assert_eq!(config.base_delay(30), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let config = RetryConfig::default()
            .with_initial_delay_ms(1_000)
            .with_max_delay_ms(5_000);
        for attempt in 0..6 {
            let base = config.base_delay(attempt).as_millis() as f64;
            for _ in 0..200 {
                let d = config.jittered_delay(attempt).as_millis() as f64;
                assert!(d >= (base * 0.75).floor(), "{d} < {base}*0.75");
                assert!(d <= (base * 1.25).ceil(), "{d} > {base}*1.25");
                assert!(d <= 5_000.0);
            }
        }
    }

    #[test]
    fn test_custom_predicate_overrides_classification() {
        let err = BackendError::new(BackendErrorKind::Unclassified, "boom");
        assert!(!RetryConfig::default().should_retry(&err));
        let config = RetryConfig::default().with_retryable(|_| true);
        assert!(config.should_retry(&err));
    }

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::read().max_attempts, 3);
        assert!(RetryConfig::read().initial_delay_ms < RetryConfig::default().initial_delay_ms);
        assert_eq!(RetryConfig::write().max_attempts, 5);
        assert_eq!(RetryConfig::critical().max_delay_ms, 30_000);
    }
}
