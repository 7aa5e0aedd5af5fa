//! Retry of node requests failing with transient errors.
//!
//! Only errors the node client classifies as transient (connection failures,
//! timeouts, 5xx and 429 responses) are retried. Everything else is returned
//! on the first attempt.

use crate::NodeError;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use vesting_config::DeliveryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
	backoff: ExponentialBackoff,
	max_retries: u32,
}

impl RetryPolicy {
	pub fn new(max_retries: u32, initial_interval: Duration, max_interval: Duration) -> Self {
		let backoff = ExponentialBackoffBuilder::new()
			.with_initial_interval(initial_interval)
			.with_max_interval(max_interval)
			.with_max_elapsed_time(None)
			.build();

		Self {
			backoff,
			max_retries,
		}
	}

	/// Fails on the first error.
	pub fn none() -> Self {
		Self::new(0, Duration::ZERO, Duration::ZERO)
	}

	pub fn from_config(config: &DeliveryConfig) -> Self {
		Self::new(
			config.max_retries,
			Duration::from_millis(config.initial_backoff_ms),
			Duration::from_millis(config.max_backoff_ms),
		)
	}

	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}

	/// Runs `op` until it succeeds, fails permanently or retries run out.
	pub async fn run<T, F, Fut>(&self, name: &str, mut op: F) -> Result<T, NodeError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, NodeError>>,
	{
		let mut backoff = self.backoff.clone();
		backoff.reset();
		let mut attempts = 0;

		loop {
			match op().await {
				Ok(result) => return Ok(result),
				Err(e) if !e.is_transient() => return Err(e),
				Err(e) => {
					attempts += 1;

					if attempts > self.max_retries {
						if self.max_retries > 0 {
							warn!(
								"{} failed after {} retries, giving up: {}",
								name, self.max_retries, e
							);
						}
						return Err(e);
					}

					let delay = backoff
						.next_backoff()
						.unwrap_or_else(|| backoff.max_interval);
					warn!(
						"{} failed, attempt {}/{}, retrying in {:?}: {}",
						name, attempts, self.max_retries, delay, e
					);
					tokio::time::sleep(delay).await;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[tokio::test(start_paused = true)]
	async fn test_transient_errors_are_retried() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1));

		let result = policy
			.run("latest_height", || async {
				if calls.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(NodeError::Transient("connection reset".to_string()))
				} else {
					Ok(42u64)
				}
			})
			.await;

		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_retries_are_bounded() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(1));

		let result: Result<(), _> = policy
			.run("latest_height", || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(NodeError::Transient("timeout".to_string()))
			})
			.await;

		assert!(matches!(result, Err(NodeError::Transient(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn test_permanent_errors_fail_immediately() {
		let calls = AtomicU32::new(0);
		let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(1));

		let result: Result<(), _> = policy
			.run("account", || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(NodeError::Status {
					status: 400,
					body: "bad request".to_string(),
				})
			})
			.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
