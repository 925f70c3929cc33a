//! Budget for consecutive "no session" failures across refreshes.

// crates.io
use tokio::time::Instant;
// self
use crate::_prelude::*;

/// Counts consecutive no-session failures inside a sliding start window.
///
/// The window opens at the first failure; a failure after the window elapsed starts a new one.
#[derive(Debug)]
pub struct RetryBudget {
	limit: u32,
	window: StdDuration,
	failures: u32,
	window_start: Option<Instant>,
}
impl RetryBudget {
	/// Creates a budget allowing `limit - 1` failures per `window`.
	pub fn new(limit: u32, window: StdDuration) -> Self {
		Self { limit: limit.max(1), window, failures: 0, window_start: None }
	}

	/// Failures counted in the current window.
	pub fn failures(&self) -> u32 {
		self.failures
	}

	/// Records one failure at `now`; returns the failure count once the budget is spent.
	pub fn record_failure(&mut self, now: Instant) -> Option<u32> {
		let expired = self.window_start.is_none_or(|start| now.duration_since(start) > self.window);

		if expired {
			self.window_start = Some(now);
			self.failures = 0;
		}

		self.failures += 1;

		(self.failures >= self.limit).then_some(self.failures)
	}

	/// Forgets every counted failure.
	pub fn reset(&mut self) {
		self.failures = 0;
		self.window_start = None;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn budget_exhausts_inside_the_window_only() {
		let start = Instant::now();
		let mut budget = RetryBudget::new(3, StdDuration::from_secs(60));

		assert_eq!(budget.record_failure(start), None);
		assert_eq!(budget.record_failure(start + StdDuration::from_secs(10)), None);
		assert_eq!(budget.record_failure(start + StdDuration::from_secs(20)), Some(3));

		budget.reset();

		assert_eq!(budget.failures(), 0);
		assert_eq!(budget.record_failure(start), None);
		assert_eq!(budget.record_failure(start + StdDuration::from_secs(30)), None);
		assert_eq!(
			budget.record_failure(start + StdDuration::from_secs(61)),
			None,
			"A failure after the window elapsed starts a new window."
		);
		assert_eq!(budget.failures(), 1);
	}
}
