//! Per-manager counters, refresh latency, and a bounded error log.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, obs::RefreshTrigger};

/// Thread-safe telemetry recorder owned by one manager.
///
/// Counters only grow until [`clear`](AuthMetrics::clear) runs on logout.
#[derive(Debug)]
pub struct AuthMetrics {
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	refresh_count: AtomicU64,
	background_refresh_count: AtomicU64,
	preemptive_refresh_count: AtomicU64,
	error_count: AtomicU64,
	refresh_micros_total: AtomicU64,
	refresh_samples: AtomicU64,
	error_log: Mutex<VecDeque<String>>,
	error_log_capacity: usize,
}
impl AuthMetrics {
	/// Creates a recorder keeping the `error_log_capacity` most recent error messages.
	pub fn new(error_log_capacity: usize) -> Self {
		let error_log_capacity = error_log_capacity.max(1);

		Self {
			cache_hits: AtomicU64::new(0),
			cache_misses: AtomicU64::new(0),
			refresh_count: AtomicU64::new(0),
			background_refresh_count: AtomicU64::new(0),
			preemptive_refresh_count: AtomicU64::new(0),
			error_count: AtomicU64::new(0),
			refresh_micros_total: AtomicU64::new(0),
			refresh_samples: AtomicU64::new(0),
			error_log: Mutex::new(VecDeque::with_capacity(error_log_capacity)),
			error_log_capacity,
		}
	}

	/// Number of cache hits.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Number of cache misses.
	pub fn cache_misses(&self) -> u64 {
		self.cache_misses.load(Ordering::Relaxed)
	}

	/// Number of successful refreshes.
	pub fn refresh_count(&self) -> u64 {
		self.refresh_count.load(Ordering::Relaxed)
	}

	/// Number of refreshes started by the background scheduler.
	pub fn background_refresh_count(&self) -> u64 {
		self.background_refresh_count.load(Ordering::Relaxed)
	}

	/// Number of refreshes started from the preemptive window.
	pub fn preemptive_refresh_count(&self) -> u64 {
		self.preemptive_refresh_count.load(Ordering::Relaxed)
	}

	/// Number of failed refreshes and logins.
	pub fn error_count(&self) -> u64 {
		self.error_count.load(Ordering::Relaxed)
	}

	/// Builds a consistent-enough snapshot for display; `cache_size` comes from the cache.
	pub fn snapshot(&self, cache_size: usize) -> MetricsSnapshot {
		let cache_hits = self.cache_hits();
		let cache_misses = self.cache_misses();
		let lookups = cache_hits + cache_misses;
		let hit_rate =
			if lookups == 0 { 0.0 } else { cache_hits as f64 / lookups as f64 * 100.0 };
		let samples = self.refresh_samples.load(Ordering::Relaxed);
		let average_refresh_time = if samples == 0 {
			StdDuration::ZERO
		} else {
			StdDuration::from_micros(self.refresh_micros_total.load(Ordering::Relaxed) / samples)
		};

		MetricsSnapshot {
			cache_hits,
			cache_misses,
			hit_rate,
			token_refresh_count: self.refresh_count(),
			background_refresh_count: self.background_refresh_count(),
			preemptive_refresh_count: self.preemptive_refresh_count(),
			average_refresh_time,
			error_count: self.error_count(),
			auth_errors: self.error_log.lock().iter().cloned().collect(),
			cache_size,
		}
	}

	/// Resets every counter and empties the error log.
	pub fn clear(&self) {
		for counter in [
			&self.cache_hits,
			&self.cache_misses,
			&self.refresh_count,
			&self.background_refresh_count,
			&self.preemptive_refresh_count,
			&self.error_count,
			&self.refresh_micros_total,
			&self.refresh_samples,
		] {
			counter.store(0, Ordering::Relaxed);
		}

		self.error_log.lock().clear();
	}

	pub(crate) fn record_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_miss(&self) {
		self.cache_misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self, elapsed: StdDuration) {
		let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

		self.refresh_count.fetch_add(1, Ordering::Relaxed);
		self.refresh_micros_total.fetch_add(micros, Ordering::Relaxed);
		self.refresh_samples.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_started(&self, trigger: RefreshTrigger) {
		let counter = match trigger {
			RefreshTrigger::Background => &self.background_refresh_count,
			RefreshTrigger::Preemptive => &self.preemptive_refresh_count,
			_ => return,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_error(&self, context: &str, error: &Error) {
		self.error_count.fetch_add(1, Ordering::Relaxed);

		let mut log = self.error_log.lock();

		if log.len() == self.error_log_capacity {
			log.pop_front();
		}

		log.push_back(format!("[{context}] {error}"));
	}
}
impl Default for AuthMetrics {
	fn default() -> Self {
		Self::new(crate::config::AuthConfig::DEFAULT_ERROR_LOG_CAPACITY)
	}
}

/// Point-in-time view of [`AuthMetrics`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
	/// Calls served from the cache (including tokens in the preemptive window).
	pub cache_hits: u64,
	/// Calls that had to join or start a refresh.
	pub cache_misses: u64,
	/// Hits as a percentage of all lookups, 0 when nothing was looked up.
	pub hit_rate: f64,
	/// Successful refreshes.
	pub token_refresh_count: u64,
	/// Refreshes started by the background scheduler.
	pub background_refresh_count: u64,
	/// Refreshes started from the preemptive window.
	pub preemptive_refresh_count: u64,
	/// Mean duration of successful refreshes.
	pub average_refresh_time: StdDuration,
	/// Failed refreshes and logins.
	pub error_count: u64,
	/// Most recent error messages, oldest first.
	pub auth_errors: Vec<String>,
	/// Number of unexpired cached records (0 or 1).
	pub cache_size: usize,
}
