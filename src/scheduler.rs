//! Recurring background refresh while a session is authenticated.

// crates.io
use tokio::{
	runtime::Handle,
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{_prelude::*, coordinator::Coordinator};

/// Owns the background refresh task.
///
/// The task only holds a weak reference to the coordinator and ends on its own once the
/// coordinator is gone. The first tick fires one full period after [`start`](Self::start).
#[derive(Debug)]
pub struct BackgroundScheduler {
	period: StdDuration,
	enabled: bool,
	task: Mutex<Option<JoinHandle<()>>>,
}
impl BackgroundScheduler {
	/// Creates a stopped scheduler ticking every `period`; `enabled = false` makes it inert.
	pub fn new(period: StdDuration, enabled: bool) -> Self {
		Self { period, enabled, task: Mutex::new(None) }
	}

	/// Tick period.
	pub fn period(&self) -> StdDuration {
		self.period
	}

	/// Returns `true` while the task is scheduled.
	pub fn is_running(&self) -> bool {
		self.task.lock().as_ref().is_some_and(|task| !task.is_finished())
	}

	/// Starts ticking unless already running, disabled, or outside a tokio runtime.
	pub fn start(&self, coordinator: Weak<Coordinator>) -> bool {
		if !self.enabled || self.period.is_zero() {
			return false;
		}

		let mut task = self.task.lock();

		if task.as_ref().is_some_and(|task| !task.is_finished()) {
			return false;
		}

		let Ok(handle) = Handle::try_current() else {
			tracing::warn!("Background refresh needs a tokio runtime; the scheduler stays stopped.");

			return false;
		};

		*task = Some(handle.spawn(tick(coordinator, self.period)));

		tracing::debug!(period_ms = self.period.as_millis() as u64, "Background refresh started.");

		true
	}

	/// Cancels the task; returns `true` when one was running.
	pub fn stop(&self) -> bool {
		match self.task.lock().take() {
			Some(task) => {
				task.abort();

				tracing::debug!("Background refresh stopped.");

				true
			},
			None => false,
		}
	}
}
impl Drop for BackgroundScheduler {
	fn drop(&mut self) {
		if let Some(task) = self.task.get_mut().take() {
			task.abort();
		}
	}
}

async fn tick(coordinator: Weak<Coordinator>, period: StdDuration) {
	let mut interval = time::interval_at(Instant::now() + period, period);

	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		interval.tick().await;

		let Some(coordinator) = coordinator.upgrade() else {
			break;
		};

		coordinator.background_refresh();
	}
}
