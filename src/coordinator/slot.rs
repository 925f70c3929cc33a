//! Shared one-shot result cell for the single in-flight refresh.

// crates.io
use tokio::time::Instant;
// self
use crate::{_prelude::*, auth::TokenRecord, obs::RefreshTrigger};

/// The refresh currently in flight.
///
/// Every caller that joins awaits the same cell; the refresh task fills it exactly once after the
/// cache write and the slot removal.
#[derive(Debug)]
pub struct RefreshSlot {
	cell: AsyncOnceCell<Result<TokenRecord>>,
	trigger: RefreshTrigger,
	force: bool,
	generation: u64,
	started_at: Instant,
}
impl RefreshSlot {
	pub(crate) fn new(trigger: RefreshTrigger, force: bool, generation: u64) -> Self {
		Self { cell: AsyncOnceCell::new(), trigger, force, generation, started_at: Instant::now() }
	}

	/// Why the refresh started.
	pub fn trigger(&self) -> RefreshTrigger {
		self.trigger
	}

	/// Whether providers were asked to bypass their own caches.
	pub fn force(&self) -> bool {
		self.force
	}

	/// Session generation the refresh was started under.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// When the refresh started.
	pub fn started_at(&self) -> Instant {
		self.started_at
	}

	/// Returns `true` once the outcome is available.
	pub fn is_settled(&self) -> bool {
		self.cell.is_initialized()
	}

	/// Waits for the shared outcome.
	pub async fn wait(&self) -> Result<TokenRecord> {
		self.cell.wait().await.clone()
	}

	pub(crate) async fn resolve(&self, outcome: Result<TokenRecord>) {
		if self.cell.set(outcome).await.is_err() {
			tracing::error!(trigger = self.trigger.as_str(), "Refresh slot was settled twice.");
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	#[tokio::test]
	async fn every_waiter_observes_the_same_outcome() {
		let slot = Arc::new(RefreshSlot::new(RefreshTrigger::Demand, false, 7));
		let waiters = (0..4)
			.map(|_| {
				let slot = slot.clone();

				tokio::spawn(async move { slot.wait().await })
			})
			.collect::<Vec<_>>();
		let record = TokenRecord::builder(crate::auth::TokenSource::Federated)
			.token(mint_jwt(Duration::hours(1)))
			.build()
			.expect("Token record fixture should build successfully.");

		assert!(!slot.is_settled());

		slot.resolve(Ok(record.clone())).await;
		slot.resolve(Err(Error::SessionCleared)).await;

		for waiter in waiters {
			let outcome = waiter.await.expect("Waiter task should not panic.");

			assert_eq!(
				outcome.expect("The first outcome should win.").token.expose(),
				record.token.expose()
			);
		}

		assert_eq!(slot.generation(), 7);
		assert!(!slot.force());
	}
}
