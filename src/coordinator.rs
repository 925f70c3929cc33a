//! Single-flight refresh coordination.
//!
//! The coordinator is the only writer of the token cache and of the in-flight slot. Refreshes run
//! on spawned tokio tasks, so a caller dropping its future never cancels a refresh other callers
//! joined. Every refresh settles in the same order: cache write (or discard), slot removal,
//! metrics, state transition, and finally the release of joined callers.
//!
//! Clearing the session bumps a generation counter but never abandons the in-flight refresh: at
//! most one provider call runs at any time. A refresh started under an older generation settles
//! as a no-op and hands its waiters [`Error::SessionCleared`]; token callers then retry once under
//! the new generation.

pub mod retry;
pub mod slot;

pub use retry::RetryBudget;
pub use slot::RefreshSlot;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::{runtime::Handle, time::Instant};
// self
use crate::{
	_prelude::*,
	auth::{Identity, TokenRecord, TokenSecret, TokenSource, TokenValidator, TokenValidity},
	cache::TokenCache,
	config::AuthConfig,
	error::ConfigError,
	obs::{self, RefreshOutcome, RefreshSpan, RefreshTrigger},
	provider::{CredentialProvider, LegacyProvider},
	recorder::AuthMetrics,
	scheduler::BackgroundScheduler,
	state::{AuthEvent, AuthPhase, AuthState, AuthStateMachine},
	store::StorageEvent,
};

enum Joined {
	Cached(TokenRecord),
	Existing(Arc<RefreshSlot>),
	Started(Arc<RefreshSlot>),
}

/// Owns the cache, the in-flight slot, the session state, and the background scheduler.
pub struct Coordinator {
	config: AuthConfig,
	validator: TokenValidator,
	cache: TokenCache,
	federated: Arc<dyn CredentialProvider>,
	legacy: Arc<LegacyProvider>,
	metrics: Arc<AuthMetrics>,
	state: AuthStateMachine,
	slot: Mutex<Option<Arc<RefreshSlot>>>,
	generation: AtomicU64,
	budget: Mutex<RetryBudget>,
	scheduler: BackgroundScheduler,
}
impl Coordinator {
	/// Wires both providers and the shared metrics recorder together.
	pub fn new(
		config: AuthConfig,
		federated: Arc<dyn CredentialProvider>,
		legacy: Arc<LegacyProvider>,
		metrics: Arc<AuthMetrics>,
	) -> Arc<Self> {
		let validator = TokenValidator::new(config.preemptive_buffer);
		let budget = RetryBudget::new(
			config.max_retry_attempts,
			StdDuration::try_from(config.retry_window).unwrap_or(StdDuration::ZERO),
		);
		let scheduler = BackgroundScheduler::new(config.background_period(), config.background_refresh);

		Arc::new(Self {
			config,
			validator,
			cache: TokenCache::default(),
			federated,
			legacy,
			metrics,
			state: AuthStateMachine::new(),
			slot: Mutex::new(None),
			generation: AtomicU64::new(0),
			budget: Mutex::new(budget),
			scheduler,
		})
	}

	/// Active configuration.
	pub fn config(&self) -> &AuthConfig {
		&self.config
	}

	/// Token cache (read-only outside the coordinator).
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Shared metrics recorder.
	pub fn metrics(&self) -> &Arc<AuthMetrics> {
		&self.metrics
	}

	/// Session state machine.
	pub fn state(&self) -> &AuthStateMachine {
		&self.state
	}

	/// Background scheduler.
	pub fn scheduler(&self) -> &BackgroundScheduler {
		&self.scheduler
	}

	/// Legacy provider used for login and logout.
	pub fn legacy(&self) -> &LegacyProvider {
		&self.legacy
	}

	/// Current session generation.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::SeqCst)
	}

	/// Returns `true` while a refresh is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.slot.lock().is_some()
	}

	/// Identity claims of the cached record.
	pub fn identity(&self) -> Option<Identity> {
		self.cache.get().map(|record| record.identity)
	}

	/// Returns a usable token, refreshing through the single in-flight slot when needed.
	///
	/// Tokens inside the preemptive window are returned immediately and start a refresh nobody
	/// waits for.
	pub async fn get_valid_token(self: &Arc<Self>) -> Result<TokenSecret> {
		if let Some(record) = self.cache.get() {
			match self.validator.classify_expiry(record.expires_at, OffsetDateTime::now_utc()) {
				TokenValidity::Valid => {
					self.metrics.record_hit();

					return Ok(record.token);
				},
				TokenValidity::ExpiringSoon => {
					self.metrics.record_hit();
					self.start_detached(RefreshTrigger::Preemptive, true);

					return Ok(record.token);
				},
				TokenValidity::Expired | TokenValidity::Malformed => {},
			}
		}

		self.metrics.record_miss();

		self.await_refresh(RefreshTrigger::Demand, false).await.map(|record| record.token)
	}

	/// Refreshes regardless of the cached record, asking providers to bypass their caches.
	pub async fn force_refresh(self: &Arc<Self>) -> Result<TokenSecret> {
		self.await_refresh(RefreshTrigger::Forced, true).await.map(|record| record.token)
	}

	/// Resolves the pending phase with one silent check; returns the resulting state.
	pub async fn initialize(self: &Arc<Self>) -> AuthState {
		if self.state.phase() == AuthPhase::Pending {
			if let Err(e) = self.await_refresh(RefreshTrigger::Recheck, false).await {
				tracing::debug!(error = %e, "Initial session check found no usable token.");
			}
		}

		self.state.current()
	}

	/// Scheduler entry point: starts a background refresh unless one is in flight.
	pub fn background_refresh(self: &Arc<Self>) -> bool {
		if self.state.phase() != AuthPhase::Authenticated {
			return false;
		}

		let force = !matches!(
			self.cache.get().map(|record| {
				self.validator.classify_expiry(record.expires_at, OffsetDateTime::now_utc())
			}),
			Some(TokenValidity::Valid)
		);

		self.start_detached(RefreshTrigger::Background, force)
	}

	/// Drops the cached record and stops the scheduler; metrics and storage are untouched.
	///
	/// Returns `true` when a record was cached. Calling it again is a no-op.
	pub fn clear(self: &Arc<Self>) -> bool {
		let removed = self.reset_session(None);

		self.transition(AuthEvent::Cleared);

		removed
	}

	/// Installs a record obtained by an interactive login.
	pub fn install(self: &Arc<Self>, record: TokenRecord) {
		let source = record.source;

		tracing::info!(
			source = source.as_str(),
			fingerprint = %record.token.fingerprint(),
			"Installing token from login."
		);

		self.reset_session(Some(record));
		self.budget.lock().reset();
		self.transition(AuthEvent::Authenticated(source));
	}

	/// Moves the error phase back to pending and forgets counted failures.
	pub fn begin_relogin(self: &Arc<Self>) -> AuthState {
		self.budget.lock().reset();

		self.transition(AuthEvent::ReloginRequested)
	}

	/// Reacts to a storage change made by another handle.
	///
	/// Changes to the legacy key drop the cached record and trigger a re-check.
	pub fn invalidate_external(self: &Arc<Self>, event: &StorageEvent) -> bool {
		if event.key != self.config.legacy_storage_key {
			return false;
		}

		tracing::info!(key = %event.key, removed = event.is_removal(), "Session changed in another handle.");

		self.reset_session(None);
		self.transition(AuthEvent::Invalidated);
		self.spawn_recheck();

		true
	}

	/// Logs in with legacy credentials and installs the issued token.
	pub async fn login_legacy(self: &Arc<Self>, email: &str, password: &str) -> Result<TokenRecord> {
		if self.state.phase() == AuthPhase::Error {
			self.begin_relogin();
		}

		match self.legacy.login(email, password).await {
			Ok(record) => {
				self.install(record.clone());

				Ok(record)
			},
			Err(e) => {
				self.login_failed("login", &e);

				Err(e)
			},
		}
	}

	/// Installs the federated token after the embedder finished an interactive sign-in.
	pub async fn complete_federated_login(self: &Arc<Self>) -> Result<TokenRecord> {
		if self.state.phase() == AuthPhase::Error {
			self.begin_relogin();
		}

		match self.acquire(&*self.federated, false).await {
			Ok(record) => {
				self.install(record.clone());

				Ok(record)
			},
			Err(e) => {
				self.login_failed("federated_login", &e);

				Err(e)
			},
		}
	}

	async fn await_refresh(
		self: &Arc<Self>,
		trigger: RefreshTrigger,
		force: bool,
	) -> Result<TokenRecord> {
		let mut retried = false;

		loop {
			let slot = match self.join_or_start(trigger, force)? {
				Joined::Cached(record) => return Ok(record),
				Joined::Existing(slot) | Joined::Started(slot) => slot,
			};

			match slot.wait().await {
				Err(e) if !retried && matches!(e.root_cause(), Error::SessionCleared) => {
					tracing::debug!(trigger = trigger.as_str(), "Retrying under the new session generation.");

					retried = true;
				},
				outcome => return outcome,
			}
		}
	}

	/// Re-checks the session in the background, queueing behind a refresh from an older
	/// generation when one is still in flight.
	fn spawn_recheck(self: &Arc<Self>) {
		let Ok(handle) = Handle::try_current() else {
			tracing::debug!("No tokio runtime; the session re-check was skipped.");

			return;
		};
		let coordinator = self.clone();

		handle.spawn(async move {
			if let Err(e) = coordinator.await_refresh(RefreshTrigger::Recheck, false).await {
				tracing::debug!(error = %e, "Session re-check found no usable token.");
			}
		});
	}

	fn start_detached(self: &Arc<Self>, trigger: RefreshTrigger, force: bool) -> bool {
		match self.join_or_start(trigger, force) {
			Ok(Joined::Started(_)) => true,
			Ok(_) => false,
			Err(e) => {
				tracing::debug!(trigger = trigger.as_str(), error = %e, "Refresh was not started.");

				false
			},
		}
	}

	fn join_or_start(self: &Arc<Self>, trigger: RefreshTrigger, force: bool) -> Result<Joined> {
		let mut guard = self.slot.lock();

		if let Some(slot) = guard.as_ref() {
			return Ok(Joined::Existing(slot.clone()));
		}
		if matches!(trigger, RefreshTrigger::Demand | RefreshTrigger::Recheck) {
			let now = OffsetDateTime::now_utc();

			if let Some(record) = self.cache.get().filter(|record| {
				self.validator.classify_expiry(record.expires_at, now).is_usable()
			}) {
				return Ok(Joined::Cached(record));
			}
		}

		let state = self.state.current();

		if state.phase == AuthPhase::Error {
			return Err(Error::unauthenticated(Error::ReloginRequired {
				reason: state.last_error.unwrap_or_else(|| "unknown failure".into()),
			}));
		}

		let handle = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
		let slot = Arc::new(RefreshSlot::new(trigger, force, self.generation()));

		*guard = Some(slot.clone());

		drop(guard);

		self.metrics.record_started(trigger);
		obs::record_refresh_outcome(trigger, RefreshOutcome::Attempt);
		handle.spawn(self.clone().run(slot.clone()));

		Ok(Joined::Started(slot))
	}

	async fn run(self: Arc<Self>, slot: Arc<RefreshSlot>) {
		let span = RefreshSpan::new(slot.trigger(), "refresh");
		let result = span.instrument(self.refresh(slot.force())).await;
		let outcome = {
			let _guard = span.entered();

			self.settle(&slot, result)
		};

		slot.resolve(outcome).await;
	}

	async fn refresh(&self, force: bool) -> Result<TokenRecord> {
		match self.cache.source() {
			Some(TokenSource::Federated) => self.acquire(&*self.federated, force).await,
			Some(TokenSource::Legacy) => self.acquire(&*self.legacy, force).await,
			None => {
				let federated_error = match self.acquire(&*self.federated, force).await {
					Ok(record) => return Ok(record),
					Err(e) => e,
				};

				tracing::debug!(error = %federated_error, "Federated provider failed; trying legacy.");

				match self.acquire(&*self.legacy, force).await {
					Ok(record) => Ok(record),
					Err(legacy_error)
						if federated_error.is_retryable()
							|| matches!(legacy_error, Error::NoSession { .. }) =>
						Err(federated_error),
					Err(legacy_error) => Err(legacy_error),
				}
			},
		}
	}

	/// Calls `provider`, retrying transport failures with a fixed delay.
	async fn acquire(&self, provider: &dyn CredentialProvider, force: bool) -> Result<TokenRecord> {
		let mut attempt = 1;

		loop {
			let result =
				if force { provider.force_refresh().await } else { provider.acquire_silently().await };

			match result {
				Err(e) if e.is_retryable() && attempt < self.config.max_retry_attempts => {
					tracing::warn!(
						provider = provider.source().as_str(),
						attempt,
						error = %e,
						"Provider unavailable; retrying."
					);

					tokio::time::sleep(self.config.retry_pause()).await;

					attempt += 1;
				},
				result => return result,
			}
		}
	}

	fn settle(self: &Arc<Self>, slot: &Arc<RefreshSlot>, result: Result<TokenRecord>) -> Result<TokenRecord> {
		let trigger = slot.trigger();
		let elapsed = slot.started_at().elapsed();
		let (current, renewed) = {
			let mut guard = self.slot.lock();
			let current = slot.generation() == self.generation();
			let mut renewed = false;

			if current {
				match &result {
					Ok(record) => {
						renewed = self
							.cache
							.set(record.clone())
							.is_none_or(|previous| previous.token != record.token);
					},
					Err(e) if e.requires_login() => {
						self.cache.clear();
					},
					Err(_) => {},
				}
			}
			if guard.as_ref().is_some_and(|active| Arc::ptr_eq(active, slot)) {
				*guard = None;
			}

			(current, renewed)
		};

		if !current {
			tracing::info!(trigger = trigger.as_str(), "Discarding refresh from a cleared session.");
			obs::record_refresh_outcome(trigger, RefreshOutcome::Discarded);

			return Err(Error::unauthenticated(Error::SessionCleared));
		}

		match result {
			Ok(record) => {
				self.budget.lock().reset();

				if renewed {
					self.metrics.record_refresh(elapsed);
					obs::record_refresh_latency(trigger, elapsed);
					obs::record_refresh_outcome(trigger, RefreshOutcome::Success);
					tracing::info!(
						source = record.source.as_str(),
						fingerprint = %record.token.fingerprint(),
						expires_at = %record.expires_at,
						elapsed_ms = elapsed.as_millis() as u64,
						"Token refreshed."
					);
				} else {
					obs::record_refresh_outcome(trigger, RefreshOutcome::Revalidated);
					tracing::debug!(
						source = record.source.as_str(),
						fingerprint = %record.token.fingerprint(),
						"Provider confirmed the cached token unchanged."
					);
				}

				self.transition(AuthEvent::Authenticated(record.source));

				Ok(record)
			},
			Err(e) => {
				let e = self.classify_failure(e);

				self.metrics.record_error(trigger.as_str(), &e);
				obs::record_refresh_outcome(trigger, RefreshOutcome::Failure);
				tracing::warn!(error = %e, "Token refresh failed.");

				self.transition(AuthEvent::Failed(e.clone()));

				Err(Error::unauthenticated(e))
			},
		}
	}

	/// Turns a no-session failure into budget exhaustion once the budget is spent.
	fn classify_failure(&self, error: Error) -> Error {
		if !matches!(error, Error::NoSession { .. }) {
			return error;
		}

		match self.budget.lock().record_failure(Instant::now()) {
			Some(attempts) => {
				tracing::error!(attempts, "No session after repeated attempts; auto-retry stopped.");

				Error::RetryBudgetExhausted { attempts }
			},
			None => error,
		}
	}

	fn login_failed(self: &Arc<Self>, context: &str, error: &Error) {
		self.metrics.record_error(context, error);

		tracing::warn!(context, error = %error, "Login failed.");

		if self.state.phase() != AuthPhase::Authenticated {
			self.transition(AuthEvent::Failed(error.clone()));
		}
	}

	/// Starts a new session generation and replaces the cached record.
	///
	/// An in-flight refresh keeps its slot, so no second provider call starts before it settles;
	/// the generation check discards its stale result.
	fn reset_session(&self, record: Option<TokenRecord>) -> bool {
		let guard = self.slot.lock();

		self.generation.fetch_add(1, Ordering::SeqCst);

		let replaced = match record {
			Some(record) => self.cache.set(record).is_some(),
			None => self.cache.clear(),
		};

		drop(guard);

		replaced
	}

	fn transition(self: &Arc<Self>, event: AuthEvent) -> AuthState {
		let state = self.state.apply(event);

		if state.phase == AuthPhase::Authenticated {
			self.scheduler.start(Arc::downgrade(self));
		} else {
			self.scheduler.stop();
		}

		state
	}
}
impl Debug for Coordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("state", &self.state.current())
			.field("cache", &self.cache)
			.field("generation", &self.generation())
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}
