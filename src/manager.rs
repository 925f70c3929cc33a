//! Public facade tying providers, storage, and the coordinator together.

// crates.io
use tokio::sync::watch;
// self
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestLoginClient};
use crate::{
	_prelude::*,
	auth::{Identity, TokenSecret},
	config::AuthConfig,
	coordinator::Coordinator,
	http::LoginTransport,
	provider::{FederatedProvider, IdentityCapability, LegacyProvider},
	recorder::{AuthMetrics, MetricsSnapshot},
	state::{AuthPhase, AuthState},
	store::{SessionStore, StorageEvent, Subscription},
};

/// Result of an interactive login attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
	/// Whether a token was installed.
	pub success: bool,
	/// Rendered failure, when the login failed.
	pub error: Option<String>,
}
impl LoginOutcome {
	fn from_result<T>(result: &Result<T>) -> Self {
		match result {
			Ok(_) => Self { success: true, error: None },
			Err(e) => Self { success: false, error: Some(e.to_string()) },
		}
	}
}

/// Produces valid bearer tokens regardless of which identity mechanism issued them.
///
/// The manager subscribes to storage changes made by other handles of its [`SessionStore`]; the
/// subscription ends when the manager is dropped.
pub struct AuthManager {
	coordinator: Arc<Coordinator>,
	_subscription: Subscription,
}
impl AuthManager {
	/// Creates a manager over the federated `capability`, the shared `store`, and an optional
	/// backend `transport` for legacy login.
	pub fn new(
		config: AuthConfig,
		capability: Arc<dyn IdentityCapability>,
		store: Arc<dyn SessionStore>,
		transport: Option<Arc<dyn LoginTransport>>,
	) -> Self {
		let federated = FederatedProvider::new(capability, config.scopes.clone())
			.with_account_hint(config.account_hint.clone());
		let mut legacy = LegacyProvider::new(store.clone(), config.legacy_storage_key.clone());

		if let Some(transport) = transport {
			legacy = legacy.with_transport(transport);
		}

		let metrics = Arc::new(AuthMetrics::new(config.error_log_capacity));
		let coordinator = Coordinator::new(config, Arc::new(federated), Arc::new(legacy), metrics);
		let weak = Arc::downgrade(&coordinator);
		let subscription = store.on_external_invalidate(Arc::new(move |event: &StorageEvent| {
			if let Some(coordinator) = weak.upgrade() {
				coordinator.invalidate_external(event);
			}
		}));

		Self { coordinator, _subscription: subscription }
	}

	/// Creates a manager whose legacy login talks to `config.backend_url` through reqwest.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(
		config: AuthConfig,
		capability: Arc<dyn IdentityCapability>,
		store: Arc<dyn SessionStore>,
	) -> Result<Self, ConfigError> {
		let transport = match config.backend_url.as_ref() {
			Some(url) => Some(Arc::new(ReqwestLoginClient::new(url)?) as Arc<dyn LoginTransport>),
			None => None,
		};

		Ok(Self::new(config, capability, store, transport))
	}

	/// Underlying coordinator.
	pub fn coordinator(&self) -> &Arc<Coordinator> {
		&self.coordinator
	}

	/// Resolves the initial pending state with one silent check.
	pub async fn initialize(&self) -> AuthState {
		self.coordinator.initialize().await
	}

	/// Returns a valid bearer token, refreshing when needed.
	pub async fn get_token(&self) -> Result<TokenSecret> {
		self.coordinator.get_valid_token().await
	}

	/// Refreshes even when the cached token is still valid.
	pub async fn force_refresh(&self) -> Result<TokenSecret> {
		self.coordinator.force_refresh().await
	}

	/// Drops the cached token without touching metrics or storage.
	///
	/// Returns `true` when a token was cached.
	pub fn clear_cache(&self) -> bool {
		self.coordinator.clear()
	}

	/// Logs in with legacy credentials.
	pub async fn login_legacy(&self, email: &str, password: &str) -> LoginOutcome {
		LoginOutcome::from_result(&self.coordinator.login_legacy(email, password).await)
	}

	/// Installs the federated token once the embedder completed an interactive sign-in.
	pub async fn complete_federated_login(&self) -> LoginOutcome {
		LoginOutcome::from_result(&self.coordinator.complete_federated_login().await)
	}

	/// Leaves the error phase so refreshes and logins are attempted again.
	pub fn begin_relogin(&self) -> AuthState {
		self.coordinator.begin_relogin()
	}

	/// Ends the session: cache, metrics, scheduler, and the persisted legacy token.
	///
	/// Other handles of the store are notified through the removal; the backend is told on a
	/// best-effort basis.
	pub async fn logout(&self) -> Result<()> {
		if self.coordinator.state().phase() == AuthPhase::Error {
			self.coordinator.begin_relogin();
		}

		self.coordinator.clear();
		self.coordinator.metrics().clear();

		let removed = self.coordinator.legacy().logout().await?;

		tracing::info!(removed, "Logged out.");

		Ok(())
	}

	/// Snapshot of the telemetry counters.
	pub fn metrics(&self) -> MetricsSnapshot {
		self.coordinator.metrics().snapshot(self.coordinator.cache().len())
	}

	/// Shared metrics recorder.
	pub fn metrics_recorder(&self) -> &Arc<AuthMetrics> {
		self.coordinator.metrics()
	}

	/// Current session state.
	pub fn state(&self) -> AuthState {
		self.coordinator.state().current()
	}

	/// Subscribes to session state changes.
	pub fn subscribe_state(&self) -> watch::Receiver<AuthState> {
		self.coordinator.state().subscribe()
	}

	/// Feeds a storage change observed by the platform; returns `true` when it invalidated the
	/// session.
	pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
		self.coordinator.invalidate_external(event)
	}

	/// Identity claims of the current token.
	pub fn identity(&self) -> Option<Identity> {
		self.coordinator.identity()
	}
}
impl Debug for AuthManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthManager").field("coordinator", &self.coordinator).finish()
	}
}
