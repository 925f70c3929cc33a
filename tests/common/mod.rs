//! Shared fixtures for integration tests: token minting and a scriptable identity capability.

#![allow(dead_code)]

// std
use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicU64, AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use auth_lifecycle::{
	AuthManager,
	config::{AuthConfig, Environment},
	http::LoginTransport,
	provider::{Account, CapabilityError, CapabilityFuture, IdentityCapability, SilentRequest, SilentToken},
	store::SessionStore,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

static MINTED: AtomicU64 = AtomicU64::new(0);

/// Mints an unsigned JWT expiring `ttl` from now; every call yields a distinct token.
pub fn mint_jwt(ttl: Duration) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let claims = serde_json::json!({
		"exp": (OffsetDateTime::now_utc() + ttl).unix_timestamp(),
		"sub": "user-1",
		"email": "a@b.com",
		"jti": MINTED.fetch_add(1, Ordering::Relaxed),
	});
	let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

	format!("{header}.{payload}.signature")
}

/// What the stub capability answers with.
#[derive(Clone, Debug)]
pub enum Behavior {
	/// A fresh JWT with this lifetime.
	Token(Duration),
	/// The identity provider needs interaction.
	InteractionRequired,
	/// The identity provider cannot be reached.
	Network,
}
impl Behavior {
	fn answer(&self) -> Result<SilentToken, CapabilityError> {
		match self {
			Behavior::Token(ttl) => Ok(SilentToken { access_token: mint_jwt(*ttl), expires_on: None }),
			Behavior::InteractionRequired =>
				Err(CapabilityError::InteractionRequired { message: "login required".into() }),
			Behavior::Network => Err(CapabilityError::Network { message: "offline".into() }),
		}
	}
}

/// Scriptable [`IdentityCapability`] counting silent acquisitions.
#[derive(Debug)]
pub struct StubCapability {
	accounts: Vec<Account>,
	default: Mutex<Behavior>,
	script: Mutex<VecDeque<Behavior>>,
	delay: Mutex<StdDuration>,
	calls: AtomicUsize,
	forced: AtomicUsize,
}
impl StubCapability {
	pub fn new(default: Behavior) -> Arc<Self> {
		Arc::new(Self {
			accounts: vec![Account::new("home-1", "a@b.com")],
			default: Mutex::new(default),
			script: Mutex::new(VecDeque::new()),
			delay: Mutex::new(StdDuration::ZERO),
			calls: AtomicUsize::new(0),
			forced: AtomicUsize::new(0),
		})
	}

	/// Answers the next calls with `behaviors`, then falls back to the default.
	pub fn script(&self, behaviors: impl IntoIterator<Item = Behavior>) {
		self.script.lock().extend(behaviors);
	}

	pub fn set_default(&self, behavior: Behavior) {
		*self.default.lock() = behavior;
	}

	pub fn set_delay(&self, delay: StdDuration) {
		*self.delay.lock() = delay;
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn forced_calls(&self) -> usize {
		self.forced.load(Ordering::SeqCst)
	}
}
impl IdentityCapability for StubCapability {
	fn all_accounts(&self) -> Vec<Account> {
		self.accounts.clone()
	}

	fn acquire_token_silently(&self, request: SilentRequest) -> CapabilityFuture<'_> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		if request.force_refresh {
			self.forced.fetch_add(1, Ordering::SeqCst);
		}

		let behavior = self.script.lock().pop_front().unwrap_or_else(|| self.default.lock().clone());
		let delay = *self.delay.lock();

		Box::pin(async move {
			if !delay.is_zero() {
				tokio::time::sleep(delay).await;
			}

			behavior.answer()
		})
	}
}

/// Test configuration: no background ticks and no retry delay unless a test opts in.
pub fn config() -> AuthConfig {
	AuthConfig::builder(Environment::Production)
		.background_refresh(false)
		.retry_delay(Duration::ZERO)
		.build()
		.expect("Test configuration should validate.")
}

pub fn manager(
	config: AuthConfig,
	capability: Arc<StubCapability>,
	store: Arc<dyn SessionStore>,
	transport: Option<Arc<dyn LoginTransport>>,
) -> Arc<AuthManager> {
	Arc::new(AuthManager::new(config, capability, store, transport))
}

/// Yields until no refresh is in flight.
pub async fn settle(manager: &AuthManager) {
	for _ in 0..1_000 {
		if !manager.coordinator().is_refreshing() {
			break;
		}

		tokio::time::sleep(StdDuration::from_millis(1)).await;
	}

	tokio::task::yield_now().await;
}
