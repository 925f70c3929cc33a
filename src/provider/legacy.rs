//! Legacy username/password provider backed by the shared session store.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSecret, TokenSource},
	error::ConfigError,
	http::{LoginRequest, LoginTransport},
	provider::{CredentialProvider, ProviderFuture},
	store::SessionStore,
};

/// [`CredentialProvider`] re-reading the JWT persisted under one well-known storage key.
///
/// Legacy tokens cannot be renewed silently: once the stored token expires it is removed and
/// the user has to log in again.
#[derive(Clone)]
pub struct LegacyProvider {
	store: Arc<dyn SessionStore>,
	key: String,
	transport: Option<Arc<dyn LoginTransport>>,
}
impl LegacyProvider {
	/// Creates a provider reading `key` from `store`.
	pub fn new(store: Arc<dyn SessionStore>, key: impl Into<String>) -> Self {
		Self { store, key: key.into(), transport: None }
	}

	/// Attaches the backend transport used by [`login`](Self::login) and [`logout`](Self::logout).
	pub fn with_transport(mut self, transport: Arc<dyn LoginTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Storage key holding the token.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Validates and returns the stored token.
	///
	/// Malformed and expired tokens are removed from storage before the error is returned.
	pub fn stored_record(&self) -> Result<TokenRecord> {
		let raw = self
			.store
			.load(&self.key)?
			.ok_or_else(|| Error::NoSession { reason: "no legacy token is stored".into() })?;
		let record = match TokenRecord::builder(TokenSource::Legacy).token(raw).build() {
			Ok(record) => record,
			Err(e) => {
				tracing::warn!(error = %e, "Removing malformed legacy token from storage.");

				self.store.remove(&self.key)?;

				return Err(Error::NoSession { reason: "the stored legacy token is malformed".into() });
			},
		};

		if record.is_expired() {
			tracing::info!(
				fingerprint = %record.token.fingerprint(),
				"Removing expired legacy token from storage."
			);

			self.store.remove(&self.key)?;

			return Err(Error::RefreshDenied {
				reason: format!("the legacy token expired at {}", record.expires_at),
			});
		}

		Ok(record)
	}

	/// Exchanges credentials with the backend and persists the issued token.
	pub async fn login(&self, email: &str, password: &str) -> Result<TokenRecord> {
		let request = LoginRequest::new(email, password)?;
		let transport = self.transport.as_ref().ok_or(ConfigError::MissingBackendUrl)?;
		let response = transport.login(request).await?;
		let record = TokenRecord::builder(TokenSource::Legacy).token(response.access_token).build()?;

		if record.is_expired() {
			return Err(Error::RefreshDenied { reason: "the backend issued an expired token".into() });
		}

		self.store.save(&self.key, record.token.expose())?;

		Ok(record)
	}

	/// Removes the stored token and notifies the backend on a best-effort basis.
	///
	/// Returns `true` when a token was stored.
	pub async fn logout(&self) -> Result<bool> {
		let stored = self.store.load(&self.key)?;

		self.store.remove(&self.key)?;

		if let (Some(raw), Some(transport)) = (stored.as_ref(), self.transport.as_ref()) {
			if let Err(e) = transport.logout(TokenSecret::new(raw.as_str())).await {
				tracing::warn!(error = %e, "Backend logout notification failed.");
			}
		}

		Ok(stored.is_some())
	}
}
impl Debug for LegacyProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LegacyProvider")
			.field("key", &self.key)
			.field("has_transport", &self.transport.is_some())
			.finish()
	}
}
impl CredentialProvider for LegacyProvider {
	fn source(&self) -> TokenSource {
		TokenSource::Legacy
	}

	fn acquire_silently(&self) -> ProviderFuture<'_> {
		Box::pin(async move { self.stored_record() })
	}

	fn force_refresh(&self) -> ProviderFuture<'_> {
		Box::pin(async move { self.stored_record() })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, store::MemoryStore};

	fn provider() -> (LegacyProvider, MemoryStore) {
		let store = MemoryStore::default();

		(LegacyProvider::new(Arc::new(store.clone()), "token"), store)
	}

	#[tokio::test]
	async fn stored_token_is_validated_on_every_read() {
		let (provider, store) = provider();
		let err = provider.acquire_silently().await.expect_err("Empty storage should fail.");

		assert!(matches!(err, Error::NoSession { .. }));

		let token = mint_jwt(Duration::hours(1));

		store.save("token", &token).expect("Seeding storage should succeed.");

		let record = provider.force_refresh().await.expect("A valid stored token should be served.");

		assert_eq!(record.token.expose(), token);
		assert_eq!(record.source, TokenSource::Legacy);
	}

	#[tokio::test]
	async fn malformed_and_expired_tokens_are_removed() {
		let (provider, store) = provider();

		store.save("token", "not-a-jwt").expect("Seeding storage should succeed.");

		let err = provider.acquire_silently().await.expect_err("Malformed tokens should fail.");

		assert!(matches!(err, Error::NoSession { .. }));
		assert!(store.is_empty());

		store.save("token", &mint_jwt(-Duration::minutes(1))).expect("Seeding storage should succeed.");

		let err = provider.acquire_silently().await.expect_err("Expired tokens should fail.");

		assert!(matches!(err, Error::RefreshDenied { .. }));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn login_without_backend_is_a_configuration_error() {
		let (provider, _) = provider();
		let err = provider.login("a@b.com", "x").await.expect_err("Login needs a backend.");

		assert!(matches!(err, Error::Config(ConfigError::MissingBackendUrl)));

		let err = provider.login("", "x").await.expect_err("Blank emails are rejected first.");

		assert!(matches!(err, Error::LoginRejected { .. }));
	}
}
