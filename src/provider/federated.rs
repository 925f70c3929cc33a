//! Federated identity provider adapter.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSource},
	provider::{CredentialProvider, ProviderFuture},
};

/// Boxed future returned by [`IdentityCapability::acquire_token_silently`].
pub type CapabilityFuture<'a> =
	Pin<Box<dyn Future<Output = Result<SilentToken, CapabilityError>> + 'a + Send>>;

/// Opaque identity-provider capability supplied by the embedder.
///
/// Interactive sign-in stays outside this crate; the capability only reports the accounts it
/// already knows and acquires tokens for them silently.
pub trait IdentityCapability
where
	Self: 'static + Send + Sync,
{
	/// Accounts signed in with the identity provider, most relevant first.
	fn all_accounts(&self) -> Vec<Account>;

	/// Acquires a token for `request.account` without user interaction.
	fn acquire_token_silently(&self, request: SilentRequest) -> CapabilityFuture<'_>;
}

/// Account known to the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
	/// Stable account identifier.
	pub home_account_id: String,
	/// Sign-in name, usually an email address.
	pub username: String,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Directory the account belongs to.
	#[serde(default)]
	pub tenant_id: Option<String>,
}
impl Account {
	/// Creates an account with only the required fields.
	pub fn new(home_account_id: impl Into<String>, username: impl Into<String>) -> Self {
		Self { home_account_id: home_account_id.into(), username: username.into(), name: None, tenant_id: None }
	}
}

/// Silent acquisition request.
#[derive(Clone, Debug)]
pub struct SilentRequest {
	/// Account to acquire for.
	pub account: Account,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Bypass the capability's own token cache.
	pub force_refresh: bool,
}

/// Token returned by the capability.
#[derive(Clone)]
pub struct SilentToken {
	/// Issued bearer token.
	pub access_token: String,
	/// Expiry reported by the capability; only used when the token has no `exp` claim.
	pub expires_on: Option<OffsetDateTime>,
}
impl Debug for SilentToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SilentToken")
			.field("access_token", &"<redacted>")
			.field("expires_on", &self.expires_on)
			.finish()
	}
}

/// Failures reported by an [`IdentityCapability`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CapabilityError {
	/// The identity provider needs the user to interact.
	#[error("Interaction is required: {message}.")]
	InteractionRequired {
		/// Capability-supplied message.
		message: String,
	},
	/// The requested account is unknown to the capability.
	#[error("The account is not signed in.")]
	NoAccount,
	/// Network failure reaching the identity provider.
	#[error("Network failure: {message}.")]
	Network {
		/// Capability-supplied message.
		message: String,
	},
	/// Any other capability failure.
	#[error("{message}")]
	Other {
		/// Capability-supplied message.
		message: String,
	},
}
impl From<CapabilityError> for Error {
	fn from(e: CapabilityError) -> Self {
		match e {
			CapabilityError::InteractionRequired { .. } | CapabilityError::NoAccount =>
				Error::NoSession { reason: e.to_string() },
			CapabilityError::Network { .. } | CapabilityError::Other { .. } =>
				Error::ProviderUnavailable {
					provider: TokenSource::Federated,
					message: e.to_string(),
					status: None,
				},
		}
	}
}

/// [`CredentialProvider`] backed by an [`IdentityCapability`].
#[derive(Clone)]
pub struct FederatedProvider {
	capability: Arc<dyn IdentityCapability>,
	scopes: Vec<String>,
	account_hint: Option<String>,
}
impl FederatedProvider {
	/// Wraps `capability`, requesting `scopes` for every acquisition.
	pub fn new(capability: Arc<dyn IdentityCapability>, scopes: Vec<String>) -> Self {
		Self { capability, scopes, account_hint: None }
	}

	/// Prefers the account whose username matches `hint` (case-insensitive).
	pub fn with_account_hint(mut self, hint: Option<String>) -> Self {
		self.account_hint = hint;

		self
	}

	/// Account the provider acquires for: the hinted one, otherwise the first known.
	pub fn active_account(&self) -> Option<Account> {
		let accounts = self.capability.all_accounts();
		let hinted = self.account_hint.as_deref().and_then(|hint| {
			accounts.iter().find(|account| account.username.eq_ignore_ascii_case(hint)).cloned()
		});

		hinted.or_else(|| accounts.into_iter().next())
	}

	async fn acquire(&self, force_refresh: bool) -> Result<TokenRecord> {
		let account = self
			.active_account()
			.ok_or_else(|| Error::NoSession { reason: "no federated account is signed in".into() })?;
		let request = SilentRequest { account, scopes: self.scopes.clone(), force_refresh };
		let token = self.capability.acquire_token_silently(request).await?;
		let mut builder = TokenRecord::builder(TokenSource::Federated).token(token.access_token);

		if let Some(expires_on) = token.expires_on {
			builder = builder.expires_at(expires_on);
		}

		Ok(builder.build()?)
	}
}
impl Debug for FederatedProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FederatedProvider")
			.field("scopes", &self.scopes)
			.field("account_hint", &self.account_hint)
			.finish()
	}
}
impl CredentialProvider for FederatedProvider {
	fn source(&self) -> TokenSource {
		TokenSource::Federated
	}

	fn acquire_silently(&self) -> ProviderFuture<'_> {
		Box::pin(self.acquire(false))
	}

	fn force_refresh(&self) -> ProviderFuture<'_> {
		Box::pin(self.acquire(true))
	}
}
