//! Credential providers able to produce a [`TokenRecord`] without user interaction.
//!
//! `federated` wraps the identity provider's silent acquisition capability; `legacy` re-reads
//! the JWT the backend issued at login from the shared [`SessionStore`](crate::store::SessionStore).
//! The coordinator picks one by the cached record's [`TokenSource`], trying federated before
//! legacy when nothing is cached.

pub mod federated;
pub mod legacy;

pub use federated::*;
pub use legacy::*;

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSource},
};

/// Boxed future returned by [`CredentialProvider`] implementations.
pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenRecord>> + 'a + Send>>;

/// Silent token acquisition contract shared by both providers.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Provider identity used for record provenance and error labels.
	fn source(&self) -> TokenSource;

	/// Returns a usable token, reusing whatever the provider already holds.
	fn acquire_silently(&self) -> ProviderFuture<'_>;

	/// Returns a token while bypassing provider-side caches where that is possible.
	fn force_refresh(&self) -> ProviderFuture<'_>;
}
