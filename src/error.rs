//! Error taxonomy shared by providers, the refresh coordinator, and the public facade.

// self
use crate::{_prelude::*, auth::TokenSource};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
///
/// Every variant is cheap to clone so a single refresh outcome can be handed to all callers that
/// joined the same in-flight refresh.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Token could not be decoded; treated as a cache miss.
	#[error("Token is malformed: {reason}.")]
	Malformed {
		/// Decoder-supplied reason string.
		reason: String,
	},
	/// Provider has nothing it can hand out without user interaction.
	#[error("No session is available for silent acquisition: {reason}.")]
	NoSession {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Token expired and the issuing provider has no refresh path.
	#[error("Token refresh was denied: {reason}.")]
	RefreshDenied {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Network or transport failure while talking to a provider.
	#[error("The {provider} provider is unavailable: {message}.")]
	ProviderUnavailable {
		/// Provider that failed.
		provider: TokenSource,
		/// Transport- or provider-supplied message.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Backend refused the submitted credentials.
	#[error("Login was rejected: {message}.")]
	LoginRejected {
		/// HTTP or in-body status code, when available.
		status: Option<u16>,
		/// Backend-supplied message.
		message: String,
	},
	/// Provider kept reporting missing sessions; auto-retry stopped.
	#[error("Stopped retrying after {attempts} consecutive session failures.")]
	RetryBudgetExhausted {
		/// Number of consecutive failures observed inside the retry window.
		attempts: u32,
	},
	/// Refresh refused because the session is in the error phase.
	#[error("Authentication is in an error state ({reason}); an explicit re-login is required.")]
	ReloginRequired {
		/// Rendered cause of the error phase.
		reason: String,
	},
	/// Session was cleared while the refresh was in flight.
	#[error("Session was cleared while the refresh was in flight.")]
	SessionCleared,
	/// No provider could produce a token.
	#[error("No credential provider could produce a token.")]
	Unauthenticated {
		/// Classified failure that ended the attempt.
		#[source]
		cause: Box<Error>,
	},
}
impl Error {
	/// Wraps a classified failure into the error returned to token callers.
	pub fn unauthenticated(cause: Error) -> Self {
		match cause {
			Self::Unauthenticated { .. } => cause,
			cause => Self::Unauthenticated { cause: Box::new(cause) },
		}
	}

	/// Returns `true` for failures worth retrying inside a single refresh.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::ProviderUnavailable { .. })
	}

	/// Returns `true` for failures a user resolves by logging in again.
	pub fn requires_login(&self) -> bool {
		match self {
			Self::Malformed { .. }
			| Self::NoSession { .. }
			| Self::RefreshDenied { .. }
			| Self::LoginRejected { .. }
			| Self::SessionCleared => true,
			Self::Unauthenticated { cause } => cause.requires_login(),
			_ => false,
		}
	}

	/// Returns the innermost classified failure.
	pub fn root_cause(&self) -> &Error {
		match self {
			Self::Unauthenticated { cause } => cause.root_cause(),
			other => other,
		}
	}
}

/// Configuration and validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Transport builder message.
		message: String,
	},
	/// Backend base URL cannot be parsed or joined.
	#[error("Backend URL is invalid.")]
	InvalidBackendUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Legacy login needs a backend but none was configured.
	#[error("No backend URL is configured for legacy login.")]
	MissingBackendUrl,
	/// Refreshes need a tokio runtime to run on.
	#[error("No tokio runtime is available to run the refresh.")]
	NoRuntime,
	/// Backend base URL cannot carry a path.
	#[error("Backend URL `{url}` cannot be used as a base URL.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// A duration setting must be strictly positive.
	#[error("The {field} setting must be positive.")]
	NonPositiveDuration {
		/// Setting name.
		field: &'static str,
	},
	/// A duration setting must not be negative.
	#[error("The {field} setting must not be negative.")]
	NegativeDuration {
		/// Setting name.
		field: &'static str,
	},
	/// Retry budget must allow at least one attempt.
	#[error("The max_retry_attempts setting must be at least 1.")]
	ZeroRetryAttempts,
	/// Error log must retain at least one entry.
	#[error("The error_log_capacity setting must be at least 1.")]
	ZeroErrorLogCapacity,
	/// Legacy storage key must be a non-empty string.
	#[error("The legacy storage key cannot be empty.")]
	EmptyStorageKey,
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::HttpClientBuild { message: e.to_string() }
	}
}
