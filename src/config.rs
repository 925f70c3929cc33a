//! Lifecycle configuration with environment presets and a validating builder.

// self
use crate::{_prelude::*, error::ConfigError};

/// Deployment flavor selecting default timings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
	/// Production timings.
	#[default]
	Production,
	/// Shorter windows that make refresh behavior observable during development.
	Development,
}
impl Environment {
	/// Default preemptive refresh buffer for the environment.
	pub const fn preemptive_buffer(self) -> Duration {
		match self {
			Environment::Production => Duration::minutes(15),
			Environment::Development => Duration::minutes(10),
		}
	}

	/// Default background refresh interval for the environment.
	pub const fn background_interval(self) -> Duration {
		match self {
			Environment::Production => Duration::minutes(2),
			Environment::Development => Duration::minutes(1),
		}
	}
}

/// Validated lifecycle settings consumed by the coordinator, scheduler, and providers.
#[derive(Clone, Debug)]
pub struct AuthConfig {
	/// Environment the defaults were derived from.
	pub environment: Environment,
	/// Window before expiry in which cached tokens are served but refreshed in the background.
	pub preemptive_buffer: Duration,
	/// Background scheduler period.
	pub background_interval: Duration,
	/// Enables the background scheduler.
	pub background_refresh: bool,
	/// Attempts per refresh for transport failures, and the consecutive no-session budget.
	pub max_retry_attempts: u32,
	/// Fixed delay between transport retries.
	pub retry_delay: Duration,
	/// Window in which consecutive no-session failures count against the budget.
	pub retry_window: Duration,
	/// Number of most recent error messages retained by the metrics recorder.
	pub error_log_capacity: usize,
	/// Well-known storage key of the persisted legacy token.
	pub legacy_storage_key: String,
	/// Scopes requested from the federated identity capability.
	pub scopes: Vec<String>,
	/// Preferred federated account username; the first known account is used otherwise.
	pub account_hint: Option<String>,
	/// Base URL of the application backend serving `/auth/login`.
	pub backend_url: Option<Url>,
}
impl AuthConfig {
	/// Default transport retry attempts and no-session budget.
	pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
	/// Default delay between transport retries.
	pub const DEFAULT_RETRY_DELAY: Duration = Duration::seconds(1);
	/// Default no-session budget window.
	pub const DEFAULT_RETRY_WINDOW: Duration = Duration::seconds(60);
	/// Default error log capacity.
	pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 10;
	/// Default storage key for the legacy token.
	pub const DEFAULT_LEGACY_STORAGE_KEY: &'static str = "token";

	/// Returns a builder seeded with the environment's defaults.
	pub fn builder(environment: Environment) -> AuthConfigBuilder {
		AuthConfigBuilder::new(environment)
	}

	/// Background interval converted for tokio timers.
	pub fn background_period(&self) -> StdDuration {
		to_std(self.background_interval)
	}

	/// Retry delay converted for tokio timers.
	pub fn retry_pause(&self) -> StdDuration {
		to_std(self.retry_delay)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		validate_non_negative("preemptive_buffer", self.preemptive_buffer)?;
		validate_positive("background_interval", self.background_interval)?;
		validate_non_negative("retry_delay", self.retry_delay)?;
		validate_positive("retry_window", self.retry_window)?;

		if self.max_retry_attempts == 0 {
			return Err(ConfigError::ZeroRetryAttempts);
		}
		if self.error_log_capacity == 0 {
			return Err(ConfigError::ZeroErrorLogCapacity);
		}
		if self.legacy_storage_key.trim().is_empty() {
			return Err(ConfigError::EmptyStorageKey);
		}

		Ok(())
	}
}
impl Default for AuthConfig {
	fn default() -> Self {
		AuthConfigBuilder::new(Environment::default()).into_config()
	}
}

/// Builder for [`AuthConfig`] values.
#[derive(Clone, Debug)]
pub struct AuthConfigBuilder {
	config: AuthConfig,
	backend_url: Option<String>,
}
impl AuthConfigBuilder {
	/// Creates a builder seeded with the environment's defaults.
	pub fn new(environment: Environment) -> Self {
		Self {
			config: AuthConfig {
				environment,
				preemptive_buffer: environment.preemptive_buffer(),
				background_interval: environment.background_interval(),
				background_refresh: true,
				max_retry_attempts: AuthConfig::DEFAULT_MAX_RETRY_ATTEMPTS,
				retry_delay: AuthConfig::DEFAULT_RETRY_DELAY,
				retry_window: AuthConfig::DEFAULT_RETRY_WINDOW,
				error_log_capacity: AuthConfig::DEFAULT_ERROR_LOG_CAPACITY,
				legacy_storage_key: AuthConfig::DEFAULT_LEGACY_STORAGE_KEY.into(),
				scopes: vec!["User.Read".into()],
				account_hint: None,
				backend_url: None,
			},
			backend_url: None,
		}
	}

	/// Overrides the preemptive refresh buffer.
	pub fn preemptive_buffer(mut self, buffer: Duration) -> Self {
		self.config.preemptive_buffer = buffer;

		self
	}

	/// Overrides the background scheduler period.
	pub fn background_interval(mut self, interval: Duration) -> Self {
		self.config.background_interval = interval;

		self
	}

	/// Enables or disables the background scheduler.
	pub fn background_refresh(mut self, enabled: bool) -> Self {
		self.config.background_refresh = enabled;

		self
	}

	/// Overrides the retry attempts and no-session budget.
	pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
		self.config.max_retry_attempts = attempts;

		self
	}

	/// Overrides the fixed delay between transport retries.
	pub fn retry_delay(mut self, delay: Duration) -> Self {
		self.config.retry_delay = delay;

		self
	}

	/// Overrides the no-session budget window.
	pub fn retry_window(mut self, window: Duration) -> Self {
		self.config.retry_window = window;

		self
	}

	/// Overrides the error log capacity.
	pub fn error_log_capacity(mut self, capacity: usize) -> Self {
		self.config.error_log_capacity = capacity;

		self
	}

	/// Overrides the legacy token storage key.
	pub fn legacy_storage_key(mut self, key: impl Into<String>) -> Self {
		self.config.legacy_storage_key = key.into();

		self
	}

	/// Replaces the federated scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.config.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Prefers the federated account with this username.
	pub fn account_hint(mut self, username: impl Into<String>) -> Self {
		self.config.account_hint = Some(username.into());

		self
	}

	/// Sets the backend base URL; parsed during [`build`](Self::build).
	pub fn backend_url(mut self, url: impl Into<String>) -> Self {
		self.backend_url = Some(url.into());

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<AuthConfig, ConfigError> {
		let mut config = self.config;

		if let Some(raw) = self.backend_url {
			config.backend_url = Some(parse_backend_url(&raw)?);
		}

		config.validate()?;

		Ok(config)
	}

	fn into_config(self) -> AuthConfig {
		self.config
	}
}

/// Parses a backend base URL, forcing a trailing slash so relative joins keep its path.
pub(crate) fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
	let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidBackendUrl { source })?;

	if url.cannot_be_a_base() {
		return Err(ConfigError::CannotBeABase { url: url.to_string() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}

fn to_std(duration: Duration) -> StdDuration {
	StdDuration::try_from(duration).unwrap_or(StdDuration::ZERO)
}

fn validate_positive(field: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_positive() { Ok(()) } else { Err(ConfigError::NonPositiveDuration { field }) }
}

fn validate_non_negative(field: &'static str, value: Duration) -> Result<(), ConfigError> {
	if value.is_negative() { Err(ConfigError::NegativeDuration { field }) } else { Ok(()) }
}
