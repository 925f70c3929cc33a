//! Transport primitives for the backend's legacy login and logout endpoints.
//!
//! The module exposes [`LoginTransport`] so embedders can plug any HTTP stack in front of
//! `POST /auth/login` and `POST /auth/logout`. The `reqwest` feature ships
//! [`ReqwestLoginClient`], which classifies responses with [`parse_login_response`]: the backend
//! may answer HTTP 200 while carrying a failure `status` in the body, and that in-body status wins.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::{
	header::{ACCEPT, CONTENT_TYPE},
	redirect::Policy,
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, TokenSource},
};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`LoginTransport`] implementations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Abstraction over HTTP transports able to reach the backend's auth endpoints.
pub trait LoginTransport
where
	Self: 'static + Send + Sync,
{
	/// Exchanges credentials for an access token.
	fn login(&self, request: LoginRequest) -> TransportFuture<'_, LoginResponse>;

	/// Notifies the backend that `token` is being discarded.
	fn logout(&self, token: TokenSecret) -> TransportFuture<'_, ()>;
}

/// Credentials submitted to `POST /auth/login`.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
	email: String,
	password: String,
}
impl LoginRequest {
	/// Normalizes the email (trimmed, lowercased) and rejects missing fields locally.
	pub fn new(email: &str, password: impl Into<String>) -> Result<Self> {
		let email = email.trim().to_lowercase();
		let password = password.into();

		if email.is_empty() || password.is_empty() {
			return Err(Error::LoginRejected {
				status: Some(400),
				message: "Email and password are required".into(),
			});
		}

		Ok(Self { email, password })
	}

	/// Normalized email address.
	pub fn email(&self) -> &str {
		&self.email
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Successful login payload.
#[derive(Clone, Deserialize)]
pub struct LoginResponse {
	/// Issued JWT.
	pub access_token: String,
	/// Token type reported by the backend, usually `bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl Debug for LoginResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginResponse")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.finish()
	}
}

#[derive(Debug, Default, Deserialize)]
struct StatusEnvelope {
	#[serde(default)]
	status: Option<u16>,
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	detail: Option<serde_json::Value>,
}
impl StatusEnvelope {
	fn message(self, status: u16) -> String {
		self.message
			.or_else(|| {
				self.detail.map(|detail| match detail {
					serde_json::Value::String(text) => text,
					other => other.to_string(),
				})
			})
			.unwrap_or_else(|| format!("Backend answered with status {status}"))
	}
}

/// Classifies a login response by HTTP status and any in-body `status` field.
///
/// 5xx statuses become [`Error::ProviderUnavailable`], other non-2xx statuses
/// [`Error::LoginRejected`]; 2xx bodies must carry an `access_token`.
pub fn parse_login_response(http_status: u16, body: &[u8]) -> Result<LoginResponse> {
	let envelope = serde_json::from_slice::<StatusEnvelope>(body).unwrap_or_default();
	let status = match envelope.status {
		Some(in_body) if (200..300).contains(&http_status) => in_body,
		_ => http_status,
	};

	if (200..300).contains(&status) {
		let mut deserializer = serde_json::Deserializer::from_slice(body);

		return serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			Error::ProviderUnavailable {
				provider: TokenSource::Legacy,
				message: format!("login response is malformed at `{}`: {}", e.path(), e.inner()),
				status: Some(status),
			}
		});
	}

	let message = envelope.message(status);

	if status >= 500 {
		Err(Error::ProviderUnavailable { provider: TokenSource::Legacy, message, status: Some(status) })
	} else {
		Err(Error::LoginRejected { status: Some(status), message })
	}
}

/// reqwest-backed [`LoginTransport`] rooted at the backend base URL.
///
/// Redirects are not followed; the login endpoint answers directly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestLoginClient {
	client: ReqwestClient,
	login_url: Url,
	logout_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestLoginClient {
	/// Builds a client with redirect following disabled.
	pub fn new(backend_url: &Url) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Self::with_client(client, backend_url)
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient, backend_url: &Url) -> Result<Self, ConfigError> {
		let base = crate::config::parse_backend_url(backend_url.as_str())?;
		let login_url =
			base.join("auth/login").map_err(|source| ConfigError::InvalidBackendUrl { source })?;
		let logout_url =
			base.join("auth/logout").map_err(|source| ConfigError::InvalidBackendUrl { source })?;

		Ok(Self { client, login_url, logout_url })
	}

	/// Resolved login endpoint.
	pub fn login_url(&self) -> &Url {
		&self.login_url
	}

	fn unavailable(e: ReqwestError) -> Error {
		Error::ProviderUnavailable {
			provider: TokenSource::Legacy,
			message: e.to_string(),
			status: e.status().map(|status| status.as_u16()),
		}
	}
}
#[cfg(feature = "reqwest")]
impl LoginTransport for ReqwestLoginClient {
	fn login(&self, request: LoginRequest) -> TransportFuture<'_, LoginResponse> {
		Box::pin(async move {
			let body = serde_json::to_vec(&request).map_err(|e| Error::LoginRejected {
				status: None,
				message: format!("Credentials could not be encoded: {e}"),
			})?;
			let response = self
				.client
				.post(self.login_url.clone())
				.header(CONTENT_TYPE, "application/json")
				.header(ACCEPT, "application/json")
				.body(body)
				.send()
				.await
				.map_err(Self::unavailable)?;
			let status = response.status().as_u16();
			let bytes = response.bytes().await.map_err(Self::unavailable)?;

			parse_login_response(status, &bytes)
		})
	}

	fn logout(&self, token: TokenSecret) -> TransportFuture<'_, ()> {
		Box::pin(async move {
			let response = self
				.client
				.post(self.logout_url.clone())
				.bearer_auth(token.expose())
				.send()
				.await
				.map_err(Self::unavailable)?;

			tracing::debug!(status = response.status().as_u16(), "Backend acknowledged logout.");

			Ok(())
		})
	}
}
