//! Immutable token records, provenance tags, and builders.

// self
use crate::{
	_prelude::*,
	auth::{
		token::secret::TokenSecret,
		validator::{self, Identity},
	},
};

/// Identity mechanism that issued a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
	/// External identity provider (silent/interactive flows).
	Federated,
	/// The application's own username/password-issued JWT.
	Legacy,
}
impl TokenSource {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			TokenSource::Federated => "federated",
			TokenSource::Legacy => "legacy",
		}
	}
}
impl Display for TokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no token value was provided.
	#[error("Token value is required.")]
	MissingToken,
	/// Issued when the token carries no usable `exp` claim and no fallback expiry was supplied.
	#[error("Token has no usable expiry: {reason}.")]
	MissingExpiry {
		/// Decoder-supplied reason string.
		reason: String,
	},
}
impl From<TokenRecordBuilderError> for Error {
	fn from(e: TokenRecordBuilderError) -> Self {
		Error::Malformed { reason: e.to_string() }
	}
}

/// Cached bearer credential together with its provenance and expiry.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Bearer credential; callers must avoid logging it.
	pub token: TokenSecret,
	/// Expiry derived once when the record was built.
	pub expires_at: OffsetDateTime,
	/// Provider that issued the token.
	pub source: TokenSource,
	/// Instant the record was acquired.
	pub acquired_at: OffsetDateTime,
	/// Identity claims decoded alongside the expiry.
	pub identity: Identity,
}
impl TokenRecord {
	/// Returns a builder for records issued by `source`.
	pub fn builder(source: TokenSource) -> TokenRecordBuilder {
		TokenRecordBuilder::new(source)
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the record is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Remaining lifetime at `instant`; negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("token", &format_args!("<redacted:{}>", self.token.fingerprint()))
			.field("expires_at", &self.expires_at)
			.field("source", &self.source)
			.field("acquired_at", &self.acquired_at)
			.field("identity", &self.identity)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
///
/// The expiry comes from the token's `exp` claim whenever it can be decoded; the explicit
/// [`expires_at`](TokenRecordBuilder::expires_at) value is only a fallback for opaque tokens.
#[derive(Clone, Debug)]
pub struct TokenRecordBuilder {
	source: TokenSource,
	token: Option<TokenSecret>,
	acquired_at: Option<OffsetDateTime>,
	fallback_expiry: Option<OffsetDateTime>,
}
impl TokenRecordBuilder {
	fn new(source: TokenSource) -> Self {
		Self { source, token: None, acquired_at: None, fallback_expiry: None }
	}

	/// Provides the bearer token value.
	pub fn token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the acquisition instant (defaults to the current clock).
	pub fn acquired_at(mut self, instant: OffsetDateTime) -> Self {
		self.acquired_at = Some(instant);

		self
	}

	/// Supplies an expiry to use when the token carries no decodable `exp` claim.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.fallback_expiry = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let token = self.token.ok_or(TokenRecordBuilderError::MissingToken)?;
		let acquired_at = self.acquired_at.unwrap_or_else(OffsetDateTime::now_utc);
		let (expires_at, identity) = match validator::decode_claims(token.expose()) {
			Ok(claims) => (claims.expires_at, claims.identity),
			Err(e) => match self.fallback_expiry {
				Some(instant) => (instant, Identity::default()),
				None => return Err(TokenRecordBuilderError::MissingExpiry { reason: e.to_string() }),
			},
		};

		Ok(TokenRecord { token, expires_at, source: self.source, acquired_at, identity })
	}
}
