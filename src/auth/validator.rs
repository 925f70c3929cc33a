//! Stateless bearer token decoding and freshness classification.
//!
//! The validator never verifies signatures; tokens are issued and verified elsewhere. It only
//! reads the payload segment so expiry and identity claims can drive cache decisions. Every entry
//! point accepts arbitrary input (truncated, hand-edited, or expired tokens pulled from storage)
//! and reports problems as [`TokenValidity::Malformed`] or [`ClaimsError`] instead of panicking.

// crates.io
use base64::{
	Engine,
	alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde_json::Value;
// self
use crate::_prelude::*;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new()
		.with_encode_padding(false)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Freshness classification for a bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenValidity {
	/// Token is usable and outside the preemptive window.
	Valid,
	/// Token is usable but expires within the preemptive window.
	ExpiringSoon,
	/// Token expiry is at or before the evaluation instant.
	Expired,
	/// Token could not be decoded.
	Malformed,
}
impl TokenValidity {
	/// Returns `true` when the token can still be handed to callers.
	pub const fn is_usable(self) -> bool {
		matches!(self, TokenValidity::Valid | TokenValidity::ExpiringSoon)
	}
}

/// Reasons a token payload could not be decoded.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClaimsError {
	/// Token does not have exactly three dot-separated segments.
	#[error("expected 3 segments, found {found}")]
	SegmentCount {
		/// Number of segments found.
		found: usize,
	},
	/// Payload segment is not valid base64url.
	#[error("payload is not valid base64url")]
	Base64,
	/// Payload is not a JSON claims object.
	#[error("payload is not a JSON claims object: {message}")]
	Json {
		/// Deserializer message including the failing path.
		message: String,
	},
	/// Payload has no numeric `exp` claim.
	#[error("payload has no exp claim")]
	MissingExpiry,
	/// `exp` lies outside the representable timestamp range.
	#[error("exp claim {exp} is out of range")]
	ExpiryOutOfRange {
		/// Raw claim value.
		exp: i64,
	},
}
impl From<ClaimsError> for Error {
	fn from(e: ClaimsError) -> Self {
		Error::Malformed { reason: e.to_string() }
	}
}

/// Identity claims carried by a bearer token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
	/// `sub` claim.
	pub subject: Option<String>,
	/// `email` claim.
	pub email: Option<String>,
	/// `name` claim.
	pub name: Option<String>,
	/// `preferred_username` claim (federated tokens).
	pub preferred_username: Option<String>,
	/// `oid` claim (federated object identifier).
	pub object_id: Option<String>,
	/// `tid` claim (federated tenant identifier).
	pub tenant_id: Option<String>,
	/// `roles` claim.
	pub roles: Vec<String>,
}
impl Identity {
	/// Best display handle: email, then preferred username, then subject.
	pub fn username(&self) -> Option<&str> {
		self.email.as_deref().or(self.preferred_username.as_deref()).or(self.subject.as_deref())
	}
}

/// Decoded token payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
	/// `exp` claim as an instant.
	pub expires_at: OffsetDateTime,
	/// `iat` claim, when present and in range.
	pub issued_at: Option<OffsetDateTime>,
	/// `nbf` claim, when present and in range.
	pub not_before: Option<OffsetDateTime>,
	/// Identity claims.
	pub identity: Identity,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
	Integer(i64),
	Float(f64),
}
impl NumericDate {
	fn seconds(&self) -> i64 {
		match *self {
			NumericDate::Integer(secs) => secs,
			// Saturating float-to-int cast; out-of-range values are rejected below.
			NumericDate::Float(secs) => secs.trunc() as i64,
		}
	}
}

// Only `exp` is typed; identity claims of unexpected shapes are dropped, never fatal.
#[derive(Deserialize)]
struct RawClaims {
	#[serde(default)]
	exp: Option<NumericDate>,
	#[serde(default)]
	iat: Option<Value>,
	#[serde(default)]
	nbf: Option<Value>,
	#[serde(default)]
	sub: Option<Value>,
	#[serde(default)]
	email: Option<Value>,
	#[serde(default)]
	name: Option<Value>,
	#[serde(default)]
	preferred_username: Option<Value>,
	#[serde(default)]
	oid: Option<Value>,
	#[serde(default)]
	tid: Option<Value>,
	#[serde(default)]
	roles: Option<Value>,
}

fn claim_text(value: Option<Value>) -> Option<String> {
	match value? {
		Value::String(text) => Some(text),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

// A lone string counts as a single role.
fn claim_list(value: Option<Value>) -> Vec<String> {
	match value {
		Some(Value::Array(items)) => items
			.into_iter()
			.filter_map(|item| match item {
				Value::String(text) => Some(text),
				_ => None,
			})
			.collect(),
		Some(Value::String(text)) => vec![text],
		_ => Vec::new(),
	}
}

fn claim_instant(value: Option<Value>) -> Option<OffsetDateTime> {
	let Value::Number(number) = value? else {
		return None;
	};
	// Saturating float-to-int cast; out-of-range values are rejected below.
	let seconds = number.as_i64().or_else(|| number.as_f64().map(|secs| secs.trunc() as i64))?;

	OffsetDateTime::from_unix_timestamp(seconds).ok()
}

/// Decodes the payload segment of a three-part token.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
	let segments: Vec<&str> = token.trim().split('.').collect();

	if segments.len() != 3 {
		return Err(ClaimsError::SegmentCount { found: segments.len() });
	}

	let payload = URL_SAFE_LENIENT.decode(segments[1]).map_err(|_| ClaimsError::Base64)?;
	let raw: RawClaims =
		serde_path_to_error::deserialize(&mut serde_json::Deserializer::from_slice(&payload))
			.map_err(|e| ClaimsError::Json { message: e.to_string() })?;
	let exp = raw.exp.as_ref().map(NumericDate::seconds).ok_or(ClaimsError::MissingExpiry)?;
	let expires_at = OffsetDateTime::from_unix_timestamp(exp)
		.map_err(|_| ClaimsError::ExpiryOutOfRange { exp })?;

	Ok(TokenClaims {
		expires_at,
		issued_at: claim_instant(raw.iat),
		not_before: claim_instant(raw.nbf),
		identity: Identity {
			subject: claim_text(raw.sub),
			email: claim_text(raw.email),
			name: claim_text(raw.name),
			preferred_username: claim_text(raw.preferred_username),
			object_id: claim_text(raw.oid),
			tenant_id: claim_text(raw.tid),
			roles: claim_list(raw.roles),
		},
	})
}

/// Classifies tokens against a preemptive refresh buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenValidator {
	preemptive_buffer: Duration,
}
impl TokenValidator {
	/// Default preemptive buffer (15 minutes).
	pub const DEFAULT_PREEMPTIVE_BUFFER: Duration = Duration::minutes(15);

	/// Creates a validator; negative buffers are clamped to zero.
	pub fn new(preemptive_buffer: Duration) -> Self {
		let preemptive_buffer =
			if preemptive_buffer.is_negative() { Duration::ZERO } else { preemptive_buffer };

		Self { preemptive_buffer }
	}

	/// Returns the configured preemptive buffer.
	pub fn preemptive_buffer(&self) -> Duration {
		self.preemptive_buffer
	}

	/// Decodes `token` and classifies it at `now`.
	pub fn classify(&self, token: &str, now: OffsetDateTime) -> TokenValidity {
		match decode_claims(token) {
			Ok(claims) => self.classify_expiry(claims.expires_at, now),
			Err(_) => TokenValidity::Malformed,
		}
	}

	/// Classifies an already-derived expiry instant at `now`.
	pub fn classify_expiry(&self, expires_at: OffsetDateTime, now: OffsetDateTime) -> TokenValidity {
		let remaining = expires_at - now;

		if !remaining.is_positive() {
			TokenValidity::Expired
		} else if remaining <= self.preemptive_buffer {
			TokenValidity::ExpiringSoon
		} else {
			TokenValidity::Valid
		}
	}
}
impl Default for TokenValidator {
	fn default() -> Self {
		Self::new(Self::DEFAULT_PREEMPTIVE_BUFFER)
	}
}
