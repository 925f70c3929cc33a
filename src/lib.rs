//! Unified bearer-token lifecycle manager: one async API hands out valid tokens from either a
//! federated identity provider or the backend's own JWT login, with single-flight refresh,
//! background renewal, cross-handle invalidation, and live telemetry.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod manager;
pub mod obs;
pub mod provider;
pub mod recorder;
pub mod scheduler;
pub mod state;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and token fixtures for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

	/// Mints an unsigned JWT expiring `offset` from now.
	pub fn mint_jwt(offset: Duration) -> String {
		mint_jwt_at(OffsetDateTime::now_utc() + offset, serde_json::json!({ "sub": "user-1" }))
	}

	/// Mints an unsigned JWT expiring at `expires_at`, merging the `extra` claims object.
	pub fn mint_jwt_at(expires_at: OffsetDateTime, extra: serde_json::Value) -> String {
		let mut claims = match extra {
			serde_json::Value::Object(map) => map,
			_ => serde_json::Map::new(),
		};

		claims.insert("exp".into(), expires_at.unix_timestamp().into());

		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(serde_json::Value::Object(claims).to_string());

		format!("{header}.{payload}.signature")
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::{Arc, Weak},
		time::Duration as StdDuration,
	};

	pub use async_lock::OnceCell as AsyncOnceCell;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use manager::{AuthManager, LoginOutcome};
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
