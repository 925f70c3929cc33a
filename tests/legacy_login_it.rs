#![cfg(feature = "reqwest")]

mod common;

// std
use std::sync::Arc;
// crates.io
use auth_lifecycle::{
	AuthManager,
	config::{AuthConfig, Environment},
	state::{AuthMethod, AuthPhase},
	store::{MemoryStore, SessionStore},
};
use httpmock::prelude::*;
use time::Duration;
// self
use common::{Behavior, StubCapability};

fn build_manager(server: &MockServer, store: Arc<MemoryStore>) -> AuthManager {
	let config = AuthConfig::builder(Environment::Production)
		.background_refresh(false)
		.retry_delay(Duration::ZERO)
		.backend_url(server.base_url())
		.build()
		.expect("Test configuration should validate.");

	AuthManager::with_reqwest(config, StubCapability::new(Behavior::InteractionRequired), store)
		.expect("Manager should build with a reqwest transport.")
}

#[tokio::test]
async fn legacy_login_installs_token_and_serves_it_from_cache() {
	let server = MockServer::start_async().await;
	let token = common::mint_jwt(Duration::hours(1));
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "email": "a@b.com", "password": "x" }));
			then.status(200).header("content-type", "application/json").json_body(serde_json::json!({
				"status": 200,
				"message": "Login successful",
				"access_token": token,
				"token_type": "bearer",
			}));
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let manager = build_manager(&server, store.clone());

	assert_eq!(manager.initialize().await.phase, AuthPhase::Unauthenticated);

	let mut states = manager.subscribe_state();
	let outcome = manager.login_legacy("  A@B.com ", "x").await;

	mock.assert_async().await;

	assert!(outcome.success, "Login should succeed: {:?}", outcome.error);
	assert!(outcome.error.is_none());
	assert!(states.has_changed().expect("State sender should be alive."));

	let state = states.borrow_and_update().clone();

	assert_eq!(state.phase, AuthPhase::Authenticated);
	assert_eq!(state.method, AuthMethod::Legacy);
	assert_eq!(store.load("token").expect("Load should succeed.").as_deref(), Some(token.as_str()));

	let served = manager.get_token().await.expect("Installed token should be served.");

	assert_eq!(served.expose(), token);

	let metrics = manager.metrics();

	assert_eq!(metrics.cache_hits, 1);
	assert_eq!(metrics.cache_misses, 0);
}

#[tokio::test]
async fn in_body_rejection_fails_the_login() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200).header("content-type", "application/json").json_body(serde_json::json!({
				"status": 401,
				"message": "Incorrect email or password",
			}));
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let manager = build_manager(&server, store.clone());
	let outcome = manager.login_legacy("a@b.com", "wrong").await;

	mock.assert_calls_async(1).await;

	assert!(!outcome.success);
	assert!(outcome.error.as_deref().is_some_and(|error| error.contains("Incorrect email or password")));
	assert_eq!(manager.state().phase, AuthPhase::Unauthenticated);
	assert_eq!(manager.metrics().error_count, 1);
	assert!(store.is_empty());
}

#[tokio::test]
async fn missing_credentials_never_reach_the_backend() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(500);
		})
		.await;
	let manager = build_manager(&server, Arc::new(MemoryStore::default()));
	let outcome = manager.login_legacy("   ", "x").await;

	mock.assert_calls_async(0).await;

	assert!(!outcome.success);
	assert!(outcome.error.as_deref().is_some_and(|error| error.contains("required")));
}

#[tokio::test]
async fn logout_clears_everything_and_notifies_the_backend() {
	let server = MockServer::start_async().await;
	let token = common::mint_jwt(Duration::hours(1));
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "access_token": token, "token_type": "bearer" }));
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/logout").header("authorization", format!("Bearer {token}"));
			then.status(200);
		})
		.await;
	let store = Arc::new(MemoryStore::default());
	let manager = build_manager(&server, store.clone());

	assert!(manager.login_legacy("a@b.com", "x").await.success);

	manager.get_token().await.expect("Installed token should be served.");
	manager.logout().await.expect("Logout should succeed.");

	login.assert_calls_async(1).await;
	logout.assert_calls_async(1).await;

	let metrics = manager.metrics();

	assert_eq!(metrics.cache_hits, 0);
	assert_eq!(metrics.cache_size, 0);
	assert!(store.is_empty());
	assert_eq!(manager.state().phase, AuthPhase::Unauthenticated);
	assert_eq!(manager.state().method, AuthMethod::None);
}

#[tokio::test]
async fn backend_outage_on_login_leaves_the_user_signed_out() {
	let server = MockServer::start_async().await;
	let mut outage = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(503).json_body(serde_json::json!({ "detail": "Service unavailable" }));
		})
		.await;
	let manager = build_manager(&server, Arc::new(MemoryStore::default()));
	let outcome = manager.login_legacy("a@b.com", "x").await;

	assert!(!outcome.success);

	let state = manager.state();

	assert_eq!(
		state.phase,
		AuthPhase::Unauthenticated,
		"Only an authenticated session can fail into the error phase."
	);
	assert!(state.last_error.as_deref().is_some_and(|error| error.contains("unavailable")));

	outage.delete_async().await;

	let token = common::mint_jwt(Duration::hours(1));
	let recovered = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(200).json_body(serde_json::json!({ "access_token": token }));
		})
		.await;

	assert!(manager.login_legacy("a@b.com", "x").await.success);

	recovered.assert_async().await;

	assert_eq!(manager.state().phase, AuthPhase::Authenticated);
}
