mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use auth_lifecycle::{
	config::{AuthConfig, Environment},
	state::AuthPhase,
	store::MemoryStore,
};
use time::Duration;
// self
use common::{Behavior, StubCapability};

fn config() -> AuthConfig {
	AuthConfig::builder(Environment::Development)
		.background_interval(Duration::seconds(30))
		.retry_delay(Duration::ZERO)
		.build()
		.expect("Test configuration should validate.")
}

#[tokio::test(start_paused = true)]
async fn authenticated_sessions_renew_in_the_background() {
	let capability = StubCapability::new(Behavior::Token(Duration::hours(1)));
	let manager =
		common::manager(config(), capability.clone(), Arc::new(MemoryStore::default()), None);

	assert!(!manager.coordinator().scheduler().is_running());

	manager.get_token().await.expect("Initial acquisition should succeed.");

	assert!(manager.coordinator().scheduler().is_running());

	tokio::time::sleep(StdDuration::from_secs(31)).await;
	common::settle(&manager).await;

	let metrics = manager.metrics();

	assert_eq!(capability.calls(), 2);
	assert_eq!(capability.forced_calls(), 0, "Valid tokens are renewed without forcing.");
	assert_eq!(metrics.background_refresh_count, 1);
	assert_eq!(metrics.token_refresh_count, 2);
	assert_eq!(manager.state().phase, AuthPhase::Authenticated);

	assert!(manager.clear_cache());
	assert!(!manager.coordinator().scheduler().is_running());

	tokio::time::sleep(StdDuration::from_secs(300)).await;

	assert_eq!(capability.calls(), 2, "No ticks may run after the session was cleared.");
}

#[tokio::test(start_paused = true)]
async fn failed_background_refresh_stops_the_scheduler() {
	let capability = StubCapability::new(Behavior::Token(Duration::hours(1)));
	let manager =
		common::manager(config(), capability.clone(), Arc::new(MemoryStore::default()), None);

	manager.get_token().await.expect("Initial acquisition should succeed.");
	capability.set_default(Behavior::Network);

	tokio::time::sleep(StdDuration::from_secs(31)).await;
	common::settle(&manager).await;

	assert_eq!(capability.calls(), 4, "One tick retries the outage up to the attempt limit.");
	assert_eq!(manager.state().phase, AuthPhase::Error);
	assert!(!manager.coordinator().scheduler().is_running());
	assert_eq!(manager.metrics().cache_size, 1, "Transient failures keep the cached token.");
}

#[tokio::test]
async fn disabled_background_refresh_never_schedules() {
	let capability = StubCapability::new(Behavior::Token(Duration::hours(1)));
	let manager = common::manager(
		common::config(),
		capability.clone(),
		Arc::new(MemoryStore::default()),
		None,
	);

	manager.get_token().await.expect("Initial acquisition should succeed.");

	assert!(!manager.coordinator().scheduler().is_running());
	assert!(manager.coordinator().background_refresh(), "Manual ticks still run.");
	assert!(!manager.coordinator().background_refresh(), "A tick never joins a running refresh.");

	common::settle(&manager).await;

	assert_eq!(manager.metrics().background_refresh_count, 1);
	assert_eq!(capability.calls(), 2);
}
