mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use auth_lifecycle::{
	AuthManager,
	state::{AuthMethod, AuthPhase, AuthState},
	store::{MemoryStore, SessionStore, StorageEvent},
};
use time::Duration;
use tokio::sync::watch;
// self
use common::{Behavior, StubCapability};

fn tab(store: MemoryStore) -> Arc<AuthManager> {
	common::manager(
		common::config(),
		StubCapability::new(Behavior::InteractionRequired),
		Arc::new(store),
		None,
	)
}

async fn wait_for_phase(states: &mut watch::Receiver<AuthState>, phase: AuthPhase) -> AuthState {
	tokio::time::timeout(StdDuration::from_secs(5), states.wait_for(|state| state.phase == phase))
		.await
		.expect("Phase change should arrive in time.")
		.expect("State sender should be alive.")
		.clone()
}

#[tokio::test]
async fn login_in_one_tab_authenticates_the_other() {
	let store_a = MemoryStore::default();
	let store_b = store_a.sibling();
	let tab_a = tab(store_a.clone());
	let tab_b = tab(store_b);

	assert_eq!(tab_b.initialize().await.phase, AuthPhase::Unauthenticated);

	let mut states = tab_b.subscribe_state();
	let token = common::mint_jwt(Duration::hours(1));

	store_a.save("token", &token).expect("Saving should succeed.");

	let state = wait_for_phase(&mut states, AuthPhase::Authenticated).await;

	assert_eq!(state.method, AuthMethod::Legacy);
	assert_eq!(tab_b.get_token().await.expect("Shared token should be served.").expose(), token);
	assert_eq!(tab_a.state().phase, AuthPhase::Pending, "Writers do not hear their own changes.");
	assert!(!tab_a.coordinator().is_refreshing());
}

#[tokio::test]
async fn logout_in_one_tab_signs_the_other_out() {
	let store_a = MemoryStore::default();
	let store_b = store_a.sibling();
	let tab_a = tab(store_a.clone());
	let tab_b = tab(store_b);

	store_a.save("token", &common::mint_jwt(Duration::hours(1))).expect("Saving should succeed.");

	tab_a.get_token().await.expect("Tab A should read the stored token.");
	tab_b.get_token().await.expect("Tab B should read the stored token.");

	assert_eq!(tab_b.state().phase, AuthPhase::Authenticated);

	let mut states = tab_b.subscribe_state();

	tab_a.logout().await.expect("Logout should succeed.");

	let state = wait_for_phase(&mut states, AuthPhase::Unauthenticated).await;

	assert_eq!(state.method, AuthMethod::None);
	assert_eq!(tab_b.metrics().cache_size, 0);
	assert!(tab_b.get_token().await.is_err());
}

#[tokio::test]
async fn unrelated_keys_are_ignored() {
	let store_a = MemoryStore::default();
	let store_b = store_a.sibling();
	let tab_b = tab(store_b);

	store_a.save("token", &common::mint_jwt(Duration::hours(1))).expect("Saving should succeed.");
	common::settle(&tab_b).await;
	tab_b.get_token().await.expect("Stored token should be served.");

	let generation = tab_b.coordinator().generation();
	let event = StorageEvent { key: "theme".into(), old_value: None, new_value: Some("dark".into()) };

	assert!(!tab_b.handle_storage_event(&event));

	store_a.save("theme", "light").expect("Saving should succeed.");

	assert_eq!(tab_b.coordinator().generation(), generation);
	assert_eq!(tab_b.state().phase, AuthPhase::Authenticated);
	assert_eq!(tab_b.metrics().cache_size, 1);
}

#[tokio::test]
async fn dropped_manager_stops_listening() {
	let store_a = MemoryStore::default();
	let store_b = store_a.sibling();
	let tab_b = tab(store_b.clone());
	let weak = Arc::downgrade(&tab_b);

	drop(tab_b);

	assert!(weak.upgrade().is_none());

	store_a.save("token", &common::mint_jwt(Duration::hours(1))).expect("Saving should succeed.");

	assert!(store_b.load("token").expect("Load should succeed.").is_some());
}
