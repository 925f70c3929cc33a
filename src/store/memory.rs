//! Thread-safe in-memory [`SessionStore`] whose handles behave like tabs of one origin.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	store::{
		self, HandleId, InvalidationCallback, Listeners, SessionStore, StorageEvent, StoreError,
		Subscription,
	},
};

#[derive(Default)]
struct Shared {
	values: RwLock<HashMap<String, String>>,
	listeners: Arc<Mutex<Listeners>>,
	next_handle: AtomicU64,
}

/// In-process storage for tests and single-process embedders.
///
/// Clones share the same handle. [`sibling`](MemoryStore::sibling) opens another handle on the
/// same values; writes through one handle notify the subscribers of every other handle.
#[derive(Clone)]
pub struct MemoryStore {
	shared: Arc<Shared>,
	handle: HandleId,
}
impl MemoryStore {
	/// Opens a handle on the same backing values with its own listener identity.
	pub fn sibling(&self) -> Self {
		let handle = self.shared.next_handle.fetch_add(1, Ordering::Relaxed) + 1;

		Self { shared: self.shared.clone(), handle }
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.shared.values.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn write(&self, key: &str, value: Option<&str>) -> Option<String> {
		let old_value = {
			let mut values = self.shared.values.write();

			match value {
				Some(value) => values.insert(key.to_owned(), value.to_owned()),
				None => values.remove(key),
			}
		};

		if old_value.as_deref() != value {
			let event = StorageEvent {
				key: key.to_owned(),
				old_value: old_value.clone(),
				new_value: value.map(ToOwned::to_owned),
			};
			let audience = self.shared.listeners.lock().audience(Some(self.handle));

			store::dispatch(audience, &event);
		}

		old_value
	}
}
impl Default for MemoryStore {
	fn default() -> Self {
		Self { shared: Arc::new(Shared::default()), handle: 0 }
	}
}
impl Debug for MemoryStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryStore").field("handle", &self.handle).field("keys", &self.len()).finish()
	}
}
impl SessionStore for MemoryStore {
	fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.shared.values.read().get(key).cloned())
	}

	fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.write(key, Some(value));

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<bool, StoreError> {
		Ok(self.write(key, None).is_some())
	}

	fn on_external_invalidate(&self, callback: InvalidationCallback) -> Subscription {
		store::subscribe(&self.shared.listeners, self.handle, callback)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn recorder() -> (Arc<Mutex<Vec<StorageEvent>>>, InvalidationCallback) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();

		(seen, Arc::new(move |event: &StorageEvent| sink.lock().push(event.clone())))
	}

	#[test]
	fn siblings_share_values_and_notify_each_other() {
		let tab_a = MemoryStore::default();
		let tab_b = tab_a.sibling();
		let (seen_a, callback_a) = recorder();
		let (seen_b, callback_b) = recorder();
		let _sub_a = tab_a.on_external_invalidate(callback_a);
		let _sub_b = tab_b.on_external_invalidate(callback_b);

		tab_a.save("token", "jwt-1").expect("Saving into the memory store should succeed.");

		assert_eq!(tab_b.load("token").expect("Load should succeed.").as_deref(), Some("jwt-1"));
		assert!(seen_a.lock().is_empty(), "The writing tab must not hear its own change.");
		assert_eq!(
			seen_b.lock().as_slice(),
			&[StorageEvent { key: "token".into(), old_value: None, new_value: Some("jwt-1".into()) }]
		);

		assert!(tab_b.remove("token").expect("Remove should succeed."));
		assert!(!tab_b.remove("token").expect("Second remove should succeed."));
		assert_eq!(seen_a.lock().len(), 1);
		assert!(seen_a.lock()[0].is_removal());
		assert!(tab_a.is_empty());
	}

	#[test]
	fn unchanged_writes_and_dropped_subscriptions_stay_silent() {
		let tab_a = MemoryStore::default();
		let tab_b = tab_a.sibling();
		let (seen_b, callback_b) = recorder();
		let sub_b = tab_b.on_external_invalidate(callback_b);

		tab_a.save("token", "jwt-1").expect("Save should succeed.");
		tab_a.save("token", "jwt-1").expect("Repeated save should succeed.");

		assert_eq!(seen_b.lock().len(), 1);

		drop(sub_b);
		tab_a.save("token", "jwt-2").expect("Save should succeed.");

		assert_eq!(seen_b.lock().len(), 1);
	}
}
