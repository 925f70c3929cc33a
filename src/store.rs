//! Persistent session storage contracts, change notifications, and built-in stores.
//!
//! A [`SessionStore`] is the shared key/value medium the legacy token lives in. Several handles
//! may share one underlying storage (browser tabs of one origin, processes sharing a file); a
//! write through one handle is announced as a [`StorageEvent`] to subscribers registered on the
//! *other* handles, never to the writer's own subscribers.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Callback invoked for storage changes made by another handle.
pub type InvalidationCallback = Arc<dyn Fn(&StorageEvent) + Send + Sync>;

/// Key/value storage shared between handles.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Loads the value stored under `key`.
	fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Stores `value` under `key`.
	fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes `key`; returns `true` when a value was present.
	fn remove(&self, key: &str) -> Result<bool, StoreError>;

	/// Registers `callback` for changes made through other handles of the same storage.
	///
	/// Dropping the returned [`Subscription`] unregisters the callback.
	fn on_external_invalidate(&self, callback: InvalidationCallback) -> Subscription;
}

/// Change notification for one storage key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
	/// Key that changed.
	pub key: String,
	/// Value before the change.
	pub old_value: Option<String>,
	/// Value after the change; `None` when the key was removed.
	pub new_value: Option<String>,
}
impl StorageEvent {
	/// Returns `true` when the change removed the key.
	pub fn is_removal(&self) -> bool {
		self.new_value.is_none()
	}
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Registration guard returned by [`SessionStore::on_external_invalidate`].
#[must_use = "dropping the subscription unregisters the callback"]
pub struct Subscription(Option<Box<dyn FnOnce() + Send + Sync>>);
impl Subscription {
	/// Creates a guard running `cancel` on drop.
	pub fn new(cancel: impl 'static + FnOnce() + Send + Sync) -> Self {
		Self(Some(Box::new(cancel)))
	}

	/// Guard for stores that never emit events.
	pub fn detached() -> Self {
		Self(None)
	}

	/// Unregisters the callback now.
	pub fn cancel(mut self) {
		if let Some(cancel) = self.0.take() {
			cancel();
		}
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Subscription").field(&self.0.is_some()).finish()
	}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(cancel) = self.0.take() {
			cancel();
		}
	}
}

/// Identifier of one store handle.
pub(crate) type HandleId = u64;

/// Callback registry shared by the built-in stores.
#[derive(Default)]
pub(crate) struct Listeners {
	next_id: u64,
	entries: Vec<(u64, HandleId, InvalidationCallback)>,
}
impl Listeners {
	pub(crate) fn register(&mut self, handle: HandleId, callback: InvalidationCallback) -> u64 {
		let id = self.next_id;

		self.next_id += 1;
		self.entries.push((id, handle, callback));

		id
	}

	pub(crate) fn unregister(&mut self, id: u64) {
		self.entries.retain(|(entry, _, _)| *entry != id);
	}

	/// Callbacks that must hear about a change written through `writer`.
	pub(crate) fn audience(&self, writer: Option<HandleId>) -> Vec<InvalidationCallback> {
		self.entries
			.iter()
			.filter(|(_, handle, _)| Some(*handle) != writer)
			.map(|(_, _, callback)| callback.clone())
			.collect()
	}
}
impl Debug for Listeners {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Listeners").field("registered", &self.entries.len()).finish()
	}
}

/// Registers `callback` in a shared registry and returns the unregistering guard.
pub(crate) fn subscribe(
	listeners: &Arc<Mutex<Listeners>>,
	handle: HandleId,
	callback: InvalidationCallback,
) -> Subscription {
	let id = listeners.lock().register(handle, callback);
	let registry = Arc::downgrade(listeners);

	Subscription::new(move || {
		if let Some(registry) = registry.upgrade() {
			registry.lock().unregister(id);
		}
	})
}

/// Invokes callbacks outside of any store lock so they may read the store again.
pub(crate) fn dispatch(callbacks: Vec<InvalidationCallback>, event: &StorageEvent) {
	for callback in callbacks {
		callback(event);
	}
}
