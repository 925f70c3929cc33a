//! File-backed [`SessionStore`] shared between processes through one JSON document.

// std
use std::{
	collections::BTreeMap,
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{self, InvalidationCallback, Listeners, SessionStore, StorageEvent, StoreError, Subscription},
};

type Snapshot = BTreeMap<String, String>;

/// Persists values to a JSON file after each mutation.
///
/// Other processes writing the same file are noticed when [`sync_from_disk`](FileStore::sync_from_disk)
/// runs; every key whose value differs from the in-memory view is announced to subscribers.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
	listeners: Arc<Mutex<Listeners>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self {
			path,
			inner: Arc::new(RwLock::new(snapshot)),
			listeners: Arc::new(Mutex::new(Listeners::default())),
		})
	}

	/// Path of the backing document.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reloads the document and announces every key changed by another writer.
	///
	/// Returns the number of changed keys.
	pub fn sync_from_disk(&self) -> Result<usize, StoreError> {
		let fresh = Self::load_snapshot(&self.path)?;
		let events = {
			let mut guard = self.inner.write();
			let events = diff(&guard, &fresh);

			*guard = fresh;

			events
		};

		if !events.is_empty() {
			let audience = self.listeners.lock().audience(None);

			for event in &events {
				store::dispatch(audience.clone(), event);
			}
		}

		Ok(events.len())
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize session snapshot: {e}"),
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SessionStore for FileStore {
	fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.inner.read().get(key).cloned())
	}

	fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.insert(key.to_owned(), value.to_owned());

		self.persist_locked(&guard)
	}

	fn remove(&self, key: &str) -> Result<bool, StoreError> {
		let mut guard = self.inner.write();

		if guard.remove(key).is_none() {
			return Ok(false);
		}

		self.persist_locked(&guard)?;

		Ok(true)
	}

	fn on_external_invalidate(&self, callback: InvalidationCallback) -> Subscription {
		store::subscribe(&self.listeners, 0, callback)
	}
}

fn diff(current: &Snapshot, fresh: &Snapshot) -> Vec<StorageEvent> {
	let mut events = Vec::new();

	for (key, old) in current {
		match fresh.get(key) {
			Some(new) if new == old => {},
			new => events.push(StorageEvent {
				key: key.clone(),
				old_value: Some(old.clone()),
				new_value: new.cloned(),
			}),
		}
	}
	for (key, new) in fresh {
		if !current.contains_key(key) {
			events.push(StorageEvent { key: key.clone(), old_value: None, new_value: Some(new.clone()) });
		}
	}

	events
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"auth_lifecycle_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Opening a fresh file store should succeed.");

		store.save("token", "jwt-1").expect("Saving into the file store should succeed.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Reopening the file store should succeed.");

		assert_eq!(reopened.load("token").expect("Load should succeed.").as_deref(), Some("jwt-1"));
		assert!(reopened.remove("token").expect("Remove should succeed."));
		assert!(!reopened.remove("token").expect("Second remove should succeed."));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn sync_from_disk_announces_foreign_changes() {
		let path = temp_path("sync");
		let ours = FileStore::open(&path).expect("Opening our file store should succeed.");
		let theirs = FileStore::open(&path).expect("Opening their file store should succeed.");
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let _subscription =
			ours.on_external_invalidate(Arc::new(move |event: &StorageEvent| sink.lock().push(event.clone())));

		ours.save("token", "jwt-1").expect("Save should succeed.");

		assert!(seen.lock().is_empty(), "Own writes must not be announced.");

		theirs.sync_from_disk().expect("Their sync should succeed.");
		theirs.remove("token").expect("Their remove should succeed.");

		assert_eq!(ours.sync_from_disk().expect("Our sync should succeed."), 1);
		assert_eq!(
			seen.lock().as_slice(),
			&[StorageEvent { key: "token".into(), old_value: Some("jwt-1".into()), new_value: None }]
		);
		assert_eq!(ours.sync_from_disk().expect("Repeated sync should succeed."), 0);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
