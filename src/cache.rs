//! Single-slot in-memory token cache.

// self
use crate::{
	_prelude::*,
	auth::{TokenRecord, TokenSource},
};

/// Holds the one current [`TokenRecord`] for this session.
///
/// Reads never perform I/O. Only the refresh coordinator writes to the cache, so `set` and
/// `clear` stay crate-private.
#[derive(Debug, Default)]
pub struct TokenCache(RwLock<Option<TokenRecord>>);
impl TokenCache {
	/// Returns a copy of the current record, if any.
	pub fn get(&self) -> Option<TokenRecord> {
		self.0.read().clone()
	}

	/// Returns the source of the current record, if any.
	pub fn source(&self) -> Option<TokenSource> {
		self.0.read().as_ref().map(|record| record.source)
	}

	/// Number of held records that have not expired (0 or 1); diagnostic only.
	pub fn len(&self) -> usize {
		self.0.read().as_ref().map_or(0, |record| usize::from(!record.is_expired()))
	}

	/// Returns `true` when no unexpired record is held.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Replaces the current record, returning the previous one.
	pub(crate) fn set(&self, record: TokenRecord) -> Option<TokenRecord> {
		self.0.write().replace(record)
	}

	/// Removes the current record; returns `true` when something was removed.
	pub(crate) fn clear(&self) -> bool {
		self.0.write().take().is_some()
	}
}
