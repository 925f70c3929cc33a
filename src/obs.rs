//! Observability helpers for refresh attempts.
//!
//! # Feature Flags
//!
//! - Spans named `auth_lifecycle.refresh` carry the `trigger` (why the refresh ran) and `stage`
//!   (call site) fields; they are always emitted through `tracing`.
//! - Enable `metrics` to increment the `auth_lifecycle_refresh_total` counter for every
//!   attempt, success, revalidation, failure, and discard, labeled by `trigger` + `outcome`, and to record refresh
//!   latency in the `auth_lifecycle_refresh_seconds` histogram.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Reasons a refresh was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
	/// A caller found no usable token.
	Demand,
	/// A cached token entered the preemptive window.
	Preemptive,
	/// The background scheduler ticked.
	Background,
	/// A caller asked to bypass the cache.
	Forced,
	/// The session was re-checked after initialization or an external invalidation.
	Recheck,
}
impl RefreshTrigger {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshTrigger::Demand => "demand",
			RefreshTrigger::Preemptive => "preemptive",
			RefreshTrigger::Background => "background",
			RefreshTrigger::Forced => "forced",
			RefreshTrigger::Recheck => "recheck",
		}
	}
}
impl Display for RefreshTrigger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// A refresh started.
	Attempt,
	/// The refresh produced a token that was installed.
	Success,
	/// The provider confirmed the cached token without issuing a new one.
	Revalidated,
	/// The refresh failed.
	Failure,
	/// The refresh settled after the session was cleared; its result was dropped.
	Discarded,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Revalidated => "revalidated",
			RefreshOutcome::Failure => "failure",
			RefreshOutcome::Discarded => "discarded",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
