// self
use crate::{
	_prelude::*,
	obs::{RefreshOutcome, RefreshTrigger},
};

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(trigger: RefreshTrigger, outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"auth_lifecycle_refresh_total",
			"trigger" => trigger.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (trigger, outcome);
	}
}

/// Records how long a refresh took via the global metrics recorder (when enabled).
pub fn record_refresh_latency(trigger: RefreshTrigger, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::histogram!("auth_lifecycle_refresh_seconds", "trigger" => trigger.as_str())
			.record(elapsed.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (trigger, elapsed);
	}
}
