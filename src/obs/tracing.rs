// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::RefreshTrigger};

/// A span builder used around refreshes.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	span: Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the provided trigger + stage.
	pub fn new(trigger: RefreshTrigger, stage: &'static str) -> Self {
		let span = tracing::info_span!("auth_lifecycle.refresh", trigger = trigger.as_str(), stage);

		Self { span }
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> RefreshSpanGuard {
		RefreshSpanGuard { _guard: self.span.entered() }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

/// RAII guard returned by [`RefreshSpan::entered`].
pub struct RefreshSpanGuard {
	_guard: tracing::span::EnteredSpan,
}
impl Debug for RefreshSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RefreshSpanGuard(..)")
	}
}
