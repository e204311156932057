// self
use crate::{_prelude::*, auth::UserId, obs::FlowKind};

/// Future type returned by [`FlowSpan::instrument`]; instrumented only with `tracing` enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future type returned by [`FlowSpan::instrument`]; instrumented only with `tracing` enabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span attached to a lifecycle flow.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a span tagged with the flow kind and the call site.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("lastplayed_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a warning event for a failed flow. Secrets never reach the event; only the user and
/// the error's display form are recorded.
pub fn warn_flow_failure(kind: FlowKind, user: Option<&UserId>, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		match user {
			Some(user) => tracing::warn!(flow = kind.as_str(), user = %user, %error, "flow failed"),
			None => tracing::warn!(flow = kind.as_str(), %error, "flow failed"),
		}
	}

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, user, error);
	}
}
