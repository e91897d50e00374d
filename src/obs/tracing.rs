// self
use crate::{_prelude::*, obs::RequestKind};

/// Future returned by [`RequestSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`RequestSpan::instrument`]; instrumented only when tracing is enabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span covering one logical request, including every physical attempt it makes.
///
/// The span is opened as `snoo_broker.request` with `kind` and `operation` set. `attempt` and
/// `status` start empty and are overwritten as the pipeline advances, so the span closes with
/// the number of the final attempt and the last status seen.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
	kind: RequestKind,
}
impl RequestSpan {
	/// Opens a span for `operation` (an API path or a token-endpoint action).
	pub fn new(kind: RequestKind, operation: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"snoo_broker.request",
				kind = kind.as_str(),
				operation,
				attempt = tracing::field::Empty,
				status = tracing::field::Empty,
			);

			Self { span, kind }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = operation;

			Self { kind }
		}
	}

	/// Request kind this span was opened for.
	pub fn kind(&self) -> RequestKind {
		self.kind
	}

	/// Marks the start of physical attempt `attempt` (zero-based) against `endpoint`.
	///
	/// With `debug` set, a debug event naming the method and endpoint is emitted inside the span.
	pub fn start_attempt(&self, attempt: u32, method: &str, endpoint: &str, debug: bool) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("attempt", attempt);

			if debug {
				tracing::debug!(
					parent: &self.span,
					kind = self.kind.as_str(),
					method,
					endpoint,
					attempt,
					"Dispatching request."
				);
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (attempt, method, endpoint, debug);
		}
	}

	/// Records the status of the response to the current attempt.
	pub fn record_status(&self, status: u16, endpoint: &str, debug: bool) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("status", status);

			if debug {
				tracing::debug!(
					parent: &self.span,
					kind = self.kind.as_str(),
					endpoint,
					status,
					"Received response."
				);
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (status, endpoint, debug);
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
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
