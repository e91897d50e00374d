// self
use crate::_prelude::*;

/// Destination for side-channel warnings such as retry and rate-limit notices.
///
/// Warnings never become errors. [`Config::suppress_warnings`](crate::Config) is checked before
/// a sink is called, so sinks do not need to consult configuration themselves.
pub trait WarningSink
where
	Self: Send + Sync,
{
	/// Receives one warning message.
	fn warn(&self, message: &str);
}

/// Default sink that forwards warnings to `tracing` at WARN level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingWarnings;
impl WarningSink for TracingWarnings {
	fn warn(&self, message: &str) {
		#[cfg(feature = "tracing")]
		{
			tracing::warn!(target: "snoo_broker", "{message}");
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = message;
		}
	}
}

/// Sink that keeps warnings in memory, useful for tests and for surfacing notices in a UI.
#[derive(Debug, Default)]
pub struct CollectedWarnings(Mutex<Vec<String>>);
impl CollectedWarnings {
	/// Returns every warning received so far.
	pub fn messages(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}
impl WarningSink for CollectedWarnings {
	fn warn(&self, message: &str) {
		self.0.lock().push(message.to_owned());
	}
}
