use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use converse_proto::Transport;
use tokio_util::sync::CancellationToken;

/// Single-execution guard around writing the stream end.
///
/// The sender task, the receiver task and application code may all ask for
/// termination; only the first request reaches the transport.
pub(crate) struct StreamCloser {
	transport: Arc<dyn Transport>,
	started: AtomicBool,
	terminated: CancellationToken,
}

impl StreamCloser {
	pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
		Self {
			transport,
			started: AtomicBool::new(false),
			terminated: CancellationToken::new(),
		}
	}

	/// Writes the stream end unless another caller already did.
	///
	/// Returns true if this call performed the write.
	pub(crate) async fn close(&self, origin: &'static str) -> bool {
		if self
			.started
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			tracing::trace!(origin, "conversation.close.already_closed");
			return false;
		}
		tracing::debug!(origin, "conversation.close");
		if let Err(err) = self.transport.send_end().await {
			tracing::warn!(origin, error = %err, "conversation.close.send_end_failed");
		}
		self.terminated.cancel();
		true
	}

	pub(crate) fn is_terminated(&self) -> bool {
		self.terminated.is_cancelled()
	}

	/// Resolves once the stream end has been written (or attempted).
	pub(crate) async fn terminated(&self) {
		self.terminated.cancelled().await;
	}
}
