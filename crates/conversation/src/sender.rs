use std::sync::Arc;

use converse_proto::{Stanza, Transport};
use tokio::sync::mpsc;

use crate::closer::StreamCloser;

/// Drains the outbound channel into the transport.
///
/// Ends the stream once every outbound sender is dropped. Stops early, without
/// writing anything further, once the stream end has been written by another
/// path.
pub(crate) async fn run(
	mut outbound: mpsc::Receiver<Stanza>,
	transport: Arc<dyn Transport>,
	closer: Arc<StreamCloser>,
	trace_stanzas: bool,
) {
	loop {
		let stanza = tokio::select! {
			biased;
			() = closer.terminated() => {
				tracing::debug!(pending = outbound.len(), "conversation.sender.stream_ended");
				return;
			}
			stanza = outbound.recv() => match stanza {
				Some(stanza) => stanza,
				None => break,
			},
		};
		if trace_stanzas {
			tracing::trace!(stanza = ?stanza, "conversation.sender.send");
		}
		if let Err(err) = transport.send(&stanza).await {
			tracing::warn!(kind = stanza.describe(), error = %err, "conversation.sender.send_failed");
		}
	}

	tracing::debug!("conversation.sender.outbound_closed");
	closer.close("sender").await;
}
