use std::sync::Arc;

use converse_proto::{ElementStart, Stanza, StanzaKind, Transport};
use tokio::sync::mpsc;

use crate::closer::StreamCloser;
use crate::filter::FilterRegistry;

/// Reads, decodes and routes inbound elements until the transport fails.
pub(crate) struct Receiver {
	pub(crate) transport: Arc<dyn Transport>,
	pub(crate) registry: Arc<FilterRegistry>,
	pub(crate) inbound: mpsc::Sender<Stanza>,
	pub(crate) closer: Arc<StreamCloser>,
	pub(crate) trace_stanzas: bool,
}

impl Receiver {
	/// Runs the receive loop, then tears the conversation down: ends the
	/// stream, closes every remaining filter and finally the inbound channel.
	pub(crate) async fn run(self) {
		self.pump().await;

		self.closer.close("receiver").await;
		let orphaned = self.registry.close_all();
		tracing::debug!(orphaned_filters = orphaned, "conversation.receiver.closed");
		drop(self.inbound);
	}

	async fn pump(&self) {
		loop {
			let start = match self.transport.next().await {
				Ok(start) => start,
				Err(err) => {
					tracing::warn!(error = %err, "conversation.receiver.transport_failed");
					if self.inbound.send(Stanza::Failure(Arc::new(err))).await.is_err() {
						tracing::debug!("conversation.receiver.failure_unobserved");
					}
					return;
				}
			};
			let stanza = self.decode(start).await;
			self.route(stanza).await;
		}
	}

	async fn decode(&self, start: ElementStart) -> Stanza {
		let Some(kind) = StanzaKind::from_tag(&start.name) else {
			tracing::warn!(element = %start.name, "conversation.receiver.unknown_element");
			let name = start.name.clone();
			if let Err(err) = self.transport.skip(start).await {
				tracing::warn!(element = %name, error = %err, "conversation.receiver.skip_failed");
			}
			return Stanza::Unknown { name };
		};
		let id = start.attr("id").map(str::to_owned);
		match self.transport.decode(kind, start).await {
			Ok(stanza) => stanza,
			Err(err) => {
				tracing::warn!(%kind, id = ?id, error = %err, "conversation.receiver.decode_failed");
				Stanza::Malformed {
					kind,
					id,
					reason: err.to_string(),
				}
			}
		}
	}

	/// Offers `stanza` to every matching filter, newest first, falling back to
	/// the inbound channel when none takes it.
	async fn route(&self, stanza: Stanza) {
		let mut delivered = 0usize;
		for sub in self.registry.snapshot() {
			if !sub.matches(&stanza) {
				continue;
			}
			if sub.deliver(stanza.clone()).await {
				delivered += 1;
			} else {
				tracing::debug!(filter_id = %sub.id(), "conversation.receiver.filter_gone");
			}
		}

		if self.trace_stanzas {
			tracing::trace!(stanza = ?stanza, filters = delivered, "conversation.receiver.route");
		}
		if delivered == 0 && self.inbound.send(stanza).await.is_err() {
			tracing::debug!("conversation.receiver.inbound_dropped");
		}
	}
}
