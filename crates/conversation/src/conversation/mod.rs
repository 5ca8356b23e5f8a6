//! The conversation façade and its cloneable handle.

use std::sync::Arc;
use std::time::Duration;

use converse_proto::{Iq, IqKind, Jid, Stanza, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::closer::StreamCloser;
use crate::config::ConversationConfig;
use crate::error::{Error, FilterError, Result};
use crate::filter::{FilterId, FilterReceiver, FilterRegistry};
use crate::matcher::{Matcher, iq_result};
use crate::receiver::Receiver;
use crate::sender;

struct Shared {
	registry: Arc<FilterRegistry>,
	closer: Arc<StreamCloser>,
}

/// A live conversation over a stream.
///
/// Created with both background tasks already running. Inbound stanzas that
/// no filter takes are read with [`recv`](Self::recv); the last value is a
/// [`Stanza::Failure`], after which `recv` yields `None`.
///
/// The outbound side is shared with every [`ConversationHandle`]. The stream
/// end is written once [`finish`](Self::finish) has been called and every
/// handle dropped, or when [`close`](Self::close) is called explicitly.
pub struct Conversation {
	jid: Jid,
	inbound: mpsc::Receiver<Stanza>,
	outbound: Option<mpsc::Sender<Stanza>>,
	shared: Arc<Shared>,
	sender: JoinHandle<()>,
	receiver: JoinHandle<()>,
}

impl std::fmt::Debug for Conversation {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Conversation")
			.field("jid", &self.jid)
			.field("filters", &self.shared.registry.len())
			.field("finished", &self.outbound.is_none())
			.field("terminated", &self.shared.closer.is_terminated())
			.finish_non_exhaustive()
	}
}

impl Conversation {
	/// Starts a conversation with the default configuration.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime.
	pub fn new(jid: Jid, transport: Arc<dyn Transport>) -> Self {
		Self::with_config(jid, transport, &ConversationConfig::default())
	}

	/// Starts a conversation.
	///
	/// Capacities below one are treated as one.
	///
	/// # Panics
	///
	/// Panics when called outside a tokio runtime.
	pub fn with_config(jid: Jid, transport: Arc<dyn Transport>, config: &ConversationConfig) -> Self {
		let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
		let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
		let registry = Arc::new(FilterRegistry::new(config.filter_capacity));
		let closer = Arc::new(StreamCloser::new(Arc::clone(&transport)));

		let sender = tokio::spawn(
			sender::run(outbound_rx, Arc::clone(&transport), Arc::clone(&closer), config.trace_stanzas)
				.instrument(tracing::debug_span!("conversation.sender", jid = %jid)),
		);
		let receiver = tokio::spawn(
			Receiver {
				transport,
				registry: Arc::clone(&registry),
				inbound: inbound_tx,
				closer: Arc::clone(&closer),
				trace_stanzas: config.trace_stanzas,
			}
			.run()
			.instrument(tracing::debug_span!("conversation.receiver", jid = %jid)),
		);
		tracing::debug!(jid = %jid, "conversation.start");

		Self {
			jid,
			inbound: inbound_rx,
			outbound: Some(outbound_tx),
			shared: Arc::new(Shared { registry, closer }),
			sender,
			receiver,
		}
	}

	/// Address this conversation speaks for.
	pub fn jid(&self) -> &Jid {
		&self.jid
	}

	/// Replaces the address, e.g. after the server assigned a resource.
	pub fn set_jid(&mut self, jid: Jid) {
		tracing::debug!(from = %self.jid, to = %jid, "conversation.jid");
		self.jid = jid;
	}

	/// Returns a cloneable handle sharing the outbound side, or `None` after
	/// [`finish`](Self::finish).
	pub fn handle(&self) -> Option<ConversationHandle> {
		self.outbound.as_ref().map(|outbound| ConversationHandle {
			outbound: outbound.clone(),
			shared: Arc::clone(&self.shared),
		})
	}

	/// Waits for the next stanza no filter took.
	pub async fn recv(&mut self) -> Option<Stanza> {
		self.inbound.recv().await
	}

	/// Returns an inbound stanza that is already waiting.
	pub fn try_recv(&mut self) -> Option<Stanza> {
		self.inbound.try_recv().ok()
	}

	/// Queues a stanza for sending.
	///
	/// # Errors
	///
	/// `Error::Closed` after [`finish`](Self::finish) or once the stream ended.
	pub async fn send(&self, stanza: impl Into<Stanza>) -> Result<()> {
		send_on(self.outbound.as_ref(), stanza.into()).await
	}

	/// Sends a query and waits for its reply. See [`ConversationHandle::send_recv`].
	///
	/// # Errors
	///
	/// As [`ConversationHandle::send_recv`].
	pub async fn send_recv(&self, iq: Iq) -> Result<Iq> {
		send_recv(self.outbound.as_ref(), &self.shared.registry, iq).await
	}

	/// Registers a filter. See [`FilterRegistry::add`].
	pub fn add_filter(&self, matcher: impl Matcher) -> (FilterId, FilterReceiver) {
		self.shared.registry.add(matcher)
	}

	/// Removes a filter. See [`FilterRegistry::remove`].
	///
	/// # Errors
	///
	/// `FilterError::NotFound` if the filter is not active.
	pub fn remove_filter(&self, id: FilterId) -> Result<(), FilterError> {
		self.shared.registry.remove(id)
	}

	/// Writes the stream end now. Safe to call any number of times from any
	/// handle; returns true only for the call that performed the write.
	pub async fn close(&self) -> bool {
		self.shared.closer.close("application").await
	}

	/// Returns true once the stream end has been written.
	pub fn is_terminated(&self) -> bool {
		self.shared.closer.is_terminated()
	}

	/// Drops this conversation's own outbound sender. The stream end follows
	/// once every [`ConversationHandle`] is dropped too.
	pub fn finish(&mut self) {
		if self.outbound.take().is_some() {
			tracing::debug!(jid = %self.jid, "conversation.finish");
		}
	}

	/// Waits for both background tasks to exit.
	///
	/// Drops the inbound side first, so stanzas arriving meanwhile are
	/// discarded, and finishes the outbound side. Resolves once the peer ends
	/// its stream and every handle is gone (or the stream end was written).
	pub async fn join(mut self) {
		self.finish();
		drop(self.inbound);
		for (task, handle) in [("receiver", self.receiver), ("sender", self.sender)] {
			if let Err(err) = handle.await {
				tracing::error!(task, error = %err, "conversation.task_failed");
			}
		}
		tracing::debug!(jid = %self.jid, "conversation.joined");
	}
}

/// Cloneable access to a conversation's outbound side and filters.
///
/// Holding a handle keeps the outbound channel open.
#[derive(Clone)]
pub struct ConversationHandle {
	outbound: mpsc::Sender<Stanza>,
	shared: Arc<Shared>,
}

impl std::fmt::Debug for ConversationHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConversationHandle")
			.field("terminated", &self.shared.closer.is_terminated())
			.finish_non_exhaustive()
	}
}

impl ConversationHandle {
	/// Queues a stanza for sending.
	///
	/// # Errors
	///
	/// `Error::Closed` once the stream ended.
	pub async fn send(&self, stanza: impl Into<Stanza>) -> Result<()> {
		send_on(Some(&self.outbound), stanza.into()).await
	}

	/// Sends a query and waits for the reply carrying the same id.
	///
	/// The correlation filter is removed on every exit path, including when
	/// the returned future is dropped early.
	///
	/// # Errors
	///
	/// - `Error::QueryFailed` when the peer answers with an `error` reply.
	/// - `Error::UnexpectedStanza` when the filter delivers something that is
	///   not a query.
	/// - `Error::Closed` when the conversation ends before a reply arrives.
	pub async fn send_recv(&self, iq: Iq) -> Result<Iq> {
		send_recv(Some(&self.outbound), &self.shared.registry, iq).await
	}

	/// [`send_recv`](Self::send_recv) bounded by `timeout`.
	///
	/// # Errors
	///
	/// `Error::Timeout` when no reply arrives in time, otherwise as
	/// [`send_recv`](Self::send_recv).
	pub async fn send_recv_timeout(&self, iq: Iq, timeout: Duration) -> Result<Iq> {
		let id = iq.id.clone();
		tokio::time::timeout(timeout, self.send_recv(iq))
			.await
			.map_err(|_| Error::Timeout(id))?
	}

	/// Registers a filter. See [`FilterRegistry::add`].
	pub fn add_filter(&self, matcher: impl Matcher) -> (FilterId, FilterReceiver) {
		self.shared.registry.add(matcher)
	}

	/// Removes a filter. See [`FilterRegistry::remove`].
	///
	/// # Errors
	///
	/// `FilterError::NotFound` if the filter is not active.
	pub fn remove_filter(&self, id: FilterId) -> Result<(), FilterError> {
		self.shared.registry.remove(id)
	}

	/// Writes the stream end now. See [`Conversation::close`].
	pub async fn close(&self) -> bool {
		self.shared.closer.close("application").await
	}

	/// Returns true once the stream end has been written.
	pub fn is_terminated(&self) -> bool {
		self.shared.closer.is_terminated()
	}
}

async fn send_on(outbound: Option<&mpsc::Sender<Stanza>>, stanza: Stanza) -> Result<()> {
	let outbound = outbound.ok_or(Error::Closed)?;
	outbound.send(stanza).await.map_err(|_| Error::Closed)
}

/// Removes a filter when dropped.
struct FilterGuard<'a> {
	registry: &'a FilterRegistry,
	id: FilterId,
}

impl Drop for FilterGuard<'_> {
	fn drop(&mut self) {
		// Already gone when the conversation tore down first.
		let _ = self.registry.remove(self.id);
	}
}

async fn send_recv(outbound: Option<&mpsc::Sender<Stanza>>, registry: &FilterRegistry, iq: Iq) -> Result<Iq> {
	let (id, mut replies) = registry.add(iq_result(iq.id.clone()));
	let _guard = FilterGuard { registry, id };
	tracing::debug!(query = %iq.id, filter_id = %id, "conversation.send_recv");

	send_on(outbound, Stanza::Iq(iq)).await?;
	expect_reply(replies.recv().await)
}

fn expect_reply(reply: Option<Stanza>) -> Result<Iq> {
	match reply {
		None => Err(Error::Closed),
		Some(Stanza::Iq(iq)) if iq.kind == IqKind::Result => Ok(iq),
		Some(Stanza::Iq(iq)) if iq.kind == IqKind::Error => Err(Error::QueryFailed(Box::new(iq))),
		Some(other) => Err(Error::UnexpectedStanza {
			expected: "iq",
			actual: other.describe(),
		}),
	}
}
