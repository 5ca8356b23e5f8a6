//! In-process transport.
//!
//! [`pair`] returns a [`MemoryTransport`] to hand to a conversation and a
//! [`MemoryPeer`] playing the remote side: it feeds elements in, observes
//! everything written out, and counts stream-end writes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use crate::decode::{DecodeError, decode};
use crate::element::{Element, ElementStart};
use crate::stanza::{Stanza, StanzaKind};
use crate::transport::{Transport, TransportError};

/// A write observed by the peer.
#[derive(Debug, Clone)]
pub enum Sent {
	/// A stanza.
	Stanza(Stanza),
	/// The stream-closing element.
	End,
}

type Feed = Result<Element, TransportError>;

#[derive(Debug, Default)]
struct EndState {
	ended: AtomicBool,
	writes: AtomicUsize,
}

/// Conversation side of an in-process stream.
#[derive(Debug)]
pub struct MemoryTransport {
	incoming: AsyncMutex<mpsc::UnboundedReceiver<Feed>>,
	/// Body of the element last returned by `next`, awaiting `decode`.
	pending: Mutex<Option<Element>>,
	outgoing: mpsc::UnboundedSender<Sent>,
	end: Arc<EndState>,
}

/// Remote side of an in-process stream.
#[derive(Debug)]
pub struct MemoryPeer {
	feed: Option<mpsc::UnboundedSender<Feed>>,
	sent: mpsc::UnboundedReceiver<Sent>,
	end: Arc<EndState>,
}

/// Creates a connected transport/peer pair.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
	let (feed_tx, feed_rx) = mpsc::unbounded_channel();
	let (sent_tx, sent_rx) = mpsc::unbounded_channel();
	let end = Arc::new(EndState::default());
	let transport = MemoryTransport {
		incoming: AsyncMutex::new(feed_rx),
		pending: Mutex::new(None),
		outgoing: sent_tx,
		end: Arc::clone(&end),
	};
	let peer = MemoryPeer {
		feed: Some(feed_tx),
		sent: sent_rx,
		end,
	};
	(transport, peer)
}

impl MemoryPeer {
	/// Queues a top-level element for the conversation to read.
	///
	/// Returns false once the peer has hung up or the transport is gone.
	pub fn push(&self, element: Element) -> bool {
		self.feed.as_ref().is_some_and(|tx| tx.send(Ok(element)).is_ok())
	}

	/// Queues a transport failure.
	pub fn fail(&self, err: TransportError) -> bool {
		self.feed.as_ref().is_some_and(|tx| tx.send(Err(err)).is_ok())
	}

	/// Stops feeding; once queued elements drain, reads fail with
	/// [`TransportError::Closed`].
	pub fn hang_up(&mut self) {
		self.feed = None;
	}

	/// Waits for the next write from the conversation.
	pub async fn next_sent(&mut self) -> Option<Sent> {
		self.sent.recv().await
	}

	/// Returns a write that is already queued, without waiting.
	pub fn try_next_sent(&mut self) -> Option<Sent> {
		self.sent.try_recv().ok()
	}

	/// Number of times the conversation attempted to write the stream end.
	pub fn end_writes(&self) -> usize {
		self.end.writes.load(Ordering::Acquire)
	}

	/// Returns true once the stream end has been written.
	pub fn is_ended(&self) -> bool {
		self.end.ended.load(Ordering::Acquire)
	}
}

#[async_trait]
impl Transport for MemoryTransport {
	async fn send(&self, stanza: &Stanza) -> Result<(), TransportError> {
		if self.end.ended.load(Ordering::Acquire) {
			return Err(TransportError::Closed);
		}
		self.outgoing
			.send(Sent::Stanza(stanza.clone()))
			.map_err(|_| TransportError::Closed)
	}

	async fn send_end(&self) -> Result<(), TransportError> {
		self.end.writes.fetch_add(1, Ordering::AcqRel);
		if self.end.ended.swap(true, Ordering::AcqRel) {
			return Err(TransportError::Framing("stream end written twice".into()));
		}
		tracing::trace!("memory.send_end");
		self.outgoing.send(Sent::End).map_err(|_| TransportError::Closed)
	}

	async fn next(&self) -> Result<ElementStart, TransportError> {
		let mut incoming = self.incoming.lock().await;
		match incoming.recv().await {
			Some(Ok(element)) => {
				let start = element.start();
				*self.pending.lock() = Some(element);
				Ok(start)
			}
			Some(Err(err)) => Err(err),
			None => Err(TransportError::Closed),
		}
	}

	async fn decode(&self, kind: StanzaKind, start: ElementStart) -> Result<Stanza, DecodeError> {
		let element = self
			.pending
			.lock()
			.take()
			.filter(|el| el.name == start.name)
			.ok_or_else(|| DecodeError::MissingBody(start.name.clone()))?;
		decode(kind, &element)
	}

	async fn skip(&self, start: ElementStart) -> Result<(), TransportError> {
		let mut pending = self.pending.lock();
		if pending.as_ref().is_some_and(|el| el.name == start.name) {
			*pending = None;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::stanza::Message;

	#[tokio::test]
	async fn feeds_elements_in_order_then_closes() {
		let (transport, mut peer) = pair();
		assert!(peer.push(Element::new("message")));
		assert!(peer.push(Element::new("presence")));
		peer.hang_up();

		assert_eq!(transport.next().await.unwrap().name, "message");
		let start = transport.next().await.unwrap();
		assert_eq!(start.name, "presence");
		assert!(matches!(
			transport.decode(StanzaKind::Presence, start).await,
			Ok(Stanza::Presence(_))
		));
		assert!(matches!(transport.next().await, Err(TransportError::Closed)));
	}

	#[tokio::test]
	async fn decode_without_body_fails() {
		let (transport, _peer) = pair();
		let start = Element::new("iq").start();
		assert!(matches!(
			transport.decode(StanzaKind::Iq, start).await,
			Err(DecodeError::MissingBody(_))
		));
	}

	#[tokio::test]
	async fn skip_discards_pending_body() {
		let (transport, peer) = pair();
		peer.push(Element::new("stream:features"));
		let start = transport.next().await.unwrap();
		transport.skip(start.clone()).await.unwrap();
		assert!(matches!(
			transport.decode(StanzaKind::Message, start).await,
			Err(DecodeError::MissingBody(_))
		));
	}

	#[tokio::test]
	async fn writes_after_end_are_rejected() {
		let (transport, mut peer) = pair();
		transport.send(&Message::default().into()).await.unwrap();
		transport.send_end().await.unwrap();
		assert!(transport.send_end().await.is_err());
		assert!(matches!(transport.send(&Message::default().into()).await, Err(TransportError::Closed)));

		assert!(matches!(peer.next_sent().await, Some(Sent::Stanza(Stanza::Message(_)))));
		assert!(matches!(peer.next_sent().await, Some(Sent::End)));
		assert!(peer.try_next_sent().is_none());
		assert_eq!(peer.end_writes(), 2);
		assert!(peer.is_ended());
	}
}
