//! The narrow stream interface a conversation drives.

use std::io;

use async_trait::async_trait;

use crate::decode::DecodeError;
use crate::element::ElementStart;
use crate::stanza::{Stanza, StanzaKind};

/// Structural failure of the underlying stream.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
	/// The peer closed its stream or the connection ended.
	#[error("stream closed")]
	Closed,
	/// Input/output error from the connection.
	#[error("{0}")]
	Io(#[from] io::Error),
	/// The byte stream is not well-formed framing.
	#[error("framing error: {0}")]
	Framing(String),
}

/// Element framing, serialisation and stream termination.
///
/// A conversation calls `send`/`send_end` from its sender task and
/// `next`/`decode` from its receiver task, concurrently; implementations
/// provide their own interior synchronisation.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
	/// Serialises and transmits one stanza.
	async fn send(&self, stanza: &Stanza) -> Result<(), TransportError>;

	/// Transmits the stream-closing element.
	async fn send_end(&self) -> Result<(), TransportError>;

	/// Waits for the next top-level element to begin.
	async fn next(&self) -> Result<ElementStart, TransportError>;

	/// Materialises the element started by `start` as a stanza of `kind`.
	async fn decode(&self, kind: StanzaKind, start: ElementStart) -> Result<Stanza, DecodeError>;

	/// Discards the body of an element that will not be decoded.
	///
	/// Transports whose `next` already consumed the whole element keep the
	/// default, which does nothing.
	async fn skip(&self, start: ElementStart) -> Result<(), TransportError> {
		let _ = start;
		Ok(())
	}
}
