//! Boundary types for XML stream conversations.
//!
//! This crate holds everything the conversation engine treats as an external
//! collaborator:
//! * [`Jid`]: the address value bound to a conversation
//! * [`Element`] / [`ElementStart`]: owned element trees and start-tag views
//! * [`Stanza`]: the decoded top-level protocol elements
//! * [`Transport`]: the narrow send/receive/decode interface of a stream
//! * [`memory`]: an in-process transport for tests and embedding

#![warn(missing_docs)]

pub mod decode;
pub mod element;
pub mod jid;
pub mod memory;
pub mod stanza;
pub mod transport;

pub use decode::{DecodeError, decode};
pub use element::{Element, ElementStart};
pub use jid::{Jid, JidError};
pub use stanza::{Iq, IqKind, Message, MessageKind, Presence, PresenceKind, Stanza, StanzaKind, StreamError};
pub use transport::{Transport, TransportError};
