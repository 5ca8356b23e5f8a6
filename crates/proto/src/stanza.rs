//! Decoded top-level protocol elements.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::element::Element;
use crate::jid::Jid;
use crate::transport::TransportError;

/// The closed set of top-level element names a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
	/// `<error/>`: a stream-level error.
	Error,
	/// `<iq/>`: request/response query.
	Iq,
	/// `<message/>`.
	Message,
	/// `<presence/>`.
	Presence,
}

impl StanzaKind {
	/// Maps an element name to its kind.
	pub fn from_tag(tag: &str) -> Option<Self> {
		match tag {
			"error" => Some(Self::Error),
			"iq" => Some(Self::Iq),
			"message" => Some(Self::Message),
			"presence" => Some(Self::Presence),
			_ => None,
		}
	}

	/// Element name for this kind.
	pub const fn tag(self) -> &'static str {
		match self {
			Self::Error => "error",
			Self::Iq => "iq",
			Self::Message => "message",
			Self::Presence => "presence",
		}
	}
}

impl fmt::Display for StanzaKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// The `type` of an [`Iq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IqKind {
	/// Request for information.
	Get,
	/// Request to change state.
	Set,
	/// Successful reply.
	Result,
	/// Failed reply.
	Error,
}

impl IqKind {
	/// Wire value of the `type` attribute.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "get",
			Self::Set => "set",
			Self::Result => "result",
			Self::Error => "error",
		}
	}

	/// Returns true for `result` and `error`, the kinds that answer a request.
	pub const fn is_reply(self) -> bool {
		matches!(self, Self::Result | Self::Error)
	}
}

impl FromStr for IqKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"get" => Ok(Self::Get),
			"set" => Ok(Self::Set),
			"result" => Ok(Self::Result),
			"error" => Ok(Self::Error),
			other => Err(other.to_owned()),
		}
	}
}

impl fmt::Display for IqKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Request/response stanza correlated by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iq {
	/// Correlation identifier.
	pub id: String,
	/// Request or reply kind.
	pub kind: IqKind,
	/// Sender address.
	pub from: Option<Jid>,
	/// Recipient address.
	pub to: Option<Jid>,
	/// First child element, if any.
	pub payload: Option<Element>,
}

impl Iq {
	fn new(id: impl Into<String>, kind: IqKind, payload: Option<Element>) -> Self {
		Self {
			id: id.into(),
			kind,
			from: None,
			to: None,
			payload,
		}
	}

	/// Builds a `get` request.
	pub fn get(id: impl Into<String>, payload: Element) -> Self {
		Self::new(id, IqKind::Get, Some(payload))
	}

	/// Builds a `set` request.
	pub fn set(id: impl Into<String>, payload: Element) -> Self {
		Self::new(id, IqKind::Set, Some(payload))
	}

	/// Builds the `result` reply to `request`, swapping the addresses.
	pub fn result_for(request: &Iq, payload: Option<Element>) -> Self {
		Self {
			from: request.to.clone(),
			to: request.from.clone(),
			..Self::new(request.id.clone(), IqKind::Result, payload)
		}
	}

	/// Builds the `error` reply to `request`, swapping the addresses.
	pub fn error_for(request: &Iq, condition: Element) -> Self {
		Self {
			from: request.to.clone(),
			to: request.from.clone(),
			..Self::new(request.id.clone(), IqKind::Error, Some(condition))
		}
	}

	/// Sets the recipient.
	#[must_use]
	pub fn to(mut self, to: Jid) -> Self {
		self.to = Some(to);
		self
	}
}

/// The `type` of a [`Message`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MessageKind {
	/// One-to-one chat.
	Chat,
	/// Error bounce.
	Error,
	/// Multi-user chat.
	Groupchat,
	/// Alert without reply.
	Headline,
	/// Standalone message.
	#[default]
	Normal,
}

impl MessageKind {
	/// Wire value of the `type` attribute.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Chat => "chat",
			Self::Error => "error",
			Self::Groupchat => "groupchat",
			Self::Headline => "headline",
			Self::Normal => "normal",
		}
	}
}

impl FromStr for MessageKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"chat" => Ok(Self::Chat),
			"error" => Ok(Self::Error),
			"groupchat" => Ok(Self::Groupchat),
			"headline" => Ok(Self::Headline),
			"normal" => Ok(Self::Normal),
			other => Err(other.to_owned()),
		}
	}
}

/// A message stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
	/// Optional identifier.
	pub id: Option<String>,
	/// Message type.
	pub kind: MessageKind,
	/// Sender address.
	pub from: Option<Jid>,
	/// Recipient address.
	pub to: Option<Jid>,
	/// Subject line.
	pub subject: Option<String>,
	/// Body text.
	pub body: Option<String>,
	/// Conversation thread.
	pub thread: Option<String>,
}

impl Message {
	/// Builds a chat message.
	pub fn chat(to: Jid, body: impl Into<String>) -> Self {
		Self {
			kind: MessageKind::Chat,
			to: Some(to),
			body: Some(body.into()),
			..Self::default()
		}
	}
}

/// The `type` of a [`Presence`]. Absent means available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceKind {
	/// Presence error.
	Error,
	/// Status probe.
	Probe,
	/// Subscription request.
	Subscribe,
	/// Subscription approved.
	Subscribed,
	/// Going offline.
	Unavailable,
	/// Unsubscribe request.
	Unsubscribe,
	/// Subscription revoked.
	Unsubscribed,
}

impl PresenceKind {
	/// Wire value of the `type` attribute.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Error => "error",
			Self::Probe => "probe",
			Self::Subscribe => "subscribe",
			Self::Subscribed => "subscribed",
			Self::Unavailable => "unavailable",
			Self::Unsubscribe => "unsubscribe",
			Self::Unsubscribed => "unsubscribed",
		}
	}
}

impl FromStr for PresenceKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"error" => Ok(Self::Error),
			"probe" => Ok(Self::Probe),
			"subscribe" => Ok(Self::Subscribe),
			"subscribed" => Ok(Self::Subscribed),
			"unavailable" => Ok(Self::Unavailable),
			"unsubscribe" => Ok(Self::Unsubscribe),
			"unsubscribed" => Ok(Self::Unsubscribed),
			other => Err(other.to_owned()),
		}
	}
}

/// A presence stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Presence {
	/// Optional identifier.
	pub id: Option<String>,
	/// Presence type, `None` when available.
	pub kind: Option<PresenceKind>,
	/// Sender address.
	pub from: Option<Jid>,
	/// Recipient address.
	pub to: Option<Jid>,
	/// Availability sub-state (`away`, `dnd`, ...).
	pub show: Option<String>,
	/// Free-form status text.
	pub status: Option<String>,
	/// Resource priority.
	pub priority: Option<i8>,
}

impl Presence {
	/// Initial broadcast presence.
	pub fn available() -> Self {
		Self::default()
	}

	/// Going-offline presence.
	pub fn unavailable() -> Self {
		Self {
			kind: Some(PresenceKind::Unavailable),
			..Self::default()
		}
	}
}

/// A stream-level `<error/>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamError {
	/// Defined condition (name of the first child element).
	pub condition: String,
	/// Optional human readable description.
	pub text: Option<String>,
}

/// One decoded top-level element, or the failure that ended the stream.
#[derive(Debug, Clone)]
pub enum Stanza {
	/// Stream-level error.
	Error(StreamError),
	/// Request/response query.
	Iq(Iq),
	/// Message.
	Message(Message),
	/// Presence.
	Presence(Presence),
	/// An element whose name is not one of [`StanzaKind`].
	Unknown {
		/// Element name.
		name: String,
	},
	/// An element of a known kind that failed to decode.
	Malformed {
		/// Kind selected from the element name.
		kind: StanzaKind,
		/// The element's `id` attribute, kept so replies stay correlatable.
		id: Option<String>,
		/// Decoder diagnostic.
		reason: String,
	},
	/// The transport failed; always the last value a conversation yields.
	Failure(Arc<TransportError>),
}

impl Stanza {
	/// Short name of the variant, used in diagnostics.
	pub const fn describe(&self) -> &'static str {
		match self {
			Self::Error(_) => "error",
			Self::Iq(_) => "iq",
			Self::Message(_) => "message",
			Self::Presence(_) => "presence",
			Self::Unknown { .. } => "unknown element",
			Self::Malformed { .. } => "malformed stanza",
			Self::Failure(_) => "transport failure",
		}
	}

	/// Returns the query, if this is one.
	pub fn as_iq(&self) -> Option<&Iq> {
		match self {
			Self::Iq(iq) => Some(iq),
			_ => None,
		}
	}

	/// Returns true for the transport failure variant.
	pub const fn is_failure(&self) -> bool {
		matches!(self, Self::Failure(_))
	}
}

impl From<Iq> for Stanza {
	fn from(iq: Iq) -> Self {
		Self::Iq(iq)
	}
}

impl From<Message> for Stanza {
	fn from(msg: Message) -> Self {
		Self::Message(msg)
	}
}

impl From<Presence> for Stanza {
	fn from(presence: Presence) -> Self {
		Self::Presence(presence)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tag_mapping_is_closed() {
		for kind in [StanzaKind::Error, StanzaKind::Iq, StanzaKind::Message, StanzaKind::Presence] {
			assert_eq!(StanzaKind::from_tag(kind.tag()), Some(kind));
		}
		assert_eq!(StanzaKind::from_tag("stream:features"), None);
		assert_eq!(StanzaKind::from_tag("IQ"), None);
	}

	#[test]
	fn reply_swaps_addresses() {
		let request = Iq {
			from: Some("alice@example.org/a".parse().unwrap()),
			..Iq::get("q1", Element::new("ping")).to(Jid::domain("example.org"))
		};
		let reply = Iq::result_for(&request, None);
		assert_eq!(reply.id, "q1");
		assert_eq!(reply.kind, IqKind::Result);
		assert_eq!(reply.from, Some(Jid::domain("example.org")));
		assert_eq!(reply.to, request.from);
	}

	#[test]
	fn reply_kinds() {
		assert!(IqKind::Result.is_reply());
		assert!(IqKind::Error.is_reply());
		assert!(!IqKind::Get.is_reply());
		assert!(!IqKind::Set.is_reply());
	}
}
