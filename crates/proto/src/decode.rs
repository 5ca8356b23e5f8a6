//! Materialising element trees into stanza variants.

use crate::element::Element;
use crate::jid::{Jid, JidError};
use crate::stanza::{Iq, IqKind, Message, MessageKind, Presence, PresenceKind, Stanza, StanzaKind, StreamError};

/// Well-formed XML that does not fit the selected stanza variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
	/// The element name does not match the selected kind.
	#[error("expected <{expected}/>, found <{found}/>")]
	UnexpectedElement {
		/// Selected kind.
		expected: StanzaKind,
		/// Actual element name.
		found: String,
	},
	/// A mandatory attribute is absent.
	#[error("<{element}/> is missing attribute {attr:?}")]
	MissingAttribute {
		/// Element name.
		element: &'static str,
		/// Attribute name.
		attr: &'static str,
	},
	/// An attribute has a value outside its domain.
	#[error("<{element}/> has invalid {attr:?}: {value:?}")]
	InvalidAttribute {
		/// Element name.
		element: &'static str,
		/// Attribute name.
		attr: &'static str,
		/// Offending value.
		value: String,
	},
	/// An address attribute does not parse.
	#[error("invalid address: {0}")]
	InvalidJid(#[from] JidError),
	/// The transport has no element body for the given start tag.
	#[error("no element body available for <{0}/>")]
	MissingBody(String),
}

/// Decodes `element` as a stanza of `kind`.
///
/// # Errors
///
/// Returns [`DecodeError`] when the element name does not match `kind` or
/// its content is invalid for the variant.
pub fn decode(kind: StanzaKind, element: &Element) -> Result<Stanza, DecodeError> {
	if element.name != kind.tag() {
		return Err(DecodeError::UnexpectedElement {
			expected: kind,
			found: element.name.clone(),
		});
	}
	Ok(match kind {
		StanzaKind::Error => Stanza::Error(decode_stream_error(element)),
		StanzaKind::Iq => Stanza::Iq(decode_iq(element)?),
		StanzaKind::Message => Stanza::Message(decode_message(element)?),
		StanzaKind::Presence => Stanza::Presence(decode_presence(element)?),
	})
}

fn address(element: &Element, attr: &str) -> Result<Option<Jid>, DecodeError> {
	element.attr(attr).map(str::parse::<Jid>).transpose().map_err(DecodeError::from)
}

fn decode_iq(element: &Element) -> Result<Iq, DecodeError> {
	let id = element.attr("id").ok_or(DecodeError::MissingAttribute {
		element: "iq",
		attr: "id",
	})?;
	let kind = element
		.attr("type")
		.ok_or(DecodeError::MissingAttribute {
			element: "iq",
			attr: "type",
		})?
		.parse::<IqKind>()
		.map_err(|value| DecodeError::InvalidAttribute {
			element: "iq",
			attr: "type",
			value,
		})?;
	Ok(Iq {
		id: id.to_owned(),
		kind,
		from: address(element, "from")?,
		to: address(element, "to")?,
		payload: element.children.first().cloned(),
	})
}

fn decode_message(element: &Element) -> Result<Message, DecodeError> {
	let kind = match element.attr("type") {
		Some(value) => value.parse::<MessageKind>().map_err(|value| DecodeError::InvalidAttribute {
			element: "message",
			attr: "type",
			value,
		})?,
		None => MessageKind::default(),
	};
	Ok(Message {
		id: element.attr("id").map(str::to_owned),
		kind,
		from: address(element, "from")?,
		to: address(element, "to")?,
		subject: element.child_text("subject").map(str::to_owned),
		body: element.child_text("body").map(str::to_owned),
		thread: element.child_text("thread").map(str::to_owned),
	})
}

fn decode_presence(element: &Element) -> Result<Presence, DecodeError> {
	let kind = element
		.attr("type")
		.map(str::parse::<PresenceKind>)
		.transpose()
		.map_err(|value| DecodeError::InvalidAttribute {
			element: "presence",
			attr: "type",
			value,
		})?;
	let priority = element
		.child_text("priority")
		.map(|text| {
			text.trim().parse::<i8>().map_err(|_| DecodeError::InvalidAttribute {
				element: "presence",
				attr: "priority",
				value: text.to_owned(),
			})
		})
		.transpose()?;
	Ok(Presence {
		id: element.attr("id").map(str::to_owned),
		kind,
		from: address(element, "from")?,
		to: address(element, "to")?,
		show: element.child_text("show").map(str::to_owned),
		status: element.child_text("status").map(str::to_owned),
		priority,
	})
}

fn decode_stream_error(element: &Element) -> StreamError {
	StreamError {
		condition: element
			.children
			.iter()
			.find(|c| c.name != "text")
			.map(|c| c.name.clone())
			.unwrap_or_default(),
		text: element.child_text("text").map(str::to_owned),
	}
}
