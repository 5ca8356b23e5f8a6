//! Stanza interest predicates.

use converse_proto::{Stanza, StanzaKind};

/// Decides whether a filter wants a stanza.
///
/// Matchers run on the receiver task for every inbound stanza, including
/// [`Stanza::Unknown`] and [`Stanza::Malformed`]; they must be cheap, must not
/// block and must not panic.
pub trait Matcher: Send + Sync + 'static {
	/// Returns true if the stanza matches.
	fn matches(&self, stanza: &Stanza) -> bool;
}

impl<F> Matcher for F
where
	F: Fn(&Stanza) -> bool + Send + Sync + 'static,
{
	fn matches(&self, stanza: &Stanza) -> bool {
		self(stanza)
	}
}

/// Matches the reply (`result` or `error`) to the query with the given id.
///
/// A query element carrying that id which failed to decode matches too, so
/// the caller waiting on it is answered instead of stranded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IqResult {
	id: String,
}

impl Matcher for IqResult {
	fn matches(&self, stanza: &Stanza) -> bool {
		match stanza {
			Stanza::Iq(iq) => iq.kind.is_reply() && iq.id == self.id,
			Stanza::Malformed {
				kind: StanzaKind::Iq,
				id: Some(id),
				..
			} => *id == self.id,
			_ => false,
		}
	}
}

/// Builds a matcher for the reply to the query `id`.
pub fn iq_result(id: impl Into<String>) -> IqResult {
	IqResult { id: id.into() }
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use converse_proto::{Element, Iq, IqKind, Message, Presence, TransportError};

	use super::*;

	fn iq(id: &str, kind: IqKind) -> Stanza {
		Stanza::Iq(Iq {
			kind,
			..Iq::get(id, Element::new("ping"))
		})
	}

	#[test]
	fn iq_result_accepts_replies_with_same_id() {
		let m = iq_result("42");
		assert!(m.matches(&iq("42", IqKind::Result)));
		assert!(m.matches(&iq("42", IqKind::Error)));
	}

	#[test]
	fn iq_result_rejects_everything_else() {
		let m = iq_result("42");
		assert!(!m.matches(&iq("43", IqKind::Result)));
		assert!(!m.matches(&iq("42", IqKind::Get)));
		assert!(!m.matches(&iq("42", IqKind::Set)));
		assert!(!m.matches(&Message::default().into()));
		assert!(!m.matches(&Presence::available().into()));
		assert!(!m.matches(&Stanza::Unknown { name: "iq".into() }));
		assert!(!m.matches(&Stanza::Failure(Arc::new(TransportError::Closed))));
	}

	#[test]
	fn iq_result_accepts_undecodable_query_with_same_id() {
		let m = iq_result("42");
		let malformed = |kind, id: Option<&str>| Stanza::Malformed {
			kind,
			id: id.map(str::to_owned),
			reason: "bad address".into(),
		};
		assert!(m.matches(&malformed(StanzaKind::Iq, Some("42"))));
		assert!(!m.matches(&malformed(StanzaKind::Iq, Some("43"))));
		assert!(!m.matches(&malformed(StanzaKind::Iq, None)));
		assert!(!m.matches(&malformed(StanzaKind::Message, Some("42"))));
	}

	#[test]
	fn closures_are_matchers() {
		let m = |s: &Stanza| matches!(s, Stanza::Message(_));
		assert!(Matcher::matches(&m, &Message::default().into()));
		assert!(!Matcher::matches(&m, &Presence::available().into()));
	}
}
