//! Stream addresses of the form `node@domain/resource`.

use std::fmt;
use std::str::FromStr;

/// Failure to parse an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JidError {
	/// The domain part is missing.
	#[error("address has an empty domain: {0:?}")]
	EmptyDomain(String),
	/// A `@` was present with nothing before it.
	#[error("address has an empty node: {0:?}")]
	EmptyNode(String),
	/// The domain part contains a second `@`.
	#[error("address has more than one '@' before the resource: {0:?}")]
	ExtraSeparator(String),
	/// A `/` was present with nothing after it.
	#[error("address has an empty resource: {0:?}")]
	EmptyResource(String),
}

/// An entity address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
	/// Local part before `@`.
	pub node: Option<String>,
	/// Server part.
	pub domain: String,
	/// Session part after `/`.
	pub resource: Option<String>,
}

impl Jid {
	/// Creates a domain-only address.
	pub fn domain(domain: impl Into<String>) -> Self {
		Self {
			node: None,
			domain: domain.into(),
			resource: None,
		}
	}

	/// Returns the address without its resource.
	#[must_use]
	pub fn bare(&self) -> Self {
		Self {
			node: self.node.clone(),
			domain: self.domain.clone(),
			resource: None,
		}
	}

	/// Returns a copy of this address bound to `resource`.
	#[must_use]
	pub fn with_resource(&self, resource: impl Into<String>) -> Self {
		Self {
			resource: Some(resource.into()),
			..self.clone()
		}
	}

	/// Returns true when no resource is set.
	pub fn is_bare(&self) -> bool {
		self.resource.is_none()
	}
}

impl FromStr for Jid {
	type Err = JidError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (rest, resource) = match s.split_once('/') {
			Some((_, "")) => return Err(JidError::EmptyResource(s.to_owned())),
			Some((rest, res)) => (rest, Some(res.to_owned())),
			None => (s, None),
		};
		let (node, domain) = match rest.split_once('@') {
			Some(("", _)) => return Err(JidError::EmptyNode(s.to_owned())),
			Some((node, domain)) => (Some(node.to_owned()), domain),
			None => (None, rest),
		};
		if domain.is_empty() {
			return Err(JidError::EmptyDomain(s.to_owned()));
		}
		if domain.contains('@') {
			return Err(JidError::ExtraSeparator(s.to_owned()));
		}
		Ok(Self {
			node,
			domain: domain.to_owned(),
			resource,
		})
	}
}

impl fmt::Display for Jid {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some(node) = &self.node {
			write!(f, "{node}@")?;
		}
		f.write_str(&self.domain)?;
		if let Some(resource) = &self.resource {
			write!(f, "/{resource}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_full_address() {
		let jid: Jid = "alice@example.org/phone".parse().unwrap();
		assert_eq!(jid.node.as_deref(), Some("alice"));
		assert_eq!(jid.domain, "example.org");
		assert_eq!(jid.resource.as_deref(), Some("phone"));
		assert_eq!(jid.to_string(), "alice@example.org/phone");
	}

	#[test]
	fn resource_may_contain_separators() {
		let jid: Jid = "room@muc.example.org/nick/with@signs".parse().unwrap();
		assert_eq!(jid.resource.as_deref(), Some("nick/with@signs"));
		assert_eq!(jid.bare().to_string(), "room@muc.example.org");
	}

	#[test]
	fn rejects_empty_parts() {
		assert!(matches!("".parse::<Jid>(), Err(JidError::EmptyDomain(_))));
		assert!(matches!("@example.org".parse::<Jid>(), Err(JidError::EmptyNode(_))));
		assert!(matches!("example.org/".parse::<Jid>(), Err(JidError::EmptyResource(_))));
	}

	#[test]
	fn rejects_second_at_sign() {
		assert_eq!("a@b@c".parse::<Jid>(), Err(JidError::ExtraSeparator("a@b@c".into())));
		assert!(matches!("a@b@c/res".parse::<Jid>(), Err(JidError::ExtraSeparator(_))));
	}

	#[test]
	fn with_resource_keeps_node_and_domain() {
		let jid = Jid::domain("example.org").with_resource("bot");
		assert!(!jid.is_bare());
		assert_eq!(jid.to_string(), "example.org/bot");
	}
}
