//! Owned element trees.

use std::collections::BTreeMap;

/// A fully materialised XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
	/// Local name.
	pub name: String,
	/// Attributes keyed by name.
	pub attrs: BTreeMap<String, String>,
	/// Child elements in document order.
	pub children: Vec<Element>,
	/// Concatenated character data.
	pub text: String,
}

impl Element {
	/// Creates an empty element.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Adds an attribute.
	#[must_use]
	pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.attrs.insert(name.into(), value.into());
		self
	}

	/// Appends a child element.
	#[must_use]
	pub fn with_child(mut self, child: Element) -> Self {
		self.children.push(child);
		self
	}

	/// Sets the character data.
	#[must_use]
	pub fn with_text(mut self, text: impl Into<String>) -> Self {
		self.text = text.into();
		self
	}

	/// Looks up an attribute value.
	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attrs.get(name).map(String::as_str)
	}

	/// Returns the first child with the given name.
	pub fn child(&self, name: &str) -> Option<&Element> {
		self.children.iter().find(|c| c.name == name)
	}

	/// Returns the text of the first child with the given name.
	pub fn child_text(&self, name: &str) -> Option<&str> {
		self.child(name).map(|c| c.text.as_str())
	}

	/// Returns the start-tag view of this element.
	pub fn start(&self) -> ElementStart {
		ElementStart {
			name: self.name.clone(),
			attrs: self.attrs.clone(),
		}
	}
}

/// The start tag of a top-level element, as reported by [`crate::Transport::next`].
///
/// The element body has not been read yet; [`crate::Transport::decode`]
/// materialises it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementStart {
	/// Local name.
	pub name: String,
	/// Attributes keyed by name.
	pub attrs: BTreeMap<String, String>,
}

impl ElementStart {
	/// Looks up an attribute value.
	pub fn attr(&self, name: &str) -> Option<&str> {
		self.attrs.get(name).map(String::as_str)
	}
}
