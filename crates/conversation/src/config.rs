//! Conversation tuning.

use serde::Deserialize;

use crate::error::ConfigError;

/// Channel sizing and logging options for a [`crate::Conversation`].
///
/// Every capacity defaults to one slot, the closest a tokio channel gets to
/// an unbuffered hand-off. Larger values trade backpressure latency for
/// throughput.
///
/// ```toml
/// inbound_capacity = 1
/// outbound_capacity = 1
/// filter_capacity = 1
/// trace_stanzas = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversationConfig {
	/// Slots in the channel of unfiltered inbound stanzas.
	pub inbound_capacity: usize,
	/// Slots in the channel of stanzas waiting to be sent.
	pub outbound_capacity: usize,
	/// Slots in each filter's delivery channel.
	pub filter_capacity: usize,
	/// Log every routed stanza at trace level.
	pub trace_stanzas: bool,
}

impl Default for ConversationConfig {
	fn default() -> Self {
		Self {
			inbound_capacity: 1,
			outbound_capacity: 1,
			filter_capacity: 1,
			trace_stanzas: false,
		}
	}
}

impl ConversationConfig {
	/// Parses and validates a TOML document.
	///
	/// # Errors
	///
	/// - `ConfigError::Parse` when the document is not valid TOML or has unknown keys.
	/// - `ConfigError::ZeroCapacity` when a capacity is zero.
	pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(src)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks that every capacity is usable.
	///
	/// # Errors
	///
	/// Returns `ConfigError::ZeroCapacity` naming the first zero capacity.
	pub fn validate(&self) -> Result<(), ConfigError> {
		for (name, value) in [
			("inbound_capacity", self.inbound_capacity),
			("outbound_capacity", self.outbound_capacity),
			("filter_capacity", self.filter_capacity),
		] {
			if value == 0 {
				return Err(ConfigError::ZeroCapacity(name));
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_is_default() {
		assert_eq!(ConversationConfig::from_toml_str("").unwrap(), ConversationConfig::default());
	}

	#[test]
	fn partial_document_keeps_defaults() {
		let config = ConversationConfig::from_toml_str("inbound_capacity = 16\ntrace_stanzas = true\n").unwrap();
		assert_eq!(config.inbound_capacity, 16);
		assert_eq!(config.outbound_capacity, 1);
		assert!(config.trace_stanzas);
	}

	#[test]
	fn rejects_zero_and_unknown_keys() {
		assert!(matches!(
			ConversationConfig::from_toml_str("filter_capacity = 0"),
			Err(ConfigError::ZeroCapacity("filter_capacity"))
		));
		assert!(matches!(
			ConversationConfig::from_toml_str("buffered = true"),
			Err(ConfigError::Parse(_))
		));
	}
}
