use converse_proto::Iq;

use crate::filter::FilterId;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Possible errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The conversation ended before the operation completed.
	#[error("conversation closed")]
	Closed,
	/// A correlation filter received something other than a query.
	#[error("expected {expected} reply, got {actual}")]
	UnexpectedStanza {
		/// Expected variant.
		expected: &'static str,
		/// Delivered variant.
		actual: &'static str,
	},
	/// The peer answered a query with an `error` reply.
	#[error("query {} failed", .0.id)]
	QueryFailed(Box<Iq>),
	/// No reply arrived in time.
	#[error("no reply to query {0} in time")]
	Timeout(String),
	/// Filter registry failure.
	#[error(transparent)]
	Filter(#[from] FilterError),
}

/// Filter registry failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
	/// No active filter has this id; it was never added or already removed.
	#[error("invalid filter id: {0}")]
	NotFound(FilterId),
}

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The TOML document is invalid.
	#[error("failed to parse configuration: {0}")]
	Parse(#[from] toml::de::Error),
	/// A channel capacity is zero.
	#[error("{0} must be at least 1")]
	ZeroCapacity(&'static str),
}
