//! Conversation engine for XML stanza streams.
//!
//! A [`Conversation`] turns a [`Transport`] into two typed channels of
//! stanzas and layers request/response correlation and interest-based
//! routing on top:
//! * a sender task drains the outbound channel into the transport and ends
//!   the stream once the channel closes
//! * a receiver task reads, decodes and routes every inbound element, either
//!   to matching filters ([`FilterRegistry`]) or to the inbound channel
//! * [`ConversationHandle::send_recv`] correlates a query with its reply via
//!   a short-lived filter
//!
//! All hand-offs go through bounded channels (one slot by default), so a slow
//! consumer stalls the receiver task and, through it, transport reads. Filter
//! channels must be drained promptly: a stalled filter delays delivery to
//! every filter registered before it and to the inbound channel.
//!
//! A one-slot channel is not a rendezvous: the receiver task may run one
//! stanza ahead of a stalled consumer before it blocks. Raising the
//! capacities in [`ConversationConfig`] widens that lead accordingly.
//!
//! [`Transport`]: converse_proto::Transport

#![warn(missing_docs)]

mod closer;
pub mod config;
mod conversation;
mod error;
pub mod filter;
pub mod matcher;
mod receiver;
mod sender;

pub use config::ConversationConfig;
pub use conversation::{Conversation, ConversationHandle};
pub use error::{ConfigError, Error, FilterError, Result};
pub use filter::{FilterId, FilterReceiver, FilterRegistry};
pub use matcher::{Matcher, iq_result};
