//! Registry of active stanza filters.
//!
//! Each filter pairs a [`Matcher`] with a dedicated delivery channel. The
//! receiver task tests every inbound stanza against a [`snapshot`] of the
//! registry, newest filter first, so a short-lived specific filter (such as
//! a correlation filter) is consulted before long-lived general ones.
//!
//! Structural changes are serialised by a mutex that is never held across a
//! delivery. Removing a filter cancels its close token, which both ends the
//! receiving side and aborts a delivery the receiver task may have in flight
//! from an older snapshot.
//!
//! [`snapshot`]: FilterRegistry::snapshot

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use converse_proto::Stanza;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FilterError;
use crate::matcher::Matcher;

/// Identifies a filter for removal. Ids increase strictly within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterId(u64);

impl fmt::Display for FilterId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// An active filter as seen by the receiver task.
pub struct Subscription {
	id: FilterId,
	matcher: Box<dyn Matcher>,
	tx: mpsc::Sender<Stanza>,
	closed: CancellationToken,
}

impl fmt::Debug for Subscription {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Subscription")
			.field("id", &self.id)
			.field("closed", &self.closed.is_cancelled())
			.finish_non_exhaustive()
	}
}

impl Subscription {
	/// Filter id.
	pub fn id(&self) -> FilterId {
		self.id
	}

	/// Runs the matcher.
	pub fn matches(&self, stanza: &Stanza) -> bool {
		self.matcher.matches(stanza)
	}

	/// Returns true once the filter has been removed.
	pub fn is_closed(&self) -> bool {
		self.closed.is_cancelled()
	}

	/// Hands `stanza` to the filter's consumer, waiting for channel capacity.
	///
	/// Returns false when the filter was removed before or during the wait,
	/// or its receiver is gone.
	pub async fn deliver(&self, stanza: Stanza) -> bool {
		if self.closed.is_cancelled() {
			return false;
		}
		tokio::select! {
			biased;
			() = self.closed.cancelled() => false,
			sent = self.tx.send(stanza) => sent.is_ok(),
		}
	}

	fn close(&self) {
		self.closed.cancel();
	}
}

/// Receiving end of a filter's delivery channel.
///
/// Yields `None` once the filter is removed or the conversation ends.
#[derive(Debug)]
pub struct FilterReceiver {
	id: FilterId,
	rx: mpsc::Receiver<Stanza>,
	closed: CancellationToken,
}

impl FilterReceiver {
	/// Id of the filter feeding this receiver.
	pub fn id(&self) -> FilterId {
		self.id
	}

	/// Waits for the next matching stanza.
	///
	/// A stanza already handed over before removal is still returned.
	pub async fn recv(&mut self) -> Option<Stanza> {
		tokio::select! {
			biased;
			stanza = self.rx.recv() => stanza,
			() = self.closed.cancelled() => None,
		}
	}

	/// Returns a stanza that is already delivered, without waiting.
	pub fn try_recv(&mut self) -> Option<Stanza> {
		self.rx.try_recv().ok()
	}

	/// Returns true once the filter has been removed.
	pub fn is_closed(&self) -> bool {
		self.closed.is_cancelled()
	}
}

#[derive(Default)]
struct Inner {
	next_id: u64,
	/// Newest first.
	order: VecDeque<FilterId>,
	entries: HashMap<FilterId, Arc<Subscription>>,
	closed: bool,
}

/// Ordered, concurrently mutable set of filters.
pub struct FilterRegistry {
	inner: Mutex<Inner>,
	capacity: usize,
}

impl fmt::Debug for FilterRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let inner = self.inner.lock();
		f.debug_struct("FilterRegistry")
			.field("order", &inner.order)
			.field("closed", &inner.closed)
			.field("capacity", &self.capacity)
			.finish()
	}
}

impl Default for FilterRegistry {
	fn default() -> Self {
		Self::new(1)
	}
}

impl FilterRegistry {
	/// Creates an empty registry whose delivery channels hold `capacity`
	/// stanzas (at least one).
	pub fn new(capacity: usize) -> Self {
		Self {
			inner: Mutex::new(Inner::default()),
			capacity: capacity.max(1),
		}
	}

	/// Registers a filter ahead of all existing ones.
	///
	/// After [`close_all`](Self::close_all) the returned receiver is already
	/// closed and the id is never active.
	pub fn add(&self, matcher: impl Matcher) -> (FilterId, FilterReceiver) {
		let (tx, rx) = mpsc::channel(self.capacity);
		let closed = CancellationToken::new();
		let mut inner = self.inner.lock();
		let id = FilterId(inner.next_id);
		inner.next_id += 1;

		let sub = Arc::new(Subscription {
			id,
			matcher: Box::new(matcher),
			tx,
			closed: closed.clone(),
		});
		if inner.closed {
			sub.close();
			tracing::debug!(filter_id = %id, "conversation.filter.add_after_close");
		} else {
			inner.order.push_front(id);
			inner.entries.insert(id, sub);
			tracing::debug!(filter_id = %id, active = inner.order.len(), "conversation.filter.add");
		}
		(id, FilterReceiver { id, rx, closed })
	}

	/// Removes a filter and closes its delivery channel.
	///
	/// # Errors
	///
	/// Returns `FilterError::NotFound` if `id` is not active, including when
	/// it was already removed.
	pub fn remove(&self, id: FilterId) -> Result<(), FilterError> {
		let mut inner = self.inner.lock();
		let sub = inner.entries.remove(&id).ok_or(FilterError::NotFound(id))?;
		if let Some(pos) = inner.order.iter().position(|x| *x == id) {
			inner.order.remove(pos);
		}
		sub.close();
		tracing::debug!(filter_id = %id, active = inner.order.len(), "conversation.filter.remove");
		Ok(())
	}

	/// Returns the active filters, newest first.
	pub fn snapshot(&self) -> Vec<Arc<Subscription>> {
		let inner = self.inner.lock();
		inner
			.order
			.iter()
			.filter_map(|id| inner.entries.get(id).cloned())
			.collect()
	}

	/// Number of active filters.
	pub fn len(&self) -> usize {
		self.inner.lock().order.len()
	}

	/// Returns true when no filter is active.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Closes and removes every filter; later additions start closed.
	///
	/// Returns how many filters were still active.
	pub fn close_all(&self) -> usize {
		let mut inner = self.inner.lock();
		inner.closed = true;
		inner.order.clear();
		let drained = inner.entries.len();
		for (_, sub) in inner.entries.drain() {
			sub.close();
		}
		drained
	}
}
