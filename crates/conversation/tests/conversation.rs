use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use converse::{Conversation, ConversationConfig, Error, iq_result};
use converse_proto::memory::{self, Sent};
use converse_proto::{DecodeError, Element, ElementStart, Iq, IqKind, Jid, Stanza, StanzaKind, Transport, TransportError};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn jid() -> Jid {
	"bot@example.org/tests".parse().unwrap()
}

async fn within<F: std::future::Future>(fut: F) -> F::Output {
	tokio::time::timeout(Duration::from_secs(5), fut)
		.await
		.expect("conversation stalled")
}

#[tokio::test]
async fn message_iq_presence_arrive_in_order() {
	init_tracing();
	let (transport, peer) = memory::pair();
	let mut conv = Conversation::new(jid(), Arc::new(transport));

	peer.push(Element::new("message"));
	peer.push(Element::new("iq").with_attr("id", "1").with_attr("type", "result"));
	peer.push(Element::new("presence"));

	assert!(matches!(within(conv.recv()).await, Some(Stanza::Message(_))));
	match within(conv.recv()).await {
		Some(Stanza::Iq(iq)) => assert_eq!((iq.id.as_str(), iq.kind), ("1", IqKind::Result)),
		other => panic!("expected iq, got {other:?}"),
	}
	assert!(matches!(within(conv.recv()).await, Some(Stanza::Presence(_))));
	assert!(conv.try_recv().is_none());
}

#[tokio::test]
async fn filtered_reply_skips_inbound() {
	init_tracing();
	let (transport, mut peer) = memory::pair();
	let mut conv = Conversation::new(jid(), Arc::new(transport));
	let (_id, mut replies) = conv.add_filter(iq_result("1"));

	peer.push(Element::new("iq").with_attr("id", "1").with_attr("type", "result"));
	assert!(matches!(within(replies.recv()).await, Some(Stanza::Iq(_))));

	peer.hang_up();
	// Only the end-of-stream failure reaches the inbound channel.
	assert!(matches!(within(conv.recv()).await, Some(Stanza::Failure(_))));
	assert!(within(conv.recv()).await.is_none());
	assert!(matches!(within(peer.next_sent()).await, Some(Sent::End)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_are_correlated_independently() {
	init_tracing();
	let (transport, mut peer) = memory::pair();
	let config = ConversationConfig::from_toml_str("outbound_capacity = 16\ninbound_capacity = 4").unwrap();
	let conv = Conversation::with_config(jid(), Arc::new(transport), &config);
	let handle = conv.handle().unwrap();

	let calls: Vec<_> = (0..10)
		.map(|n| {
			let handle = handle.clone();
			tokio::spawn(async move { handle.send_recv(Iq::get(format!("q{n}"), Element::new("ping"))).await })
		})
		.collect();

	let mut queries = Vec::new();
	while queries.len() < 10 {
		match within(peer.next_sent()).await {
			Some(Sent::Stanza(Stanza::Iq(iq))) => queries.push(iq),
			other => panic!("unexpected write {other:?}"),
		}
	}
	for query in queries.iter().rev() {
		let reply = Element::new("iq")
			.with_attr("id", query.id.clone())
			.with_attr("type", "result")
			.with_child(Element::new("pong").with_text(query.id.clone()));
		peer.push(reply);
	}

	for (n, call) in calls.into_iter().enumerate() {
		let reply = within(call).await.unwrap().unwrap();
		assert_eq!(reply.id, format!("q{n}"));
		assert_eq!(reply.payload.map(|p| p.text), Some(format!("q{n}")));
	}
}

#[tokio::test]
async fn join_waits_for_both_tasks() {
	init_tracing();
	let (transport, mut peer) = memory::pair();
	let conv = Conversation::new(jid(), Arc::new(transport));
	let handle = conv.handle().unwrap();

	let joined = tokio::spawn(conv.join());
	handle.send(Stanza::from(Iq::get("x", Element::new("ping")))).await.unwrap();
	assert!(matches!(within(peer.next_sent()).await, Some(Sent::Stanza(_))));
	assert!(!joined.is_finished());

	drop(handle);
	assert!(matches!(within(peer.next_sent()).await, Some(Sent::End)));
	peer.hang_up();
	within(joined).await.unwrap();
	assert_eq!(peer.end_writes(), 1);
}

/// Transport that replays a fixed script and fails with a reset afterwards.
struct Scripted {
	script: Mutex<VecDeque<Element>>,
	current: Mutex<Option<Element>>,
	sent: AtomicUsize,
	ends: AtomicUsize,
}

impl Scripted {
	fn new(script: impl IntoIterator<Item = Element>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(script.into_iter().collect()),
			current: Mutex::new(None),
			sent: AtomicUsize::new(0),
			ends: AtomicUsize::new(0),
		})
	}
}

#[async_trait]
impl Transport for Scripted {
	async fn send(&self, _stanza: &Stanza) -> Result<(), TransportError> {
		self.sent.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn send_end(&self) -> Result<(), TransportError> {
		self.ends.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	async fn next(&self) -> Result<ElementStart, TransportError> {
		let next = self.script.lock().pop_front();
		match next {
			Some(el) => {
				let start = el.start();
				*self.current.lock() = Some(el);
				Ok(start)
			}
			None => Err(TransportError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset))),
		}
	}

	async fn decode(&self, kind: StanzaKind, start: ElementStart) -> Result<Stanza, DecodeError> {
		let el = self.current.lock().take().ok_or(DecodeError::MissingBody(start.name))?;
		converse_proto::decode(kind, &el)
	}
}

#[tokio::test]
async fn competing_shutdown_paths_end_stream_once() {
	init_tracing();
	let transport = Scripted::new([Element::new("presence"), Element::new("message")]);
	let mut conv = Conversation::new(jid(), transport.clone());
	let handle = conv.handle().unwrap();

	// Finish the outbound side while the script runs out underneath.
	conv.finish();
	drop(handle);
	conv.close().await;

	let mut seen = Vec::new();
	while let Some(stanza) = within(conv.recv()).await {
		seen.push(stanza.describe());
	}
	assert_eq!(seen, vec!["presence", "message", "transport failure"]);
	assert_eq!(transport.ends.load(Ordering::SeqCst), 1);
	assert_eq!(transport.sent.load(Ordering::SeqCst), 0);
	within(conv.join()).await;
	assert_eq!(transport.ends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn finished_conversation_rejects_queries() {
	init_tracing();
	let (transport, _peer) = memory::pair();
	let mut conv = Conversation::new(jid(), Arc::new(transport));
	conv.finish();
	assert!(matches!(
		conv.send_recv(Iq::get("late", Element::new("ping"))).await,
		Err(Error::Closed)
	));
}
