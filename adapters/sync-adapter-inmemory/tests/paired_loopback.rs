//! End-to-end test: two `InMemoryAdapter`s linked by `connect_pair`, each
//! driving its own `Synchronizer`, establish a channel and discover each
//! other without any real transport.

use std::sync::Arc;
use std::time::Duration;

use sync_adapter::LocalIdentity;
use sync_adapter_inmemory::{connect_pair, InMemoryAdapter};
use sync_core::{create_rules, Event, EventSink, InboundMessage, Rules, Synchronizer};
use sync_types::document::{CrdtDocument, Version, VersionOrdering};
use sync_types::error::ClResult;
use sync_types::ids::{DocId, PeerId};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Default)]
struct EmptyDoc;

impl CrdtDocument for EmptyDoc {
	fn version(&self) -> Version {
		Version::empty()
	}
	fn export_snapshot(&self) -> Vec<u8> {
		Vec::new()
	}
	fn export_update_since(&self, _base: &Version) -> Vec<u8> {
		Vec::new()
	}
	fn import(&mut self, _bytes: &[u8]) -> ClResult<()> {
		Ok(())
	}
	fn compare(&self, _other: &Version) -> VersionOrdering {
		VersionOrdering::Equal
	}
	fn has_content(&self) -> bool {
		false
	}
}

/// A CRDT stand-in whose "version" is just the bytes imported so far —
/// enough causal structure for the reducer's `compare` calls without any
/// real merge machinery.
#[derive(Default)]
struct FakeDoc {
	ops: Vec<u8>,
}

impl CrdtDocument for FakeDoc {
	fn version(&self) -> Version {
		Version(self.ops.clone())
	}
	fn export_snapshot(&self) -> Vec<u8> {
		self.ops.clone()
	}
	fn export_update_since(&self, base: &Version) -> Vec<u8> {
		if self.ops.starts_with(&base.0) { self.ops[base.0.len()..].to_vec() } else { self.ops.clone() }
	}
	fn import(&mut self, bytes: &[u8]) -> ClResult<()> {
		self.ops.extend_from_slice(bytes);
		Ok(())
	}
	fn compare(&self, other: &Version) -> VersionOrdering {
		if self.ops == other.0 {
			VersionOrdering::Equal
		} else if self.ops.starts_with(&other.0) {
			VersionOrdering::Dominates
		} else if other.0.starts_with(&self.ops) {
			VersionOrdering::Dominated
		} else {
			VersionOrdering::Concurrent
		}
	}
	fn has_content(&self) -> bool {
		!self.ops.is_empty()
	}
}

struct NullEvents;

impl EventSink for NullEvents {
	fn emit(&self, _event: Event) {}
}

fn identity(n: u64, name: &str) -> LocalIdentity {
	LocalIdentity { peer_id: PeerId::parse(&n.to_string()).unwrap(), name: name.into(), typ: "test".into(), allow_self: false }
}

#[tokio::test]
async fn establishing_a_paired_channel_registers_each_peer_on_the_other_side() {
	let adapter_a = Arc::new(InMemoryAdapter::new(identity(1, "alice")));
	let adapter_b = Arc::new(InMemoryAdapter::new(identity(2, "bob")));

	use sync_adapter::Adapter as _;
	adapter_a.on_start().await.unwrap();
	adapter_b.on_start().await.unwrap();

	let synchronizer_a = Arc::new(AsyncMutex::new(Synchronizer::new(
		Some(PeerId::parse("1").unwrap()),
		Arc::new(|_| Box::new(EmptyDoc)),
		Rules::default(),
		adapter_a.clone(),
		Arc::new(NullEvents),
	)));
	let synchronizer_b = Arc::new(AsyncMutex::new(Synchronizer::new(
		Some(PeerId::parse("2").unwrap()),
		Arc::new(|_| Box::new(EmptyDoc)),
		Rules::default(),
		adapter_b.clone(),
		Arc::new(NullEvents),
	)));

	connect_pair(adapter_a, synchronizer_a.clone(), adapter_b, synchronizer_b.clone()).await;

	// The handshake and directory exchange run on spawned tasks; give them a
	// moment to settle rather than asserting on the very first poll.
	tokio::time::sleep(Duration::from_millis(50)).await;

	let a = synchronizer_a.lock().await;
	let b = synchronizer_b.lock().await;
	assert!(a.model().peers.contains_key(&PeerId::parse("2").unwrap()));
	assert!(b.model().peers.contains_key(&PeerId::parse("1").unwrap()));
}

/// §8's fragmentation scenario driven over a real `mpsc` transport: a small
/// mtu forces `a`'s snapshot of a multi-kilobyte document to travel as many
/// `FragmentFrame::Data` pieces, and `b` must reassemble them before the
/// sync-response ever reaches its reducer.
#[tokio::test]
async fn a_large_snapshot_fragments_over_a_small_mtu_and_reassembles_whole() {
	let adapter_a = Arc::new(InMemoryAdapter::with_mtu(identity(1, "alice"), 48));
	let adapter_b = Arc::new(InMemoryAdapter::with_mtu(identity(2, "bob"), 48));

	use sync_adapter::Adapter as _;
	adapter_a.on_start().await.unwrap();
	adapter_b.on_start().await.unwrap();

	let synchronizer_a = Arc::new(AsyncMutex::new(Synchronizer::new(
		Some(PeerId::parse("1").unwrap()),
		Arc::new(|_| Box::new(FakeDoc::default())),
		Rules::default(),
		adapter_a.clone(),
		Arc::new(NullEvents),
	)));
	let synchronizer_b = Arc::new(AsyncMutex::new(Synchronizer::new(
		Some(PeerId::parse("2").unwrap()),
		Arc::new(|_| Box::new(FakeDoc::default())),
		Rules::default(),
		adapter_b.clone(),
		Arc::new(NullEvents),
	)));

	connect_pair(adapter_a, synchronizer_a.clone(), adapter_b, synchronizer_b.clone()).await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	let doc_id = DocId::new("big-doc");
	let content = vec![42u8; 4_000];
	{
		let mut a = synchronizer_a.lock().await;
		a.ensure_document(&doc_id);
		a.document_mut(&doc_id).unwrap().import(&content).unwrap();
		a.dispatch(InboundMessage::AddDocument { doc_id: doc_id.clone() }).await;
	}

	// The announce -> sync-request -> fragmented snapshot -> reassembly ->
	// import chain all runs on the spawned reader tasks.
	tokio::time::sleep(Duration::from_millis(200)).await;

	let b = synchronizer_b.lock().await;
	let doc = b.model().documents.get(&doc_id).expect("b learned about the document");
	assert_eq!(doc.crdt_doc.export_snapshot(), content, "fragmented snapshot reassembled to the original bytes");
}

/// §8's permission-deny scenario: `b` denies `canUpdate`, so the snapshot
/// `a` pushes for a newly announced document is dropped on arrival and never
/// imported, even though the sync-request/response round trip itself
/// completes normally over the wire.
#[tokio::test]
async fn a_peer_that_denies_can_update_never_imports_the_pushed_document() {
	let adapter_a = Arc::new(InMemoryAdapter::new(identity(1, "alice")));
	let adapter_b = Arc::new(InMemoryAdapter::new(identity(2, "bob")));

	use sync_adapter::Adapter as _;
	adapter_a.on_start().await.unwrap();
	adapter_b.on_start().await.unwrap();

	let synchronizer_a = Arc::new(AsyncMutex::new(Synchronizer::new(
		Some(PeerId::parse("1").unwrap()),
		Arc::new(|_| Box::new(FakeDoc::default())),
		Rules::default(),
		adapter_a.clone(),
		Arc::new(NullEvents),
	)));
	let b_rules = create_rules().can_update(|_| false).build();
	let synchronizer_b = Arc::new(AsyncMutex::new(Synchronizer::new(
		Some(PeerId::parse("2").unwrap()),
		Arc::new(|_| Box::new(FakeDoc::default())),
		b_rules,
		adapter_b.clone(),
		Arc::new(NullEvents),
	)));

	connect_pair(adapter_a, synchronizer_a.clone(), adapter_b, synchronizer_b.clone()).await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	let doc_id = DocId::new("denied-doc");
	{
		let mut a = synchronizer_a.lock().await;
		a.ensure_document(&doc_id);
		a.document_mut(&doc_id).unwrap().import(b"secret").unwrap();
		a.dispatch(InboundMessage::AddDocument { doc_id: doc_id.clone() }).await;
	}

	tokio::time::sleep(Duration::from_millis(100)).await;

	let b = synchronizer_b.lock().await;
	let doc = b.model().documents.get(&doc_id).expect("b still tracks the announced placeholder");
	assert!(!doc.crdt_doc.has_content(), "canUpdate=false must keep the pushed snapshot out of the document");
}
