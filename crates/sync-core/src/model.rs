//! Pure data: documents, peers, channels and our knowledge of their sync state.
//!
//! Nothing in this module performs I/O or holds a callback. Cyclic
//! relationships are expressed as id lookups rather than owned back-pointers:
//! peers hold `ChannelId`s and `DocId`s, channels hold a `PeerId` once
//! established, documents are found by `DocId`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sync_types::document::{CrdtDocument, Version, VersionOrdering};
use sync_types::ids::{AdapterType, ChannelId, DocId, PeerId};
use sync_types::prelude::Timestamp;

/// Mints an empty CRDT document for a freshly discovered or locally requested
/// `DocId`. Injected because `CrdtDocument` is an opaque boundary trait with
/// no way to construct an instance generically.
pub type DocumentFactory = Arc<dyn Fn(DocId) -> Box<dyn CrdtDocument> + Send + Sync>;

/// Our knowledge of a single peer's sync state for a single document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocSyncState {
	/// We have never discussed this document with this peer.
	Unknown,
	/// The peer does not hold this document.
	Absent,
	/// We have asked and are waiting for a response.
	Pending { last_updated: Timestamp },
	/// We believe the peer's version is `last_known_version`.
	Synced { last_known_version: Version, last_updated: Timestamp },
}

/// Which transport/storage kind a channel belongs to, for `ReadyState` display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
	Network,
	Storage,
}

/// Lifecycle of a single channel. Transitions only move forward:
/// `Generated -> Connected -> Established -> Stopped`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelLifecycle {
	Generated,
	Connected { kind: ChannelKind, adapter_type: AdapterType },
	Established { kind: ChannelKind, adapter_type: AdapterType, peer_id: PeerId },
	Stopped,
}

/// One registered channel and its lifecycle state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRecord {
	pub channel_id: ChannelId,
	pub lifecycle: ChannelLifecycle,
	pub last_inbound_at: Timestamp,
}

impl ChannelRecord {
	pub fn new_generated(channel_id: ChannelId) -> Self {
		Self { channel_id, lifecycle: ChannelLifecycle::Generated, last_inbound_at: Timestamp::now() }
	}

	pub fn is_established(&self) -> bool {
		matches!(self.lifecycle, ChannelLifecycle::Established { .. })
	}

	pub fn peer_id(&self) -> Option<&PeerId> {
		match &self.lifecycle {
			ChannelLifecycle::Established { peer_id, .. } => Some(peer_id),
			_ => None,
		}
	}
}

/// A peer known through at least one established channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
	pub peer_id: PeerId,
	pub name: String,
	pub typ: String,
	pub channels: HashSet<ChannelId>,
	pub subscriptions: HashSet<DocId>,
	pub doc_sync_states: HashMap<DocId, DocSyncState>,
}

impl Peer {
	pub fn new(peer_id: PeerId, name: String, typ: String, channel_id: ChannelId) -> Self {
		Self {
			peer_id,
			name,
			typ,
			channels: HashSet::from([channel_id]),
			subscriptions: HashSet::new(),
			doc_sync_states: HashMap::new(),
		}
	}

	pub fn sync_state(&self, doc_id: &DocId) -> &DocSyncState {
		self.doc_sync_states.get(doc_id).unwrap_or(&DocSyncState::Unknown)
	}

	/// Any established channel for this peer; callers MAY prefer the most
	/// recently added one, which is what this picks among ties.
	pub fn preferred_channel(&self) -> Option<ChannelId> {
		self.channels.iter().max_by_key(|c| c.as_u64()).copied()
	}
}

/// A document known to the Synchronizer. The CRDT engine itself is opaque;
/// this struct only tracks which one backs a given `DocId`.
pub struct Document {
	pub doc_id: DocId,
	pub crdt_doc: Box<dyn CrdtDocument>,
}

impl Document {
	pub fn new(doc_id: DocId, crdt_doc: Box<dyn CrdtDocument>) -> Self {
		Self { doc_id, crdt_doc }
	}
}

/// How a document appears from one vantage point (ourselves or a peer),
/// per §4.7's `ReadyState[]` computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyState {
	Aware,
	Loaded,
	Absent,
}

impl DocSyncState {
	/// The `ReadyState` a peer's `DocSyncState` maps onto, or `None` for
	/// `Unknown` (which contributes no entry at all).
	pub fn to_ready_state(&self) -> Option<ReadyState> {
		match self {
			DocSyncState::Unknown => None,
			DocSyncState::Absent => Some(ReadyState::Absent),
			DocSyncState::Pending { .. } => Some(ReadyState::Aware),
			DocSyncState::Synced { .. } => Some(ReadyState::Loaded),
		}
	}
}

/// `{ identity, documents, peers, channels }` — the whole Synchronizer state.
/// Mutated only from within [`crate::reducer::update`].
pub struct SynchronizerModel {
	pub identity: Option<PeerId>,
	pub documents: HashMap<DocId, Document>,
	pub peers: HashMap<PeerId, Peer>,
	pub channels: HashMap<ChannelId, ChannelRecord>,
	pub doc_factory: DocumentFactory,
	/// Seconds of established-channel silence the heartbeat tolerates before
	/// stopping a channel.
	pub heartbeat_window_secs: i64,
	/// Seconds an ephemeral row survives without a refreshing write before the
	/// heartbeat sweep drops it.
	pub ephemeral_ttl_secs: i64,
}

impl SynchronizerModel {
	pub fn new(identity: Option<PeerId>, doc_factory: DocumentFactory) -> Self {
		Self {
			identity,
			documents: HashMap::new(),
			peers: HashMap::new(),
			channels: HashMap::new(),
			doc_factory,
			heartbeat_window_secs: 60,
			ephemeral_ttl_secs: 300,
		}
	}

	/// Creates and inserts an empty document for `doc_id` via the injected
	/// factory, if one isn't already present.
	pub fn ensure_document(&mut self, doc_id: &DocId) {
		if self.documents.contains_key(doc_id) {
			return;
		}
		let factory = self.doc_factory.clone();
		let crdt_doc = factory(doc_id.clone());
		self.documents.insert(doc_id.clone(), Document::new(doc_id.clone(), crdt_doc));
	}

	pub fn channel(&self, channel_id: ChannelId) -> Option<&ChannelRecord> {
		self.channels.get(&channel_id)
	}

	pub fn peer_for_channel(&self, channel_id: ChannelId) -> Option<&Peer> {
		let peer_id = self.channels.get(&channel_id)?.peer_id()?;
		self.peers.get(peer_id)
	}

	pub fn peers_subscribed_to(&self, doc_id: &DocId) -> impl Iterator<Item = &Peer> {
		self.peers.values().filter(move |p| p.subscriptions.contains(doc_id))
	}

	/// Compares two frontiers through whichever document's engine is asked;
	/// a small helper kept here because every reducer branch needs it.
	pub fn compare_versions(doc: &dyn CrdtDocument, other: &Version) -> VersionOrdering {
		doc.compare(other)
	}

	/// Invariant check used by tests: every established channel's bound peer
	/// actually lists that channel, and vice versa (§8 peer<->channel symmetry).
	pub fn peer_channel_symmetry_holds(&self) -> bool {
		for record in self.channels.values() {
			if let ChannelLifecycle::Established { peer_id, .. } = &record.lifecycle {
				match self.peers.get(peer_id) {
					Some(peer) if peer.channels.contains(&record.channel_id) => {}
					_ => return false,
				}
			}
		}
		for peer in self.peers.values() {
			for channel_id in &peer.channels {
				match self.channels.get(channel_id) {
					Some(record) if record.peer_id() == Some(&peer.peer_id) => {}
					_ => return false,
				}
			}
		}
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unknown_sync_state_yields_no_ready_state_entry() {
		assert_eq!(DocSyncState::Unknown.to_ready_state(), None);
	}

	#[test]
	fn pending_and_synced_map_to_aware_and_loaded() {
		assert_eq!(
			DocSyncState::Pending { last_updated: Timestamp::now() }.to_ready_state(),
			Some(ReadyState::Aware)
		);
		assert_eq!(
			DocSyncState::Synced { last_known_version: Version(vec![]), last_updated: Timestamp::now() }
				.to_ready_state(),
			Some(ReadyState::Loaded)
		);
	}

	#[test]
	fn empty_model_satisfies_symmetry_trivially() {
		let model = SynchronizerModel::new(None, std::sync::Arc::new(|_| panic!("unused in this test")));
		assert!(model.peer_channel_symmetry_holds());
	}
}

// vim: ts=4
