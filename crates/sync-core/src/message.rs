//! The closed set of messages the reducer accepts.

use sync_types::document::Version;
use sync_types::ids::{AdapterType, ChannelId, DocId, PeerId};
use sync_wire::{ChannelMessage, EphemeralStoreEntry};

use crate::model::ChannelKind;

/// A freshly registered channel, handed to the reducer on `peer-arrived`.
/// `peer-arrived` here names the event the source system fires once a
/// channel finishes the establishment handshake — not literally a peer
/// showing up out of nowhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EstablishedChannel {
	pub channel_id: ChannelId,
	pub kind: ChannelKind,
	pub adapter_type: AdapterType,
	pub peer_id: PeerId,
	pub name: String,
	pub typ: String,
}

/// The closed set of inputs the pure reducer understands (§4.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
	PeerArrived(EstablishedChannel),
	PeerDeparted { channel_id: ChannelId },
	ChannelReceive { from_channel_id: ChannelId, message: ChannelMessage },
	LocalDocChange { doc_id: DocId },
	LocalEphemeralChange { doc_id: DocId, namespace: String },
	AddDocument { doc_id: DocId },
	RemoveDocument { doc_id: DocId },
	HeartbeatTick,
}

pub use sync_wire::{SyncRequestEntry, Transmission};

/// One row of an ephemeral broadcast, independent of wire encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EphemeralRow {
	pub peer_id: PeerId,
	pub namespace: String,
	pub data: Vec<u8>,
}

impl From<EphemeralStoreEntry> for EphemeralRow {
	fn from(entry: EphemeralStoreEntry) -> Self {
		Self { peer_id: entry.peer_id, namespace: entry.namespace, data: entry.data }
	}
}

/// A requested document entry inside a `sync-request`, decoupled from wire
/// byte layout (carries a parsed [`Version`] rather than raw bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestedDoc {
	pub doc_id: DocId,
	pub requester_version: Version,
}

// vim: ts=4
