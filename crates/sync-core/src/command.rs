//! Imperative descriptions produced by the pure reducer. Commands never
//! touch the model directly; the executor performs their side effects.

use sync_types::document::Version;
use sync_types::ids::{ChannelId, DocId, PeerId};

use crate::message::{EphemeralRow, RequestedDoc};

/// A transmission to send back in a `sync-response`, with an owned `Version`
/// rather than wire bytes (the executor asks the document to encode it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransmissionPlan {
	UpToDate,
	Update { since: Version },
	Snapshot,
	Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
	/// Execute each command in order. `atomic` stops at the first failure;
	/// otherwise later commands run even if an earlier one errors (each is
	/// independently logged).
	Batch { commands: Vec<Command>, atomic: bool },
	StopChannel { channel_id: ChannelId },
	SendMessage { to_channel_ids: Vec<ChannelId>, message: sync_wire::ChannelMessage },
	SendSyncRequest {
		to_channel_id: ChannelId,
		docs: Vec<RequestedDoc>,
		bidirectional: bool,
		include_ephemeral: bool,
	},
	SendSyncResponse {
		doc_id: DocId,
		to_channel_id: ChannelId,
		transmission: TransmissionPlan,
		include_ephemeral: bool,
	},
	BroadcastEphemeralNamespace {
		doc_id: DocId,
		namespace: String,
		to_channel_ids: Vec<ChannelId>,
		hops_remaining: u64,
	},
	ApplyEphemeral { doc_id: DocId, stores: Vec<EphemeralRow> },
	RemoveEphemeralPeer { peer_id: PeerId },
	EvictExpiredEphemeral { ttl_secs: i64 },
	ImportDocData { doc_id: DocId, data: Vec<u8> },
	EmitReadyStateChanged { doc_id: DocId },
	EmitEphemeralChange { doc_id: DocId, namespace: String, peer_id: PeerId },
	SubscribeDoc { doc_id: DocId },
}

impl Command {
	/// Flattens nested `batch` commands into a single flat list, per §4.4's
	/// `send-message` contract and §8's batch-flattening law.
	pub fn flatten(self) -> Vec<Command> {
		match self {
			Command::Batch { commands, .. } => {
				commands.into_iter().flat_map(Command::flatten).collect()
			}
			other => vec![other],
		}
	}
}


// vim: ts=4
