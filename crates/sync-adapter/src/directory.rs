//! Tracks every channel a concrete adapter owns and routes outbound sends by
//! `ChannelId` (§4.2's "routing sends by channel id").

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sync_core::model::ChannelKind;
use sync_types::error::ClResult;
use sync_types::ids::{AdapterType, ChannelId};
use sync_wire::fragment::{FragmentFrame, Reassembler};

use crate::handshake::HandshakeState;

/// Below this, a channel never fragments; every frame is sent as
/// `FragmentFrame::Complete`. Concrete adapters with a real wire MTU should
/// pass the transport's actual limit instead.
pub const DEFAULT_MTU: usize = 64 * 1024;

/// How many distinct in-flight fragmented messages one channel's
/// `Reassembler` tracks before evicting the oldest (§4.1).
const MAX_PENDING_FRAGMENTED_MESSAGES: usize = 8;

/// The raw byte transport underneath one channel — a websocket, a pipe, an
/// in-process queue. Kept separate from `HandshakeState` so the directory can
/// own channel bookkeeping without knowing how bytes actually move.
#[async_trait]
pub trait RawSink: Send + Sync {
	async fn send_raw(&self, bytes: Vec<u8>) -> ClResult<()>;
}

/// Splits `bytes` into `mtu`-sized fragments and sends each one as its own
/// raw frame, so every outbound path (directory routing, the handshake's
/// direct sends) fragments identically.
pub async fn send_fragmented(raw: &Arc<dyn RawSink>, mtu: usize, bytes: Vec<u8>) -> ClResult<()> {
	for piece in sync_wire::fragment::fragment(&bytes, mtu) {
		raw.send_raw(piece.encode()).await?;
	}
	Ok(())
}

/// One channel's directory entry: its transport handle plus handshake state.
pub struct ChannelEntry {
	pub channel_id: ChannelId,
	pub kind: ChannelKind,
	pub adapter_type: AdapterType,
	pub handshake: HandshakeState,
	pub raw: std::sync::Arc<dyn RawSink>,
	/// Largest frame this channel's transport can carry in one piece.
	pub mtu: usize,
	/// One `Reassembler` per channel (§4.1's invariant that fragments from
	/// different channels must never share reassembly state).
	reassembler: Mutex<Reassembler>,
}

impl ChannelEntry {
	pub fn new(channel_id: ChannelId, kind: ChannelKind, adapter_type: AdapterType, handshake: HandshakeState, raw: Arc<dyn RawSink>) -> Self {
		Self::with_mtu(channel_id, kind, adapter_type, handshake, raw, DEFAULT_MTU)
	}

	pub fn with_mtu(
		channel_id: ChannelId,
		kind: ChannelKind,
		adapter_type: AdapterType,
		handshake: HandshakeState,
		raw: Arc<dyn RawSink>,
		mtu: usize,
	) -> Self {
		Self {
			channel_id,
			kind,
			adapter_type,
			handshake,
			raw,
			mtu,
			reassembler: Mutex::new(Reassembler::new(MAX_PENDING_FRAGMENTED_MESSAGES)),
		}
	}

	/// Feeds one raw inbound frame through this channel's fragment
	/// reassembler. Returns `Some(message)` once a full message is available;
	/// a decode failure is logged and treated as a dropped fragment, same as
	/// an undecodable envelope.
	pub fn reassemble(&self, bytes: &[u8]) -> Option<Vec<u8>> {
		let frame = match FragmentFrame::decode(bytes) {
			Ok(frame) => frame,
			Err(err) => {
				tracing::warn!(channel_id = %self.channel_id, error = %err, "dropping undecodable fragment frame");
				return None;
			}
		};
		match self.reassembler.lock().accept(frame) {
			Ok(message) => message,
			Err(err) => {
				tracing::warn!(channel_id = %self.channel_id, error = %err, "dropping malformed fragment sequence");
				None
			}
		}
	}

	/// Fragments `bytes` per this channel's mtu and sends each piece.
	pub async fn send_fragmented(&self, bytes: Vec<u8>) -> ClResult<()> {
		send_fragmented(&self.raw, self.mtu, bytes).await
	}
}

/// Registry of every channel a single `Adapter` currently owns.
#[derive(Default)]
pub struct ChannelDirectory {
	channels: HashMap<ChannelId, ChannelEntry>,
}

impl ChannelDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, entry: ChannelEntry) {
		self.channels.insert(entry.channel_id, entry);
	}

	pub fn get(&self, channel_id: ChannelId) -> Option<&ChannelEntry> {
		self.channels.get(&channel_id)
	}

	pub fn get_mut(&mut self, channel_id: ChannelId) -> Option<&mut ChannelEntry> {
		self.channels.get_mut(&channel_id)
	}

	pub fn remove(&mut self, channel_id: ChannelId) -> Option<ChannelEntry> {
		self.channels.remove(&channel_id)
	}

	pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
		self.channels.keys().copied()
	}

	/// Best-effort delivery of `frame` to every id in `to_channel_ids`.
	/// Returns the count of channels the frame was actually handed to; a
	/// missing or failing channel is logged and skipped, never aborts the
	/// others (§4.2: "best-effort per-channel delivery").
	pub async fn send_to(&self, to_channel_ids: &[ChannelId], frame: &[u8]) -> usize {
		let mut delivered = 0;
		for channel_id in to_channel_ids {
			let Some(entry) = self.channels.get(channel_id) else {
				tracing::warn!(channel_id = %channel_id, "send to unknown channel, skipping");
				continue;
			};
			match entry.send_fragmented(frame.to_vec()).await {
				Ok(()) => delivered += 1,
				Err(err) => tracing::warn!(channel_id = %channel_id, error = %err, "raw send failed"),
			}
		}
		delivered
	}
}


// vim: ts=4
