//! Splits oversize envelopes into MTU-sized fragments and reassembles them
//! on the receiving side.
//!
//! Frame layout on top of a transport that already delivers whole datagrams:
//! a one-byte prefix (`MESSAGE_COMPLETE` / `FRAGMENT_HEADER` / `FRAGMENT_DATA`)
//! followed by the fragment's payload.

use crate::error::{WireError, WireResult};
use crate::varint::{Reader, Writer};
use std::collections::HashMap;

const MESSAGE_COMPLETE: u8 = 0x00;
const FRAGMENT_HEADER: u8 = 0x01;
const FRAGMENT_DATA: u8 = 0x02;

/// A single frame as it travels over the transport, after fragmentation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentFrame {
	/// The whole message fit in one frame; no reassembly needed.
	Complete(Vec<u8>),
	/// First frame of a split message: total length and how many data
	/// fragments follow.
	Header { message_id: u64, total_len: u64, fragment_count: u64 },
	/// One chunk of a split message's payload.
	Data { message_id: u64, index: u64, chunk: Vec<u8> },
}

impl FragmentFrame {
	pub fn encode(&self) -> Vec<u8> {
		let mut w = Writer::new();
		match self {
			FragmentFrame::Complete(bytes) => {
				w.write_u8(MESSAGE_COMPLETE);
				w.write_bytes(bytes);
			}
			FragmentFrame::Header { message_id, total_len, fragment_count } => {
				w.write_u8(FRAGMENT_HEADER);
				w.write_uleb128(*message_id);
				w.write_uleb128(*total_len);
				w.write_uleb128(*fragment_count);
			}
			FragmentFrame::Data { message_id, index, chunk } => {
				w.write_u8(FRAGMENT_DATA);
				w.write_uleb128(*message_id);
				w.write_uleb128(*index);
				w.write_var_bytes(chunk);
			}
		}
		w.into_bytes()
	}

	pub fn decode(bytes: &[u8]) -> WireResult<Self> {
		let mut r = Reader::new(bytes);
		match r.read_u8()? {
			MESSAGE_COMPLETE => Ok(FragmentFrame::Complete(r.read_bytes(r.remaining())?.to_vec())),
			FRAGMENT_HEADER => Ok(FragmentFrame::Header {
				message_id: r.read_uleb128()?,
				total_len: r.read_uleb128()?,
				fragment_count: r.read_uleb128()?,
			}),
			FRAGMENT_DATA => Ok(FragmentFrame::Data {
				message_id: r.read_uleb128()?,
				index: r.read_uleb128()?,
				chunk: r.read_var_bytes()?,
			}),
			other => Err(WireError::UnknownMessageType(other)),
		}
	}
}

/// Splits `message` into frames no larger than `mtu` bytes each.
///
/// `mtu` must be at least 16 bytes; anything smaller can't even carry a
/// fragment header and is rejected rather than silently producing garbage.
pub fn fragment(message: &[u8], mtu: usize) -> Vec<FragmentFrame> {
	assert!(mtu >= 16, "mtu must be at least 16 bytes");
	// +1 for the MESSAGE_COMPLETE prefix byte charged against the budget.
	if message.len() + 1 <= mtu {
		return vec![FragmentFrame::Complete(message.to_vec())];
	}
	let message_id = stable_message_id(message);
	let chunk_size = mtu.saturating_sub(16).max(1);
	let chunks: Vec<&[u8]> = message.chunks(chunk_size).collect();
	let mut frames = Vec::with_capacity(chunks.len() + 1);
	frames.push(FragmentFrame::Header {
		message_id,
		total_len: message.len() as u64,
		fragment_count: chunks.len() as u64,
	});
	for (index, chunk) in chunks.into_iter().enumerate() {
		frames.push(FragmentFrame::Data { message_id, index: index as u64, chunk: chunk.to_vec() });
	}
	frames
}

/// A cheap, deterministic id derived from message content, used only to key
/// fragments belonging to the same message within a channel — not a content
/// hash in any cryptographic sense.
fn stable_message_id(message: &[u8]) -> u64 {
	let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
	for &byte in message {
		hash ^= u64::from(byte);
		hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
	}
	hash
}

struct PendingMessage {
	total_len: u64,
	fragment_count: u64,
	received: HashMap<u64, Vec<u8>>,
}

/// Per-channel reassembly state. One `Reassembler` is created per channel;
/// fragments from different channels must never share one instance.
pub struct Reassembler {
	pending: HashMap<u64, PendingMessage>,
	max_pending_messages: usize,
}

impl Reassembler {
	/// `max_pending_messages` bounds how many distinct in-flight messages this
	/// reassembler tracks at once; once the cap is exceeded some other pending
	/// message is evicted to make room, so a peer can't exhaust memory by
	/// opening unbounded partial messages.
	pub fn new(max_pending_messages: usize) -> Self {
		Self { pending: HashMap::new(), max_pending_messages: max_pending_messages.max(1) }
	}

	/// Feeds one received frame in. Returns `Some(message)` once a message is
	/// fully reassembled (or was already complete).
	pub fn accept(&mut self, frame: FragmentFrame) -> WireResult<Option<Vec<u8>>> {
		match frame {
			FragmentFrame::Complete(bytes) => Ok(Some(bytes)),
			FragmentFrame::Header { message_id, total_len, fragment_count } => {
				if self.pending.contains_key(&message_id) {
					// A conflicting/duplicate header for a message already in
					// flight: discard rather than clobber fragments already
					// received for it (§4.1 invariant (a)).
					tracing::warn!(message_id, "duplicate fragment header for in-flight message, discarding");
					return Ok(None);
				}
				self.evict_if_full();
				self.pending.insert(
					message_id,
					PendingMessage { total_len, fragment_count, received: HashMap::new() },
				);
				Ok(None)
			}
			FragmentFrame::Data { message_id, index, chunk } => {
				let Some(pending) = self.pending.get_mut(&message_id) else {
					// Data fragment with no header seen yet (header dropped,
					// or reordered past this reassembler's memory): drop it.
					return Ok(None);
				};
				if index >= pending.fragment_count {
					// Out-of-range index: accepting it would stall completion
					// forever since `received.len()` could never legitimately
					// reach `fragment_count`.
					tracing::warn!(message_id, index, "fragment index out of range, discarding");
					return Ok(None);
				}
				pending.received.insert(index, chunk);
				if pending.received.len() as u64 != pending.fragment_count {
					return Ok(None);
				}
				let pending = self.pending.remove(&message_id).expect("just matched above");
				let mut message = Vec::with_capacity(pending.total_len as usize);
				for i in 0..pending.fragment_count {
					let chunk = pending
						.received
						.get(&i)
						.ok_or(WireError::TruncatedField("fragment sequence"))?;
					message.extend_from_slice(chunk);
				}
				Ok(Some(message))
			}
		}
	}

	/// Called only for ids not already in `pending` (the caller rejects a
	/// repeat header for a tracked id before reaching here), so the incoming
	/// id itself is never a candidate victim.
	fn evict_if_full(&mut self) {
		if self.pending.len() < self.max_pending_messages {
			return;
		}
		if let Some(&victim) = self.pending.keys().next() {
			self.pending.remove(&victim);
		}
	}
}


// vim: ts=4
