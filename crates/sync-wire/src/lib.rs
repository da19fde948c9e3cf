//! Binary wire codec and MTU fragmentation for the synchronizer runtime.
//!
//! This crate has no notion of peers, channels or rules — it only turns
//! [`message::Envelope`] values into bytes and back, and splits/reassembles
//! oversize frames. Everything stateful lives in `sync-core`.

pub mod error;
pub mod fragment;
pub mod message;
pub mod varint;

pub use error::{WireError, WireResult};
pub use fragment::{fragment, FragmentFrame, Reassembler};
pub use message::{
	ChannelMessage, Envelope, EphemeralStoreEntry, ErrorCode, Identity, Magic, MessageType,
	SyncRequestEntry, Transmission,
};

// vim: ts=4
