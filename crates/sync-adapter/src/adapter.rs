//! The `Adapter` contract (§4.2): a transport or storage plugin producing
//! channels for the Synchronizer. Modeled after the teacher's
//! `CrdtAdapter`/`RtdbAdapter` traits — a small async surface a concrete
//! crate implements once per backend.

use async_trait::async_trait;
use sync_types::error::ClResult;
use sync_types::ids::{AdapterType, ChannelId};
use sync_wire::ChannelMessage;

/// Must not block the calling task beyond negligible bookkeeping — any real
/// I/O happens on tasks the adapter itself spawns.
#[async_trait]
pub trait Adapter: Send + Sync {
	/// The tag this adapter reports on every channel it creates.
	fn adapter_type(&self) -> AdapterType;

	/// Create initial channels and arrange for future inbound connections to
	/// register themselves. Valid once, from `initialized`.
	async fn on_start(&self) -> ClResult<()>;

	/// Trigger the establishment handshake on `channel_id` as the initiating
	/// side. Valid only while the adapter is `started`.
	async fn establish_channel(&self, channel_id: ChannelId) -> ClResult<()>;

	/// Terminal: after this call the adapter MUST NOT emit further callbacks
	/// for `channel_id`.
	async fn remove_channel(&self, channel_id: ChannelId) -> ClResult<()>;

	/// Release resources; after this the adapter MUST NOT call back at all.
	async fn on_stop(&self) -> ClResult<()>;

	/// Best-effort per-channel delivery of `message` to every id in
	/// `to_channel_ids`. Returns the count of channels it was actually handed
	/// to (not necessarily acknowledged).
	async fn send(&self, to_channel_ids: &[ChannelId], message: ChannelMessage) -> ClResult<usize>;
}

// vim: ts=4
