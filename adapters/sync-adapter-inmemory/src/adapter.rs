//! `InMemoryAdapter`: a concrete `Adapter` whose channels are in-process
//! `mpsc` links rather than a real transport. Grounded on the concrete
//! adapter-crate pattern (one struct wrapping a backend, implementing the
//! trait the core crate defines) rather than on any one backend's storage
//! details, since here the "backend" is just a paired queue.

use std::sync::Arc;

use async_trait::async_trait;
use sync_adapter::{Adapter, AdapterLifecycleGuard, ChannelDirectory, ChannelEntry, HandshakeState, LocalIdentity, RawSink};
use sync_core::model::ChannelKind;
use sync_core::OutboundSink;
use sync_types::error::{ClResult, Error};
use sync_types::ids::{AdapterType, ChannelId, ChannelIdAllocator};
use sync_wire::{ChannelMessage, Envelope};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Sends raw frames into one end of an in-process `mpsc` link.
pub(crate) struct LinkSink {
	pub(crate) tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl RawSink for LinkSink {
	async fn send_raw(&self, bytes: Vec<u8>) -> ClResult<()> {
		self.tx
			.send(bytes)
			.map_err(|_| Error::AdapterFault { adapter_type: "inmemory".into(), cause: "peer link closed".into() })
	}
}

/// An in-process adapter whose channels are paired `mpsc` queues rather than
/// a real socket (§4.2, ambient addition per the in-memory pattern).
pub struct InMemoryAdapter {
	identity: LocalIdentity,
	adapter_type: AdapterType,
	lifecycle: AdapterLifecycleGuard,
	ids: ChannelIdAllocator,
	mtu: usize,
	pub(crate) directory: AsyncMutex<ChannelDirectory>,
}

impl InMemoryAdapter {
	pub fn new(identity: LocalIdentity) -> Self {
		Self::with_mtu(identity, sync_adapter::DEFAULT_MTU)
	}

	/// Builds the adapter with a chosen per-channel MTU; tests that want to
	/// exercise fragmentation over a real `mpsc` link pass a small value here.
	pub fn with_mtu(identity: LocalIdentity, mtu: usize) -> Self {
		Self {
			identity,
			adapter_type: AdapterType::new("inmemory"),
			lifecycle: AdapterLifecycleGuard::new(),
			ids: ChannelIdAllocator::new(),
			mtu,
			directory: AsyncMutex::new(ChannelDirectory::new()),
		}
	}

	pub fn identity(&self) -> &LocalIdentity {
		&self.identity
	}

	pub fn allocate_channel_id(&self) -> ChannelId {
		self.ids.allocate()
	}

	/// Registers a new channel, wired to `tx` for outbound delivery, awaiting
	/// the establishment handshake. Valid only while `started`.
	pub async fn register_channel(&self, channel_id: ChannelId, tx: mpsc::UnboundedSender<Vec<u8>>) -> ClResult<()> {
		self.lifecycle.require_started()?;
		let mut directory = self.directory.lock().await;
		directory.insert(ChannelEntry::with_mtu(
			channel_id,
			ChannelKind::Network,
			self.adapter_type.clone(),
			HandshakeState::AwaitingEstablishment,
			Arc::new(LinkSink { tx }),
			self.mtu,
		));
		Ok(())
	}
}

#[async_trait]
impl Adapter for InMemoryAdapter {
	fn adapter_type(&self) -> AdapterType {
		self.adapter_type.clone()
	}

	async fn on_start(&self) -> ClResult<()> {
		self.lifecycle.initialize()?;
		self.lifecycle.start()
	}

	async fn establish_channel(&self, channel_id: ChannelId) -> ClResult<()> {
		self.lifecycle.require_started()?;
		let directory = self.directory.lock().await;
		let Some(entry) = directory.get(channel_id) else {
			return Err(Error::UnknownPeer(channel_id));
		};
		let frame = sync_adapter::build_join_request(&self.identity);
		entry.send_fragmented(frame).await
	}

	async fn remove_channel(&self, channel_id: ChannelId) -> ClResult<()> {
		let mut directory = self.directory.lock().await;
		directory.remove(channel_id);
		Ok(())
	}

	async fn on_stop(&self) -> ClResult<()> {
		let mut directory = self.directory.lock().await;
		for channel_id in directory.channel_ids().collect::<Vec<_>>() {
			directory.remove(channel_id);
		}
		self.lifecycle.stop()
	}

	async fn send(&self, to_channel_ids: &[ChannelId], message: ChannelMessage) -> ClResult<usize> {
		let frame = Envelope::DocUpdate { message }.encode();
		let directory = self.directory.lock().await;
		Ok(directory.send_to(to_channel_ids, &frame).await)
	}
}

/// Lets `InMemoryAdapter` serve directly as the `Synchronizer`'s
/// `OutboundSink`, so one struct plays both the adapter-facing and the
/// executor-facing role.
#[async_trait]
impl OutboundSink for InMemoryAdapter {
	async fn send(&self, channel_id: ChannelId, frame: Vec<u8>) -> ClResult<()> {
		let directory = self.directory.lock().await;
		if directory.send_to(&[channel_id], &frame).await == 0 {
			return Err(Error::ChannelStopped(channel_id));
		}
		Ok(())
	}

	async fn stop(&self, channel_id: ChannelId) -> ClResult<()> {
		let frame = Envelope::Leave { channel_id }.encode();
		let directory = self.directory.lock().await;
		let _ = directory.send_to(&[channel_id], &frame).await;
		drop(directory);
		self.remove_channel(channel_id).await
	}
}

// vim: ts=4
