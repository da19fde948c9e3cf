//! Wires two `InMemoryAdapter`s together with a pair of `mpsc` links and
//! drives each side's handshake/forwarding loop, so tests can exercise a
//! full two-party sync session without any real transport.

use std::sync::Arc;

use sync_adapter::{advance, Adapter as _, HandshakeOutcome, HandshakeState, LocalIdentity};
use sync_core::model::ChannelKind;
use sync_core::{InboundMessage, Synchronizer};
use sync_types::ids::{AdapterType, ChannelId};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use crate::adapter::InMemoryAdapter;

/// Establishes one channel between `adapter_a` and `adapter_b`, spawns the
/// background tasks that feed each side's inbound frames into its
/// `Synchronizer`, then triggers the handshake from `a`'s side.
pub async fn connect_pair(
	adapter_a: Arc<InMemoryAdapter>,
	synchronizer_a: Arc<AsyncMutex<Synchronizer>>,
	adapter_b: Arc<InMemoryAdapter>,
	synchronizer_b: Arc<AsyncMutex<Synchronizer>>,
) {
	let (tx_ab, rx_ab) = mpsc::unbounded_channel::<Vec<u8>>();
	let (tx_ba, rx_ba) = mpsc::unbounded_channel::<Vec<u8>>();

	let channel_id_a = adapter_a.allocate_channel_id();
	let channel_id_b = adapter_b.allocate_channel_id();

	adapter_a.register_channel(channel_id_a, tx_ab).await.expect("register a's channel");
	adapter_b.register_channel(channel_id_b, tx_ba).await.expect("register b's channel");

	tokio::spawn(reader_loop(
		channel_id_a,
		adapter_a.adapter_type(),
		adapter_a.identity().clone(),
		adapter_a.clone(),
		rx_ba,
		synchronizer_a,
	));
	tokio::spawn(reader_loop(
		channel_id_b,
		adapter_b.adapter_type(),
		adapter_b.identity().clone(),
		adapter_b.clone(),
		rx_ab,
		synchronizer_b,
	));

	adapter_a.establish_channel(channel_id_a).await.expect("trigger handshake");
}

async fn reader_loop(
	channel_id: ChannelId,
	adapter_type: AdapterType,
	identity: LocalIdentity,
	adapter: Arc<InMemoryAdapter>,
	mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
	synchronizer: Arc<AsyncMutex<Synchronizer>>,
) {
	while let Some(bytes) = rx.recv().await {
		let (outcome, reply, raw, mtu, was_established) = {
			let mut directory = adapter.directory.lock().await;
			let Some(entry) = directory.get_mut(channel_id) else { break };
			let Some(message) = entry.reassemble(&bytes) else { continue };
			let was_established = matches!(entry.handshake, HandshakeState::Established { .. });
			let (outcome, reply) = advance(&mut entry.handshake, channel_id, ChannelKind::Network, &adapter_type, &identity, &message);
			(outcome, reply, entry.raw.clone(), entry.mtu, was_established)
		};

		if let Some(reply) = reply {
			let _ = sync_adapter::send_fragmented(&raw, mtu, reply).await;
		}

		match outcome {
			HandshakeOutcome::Established(established) => {
				synchronizer.lock().await.dispatch(InboundMessage::PeerArrived(established)).await;
			}
			HandshakeOutcome::Forward(message) => {
				synchronizer.lock().await.dispatch(InboundMessage::ChannelReceive { from_channel_id: channel_id, message }).await;
			}
			HandshakeOutcome::Closed => {
				if was_established {
					synchronizer.lock().await.dispatch(InboundMessage::PeerDeparted { channel_id }).await;
				}
				break;
			}
			HandshakeOutcome::Dropped => {}
		}
	}
}

// vim: ts=4
