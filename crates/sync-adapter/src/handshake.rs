//! The `establish-*` handshake (§4.2), carried at the envelope level
//! (`Envelope::JoinRequest`/`JoinResponseOk`/`JoinError`) rather than inside
//! `ChannelMessage` — establishment is transport plumbing the Synchronizer
//! never sees directly; it only learns about the result via `PeerArrived`.

use sync_core::message::EstablishedChannel;
use sync_core::model::ChannelKind;
use sync_types::ids::{AdapterType, ChannelId, PeerId};
use sync_wire::{ChannelMessage, Envelope, Identity};

/// Our own identity, handed to every channel this adapter establishes.
#[derive(Clone, Debug)]
pub struct LocalIdentity {
	pub peer_id: PeerId,
	pub name: String,
	pub typ: String,
	/// Accept a peer whose id equals our own. Off by default; tests that
	/// loop a channel back to itself turn it on explicitly (§4.2).
	pub allow_self: bool,
}

impl LocalIdentity {
	fn as_wire(&self) -> Identity {
		Identity { peer_id: self.peer_id.clone(), name: self.name.clone(), typ: self.typ.clone() }
	}
}

/// One channel's handshake progress. `AwaitingEstablishment` covers both
/// roles: the initiator is waiting for `JoinResponseOk`/`JoinError`, the
/// responder is waiting for the inbound `JoinRequest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
	AwaitingEstablishment,
	Established { peer_id: PeerId },
	Stopped,
}

/// What the adapter directory should do after feeding one raw inbound frame
/// through [`advance`].
pub enum HandshakeOutcome {
	/// The channel just finished establishing; hand this to the Synchronizer
	/// as `InboundMessage::PeerArrived`.
	Established(EstablishedChannel),
	/// An established channel's frame carried an ordinary channel message;
	/// hand this to the Synchronizer as `InboundMessage::ChannelReceive`.
	Forward(ChannelMessage),
	/// The peer asked to leave, or sent `JoinError`, or we rejected its
	/// `JoinRequest`. The channel is now `Stopped`; if it had previously
	/// established, the caller should dispatch `InboundMessage::PeerDeparted`.
	Closed,
	/// Decode failure, an envelope-level error notification, or a
	/// non-establishment message arriving before the channel is established
	/// (§4.2's ordering invariant: "any such message is logged and dropped").
	Dropped,
}

/// Builds the outbound `JoinRequest` frame for the initiating side of a
/// handshake (`Adapter::establish_channel`).
pub fn build_join_request(identity: &LocalIdentity) -> Vec<u8> {
	Envelope::JoinRequest { identity: identity.as_wire() }.encode()
}

/// Feeds one raw inbound frame through the handshake/channel-message state
/// machine, advancing `state` in place and returning both the outcome and
/// any reply frame that must be sent back immediately.
pub fn advance(
	state: &mut HandshakeState,
	channel_id: ChannelId,
	kind: ChannelKind,
	adapter_type: &AdapterType,
	identity: &LocalIdentity,
	bytes: &[u8],
) -> (HandshakeOutcome, Option<Vec<u8>>) {
	let envelope = match Envelope::decode(bytes) {
		Ok(envelope) => envelope,
		Err(err) => {
			let error = sync_types::error::Error::from(err);
			tracing::warn!(channel_id = %channel_id, error = %error, "dropping undecodable frame");
			return (HandshakeOutcome::Dropped, None);
		}
	};

	match envelope {
		Envelope::JoinRequest { identity: peer_identity } => {
			if *state != HandshakeState::AwaitingEstablishment {
				tracing::warn!(channel_id = %channel_id, "join-request on an already-established channel, dropping");
				return (HandshakeOutcome::Dropped, None);
			}
			if peer_identity.peer_id == identity.peer_id && !identity.allow_self {
				*state = HandshakeState::Stopped;
				let reply = Envelope::JoinError { reason: "peer id matches our own".into() }.encode();
				return (HandshakeOutcome::Closed, Some(reply));
			}
			*state = HandshakeState::Established { peer_id: peer_identity.peer_id.clone() };
			let reply = Envelope::JoinResponseOk { identity: identity.as_wire() }.encode();
			let established = EstablishedChannel {
				channel_id,
				kind,
				adapter_type: adapter_type.clone(),
				peer_id: peer_identity.peer_id,
				name: peer_identity.name,
				typ: peer_identity.typ,
			};
			(HandshakeOutcome::Established(established), Some(reply))
		}
		Envelope::JoinResponseOk { identity: peer_identity } => {
			if *state != HandshakeState::AwaitingEstablishment {
				tracing::warn!(channel_id = %channel_id, "join-response on an already-established channel, dropping");
				return (HandshakeOutcome::Dropped, None);
			}
			*state = HandshakeState::Established { peer_id: peer_identity.peer_id.clone() };
			let established = EstablishedChannel {
				channel_id,
				kind,
				adapter_type: adapter_type.clone(),
				peer_id: peer_identity.peer_id,
				name: peer_identity.name,
				typ: peer_identity.typ,
			};
			(HandshakeOutcome::Established(established), None)
		}
		Envelope::JoinError { reason } => {
			tracing::debug!(channel_id = %channel_id, reason = %reason, "peer rejected establishment");
			*state = HandshakeState::Stopped;
			(HandshakeOutcome::Closed, None)
		}
		Envelope::Leave { .. } => {
			*state = HandshakeState::Stopped;
			(HandshakeOutcome::Closed, None)
		}
		Envelope::DocUpdate { message } => {
			if !matches!(state, HandshakeState::Established { .. }) {
				tracing::warn!(channel_id = %channel_id, "channel message before establishment, dropping");
				return (HandshakeOutcome::Dropped, None);
			}
			(HandshakeOutcome::Forward(message), None)
		}
		Envelope::UpdateError { code } => {
			tracing::warn!(channel_id = %channel_id, code = ?code, "peer reported an update error");
			(HandshakeOutcome::Dropped, None)
		}
	}
}


// vim: ts=4
