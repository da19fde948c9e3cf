//! The pure(-ish) reducer: `update(model, msg) -> commands`.
//!
//! `CrdtDocument` is an opaque boundary type with no `Clone`, so unlike the
//! source's clone-per-dispatch model this reducer follows the "mutate only
//! during dispatch" discipline the spec allows for systems languages: `model`
//! is taken by `&mut` and mutated in place, exclusively from here. The only
//! other departure from strict purity is logging (`tracing::warn!`/`debug!`),
//! which has no effect on the returned commands.

use sync_types::document::{Version, VersionOrdering};
use sync_types::ids::{ChannelId, DocId, PeerId};
use sync_wire::{ChannelMessage, SyncRequestEntry, Transmission};

use crate::command::{Command, TransmissionPlan};
use crate::message::{EphemeralRow, EstablishedChannel, InboundMessage, RequestedDoc};
use crate::model::{ChannelLifecycle, DocSyncState, Peer, SynchronizerModel};
use crate::rules::{RuleContext, Rules};

/// Default relay depth for a freshly originated ephemeral broadcast.
const DEFAULT_EPHEMERAL_HOPS: u64 = 3;

pub fn update(model: &mut SynchronizerModel, rules: &Rules, msg: InboundMessage) -> Vec<Command> {
	match msg {
		InboundMessage::PeerArrived(established) => on_peer_arrived(model, established),
		InboundMessage::PeerDeparted { channel_id } => on_peer_departed(model, channel_id),
		InboundMessage::ChannelReceive { from_channel_id, message } => {
			on_channel_receive(model, rules, from_channel_id, message)
		}
		InboundMessage::LocalDocChange { doc_id } => on_local_doc_change(model, &doc_id),
		InboundMessage::LocalEphemeralChange { doc_id, namespace } => {
			on_local_ephemeral_change(model, &doc_id, &namespace)
		}
		InboundMessage::AddDocument { doc_id } => on_add_document(model, rules, &doc_id),
		InboundMessage::RemoveDocument { doc_id } => on_remove_document(model, &doc_id),
		InboundMessage::HeartbeatTick => on_heartbeat_tick(model),
	}
}

fn on_peer_arrived(model: &mut SynchronizerModel, established: EstablishedChannel) -> Vec<Command> {
	let EstablishedChannel { channel_id, kind, adapter_type, peer_id, name, typ } = established;
	model.channels.insert(
		channel_id,
		crate::model::ChannelRecord {
			channel_id,
			lifecycle: ChannelLifecycle::Established {
				kind,
				adapter_type,
				peer_id: peer_id.clone(),
			},
			last_inbound_at: sync_types::prelude::Timestamp::now(),
		},
	);
	model
		.peers
		.entry(peer_id.clone())
		.and_modify(|peer| {
			peer.channels.insert(channel_id);
		})
		.or_insert_with(|| Peer::new(peer_id.clone(), name, typ, channel_id));

	vec![Command::SendMessage { to_channel_ids: vec![channel_id], message: ChannelMessage::DirectoryRequest }]
}

fn on_peer_departed(model: &mut SynchronizerModel, channel_id: ChannelId) -> Vec<Command> {
	let Some(peer_id) = model.channels.get(&channel_id).and_then(|c| c.peer_id().cloned()) else {
		return Vec::new();
	};
	if let Some(record) = model.channels.get_mut(&channel_id) {
		record.lifecycle = ChannelLifecycle::Stopped;
	}
	let mut commands = Vec::new();
	if let Some(peer) = model.peers.get_mut(&peer_id) {
		peer.channels.remove(&channel_id);
		if peer.channels.is_empty() {
			model.peers.remove(&peer_id);
			commands.push(Command::RemoveEphemeralPeer { peer_id });
		}
	}
	commands
}

fn on_channel_receive(
	model: &mut SynchronizerModel,
	rules: &Rules,
	from_channel_id: ChannelId,
	message: ChannelMessage,
) -> Vec<Command> {
	if let Some(record) = model.channels.get_mut(&from_channel_id) {
		record.last_inbound_at = sync_types::prelude::Timestamp::now();
	}
	let Some(record) = model.channels.get(&from_channel_id) else {
		tracing::warn!(channel_id = %from_channel_id, "channel-receive on unknown channel");
		return Vec::new();
	};
	if !record.is_established() {
		tracing::warn!(channel_id = %from_channel_id, "non-establishment message on unestablished channel, dropping");
		return Vec::new();
	}
	dispatch_channel_message(model, rules, from_channel_id, message)
}

fn dispatch_channel_message(
	model: &mut SynchronizerModel,
	rules: &Rules,
	from_channel_id: ChannelId,
	message: ChannelMessage,
) -> Vec<Command> {
	match message {
		ChannelMessage::Batch { messages } => messages
			.into_iter()
			.flat_map(|inner| dispatch_channel_message(model, rules, from_channel_id, inner))
			.collect(),
		ChannelMessage::DirectoryRequest => on_directory_request(model, rules, from_channel_id),
		ChannelMessage::DirectoryResponse { doc_ids } | ChannelMessage::NewDoc { doc_ids } => {
			on_announced_docs(model, from_channel_id, doc_ids)
		}
		ChannelMessage::SyncRequest { docs, bidirectional } => {
			on_sync_request(model, rules, from_channel_id, docs, bidirectional)
		}
		ChannelMessage::SyncResponse { doc_id, transmission } => {
			on_sync_response(model, rules, from_channel_id, doc_id, transmission)
		}
		ChannelMessage::Ephemeral { doc_id, hops_remaining, stores } => {
			on_ephemeral(model, from_channel_id, doc_id, hops_remaining, stores)
		}
	}
}

fn peer_id_of(model: &SynchronizerModel, channel_id: ChannelId) -> Option<PeerId> {
	model.channels.get(&channel_id)?.peer_id().cloned()
}

fn rule_context<'a>(
	model: &'a SynchronizerModel,
	peer_id: &'a PeerId,
	channel_id: ChannelId,
	document: Option<&'a DocId>,
) -> Option<RuleContext<'a>> {
	let peer = model.peers.get(peer_id)?;
	let kind = match &model.channels.get(&channel_id)?.lifecycle {
		ChannelLifecycle::Established { kind, .. } => *kind,
		_ => return None,
	};
	Some(RuleContext {
		peer_id,
		peer_name: &peer.name,
		peer_type: &peer.typ,
		channel_id,
		channel_kind: kind,
		document,
	})
}

fn on_directory_request(
	model: &mut SynchronizerModel,
	rules: &Rules,
	from_channel_id: ChannelId,
) -> Vec<Command> {
	let Some(peer_id) = peer_id_of(model, from_channel_id) else { return Vec::new() };
	let mut doc_ids = Vec::new();
	for doc_id in model.documents.keys() {
		let Some(ctx) = rule_context(model, &peer_id, from_channel_id, Some(doc_id)) else { continue };
		if rules.can_reveal(&ctx) {
			doc_ids.push(doc_id.clone());
		}
	}
	vec![Command::SendMessage {
		to_channel_ids: vec![from_channel_id],
		message: ChannelMessage::DirectoryResponse { doc_ids },
	}]
}

/// Shared by `directory-response` and `new-doc`: for every announced id we
/// don't yet hold, create a placeholder document, mark it pending, and
/// request it.
fn on_announced_docs(
	model: &mut SynchronizerModel,
	from_channel_id: ChannelId,
	doc_ids: Vec<DocId>,
) -> Vec<Command> {
	let Some(peer_id) = peer_id_of(model, from_channel_id) else { return Vec::new() };
	let mut requested = Vec::new();
	for doc_id in doc_ids {
		if model.documents.contains_key(&doc_id) {
			continue;
		}
		model.ensure_document(&doc_id);
		if let Some(peer) = model.peers.get_mut(&peer_id) {
			peer
				.doc_sync_states
				.insert(doc_id.clone(), DocSyncState::Pending { last_updated: sync_types::prelude::Timestamp::now() });
		}
		requested.push(RequestedDoc { doc_id, requester_version: Version::empty() });
	}
	if requested.is_empty() {
		return Vec::new();
	}
	vec![Command::SendSyncRequest {
		to_channel_id: from_channel_id,
		docs: requested,
		bidirectional: true,
		include_ephemeral: false,
	}]
}

fn on_sync_request(
	model: &mut SynchronizerModel,
	rules: &Rules,
	from_channel_id: ChannelId,
	docs: Vec<SyncRequestEntry>,
	bidirectional: bool,
) -> Vec<Command> {
	let Some(peer_id) = peer_id_of(model, from_channel_id) else { return Vec::new() };
	let mut commands = Vec::new();
	let mut reciprocal = Vec::new();
	for entry in docs {
		let SyncRequestEntry { doc_id, requester_version } = entry;
		let requester_version = Version(requester_version);
		let Some(ctx) = rule_context(model, &peer_id, from_channel_id, Some(&doc_id)) else { continue };
		if !rules.can_subscribe(&ctx) {
			tracing::debug!(peer_id = %peer_id, doc_id = %doc_id, "canSubscribe denied, dropping sync-request entry");
			continue;
		}
		if let Some(peer) = model.peers.get_mut(&peer_id) {
			peer.subscriptions.insert(doc_id.clone());
			peer.doc_sync_states.insert(
				doc_id.clone(),
				DocSyncState::Synced { last_known_version: requester_version.clone(), last_updated: sync_types::prelude::Timestamp::now() },
			);
		}

		let transmission = match model.documents.get(&doc_id) {
			None => TransmissionPlan::Unavailable,
			Some(doc) if requester_version.is_empty() => {
				let _ = doc;
				TransmissionPlan::Snapshot
			}
			Some(doc) => match doc.crdt_doc.compare(&requester_version) {
				VersionOrdering::Equal => TransmissionPlan::UpToDate,
				VersionOrdering::Dominates => TransmissionPlan::Update { since: requester_version.clone() },
				VersionOrdering::Dominated | VersionOrdering::Concurrent => TransmissionPlan::Snapshot,
			},
		};
		commands.push(Command::SendSyncResponse {
			doc_id: doc_id.clone(),
			to_channel_id: from_channel_id,
			transmission,
			include_ephemeral: false,
		});

		if bidirectional {
			let our_version = model.documents.get(&doc_id).map(|d| d.crdt_doc.version()).unwrap_or_else(Version::empty);
			reciprocal.push(RequestedDoc { doc_id, requester_version: our_version });
		}
	}
	if !reciprocal.is_empty() {
		commands.push(Command::SendSyncRequest {
			to_channel_id: from_channel_id,
			docs: reciprocal,
			bidirectional: false,
			include_ephemeral: false,
		});
	}
	commands
}

fn on_sync_response(
	model: &mut SynchronizerModel,
	rules: &Rules,
	from_channel_id: ChannelId,
	doc_id: DocId,
	transmission: Transmission,
) -> Vec<Command> {
	let Some(peer_id) = peer_id_of(model, from_channel_id) else { return Vec::new() };

	match transmission {
		Transmission::UpToDate { version } => {
			set_peer_synced(model, &peer_id, &doc_id, Version(version));
			Vec::new()
		}
		Transmission::Unavailable => {
			if let Some(peer) = model.peers.get_mut(&peer_id) {
				peer.doc_sync_states.insert(doc_id, DocSyncState::Absent);
			}
			Vec::new()
		}
		Transmission::Update { data, version } | Transmission::Snapshot { data, version } => {
			let Some(ctx) = rule_context(model, &peer_id, from_channel_id, Some(&doc_id)) else {
				return Vec::new();
			};
			if !rules.can_update(&ctx) {
				let error = sync_types::error::Error::PermissionDenied { rule: "canUpdate", peer: peer_id.clone() };
				tracing::warn!(doc_id = %doc_id, error = %error, "rejected inbound transmission");
				return Vec::new();
			}
			// Peer awareness MUST be advanced before the import is applied:
			// the CRDT import triggers local-doc-change, whose handler
			// compares our version against peer awareness to decide who
			// needs a push. Advancing first here prevents echoing the data
			// straight back to its sender.
			set_peer_synced(model, &peer_id, &doc_id, Version(version));
			model.ensure_document(&doc_id);
			vec![Command::ImportDocData { doc_id, data }]
		}
	}
}

fn set_peer_synced(model: &mut SynchronizerModel, peer_id: &PeerId, doc_id: &DocId, version: Version) {
	if let Some(peer) = model.peers.get_mut(peer_id) {
		peer.doc_sync_states.insert(
			doc_id.clone(),
			DocSyncState::Synced { last_known_version: version, last_updated: sync_types::prelude::Timestamp::now() },
		);
	}
}

fn on_ephemeral(
	model: &mut SynchronizerModel,
	from_channel_id: ChannelId,
	doc_id: DocId,
	hops_remaining: u64,
	stores: Vec<sync_wire::EphemeralStoreEntry>,
) -> Vec<Command> {
	let rows: Vec<EphemeralRow> = stores.into_iter().map(EphemeralRow::from).collect();
	let mut commands = vec![Command::ApplyEphemeral { doc_id: doc_id.clone(), stores: rows.clone() }];
	if hops_remaining > 0 {
		let relay_targets: Vec<ChannelId> = model
			.peers_subscribed_to(&doc_id)
			.filter_map(Peer::preferred_channel)
			.filter(|c| *c != from_channel_id)
			.collect();
		if !relay_targets.is_empty() {
			commands.push(Command::SendMessage {
				to_channel_ids: relay_targets,
				message: ChannelMessage::Ephemeral {
					doc_id,
					hops_remaining: hops_remaining - 1,
					stores: rows
						.into_iter()
						.map(|r| sync_wire::EphemeralStoreEntry { peer_id: r.peer_id, namespace: r.namespace, data: r.data })
						.collect(),
				},
			});
		}
	}
	commands
}

fn on_local_doc_change(model: &mut SynchronizerModel, doc_id: &DocId) -> Vec<Command> {
	let Some(doc) = model.documents.get(doc_id) else { return Vec::new() };
	let mut commands = Vec::new();
	for peer in model.peers.values() {
		if !peer.subscriptions.contains(doc_id) {
			continue;
		}
		let Some(DocSyncState::Synced { last_known_version, .. }) = peer.doc_sync_states.get(doc_id) else {
			continue;
		};
		match doc.crdt_doc.compare(last_known_version) {
			VersionOrdering::Dominates | VersionOrdering::Concurrent => {
				let Some(channel_id) = peer.preferred_channel() else { continue };
				commands.push(Command::SendSyncResponse {
					doc_id: doc_id.clone(),
					to_channel_id: channel_id,
					transmission: TransmissionPlan::Update { since: last_known_version.clone() },
					include_ephemeral: false,
				});
			}
			VersionOrdering::Equal | VersionOrdering::Dominated => {}
		}
	}
	commands
}

fn on_local_ephemeral_change(model: &mut SynchronizerModel, doc_id: &DocId, namespace: &str) -> Vec<Command> {
	let mut commands = Vec::new();
	if let Some(peer_id) = model.identity.clone() {
		commands.push(Command::EmitEphemeralChange { doc_id: doc_id.clone(), namespace: namespace.to_string(), peer_id });
	}
	let to_channel_ids: Vec<ChannelId> =
		model.peers_subscribed_to(doc_id).filter_map(Peer::preferred_channel).collect();
	if !to_channel_ids.is_empty() {
		commands.push(Command::BroadcastEphemeralNamespace {
			doc_id: doc_id.clone(),
			namespace: namespace.to_string(),
			to_channel_ids,
			hops_remaining: DEFAULT_EPHEMERAL_HOPS,
		});
	}
	commands
}

/// A locally-added document is proactively announced to every already-
/// connected peer `canAnnounce` allows, so peers don't have to wait for a
/// directory poll to learn it exists (§4.6/§6 new-doc push).
fn on_add_document(model: &mut SynchronizerModel, rules: &Rules, doc_id: &DocId) -> Vec<Command> {
	model.ensure_document(doc_id);
	let mut commands = Vec::new();
	let peer_ids: Vec<PeerId> = model.peers.keys().cloned().collect();
	for peer_id in peer_ids {
		let Some(channel_id) = model.peers.get(&peer_id).and_then(Peer::preferred_channel) else { continue };
		let Some(ctx) = rule_context(model, &peer_id, channel_id, Some(doc_id)) else { continue };
		if !rules.can_announce(&ctx) {
			continue;
		}
		commands.push(Command::SendMessage {
			to_channel_ids: vec![channel_id],
			message: ChannelMessage::NewDoc { doc_ids: vec![doc_id.clone()] },
		});
	}
	commands.push(Command::EmitReadyStateChanged { doc_id: doc_id.clone() });
	commands
}

fn on_remove_document(model: &mut SynchronizerModel, doc_id: &DocId) -> Vec<Command> {
	model.documents.remove(doc_id);
	for peer in model.peers.values_mut() {
		peer.subscriptions.remove(doc_id);
		peer.doc_sync_states.remove(doc_id);
	}
	vec![Command::EmitReadyStateChanged { doc_id: doc_id.clone() }]
}

fn on_heartbeat_tick(model: &mut SynchronizerModel) -> Vec<Command> {
	let now = sync_types::prelude::Timestamp::now();
	let window = model.heartbeat_window_secs;
	let mut commands = Vec::new();
	for record in model.channels.values() {
		if record.is_established() && now.0 - record.last_inbound_at.0 > window {
			commands.push(Command::StopChannel { channel_id: record.channel_id });
		}
	}
	commands.push(Command::EvictExpiredEphemeral { ttl_secs: model.ephemeral_ttl_secs });
	commands
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::ChannelKind;
	use sync_types::document::CrdtDocument;
	use sync_types::error::ClResult;
	use sync_types::ids::AdapterType;

	/// A fake CRDT doc for tests only: its "version" is just the prefix of
	/// bytes applied so far, so `compare` can be defined without any real
	/// causal-history machinery.
	#[derive(Default)]
	struct FakeDoc {
		ops: Vec<u8>,
	}

	impl CrdtDocument for FakeDoc {
		fn version(&self) -> Version {
			Version(self.ops.clone())
		}

		fn export_snapshot(&self) -> Vec<u8> {
			self.ops.clone()
		}

		fn export_update_since(&self, base: &Version) -> Vec<u8> {
			if self.ops.starts_with(&base.0) { self.ops[base.0.len()..].to_vec() } else { self.ops.clone() }
		}

		fn import(&mut self, bytes: &[u8]) -> ClResult<()> {
			self.ops.extend_from_slice(bytes);
			Ok(())
		}

		fn compare(&self, other: &Version) -> VersionOrdering {
			if self.ops == other.0 {
				VersionOrdering::Equal
			} else if self.ops.starts_with(&other.0) {
				VersionOrdering::Dominates
			} else if other.0.starts_with(&self.ops) {
				VersionOrdering::Dominated
			} else {
				VersionOrdering::Concurrent
			}
		}

		fn has_content(&self) -> bool {
			!self.ops.is_empty()
		}
	}

	fn test_model() -> SynchronizerModel {
		SynchronizerModel::new(None, std::sync::Arc::new(|_| Box::new(FakeDoc::default())))
	}

	fn peer(n: u64) -> PeerId {
		PeerId::parse(&n.to_string()).unwrap()
	}

	fn arrive(model: &mut SynchronizerModel, channel_id: u64, peer_n: u64) -> ChannelId {
		let channel_id = ChannelId::from(channel_id);
		update(
			model,
			&Rules::default(),
			InboundMessage::PeerArrived(EstablishedChannel {
				channel_id,
				kind: ChannelKind::Network,
				adapter_type: AdapterType::new("test"),
				peer_id: peer(peer_n),
				name: "peer".into(),
				typ: "test".into(),
			}),
		);
		channel_id
	}

	#[test]
	fn establishing_a_channel_sends_directory_request() {
		let mut model = test_model();
		let channel_id = ChannelId::from(1);
		let commands = update(
			&mut model,
			&Rules::default(),
			InboundMessage::PeerArrived(EstablishedChannel {
				channel_id,
				kind: ChannelKind::Network,
				adapter_type: AdapterType::new("test"),
				peer_id: peer(1),
				name: "alice".into(),
				typ: "browser".into(),
			}),
		);
		assert_eq!(commands.len(), 1);
		assert!(matches!(
			&commands[0],
			Command::SendMessage { message: ChannelMessage::DirectoryRequest, .. }
		));
		assert!(model.peers.contains_key(&peer(1)));
	}

	#[test]
	fn directory_response_creates_pending_doc_and_sync_request() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		let commands = update(
			&mut model,
			&Rules::default(),
			InboundMessage::ChannelReceive {
				from_channel_id: channel_id,
				message: ChannelMessage::DirectoryResponse { doc_ids: vec![DocId::new("demo")] },
			},
		);
		assert!(model.documents.contains_key(&DocId::new("demo")));
		assert!(matches!(
			model.peers.get(&peer(1)).unwrap().doc_sync_states.get(&DocId::new("demo")),
			Some(DocSyncState::Pending { .. })
		));
		assert!(matches!(commands[0], Command::SendSyncRequest { bidirectional: true, .. }));
	}

	#[test]
	fn sync_request_for_known_doc_with_empty_version_yields_snapshot() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		model.ensure_document(&DocId::new("demo"));
		model.documents.get_mut(&DocId::new("demo")).unwrap().crdt_doc.import(b"hello").unwrap();
		let commands = update(
			&mut model,
			&Rules::default(),
			InboundMessage::ChannelReceive {
				from_channel_id: channel_id,
				message: ChannelMessage::SyncRequest {
					docs: vec![SyncRequestEntry { doc_id: DocId::new("demo"), requester_version: vec![] }],
					bidirectional: false,
				},
			},
		);
		assert_eq!(commands.len(), 1);
		assert!(matches!(
			&commands[0],
			Command::SendSyncResponse { transmission: TransmissionPlan::Snapshot, .. }
		));
		assert!(model.peers[&peer(1)].subscriptions.contains(&DocId::new("demo")));
	}

	#[test]
	fn sync_request_for_missing_doc_yields_unavailable_but_keeps_subscription() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		let commands = update(
			&mut model,
			&Rules::default(),
			InboundMessage::ChannelReceive {
				from_channel_id: channel_id,
				message: ChannelMessage::SyncRequest {
					docs: vec![SyncRequestEntry { doc_id: DocId::new("ghost"), requester_version: vec![] }],
					bidirectional: false,
				},
			},
		);
		assert!(matches!(
			&commands[0],
			Command::SendSyncResponse { transmission: TransmissionPlan::Unavailable, .. }
		));
		assert!(model.peers[&peer(1)].subscriptions.contains(&DocId::new("ghost")));
	}

	#[test]
	fn sync_response_update_imports_and_advances_awareness_without_echo() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		model.ensure_document(&DocId::new("demo"));
		model.peers.get_mut(&peer(1)).unwrap().subscriptions.insert(DocId::new("demo"));

		let commands = update(
			&mut model,
			&Rules::default(),
			InboundMessage::ChannelReceive {
				from_channel_id: channel_id,
				message: ChannelMessage::SyncResponse {
					doc_id: DocId::new("demo"),
					transmission: Transmission::Update { data: b"hello".to_vec(), version: b"hello".to_vec() },
				},
			},
		);
		assert_eq!(commands, vec![Command::ImportDocData { doc_id: DocId::new("demo"), data: b"hello".to_vec() }]);

		// The import command would normally be executed by the command
		// executor; simulate that here, then replay local-doc-change.
		model.documents.get_mut(&DocId::new("demo")).unwrap().crdt_doc.import(b"hello").unwrap();
		let echo_commands = update(&mut model, &Rules::default(), InboundMessage::LocalDocChange { doc_id: DocId::new("demo") });
		assert!(echo_commands.is_empty(), "peer is already up to date, must not echo back");
	}

	#[test]
	fn can_update_false_drops_transmission_and_preserves_awareness() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		model.ensure_document(&DocId::new("demo"));
		let rules = crate::rules::create_rules().can_update(|_| false).build();
		let commands = update(
			&mut model,
			&rules,
			InboundMessage::ChannelReceive {
				from_channel_id: channel_id,
				message: ChannelMessage::SyncResponse {
					doc_id: DocId::new("demo"),
					transmission: Transmission::Update { data: b"evil".to_vec(), version: b"evil".to_vec() },
				},
			},
		);
		assert!(commands.is_empty());
		assert_eq!(model.documents[&DocId::new("demo")].crdt_doc.version(), Version::empty());
	}

	#[test]
	fn heartbeat_stops_stale_established_channels() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		model.heartbeat_window_secs = 0;
		model.channels.get_mut(&channel_id).unwrap().last_inbound_at = sync_types::prelude::Timestamp(0);
		let commands = update(&mut model, &Rules::default(), InboundMessage::HeartbeatTick);
		assert_eq!(
			commands,
			vec![
				Command::StopChannel { channel_id },
				Command::EvictExpiredEphemeral { ttl_secs: model.ephemeral_ttl_secs },
			]
		);
	}

	#[test]
	fn peer_departure_below_last_channel_removes_peer_and_schedules_ephemeral_cleanup() {
		let mut model = test_model();
		let channel_id = arrive(&mut model, 1, 1);
		let commands = update(&mut model, &Rules::default(), InboundMessage::PeerDeparted { channel_id });
		assert!(!model.peers.contains_key(&peer(1)));
		assert_eq!(commands, vec![Command::RemoveEphemeralPeer { peer_id: peer(1) }]);
	}

	/// §8: "feeding the same sync-response{update} twice leaves the model
	/// equal to feeding it once". The reducer has no way to know whether a
	/// CRDT merge is idempotent — that's the engine's job — so this uses a
	/// toy doc whose `import` merges into a set, making the final content
	/// provably unchanged by a repeat, and checks the reducer reissues the
	/// identical command both times rather than drifting.
	#[test]
	fn idempotent_receipt_feeding_the_same_sync_response_twice_reaches_the_same_state() {
		#[derive(Default)]
		struct SetDoc {
			applied: std::collections::BTreeSet<Vec<u8>>,
		}
		impl CrdtDocument for SetDoc {
			fn version(&self) -> Version {
				Version(self.applied.iter().flatten().copied().collect())
			}
			fn export_snapshot(&self) -> Vec<u8> {
				self.version().0
			}
			fn export_update_since(&self, _base: &Version) -> Vec<u8> {
				self.version().0
			}
			fn import(&mut self, bytes: &[u8]) -> ClResult<()> {
				self.applied.insert(bytes.to_vec());
				Ok(())
			}
			fn compare(&self, other: &Version) -> VersionOrdering {
				if self.version().0 == other.0 { VersionOrdering::Equal } else { VersionOrdering::Concurrent }
			}
			fn has_content(&self) -> bool {
				!self.applied.is_empty()
			}
		}

		let mut model = SynchronizerModel::new(None, std::sync::Arc::new(|_| Box::new(SetDoc::default())));
		let channel_id = arrive(&mut model, 1, 1);
		model.ensure_document(&DocId::new("demo"));

		let receive_update = || InboundMessage::ChannelReceive {
			from_channel_id: channel_id,
			message: ChannelMessage::SyncResponse {
				doc_id: DocId::new("demo"),
				transmission: Transmission::Update { data: b"op-1".to_vec(), version: b"op-1".to_vec() },
			},
		};

		let first_commands = update(&mut model, &Rules::default(), receive_update());
		assert_eq!(first_commands, vec![Command::ImportDocData { doc_id: DocId::new("demo"), data: b"op-1".to_vec() }]);
		model.documents.get_mut(&DocId::new("demo")).unwrap().crdt_doc.import(b"op-1").unwrap();
		let ready_after_first = model.peers[&peer(1)].sync_state(&DocId::new("demo")).to_ready_state();
		let content_after_first = model.documents[&DocId::new("demo")].crdt_doc.export_snapshot();

		let second_commands = update(&mut model, &Rules::default(), receive_update());
		assert_eq!(second_commands, first_commands, "a repeat receipt reissues the identical import command");
		model.documents.get_mut(&DocId::new("demo")).unwrap().crdt_doc.import(b"op-1").unwrap();
		let ready_after_second = model.peers[&peer(1)].sync_state(&DocId::new("demo")).to_ready_state();
		let content_after_second = model.documents[&DocId::new("demo")].crdt_doc.export_snapshot();

		assert_eq!(ready_after_first, ready_after_second);
		assert_eq!(content_after_first, content_after_second, "re-applying the same update twice leaves content unchanged");
	}

	/// §8: "two sync-requests arriving on different channels produce the
	/// same set of outbound responses regardless of delivery order."
	#[test]
	fn order_independence_two_sync_requests_on_different_channels_yield_same_responses_regardless_of_order() {
		fn run_in_order(first_idx: usize, second_idx: usize) -> [Vec<Command>; 2] {
			let mut model = test_model();
			let channel_a = arrive(&mut model, 1, 1);
			let channel_b = arrive(&mut model, 2, 2);
			model.ensure_document(&DocId::new("demo"));
			model.documents.get_mut(&DocId::new("demo")).unwrap().crdt_doc.import(b"hello").unwrap();

			let channels = [channel_a, channel_b];
			let request_for = |channel_id: ChannelId| InboundMessage::ChannelReceive {
				from_channel_id: channel_id,
				message: ChannelMessage::SyncRequest {
					docs: vec![SyncRequestEntry { doc_id: DocId::new("demo"), requester_version: Vec::new() }],
					bidirectional: false,
				},
			};

			let mut responses = [Vec::new(), Vec::new()];
			for &idx in &[first_idx, second_idx] {
				responses[idx] = update(&mut model, &Rules::default(), request_for(channels[idx]));
			}
			responses
		}

		let forward = run_in_order(0, 1);
		let reversed = run_in_order(1, 0);

		assert_eq!(forward[0], reversed[0], "channel a's response is unaffected by delivery order");
		assert_eq!(forward[1], reversed[1], "channel b's response is unaffected by delivery order");
	}
}

// vim: ts=4
