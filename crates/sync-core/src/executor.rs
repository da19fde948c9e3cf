//! Executes `Command`s produced by the pure reducer (§4.4).
//!
//! Model mutation is supposed to happen only inside `reducer::update`; the
//! one deliberate exception is `import-doc-data`, which must call into the
//! opaque `CrdtDocument::import` to actually merge bytes — the reducer can't
//! do that itself without giving up the "pure" label entirely. Every other
//! handler here only reads the model and performs I/O: enqueuing on the
//! outbound batcher, touching the ephemeral manager, or emitting events.

use std::future::Future;

use async_trait::async_trait;

use sync_types::error::ClResult;
use sync_types::ids::{ChannelId, DocId, PeerId};
use sync_wire::ChannelMessage;

use crate::command::{Command, TransmissionPlan};
use crate::ephemeral::{EphemeralChangeEvent, EphemeralManager, EphemeralSource};
use crate::message::{EphemeralRow, InboundMessage};
use crate::model::{ReadyState, SynchronizerModel};

/// Side-effecting surface the executor dispatches onto for transport actions
/// that bypass the outbound batcher: channel shutdown. Kept as a trait
/// rather than a concrete adapter-set dependency so `sync-core` stays
/// adapter-agnostic; a concrete adapter crate implements it.
#[async_trait]
pub trait OutboundSink: Send + Sync {
	/// Send one already-encoded frame to `channel_id`.
	async fn send(&self, channel_id: ChannelId, frame: Vec<u8>) -> ClResult<()>;
	/// Stop `channel_id`; idempotent if already stopped.
	async fn stop(&self, channel_id: ChannelId) -> ClResult<()>;
}

/// One readiness/ephemeral-change notification, handed to whatever the
/// caller passed as an `EventSink` when constructing the `Synchronizer`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	ReadyStateChanged { doc_id: DocId, self_state: ReadyState, peers: Vec<(PeerId, ReadyState)> },
	EphemeralChange(EphemeralChangeEvent),
}

/// Receives `Event`s emitted from within the quiescence callback, preserving
/// ordering (§9: "event emitters become explicit channels/callbacks").
pub trait EventSink: Send + Sync {
	fn emit(&self, event: Event);
}

/// Flattens nested `channel/batch` payloads so `send-message` never enqueues
/// a batch-of-batches on the outbound batcher (§4.4's "flatten nested batch
/// payloads").
fn flatten_channel_message(message: ChannelMessage) -> Vec<ChannelMessage> {
	match message {
		ChannelMessage::Batch { messages } => messages.into_iter().flat_map(flatten_channel_message).collect(),
		other => vec![other],
	}
}

/// Computes the `ReadyState[]` entries for one document: one for ourselves,
/// one per peer, per §4.7.
fn ready_states(model: &SynchronizerModel, doc_id: &DocId) -> (ReadyState, Vec<(PeerId, ReadyState)>) {
	let self_state = match model.documents.get(doc_id) {
		None => ReadyState::Absent,
		Some(doc) if doc.crdt_doc.has_content() => ReadyState::Loaded,
		Some(_) => ReadyState::Aware,
	};
	let peers = model
		.peers
		.values()
		.filter_map(|peer| {
			let state = peer.sync_state(doc_id).to_ready_state()?;
			Some((peer.peer_id.clone(), state))
		})
		.collect();
	(self_state, peers)
}

/// Runs one command to completion against `model` (read-only except for the
/// `import-doc-data` exception above), `ephemeral`, the outbound batcher, the
/// transport sink, and the event sink. On success, returns follow-up
/// messages the scheduler should push back onto the work queue (e.g.
/// `local-doc-change` after an import, so propagation runs through the
/// ordinary reducer path). `batch { atomic: true }` stops at the first `Err`;
/// a non-atomic batch logs it and keeps going (§4.4, §7: "caught, logged
/// with structured fields, do not unwind the work queue").
pub fn execute<'a>(
	command: Command,
	model: &'a mut SynchronizerModel,
	ephemeral: &'a mut EphemeralManager,
	batcher: &'a mut crate::scheduler::OutboundBatcher,
	sink: &'a dyn OutboundSink,
	events: &'a dyn EventSink,
) -> std::pin::Pin<Box<dyn Future<Output = ClResult<Vec<InboundMessage>>> + Send + 'a>> {
	Box::pin(async move {
		match command {
			Command::Batch { commands, atomic } => {
				let mut follow_ups = Vec::new();
				for cmd in commands {
					match execute(cmd, model, ephemeral, batcher, sink, events).await {
						Ok(mut fu) => follow_ups.append(&mut fu),
						Err(err) => {
							tracing::warn!(error = %err, atomic, "batch command failed");
							if atomic {
								return Err(err);
							}
						}
					}
				}
				Ok(follow_ups)
			}
			Command::StopChannel { channel_id } => {
				sink.stop(channel_id).await?;
				Ok(Vec::new())
			}
			Command::SendMessage { to_channel_ids, message } => {
				let flattened = flatten_channel_message(message);
				for channel_id in to_channel_ids {
					if model.channel(channel_id).is_none() {
						tracing::warn!(channel_id = %channel_id, command = "send-message", "target channel unknown, dropping");
						continue;
					}
					for part in &flattened {
						batcher.enqueue(channel_id, part.clone());
					}
				}
				Ok(Vec::new())
			}
			Command::SendSyncRequest { to_channel_id, docs, bidirectional, include_ephemeral: _ } => {
				let entries = docs
					.into_iter()
					.map(|d| sync_wire::SyncRequestEntry { doc_id: d.doc_id, requester_version: d.requester_version.0 })
					.collect();
				batcher.enqueue(to_channel_id, ChannelMessage::SyncRequest { docs: entries, bidirectional });
				Ok(Vec::new())
			}
			Command::SendSyncResponse { doc_id, to_channel_id, transmission, include_ephemeral: _ } => {
				let Some(doc) = model.documents.get(&doc_id) else {
					tracing::warn!(doc_id = %doc_id, command = "send-sync-response", "document absent, skipping");
					return Ok(Vec::new());
				};
				let wire_transmission = match transmission {
					TransmissionPlan::UpToDate => sync_wire::Transmission::UpToDate { version: doc.crdt_doc.version().0 },
					TransmissionPlan::Update { since } => sync_wire::Transmission::Update {
						data: doc.crdt_doc.export_update_since(&since),
						version: doc.crdt_doc.version().0,
					},
					TransmissionPlan::Snapshot => sync_wire::Transmission::Snapshot {
						data: doc.crdt_doc.export_snapshot(),
						version: doc.crdt_doc.version().0,
					},
					TransmissionPlan::Unavailable => sync_wire::Transmission::Unavailable,
				};
				batcher.enqueue(to_channel_id, ChannelMessage::SyncResponse { doc_id, transmission: wire_transmission });
				Ok(Vec::new())
			}
			Command::BroadcastEphemeralNamespace { doc_id, namespace, to_channel_ids, hops_remaining } => {
				let rows = ephemeral.encode_namespace(&doc_id, &namespace);
				let stores = rows
					.into_iter()
					.map(|(peer_id, data)| sync_wire::EphemeralStoreEntry { peer_id, namespace: namespace.clone(), data })
					.collect::<Vec<_>>();
				for channel_id in to_channel_ids {
					batcher.enqueue(
						channel_id,
						ChannelMessage::Ephemeral { doc_id: doc_id.clone(), hops_remaining, stores: stores.clone() },
					);
				}
				Ok(Vec::new())
			}
			Command::ApplyEphemeral { doc_id, stores } => {
				for EphemeralRow { peer_id, namespace, data } in stores {
					let applied = ephemeral.apply_remote(&doc_id, &namespace, peer_id.clone(), data);
					if !applied {
						tracing::debug!(doc_id = %doc_id, namespace = %namespace, peer_id = %peer_id, "empty ephemeral row, deletion only");
					}
					events.emit(Event::EphemeralChange(EphemeralChangeEvent {
						doc_id: doc_id.clone(),
						namespace,
						peer_id,
						source: EphemeralSource::Remote,
					}));
				}
				Ok(Vec::new())
			}
			Command::RemoveEphemeralPeer { peer_id } => {
				let affected = ephemeral.remove_peer(&peer_id);
				Ok(affected.into_iter().map(|(doc_id, namespace)| InboundMessage::LocalEphemeralChange { doc_id, namespace }).collect())
			}
			Command::EvictExpiredEphemeral { ttl_secs } => {
				let now = sync_types::prelude::Timestamp::now();
				let affected = ephemeral.evict_expired(now, ttl_secs);
				Ok(affected.into_iter().map(|(doc_id, namespace)| InboundMessage::LocalEphemeralChange { doc_id, namespace }).collect())
			}
			Command::ImportDocData { doc_id, data } => {
				model.ensure_document(&doc_id);
				if let Some(doc) = model.documents.get_mut(&doc_id) {
					doc.crdt_doc.import(&data)?;
				}
				Ok(vec![InboundMessage::LocalDocChange { doc_id }])
			}
			Command::EmitReadyStateChanged { doc_id } => {
				let (self_state, peers) = ready_states(model, &doc_id);
				events.emit(Event::ReadyStateChanged { doc_id, self_state, peers });
				Ok(Vec::new())
			}
			Command::EmitEphemeralChange { doc_id, namespace, peer_id } => {
				events.emit(Event::EphemeralChange(EphemeralChangeEvent { doc_id, namespace, peer_id, source: EphemeralSource::Local }));
				Ok(Vec::new())
			}
			Command::SubscribeDoc { doc_id: _ } => {
				// The local CRDT subscription is attached by the Repo façade's
				// document handle, which owns the mutation entry point; nothing
				// for the executor to do beyond the document already existing.
				Ok(Vec::new())
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use sync_types::document::{CrdtDocument, Version, VersionOrdering};
	use sync_types::error::ClResult;
	use sync_types::ids::ChannelId as CoreChannelId;

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
			if self.ops == other.0 { VersionOrdering::Equal } else { VersionOrdering::Concurrent }
		}
		fn has_content(&self) -> bool {
			!self.ops.is_empty()
		}
	}

	struct NullSink;

	#[async_trait]
	impl OutboundSink for NullSink {
		async fn send(&self, _channel_id: CoreChannelId, _frame: Vec<u8>) -> ClResult<()> {
			Ok(())
		}
		async fn stop(&self, _channel_id: CoreChannelId) -> ClResult<()> {
			Ok(())
		}
	}

	#[derive(Default)]
	struct RecordingEvents {
		events: std::sync::Mutex<Vec<Event>>,
	}

	impl EventSink for RecordingEvents {
		fn emit(&self, event: Event) {
			self.events.lock().unwrap().push(event);
		}
	}

	fn test_model() -> SynchronizerModel {
		SynchronizerModel::new(None, std::sync::Arc::new(|_| Box::new(FakeDoc::default())))
	}

	#[tokio::test]
	async fn import_doc_data_applies_bytes_and_requests_local_doc_change() {
		let mut model = test_model();
		let mut ephemeral = EphemeralManager::new();
		let mut batcher = crate::scheduler::OutboundBatcher::new();
		let sink = NullSink;
		let events = RecordingEvents::default();
		let doc_id = DocId::new("demo");

		let follow_ups = execute(
			Command::ImportDocData { doc_id: doc_id.clone(), data: b"hello".to_vec() },
			&mut model,
			&mut ephemeral,
			&mut batcher,
			&sink,
			&events,
		)
		.await
		.unwrap();

		assert_eq!(follow_ups, vec![InboundMessage::LocalDocChange { doc_id: doc_id.clone() }]);
		assert!(model.documents[&doc_id].crdt_doc.has_content());
	}

	#[tokio::test]
	async fn emit_ready_state_changed_reports_loaded_once_doc_has_content() {
		let mut model = test_model();
		let doc_id = DocId::new("demo");
		model.ensure_document(&doc_id);
		model.documents.get_mut(&doc_id).unwrap().crdt_doc.import(b"x").unwrap();
		let mut ephemeral = EphemeralManager::new();
		let mut batcher = crate::scheduler::OutboundBatcher::new();
		let sink = NullSink;
		let events = RecordingEvents::default();

		execute(
			Command::EmitReadyStateChanged { doc_id: doc_id.clone() },
			&mut model,
			&mut ephemeral,
			&mut batcher,
			&sink,
			&events,
		)
		.await
		.unwrap();

		let recorded = events.events.into_inner().unwrap();
		assert_eq!(recorded, vec![Event::ReadyStateChanged { doc_id, self_state: ReadyState::Loaded, peers: vec![] }]);
	}

	#[tokio::test]
	async fn remove_ephemeral_peer_schedules_local_change_for_every_affected_namespace() {
		let mut model = test_model();
		let mut ephemeral = EphemeralManager::new();
		let peer_id = PeerId::parse("9").unwrap();
		ephemeral.set_local(&DocId::new("a"), "cursors", peer_id.clone(), vec![1]);
		let mut batcher = crate::scheduler::OutboundBatcher::new();
		let sink = NullSink;
		let events = RecordingEvents::default();

		let follow_ups = execute(
			Command::RemoveEphemeralPeer { peer_id },
			&mut model,
			&mut ephemeral,
			&mut batcher,
			&sink,
			&events,
		)
		.await
		.unwrap();

		assert_eq!(
			follow_ups,
			vec![InboundMessage::LocalEphemeralChange { doc_id: DocId::new("a"), namespace: "cursors".to_string() }]
		);
	}
}

// vim: ts=4
