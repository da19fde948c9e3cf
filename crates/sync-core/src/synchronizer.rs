//! Ties the model, reducer, rules, ephemeral manager, executor and scheduler
//! together behind one `dispatch(msg)` entry point (§4.5, §5).

use std::sync::Arc;

use sync_types::document::CrdtDocument;
use sync_types::ids::{DocId, PeerId};

use crate::ephemeral::EphemeralManager;
use crate::executor::{self, EventSink, OutboundSink};
use crate::message::InboundMessage;
use crate::model::{DocumentFactory, SynchronizerModel};
use crate::reducer;
use crate::rules::Rules;
use crate::scheduler::{CancelSignal, OutboundBatcher, WorkQueue};

/// The single-threaded cooperative orchestrator. Not `Clone`, not `Sync`:
/// every call funnels through `&mut self`, matching §5's "external callers
/// MUST funnel all calls onto one scheduler."
pub struct Synchronizer {
	model: SynchronizerModel,
	rules: Rules,
	ephemeral: EphemeralManager,
	queue: WorkQueue,
	batcher: OutboundBatcher,
	sink: Arc<dyn OutboundSink>,
	events: Arc<dyn EventSink>,
	cancel: CancelSignal,
}

impl Synchronizer {
	pub fn new(
		identity: Option<PeerId>,
		doc_factory: DocumentFactory,
		rules: Rules,
		sink: Arc<dyn OutboundSink>,
		events: Arc<dyn EventSink>,
	) -> Self {
		Self {
			model: SynchronizerModel::new(identity, doc_factory),
			rules,
			ephemeral: EphemeralManager::new(),
			queue: WorkQueue::new(),
			batcher: OutboundBatcher::new(),
			sink,
			events,
			cancel: CancelSignal::new(),
		}
	}

	pub fn model(&self) -> &SynchronizerModel {
		&self.model
	}

	pub fn ephemeral(&self) -> &EphemeralManager {
		&self.ephemeral
	}

	/// Mutable access for `presence.set(...)`-style local ephemeral writes,
	/// which write the store directly and then dispatch
	/// `LocalEphemeralChange` themselves, mirroring `document_mut`.
	pub fn ephemeral_mut(&mut self) -> &mut EphemeralManager {
		&mut self.ephemeral
	}

	pub fn cancel_signal(&self) -> CancelSignal {
		self.cancel.clone()
	}

	/// Direct mutable access to one document's CRDT engine, for the Repo
	/// façade's `handle.change(f)` (§5: "CRDT documents are shared by
	/// reference with user code via the handle"). `None` if `doc_id` isn't
	/// currently tracked. Callers are responsible for following up with
	/// `dispatch(LocalDocChange { doc_id })` once the mutation commits.
	pub fn document_mut(&mut self, doc_id: &DocId) -> Option<&mut dyn CrdtDocument> {
		self.model.documents.get_mut(doc_id).map(|doc| doc.crdt_doc.as_mut())
	}

	/// Creates the document via the injected factory if it isn't already
	/// tracked; a thin pass-through used by `Repo::get`.
	pub fn ensure_document(&mut self, doc_id: &DocId) {
		self.model.ensure_document(doc_id);
	}

	/// Enqueues `msg` and, if no drain is already underway, drains the queue
	/// to quiescence: runs `update` for each queued message, executes the
	/// commands it returns, re-enqueues any follow-up messages the executor
	/// produced, and repeats until the queue is empty — then flushes the
	/// outbound batcher. If flushing produced new work (a synchronous
	/// adapter reply), the loop resumes (§4.5).
	pub async fn dispatch(&mut self, msg: InboundMessage) {
		if self.cancel.is_aborted() {
			tracing::warn!("dispatch after shutdown, dropping message");
			return;
		}
		self.queue.push(msg);
		if !self.queue.try_begin_drain() {
			return;
		}
		loop {
			while let Some(next) = self.queue.pop() {
				let commands = reducer::update(&mut self.model, &self.rules, next);
				for command in commands {
					match executor::execute(
						command,
						&mut self.model,
						&mut self.ephemeral,
						&mut self.batcher,
						self.sink.as_ref(),
						self.events.as_ref(),
					)
					.await
					{
						Ok(follow_ups) => {
							for follow_up in follow_ups {
								self.queue.push(follow_up);
							}
						}
						Err(err) => tracing::warn!(error = %err, "command execution failed"),
					}
				}
			}
			if !self.batcher.is_empty() {
				self.batcher.flush(self.sink.as_ref()).await;
			}
			if self.queue.is_empty() {
				break;
			}
		}
		self.queue.end_drain();
	}

	/// Drains the queue once, flushes, then marks every channel stopped.
	/// Subsequent `dispatch` calls are dropped with a warning (§4.5).
	pub async fn shutdown(&mut self) {
		self.dispatch_pending_only().await;
		self.batcher.flush(self.sink.as_ref()).await;
		for record in self.model.channels.values_mut() {
			record.lifecycle = crate::model::ChannelLifecycle::Stopped;
		}
		self.cancel.abort();
	}

	async fn dispatch_pending_only(&mut self) {
		if !self.queue.try_begin_drain() {
			return;
		}
		while let Some(next) = self.queue.pop() {
			let commands = reducer::update(&mut self.model, &self.rules, next);
			for command in commands {
				let _ = executor::execute(
					command,
					&mut self.model,
					&mut self.ephemeral,
					&mut self.batcher,
					self.sink.as_ref(),
					self.events.as_ref(),
				)
				.await;
			}
		}
		self.queue.end_drain();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::executor::Event;
	use crate::message::EstablishedChannel;
	use crate::model::ChannelKind;
	use sync_types::document::{CrdtDocument, Version, VersionOrdering};
	use sync_types::error::ClResult;
	use sync_types::ids::{AdapterType, ChannelId};
	use std::sync::Mutex;

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

	#[derive(Default)]
	struct RecordingSink {
		sent: Mutex<Vec<(ChannelId, Vec<u8>)>>,
	}

	#[async_trait::async_trait]
	impl OutboundSink for RecordingSink {
		async fn send(&self, channel_id: ChannelId, frame: Vec<u8>) -> sync_types::error::ClResult<()> {
			self.sent.lock().unwrap().push((channel_id, frame));
			Ok(())
		}
		async fn stop(&self, _channel_id: ChannelId) -> sync_types::error::ClResult<()> {
			Ok(())
		}
	}

	#[derive(Default)]
	struct RecordingEvents {
		events: Mutex<Vec<Event>>,
	}

	impl EventSink for RecordingEvents {
		fn emit(&self, event: Event) {
			self.events.lock().unwrap().push(event);
		}
	}

	fn peer(n: u64) -> PeerId {
		PeerId::parse(&n.to_string()).unwrap()
	}

	#[tokio::test]
	async fn peer_arrival_drains_to_quiescence_and_flushes_a_directory_request() {
		let sink = Arc::new(RecordingSink::default());
		let events = Arc::new(RecordingEvents::default());
		let mut sync = Synchronizer::new(
			None,
			Arc::new(|_| Box::new(FakeDoc::default())),
			Rules::default(),
			sink.clone(),
			events,
		);

		sync.dispatch(InboundMessage::PeerArrived(EstablishedChannel {
			channel_id: ChannelId::from(1),
			kind: ChannelKind::Network,
			adapter_type: AdapterType::new("test"),
			peer_id: peer(1),
			name: "alice".into(),
			typ: "browser".into(),
		}))
		.await;

		let sent = sink.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert!(sync.model().peers.contains_key(&peer(1)));
	}

	#[tokio::test]
	async fn shutdown_stops_every_channel_and_drops_further_dispatches() {
		let sink = Arc::new(RecordingSink::default());
		let events = Arc::new(RecordingEvents::default());
		let mut sync = Synchronizer::new(
			None,
			Arc::new(|_| Box::new(FakeDoc::default())),
			Rules::default(),
			sink.clone(),
			events,
		);
		sync.dispatch(InboundMessage::PeerArrived(EstablishedChannel {
			channel_id: ChannelId::from(1),
			kind: ChannelKind::Network,
			adapter_type: AdapterType::new("test"),
			peer_id: peer(1),
			name: "alice".into(),
			typ: "browser".into(),
		}))
		.await;

		sync.shutdown().await;
		assert!(sync.model().channels.values().all(|c| matches!(c.lifecycle, crate::model::ChannelLifecycle::Stopped)));

		sync.dispatch(InboundMessage::HeartbeatTick).await;
		assert!(sync.cancel.is_aborted());
	}

	#[tokio::test]
	async fn document_mut_edits_in_place_and_ensure_document_is_idempotent() {
		let sink = Arc::new(RecordingSink::default());
		let events = Arc::new(RecordingEvents::default());
		let mut sync =
			Synchronizer::new(None, Arc::new(|_| Box::new(FakeDoc::default())), Rules::default(), sink, events);
		let doc_id = sync_types::ids::DocId::new("demo");

		assert!(sync.document_mut(&doc_id).is_none());

		sync.ensure_document(&doc_id);
		sync.ensure_document(&doc_id);
		assert_eq!(sync.model().documents.len(), 1);

		let doc = sync.document_mut(&doc_id).expect("just ensured");
		doc.import(b"x").unwrap();
		assert!(sync.document_mut(&doc_id).unwrap().has_content());
	}
}

// vim: ts=4
