//! Document handle: the mutation and readiness-observation surface handed
//! back by `Repo::get` (§4.7, §5).

use std::time::Duration;

use sync_core::model::{ChannelKind, ChannelLifecycle, ReadyState};
use sync_core::scheduler::with_timeout;
use sync_core::{Event, InboundMessage};
use sync_types::document::CrdtDocument;
use sync_types::error::{ClResult, Error};
use sync_types::ids::{DocId, PeerId};
use tokio::time::sleep;

use crate::events::ReadyStateSubscription;
use crate::presence::Presence;
use crate::repo::Repo;

const POLL_INTERVAL_MS: u64 = 10;

/// A live handle onto one tracked document. Cheap to clone: every clone
/// shares the same underlying `Repo`.
#[derive(Clone)]
pub struct DocumentHandle {
	repo: Repo,
	doc_id: DocId,
}

impl DocumentHandle {
	pub(crate) fn new(repo: Repo, doc_id: DocId) -> Self {
		Self { repo, doc_id }
	}

	pub fn doc_id(&self) -> &DocId {
		&self.doc_id
	}

	pub fn presence(&self) -> Presence {
		Presence::new(self.repo.clone(), self.doc_id.clone())
	}

	/// Mutates the document's CRDT engine in place, then dispatches
	/// `local-doc-change` so the Synchronizer propagates the edit (§5: "CRDT
	/// documents are shared by reference with user code via the handle").
	/// Fails with `Error::NotFound` if the document was deleted out from
	/// under this handle.
	pub async fn change<R>(&self, mutator: impl FnOnce(&mut dyn CrdtDocument) -> R) -> ClResult<R> {
		let mut sync = self.repo.synchronizer().lock().await;
		let Some(doc) = sync.document_mut(&self.doc_id) else {
			return Err(Error::NotFound);
		};
		let result = mutator(doc);
		sync.dispatch(InboundMessage::LocalDocChange { doc_id: self.doc_id.clone() }).await;
		Ok(result)
	}

	/// Subscribes `callback` to every future `ReadyStateChanged` event for
	/// this document. Delivery stops when the returned subscription drops.
	pub fn on_ready_state_change<F>(&self, mut callback: F) -> ReadyStateSubscription
	where
		F: FnMut(ReadyState, &[(PeerId, ReadyState)]) + Send + 'static,
	{
		let mut events = self.repo.events().subscribe();
		let doc_id = self.doc_id.clone();
		let task = tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(Event::ReadyStateChanged { doc_id: changed, self_state, peers }) if changed == doc_id => {
						callback(self_state, &peers);
					}
					Ok(_) => {}
					Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				}
			}
		});
		ReadyStateSubscription::new(task)
	}

	/// Waits until this document has at least one established channel of
	/// `kind`, or `timeout_ms` elapses (`0` disables the deadline).
	async fn wait_for_channel_kind(&self, kind: ChannelKind, timeout_ms: u64) -> ClResult<()> {
		let cancel = self.repo.synchronizer().lock().await.cancel_signal();
		with_timeout(
			async {
				loop {
					let has_channel = {
						let sync = self.repo.synchronizer().lock().await;
						sync.model().channels.values().any(|record| {
							matches!(&record.lifecycle, ChannelLifecycle::Established { kind: k, .. } if *k == kind)
						})
					};
					if has_channel {
						return;
					}
					sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
				}
			},
			timeout_ms,
			Some(&cancel),
		)
		.await
	}

	/// Waits for a storage channel to establish (§4.7's `waitForStorage`).
	pub async fn wait_for_storage(&self, timeout_ms: u64) -> ClResult<()> {
		self.wait_for_channel_kind(ChannelKind::Storage, timeout_ms).await
	}

	/// Waits for a network channel to establish (§4.7's `waitForNetwork`).
	pub async fn wait_for_network(&self, timeout_ms: u64) -> ClResult<()> {
		self.wait_for_channel_kind(ChannelKind::Network, timeout_ms).await
	}

	/// Waits until `predicate(self_state, peers)` holds for this document, or
	/// `timeout_ms` elapses (§4.7's `waitUntilReady`).
	pub async fn wait_until_ready(
		&self,
		predicate: impl Fn(ReadyState, &[(PeerId, ReadyState)]) -> bool,
		timeout_ms: u64,
	) -> ClResult<()> {
		let cancel = self.repo.synchronizer().lock().await.cancel_signal();
		with_timeout(
			async {
				loop {
					let (self_state, peers) = self.ready_states().await;
					if predicate(self_state, &peers) {
						return;
					}
					sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
				}
			},
			timeout_ms,
			Some(&cancel),
		)
		.await
	}

	/// A synchronous snapshot of this document's `ReadyState[]`, mirroring
	/// `sync-core::executor`'s private classification (self: absent if
	/// untracked, loaded once the CRDT engine reports content, otherwise
	/// aware; peers via `DocSyncState::to_ready_state`).
	async fn ready_states(&self) -> (ReadyState, Vec<(PeerId, ReadyState)>) {
		let sync = self.repo.synchronizer().lock().await;
		let model = sync.model();
		let self_state = match model.documents.get(&self.doc_id) {
			None => ReadyState::Absent,
			Some(doc) if doc.crdt_doc.has_content() => ReadyState::Loaded,
			Some(_) => ReadyState::Aware,
		};
		let peers = model
			.peers
			.values()
			.filter_map(|peer| peer.sync_state(&self.doc_id).to_ready_state().map(|state| (peer.peer_id.clone(), state)))
			.collect();
		(self_state, peers)
	}
}

// vim: ts=4
