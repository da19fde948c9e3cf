//! Presence façade (§5): serializes ephemeral rows to plain values so
//! external code never touches `EphemeralManager`'s internal storage
//! directly.

use std::collections::HashMap;

use sync_core::{EphemeralSource, Event, InboundMessage};
use sync_types::ids::{DocId, PeerId};

use crate::events::EphemeralSubscription;
use crate::repo::Repo;

/// Scoped to one document; every method reads or writes that document's
/// ephemeral namespaces only.
#[derive(Clone)]
pub struct Presence {
	repo: Repo,
	doc_id: DocId,
}

impl Presence {
	pub(crate) fn new(repo: Repo, doc_id: DocId) -> Self {
		Self { repo, doc_id }
	}

	/// Writes `data` under `namespace` for our own identity, then dispatches
	/// `local-ephemeral-change` so it gets broadcast to subscribed peers. An
	/// empty `data` deletes the row. No-op (with a warning) if the Repo was
	/// built without a local identity, since there's no `PeerId` to write
	/// the row under.
	pub async fn set(&self, namespace: impl Into<String>, data: Vec<u8>) {
		let namespace = namespace.into();
		let mut sync = self.repo.synchronizer().lock().await;
		let Some(identity) = sync.model().identity.clone() else {
			tracing::warn!("presence.set called on a Repo with no local identity configured");
			return;
		};
		sync.ephemeral_mut().set_local(&self.doc_id, &namespace, identity, data);
		sync.dispatch(InboundMessage::LocalEphemeralChange { doc_id: self.doc_id.clone(), namespace }).await;
	}

	/// Every row currently held for this document, keyed by namespace.
	pub async fn all(&self) -> HashMap<String, Vec<(PeerId, Vec<u8>)>> {
		self.repo.synchronizer().lock().await.ephemeral().snapshot_doc(&self.doc_id)
	}

	/// Subscribes `callback` to this document's ephemeral rows: the current
	/// snapshot is delivered synchronously first, each row tagged
	/// `EphemeralSource::Initial`, before any live `Local`/`Remote` row
	/// changes. Delivery stops when the returned subscription drops.
	pub async fn subscribe<F>(&self, mut callback: F) -> EphemeralSubscription
	where
		F: FnMut(&str, PeerId, Vec<u8>, EphemeralSource) + Send + 'static,
	{
		let (mut events, snapshot) = {
			let sync = self.repo.synchronizer().lock().await;
			(self.repo.events().subscribe(), sync.ephemeral().snapshot_doc(&self.doc_id))
		};
		for (namespace, rows) in snapshot {
			for (peer_id, data) in rows {
				callback(&namespace, peer_id, data, EphemeralSource::Initial);
			}
		}
		let doc_id = self.doc_id.clone();
		let repo = self.repo.clone();
		let task = tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(Event::EphemeralChange(change)) if change.doc_id == doc_id => {
						// The event itself carries no payload; look up the row's
						// current value (empty if it was just deleted).
						let rows = repo.synchronizer().lock().await.ephemeral().encode_namespace(&doc_id, &change.namespace);
						let data = rows.into_iter().find(|(peer_id, _)| *peer_id == change.peer_id).map_or_else(Vec::new, |(_, data)| data);
						callback(&change.namespace, change.peer_id, data, change.source);
					}
					Ok(_) => {}
					Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				}
			}
		});
		EphemeralSubscription::new(task)
	}
}

// vim: ts=4
