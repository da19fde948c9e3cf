//! The Repo façade itself (§4.7): the external construction and handle
//! surface of a synchronizer runtime.

use std::sync::Arc;

use sync_adapter::Adapter;
use sync_core::{InboundMessage, Synchronizer};
use sync_types::ids::DocId;
use tokio::sync::Mutex;

use crate::events::EventHub;
use crate::handle::DocumentHandle;

pub(crate) struct RepoState {
	pub(crate) synchronizer: Mutex<Synchronizer>,
	pub(crate) adapters: Vec<Arc<dyn Adapter>>,
	pub(crate) events: Arc<EventHub>,
}

/// Entry point (§4.7). Cheap to clone: every clone shares the same
/// underlying Synchronizer, adapter set and event hub.
#[derive(Clone)]
pub struct Repo(pub(crate) Arc<RepoState>);

impl Repo {
	pub(crate) fn new(synchronizer: Synchronizer, adapters: Vec<Arc<dyn Adapter>>, events: Arc<EventHub>) -> Self {
		Self(Arc::new(RepoState { synchronizer: Mutex::new(synchronizer), adapters, events }))
	}

	pub(crate) fn synchronizer(&self) -> &Mutex<Synchronizer> {
		&self.0.synchronizer
	}

	pub(crate) fn events(&self) -> &EventHub {
		&self.0.events
	}

	/// Registers `doc_id` (creating an empty document via the injected
	/// factory if it isn't already tracked) and returns a handle onto it.
	/// Calling this again for an already-tracked id just hands back a handle
	/// to the same document.
	pub async fn get(&self, doc_id: impl Into<DocId>) -> DocumentHandle {
		let doc_id = doc_id.into();
		self.0.synchronizer.lock().await.dispatch(InboundMessage::AddDocument { doc_id: doc_id.clone() }).await;
		DocumentHandle::new(self.clone(), doc_id)
	}

	/// Drops `doc_id` and every peer's subscription to it.
	pub async fn delete(&self, doc_id: &DocId) {
		self.0.synchronizer.lock().await.dispatch(InboundMessage::RemoveDocument { doc_id: doc_id.clone() }).await;
	}

	/// Stops every registered adapter, then drains and shuts the
	/// Synchronizer down. The Repo is not meant to be reused afterwards.
	pub async fn disconnect(&self) {
		for adapter in &self.0.adapters {
			if let Err(err) = adapter.on_stop().await {
				tracing::warn!(adapter_type = %adapter.adapter_type(), error = %err, "adapter failed to stop cleanly");
			}
		}
		self.0.synchronizer.lock().await.shutdown().await;
	}
}


// vim: ts=4
