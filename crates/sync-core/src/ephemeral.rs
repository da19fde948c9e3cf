//! Per-document, per-namespace presence stores (§3 `EphemeralStore`, §4.3
//! ephemeral broadcast rules).
//!
//! A namespace store is a plain `PeerId -> bytes` map. There is no CRDT merge
//! here: the last write for a peer in a namespace wins, and an empty `data`
//! marks that peer's row as deleted.

use std::collections::HashMap;

use sync_types::ids::{DocId, PeerId};
use sync_types::prelude::Timestamp;

/// Where an ephemeral-change event's value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EphemeralSource {
	/// Written by local code via `presence.set(...)`.
	Local,
	/// Applied from a peer's `ephemeral` message.
	Remote,
	/// The snapshot delivered synchronously on first subscribe.
	Initial,
}

/// Emitted whenever a namespace's content changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EphemeralChangeEvent {
	pub doc_id: DocId,
	pub namespace: String,
	pub peer_id: PeerId,
	pub source: EphemeralSource,
}

struct NamespaceStore {
	rows: HashMap<PeerId, (Vec<u8>, Timestamp)>,
}

impl NamespaceStore {
	fn new() -> Self {
		Self { rows: HashMap::new() }
	}

	fn set(&mut self, peer_id: PeerId, data: Vec<u8>) {
		if data.is_empty() {
			self.rows.remove(&peer_id);
		} else {
			self.rows.insert(peer_id, (data, Timestamp::now()));
		}
	}

	fn encode_all(&self) -> Vec<(PeerId, Vec<u8>)> {
		self.rows.iter().map(|(peer_id, (data, _))| (peer_id.clone(), data.clone())).collect()
	}

	/// Drops every row last written more than `ttl_secs` ago. Returns whether
	/// anything was removed.
	fn evict_expired(&mut self, now: Timestamp, ttl_secs: i64) -> bool {
		let before = self.rows.len();
		self.rows.retain(|_, (_, written_at)| now.0 - written_at.0 <= ttl_secs);
		self.rows.len() != before
	}
}

/// Owns every `(DocId, namespace)` store. Reads for external callers go
/// through `snapshot`, which copies out plain values — nothing here is
/// shared by reference outside the Synchronizer.
#[derive(Default)]
pub struct EphemeralManager {
	stores: HashMap<(DocId, String), NamespaceStore>,
}

impl EphemeralManager {
	pub fn new() -> Self {
		Self::default()
	}

	fn store_mut(&mut self, doc_id: &DocId, namespace: &str) -> &mut NamespaceStore {
		self.stores
			.entry((doc_id.clone(), namespace.to_string()))
			.or_insert_with(NamespaceStore::new)
	}

	/// Local write: `source = local` at the call site (this method only
	/// updates storage; the caller is responsible for scheduling the
	/// broadcast command and the `Local`-sourced event).
	pub fn set_local(&mut self, doc_id: &DocId, namespace: &str, peer_id: PeerId, data: Vec<u8>) {
		self.store_mut(doc_id, namespace).set(peer_id, data);
	}

	/// Apply a remote row; returns `false` (and does nothing else) if `data`
	/// is empty, signalling "log only, no content to merge" per §4.4.
	pub fn apply_remote(&mut self, doc_id: &DocId, namespace: &str, peer_id: PeerId, data: Vec<u8>) -> bool {
		if data.is_empty() {
			self.store_mut(doc_id, namespace).rows.remove(&peer_id);
			return false;
		}
		self.store_mut(doc_id, namespace).set(peer_id, data);
		true
	}

	/// Encodes every row currently held for `(doc_id, namespace)`.
	pub fn encode_namespace(&self, doc_id: &DocId, namespace: &str) -> Vec<(PeerId, Vec<u8>)> {
		self.stores.get(&(doc_id.clone(), namespace.to_string())).map(NamespaceStore::encode_all).unwrap_or_default()
	}

	/// Removes every row belonging to `peer_id`, across every document and
	/// namespace. Returns the `(doc_id, namespace)` pairs that had a row
	/// removed, so the caller can schedule one deletion broadcast each.
	pub fn remove_peer(&mut self, peer_id: &PeerId) -> Vec<(DocId, String)> {
		let mut affected = Vec::new();
		for (key, store) in &mut self.stores {
			if store.rows.remove(peer_id).is_some() {
				affected.push(key.clone());
			}
		}
		affected
	}

	/// All rows across every namespace for `doc_id`, for the public presence
	/// façade (`presence.all`).
	pub fn snapshot_doc(&self, doc_id: &DocId) -> HashMap<String, Vec<(PeerId, Vec<u8>)>> {
		self.stores
			.iter()
			.filter(|((d, _), _)| d == doc_id)
			.map(|((_, ns), store)| (ns.clone(), store.encode_all()))
			.collect()
	}

	/// Sweeps every namespace for rows older than `ttl_secs`, driven off the
	/// heartbeat tick (§3: presence rows carry a TTL, distinct from a peer's
	/// own departure, which is cleaned up via `remove_peer`). Returns the
	/// `(doc_id, namespace)` pairs that lost at least one row.
	pub fn evict_expired(&mut self, now: Timestamp, ttl_secs: i64) -> Vec<(DocId, String)> {
		let mut affected = Vec::new();
		for (key, store) in &mut self.stores {
			if store.evict_expired(now, ttl_secs) {
				affected.push(key.clone());
			}
		}
		affected
	}
}


// vim: ts=4
