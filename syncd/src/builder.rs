//! `RepoBuilder`: an `AppBuilder`-style constructor (§4.7), grounded on
//! `core::app::AppBuilder`'s register-then-`run()` shape — adapters and
//! policy are set via chained setters, then `build()` validates, starts
//! every adapter and hands back a `Repo`. Scoped to this crate's own
//! adapters only, no auth/blob/meta/idp surface to carry over.

use std::sync::Arc;

use sync_adapter::Adapter;
use sync_core::model::DocumentFactory;
use sync_core::{OutboundSink, Rules, Synchronizer};
use sync_types::error::{ClResult, Error};
use sync_types::ids::PeerId;

use crate::events::EventHub;
use crate::repo::Repo;

/// Collects identity, policy, the outbound sink and every adapter to start,
/// then assembles one `Repo`.
pub struct RepoBuilder {
	identity: Option<PeerId>,
	doc_factory: Option<DocumentFactory>,
	rules: Rules,
	sink: Option<Arc<dyn OutboundSink>>,
	adapters: Vec<Arc<dyn Adapter>>,
}

impl RepoBuilder {
	pub fn new() -> Self {
		Self { identity: None, doc_factory: None, rules: Rules::default(), sink: None, adapters: Vec::new() }
	}

	pub fn identity(mut self, identity: PeerId) -> Self {
		self.identity = Some(identity);
		self
	}

	pub fn doc_factory(mut self, doc_factory: DocumentFactory) -> Self {
		self.doc_factory = Some(doc_factory);
		self
	}

	pub fn rules(mut self, rules: Rules) -> Self {
		self.rules = rules;
		self
	}

	/// The object the Synchronizer sends outbound frames through. In this
	/// crate's only concrete adapter, `InMemoryAdapter` implements both
	/// `Adapter` and `OutboundSink` on one struct, so the same `Arc` is
	/// typically passed to both this and `.adapter(...)`.
	pub fn sink(mut self, sink: Arc<dyn OutboundSink>) -> Self {
		self.sink = Some(sink);
		self
	}

	/// Registers an adapter to start on `build()` and stop on
	/// `Repo::disconnect()`. May be called more than once for multiple
	/// transports (e.g. one storage adapter, one network adapter).
	pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
		self.adapters.push(adapter);
		self
	}

	/// Validates required fields, starts every registered adapter, and
	/// returns the assembled `Repo`. Mirrors `AppBuilder::run`'s
	/// "missing required adapter is an error, not a panic" shape.
	pub async fn build(self) -> ClResult<Repo> {
		let Some(doc_factory) = self.doc_factory else {
			return Err(Error::Internal("RepoBuilder: no document factory configured".to_string()));
		};
		let Some(sink) = self.sink else {
			return Err(Error::Internal("RepoBuilder: no outbound sink configured".to_string()));
		};

		let events = EventHub::new();
		let synchronizer = Synchronizer::new(self.identity, doc_factory, self.rules, sink, events.clone());

		for adapter in &self.adapters {
			adapter.on_start().await?;
		}

		Ok(Repo::new(synchronizer, self.adapters, events))
	}
}

impl Default for RepoBuilder {
	fn default() -> Self {
		Self::new()
	}
}

// vim: ts=4
