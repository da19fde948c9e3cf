//! Fans `sync_core::Event`s out to any number of subscribers via a broadcast
//! channel, grounded on the WebSocket broadcast manager's pub/sub-with-
//! cleanup idiom (`core::ws_broadcast::BroadcastManager`), simplified to one
//! fixed channel since a `Repo` only ever has one event stream.

use std::sync::Arc;

use sync_core::{Event, EventSink};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 256;

/// Bridges the Synchronizer's single `EventSink` callback into a broadcast
/// channel any number of document handles can subscribe to.
pub struct EventHub {
	sender: broadcast::Sender<Event>,
}

impl EventHub {
	pub fn new() -> Arc<Self> {
		let (sender, _) = broadcast::channel(EVENT_BUFFER);
		Arc::new(Self { sender })
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.sender.subscribe()
	}
}

impl EventSink for EventHub {
	fn emit(&self, event: Event) {
		// No receivers is the common case between subscriptions; dropping
		// the event then is correct, not an error.
		let _ = self.sender.send(event);
	}
}

/// A live `onReadyStateChange` subscription. Dropping it stops delivery.
pub struct ReadyStateSubscription {
	task: JoinHandle<()>,
}

impl ReadyStateSubscription {
	pub(crate) fn new(task: JoinHandle<()>) -> Self {
		Self { task }
	}
}

impl Drop for ReadyStateSubscription {
	fn drop(&mut self) {
		self.task.abort();
	}
}

/// A live `presence.subscribe` subscription. Dropping it stops delivery.
pub struct EphemeralSubscription {
	task: JoinHandle<()>,
}

impl EphemeralSubscription {
	pub(crate) fn new(task: JoinHandle<()>) -> Self {
		Self { task }
	}
}

impl Drop for EphemeralSubscription {
	fn drop(&mut self) {
		self.task.abort();
	}
}

// vim: ts=4
