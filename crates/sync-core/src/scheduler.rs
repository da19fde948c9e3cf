//! Single-threaded cooperative scheduling (§4.5): a FIFO work queue, a
//! quiescence-driven outbound batcher, and the `with_timeout` utility every
//! wait-for-network/wait-for-storage path goes through.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use sync_types::ids::ChannelId;
use sync_wire::{ChannelMessage, Envelope};

use sync_types::error::{ClResult, Error};

use crate::executor::OutboundSink;
use crate::message::InboundMessage;

/// FIFO queue of inbound messages awaiting dispatch through `update`.
///
/// A second push while the loop is already draining just appends; the
/// existing drain picks it up — "if already processing, the caller returns;
/// the existing loop drains."
#[derive(Default)]
pub struct WorkQueue {
	items: VecDeque<InboundMessage>,
	draining: bool,
}

impl WorkQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, msg: InboundMessage) {
		self.items.push_back(msg);
	}

	pub fn pop(&mut self) -> Option<InboundMessage> {
		self.items.pop_front()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Claims the drain. Returns `false` if a drain is already underway, in
	/// which case the caller must return without starting a second loop.
	pub fn try_begin_drain(&mut self) -> bool {
		if self.draining {
			return false;
		}
		self.draining = true;
		true
	}

	pub fn end_drain(&mut self) {
		self.draining = false;
	}
}

/// Coalesces per-channel outbound messages between quiescence flushes. A
/// channel with exactly one pending message is sent unwrapped; more than one
/// is wrapped in a single `batch` envelope.
#[derive(Default)]
pub struct OutboundBatcher {
	pending: HashMap<ChannelId, Vec<ChannelMessage>>,
}

impl OutboundBatcher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn enqueue(&mut self, channel_id: ChannelId, message: ChannelMessage) {
		self.pending.entry(channel_id).or_default().push(message);
	}

	pub fn is_empty(&self) -> bool {
		self.pending.values().all(Vec::is_empty)
	}

	/// Drains every channel's pending messages, sending one frame per
	/// channel through `sink`. A fault on one channel is logged and does not
	/// stop the others from flushing (§5: no ordering guaranteed between
	/// channels).
	pub async fn flush(&mut self, sink: &dyn OutboundSink) {
		for (channel_id, messages) in self.pending.drain() {
			if messages.is_empty() {
				continue;
			}
			let message =
				if messages.len() == 1 { messages.into_iter().next().unwrap() } else { ChannelMessage::Batch { messages } };
			let frame = Envelope::DocUpdate { message }.encode();
			if let Err(err) = sink.send(channel_id, frame).await {
				tracing::warn!(channel_id = %channel_id, error = %err, "outbound send failed");
			}
		}
	}
}

/// Runs `future` to completion, or resolves to `Error::Timeout`/`ShutdownAborted`
/// first. `timeout_ms == 0` disables the timeout entirely. A signal that has
/// already fired rejects synchronously without polling `future` at all.
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, signal: Option<&CancelSignal>) -> ClResult<T>
where
	F: Future<Output = T>,
{
	if let Some(signal) = signal {
		if signal.is_aborted() {
			return Err(Error::ShutdownAborted);
		}
	}

	match (timeout_ms, signal) {
		(0, None) => Ok(future.await),
		(0, Some(signal)) => tokio::select! {
			result = future => Ok(result),
			() = signal.aborted() => Err(Error::ShutdownAborted),
		},
		(ms, None) => tokio::time::timeout(Duration::from_millis(ms), future).await.map_err(|_| Error::Timeout),
		(ms, Some(signal)) => {
			tokio::select! {
				result = tokio::time::timeout(Duration::from_millis(ms), future) => {
					result.map_err(|_| Error::Timeout)
				}
				() = signal.aborted() => Err(Error::ShutdownAborted),
			}
		}
	}
}

/// A cooperative cancellation token: `disconnect()`/`dispose()` on the Repo
/// fires it, and every outstanding `with_timeout` wait observes it.
#[derive(Clone, Default)]
pub struct CancelSignal {
	notify: std::sync::Arc<tokio::sync::Notify>,
	fired: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CancelSignal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn abort(&self) {
		self.fired.store(true, std::sync::atomic::Ordering::SeqCst);
		self.notify.notify_waiters();
	}

	pub fn is_aborted(&self) -> bool {
		self.fired.load(std::sync::atomic::Ordering::SeqCst)
	}

	async fn aborted(&self) {
		if self.is_aborted() {
			return;
		}
		self.notify.notified().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn zero_timeout_disables_the_deadline() {
		let result = with_timeout(async { 7 }, 0, None).await;
		assert_eq!(result.unwrap(), 7);
	}

	#[tokio::test]
	async fn pre_aborted_signal_rejects_without_polling_the_future() {
		let signal = CancelSignal::new();
		signal.abort();
		let result = with_timeout(std::future::pending::<()>(), 0, Some(&signal)).await;
		assert!(matches!(result, Err(Error::ShutdownAborted)));
	}

	#[tokio::test]
	async fn elapsed_timeout_surfaces_as_timeout_error() {
		let result = with_timeout(std::future::pending::<()>(), 10, None).await;
		assert!(matches!(result, Err(Error::Timeout)));
	}

	#[test]
	fn work_queue_second_push_while_draining_does_not_start_a_second_drain() {
		let mut queue = WorkQueue::new();
		queue.push(InboundMessage::HeartbeatTick);
		assert!(queue.try_begin_drain());
		queue.push(InboundMessage::HeartbeatTick);
		assert!(!queue.try_begin_drain());
		queue.end_drain();
		assert!(queue.try_begin_drain());
	}
}

// vim: ts=4
