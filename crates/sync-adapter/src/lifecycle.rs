//! The Adapter's own `created -> initialized -> started -> stopped` lifecycle
//! (§4.2), kept separate from any one channel's handshake state.

use parking_lot::Mutex;
use sync_types::error::{ClResult, Error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterLifecycle {
	Created,
	Initialized,
	Started,
	Stopped,
}

/// Guards the forward-only lifecycle transitions every concrete `Adapter`
/// goes through. `start` is only valid from `initialized`; re-`initialize`
/// is only valid from `stopped`, so an adapter can be reused across tests.
#[derive(Debug)]
pub struct AdapterLifecycleGuard {
	state: Mutex<AdapterLifecycle>,
}

impl Default for AdapterLifecycleGuard {
	fn default() -> Self {
		Self::new()
	}
}

impl AdapterLifecycleGuard {
	pub fn new() -> Self {
		Self { state: Mutex::new(AdapterLifecycle::Created) }
	}

	pub fn current(&self) -> AdapterLifecycle {
		*self.state.lock()
	}

	pub fn initialize(&self) -> ClResult<()> {
		let mut state = self.state.lock();
		match *state {
			AdapterLifecycle::Created | AdapterLifecycle::Stopped => {
				*state = AdapterLifecycle::Initialized;
				Ok(())
			}
			other => Err(Error::Internal(format!("cannot initialize from {other:?}"))),
		}
	}

	pub fn start(&self) -> ClResult<()> {
		let mut state = self.state.lock();
		match *state {
			AdapterLifecycle::Initialized => {
				*state = AdapterLifecycle::Started;
				Ok(())
			}
			other => Err(Error::Internal(format!("cannot start from {other:?}"))),
		}
	}

	pub fn stop(&self) -> ClResult<()> {
		let mut state = self.state.lock();
		match *state {
			AdapterLifecycle::Started => {
				*state = AdapterLifecycle::Stopped;
				Ok(())
			}
			other => Err(Error::Internal(format!("cannot stop from {other:?}"))),
		}
	}

	/// `add_channel` (and everything downstream of it) is only valid while
	/// the adapter is `started`.
	pub fn require_started(&self) -> ClResult<()> {
		if self.current() == AdapterLifecycle::Started {
			Ok(())
		} else {
			Err(Error::Internal("adapter is not started".into()))
		}
	}
}


// vim: ts=4
