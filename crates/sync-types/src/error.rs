//! Error taxonomy for the synchronizer runtime.

use crate::ids::{ChannelId, PeerId};

pub type ClResult<T> = std::result::Result<T, Error>;

/// Errors surfaced across the synchronizer/adapter boundary.
///
/// Variants mirror the taxonomy: decode/permission/timeout failures are
/// recovered locally wherever the spec says so; only a handful ever reach a
/// caller of `waitFor*`.
#[derive(Debug)]
pub enum Error {
	/// Malformed wire frame. Recovered by dropping the frame.
	Decode(String),
	/// Message arrived on a channel not registered with any peer.
	UnknownPeer(ChannelId),
	/// A rule callback denied the operation.
	PermissionDenied { rule: &'static str, peer: PeerId },
	/// Operation attempted on a channel that has already stopped.
	ChannelStopped(ChannelId),
	/// A `withTimeout` wait exceeded its window.
	Timeout,
	/// Cancellation via an `AbortSignal`.
	ShutdownAborted,
	/// Transport layer raised a fault.
	AdapterFault { adapter_type: Box<str>, cause: String },
	/// Invariant violation internal to the synchronizer.
	Internal(String),
	/// The requested document does not exist locally.
	NotFound,
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Error::Decode(reason) => write!(f, "decode error: {reason}"),
			Error::UnknownPeer(channel_id) => write!(f, "unknown peer on channel {channel_id}"),
			Error::PermissionDenied { rule, peer } => {
				write!(f, "permission denied by rule {rule} for peer {peer}")
			}
			Error::ChannelStopped(channel_id) => write!(f, "channel {channel_id} is stopped"),
			Error::Timeout => write!(f, "operation timed out"),
			Error::ShutdownAborted => write!(f, "aborted during shutdown"),
			Error::AdapterFault { adapter_type, cause } => {
				write!(f, "adapter fault ({adapter_type}): {cause}")
			}
			Error::Internal(msg) => write!(f, "internal error: {msg}"),
			Error::NotFound => write!(f, "not found"),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		tracing::warn!("io error: {}", err);
		Error::AdapterFault { adapter_type: "io".into(), cause: err.to_string() }
	}
}

impl From<tokio::task::JoinError> for Error {
	fn from(err: tokio::task::JoinError) -> Self {
		tracing::warn!("task join error: {}", err);
		Error::Internal(format!("task join failed: {err}"))
	}
}

// vim: ts=4
