//! Identifiers: `DocId`, `PeerId`, `ChannelId`, `AdapterType`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque document identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(Box<str>);

impl DocId {
	pub fn new(id: impl Into<Box<str>>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for DocId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for DocId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for DocId {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

/// Peer identifier: a non-empty decimal integer within u64 range, no leading
/// zeros (except the literal "0").
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(Box<str>);

/// Why a candidate string is not a valid `PeerId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerIdError {
	Empty,
	NotDecimal,
	LeadingZero,
	OutOfRange,
}

impl fmt::Display for PeerIdError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PeerIdError::Empty => write!(f, "peer id is empty"),
			PeerIdError::NotDecimal => write!(f, "peer id is not a decimal integer"),
			PeerIdError::LeadingZero => write!(f, "peer id has a leading zero"),
			PeerIdError::OutOfRange => write!(f, "peer id exceeds u64 range"),
		}
	}
}

impl std::error::Error for PeerIdError {}

impl PeerId {
	/// Validate and construct a `PeerId` from a decimal string.
	///
	/// Accepts "0" and "18446744073709551615" (u64::MAX); rejects "", "01",
	/// "-1", "1.5", and anything beyond 2^64-1.
	pub fn parse(candidate: &str) -> Result<Self, PeerIdError> {
		if candidate.is_empty() {
			return Err(PeerIdError::Empty);
		}
		if !candidate.bytes().all(|b| b.is_ascii_digit()) {
			return Err(PeerIdError::NotDecimal);
		}
		if candidate.len() > 1 && candidate.starts_with('0') {
			return Err(PeerIdError::LeadingZero);
		}
		candidate.parse::<u64>().map_err(|_| PeerIdError::OutOfRange)?;
		Ok(Self(candidate.into()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn as_u64(&self) -> u64 {
		// Validated at construction time; PeerId is never built from an
		// unparseable string outside this module.
		self.0.parse().unwrap_or(0)
	}
}

impl TryFrom<String> for PeerId {
	type Error = PeerIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}

impl From<PeerId> for String {
	fn from(value: PeerId) -> Self {
		value.0.into()
	}
}

impl fmt::Display for PeerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Monotonic, process-unique channel identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u64);

impl ChannelId {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl From<u64> for ChannelId {
	/// Reconstructs a `ChannelId` from its wire representation. Only the
	/// allocating side should mint ids from scratch via `ChannelIdAllocator`;
	/// this impl exists for decoding ids that cross the wire.
	fn from(raw: u64) -> Self {
		Self(raw)
	}
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Allocates monotonically increasing, process-unique `ChannelId`s.
#[derive(Debug, Default)]
pub struct ChannelIdAllocator {
	next: AtomicU64,
}

impl ChannelIdAllocator {
	pub fn new() -> Self {
		Self { next: AtomicU64::new(0) }
	}

	pub fn allocate(&self) -> ChannelId {
		ChannelId(self.next.fetch_add(1, Ordering::Relaxed))
	}
}

/// Caller-supplied tag identifying an adapter implementation (e.g. "websocket",
/// "storage-fs").
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterType(Box<str>);

impl AdapterType {
	pub fn new(tag: impl Into<Box<str>>) -> Self {
		Self(tag.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for AdapterType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_zero_and_u64_max() {
		assert!(PeerId::parse("0").is_ok());
		assert!(PeerId::parse("18446744073709551615").is_ok());
	}

	#[test]
	fn rejects_empty_leading_zero_negative_float_and_overflow() {
		assert_eq!(PeerId::parse("").unwrap_err(), PeerIdError::Empty);
		assert_eq!(PeerId::parse("01").unwrap_err(), PeerIdError::LeadingZero);
		assert_eq!(PeerId::parse("-1").unwrap_err(), PeerIdError::NotDecimal);
		assert_eq!(PeerId::parse("1.5").unwrap_err(), PeerIdError::NotDecimal);
		assert_eq!(PeerId::parse("18446744073709551616").unwrap_err(), PeerIdError::OutOfRange);
	}

	#[test]
	fn channel_ids_are_monotonic() {
		let alloc = ChannelIdAllocator::new();
		let a = alloc.allocate();
		let b = alloc.allocate();
		assert!(b.as_u64() > a.as_u64());
	}
}

// vim: ts=4
