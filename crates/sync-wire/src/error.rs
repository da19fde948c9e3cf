//! Wire-level decode failures. All are recovered by dropping the frame; none
//! of them ever unwind the synchronizer.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
	/// Fewer than 5 bytes (4 magic + 1 message type) in the frame.
	ShortFrame,
	/// The 4-byte magic did not match any known CRDT family tag.
	UnknownMagic([u8; 4]),
	/// The message-type byte did not match any known variant.
	UnknownMessageType(u8),
	/// A length-prefixed or fixed-width field ran past the end of the buffer.
	TruncatedField(&'static str),
}

impl fmt::Display for WireError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WireError::ShortFrame => write!(f, "frame shorter than 5 bytes"),
			WireError::UnknownMagic(bytes) => write!(f, "unknown magic bytes {bytes:?}"),
			WireError::UnknownMessageType(byte) => write!(f, "unknown message type 0x{byte:02x}"),
			WireError::TruncatedField(field) => write!(f, "truncated field: {field}"),
		}
	}
}

impl std::error::Error for WireError {}

/// Folds every wire decode failure into `sync_types::Error::Decode`, so
/// callers above this crate see one error taxonomy instead of two.
impl From<WireError> for sync_types::error::Error {
	fn from(err: WireError) -> Self {
		sync_types::error::Error::Decode(err.to_string())
	}
}

pub type WireResult<T> = Result<T, WireError>;

// vim: ts=4
