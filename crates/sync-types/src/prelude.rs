pub use crate::document::{CrdtDocument, Version, VersionOrdering};
pub use crate::error::{ClResult, Error};
pub use crate::ids::{AdapterType, ChannelId, ChannelIdAllocator, DocId, PeerId, PeerIdError};
pub use crate::timestamp::Timestamp;

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
