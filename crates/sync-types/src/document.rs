//! The boundary this crate draws around the (out-of-scope) CRDT engine.
//!
//! The synchronizer never inspects document content: it only asks a document
//! for its current version, for a snapshot, for a delta since some version,
//! and for a comparison between two versions. Concrete CRDT integrations
//! (loro, automerge, yrs, ...) implement `CrdtDocument`; this crate ships a
//! trait only, the same way `cloudillo-crdt`'s `CrdtAdapter` trait leaves the
//! actual `Y.Doc` to the adapter implementation.

use crate::error::ClResult;

/// Opaque causal-frontier bytes (a serialized version vector). Two `Version`s
/// are only ever compared through `CrdtDocument::compare`, never by value
/// equality on the bytes themselves (implementations may use non-canonical
/// encodings).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Version(pub Vec<u8>);

impl Version {
	pub fn empty() -> Self {
		Version(Vec::new())
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Result of comparing `self`'s version against another version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionOrdering {
	/// The two versions describe the same causal state.
	Equal,
	/// `self` has seen everything `other` has seen, and more.
	Dominates,
	/// `other` has seen everything `self` has seen, and more.
	Dominated,
	/// Neither dominates; both have unique knowledge.
	Concurrent,
}

/// The minimal surface the synchronizer needs from a CRDT document.
///
/// Out of scope: the document's actual data model, its subscription
/// mechanism for local mutation (the synchronizer is told about local
/// changes via `SynchronizerMsg::LocalDocChange`, fed in by the caller).
pub trait CrdtDocument: Send + Sync {
	/// The document's current causal frontier.
	fn version(&self) -> Version;

	/// Export the full document state as an opaque snapshot.
	fn export_snapshot(&self) -> Vec<u8>;

	/// Export only the operations the document has that `base` has not seen.
	fn export_update_since(&self, base: &Version) -> Vec<u8>;

	/// Merge externally-produced bytes (a snapshot or an update) into this
	/// document. Must be commutative, associative and idempotent.
	fn import(&mut self, bytes: &[u8]) -> ClResult<()>;

	/// Compare this document's version against another.
	fn compare(&self, other: &Version) -> VersionOrdering;

	/// Whether the document holds any operations at all (used for
	/// `ReadyState` classification: `aware` vs `loaded`).
	fn has_content(&self) -> bool;
}

// vim: ts=4
