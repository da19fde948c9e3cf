//! A batteries-included façade over `sync-core`: register adapters with a
//! `RepoBuilder`, get back a `Repo` whose `get(doc_id)` hands out
//! `DocumentHandle`s for CRDT edits, readiness observation and presence
//! (§4.7, §5).
//!
//! Everything below this crate — `sync-types`, `sync-wire`, `sync-core`,
//! `sync-adapter` — stays usable on its own; this crate only wires them
//! together the way an application actually wants to hold them.

pub mod builder;
pub mod events;
pub mod handle;
pub mod presence;
pub mod repo;

pub use builder::RepoBuilder;
pub use events::{EphemeralSubscription, EventHub, ReadyStateSubscription};
pub use handle::DocumentHandle;
pub use presence::Presence;
pub use repo::Repo;

pub use sync_core::model::{ChannelKind, DocumentFactory, ReadyState};
pub use sync_core::{EphemeralSource, Event, Rules};
pub use sync_types::error::{ClResult, Error};
pub use sync_types::ids::{DocId, PeerId};

// vim: ts=4
