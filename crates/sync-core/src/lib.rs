//! Synchronizer model, pure reducer, command executor and scheduler.
//!
//! This crate is the HARD CORE: a deterministic, event-driven state machine
//! coordinating an arbitrary set of transport/storage adapters over the
//! wire protocol in `sync-wire`. It knows nothing about any concrete
//! adapter or CRDT backend — both are injected (`sync_types::CrdtDocument`,
//! `executor::OutboundSink`).

pub mod command;
pub mod ephemeral;
pub mod executor;
pub mod message;
pub mod model;
pub mod reducer;
pub mod rules;
pub mod scheduler;
pub mod synchronizer;

pub use command::{Command, TransmissionPlan};
pub use ephemeral::{EphemeralChangeEvent, EphemeralManager, EphemeralSource};
pub use executor::{Event, EventSink, OutboundSink};
pub use message::{EphemeralRow, EstablishedChannel, InboundMessage, RequestedDoc};
pub use model::{ChannelKind, ChannelLifecycle, ChannelRecord, DocSyncState, Document, DocumentFactory, Peer, ReadyState, SynchronizerModel};
pub use rules::{create_rules, RuleContext, Rules, RulesBuilder};
pub use scheduler::{CancelSignal, OutboundBatcher, WorkQueue};
pub use synchronizer::Synchronizer;

// vim: ts=4
