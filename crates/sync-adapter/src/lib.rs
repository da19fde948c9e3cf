//! The `Adapter`/`Channel` contract, the establishment handshake, and a
//! channel directory shared by every concrete adapter crate. Transport- and
//! storage-agnostic: a concrete crate (e.g. an in-memory loopback, or a
//! websocket transport) implements `Adapter` and owns a `ChannelDirectory`.

pub mod adapter;
pub mod directory;
pub mod handshake;
pub mod lifecycle;

pub use adapter::Adapter;
pub use directory::{send_fragmented, ChannelDirectory, ChannelEntry, RawSink, DEFAULT_MTU};
pub use handshake::{advance, build_join_request, HandshakeOutcome, HandshakeState, LocalIdentity};
pub use lifecycle::{AdapterLifecycle, AdapterLifecycleGuard};

// vim: ts=4
