//! Envelope framing and the channel-message set it carries.
//!
//! Wire layout: `Magic(4) MsgType(1) Body`, with `Body` fields encoded using
//! the ULEB128/var-string/var-bytes primitives in [`crate::varint`].

use crate::error::{WireError, WireResult};
use crate::varint::{Reader, Writer};
use sync_types::ids::{ChannelId, DocId, PeerId};

/// The four-byte CRDT-family tag that opens every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Magic {
	/// "loro" — a loro CRDT document update.
	Loro,
	/// "ephm" — ephemeral (presence) store bytes.
	Ephemeral,
	/// "ephP" — ephemeral store bytes that the sender persists across restarts.
	EphemeralPersisted,
}

impl Magic {
	pub const fn as_bytes(self) -> [u8; 4] {
		match self {
			Magic::Loro => *b"loro",
			Magic::Ephemeral => *b"ephm",
			Magic::EphemeralPersisted => *b"ephP",
		}
	}

	pub fn from_bytes(bytes: [u8; 4]) -> WireResult<Self> {
		match &bytes {
			b"loro" => Ok(Magic::Loro),
			b"ephm" => Ok(Magic::Ephemeral),
			b"ephP" => Ok(Magic::EphemeralPersisted),
			_ => Err(WireError::UnknownMagic(bytes)),
		}
	}
}

/// Single-byte envelope-level message type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
	JoinRequest = 0x01,
	JoinResponseOk = 0x02,
	JoinError = 0x03,
	DocUpdate = 0x10,
	UpdateError = 0x11,
	Leave = 0x20,
}

impl MessageType {
	fn from_u8(byte: u8) -> WireResult<Self> {
		match byte {
			0x01 => Ok(MessageType::JoinRequest),
			0x02 => Ok(MessageType::JoinResponseOk),
			0x03 => Ok(MessageType::JoinError),
			0x10 => Ok(MessageType::DocUpdate),
			0x11 => Ok(MessageType::UpdateError),
			0x20 => Ok(MessageType::Leave),
			other => Err(WireError::UnknownMessageType(other)),
		}
	}
}

/// `channel/establish-*` identity payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
	pub peer_id: PeerId,
	pub name: String,
	pub typ: String,
}

/// Single-byte error code with an open "app error" extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
	NotFound,
	PermissionDenied,
	Malformed,
	/// Caller-defined application error, carrying an additional ULEB128 code.
	App(u64),
}

impl ErrorCode {
	fn tag(&self) -> u8 {
		match self {
			ErrorCode::NotFound => 0,
			ErrorCode::PermissionDenied => 1,
			ErrorCode::Malformed => 2,
			ErrorCode::App(_) => 0xFF,
		}
	}

	fn encode(&self, w: &mut Writer) {
		w.write_u8(self.tag());
		if let ErrorCode::App(code) = self {
			w.write_uleb128(*code);
		}
	}

	fn decode(r: &mut Reader<'_>) -> WireResult<Self> {
		match r.read_u8()? {
			0 => Ok(ErrorCode::NotFound),
			1 => Ok(ErrorCode::PermissionDenied),
			2 => Ok(ErrorCode::Malformed),
			0xFF => Ok(ErrorCode::App(r.read_uleb128()?)),
			other => Err(WireError::UnknownMessageType(other)),
		}
	}
}

/// One entry of a `channel/sync-request`'s `docs` list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequestEntry {
	pub doc_id: DocId,
	pub requester_version: Vec<u8>,
}

/// The payload variant carried inside a `channel/sync-response`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transmission {
	UpToDate { version: Vec<u8> },
	Snapshot { data: Vec<u8>, version: Vec<u8> },
	Update { data: Vec<u8>, version: Vec<u8> },
	Unavailable,
}

/// One row of a `channel/ephemeral` message's `stores` list. Empty `data`
/// means "this peer's entry for this namespace was deleted".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EphemeralStoreEntry {
	pub peer_id: PeerId,
	pub namespace: String,
	pub data: Vec<u8>,
}

/// The higher-level messages exchanged over an established channel, carried
/// inside a `DocUpdate` envelope body (per spec.md §4.1, an implementation
/// MAY unify establishment and channel messages into one enum — this crate
/// keeps establishment at the envelope level via `MessageType::JoinRequest`
/// et al., and nests everything else here).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelMessage {
	NewDoc { doc_ids: Vec<DocId> },
	DirectoryRequest,
	DirectoryResponse { doc_ids: Vec<DocId> },
	SyncRequest { docs: Vec<SyncRequestEntry>, bidirectional: bool },
	SyncResponse { doc_id: DocId, transmission: Transmission },
	Ephemeral { doc_id: DocId, hops_remaining: u64, stores: Vec<EphemeralStoreEntry> },
	Batch { messages: Vec<ChannelMessage> },
}

impl ChannelMessage {
	fn tag(&self) -> u8 {
		match self {
			ChannelMessage::NewDoc { .. } => 0,
			ChannelMessage::DirectoryRequest => 1,
			ChannelMessage::DirectoryResponse { .. } => 2,
			ChannelMessage::SyncRequest { .. } => 3,
			ChannelMessage::SyncResponse { .. } => 4,
			ChannelMessage::Ephemeral { .. } => 5,
			ChannelMessage::Batch { .. } => 6,
		}
	}

	fn encode(&self, w: &mut Writer) {
		w.write_u8(self.tag());
		match self {
			ChannelMessage::NewDoc { doc_ids } => encode_doc_ids(w, doc_ids),
			ChannelMessage::DirectoryRequest => {}
			ChannelMessage::DirectoryResponse { doc_ids } => encode_doc_ids(w, doc_ids),
			ChannelMessage::SyncRequest { docs, bidirectional } => {
				w.write_uleb128(docs.len() as u64);
				for entry in docs {
					w.write_var_string(entry.doc_id.as_str());
					w.write_var_bytes(&entry.requester_version);
				}
				w.write_u8(u8::from(*bidirectional));
			}
			ChannelMessage::SyncResponse { doc_id, transmission } => {
				w.write_var_string(doc_id.as_str());
				encode_transmission(w, transmission);
			}
			ChannelMessage::Ephemeral { doc_id, hops_remaining, stores } => {
				w.write_var_string(doc_id.as_str());
				w.write_uleb128(*hops_remaining);
				w.write_uleb128(stores.len() as u64);
				for store in stores {
					w.write_var_string(store.peer_id.as_str());
					w.write_var_string(&store.namespace);
					w.write_var_bytes(&store.data);
				}
			}
			ChannelMessage::Batch { messages } => {
				w.write_uleb128(messages.len() as u64);
				for msg in messages {
					msg.encode(w);
				}
			}
		}
	}

	fn decode(r: &mut Reader<'_>) -> WireResult<Self> {
		let tag = r.read_u8()?;
		Ok(match tag {
			0 => ChannelMessage::NewDoc { doc_ids: decode_doc_ids(r)? },
			1 => ChannelMessage::DirectoryRequest,
			2 => ChannelMessage::DirectoryResponse { doc_ids: decode_doc_ids(r)? },
			3 => {
				let count = r.read_uleb128()? as usize;
				let mut docs = Vec::with_capacity(count);
				for _ in 0..count {
					let doc_id = DocId::new(r.read_var_string()?);
					let requester_version = r.read_var_bytes()?;
					docs.push(SyncRequestEntry { doc_id, requester_version });
				}
				let bidirectional = r.read_u8()? != 0;
				ChannelMessage::SyncRequest { docs, bidirectional }
			}
			4 => {
				let doc_id = DocId::new(r.read_var_string()?);
				let transmission = decode_transmission(r)?;
				ChannelMessage::SyncResponse { doc_id, transmission }
			}
			5 => {
				let doc_id = DocId::new(r.read_var_string()?);
				let hops_remaining = r.read_uleb128()?;
				let count = r.read_uleb128()? as usize;
				let mut stores = Vec::with_capacity(count);
				for _ in 0..count {
					let peer_id = parse_peer_id(r)?;
					let namespace = r.read_var_string()?;
					let data = r.read_var_bytes()?;
					stores.push(EphemeralStoreEntry { peer_id, namespace, data });
				}
				ChannelMessage::Ephemeral { doc_id, hops_remaining, stores }
			}
			6 => {
				let count = r.read_uleb128()? as usize;
				let mut messages = Vec::with_capacity(count);
				for _ in 0..count {
					messages.push(ChannelMessage::decode(r)?);
				}
				ChannelMessage::Batch { messages }
			}
			other => return Err(WireError::UnknownMessageType(other)),
		})
	}
}

fn encode_doc_ids(w: &mut Writer, doc_ids: &[DocId]) {
	w.write_uleb128(doc_ids.len() as u64);
	for doc_id in doc_ids {
		w.write_var_string(doc_id.as_str());
	}
}

fn decode_doc_ids(r: &mut Reader<'_>) -> WireResult<Vec<DocId>> {
	let count = r.read_uleb128()? as usize;
	let mut out = Vec::with_capacity(count);
	for _ in 0..count {
		out.push(DocId::new(r.read_var_string()?));
	}
	Ok(out)
}

fn encode_transmission(w: &mut Writer, transmission: &Transmission) {
	match transmission {
		Transmission::UpToDate { version } => {
			w.write_u8(0);
			w.write_var_bytes(version);
		}
		Transmission::Snapshot { data, version } => {
			w.write_u8(1);
			w.write_var_bytes(data);
			w.write_var_bytes(version);
		}
		Transmission::Update { data, version } => {
			w.write_u8(2);
			w.write_var_bytes(data);
			w.write_var_bytes(version);
		}
		Transmission::Unavailable => w.write_u8(3),
	}
}

fn decode_transmission(r: &mut Reader<'_>) -> WireResult<Transmission> {
	Ok(match r.read_u8()? {
		0 => Transmission::UpToDate { version: r.read_var_bytes()? },
		1 => Transmission::Snapshot { data: r.read_var_bytes()?, version: r.read_var_bytes()? },
		2 => Transmission::Update { data: r.read_var_bytes()?, version: r.read_var_bytes()? },
		3 => Transmission::Unavailable,
		other => return Err(WireError::UnknownMessageType(other)),
	})
}

fn parse_peer_id(r: &mut Reader<'_>) -> WireResult<PeerId> {
	let raw = r.read_var_string()?;
	PeerId::parse(&raw).map_err(|_| WireError::TruncatedField("peer id"))
}

/// A complete, self-describing wire frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Envelope {
	JoinRequest { identity: Identity },
	JoinResponseOk { identity: Identity },
	JoinError { reason: String },
	DocUpdate { message: ChannelMessage },
	UpdateError { code: ErrorCode },
	Leave { channel_id: ChannelId },
}

impl Envelope {
	fn magic(&self) -> Magic {
		match self {
			Envelope::DocUpdate { message } if matches!(message, ChannelMessage::Ephemeral { .. }) => {
				Magic::Ephemeral
			}
			_ => Magic::Loro,
		}
	}

	fn message_type(&self) -> MessageType {
		match self {
			Envelope::JoinRequest { .. } => MessageType::JoinRequest,
			Envelope::JoinResponseOk { .. } => MessageType::JoinResponseOk,
			Envelope::JoinError { .. } => MessageType::JoinError,
			Envelope::DocUpdate { .. } => MessageType::DocUpdate,
			Envelope::UpdateError { .. } => MessageType::UpdateError,
			Envelope::Leave { .. } => MessageType::Leave,
		}
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut w = Writer::new();
		w.write_fixed4(self.magic().as_bytes());
		w.write_u8(self.message_type() as u8);
		match self {
			Envelope::JoinRequest { identity } | Envelope::JoinResponseOk { identity } => {
				encode_identity(&mut w, identity);
			}
			Envelope::JoinError { reason } => w.write_var_string(reason),
			Envelope::DocUpdate { message } => message.encode(&mut w),
			Envelope::UpdateError { code } => code.encode(&mut w),
			Envelope::Leave { channel_id } => w.write_uleb128(channel_id.as_u64()),
		}
		w.into_bytes()
	}

	pub fn decode(bytes: &[u8]) -> WireResult<Self> {
		if bytes.len() < 5 {
			return Err(WireError::ShortFrame);
		}
		let mut r = Reader::new(bytes);
		let magic = Magic::from_bytes(r.read_fixed4()?)?;
		let message_type = MessageType::from_u8(r.read_u8()?)?;
		let envelope = match message_type {
			MessageType::JoinRequest => Envelope::JoinRequest { identity: decode_identity(&mut r)? },
			MessageType::JoinResponseOk => {
				Envelope::JoinResponseOk { identity: decode_identity(&mut r)? }
			}
			MessageType::JoinError => Envelope::JoinError { reason: r.read_var_string()? },
			MessageType::DocUpdate => Envelope::DocUpdate { message: ChannelMessage::decode(&mut r)? },
			MessageType::UpdateError => Envelope::UpdateError { code: ErrorCode::decode(&mut r)? },
			MessageType::Leave => {
				Envelope::Leave { channel_id: ChannelId::from(r.read_uleb128()?) }
			}
		};
		let _ = magic; // magic only disambiguates family at the transport layer
		Ok(envelope)
	}
}

fn encode_identity(w: &mut Writer, identity: &Identity) {
	w.write_var_string(identity.peer_id.as_str());
	w.write_var_string(&identity.name);
	w.write_var_string(&identity.typ);
}

fn decode_identity(r: &mut Reader<'_>) -> WireResult<Identity> {
	let peer_id = parse_peer_id(r)?;
	let name = r.read_var_string()?;
	let typ = r.read_var_string()?;
	Ok(Identity { peer_id, name, typ })
}


// vim: ts=4
