//! In-memory trace packet model.
//!
//! A [`TracePacket`] fully captures one recorded call: it needs nothing from
//! earlier packets to decode, save for trace-wide state carried in the
//! start-of-file record (pointer size, endianness, blob archive) which lives
//! in `gltrace-file`. Packets are constructed by the recorder, frozen once
//! serialized, and the replayer only ever deserializes them read-only.

use gltrace_types::{EntrypointId, HandleNamespace, TypeId};

/// Wire-format magic: `"GLTR"`.
pub const PACKET_MAGIC: u32 = 0x474C_5452;

/// Distinguishes ordinary call packets from the framing/control packets
/// multiplexed into the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// An ordinary recorded GL call.
    Call = 0,
    /// End-of-file marker; the last packet in a well-formed trace.
    Eof = 1,
    /// A replayer-only control packet, e.g. a trim-inserted state-snapshot
    /// application directive.
    InternalTraceCommand = 2,
}

impl PacketType {
    /// Decode from the wire byte, rejecting unknown tags.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Call),
            1 => Some(Self::Eof),
            2 => Some(Self::InternalTraceCommand),
            _ => None,
        }
    }
}

/// A client-memory array descriptor attached to a pointer-valued param.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMemRef {
    /// Byte offset into the packet's client-memory blob.
    pub offset: u32,
    /// Number of elements (not bytes).
    pub element_count: u32,
    /// Element C-type id.
    pub element_type: TypeId,
    /// Handle namespace of elements, or `None` for plain data.
    pub element_namespace: HandleNamespace,
}

/// One parameter value: the inline scalar/pointer bit pattern, plus an
/// optional pointed-to client-memory array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    /// Zero-extended bit pattern of the inline value.
    pub value_bits: u64,
    /// Present when this parameter points at captured client memory.
    pub client_mem: Option<ClientMemRef>,
}

impl Param {
    /// A plain scalar parameter with no client memory.
    #[must_use]
    pub fn scalar(value_bits: u64) -> Self {
        Self { value_bits, client_mem: None }
    }

    /// A pointer parameter backed by captured client memory.
    #[must_use]
    pub fn with_client_mem(value_bits: u64, client_mem: ClientMemRef) -> Self {
        Self { value_bits, client_mem: Some(client_mem) }
    }
}

/// One key-value side-channel entry's value.
///
/// Used for out-of-band data that doesn't fit the positional param list:
/// snapshot references, extension metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum KvValue {
    /// A UTF-8 string.
    Str(String),
    /// A signed 64-bit integer.
    I64(i64),
    /// A 64-bit float.
    F64(f64),
    /// An opaque byte blob.
    Blob(Vec<u8>),
    /// An unsigned 64-bit id (e.g. a blob-archive reference).
    Id(u64),
}

/// Wire tag for a [`KvValue`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum KvTag {
    Str = 0,
    I64 = 1,
    F64 = 2,
    Blob = 3,
    Id = 4,
}

impl KvTag {
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Str),
            1 => Some(Self::I64),
            2 => Some(Self::F64),
            3 => Some(Self::Blob),
            4 => Some(Self::Id),
            _ => None,
        }
    }

    pub(crate) fn of(value: &KvValue) -> Self {
        match value {
            KvValue::Str(_) => Self::Str,
            KvValue::I64(_) => Self::I64,
            KvValue::F64(_) => Self::F64,
            KvValue::Blob(_) => Self::Blob,
            KvValue::Id(_) => Self::Id,
        }
    }
}

/// One self-describing record of one GL call.
///
/// Constructed by the recorder; the replayer treats every field as
/// read-only. Equality is field-wise (used by the codec round-trip
/// properties) and does not recompute CRCs — CRC is a wire-form concern,
/// not part of the in-memory value.
#[derive(Debug, Clone, PartialEq)]
pub struct TracePacket {
    /// Distinguishes call / EOF / internal-command packets.
    pub packet_type: PacketType,
    /// Which entrypoint was invoked. Meaningless for `Eof`.
    pub entrypoint_id: EntrypointId,
    /// Monotonic call identity within one trace file.
    pub call_counter: u64,
    /// Recording thread id.
    pub thread_id: u64,
    /// Recorded context handle (trace-side, pre-remap).
    pub context_handle: u64,
    /// Timestamp-counter value sampled before the call.
    pub begin_rdtsc: u64,
    /// Timestamp-counter value sampled after the call.
    pub end_rdtsc: u64,
    /// One entry per entrypoint parameter, in declaration order.
    pub params: Vec<Param>,
    /// Present iff the entrypoint has a non-void return type.
    pub return_value: Option<Param>,
    /// Client-memory bytes referenced by any `params`/`return_value`
    /// `client_mem` descriptor. Offsets are relative to the start of this
    /// blob.
    pub client_memory: Vec<u8>,
    /// Out-of-band key/value side channel, in insertion order.
    pub key_value_map: Vec<(String, KvValue)>,
}

impl TracePacket {
    /// Construct a new call packet with no client memory or key-value data.
    #[must_use]
    pub fn new_call(entrypoint_id: EntrypointId, call_counter: u64, thread_id: u64) -> Self {
        Self {
            packet_type: PacketType::Call,
            entrypoint_id,
            call_counter,
            thread_id,
            context_handle: 0,
            begin_rdtsc: 0,
            end_rdtsc: 0,
            params: Vec::new(),
            return_value: None,
            client_memory: Vec::new(),
            key_value_map: Vec::new(),
        }
    }

    /// The distinguished end-of-file packet.
    #[must_use]
    pub fn eof(call_counter: u64) -> Self {
        Self {
            packet_type: PacketType::Eof,
            entrypoint_id: EntrypointId(0xFFFF),
            call_counter,
            thread_id: 0,
            context_handle: 0,
            begin_rdtsc: 0,
            end_rdtsc: 0,
            params: Vec::new(),
            return_value: None,
            client_memory: Vec::new(),
            key_value_map: Vec::new(),
        }
    }

    /// An internal state-snapshot application directive, as emitted by the
    /// trim writer ahead of the copied packet tail.
    #[must_use]
    pub fn internal_state_snapshot(call_counter: u64, blob_id: u64) -> Self {
        let mut packet = Self::new_call(EntrypointId(0xFFFE), call_counter, 0);
        packet.packet_type = PacketType::InternalTraceCommand;
        packet.key_value_map.push(("kind".to_string(), KvValue::Str("state_snapshot".to_string())));
        packet.key_value_map.push(("blob_id".to_string(), KvValue::Id(blob_id)));
        packet
    }

    /// Read this packet's `blob_id` kv entry, if it is a state-snapshot
    /// internal command.
    #[must_use]
    pub fn state_snapshot_blob_id(&self) -> Option<u64> {
        if self.packet_type != PacketType::InternalTraceCommand {
            return None;
        }
        self.key_value_map.iter().find_map(|(k, v)| match (k.as_str(), v) {
            ("blob_id", KvValue::Id(id)) => Some(*id),
            _ => None,
        })
    }
}
