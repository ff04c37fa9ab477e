//! Error kinds for the trace packet codec.

use thiserror::Error;

/// Errors from decoding or encoding a trace packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Prelude magic did not match [`crate::packet::PACKET_MAGIC`].
    #[error("bad packet magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic {
        /// Expected magic value.
        expected: u32,
        /// Magic value actually read.
        actual: u32,
    },

    /// Declared packet size was smaller than the minimum possible packet.
    #[error("packet size {size} below minimum {minimum}")]
    SizeTooSmall {
        /// Size declared in the prelude.
        size: u32,
        /// Minimum valid packet size.
        minimum: u32,
    },

    /// Declared packet size exceeded the configured ceiling.
    #[error("packet size {size} exceeds ceiling {ceiling}")]
    SizeTooLarge {
        /// Size declared in the prelude.
        size: u32,
        /// Configured ceiling.
        ceiling: u32,
    },

    /// Fewer bytes were available than the prelude's declared size.
    #[error("packet truncated: declared {declared} bytes, only {available} available")]
    Truncated {
        /// Bytes declared in the prelude.
        declared: u32,
        /// Bytes actually available.
        available: usize,
    },

    /// The trailing CRC did not match the bytes preceding it.
    #[error("CRC mismatch: expected {expected:#018x}, computed {computed:#018x}")]
    CrcMismatch {
        /// CRC stored in the packet.
        expected: u64,
        /// CRC computed over the preceding bytes.
        computed: u64,
    },

    /// A client-memory descriptor's `offset + count * elem_size` fell
    /// outside the packet's client-memory region.
    #[error(
        "client memory range out of bounds: offset {offset} len {len} region size {region_size}"
    )]
    ClientMemoryOutOfRange {
        /// Offset into the client-memory blob.
        offset: u32,
        /// Requested length in bytes.
        len: u64,
        /// Size of the client-memory region.
        region_size: u32,
    },

    /// A param or return value referenced a type id the decoder does not
    /// recognize.
    #[error("unknown type id {0}")]
    UnknownTypeId(u16),

    /// A packet referenced an entrypoint id the decoder does not recognize.
    #[error("unknown entrypoint id {0}")]
    UnknownEntrypointId(u16),

    /// A client-memory descriptor referenced a handle namespace id the
    /// decoder does not recognize.
    #[error("unknown namespace id {0}")]
    UnknownNamespaceId(u16),

    /// The prelude's `packet_type` byte did not match any known variant.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// A key-value entry used an unrecognized value tag.
    #[error("unknown key-value tag {0}")]
    UnknownKvTag(u8),

    /// A string field (key, name, blob name) was not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 {
        /// Which field failed to decode.
        field: &'static str,
    },

    /// The document (JSON) form failed to parse or did not match the
    /// expected schema.
    #[error("document codec error: {0}")]
    Document(String),

    /// Round-trip verification (`decode ∘ encode` or `doc_decode ∘
    /// doc_encode`) produced output that does not match the input.
    #[error("round-trip verification failed: {0}")]
    VerifyMismatch(String),
}
