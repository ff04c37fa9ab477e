//! Trace packet in-memory model ([`packet::TracePacket`]), binary wire
//! codec ([`codec`]), document (JSON) codec ([`document`]), and the packet
//! CRC ([`crc`]).
//!
//! Contract: for every packet produced by a well-behaved recorder,
//! `decode(encode(p)) == p` and `doc_decode(doc_encode(p)) == p`. The
//! [`verify_round_trip`] helper checks both, for the CLI's optional
//! `verify` mode.

pub mod codec;
pub mod crc;
pub mod document;
pub mod error;
pub mod packet;

pub use codec::{DEFAULT_SIZE_CEILING, MIN_PACKET_SIZE, decode, encode, peek_size};
pub use document::{doc_decode, doc_encode};
pub use error::FormatError;
pub use packet::{ClientMemRef, KvValue, Param, PacketType, TracePacket, PACKET_MAGIC};

/// Run both round-trip checks for `packet` and report any mismatch.
///
/// Used by `gltrace-cli`'s `dump`/`parse` `--verify` flag and by the
/// property tests in `gltrace-harness`.
pub fn verify_round_trip(packet: &TracePacket, ceiling: u32) -> Result<(), FormatError> {
    let encoded = encode(packet, ceiling)?;
    let decoded = decode(&encoded, ceiling)?;
    if &decoded != packet {
        return Err(FormatError::VerifyMismatch(
            "binary decode(encode(p)) != p".to_string(),
        ));
    }

    let doc = document::doc_encode(packet)?;
    let doc_decoded = document::doc_decode(&doc)?;
    if &doc_decoded != packet {
        return Err(FormatError::VerifyMismatch(
            "doc_decode(doc_encode(p)) != p".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use gltrace_types::EntrypointId;

    use super::*;

    #[test]
    fn verify_round_trip_accepts_well_formed_packet() {
        let packet = TracePacket::new_call(EntrypointId(4), 1, 1);
        assert!(verify_round_trip(&packet, DEFAULT_SIZE_CEILING).is_ok());
    }
}
