//! Packet CRC.
//!
//! Every packet's trailing `crc64` field covers every preceding byte. We use
//! the well-known CRC-64/XZ polynomial (the same one `xz`/`7-zip` use) rather
//! than hand-rolling a table: the algorithm is not this crate's subject
//! matter, only its placement in the wire format is.

use std::sync::LazyLock;

use crc::{Algorithm, Crc};

static PACKET_CRC: LazyLock<Crc<u64>> = LazyLock::new(|| Crc::<u64>::new(&crc::CRC_64_XZ));

/// Algorithm descriptor, exposed for diagnostics (`info` prints it).
#[must_use]
pub fn algorithm() -> &'static Algorithm<u64> {
    &crc::CRC_64_XZ
}

/// Compute the packet CRC over `bytes` (every byte preceding the trailing
/// `crc64` field).
#[must_use]
pub fn checksum(bytes: &[u8]) -> u64 {
    PACKET_CRC.checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let data = b"glClearColor(0.25, 0.5, 0.75, 1.0)";
        assert_eq!(checksum(data), checksum(data));
    }

    #[test]
    fn checksum_detects_single_byte_flip() {
        let mut data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let original = checksum(&data);
        data[3] ^= 0x01;
        assert_ne!(checksum(&data), original);
    }
}
