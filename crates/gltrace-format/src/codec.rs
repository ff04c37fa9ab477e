//! Binary wire codec for [`TracePacket`].
//!
//! ```text
//! prelude  : magic(u32) | packet_type(u8) | size(u32) | call_counter(u64) |
//!            entrypoint_id(u16) | thread_id(u64) | context_handle(u64) |
//!            begin_rdtsc(u64) | end_rdtsc(u64)
//! params   : param_count(u16) | [ for each param:
//!              value_bits(u64) | has_client_mem(u8) |
//!              if has_client_mem: client_mem_offset(u32) element_count(u32)
//!                                  element_type_id(u16) element_namespace(u16) ]
//! return   : has_return(u8) | value_bits(u64) | client_mem? (same shape)
//! client   : client_mem_size(u32) | client_mem_bytes[client_mem_size]
//! kv       : kv_count(u32) | [ key(len-prefixed-utf8) tag(u8) value ]
//! crc      : crc64(u64)  -- covers every preceding byte
//! ```
//!
//! All multi-byte fields are little-endian. Sizes in the prelude include
//! every byte of the packet, the trailing CRC included.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use gltrace_types::{EntrypointId, HandleNamespace, TypeId};

use crate::{
    crc,
    error::FormatError,
    packet::{ClientMemRef, KvTag, KvValue, Param, PacketType, TracePacket, PACKET_MAGIC},
};

/// Smallest possible encoded packet: prelude + zero params + no return +
/// no client memory + no kv entries + crc.
pub const MIN_PACKET_SIZE: u32 = 51 + 2 + 1 + 4 + 4 + 8;

/// Default ceiling on a single packet's encoded size (64 MiB). Configurable
/// per reader/decoder call; oversized packets are rejected per §7
/// `FormatError`.
pub const DEFAULT_SIZE_CEILING: u32 = 64 * 1024 * 1024;

fn put_client_mem(dst: &mut BytesMut, client_mem: Option<ClientMemRef>) {
    match client_mem {
        None => dst.put_u8(0),
        Some(cm) => {
            dst.put_u8(1);
            dst.put_u32_le(cm.offset);
            dst.put_u32_le(cm.element_count);
            dst.put_u16_le(cm.element_type.0);
            dst.put_u16_le(cm.element_namespace.to_wire_id());
        },
    }
}

fn get_client_mem(src: &mut impl Buf, ceiling_region: u32) -> Result<Option<ClientMemRef>, FormatError> {
    if src.remaining() < 1 {
        return Err(FormatError::Truncated { declared: 1, available: src.remaining() });
    }
    let has = src.get_u8();
    if has == 0 {
        return Ok(None);
    }
    if src.remaining() < 12 {
        return Err(FormatError::Truncated { declared: 12, available: src.remaining() });
    }
    let offset = src.get_u32_le();
    let element_count = src.get_u32_le();
    let element_type = TypeId(src.get_u16_le());
    let ns_id = src.get_u16_le();
    let element_namespace = HandleNamespace::from_wire_id(ns_id)
        .ok_or(FormatError::UnknownNamespaceId(ns_id))?;
    let _ = ceiling_region;
    Ok(Some(ClientMemRef { offset, element_count, element_type, element_namespace }))
}

fn put_param(dst: &mut BytesMut, param: &Param) {
    dst.put_u64_le(param.value_bits);
    put_client_mem(dst, param.client_mem);
}

fn get_param(src: &mut impl Buf) -> Result<Param, FormatError> {
    if src.remaining() < 8 {
        return Err(FormatError::Truncated { declared: 8, available: src.remaining() });
    }
    let value_bits = src.get_u64_le();
    let client_mem = get_client_mem(src, 0)?;
    Ok(Param { value_bits, client_mem })
}

fn put_kv(dst: &mut BytesMut, key: &str, value: &KvValue) {
    let key_bytes = key.as_bytes();
    dst.put_u16_le(key_bytes.len() as u16);
    dst.put_slice(key_bytes);
    dst.put_u8(KvTag::of(value) as u8);
    match value {
        KvValue::Str(s) => {
            dst.put_u32_le(s.len() as u32);
            dst.put_slice(s.as_bytes());
        },
        KvValue::I64(v) => dst.put_i64_le(*v),
        KvValue::F64(v) => dst.put_f64_le(*v),
        KvValue::Blob(b) => {
            dst.put_u32_le(b.len() as u32);
            dst.put_slice(b);
        },
        KvValue::Id(v) => dst.put_u64_le(*v),
    }
}

fn get_kv(src: &mut impl Buf) -> Result<(String, KvValue), FormatError> {
    if src.remaining() < 2 {
        return Err(FormatError::Truncated { declared: 2, available: src.remaining() });
    }
    let key_len = src.get_u16_le() as usize;
    if src.remaining() < key_len + 1 {
        return Err(FormatError::Truncated { declared: (key_len + 1) as u32, available: src.remaining() });
    }
    let mut key_bytes = vec![0u8; key_len];
    src.copy_to_slice(&mut key_bytes);
    let key = String::from_utf8(key_bytes).map_err(|_| FormatError::InvalidUtf8 { field: "kv.key" })?;
    let tag_byte = src.get_u8();
    let tag = KvTag::from_u8(tag_byte).ok_or(FormatError::UnknownKvTag(tag_byte))?;
    let value = match tag {
        KvTag::Str => {
            if src.remaining() < 4 {
                return Err(FormatError::Truncated { declared: 4, available: src.remaining() });
            }
            let len = src.get_u32_le() as usize;
            if src.remaining() < len {
                return Err(FormatError::Truncated { declared: len as u32, available: src.remaining() });
            }
            let mut bytes = vec![0u8; len];
            src.copy_to_slice(&mut bytes);
            KvValue::Str(String::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8 { field: "kv.value" })?)
        },
        KvTag::I64 => {
            if src.remaining() < 8 {
                return Err(FormatError::Truncated { declared: 8, available: src.remaining() });
            }
            KvValue::I64(src.get_i64_le())
        },
        KvTag::F64 => {
            if src.remaining() < 8 {
                return Err(FormatError::Truncated { declared: 8, available: src.remaining() });
            }
            KvValue::F64(src.get_f64_le())
        },
        KvTag::Blob => {
            if src.remaining() < 4 {
                return Err(FormatError::Truncated { declared: 4, available: src.remaining() });
            }
            let len = src.get_u32_le() as usize;
            if src.remaining() < len {
                return Err(FormatError::Truncated { declared: len as u32, available: src.remaining() });
            }
            let mut bytes = vec![0u8; len];
            src.copy_to_slice(&mut bytes);
            KvValue::Blob(bytes)
        },
        KvTag::Id => {
            if src.remaining() < 8 {
                return Err(FormatError::Truncated { declared: 8, available: src.remaining() });
            }
            KvValue::Id(src.get_u64_le())
        },
    };
    Ok((key, value))
}

/// Encode a packet to its binary wire form, enforcing `ceiling` as the
/// maximum allowed total size.
pub fn encode(packet: &TracePacket, ceiling: u32) -> Result<Bytes, FormatError> {
    let mut body = BytesMut::new();

    body.put_u16_le(u16::try_from(packet.params.len()).unwrap_or(u16::MAX));
    for p in &packet.params {
        put_param(&mut body, p);
    }

    match &packet.return_value {
        None => body.put_u8(0),
        Some(ret) => {
            body.put_u8(1);
            put_param(&mut body, ret);
        },
    }

    body.put_u32_le(packet.client_memory.len() as u32);
    body.put_slice(&packet.client_memory);

    body.put_u32_le(packet.key_value_map.len() as u32);
    for (key, value) in &packet.key_value_map {
        put_kv(&mut body, key, value);
    }

    let total_size = 51u32
        .checked_add(u32::try_from(body.len()).map_err(|_| FormatError::SizeTooLarge {
            size: u32::MAX,
            ceiling,
        })?)
        .and_then(|n| n.checked_add(8))
        .ok_or(FormatError::SizeTooLarge { size: u32::MAX, ceiling })?;

    if total_size > ceiling {
        return Err(FormatError::SizeTooLarge { size: total_size, ceiling });
    }

    let mut out = BytesMut::with_capacity(total_size as usize);
    out.put_u32_le(PACKET_MAGIC);
    out.put_u8(packet.packet_type as u8);
    out.put_u32_le(total_size);
    out.put_u64_le(packet.call_counter);
    out.put_u16_le(packet.entrypoint_id.0);
    out.put_u64_le(packet.thread_id);
    out.put_u64_le(packet.context_handle);
    out.put_u64_le(packet.begin_rdtsc);
    out.put_u64_le(packet.end_rdtsc);
    out.put_slice(&body);

    let crc_value = crc::checksum(&out);
    out.put_u64_le(crc_value);

    Ok(out.freeze())
}

/// Peek the total encoded size of the packet starting at `bytes`, without
/// validating the CRC or decoding its body. Used by a framed stream (a trace
/// file reader) to know how many bytes to slice off before handing them to
/// [`decode`].
pub fn peek_size(bytes: &[u8], ceiling: u32) -> Result<u32, FormatError> {
    if bytes.len() < 9 {
        return Err(FormatError::Truncated { declared: MIN_PACKET_SIZE, available: bytes.len() });
    }
    let mut header = &bytes[..9];
    let magic = header.get_u32_le();
    if magic != PACKET_MAGIC {
        return Err(FormatError::BadMagic { expected: PACKET_MAGIC, actual: magic });
    }
    header.advance(1);
    let size = header.get_u32_le();
    if size < MIN_PACKET_SIZE {
        return Err(FormatError::SizeTooSmall { size, minimum: MIN_PACKET_SIZE });
    }
    if size > ceiling {
        return Err(FormatError::SizeTooLarge { size, ceiling });
    }
    Ok(size)
}

/// Decode a packet from its binary wire form, rejecting anything larger
/// than `ceiling`.
pub fn decode(bytes: &[u8], ceiling: u32) -> Result<TracePacket, FormatError> {
    if bytes.len() < 9 {
        return Err(FormatError::Truncated { declared: MIN_PACKET_SIZE, available: bytes.len() });
    }

    let mut header = &bytes[..9];
    let magic = header.get_u32_le();
    if magic != PACKET_MAGIC {
        return Err(FormatError::BadMagic { expected: PACKET_MAGIC, actual: magic });
    }

    let packet_type_byte = header.get_u8();
    let packet_type = PacketType::from_u8(packet_type_byte)
        .ok_or(FormatError::UnknownPacketType(packet_type_byte))?;

    let size = header.get_u32_le();
    if size < MIN_PACKET_SIZE {
        return Err(FormatError::SizeTooSmall { size, minimum: MIN_PACKET_SIZE });
    }
    if size > ceiling {
        return Err(FormatError::SizeTooLarge { size, ceiling });
    }
    if (bytes.len() as u64) < u64::from(size) {
        return Err(FormatError::Truncated { declared: size, available: bytes.len() });
    }

    let packet_bytes = &bytes[..size as usize];
    let (body_and_crc, mut crc_bytes) = packet_bytes.split_at(packet_bytes.len() - 8);
    let expected_crc = crc_bytes.get_u64_le();
    let computed_crc = crc::checksum(body_and_crc);
    if expected_crc != computed_crc {
        return Err(FormatError::CrcMismatch { expected: expected_crc, computed: computed_crc });
    }

    let mut cursor = &packet_bytes[9..packet_bytes.len() - 8];

    if cursor.remaining() < 8 + 2 + 8 + 8 + 8 + 8 {
        return Err(FormatError::Truncated { declared: 42, available: cursor.remaining() });
    }
    let call_counter = cursor.get_u64_le();
    let entrypoint_id = EntrypointId(cursor.get_u16_le());
    let thread_id = cursor.get_u64_le();
    let context_handle = cursor.get_u64_le();
    let begin_rdtsc = cursor.get_u64_le();
    let end_rdtsc = cursor.get_u64_le();

    if cursor.remaining() < 2 {
        return Err(FormatError::Truncated { declared: 2, available: cursor.remaining() });
    }
    let param_count = cursor.get_u16_le();
    let mut params = Vec::with_capacity(param_count as usize);
    for _ in 0..param_count {
        params.push(get_param(&mut cursor)?);
    }

    if cursor.remaining() < 1 {
        return Err(FormatError::Truncated { declared: 1, available: cursor.remaining() });
    }
    let has_return = cursor.get_u8();
    let return_value = if has_return == 0 { None } else { Some(get_param(&mut cursor)?) };

    if cursor.remaining() < 4 {
        return Err(FormatError::Truncated { declared: 4, available: cursor.remaining() });
    }
    let client_mem_size = cursor.get_u32_le();
    if cursor.remaining() < client_mem_size as usize {
        return Err(FormatError::Truncated { declared: client_mem_size, available: cursor.remaining() });
    }
    let mut client_memory = vec![0u8; client_mem_size as usize];
    cursor.copy_to_slice(&mut client_memory);

    for p in params.iter().chain(return_value.iter()) {
        if let Some(cm) = p.client_mem {
            let elem_size = gltrace_types::type_by_id(cm.element_type)
                .map(|t| u64::from(t.byte_size))
                .ok_or(FormatError::UnknownTypeId(cm.element_type.0))?;
            let extent = elem_size.saturating_mul(u64::from(cm.element_count));
            let end = u64::from(cm.offset).saturating_add(extent);
            if end > u64::from(client_mem_size) {
                return Err(FormatError::ClientMemoryOutOfRange {
                    offset: cm.offset,
                    len: extent,
                    region_size: client_mem_size,
                });
            }
        }
    }

    if cursor.remaining() < 4 {
        return Err(FormatError::Truncated { declared: 4, available: cursor.remaining() });
    }
    let kv_count = cursor.get_u32_le();
    let mut key_value_map = Vec::with_capacity(kv_count as usize);
    for _ in 0..kv_count {
        key_value_map.push(get_kv(&mut cursor)?);
    }

    Ok(TracePacket {
        packet_type,
        entrypoint_id,
        call_counter,
        thread_id,
        context_handle,
        begin_rdtsc,
        end_rdtsc,
        params,
        return_value,
        client_memory,
        key_value_map,
    })
}

#[cfg(test)]
mod tests {
    use gltrace_types::EntrypointId;
    use proptest::prelude::*;

    use super::*;

    fn sample_packet() -> TracePacket {
        let mut packet = TracePacket::new_call(EntrypointId(3), 42, 7);
        packet.context_handle = 99;
        packet.begin_rdtsc = 1000;
        packet.end_rdtsc = 1100;
        packet.params.push(Param::scalar(0x3F80_0000));
        packet.params.push(Param::with_client_mem(
            0,
            ClientMemRef {
                offset: 0,
                element_count: 4,
                element_type: TypeId(12),
                element_namespace: HandleNamespace::None,
            },
        ));
        packet.client_memory = vec![1, 2, 3, 4];
        packet.key_value_map.push(("note".to_string(), KvValue::Str("clear color".to_string())));
        packet
    }

    #[test]
    fn round_trip_sample_packet() {
        let packet = sample_packet();
        let encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap();
        let decoded = decode(&encoded, DEFAULT_SIZE_CEILING).unwrap();
        assert_eq!(packet, decoded);
    }

    #[test]
    fn zero_param_packet_round_trips() {
        let packet = TracePacket::new_call(EntrypointId(7), 0, 0);
        let encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap();
        let decoded = decode(&encoded, DEFAULT_SIZE_CEILING).unwrap();
        assert_eq!(decoded.params.len(), 0);
        assert!(decoded.client_memory.is_empty());
        assert_eq!(packet, decoded);
    }

    #[test]
    fn peek_size_matches_decoded_len() {
        let packet = sample_packet();
        let encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap();
        let size = peek_size(&encoded, DEFAULT_SIZE_CEILING).unwrap();
        assert_eq!(size as usize, encoded.len());
    }

    #[test]
    fn bad_magic_rejected() {
        let packet = sample_packet();
        let mut encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap().to_vec();
        encoded[0] ^= 0xFF;
        assert!(matches!(decode(&encoded, DEFAULT_SIZE_CEILING), Err(FormatError::BadMagic { .. })));
    }

    #[test]
    fn crc_mismatch_on_single_byte_flip() {
        let packet = sample_packet();
        let mut encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap().to_vec();
        let flip_at = encoded.len() / 2;
        encoded[flip_at] ^= 0x01;
        assert!(matches!(decode(&encoded, DEFAULT_SIZE_CEILING), Err(FormatError::CrcMismatch { .. })));
    }

    #[test]
    fn oversized_packet_rejected_by_ceiling() {
        let packet = sample_packet();
        let encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap();
        let tiny_ceiling = MIN_PACKET_SIZE;
        assert!(matches!(
            decode(&encoded, tiny_ceiling),
            Err(FormatError::SizeTooLarge { .. })
        ));
    }

    #[test]
    fn client_memory_out_of_range_rejected() {
        let mut packet = TracePacket::new_call(EntrypointId(3), 1, 1);
        packet.params.push(Param::with_client_mem(
            0,
            ClientMemRef {
                offset: 0,
                element_count: 100,
                element_type: TypeId(12),
                element_namespace: HandleNamespace::None,
            },
        ));
        packet.client_memory = vec![1, 2, 3, 4];
        let encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap();
        assert!(matches!(
            decode(&encoded, DEFAULT_SIZE_CEILING),
            Err(FormatError::ClientMemoryOutOfRange { .. })
        ));
    }

    proptest! {
        #[test]
        fn arbitrary_scalar_params_round_trip(
            entrypoint_id in 0u16..200,
            call_counter in any::<u64>(),
            thread_id in any::<u64>(),
            values in prop::collection::vec(any::<u64>(), 0..8),
        ) {
            let mut packet = TracePacket::new_call(EntrypointId(entrypoint_id), call_counter, thread_id);
            for v in values {
                packet.params.push(Param::scalar(v));
            }
            let encoded = encode(&packet, DEFAULT_SIZE_CEILING).unwrap();
            let decoded = decode(&encoded, DEFAULT_SIZE_CEILING).unwrap();
            prop_assert_eq!(packet, decoded);
        }
    }
}
