//! Divergence detection (§4.H.3): the three independently toggleable
//! comparison layers a replayed call is checked against.

use gltrace_format::{ClientMemRef, Param, TracePacket};
use gltrace_types::EntrypointId;

use crate::error::Divergence;

/// Compare a call's actual return value against the one recorded in
/// `packet.return_value`. `None` if the entrypoint has no return value or
/// the values agree.
#[must_use]
pub fn check_return_value(
    entrypoint_id: EntrypointId,
    packet: &TracePacket,
    actual: Option<u64>,
) -> Option<Divergence> {
    let expected = packet.return_value?.value_bits;
    let actual = actual?;
    if expected == actual {
        return None;
    }
    Some(Divergence::ReturnValue { entrypoint: entrypoint_id, expected, actual })
}

/// Compare every `out`/`inout` client-memory region the driver wrote back
/// in `live_client_memory` against the recorded bytes in
/// `packet.client_memory`, for params whose descriptor direction is not
/// pure `in`. Returns one [`Divergence::OutParameter`] per mismatching
/// param, in param order.
#[must_use]
pub fn check_out_parameters(
    entrypoint_id: EntrypointId,
    packet: &TracePacket,
    out_param_indices: &[usize],
    live_client_memory: &[u8],
) -> Vec<Divergence> {
    let mut divergences = Vec::new();
    for &index in out_param_indices {
        let Some(param) = packet.params.get(index) else { continue };
        let Some(recorded_region) = region(param, &packet.client_memory) else { continue };
        let Some(live_region) = region(param, live_client_memory) else { continue };
        if recorded_region != live_region {
            divergences.push(Divergence::OutParameter { entrypoint: entrypoint_id, param_index: index });
        }
    }
    divergences
}

fn region<'a>(param: &Param, buffer: &'a [u8]) -> Option<&'a [u8]> {
    let cm = param.client_mem?;
    let start = cm.offset as usize;
    let len = cm.byte_len()?;
    buffer.get(start..start + len)
}

/// Compare a per-swap frame digest against the one recorded for that
/// frame. `None` if they agree or no digest was recorded.
#[must_use]
pub fn check_frame_digest(frame: u64, recorded: Option<u64>, actual: u64) -> Option<Divergence> {
    let expected = recorded?;
    if expected == actual {
        return None;
    }
    Some(Divergence::FrameDigest { frame, expected, actual })
}

/// Extension used by [`check_out_parameters`] to compute a `ClientMemRef`'s
/// byte span; kept local rather than added to `gltrace-format` since only
/// the comparison logic needs it.
trait ClientMemRefExt {
    fn byte_len(&self) -> Option<usize>;
}

impl ClientMemRefExt for ClientMemRef {
    fn byte_len(&self) -> Option<usize> {
        let element_size = gltrace_types::type_by_id(self.element_type)?.byte_size as usize;
        Some(self.element_count as usize * element_size)
    }
}

#[cfg(test)]
mod tests {
    use gltrace_format::PacketType;
    use gltrace_types::TypeId;

    use super::*;

    fn packet_with_return(value: u64) -> TracePacket {
        let mut p = TracePacket::new_call(EntrypointId(0), 0, 1);
        p.packet_type = PacketType::Call;
        p.return_value = Some(Param::scalar(value));
        p
    }

    #[test]
    fn matching_return_value_is_not_a_divergence() {
        let packet = packet_with_return(42);
        assert!(check_return_value(EntrypointId(0), &packet, Some(42)).is_none());
    }

    #[test]
    fn mismatching_return_value_is_reported() {
        let packet = packet_with_return(42);
        let divergence = check_return_value(EntrypointId(0), &packet, Some(7)).unwrap();
        assert!(matches!(divergence, Divergence::ReturnValue { expected: 42, actual: 7, .. }));
    }

    #[test]
    fn frame_digest_mismatch_is_reported() {
        let divergence = check_frame_digest(3, Some(0xAAAA), 0xBBBB).unwrap();
        assert!(matches!(divergence, Divergence::FrameDigest { frame: 3, .. }));
    }

    #[test]
    fn frame_digest_with_no_recorded_value_never_diverges() {
        assert!(check_frame_digest(3, None, 0xBBBB).is_none());
    }

    #[test]
    fn out_parameter_mismatch_is_detected() {
        let mut packet = TracePacket::new_call(EntrypointId(0), 0, 1);
        let cm = ClientMemRef {
            offset: 0,
            element_count: 4,
            element_type: TypeId(1),
            element_namespace: gltrace_types::HandleNamespace::None,
        };
        packet.params.push(Param::with_client_mem(0, cm));
        packet.client_memory = vec![1, 2, 3, 4];

        let live_memory = vec![1, 2, 3, 9];
        let divergences = check_out_parameters(EntrypointId(0), &packet, &[0], &live_memory);
        assert_eq!(divergences.len(), 1);
    }
}
