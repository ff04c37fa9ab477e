//! Per-entrypoint dispatch (§4.H.2).
//!
//! One packet is dispatched in four steps: remap every handle-bearing
//! parameter through the replay-time handle map, invoke the driver with the
//! remapped parameters and a scratch copy of client memory, fold
//! handle-generating/deleting effects back into the map, and run the
//! configured divergence checks against the driver's output. Pointer
//! materialization (§4.H.2 step 2) is implicit: `client_memory` already
//! carries the recorded `in`/`inout` bytes at each param's offset, and the
//! driver is expected to write `out` bytes back into the same buffer.

use gltrace_format::{ClientMemRef, Param, TracePacket};
use gltrace_snapshot::GlDriver;
use gltrace_types::{Entrypoint, EntrypointFlags, HandleNamespace, ParamDescriptor, ParamDirection};

use crate::{
    divergence::{check_out_parameters, check_return_value},
    error::{Divergence, EngineError, ErrorLocation},
    handle_map::HandleMap,
};

/// Outcome of dispatching one call packet.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// The value the driver actually returned, if the entrypoint has one.
    pub return_value: Option<u64>,
    /// Every divergence observed for this call, in check order (return
    /// value, then out-parameters).
    pub divergences: Vec<Divergence>,
}

/// Dispatch one call packet against `driver`, updating `handle_map` with
/// any handles the call generates or deletes.
#[allow(clippy::too_many_arguments)]
pub fn dispatch(
    entrypoint: &Entrypoint,
    packet: &TracePacket,
    handle_map: &mut HandleMap,
    driver: &mut dyn GlDriver,
    check_return: bool,
    check_out_params: bool,
    location: ErrorLocation,
) -> Result<DispatchOutcome, EngineError> {
    let mut params = packet.params.clone();
    let mut client_memory = packet.client_memory.clone();

    for (param, descriptor) in params.iter_mut().zip(entrypoint.params) {
        remap_param(param, descriptor, handle_map, &mut client_memory, location)?;
    }

    let actual_return = driver
        .invoke(entrypoint.id, &params, &mut client_memory)
        .map_err(|e| EngineError::Driver(e.to_string()))?;

    apply_handle_effects(entrypoint, packet, &client_memory, handle_map);

    let mut divergences = Vec::new();
    if check_return {
        divergences.extend(check_return_value(entrypoint.id, packet, actual_return));
    }
    if check_out_params {
        let out_indices: Vec<usize> = entrypoint
            .params
            .iter()
            .enumerate()
            .filter(|(_, d)| matches!(d.direction, ParamDirection::Out | ParamDirection::InOut))
            .map(|(i, _)| i)
            .collect();
        divergences.extend(check_out_parameters(
            entrypoint.id,
            packet,
            &out_indices,
            &client_memory,
        ));
    }

    Ok(DispatchOutcome { return_value: actual_return, divergences })
}

/// Translate one parameter's trace-side handle value(s) to live values,
/// in place, before the call is issued.
fn remap_param(
    param: &mut Param,
    descriptor: &ParamDescriptor,
    handle_map: &HandleMap,
    client_memory: &mut [u8],
    location: ErrorLocation,
) -> Result<(), EngineError> {
    if descriptor.namespace == HandleNamespace::None {
        return Ok(());
    }
    if !matches!(descriptor.direction, ParamDirection::In | ParamDirection::InOut) {
        return Ok(());
    }
    match param.client_mem {
        Some(cm) => remap_array(&cm, descriptor, handle_map, client_memory, location),
        None => {
            param.value_bits = resolve(handle_map, descriptor, param.value_bits, location)?;
            Ok(())
        },
    }
}

fn remap_array(
    cm: &ClientMemRef,
    descriptor: &ParamDescriptor,
    handle_map: &HandleMap,
    client_memory: &mut [u8],
    location: ErrorLocation,
) -> Result<(), EngineError> {
    if cm.element_namespace == HandleNamespace::None {
        return Ok(());
    }
    let Some(size) = gltrace_types::type_by_id(cm.element_type).map(|t| t.byte_size as usize) else {
        return Ok(());
    };
    let start = cm.offset as usize;
    for i in 0..cm.element_count as usize {
        let offset = start + i * size;
        let Some(slice) = client_memory.get_mut(offset..offset + size) else { break };
        let trace_handle = read_uint(slice);
        let live = resolve(handle_map, descriptor, trace_handle, location)?;
        write_uint(slice, live);
    }
    Ok(())
}

fn resolve(
    handle_map: &HandleMap,
    descriptor: &ParamDescriptor,
    trace_handle: u64,
    location: ErrorLocation,
) -> Result<u64, EngineError> {
    match handle_map.live(descriptor.namespace, trace_handle) {
        Some(live) => Ok(live),
        None if descriptor.tolerate_missing_handle => Ok(0),
        None => {
            Err(EngineError::HandleUnknown { handle: trace_handle, namespace: descriptor.namespace, location })
        },
    }
}

/// Fold the call's handle-generating/deleting side effects (§4.H.2 step 4)
/// into `handle_map`: for [`EntrypointFlags::GENERATES_HANDLES`], every
/// `out`-direction handle array gets a fresh trace→live mapping built from
/// the packet's recorded (pre-call) trace handles and the driver's
/// (post-call) live handles; for [`EntrypointFlags::DELETES_HANDLES`],
/// every `in`-direction handle reference is erased.
fn apply_handle_effects(
    entrypoint: &Entrypoint,
    packet: &TracePacket,
    client_memory_after: &[u8],
    handle_map: &mut HandleMap,
) {
    if entrypoint.flags.contains(EntrypointFlags::GENERATES_HANDLES) {
        for (param, descriptor) in packet.params.iter().zip(entrypoint.params) {
            if descriptor.namespace == HandleNamespace::None {
                continue;
            }
            if !matches!(descriptor.direction, ParamDirection::Out | ParamDirection::InOut) {
                continue;
            }
            let Some(cm) = param.client_mem else { continue };
            let Some(size) = gltrace_types::type_by_id(cm.element_type).map(|t| t.byte_size as usize)
            else {
                continue;
            };
            let start = cm.offset as usize;
            for i in 0..cm.element_count as usize {
                let offset = start + i * size;
                let Some(trace_slice) = packet.client_memory.get(offset..offset + size) else { break };
                let Some(live_slice) = client_memory_after.get(offset..offset + size) else { break };
                handle_map.insert(descriptor.namespace, read_uint(trace_slice), read_uint(live_slice));
            }
        }
    }

    if entrypoint.flags.contains(EntrypointFlags::DELETES_HANDLES) {
        for (param, descriptor) in packet.params.iter().zip(entrypoint.params) {
            if descriptor.namespace == HandleNamespace::None {
                continue;
            }
            if !matches!(descriptor.direction, ParamDirection::In | ParamDirection::InOut) {
                continue;
            }
            match param.client_mem {
                Some(cm) => {
                    let Some(size) =
                        gltrace_types::type_by_id(cm.element_type).map(|t| t.byte_size as usize)
                    else {
                        continue;
                    };
                    let start = cm.offset as usize;
                    for i in 0..cm.element_count as usize {
                        let offset = start + i * size;
                        let Some(slice) = packet.client_memory.get(offset..offset + size) else { break };
                        handle_map.erase(descriptor.namespace, read_uint(slice));
                    }
                },
                None => handle_map.erase(descriptor.namespace, param.value_bits),
            }
        }
    }
}

fn read_uint(bytes: &[u8]) -> u64 {
    match bytes.len() {
        1 => u64::from(bytes[0]),
        2 => bytes.try_into().map(u16::from_le_bytes).unwrap_or(0).into(),
        4 => bytes.try_into().map(u32::from_le_bytes).unwrap_or(0).into(),
        8 => bytes.try_into().map(u64::from_le_bytes).unwrap_or(0),
        _ => 0,
    }
}

fn write_uint(slice: &mut [u8], value: u64) {
    match slice.len() {
        1 => slice[0] = value as u8,
        2 => slice.copy_from_slice(&(value as u16).to_le_bytes()),
        4 => slice.copy_from_slice(&(value as u32).to_le_bytes()),
        8 => slice.copy_from_slice(&value.to_le_bytes()),
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use gltrace_format::{ClientMemRef, PacketType};
    use gltrace_snapshot::DriverError;
    use gltrace_types::{entrypoint_by_name, TypeId};

    use super::*;

    /// A driver double that remembers the exact params/client-memory it was
    /// invoked with, and returns a fixed handle for handle-generating calls.
    struct RecordingDriver {
        next_live_handle: u64,
        last_params: Vec<Param>,
    }

    impl RecordingDriver {
        fn new(next_live_handle: u64) -> Self {
            Self { next_live_handle, last_params: Vec::new() }
        }
    }

    impl GlDriver for RecordingDriver {
        fn invoke(
            &mut self,
            entrypoint_id: gltrace_types::EntrypointId,
            params: &[Param],
            client_memory: &mut [u8],
        ) -> Result<Option<u64>, DriverError> {
            self.last_params = params.to_vec();
            if entrypoint_by_name("glGenTextures").is_some_and(|e| e.id == entrypoint_id) {
                if let Some(cm) = params[1].client_mem {
                    let start = cm.offset as usize;
                    client_memory[start..start + 4].copy_from_slice(&(self.next_live_handle as u32).to_le_bytes());
                }
            }
            Ok(None)
        }

        fn backbuffer_digest_crc(&self) -> Result<u64, DriverError> {
            Ok(0)
        }

        fn backbuffer_digest_sum(&self) -> Result<u64, DriverError> {
            Ok(0)
        }

        fn enumerate(&self, _namespace: HandleNamespace) -> Vec<u64> {
            Vec::new()
        }

        fn capture_context(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::ContextRecord, DriverError> {
            unreachable!("not exercised by dispatch tests")
        }
        fn capture_texture(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::TextureRecord, DriverError> {
            unreachable!()
        }
        fn capture_buffer(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::BufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_program(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::ProgramRecord, DriverError> {
            unreachable!()
        }
        fn capture_shader(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::ShaderRecord, DriverError> {
            unreachable!()
        }
        fn capture_sampler(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::SamplerRecord, DriverError> {
            unreachable!()
        }
        fn capture_renderbuffer(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::RenderbufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_framebuffer(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::FramebufferRecord, DriverError> {
            unreachable!()
        }
        fn capture_vao(&self, _live_handle: u64) -> Result<gltrace_snapshot::schema::VaoRecord, DriverError> {
            unreachable!()
        }
        fn capture_sync(&self, _live_handle: u64) -> Result<gltrace_snapshot::schema::SyncRecord, DriverError> {
            unreachable!()
        }
        fn capture_query(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::QueryRecord, DriverError> {
            unreachable!()
        }
        fn capture_list(&self, _live_handle: u64) -> Result<gltrace_snapshot::schema::ListRecord, DriverError> {
            unreachable!()
        }
        fn capture_feedback(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::FeedbackRecord, DriverError> {
            unreachable!()
        }
        fn capture_pipeline(
            &self,
            _live_handle: u64,
        ) -> Result<gltrace_snapshot::schema::PipelineRecord, DriverError> {
            unreachable!()
        }
        fn capture_default_framebuffer(
            &self,
        ) -> Result<gltrace_snapshot::schema::DefaultFramebufferRecord, DriverError> {
            unreachable!()
        }
        fn create_context(
            &mut self,
            _record: &gltrace_snapshot::schema::ContextRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_shader(
            &mut self,
            _record: &gltrace_snapshot::schema::ShaderRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_program(
            &mut self,
            _record: &gltrace_snapshot::schema::ProgramRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_buffer(
            &mut self,
            _record: &gltrace_snapshot::schema::BufferRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_texture(
            &mut self,
            _record: &gltrace_snapshot::schema::TextureRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_sampler(
            &mut self,
            _record: &gltrace_snapshot::schema::SamplerRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_renderbuffer(
            &mut self,
            _record: &gltrace_snapshot::schema::RenderbufferRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_framebuffer(
            &mut self,
            _record: &gltrace_snapshot::schema::FramebufferRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_vao(&mut self, _record: &gltrace_snapshot::schema::VaoRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_query(
            &mut self,
            _record: &gltrace_snapshot::schema::QueryRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_sync(&mut self, _record: &gltrace_snapshot::schema::SyncRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_pipeline(
            &mut self,
            _record: &gltrace_snapshot::schema::PipelineRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_list(&mut self, _record: &gltrace_snapshot::schema::ListRecord) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn create_feedback(
            &mut self,
            _record: &gltrace_snapshot::schema::FeedbackRecord,
        ) -> Result<u64, DriverError> {
            unreachable!()
        }
        fn apply_context_state(
            &mut self,
            _record: &gltrace_snapshot::schema::ContextRecord,
        ) -> Result<(), DriverError> {
            unreachable!()
        }
        fn restore_default_framebuffer(
            &mut self,
            _record: &gltrace_snapshot::schema::DefaultFramebufferRecord,
        ) -> Result<(), DriverError> {
            unreachable!()
        }
    }

    fn loc() -> ErrorLocation {
        ErrorLocation { call_counter: 0, frame: 0 }
    }

    #[test]
    fn bind_texture_remaps_inline_handle() {
        let entrypoint = entrypoint_by_name("glBindTexture").unwrap();
        let mut packet = TracePacket::new_call(entrypoint.id, 0, 1);
        packet.packet_type = PacketType::Call;
        packet.params.push(Param::scalar(0x0DE1));
        packet.params.push(Param::scalar(7));

        let mut handle_map = HandleMap::new();
        handle_map.insert(HandleNamespace::Texture, 7, 42);
        let mut driver = RecordingDriver::new(0);

        dispatch(entrypoint, &packet, &mut handle_map, &mut driver, true, true, loc()).unwrap();
        assert_eq!(driver.last_params[1].value_bits, 42);
    }

    #[test]
    fn unmapped_handle_is_hard_error() {
        let entrypoint = entrypoint_by_name("glBindTexture").unwrap();
        let mut packet = TracePacket::new_call(entrypoint.id, 0, 1);
        packet.params.push(Param::scalar(0x0DE1));
        packet.params.push(Param::scalar(99));

        let mut handle_map = HandleMap::new();
        let mut driver = RecordingDriver::new(0);

        let result = dispatch(entrypoint, &packet, &mut handle_map, &mut driver, true, true, loc());
        assert!(matches!(result, Err(EngineError::HandleUnknown { handle: 99, .. })));
    }

    #[test]
    fn gen_textures_registers_generated_handle_mapping() {
        let entrypoint = entrypoint_by_name("glGenTextures").unwrap();
        let mut packet = TracePacket::new_call(entrypoint.id, 0, 1);
        packet.params.push(Param::scalar(1));
        packet.params.push(Param::with_client_mem(
            0,
            ClientMemRef { offset: 0, element_count: 1, element_type: TypeId(7), element_namespace: HandleNamespace::Texture },
        ));
        packet.client_memory = 7u32.to_le_bytes().to_vec();

        let mut handle_map = HandleMap::new();
        let mut driver = RecordingDriver::new(123);

        dispatch(entrypoint, &packet, &mut handle_map, &mut driver, true, true, loc()).unwrap();
        assert_eq!(handle_map.live(HandleNamespace::Texture, 7), Some(123));
    }

    #[test]
    fn delete_textures_erases_mapping() {
        let entrypoint = entrypoint_by_name("glDeleteTextures").unwrap();
        let mut packet = TracePacket::new_call(entrypoint.id, 0, 1);
        packet.params.push(Param::scalar(1));
        packet.params.push(Param::with_client_mem(
            0,
            ClientMemRef { offset: 0, element_count: 1, element_type: TypeId(7), element_namespace: HandleNamespace::Texture },
        ));
        packet.client_memory = 7u32.to_le_bytes().to_vec();

        let mut handle_map = HandleMap::new();
        handle_map.insert(HandleNamespace::Texture, 7, 42);
        let mut driver = RecordingDriver::new(0);

        dispatch(entrypoint, &packet, &mut handle_map, &mut driver, true, true, loc()).unwrap();
        assert_eq!(handle_map.live(HandleNamespace::Texture, 7), None);
    }
}
