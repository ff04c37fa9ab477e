//! Referenced-handle closure over a copied packet range (§4.I step 5,
//! `optimize_snapshot`).
//!
//! Walks the packets a trim run is about to copy and collects every
//! trace-side handle they can reach, per namespace, so the prepended
//! snapshot can be pruned to just the objects that range can possibly
//! touch. A direct scan of each packet's handle-namespaced parameters finds
//! only the objects named *explicitly* in the copied calls; a second pass
//! expands that set to a fixed point over the snapshot's own object graph
//! (a kept framebuffer keeps its attachments, a kept VAO keeps its bound
//! buffers, a kept context keeps everything it binds), since a restore that
//! drops an object a kept one points at would leave a dangling reference.

use std::collections::{HashMap, HashSet};

use gltrace_format::TracePacket;
use gltrace_snapshot::schema::Snapshot;
use gltrace_types::{HandleNamespace, entrypoint_by_id};

/// GL_RENDERBUFFER, distinguishing a framebuffer attachment's object
/// namespace from GL_TEXTURE (mirrors `gltrace_snapshot::capture`'s use of
/// the same constant).
const GL_RENDERBUFFER: u32 = 0x8D41;

type HandleSet = HashMap<HandleNamespace, HashSet<u64>>;

/// Every trace-side handle directly named by a handle-namespaced parameter,
/// return value, or context field of `packets`.
#[must_use]
pub fn collect_referenced_handles(packets: &[TracePacket]) -> HandleSet {
    let mut referenced: HandleSet = HashMap::new();
    for packet in packets {
        if packet.context_handle != 0 {
            referenced.entry(HandleNamespace::Context).or_default().insert(packet.context_handle);
        }
        let Some(entrypoint) = entrypoint_by_id(packet.entrypoint_id) else { continue };
        for (param, descriptor) in packet.params.iter().zip(entrypoint.params) {
            if descriptor.namespace != HandleNamespace::None && param.value_bits != 0 {
                referenced.entry(descriptor.namespace).or_default().insert(param.value_bits);
            }
        }
        // A handle-generating call's return value (e.g. `glCreateProgram`)
        // is namespace-ambiguous from the packet alone — no per-return
        // descriptor exists the way there is for params — so it is left
        // out here; the object it names is still reachable because the
        // generating call always precedes a bind/use call that names it
        // through a namespaced parameter instead.
    }
    referenced
}

/// Expand `referenced` to a fixed point over `snapshot`'s own object graph:
/// whenever a kept object points at another handle, that handle is kept
/// too. Iterates until a pass adds nothing new; bounded by the snapshot's
/// total object count, so this always terminates.
pub fn expand_transitive_closure(snapshot: &Snapshot, referenced: &mut HandleSet) {
    loop {
        let mut changed = false;
        let mut insert = |set: &mut HandleSet, ns: HandleNamespace, handle: u64| {
            if handle != 0 {
                changed |= set.entry(ns).or_default().insert(handle);
            }
        };

        for program in &snapshot.programs {
            if contains(referenced, HandleNamespace::Program, program.handle) {
                for shader in &program.attached_shaders {
                    insert(referenced, HandleNamespace::Shader, *shader);
                }
            }
        }
        for framebuffer in &snapshot.framebuffers {
            if contains(referenced, HandleNamespace::Framebuffer, framebuffer.handle) {
                for attachment in &framebuffer.attachments {
                    let namespace = if attachment.target == GL_RENDERBUFFER {
                        HandleNamespace::Renderbuffer
                    } else {
                        HandleNamespace::Texture
                    };
                    insert(referenced, namespace, attachment.object);
                }
            }
        }
        for vao in &snapshot.vaos {
            if contains(referenced, HandleNamespace::VertexArray, vao.handle) {
                for attrib in &vao.attribs {
                    insert(referenced, HandleNamespace::Buffer, attrib.buffer_binding);
                }
                if let Some(eab) = vao.element_array_buffer {
                    insert(referenced, HandleNamespace::Buffer, eab);
                }
            }
        }
        for pipeline in &snapshot.pipelines {
            if contains(referenced, HandleNamespace::Pipeline, pipeline.handle) {
                for (_, program) in &pipeline.programs {
                    insert(referenced, HandleNamespace::Program, *program);
                }
            }
        }
        for feedback in &snapshot.feedbacks {
            if contains(referenced, HandleNamespace::Feedback, feedback.handle) {
                for (_, buffer) in &feedback.buffer_bindings {
                    insert(referenced, HandleNamespace::Buffer, *buffer);
                }
            }
        }
        // Every context is always retained (see `prune_to_closure`), so its
        // bindings must always keep what they point at.
        for context in &snapshot.contexts {
            let bindings = &context.bindings;
            if let Some(program) = bindings.current_program {
                insert(referenced, HandleNamespace::Program, program);
            }
            if let Some(vao) = bindings.current_vao {
                insert(referenced, HandleNamespace::VertexArray, vao);
            }
            for (_, buffer) in &bindings.buffer_bindings {
                insert(referenced, HandleNamespace::Buffer, *buffer);
            }
            for (_, _, texture) in &bindings.texture_bindings {
                insert(referenced, HandleNamespace::Texture, *texture);
            }
            insert(referenced, HandleNamespace::Framebuffer, bindings.draw_framebuffer);
            insert(referenced, HandleNamespace::Framebuffer, bindings.read_framebuffer);
        }

        if !changed {
            return;
        }
    }
}

fn contains(referenced: &HandleSet, namespace: HandleNamespace, handle: u64) -> bool {
    referenced.get(&namespace).is_some_and(|set| set.contains(&handle))
}

/// Drop every handle-bearing record whose handle is not in `referenced`.
/// Contexts are never pruned: they carry no blob payload and every other
/// kept object's bindings are expressed in terms of them.
#[must_use]
pub fn prune_to_closure(mut snapshot: Snapshot, referenced: &HandleSet) -> Snapshot {
    let keep = |ns: HandleNamespace, handle: u64| contains(referenced, ns, handle);
    snapshot.textures.retain(|r| keep(HandleNamespace::Texture, r.handle));
    snapshot.buffers.retain(|r| keep(HandleNamespace::Buffer, r.handle));
    snapshot.programs.retain(|r| keep(HandleNamespace::Program, r.handle));
    snapshot.shaders.retain(|r| keep(HandleNamespace::Shader, r.handle));
    snapshot.samplers.retain(|r| keep(HandleNamespace::Sampler, r.handle));
    snapshot.renderbuffers.retain(|r| keep(HandleNamespace::Renderbuffer, r.handle));
    snapshot.framebuffers.retain(|r| keep(HandleNamespace::Framebuffer, r.handle));
    snapshot.vaos.retain(|r| keep(HandleNamespace::VertexArray, r.handle));
    snapshot.syncs.retain(|r| keep(HandleNamespace::Sync, r.handle));
    snapshot.queries.retain(|r| keep(HandleNamespace::Query, r.handle));
    snapshot.lists.retain(|r| keep(HandleNamespace::List, r.handle));
    snapshot.feedbacks.retain(|r| keep(HandleNamespace::Feedback, r.handle));
    snapshot.pipelines.retain(|r| keep(HandleNamespace::Pipeline, r.handle));
    snapshot
}

#[cfg(test)]
mod tests {
    use gltrace_format::Param;
    use gltrace_snapshot::schema::{BufferRecord, ProgramRecord, TextureRecord};
    use gltrace_types::EntrypointId;

    use super::*;

    fn glbindtexture_packet(handle: u64) -> TracePacket {
        let mut packet = TracePacket::new_call(EntrypointId(1), 0, 1);
        packet.params.push(Param::scalar(0x0DE1));
        packet.params.push(Param::scalar(handle));
        packet
    }

    #[test]
    fn direct_scan_finds_bound_texture_handle() {
        let referenced = collect_referenced_handles(&[glbindtexture_packet(7)]);
        assert!(referenced.get(&HandleNamespace::Texture).unwrap().contains(&7));
    }

    #[test]
    fn prune_drops_unreferenced_objects_and_keeps_referenced_ones() {
        let mut snapshot = Snapshot::empty();
        snapshot.textures.push(TextureRecord { handle: 1, target: 0x0DE1, levels: Vec::new() });
        snapshot.textures.push(TextureRecord { handle: 2, target: 0x0DE1, levels: Vec::new() });
        snapshot.buffers.push(BufferRecord { handle: 9, target: 0x8892, size: 0, usage: 0, contents: None });

        let mut referenced = HandleSet::new();
        referenced.entry(HandleNamespace::Texture).or_default().insert(1);

        let pruned = prune_to_closure(snapshot, &referenced);
        assert_eq!(pruned.textures.len(), 1);
        assert_eq!(pruned.textures[0].handle, 1);
        assert!(pruned.buffers.is_empty());
    }

    #[test]
    fn transitive_expansion_keeps_program_attached_shaders() {
        let mut snapshot = Snapshot::empty();
        snapshot.programs.push(ProgramRecord {
            handle: 5,
            attached_shaders: vec![11, 12],
            link_status: true,
            attribute_locations: Vec::new(),
            uniform_locations: Vec::new(),
            uniform_block_locations: Vec::new(),
            binary: None,
            sources: Vec::new(),
        });

        let mut referenced = HandleSet::new();
        referenced.entry(HandleNamespace::Program).or_default().insert(5);
        expand_transitive_closure(&snapshot, &mut referenced);

        let shaders = referenced.get(&HandleNamespace::Shader).unwrap();
        assert!(shaders.contains(&11) && shaders.contains(&12));
    }
}
