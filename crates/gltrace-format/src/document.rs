//! JSON-shape document codec for [`TracePacket`].
//!
//! The document form exists so a trace can be edited and diffed as text.
//! It is schema-versioned (the root `schema_version` field) and lossless
//! with respect to the binary form for every observable field; the CRC is
//! not carried across — it is recomputed whenever the document is turned
//! back into a binary packet.
//!
//! Large byte payloads are base64-inlined here rather than turned into
//! archive blob references: this codec operates on one packet in
//! isolation and has no blob-archive collaborator. The archive-backed
//! blob-reference form described for the trace file as a whole is
//! produced one layer up, by the trace file dump/parse path.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use gltrace_types::{EntrypointId, HandleNamespace, TypeId, entrypoint_by_id, entrypoint_by_name};
use serde::{Deserialize, Serialize};

use crate::{
    error::FormatError,
    packet::{ClientMemRef, KvValue, Param, PacketType, TracePacket},
};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DocArrayRef {
    offset: u32,
    count: u32,
    element_type: u16,
    element_namespace: u16,
}

#[derive(Debug, Serialize, Deserialize)]
struct DocParam {
    value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    array: Option<DocArrayRef>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "tag", content = "value")]
enum DocKv {
    Str(String),
    I64(i64),
    F64(f64),
    Blob(String),
    Id(u64),
}

#[derive(Debug, Serialize, Deserialize)]
struct DocPacket {
    schema_version: u32,
    packet_type: String,
    func: String,
    entrypoint_id: u16,
    call_counter: u64,
    thread: u64,
    context: u64,
    begin_rdtsc: u64,
    end_rdtsc: u64,
    /// The packet's whole `client_memory` blob, base64-inlined once; each
    /// param's `array` is a pure `{offset, count, ...}` descriptor into this
    /// shared blob, mirroring the binary form rather than re-slicing and
    /// re-concatenating per param.
    client_memory_base64: String,
    params: Vec<DocParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#return: Option<DocParam>,
    meta: Vec<(String, DocKv)>,
}

fn packet_type_tag(t: PacketType) -> &'static str {
    match t {
        PacketType::Call => "call",
        PacketType::Eof => "eof",
        PacketType::InternalTraceCommand => "internal_trace_command",
    }
}

fn packet_type_from_tag(tag: &str) -> Option<PacketType> {
    match tag {
        "call" => Some(PacketType::Call),
        "eof" => Some(PacketType::Eof),
        "internal_trace_command" => Some(PacketType::InternalTraceCommand),
        _ => None,
    }
}

fn client_mem_slice<'a>(
    cm: &ClientMemRef,
    client_memory: &'a [u8],
) -> Result<&'a [u8], FormatError> {
    let elem_size = gltrace_types::type_by_id(cm.element_type)
        .map(|t| u64::from(t.byte_size))
        .ok_or(FormatError::UnknownTypeId(cm.element_type.0))?;
    let len = elem_size.saturating_mul(u64::from(cm.element_count));
    let end = u64::from(cm.offset).saturating_add(len);
    if end > client_memory.len() as u64 {
        return Err(FormatError::ClientMemoryOutOfRange {
            offset: cm.offset,
            len,
            region_size: client_memory.len() as u32,
        });
    }
    Ok(&client_memory[cm.offset as usize..end as usize])
}

fn doc_param(param: &Param, client_memory: &[u8]) -> Result<DocParam, FormatError> {
    let array = match param.client_mem {
        None => None,
        Some(cm) => {
            // Validate the descriptor resolves within the blob rather than
            // inlining its bytes: the blob itself is serialized once at the
            // packet level.
            client_mem_slice(&cm, client_memory)?;
            Some(DocArrayRef {
                offset: cm.offset,
                count: cm.element_count,
                element_type: cm.element_type.0,
                element_namespace: cm.element_namespace.to_wire_id(),
            })
        },
    };
    Ok(DocParam { value: param.value_bits, array })
}

fn from_doc_param(doc: DocParam, client_memory: &[u8]) -> Result<Param, FormatError> {
    let client_mem = match doc.array {
        None => None,
        Some(arr) => {
            let element_namespace = HandleNamespace::from_wire_id(arr.element_namespace)
                .ok_or(FormatError::UnknownNamespaceId(arr.element_namespace))?;
            let cm = ClientMemRef {
                offset: arr.offset,
                element_count: arr.count,
                element_type: TypeId(arr.element_type),
                element_namespace,
            };
            client_mem_slice(&cm, client_memory)?;
            Some(cm)
        },
    };
    Ok(Param { value_bits: doc.value, client_mem })
}

/// Encode a packet to its JSON document form.
pub fn doc_encode(packet: &TracePacket) -> Result<String, FormatError> {
    let func = entrypoint_by_id(packet.entrypoint_id)
        .map(|e| e.name.to_string())
        .unwrap_or_else(|| format!("<entrypoint:{}>", packet.entrypoint_id.0));

    let params = packet
        .params
        .iter()
        .map(|p| doc_param(p, &packet.client_memory))
        .collect::<Result<Vec<_>, _>>()?;

    let r#return = packet
        .return_value
        .as_ref()
        .map(|p| doc_param(p, &packet.client_memory))
        .transpose()?;

    let meta = packet
        .key_value_map
        .iter()
        .map(|(k, v)| {
            let doc_v = match v {
                KvValue::Str(s) => DocKv::Str(s.clone()),
                KvValue::I64(v) => DocKv::I64(*v),
                KvValue::F64(v) => DocKv::F64(*v),
                KvValue::Blob(b) => DocKv::Blob(BASE64.encode(b)),
                KvValue::Id(v) => DocKv::Id(*v),
            };
            (k.clone(), doc_v)
        })
        .collect();

    let doc = DocPacket {
        schema_version: SCHEMA_VERSION,
        packet_type: packet_type_tag(packet.packet_type).to_string(),
        func,
        entrypoint_id: packet.entrypoint_id.0,
        call_counter: packet.call_counter,
        thread: packet.thread_id,
        context: packet.context_handle,
        begin_rdtsc: packet.begin_rdtsc,
        end_rdtsc: packet.end_rdtsc,
        client_memory_base64: BASE64.encode(&packet.client_memory),
        params,
        r#return,
        meta,
    };

    serde_json::to_string_pretty(&doc).map_err(|e| FormatError::Document(e.to_string()))
}

/// Decode a packet from its JSON document form.
pub fn doc_decode(text: &str) -> Result<TracePacket, FormatError> {
    let doc: DocPacket = serde_json::from_str(text).map_err(|e| FormatError::Document(e.to_string()))?;

    if doc.schema_version != SCHEMA_VERSION {
        return Err(FormatError::Document(format!(
            "unsupported document schema version {}",
            doc.schema_version
        )));
    }

    let packet_type = packet_type_from_tag(&doc.packet_type)
        .ok_or_else(|| FormatError::Document(format!("unknown packet_type {}", doc.packet_type)))?;

    let entrypoint_id = EntrypointId(doc.entrypoint_id);
    if packet_type == PacketType::Call
        && gltrace_types::entrypoint_by_id(entrypoint_id).is_none()
        && entrypoint_by_name(&doc.func).is_none()
    {
        return Err(FormatError::UnknownEntrypointId(doc.entrypoint_id));
    }

    let client_memory = BASE64
        .decode(doc.client_memory_base64.as_bytes())
        .map_err(|e| FormatError::Document(format!("bad base64 client memory blob: {e}")))?;
    let params = doc
        .params
        .into_iter()
        .map(|p| from_doc_param(p, &client_memory))
        .collect::<Result<Vec<_>, _>>()?;
    let return_value = doc.r#return.map(|p| from_doc_param(p, &client_memory)).transpose()?;

    let key_value_map = doc
        .meta
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                DocKv::Str(s) => KvValue::Str(s),
                DocKv::I64(v) => KvValue::I64(v),
                DocKv::F64(v) => KvValue::F64(v),
                DocKv::Blob(b) => KvValue::Blob(
                    BASE64.decode(b.as_bytes()).map_err(|e| FormatError::Document(e.to_string()))?,
                ),
                DocKv::Id(v) => KvValue::Id(v),
            };
            Ok((k, value))
        })
        .collect::<Result<Vec<_>, FormatError>>()?;

    Ok(TracePacket {
        packet_type,
        entrypoint_id,
        call_counter: doc.call_counter,
        thread_id: doc.thread,
        context_handle: doc.context,
        begin_rdtsc: doc.begin_rdtsc,
        end_rdtsc: doc.end_rdtsc,
        params,
        return_value,
        client_memory,
        key_value_map,
    })
}
