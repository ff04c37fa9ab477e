//! Static, process-global registries describing the GL call surface:
//! C types ([`ctype`]), entrypoints ([`entrypoint`]), and handle namespaces
//! ([`namespace`]).
//!
//! Every table here is generated once from an external description and
//! never mutated at runtime. The recorder and the replayer must agree on
//! these ids bit-for-bit; that agreement is the only contract this crate
//! exists to make explicit.

pub mod ctype;
pub mod entrypoint;
pub mod namespace;

pub use ctype::{GlCType, TypeId, all_types, type_by_id, type_by_name};
pub use entrypoint::{
    Entrypoint, EntrypointFlags, EntrypointId, ParamDescriptor, ParamDirection, all_entrypoints,
    entrypoint_by_id, entrypoint_by_name,
};
pub use namespace::HandleNamespace;
