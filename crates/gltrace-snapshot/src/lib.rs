//! Portable GL state snapshot: capture, restore, and document (de)serialization
//! (§3.6, §4.G, §6.3).
//!
//! This crate depends on [`gltrace_archive`] for blob storage and
//! [`gltrace_format`] for the `Param` shape `gltrace-replay` passes through
//! [`driver::GlDriver::invoke`], but has no dependency on `gltrace-replay`
//! itself — [`resolver::TraceHandleResolver`] is the seam that keeps the
//! dependency direction one-way.

pub mod capture;
pub mod document;
pub mod driver;
pub mod error;
pub mod resolver;
pub mod restore;
pub mod schema;

pub use capture::capture;
pub use document::{all_blob_refs, load, resolve, save};
pub use driver::{DriverError, GlDriver};
pub use error::SnapshotError;
pub use resolver::{IdentityResolver, TraceHandleResolver};
pub use restore::{restore, RestoreHandleMap, RestoreOptions};
pub use schema::Snapshot;
