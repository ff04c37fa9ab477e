//! Trim writer (§4.I): produces a shorter trace file that starts from a
//! restored state snapshot instead of an empty context, so a long capture
//! can be replayed from frame `N` onward without replaying frames `0..N`.
//!
//! [`closure`] computes which handles a copied packet range can reach, so
//! [`writer::trim`] can optionally shrink the prefix snapshot to just that
//! closure (`--optimize_snapshot`, §R.4) instead of carrying every object
//! the whole capture ever created.

pub mod closure;
pub mod error;
pub mod writer;

pub use closure::{collect_referenced_handles, expand_transitive_closure, prune_to_closure};
pub use error::TrimError;
pub use writer::{trim, TrimOptions, TrimStats};
