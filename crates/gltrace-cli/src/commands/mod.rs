//! One module per `gltrace` subcommand (§6.4).
//!
//! Each module owns its `clap::Args` struct and a `run` function; `main.rs`
//! only wires the parsed `Command` enum to these functions; no subcommand
//! logic lives in `main` itself.

pub mod compare;
pub mod dump;
pub mod find;
pub mod info;
pub mod pack;
pub mod parse;
pub mod replay;
pub mod trim;
