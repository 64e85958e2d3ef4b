//! Collaborator adapters for the address reconciliation engine.
//!
//! Responsibilities:
//! - Decode destination snapshots (Overpass JSON) and registry extracts.
//! - Load street-name correction dictionaries.
//! - Serve units from a directory and write routed change documents back.
//!
//! Boundaries:
//! - Do not encode matching rules (those live in `addrsync-core`).
//! - All filesystem access goes through `addrsync-fs`.

#![forbid(unsafe_code)]

mod corrections;
mod directory;
mod overpass;
mod registry;
mod sink;

pub use corrections::{CorrectionsError, load_corrections, load_corrections_file};
pub use directory::{DirectoryError, DirectorySource, UnitFile};
pub use overpass::{SnapshotDecodeError, decode_overpass_snapshot};
pub use registry::{RegistryDecodeError, decode_registry_extract};
pub use sink::{JsonChangeSink, SinkError};
