//! Facade crate for addrsync address reconciliation.
//!
//! This crate re-exports the core engine types and exposes the file-backed
//! collaborators behind the `data` feature.

#![forbid(unsafe_code)]

pub use addrsync_core::{
    ChangeBatch, ChangeDocument, ChangeEmitter, ChangeSink, CollaboratorError, CorrectionTable,
    DestinationSnapshot, DriverConfig, DriverError, EngineConfig, MatchEngine, NormalizerConfig,
    Operation, Partition, RawAddress, ReconciliationDriver, RegistrySource, RoutedDocument, Routing,
    RunSummary, SnapshotSource, SourceNormalizer, SourceRecord, TargetElement, TargetIndex,
    UnitGroup, UnitId, UnitReport, distance_m, reconcile,
};

#[cfg(feature = "data")]
pub use addrsync_data::{DirectorySource, JsonChangeSink};

/// File formats and collaborators for directory-based runs.
#[cfg(feature = "data")]
pub use addrsync_data as data;
