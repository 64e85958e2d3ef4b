//! Address reconciliation core.
//!
//! Brings a crowd-maintained map dataset in line with an authoritative
//! address registry. The pipeline per administrative unit is:
//!
//! 1. [`SourceNormalizer`] cleans registry rows into [`SourceRecord`]s.
//! 2. [`TargetIndex`] indexes the destination [`DestinationSnapshot`].
//! 3. [`MatchEngine`] pairs records with elements in three passes and fills a
//!    [`ChangeBatch`] with [`Operation`]s.
//! 4. [`ChangeEmitter`] renders batches into [`ChangeDocument`]s and routes
//!    each one to upload or manual review.
//!
//! [`ReconciliationDriver`] runs these steps through collaborator traits. The
//! engine itself performs no I/O: [`reconcile`] is a pure function of its
//! inputs.

#![forbid(unsafe_code)]

mod batch;
mod config;
pub mod distance;
mod driver;
mod element;
mod emit;
mod engine;
mod index;
mod normalize;
pub mod record;
pub mod tags;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use batch::{BatchCounters, ChangeBatch, NewNode, Operation, UnitId};
pub use config::{
    ConfigError, DEFAULT_CHANGE_BUDGET, DEFAULT_EXACT_THRESHOLD_M, DEFAULT_FIRST_PLACEHOLDER_ID,
    DEFAULT_MAX_RELOCATION_M, DEFAULT_SANITY_BOUND_M, EngineConfig, NormalizerConfig,
};
pub use distance::distance_m;
pub use driver::{
    ChangeSink, CollaboratorError, DriverConfig, DriverError, Partition, ReconciliationDriver,
    RegistrySource, RunSummary, SnapshotSource, UnitGroup, UnitReport,
};
pub use element::{
    DestinationSnapshot, ElementKind, ElementMeta, ElementRef, Geometry, Member, TargetElement,
};
pub use emit::{
    ChangeAction, ChangeDocument, ChangeEmitter, ChangeEntry, EmittedElement, RoutedDocument,
    Routing,
};
pub use engine::{MatchEngine, MatchOutcome, MatchStats, reconcile};
pub use index::TargetIndex;
pub use normalize::{
    CorrectionTable, InitialsCorrector, InvalidRecord, NoCorrection, Normalized, RecordIssue,
    SourceNormalizer, SpellingCorrector,
};
pub use record::{AddressKind, MatchKey, RawAddress, SourceRecord};
pub use tags::Tags;
