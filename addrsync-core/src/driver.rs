//! Orchestration of reconciliation across administrative units.
//!
//! The driver fetches inputs through collaborator traits, runs the pure
//! engine per unit and hands routed documents to a sink. Units are
//! independent, so [`ReconciliationDriver::reconcile_units`] spreads them
//! over the rayon thread pool; results keep the input order.

use log::info;
use rayon::prelude::*;
use thiserror::Error;

use crate::{
    BatchCounters, ChangeBatch, ChangeEmitter, ConfigError, DestinationSnapshot, EngineConfig,
    MatchEngine, NormalizerConfig, RawAddress, RoutedDocument, Routing, SourceNormalizer,
    SpellingCorrector, TargetIndex, UnitId,
};

/// Failure reported by a collaborator. Opaque to the engine.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The collaborator does not know the unit.
    #[error("unknown unit {unit}")]
    UnknownUnit {
        /// Unit requested.
        unit: UnitId,
    },
    /// The collaborator failed for its own reasons.
    #[error("{operation} failed: {source}")]
    Failed {
        /// What the collaborator was doing.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CollaboratorError {
    /// Wrap an arbitrary error raised while performing `operation`.
    #[must_use]
    pub fn failed<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Failed {
            operation,
            source: Box::new(source),
        }
    }
}

/// Supplies raw registry records for a unit.
pub trait RegistrySource: Send + Sync {
    /// Fetch the registry extract of `unit`.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the extract cannot be produced.
    fn fetch_registry(&self, unit: &UnitId) -> Result<Vec<RawAddress>, CollaboratorError>;
}

/// Supplies destination snapshots for a unit.
///
/// Implementations report "no elements" as an empty snapshot, never as an
/// error.
pub trait SnapshotSource: Send + Sync {
    /// Fetch the destination snapshot of `unit`.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the snapshot cannot be produced.
    fn fetch_snapshot(&self, unit: &UnitId) -> Result<DestinationSnapshot, CollaboratorError>;
}

/// Receives routed documents for upload or storage.
pub trait ChangeSink: Send + Sync {
    /// Accept one routed document.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the document cannot be delivered.
    fn deliver(&self, routed: &RoutedDocument) -> Result<(), CollaboratorError>;
}

/// Errors returned by [`ReconciliationDriver`].
#[derive(Debug, Error)]
pub enum DriverError {
    /// The registry extract could not be fetched.
    #[error("registry extract for unit {unit}: {source}")]
    Registry {
        /// Unit being reconciled.
        unit: UnitId,
        /// Collaborator failure.
        #[source]
        source: CollaboratorError,
    },
    /// The destination snapshot could not be fetched.
    #[error("destination snapshot for unit {unit}: {source}")]
    Snapshot {
        /// Unit being reconciled.
        unit: UnitId,
        /// Collaborator failure.
        #[source]
        source: CollaboratorError,
    },
    /// A document could not be delivered.
    #[error("delivering document {label}: {source}")]
    Sink {
        /// Document label.
        label: String,
        /// Collaborator failure.
        #[source]
        source: CollaboratorError,
    },
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How batches are grouped into documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Partition {
    /// One document per unit.
    #[default]
    PerUnit,
    /// One document per group of units.
    PerGroup,
}

/// Units reconciled together, such as the municipalities of a county.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitGroup {
    /// Label used for grouped documents.
    pub label: String,
    /// Units in processing order.
    pub units: Vec<UnitId>,
}

impl UnitGroup {
    /// Group holding a single unit, labelled with its id.
    #[must_use]
    pub fn single(unit: UnitId) -> Self {
        Self {
            label: unit.to_string(),
            units: vec![unit],
        }
    }
}

/// Settings for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverConfig {
    /// Matching and emission thresholds.
    pub engine: EngineConfig,
    /// Registry clean-up rules.
    pub normalizer: NormalizerConfig,
    /// Document grouping.
    pub partition: Partition,
    /// Skip snapshot retrieval and reconcile against an empty snapshot.
    pub source_only: bool,
}

/// Outcome of reconciling one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitReport {
    /// Unit reconciled.
    pub unit: UnitId,
    /// Registry records that passed normalisation.
    pub validated: usize,
    /// Registry records skipped as invalid.
    pub invalid: usize,
    /// Street names changed by correction.
    pub corrected: usize,
    /// Records sharing their key with a later record.
    pub duplicate_keys: usize,
    /// Records matched through the key index.
    pub direct: usize,
    /// Records matched by proximity.
    pub proximity: usize,
    /// Key hits rejected for distance.
    pub rejected_far: usize,
    /// Batch counters.
    pub counters: BatchCounters,
    /// Non-address elements keeping their address tags on request.
    pub remaining: usize,
}

/// Outcome of [`ReconciliationDriver::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Per-unit reports in input order.
    pub reports: Vec<UnitReport>,
    /// Labels of documents delivered for upload.
    pub uploaded: Vec<String>,
    /// Labels of documents routed to manual upload.
    pub manual_upload: Vec<String>,
}

/// Runs reconciliation end to end through collaborators.
#[derive(Debug)]
pub struct ReconciliationDriver<R, S, K, C> {
    registry: R,
    snapshots: S,
    sink: K,
    corrector: C,
    config: DriverConfig,
    emitter: ChangeEmitter,
}

impl<R, S, K, C> ReconciliationDriver<R, S, K, C>
where
    R: RegistrySource,
    S: SnapshotSource,
    K: ChangeSink,
    C: SpellingCorrector,
{
    /// Assemble a driver.
    ///
    /// # Errors
    /// Returns [`DriverError::Config`] when the engine configuration does not
    /// validate.
    pub fn new(
        registry: R,
        snapshots: S,
        sink: K,
        corrector: C,
        config: DriverConfig,
    ) -> Result<Self, DriverError> {
        config.engine.validate()?;
        let emitter = ChangeEmitter::new(&config.engine);
        Ok(Self {
            registry,
            snapshots,
            sink,
            corrector,
            config,
            emitter,
        })
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Fetch, normalise and match one unit.
    ///
    /// # Errors
    /// Returns [`DriverError`] when a collaborator fails.
    pub fn reconcile_unit(
        &self,
        unit: &UnitId,
    ) -> Result<(ChangeBatch, UnitReport), DriverError> {
        let raw = self
            .registry
            .fetch_registry(unit)
            .map_err(|source| DriverError::Registry {
                unit: unit.clone(),
                source,
            })?;
        let snapshot = if self.config.source_only {
            DestinationSnapshot::empty()
        } else {
            self.snapshots
                .fetch_snapshot(unit)
                .map_err(|source| DriverError::Snapshot {
                    unit: unit.clone(),
                    source,
                })?
        };

        let normalized =
            SourceNormalizer::new(self.config.normalizer, &self.corrector).normalize_all(&raw);
        let index = TargetIndex::build(&snapshot);
        let outcome =
            MatchEngine::new(&index, &self.config.engine).run(unit.clone(), &normalized.records);

        let report = UnitReport {
            unit: unit.clone(),
            validated: normalized.records.len(),
            invalid: normalized.issues.len(),
            corrected: normalized.corrected,
            duplicate_keys: outcome.stats.duplicate_keys,
            direct: outcome.stats.direct,
            proximity: outcome.stats.proximity,
            rejected_far: outcome.stats.rejected_far,
            counters: outcome.batch.counters(),
            remaining: outcome.stats.opted_out,
        };
        info!(
            "unit {unit}: {} record(s), {} element(s), {} change(s)",
            report.validated,
            index.len(),
            report.counters.total
        );
        Ok((outcome.batch, report))
    }

    /// Reconcile several units on the rayon pool, preserving input order.
    ///
    /// # Errors
    /// Returns the first [`DriverError`] in input order.
    pub fn reconcile_units(
        &self,
        units: &[UnitId],
    ) -> Result<Vec<(ChangeBatch, UnitReport)>, DriverError> {
        let results: Vec<Result<(ChangeBatch, UnitReport), DriverError>> = units
            .par_iter()
            .map(|unit| self.reconcile_unit(unit))
            .collect();
        results.into_iter().collect()
    }

    /// Reconcile every group, emit documents and deliver them.
    ///
    /// Documents without changes are not delivered.
    ///
    /// # Errors
    /// Returns [`DriverError`] when a collaborator fails.
    pub fn run(&self, groups: &[UnitGroup]) -> Result<RunSummary, DriverError> {
        let mut summary = RunSummary::default();
        for group in groups {
            let results = self.reconcile_units(&group.units)?;
            let (batches, reports): (Vec<ChangeBatch>, Vec<UnitReport>) =
                results.into_iter().unzip();
            summary.reports.extend(reports);

            let documents: Vec<RoutedDocument> = match self.config.partition {
                Partition::PerUnit => batches
                    .iter()
                    .map(|batch| {
                        self.emitter
                            .emit(batch.unit().as_str(), std::slice::from_ref(batch))
                    })
                    .collect(),
                Partition::PerGroup => vec![self.emitter.emit(group.label.clone(), &batches)],
            };
            for routed in documents {
                self.deliver(&routed, &mut summary)?;
            }
        }
        Ok(summary)
    }

    fn deliver(
        &self,
        routed: &RoutedDocument,
        summary: &mut RunSummary,
    ) -> Result<(), DriverError> {
        let label = &routed.document.label;
        match routed.routing {
            Routing::NoChanges => {
                info!("{label}: no changes");
                return Ok(());
            }
            Routing::Upload => summary.uploaded.push(label.clone()),
            Routing::ManualUpload => summary.manual_upload.push(label.clone()),
        }
        self.sink
            .deliver(routed)
            .map_err(|source| DriverError::Sink {
                label: label.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        NoCorrection,
        test_support::{
            MemoryRegistry, MemorySnapshots, RecordingSink, address_tags, node, raw_address,
        },
    };
    use rstest::{fixture, rstest};

    #[fixture]
    fn registry() -> MemoryRegistry {
        MemoryRegistry::default()
            .with_unit("0301", vec![raw_address("Storgata", "4A", 10.742, 59.911)])
            .with_unit("0302", vec![raw_address("Lilleveien", "1", 10.5, 59.8)])
    }

    fn driver(
        registry: MemoryRegistry,
        snapshots: MemorySnapshots,
        config: DriverConfig,
    ) -> ReconciliationDriver<MemoryRegistry, MemorySnapshots, RecordingSink, NoCorrection> {
        ReconciliationDriver::new(
            registry,
            snapshots,
            RecordingSink::default(),
            NoCorrection,
            config,
        )
        .expect("valid config")
    }

    #[rstest]
    fn rejects_invalid_config(registry: MemoryRegistry) {
        let config = DriverConfig {
            engine: EngineConfig {
                change_budget: 0,
                ..EngineConfig::default()
            },
            ..DriverConfig::default()
        };
        let result = ReconciliationDriver::new(
            registry,
            MemorySnapshots::default(),
            RecordingSink::default(),
            NoCorrection,
            config,
        );
        assert!(matches!(result, Err(DriverError::Config(ConfigError::ZeroBudget))));
    }

    #[rstest]
    fn unknown_unit_surfaces_as_registry_error(registry: MemoryRegistry) {
        let driver = driver(registry, MemorySnapshots::default(), DriverConfig::default());
        let err = driver
            .reconcile_unit(&UnitId::from("9999"))
            .expect_err("unknown unit");
        assert!(matches!(err, DriverError::Registry { .. }));
    }

    #[rstest]
    fn missing_snapshot_is_a_creation_pass(registry: MemoryRegistry) {
        let driver = driver(registry, MemorySnapshots::default(), DriverConfig::default());
        let (batch, report) = driver
            .reconcile_unit(&UnitId::from("0301"))
            .expect("reconciled");
        assert_eq!(batch.counters().added, 1);
        assert_eq!(report.validated, 1);
    }

    #[rstest]
    fn source_only_ignores_snapshot(registry: MemoryRegistry) {
        let snapshots = MemorySnapshots::default().with_unit(
            "0301",
            DestinationSnapshot::new(vec![node(1, 10.742, 59.911, address_tags("Storgata", "4A"))]),
        );
        let config = DriverConfig {
            source_only: true,
            ..DriverConfig::default()
        };
        let driver = driver(registry, snapshots, config);
        let (batch, _) = driver
            .reconcile_unit(&UnitId::from("0301"))
            .expect("reconciled");
        assert_eq!(batch.counters().added, 1);
        assert_eq!(batch.counters().deleted, 0);
    }

    #[rstest]
    fn parallel_results_keep_input_order(registry: MemoryRegistry) {
        let driver = driver(registry, MemorySnapshots::default(), DriverConfig::default());
        let units = [UnitId::from("0302"), UnitId::from("0301")];
        let results = driver.reconcile_units(&units).expect("reconciled");
        let order: Vec<&str> = results.iter().map(|(_, r)| r.unit.as_str()).collect();
        assert_eq!(order, vec!["0302", "0301"]);
    }

    #[rstest]
    fn parallel_failure_reports_first_unit_in_order(registry: MemoryRegistry) {
        let driver = driver(registry, MemorySnapshots::default(), DriverConfig::default());
        let units = [
            UnitId::from("0301"),
            UnitId::from("9998"),
            UnitId::from("0302"),
            UnitId::from("9999"),
        ];
        let err = driver.reconcile_units(&units).expect_err("unknown units");
        match err {
            DriverError::Registry { unit, .. } => assert_eq!(unit.as_str(), "9998"),
            other => panic!("expected registry error, found {other}"),
        }
    }

    #[rstest]
    #[case(Partition::PerUnit, &["0301", "0302"])]
    #[case(Partition::PerGroup, &["03"])]
    fn partition_controls_documents(
        registry: MemoryRegistry,
        #[case] partition: Partition,
        #[case] expected: &[&str],
    ) {
        let config = DriverConfig {
            partition,
            ..DriverConfig::default()
        };
        let driver = driver(registry, MemorySnapshots::default(), config);
        let group = UnitGroup {
            label: "03".into(),
            units: vec![UnitId::from("0301"), UnitId::from("0302")],
        };
        let summary = driver.run(&[group]).expect("run");
        assert_eq!(summary.uploaded, expected);
        assert_eq!(driver.sink.labels(), expected);
        assert!(summary.manual_upload.is_empty());
    }

    #[rstest]
    fn overflowing_group_goes_to_manual_upload(registry: MemoryRegistry) {
        let config = DriverConfig {
            engine: EngineConfig {
                change_budget: 1,
                ..EngineConfig::default()
            },
            partition: Partition::PerGroup,
            ..DriverConfig::default()
        };
        let driver = driver(registry, MemorySnapshots::default(), config);
        let group = UnitGroup {
            label: "03".into(),
            units: vec![UnitId::from("0301"), UnitId::from("0302")],
        };
        let summary = driver.run(&[group]).expect("run");
        assert_eq!(summary.manual_upload, vec!["03".to_owned()]);
        assert!(summary.uploaded.is_empty());
    }

    #[rstest]
    fn unchanged_documents_are_not_delivered() {
        let registry = MemoryRegistry::default()
            .with_unit("0301", vec![raw_address("Storgata", "4A", 10.742, 59.911)]);
        let snapshots = MemorySnapshots::default().with_unit(
            "0301",
            DestinationSnapshot::new(vec![node(1, 10.742, 59.911, address_tags("Storgata", "4A"))]),
        );
        let driver = driver(registry, snapshots, DriverConfig::default());
        let summary = driver
            .run(&[UnitGroup::single(UnitId::from("0301"))])
            .expect("run");
        assert!(summary.uploaded.is_empty());
        assert!(driver.sink.labels().is_empty());
        assert_eq!(summary.reports.len(), 1);
    }
}
