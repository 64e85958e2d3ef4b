//! Reconcile command implementation.

use std::io::Write;

use addrsync_core::{
    CorrectionTable, DriverConfig, EngineConfig, NormalizerConfig, Partition,
    ReconciliationDriver, RunSummary, UnitGroup, UnitId, UnitReport,
};
use addrsync_data::{DirectorySource, JsonChangeSink, load_corrections_file};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgAction, Parser};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BUDGET, ARG_CORRECTIONS, ARG_EXACT_THRESHOLD, ARG_FIX_INITIALS, ARG_GROUP, ARG_INPUT_DIR,
    ARG_MANUAL, ARG_MAX_RELOCATION, ARG_OUTPUT_DIR, ARG_SANITY_BOUND, ARG_SOURCE_ONLY, ARG_UNITS,
    CliError, ENV_INPUT_DIR, ENV_OUTPUT_DIR, ENV_UNITS,
};

/// CLI arguments for the `reconcile` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Reconcile one or more units. Each unit reads \
                 <unit>.registry.json and, when present, <unit>.snapshot.json, \
                 <unit>.parents.json and <unit>.children.json from the input \
                 directory, and writes <label>.upload.json or \
                 <label>.manual.json to the output directory.",
    about = "Reconcile units against the destination dataset"
)]
#[ortho_config(prefix = "ADDRSYNC")]
pub(crate) struct ReconcileArgs {
    /// Unit ids to reconcile, in processing order.
    #[arg(value_name = ARG_UNITS)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub(crate) units: Vec<String>,
    /// Directory holding the unit input files.
    #[arg(long = ARG_INPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) input_dir: Option<Utf8PathBuf>,
    /// Directory receiving change documents.
    #[arg(long = ARG_OUTPUT_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) output_dir: Option<Utf8PathBuf>,
    /// JSON object mapping street names to corrected spellings.
    #[arg(long = ARG_CORRECTIONS, value_name = "path")]
    #[serde(default)]
    pub(crate) corrections: Option<Utf8PathBuf>,
    /// Write one document for all units under this label.
    #[arg(long = ARG_GROUP, value_name = "label")]
    #[serde(default)]
    pub(crate) group: Option<String>,
    /// Skip snapshots and create every registry address.
    #[arg(long = ARG_SOURCE_ONLY, action = ArgAction::SetTrue)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) source_only: bool,
    /// Repair spacing and dots in street-name initials.
    #[arg(long = ARG_FIX_INITIALS, action = ArgAction::SetTrue)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) fix_initials: bool,
    /// Mark deletions with DELETE=yes for review and write every document
    /// for manual upload.
    #[arg(long = ARG_MANUAL, action = ArgAction::SetTrue)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) manual: bool,
    /// Maximum changes per document before manual upload.
    #[arg(long = ARG_BUDGET, value_name = "count")]
    #[serde(default)]
    pub(crate) budget: Option<usize>,
    /// Proximity search radius in metres.
    #[arg(long = ARG_MAX_RELOCATION, value_name = "metres")]
    #[serde(default)]
    pub(crate) max_relocation: Option<f64>,
    /// Distance at or below which a node keeps its position, in metres.
    #[arg(long = ARG_EXACT_THRESHOLD, value_name = "metres")]
    #[serde(default)]
    pub(crate) exact_threshold: Option<f64>,
    /// Distance beyond which a key match is rejected, in metres.
    #[arg(long = ARG_SANITY_BOUND, value_name = "metres")]
    #[serde(default)]
    pub(crate) sanity_bound: Option<f64>,
}

impl ReconcileArgs {
    pub(crate) fn into_config(self) -> Result<ReconcileConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ReconcileConfig::try_from(merged)
    }
}

/// Resolved `reconcile` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReconcileConfig {
    pub(crate) units: Vec<UnitId>,
    pub(crate) input_dir: Utf8PathBuf,
    pub(crate) output_dir: Utf8PathBuf,
    pub(crate) corrections: Option<Utf8PathBuf>,
    pub(crate) group: Option<String>,
    pub(crate) driver: DriverConfig,
}

impl ReconcileConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require(&self.input_dir, ARG_INPUT_DIR, Expected::Directory)?;
        if let Some(path) = &self.corrections {
            require(path, ARG_CORRECTIONS, Expected::File)?;
        }
        Ok(())
    }

    pub(crate) fn groups(&self) -> Vec<UnitGroup> {
        match &self.group {
            Some(label) => vec![UnitGroup {
                label: label.clone(),
                units: self.units.clone(),
            }],
            None => self.units.iter().cloned().map(UnitGroup::single).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Expected {
    File,
    Directory,
}

fn require(path: &Utf8Path, field: &'static str, expected: Expected) -> Result<(), CliError> {
    let inspected = match expected {
        Expected::File => addrsync_fs::file_is_file(path),
        Expected::Directory => addrsync_fs::path_is_dir(path),
    };
    match inspected {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::WrongSourceType {
            field,
            path: path.to_path_buf(),
            expected: match expected {
                Expected::File => "file",
                Expected::Directory => "directory",
            },
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSource {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl TryFrom<ReconcileArgs> for ReconcileConfig {
    type Error = CliError;

    fn try_from(args: ReconcileArgs) -> Result<Self, Self::Error> {
        if args.units.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_UNITS,
                env: ENV_UNITS,
            });
        }
        let input_dir = args.input_dir.ok_or(CliError::MissingArgument {
            field: ARG_INPUT_DIR,
            env: ENV_INPUT_DIR,
        })?;
        let output_dir = args.output_dir.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT_DIR,
            env: ENV_OUTPUT_DIR,
        })?;

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            exact_threshold_m: args.exact_threshold.unwrap_or(defaults.exact_threshold_m),
            sanity_bound_m: args.sanity_bound.unwrap_or(defaults.sanity_bound_m),
            max_relocation_m: args.max_relocation.unwrap_or(defaults.max_relocation_m),
            change_budget: args.budget.unwrap_or(defaults.change_budget),
            manual_review: args.manual,
            ..defaults
        };
        engine.validate()?;

        let partition = if args.group.is_some() {
            Partition::PerGroup
        } else {
            Partition::PerUnit
        };
        Ok(Self {
            units: args.units.iter().map(|unit| UnitId::from(unit.as_str())).collect(),
            input_dir,
            output_dir,
            corrections: args.corrections,
            group: args.group,
            driver: DriverConfig {
                engine,
                normalizer: NormalizerConfig {
                    fix_initials: args.fix_initials,
                    ..NormalizerConfig::default()
                },
                partition,
                source_only: args.source_only,
            },
        })
    }
}

pub(crate) fn run_reconcile(args: ReconcileArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_reconcile_with(args, &mut stdout).map(|_| ())
}

pub(crate) fn run_reconcile_with(
    args: ReconcileArgs,
    writer: &mut dyn Write,
) -> Result<RunSummary, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let summary = execute(&config)?;
    write_summary(writer, &summary)?;
    Ok(summary)
}

pub(crate) fn execute(config: &ReconcileConfig) -> Result<RunSummary, CliError> {
    let corrections = match &config.corrections {
        Some(path) => load_corrections_file(path)?,
        None => CorrectionTable::default(),
    };
    info!(
        "reconciling {} unit(s) from {} with {} correction(s)",
        config.units.len(),
        config.input_dir,
        corrections.len()
    );
    let source = DirectorySource::new(config.input_dir.clone());
    let driver = ReconciliationDriver::new(
        source.clone(),
        source,
        JsonChangeSink::new(config.output_dir.clone()),
        corrections,
        config.driver.clone(),
    )?;
    Ok(driver.run(&config.groups())?)
}

fn report_line(report: &UnitReport) -> String {
    let counters = report.counters;
    format!(
        "{}: {} valid, {} invalid, {} corrected, {} duplicate; \
         {} direct, {} nearby; +{} ~{} -{}, {} stripped, {} remaining",
        report.unit,
        report.validated,
        report.invalid,
        report.corrected,
        report.duplicate_keys,
        report.direct,
        report.proximity,
        counters.added,
        counters.modified,
        counters.deleted,
        counters.removed_tags,
        report.remaining,
    )
}

pub(crate) fn write_summary(writer: &mut dyn Write, summary: &RunSummary) -> Result<(), CliError> {
    for report in &summary.reports {
        writeln!(writer, "{}", report_line(report)).map_err(CliError::WriteOutput)?;
    }
    if !summary.manual_upload.is_empty() {
        writeln!(writer, "manual upload: {}", summary.manual_upload.join(", "))
            .map_err(CliError::WriteOutput)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ReconcileConfig, CliError> {
    let merged = ReconcileArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ReconcileConfig::try_from(merged)
}
