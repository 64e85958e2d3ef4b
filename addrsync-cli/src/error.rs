//! Error types emitted by the addrsync CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use addrsync_core::{ConfigError, DriverError};
use addrsync_data::CorrectionsError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors emitted by the addrsync CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Flag name.
        field: &'static str,
        /// Environment variable accepted instead.
        env: &'static str,
    },
    /// Thresholds or budget do not form a usable configuration.
    #[error("invalid engine configuration: {0}")]
    InvalidEngineConfig(#[from] ConfigError),
    /// A referenced input path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSource {
        /// Flag naming the path.
        field: &'static str,
        /// Path given.
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but has the wrong type.
    #[error("{field} path {path:?} is not a {expected}")]
    WrongSourceType {
        /// Flag naming the path.
        field: &'static str,
        /// Path given.
        path: Utf8PathBuf,
        /// `file` or `directory`.
        expected: &'static str,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        /// Flag naming the path.
        field: &'static str,
        /// Path given.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The correction dictionary could not be loaded.
    #[error(transparent)]
    Corrections(#[from] CorrectionsError),
    /// Reconciliation failed.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// Writing the run summary failed.
    #[error("failed to write summary: {0}")]
    WriteOutput(#[source] std::io::Error),
}
