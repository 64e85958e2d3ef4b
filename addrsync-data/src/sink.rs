//! Change documents written as JSON files.

use std::io;

use addrsync_core::{ChangeSink, CollaboratorError, RoutedDocument, Routing};
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use thiserror::Error;

/// Errors raised while writing a change document.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The label cannot be used as a file name.
    #[error("document label {label:?} is not a valid file name")]
    InvalidLabel {
        /// Offending label.
        label: String,
    },
    /// The document could not be serialised.
    #[error("failed to serialise document {label}: {source}")]
    Serialise {
        /// Document label.
        label: String,
        /// Serialiser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The document could not be written.
    #[error("failed to write {path:?}: {source}")]
    Write {
        /// Destination file.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
}

/// Writes routed documents to `<label>.upload.json` or `<label>.manual.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonChangeSink {
    output_dir: Utf8PathBuf,
}

impl JsonChangeSink {
    /// Write documents into `output_dir`, creating it on first use.
    #[must_use]
    pub fn new(output_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory receiving documents.
    #[must_use]
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// File a document would be written to; `None` for documents without
    /// changes.
    ///
    /// # Errors
    /// Returns [`SinkError::InvalidLabel`] for empty labels, labels starting
    /// with a dot or containing a path separator.
    pub fn path_for(&self, routed: &RoutedDocument) -> Result<Option<Utf8PathBuf>, SinkError> {
        let label = &routed.document.label;
        if label.is_empty() || label.starts_with('.') || label.contains(['/', '\\']) {
            return Err(SinkError::InvalidLabel {
                label: label.clone(),
            });
        }
        let suffix = match routed.routing {
            Routing::NoChanges => return Ok(None),
            Routing::Upload => "upload.json",
            Routing::ManualUpload => "manual.json",
        };
        Ok(Some(self.output_dir.join(format!("{label}.{suffix}"))))
    }

    /// Serialise and write one document.
    ///
    /// # Errors
    /// Returns [`SinkError`] when the document cannot be written.
    pub fn write(&self, routed: &RoutedDocument) -> Result<Option<Utf8PathBuf>, SinkError> {
        let Some(path) = self.path_for(routed)? else {
            return Ok(None);
        };
        let payload = serde_json::to_vec_pretty(&routed.document).map_err(|source| {
            SinkError::Serialise {
                label: routed.document.label.clone(),
                source,
            }
        })?;
        addrsync_fs::write_replacing(&path, &payload).map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;
        info!(
            "wrote {} change(s) for {} to {path}",
            routed.document.change_count, routed.document.label
        );
        Ok(Some(path))
    }
}

impl ChangeSink for JsonChangeSink {
    fn deliver(&self, routed: &RoutedDocument) -> Result<(), CollaboratorError> {
        self.write(routed)
            .map(|_| ())
            .map_err(|err| CollaboratorError::failed("writing change document", err))
    }
}
