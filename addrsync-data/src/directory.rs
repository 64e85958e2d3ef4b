//! Units served from a plain directory.
//!
//! Each unit owns up to four files named after its id:
//!
//! | File                      | Content                               | Required |
//! |---------------------------|---------------------------------------|----------|
//! | `<unit>.registry.json`    | registry extract (JSON array)         | yes      |
//! | `<unit>.snapshot.json`    | address elements (Overpass JSON)      | no       |
//! | `<unit>.parents.json`     | ownership superset (Overpass JSON)    | no       |
//! | `<unit>.children.json`    | one-level children (Overpass JSON)    | no       |
//!
//! A unit without a snapshot file reconciles against an empty snapshot.

use std::io;

use addrsync_core::{
    CollaboratorError, DestinationSnapshot, RawAddress, RegistrySource, SnapshotSource,
    TargetElement, UnitId,
};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use thiserror::Error;

use crate::{
    RegistryDecodeError, SnapshotDecodeError, decode_overpass_snapshot, decode_registry_extract,
};

/// The files a unit may have in a [`DirectorySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFile {
    /// Registry extract.
    Registry,
    /// Address elements of the destination dataset.
    Snapshot,
    /// Elements scanned for ownership references.
    Parents,
    /// One-level children used as output context.
    Children,
}

impl UnitFile {
    /// File name suffix following the unit id.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Registry => "registry.json",
            Self::Snapshot => "snapshot.json",
            Self::Parents => "parents.json",
            Self::Children => "children.json",
        }
    }
}

/// Errors raised while reading unit files.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The unit has no registry extract.
    #[error("no registry extract at {path:?}")]
    MissingRegistry {
        /// Expected location.
        path: Utf8PathBuf,
    },
    /// A file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Read {
        /// File being read.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// A registry extract could not be decoded.
    #[error("failed to decode registry extract {path:?}: {source}")]
    Registry {
        /// File being decoded.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: RegistryDecodeError,
    },
    /// A snapshot file could not be decoded.
    #[error("failed to decode snapshot {path:?}: {source}")]
    Snapshot {
        /// File being decoded.
        path: Utf8PathBuf,
        /// Decoder failure.
        #[source]
        source: SnapshotDecodeError,
    },
}

/// Registry and snapshot source reading unit files from one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySource {
    root: Utf8PathBuf,
}

impl DirectorySource {
    /// Serve units from `root`.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory being served.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Location of one of the files of `unit`.
    #[must_use]
    pub fn path(&self, unit: &UnitId, file: UnitFile) -> Utf8PathBuf {
        self.root.join(format!("{unit}.{}", file.suffix()))
    }

    /// Read and decode the registry extract of `unit`.
    ///
    /// # Errors
    /// Returns [`DirectoryError::MissingRegistry`] when the file is absent and
    /// other variants when it cannot be read or decoded.
    pub fn read_registry(&self, unit: &UnitId) -> Result<Vec<RawAddress>, DirectoryError> {
        let path = self.path(unit, UnitFile::Registry);
        let contents = read(&path)?.ok_or_else(|| DirectoryError::MissingRegistry {
            path: path.clone(),
        })?;
        let records = decode_registry_extract(contents.as_bytes())
            .map_err(|source| DirectoryError::Registry { path, source })?;
        debug!("unit {unit}: {} registry row(s)", records.len());
        Ok(records)
    }

    /// Read and decode the snapshot files of `unit`.
    ///
    /// # Errors
    /// Returns [`DirectoryError`] when a present file cannot be read or
    /// decoded.
    pub fn read_snapshot(&self, unit: &UnitId) -> Result<DestinationSnapshot, DirectoryError> {
        let Some(elements) = self.read_elements(unit, UnitFile::Snapshot)? else {
            info!("unit {unit}: no snapshot file, reconciling against an empty snapshot");
            return Ok(DestinationSnapshot::empty());
        };
        let parents = self
            .read_elements(unit, UnitFile::Parents)?
            .unwrap_or_default();
        let children = self
            .read_elements(unit, UnitFile::Children)?
            .unwrap_or_default();
        debug!(
            "unit {unit}: {} element(s), {} parent(s), {} child(ren)",
            elements.len(),
            parents.len(),
            children.len()
        );
        Ok(DestinationSnapshot::new(elements)
            .with_parents(parents)
            .with_children(children))
    }

    fn read_elements(
        &self,
        unit: &UnitId,
        file: UnitFile,
    ) -> Result<Option<Vec<TargetElement>>, DirectoryError> {
        let path = self.path(unit, file);
        let Some(contents) = read(&path)? else {
            return Ok(None);
        };
        decode_overpass_snapshot(contents.as_bytes())
            .map(Some)
            .map_err(|source| DirectoryError::Snapshot { path, source })
    }
}

fn read(path: &Utf8Path) -> Result<Option<String>, DirectoryError> {
    addrsync_fs::read_optional(path).map_err(|source| DirectoryError::Read {
        path: path.to_path_buf(),
        source,
    })
}

impl RegistrySource for DirectorySource {
    fn fetch_registry(&self, unit: &UnitId) -> Result<Vec<RawAddress>, CollaboratorError> {
        match self.read_registry(unit) {
            Ok(records) => Ok(records),
            Err(DirectoryError::MissingRegistry { .. }) => {
                Err(CollaboratorError::UnknownUnit { unit: unit.clone() })
            }
            Err(err) => Err(CollaboratorError::failed("reading registry extract", err)),
        }
    }
}

impl SnapshotSource for DirectorySource {
    fn fetch_snapshot(&self, unit: &UnitId) -> Result<DestinationSnapshot, CollaboratorError> {
        self.read_snapshot(unit)
            .map_err(|err| CollaboratorError::failed("reading snapshot", err))
    }
}
