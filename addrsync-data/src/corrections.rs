//! Street-name correction dictionaries.

use std::{collections::BTreeMap, io::Read};

use addrsync_core::CorrectionTable;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use thiserror::Error;

/// Errors raised while loading a correction dictionary.
#[derive(Debug, Error)]
pub enum CorrectionsError {
    /// The dictionary file could not be opened.
    #[error("failed to open corrections at {path:?}: {source}")]
    Open {
        /// File requested.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The dictionary is not a JSON object of strings.
    #[error("malformed corrections dictionary: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a JSON object mapping raw street names to corrected spellings.
///
/// # Errors
/// Returns [`CorrectionsError::Json`] when the input is not an object whose
/// values are strings.
///
/// # Examples
/// ```
/// use addrsync_core::SpellingCorrector;
/// use addrsync_data::load_corrections;
///
/// let table = load_corrections(r#"{"Kongsvn.": "Kongsveien"}"#.as_bytes()).expect("valid");
/// assert_eq!(table.correct("Kongsvn."), "Kongsveien");
/// ```
pub fn load_corrections<R: Read>(reader: R) -> Result<CorrectionTable, CorrectionsError> {
    let entries: BTreeMap<String, String> = serde_json::from_reader(reader)?;
    debug!("loaded {} street-name correction(s)", entries.len());
    Ok(entries.into_iter().collect())
}

/// Load a correction dictionary from a file.
///
/// # Errors
/// Returns [`CorrectionsError`] when the file cannot be opened or decoded.
pub fn load_corrections_file(path: &Utf8Path) -> Result<CorrectionTable, CorrectionsError> {
    let file = addrsync_fs::open_utf8_file(path).map_err(|source| CorrectionsError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    load_corrections(std::io::BufReader::new(file))
}
