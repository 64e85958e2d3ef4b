//! Registry record normalisation and street-name correction.
//!
//! [`SourceNormalizer`] turns raw registry rows into [`SourceRecord`]s. Every
//! textual field is cleaned once here so that the matcher can compare
//! strings directly. Records lacking a name, postcode, city or a usable
//! coordinate are reported as [`RecordIssue`]s and skipped.

use std::collections::HashMap;

use geo::Coord;
use log::warn;
use thiserror::Error;

use crate::{
    AddressKind, NormalizerConfig, RawAddress, SourceRecord,
    record::{fold_postcode, normalize_text},
};

/// Maps a raw street name to its canonical spelling.
///
/// Implementations must be pure lookups and return the input unchanged when
/// no correction applies.
pub trait SpellingCorrector: Send + Sync {
    /// Return the corrected spelling of `name`.
    fn correct(&self, name: &str) -> String;
}

/// Corrector that never changes a name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl SpellingCorrector for NoCorrection {
    fn correct(&self, name: &str) -> String {
        name.to_owned()
    }
}

/// Exact-name correction dictionary.
///
/// # Examples
/// ```
/// use addrsync_core::{CorrectionTable, SpellingCorrector};
///
/// let table = CorrectionTable::from_iter([("Kongsvn.", "Kongsveien")]);
/// assert_eq!(table.correct("Kongsvn."), "Kongsveien");
/// assert_eq!(table.correct("Storgata"), "Storgata");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionTable {
    entries: HashMap<String, String>,
}

impl CorrectionTable {
    /// Number of corrections known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no corrections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CorrectionTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        }
    }
}

impl SpellingCorrector for CorrectionTable {
    fn correct(&self, name: &str) -> String {
        self.entries
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }
}

/// Repairs dots and spacing around initials in street names.
///
/// | Input                | Output                |
/// |----------------------|-----------------------|
/// | `Dr.Gregertsens vei` | `Dr. Gregertsens vei` |
/// | `O G Hauges veg`     | `O.G. Hauges veg`     |
/// | `C. A. Pihls gate`   | `C.A. Pihls gate`     |
/// | `K Sundts vei`       | `K. Sundts vei`       |
///
/// The last three characters are copied verbatim so lookahead never runs
/// past the end of the name.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitialsCorrector;

impl SpellingCorrector for InitialsCorrector {
    fn correct(&self, name: &str) -> String {
        let chars: Vec<char> = name.chars().collect();
        let at = |i: usize| chars.get(i).copied().unwrap_or(' ');
        let is_gap = |c: char| c == ' ' || c == '.';
        let mut out = String::with_capacity(name.len() + 4);
        let mut word = 0_usize;
        let mut i = 0_usize;
        while i + 3 < chars.len() {
            match at(i) {
                '.' => {
                    if at(i + 1) == ' ' && is_gap(at(i + 3)) {
                        out.push('.');
                        out.push(at(i + 2));
                        i += 2;
                        word = 1;
                    } else if at(i + 1) != ' ' && !is_gap(at(i + 2)) {
                        out.push_str(". ");
                        word = 0;
                    } else {
                        out.push('.');
                        word = 0;
                    }
                }
                ' ' => {
                    if word == 1 {
                        out.push_str(if is_gap(at(i + 2)) { "." } else { ". " });
                    } else {
                        out.push(' ');
                    }
                    word = 0;
                }
                other => {
                    out.push(other);
                    word += 1;
                }
            }
            i += 1;
        }
        out.extend(chars.iter().skip(i));
        out
    }
}

/// Why a registry record was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRecord {
    /// Neither a street nor a place name was supplied.
    #[error("record has no street or place name")]
    MissingName,
    /// Postcode absent, blank or zero.
    #[error("record has no postcode")]
    MissingPostcode,
    /// Postal town absent or blank.
    #[error("record has no city")]
    MissingCity,
    /// Coordinate not finite or out of range.
    #[error("record has an invalid coordinate ({lon}, {lat})")]
    InvalidCoordinate {
        /// Longitude supplied.
        lon: f64,
        /// Latitude supplied.
        lat: f64,
    },
}

/// A skipped record and its position in the extract.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("registry record {index}: {reason}")]
pub struct RecordIssue {
    /// Zero-based position in the extract.
    pub index: usize,
    /// Reason the record was skipped.
    #[source]
    pub reason: InvalidRecord,
}

/// Output of [`SourceNormalizer::normalize_all`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Valid records in extract order.
    pub records: Vec<SourceRecord>,
    /// Skipped records.
    pub issues: Vec<RecordIssue>,
    /// Street names changed by the corrector.
    pub corrected: usize,
}

/// Cleans raw registry rows into [`SourceRecord`]s.
pub struct SourceNormalizer<'a> {
    config: NormalizerConfig,
    corrector: &'a dyn SpellingCorrector,
}

impl std::fmt::Debug for SourceNormalizer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceNormalizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for SourceNormalizer<'_> {
    fn default() -> Self {
        Self::new(NormalizerConfig::default(), &NoCorrection)
    }
}

impl<'a> SourceNormalizer<'a> {
    /// Build a normaliser consulting `corrector` for street names.
    #[must_use]
    pub fn new(config: NormalizerConfig, corrector: &'a dyn SpellingCorrector) -> Self {
        Self { config, corrector }
    }

    /// Normalise one raw record.
    ///
    /// Returns the record and whether its name was corrected.
    ///
    /// # Errors
    /// Returns [`InvalidRecord`] when a required field is missing or the
    /// coordinate is unusable.
    pub fn normalize(&self, raw: &RawAddress) -> Result<(SourceRecord, bool), InvalidRecord> {
        let base = normalize_text(&raw.name).ok_or(InvalidRecord::MissingName)?;
        let postcode = raw
            .postcode
            .as_deref()
            .map(fold_postcode)
            .filter(|code| !code.is_empty() && code.chars().any(|c| c != '0'))
            .ok_or(InvalidRecord::MissingPostcode)?;
        let city = raw
            .city
            .as_deref()
            .and_then(normalize_text)
            .map(|city| {
                if self.config.title_case_city {
                    title_case_city(&city)
                } else {
                    city
                }
            })
            .ok_or(InvalidRecord::MissingCity)?;
        let point = checked_point(raw.lon, raw.lat)?;

        let (street, corrected) = self.correct_name(&base);
        let name = match raw.farm.as_deref().and_then(normalize_text) {
            Some(farm) if raw.kind == AddressKind::Place => format!("{street} {farm}"),
            _ => street,
        };

        let digits = raw.number.as_deref().and_then(normalize_text);
        let suffix = raw
            .letter
            .as_deref()
            .and_then(normalize_text)
            .map(|letter| letter.to_uppercase());
        let house_number = match (digits, suffix) {
            (Some(number), Some(letter)) => Some(format!("{number}{letter}")),
            (number, None) => number,
            (None, Some(_)) => None,
        };

        let record = SourceRecord {
            kind: raw.kind,
            name,
            house_number,
            postcode,
            city,
            district: raw.district.as_deref().and_then(normalize_text),
            housename: raw
                .housename
                .as_deref()
                .and_then(normalize_text)
                .filter(|_| self.config.include_housename),
            point,
        };
        Ok((record, corrected))
    }

    /// Normalise an extract, collecting skipped records instead of failing.
    #[must_use]
    pub fn normalize_all(&self, raws: &[RawAddress]) -> Normalized {
        let mut out = Normalized::default();
        for (index, raw) in raws.iter().enumerate() {
            match self.normalize(raw) {
                Ok((record, corrected)) => {
                    out.corrected += usize::from(corrected);
                    out.records.push(record);
                }
                Err(reason) => {
                    let issue = RecordIssue { index, reason };
                    warn!("skipping {issue}");
                    out.issues.push(issue);
                }
            }
        }
        out
    }

    fn correct_name(&self, name: &str) -> (String, bool) {
        let looked_up = self.corrector.correct(name);
        if looked_up != name {
            return (looked_up, true);
        }
        if self.config.fix_initials {
            let fixed = InitialsCorrector.correct(name);
            if fixed != name {
                return (fixed, true);
            }
        }
        (looked_up, false)
    }
}

fn checked_point(lon: f64, lat: f64) -> Result<Coord<f64>, InvalidRecord> {
    let valid = lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat);
    if !valid {
        return Err(InvalidRecord::InvalidCoordinate { lon, lat });
    }
    Ok(Coord {
        x: round6(lon),
        y: round6(lat),
    })
}

fn round6(value: f64) -> f64 {
    (value * 1.0e6).round() / 1.0e6
}

/// Capitalise each word, keeping the Norwegian preposition " i " lowercase.
fn title_case_city(city: &str) -> String {
    let mut out = String::with_capacity(city.len());
    let mut start_of_word = true;
    for c in city.chars() {
        if start_of_word {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        start_of_word = !c.is_alphanumeric();
    }
    out.replace(" I ", " i ")
}
