//! Tunable thresholds for reconciliation.
//!
//! Every distance and budget the engine consults lives here so that callers
//! can adapt them to the address density of a region. The defaults reflect
//! rural and suburban Scandinavian registries.

use thiserror::Error;

/// Default distance, in metres, at or below which a matched node stays put.
pub const DEFAULT_EXACT_THRESHOLD_M: f64 = 1.0;
/// Default distance, in metres, beyond which a direct match is rejected.
pub const DEFAULT_SANITY_BOUND_M: f64 = 200.0;
/// Default proximity search radius in metres.
pub const DEFAULT_MAX_RELOCATION_M: f64 = 25.0;
/// Default ceiling on changes in one uploaded change document.
pub const DEFAULT_CHANGE_BUDGET: usize = 9900;
/// Placeholder identifier given to the first created element of a document.
pub const DEFAULT_FIRST_PLACEHOLDER_ID: i64 = -1001;

/// Matching and emission settings applied to every unit.
///
/// # Examples
/// ```
/// use addrsync_core::EngineConfig;
///
/// let config = EngineConfig {
///     max_relocation_m: 10.0,
///     ..EngineConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Matches at or below this distance keep their geometry.
    pub exact_threshold_m: f64,
    /// Direct matches farther apart than this are treated as key collisions.
    pub sanity_bound_m: f64,
    /// Inclusive radius of the proximity search.
    pub max_relocation_m: f64,
    /// Largest number of changes uploaded as one document.
    pub change_budget: usize,
    /// Free-text tag inspected for the opt-out marker.
    pub opt_out_tag: String,
    /// Substring that keeps address tags on non-address elements.
    pub opt_out_marker: String,
    /// Identifier assigned to the first created element of each document.
    pub first_placeholder_id: i64,
    /// Render deletions as unchanged entries marked for review instead of
    /// real deletions, and send every changed document to manual upload.
    pub manual_review: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exact_threshold_m: DEFAULT_EXACT_THRESHOLD_M,
            sanity_bound_m: DEFAULT_SANITY_BOUND_M,
            max_relocation_m: DEFAULT_MAX_RELOCATION_M,
            change_budget: DEFAULT_CHANGE_BUDGET,
            opt_out_tag: String::from("note"),
            opt_out_marker: String::from("addr"),
            first_placeholder_id: DEFAULT_FIRST_PLACEHOLDER_ID,
            manual_review: false,
        }
    }
}

impl EngineConfig {
    /// Check that thresholds are usable together.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a threshold is negative or not finite,
    /// when the exact threshold exceeds the sanity bound, when the budget is
    /// zero or when placeholder identifiers would not be negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("exact_threshold_m", self.exact_threshold_m),
            ("sanity_bound_m", self.sanity_bound_m),
            ("max_relocation_m", self.max_relocation_m),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
            if value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if self.exact_threshold_m > self.sanity_bound_m {
            return Err(ConfigError::ExactAboveSanity {
                exact: self.exact_threshold_m,
                sanity: self.sanity_bound_m,
            });
        }
        if self.change_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.first_placeholder_id >= 0 {
            return Err(ConfigError::PlaceholderNotNegative {
                value: self.first_placeholder_id,
            });
        }
        Ok(())
    }
}

/// Errors returned by [`EngineConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A threshold was NaN or infinite.
    #[error("{name} must be finite (got {value})")]
    NonFinite {
        /// Name of the offending setting.
        name: &'static str,
        /// Value supplied.
        value: f64,
    },
    /// A threshold was below zero.
    #[error("{name} must not be negative (got {value})")]
    Negative {
        /// Name of the offending setting.
        name: &'static str,
        /// Value supplied.
        value: f64,
    },
    /// The in-place threshold was larger than the collision bound.
    #[error("exact threshold {exact} m exceeds the sanity bound {sanity} m")]
    ExactAboveSanity {
        /// Configured exact threshold.
        exact: f64,
        /// Configured sanity bound.
        sanity: f64,
    },
    /// No change could ever be uploaded.
    #[error("change budget must be at least 1")]
    ZeroBudget,
    /// Placeholder identifiers must stay clear of real element ids.
    #[error("first placeholder id must be negative (got {value})")]
    PlaceholderNotNegative {
        /// Value supplied.
        value: i64,
    },
}

/// Controls how raw registry fields are cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NormalizerConfig {
    /// Title-case city names supplied in capitals ("NEDRE EIKER" becomes
    /// "Nedre Eiker"), keeping the preposition " i " lowercase.
    pub title_case_city: bool,
    /// Emit `addr:housename` when the registry carries a popular name.
    pub include_housename: bool,
    /// Repair spacing and dots around initials in street names.
    pub fix_initials: bool,
}
