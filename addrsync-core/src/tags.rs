//! Tag vocabulary and purity rules.
//!
//! Provides helpers to:
//! - decide whether a node is a *clean* address node that may be moved,
//!   retagged or deleted;
//! - rewrite the address portion of a tag set while keeping annotations; and
//! - strip address tags from elements that carry them as a secondary
//!   attribute.

use std::collections::BTreeMap;

use crate::ElementKind;

/// Element tags keyed by tag name. Ordered so emitted documents are stable.
pub type Tags = BTreeMap<String, String>;

/// Street name of an address.
pub const STREET: &str = "addr:street";
/// Place or farm name used instead of a street.
pub const PLACE: &str = "addr:place";
/// House number including any letter suffix.
pub const HOUSENUMBER: &str = "addr:housenumber";
/// Municipal district.
pub const DISTRICT: &str = "addr:district";
/// Postal code.
pub const POSTCODE: &str = "addr:postcode";
/// Postal town.
pub const CITY: &str = "addr:city";
/// Popular name of a building.
pub const HOUSENAME: &str = "addr:housename";

/// Tag marking an element that review mode would otherwise delete.
pub const REVIEW_DELETE: &str = "DELETE";

const CORE_ADDRESS_KEYS: [&str; 6] = [STREET, PLACE, HOUSENUMBER, DISTRICT, POSTCODE, CITY];

/// Address sub-keys describing parts of a building rather than its address.
const RETAINED_ADDRESS_KEYS: [&str; 3] = ["addr:door", "addr:flats", "addr:floor"];

/// Returns true for the address fields the registry owns.
#[must_use]
pub fn is_core_address_key(key: &str) -> bool {
    CORE_ADDRESS_KEYS.contains(&key)
}

/// Returns true for keys that only annotate an element (fix-me notes, source
/// attributions and editor stamps).
#[must_use]
pub fn is_metadata_key(key: &str) -> bool {
    key.to_ascii_lowercase().contains("fixme") || key.contains("source") || key == "created_by"
}

fn is_retained_address_key(key: &str) -> bool {
    RETAINED_ADDRESS_KEYS.contains(&key)
}

fn is_address_domain_key(key: &str) -> bool {
    key.starts_with("addr:") || key.contains(":addr:")
}

/// Classify a node's tags as clean.
///
/// A clean node carries at least one core address key and nothing but
/// `addr:*` keys and metadata keys. Ways and relations are never clean.
///
/// # Examples
/// ```
/// use addrsync_core::{ElementKind, Tags, tags};
///
/// let mut node = Tags::new();
/// node.insert(tags::STREET.into(), "Storgata".into());
/// node.insert(tags::HOUSENUMBER.into(), "4A".into());
/// node.insert("source".into(), "survey".into());
/// assert!(tags::is_clean(ElementKind::Node, &node));
///
/// node.insert("shop".into(), "bakery".into());
/// assert!(!tags::is_clean(ElementKind::Node, &node));
/// ```
#[must_use]
pub fn is_clean(kind: ElementKind, tags: &Tags) -> bool {
    if kind != ElementKind::Node {
        return false;
    }
    let mut core = 0_usize;
    for key in tags.keys() {
        if is_core_address_key(key) {
            core += 1;
        } else if !key.starts_with("addr:") && !is_metadata_key(key) {
            return false;
        }
    }
    core > 0
}

/// Replace the `addr:*` tags of `existing` with `address`, keeping all other
/// tags. Building-part keys (`addr:door`, `addr:flats`, `addr:floor`) stay,
/// as they do when address tags are stripped.
#[must_use]
pub fn merge_address(existing: &Tags, address: &Tags) -> Tags {
    existing
        .iter()
        .filter(|(key, _)| !key.starts_with("addr:") || is_retained_address_key(key))
        .chain(address.iter())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Result of [`strip_address_tags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedTags {
    /// Remaining tags after removal.
    pub tags: Tags,
    /// At least one address tag was removed.
    pub removed_address: bool,
    /// The remaining tags describe something beyond annotations.
    pub meaningful: bool,
}

/// Remove the address-domain tags from a non-address element.
///
/// `addr:door`, `addr:flats` and `addr:floor` always stay, as does
/// `addr:housename` on ways and relations where it names the building.
/// Fix-me notes, source tags and retained address keys do not make the
/// remainder meaningful.
///
/// # Examples
/// ```
/// use addrsync_core::{ElementKind, Tags, tags::strip_address_tags};
///
/// let building: Tags = [
///     ("building", "house"),
///     ("addr:street", "Storgata"),
///     ("addr:housenumber", "4A"),
/// ]
/// .into_iter()
/// .map(|(k, v)| (k.to_owned(), v.to_owned()))
/// .collect();
///
/// let stripped = strip_address_tags(ElementKind::Way, &building);
/// assert!(stripped.removed_address);
/// assert!(stripped.meaningful);
/// assert_eq!(stripped.tags.len(), 1);
/// ```
#[must_use]
pub fn strip_address_tags(kind: ElementKind, tags: &Tags) -> StrippedTags {
    let mut kept = Tags::new();
    let mut removed_address = false;
    let mut meaningful = false;
    for (key, value) in tags {
        let retained = is_retained_address_key(key)
            || (key == HOUSENAME && kind != ElementKind::Node);
        if is_address_domain_key(key) && !retained {
            removed_address = true;
            continue;
        }
        if !retained && !is_metadata_key(key) {
            meaningful = true;
        }
        kept.insert(key.clone(), value.clone());
    }
    StrippedTags {
        tags: kept,
        removed_address,
        meaningful,
    }
}
