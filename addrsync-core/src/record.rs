//! Registry records before and after normalisation.

use geo::Coord;

use crate::{Tags, tags};

/// Whether an address is located by a street or by a place or farm name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AddressKind {
    /// Tagged as `addr:street`.
    #[default]
    Street,
    /// Tagged as `addr:place`.
    Place,
}

impl AddressKind {
    /// Tag key carrying the name for this kind.
    #[must_use]
    pub const fn tag_key(self) -> &'static str {
        match self {
            Self::Street => tags::STREET,
            Self::Place => tags::PLACE,
        }
    }
}

/// A registry record as delivered by the registry extract.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawAddress {
    /// Street or place.
    pub kind: AddressKind,
    /// Street or place name.
    pub name: String,
    /// Farm sub-name appended to place names.
    pub farm: Option<String>,
    /// House number without letter.
    pub number: Option<String>,
    /// Letter suffix of the house number.
    pub letter: Option<String>,
    /// Postal code.
    pub postcode: Option<String>,
    /// Postal town.
    pub city: Option<String>,
    /// Municipal district.
    pub district: Option<String>,
    /// Popular name of the building.
    pub housename: Option<String>,
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

/// Tuple used for direct matching.
///
/// `None` marks a component that is unset, which never equals an empty
/// string. Components are folded with the same rules on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchKey {
    /// Street or place name.
    pub street_or_place: Option<String>,
    /// House number with whitespace removed and letters uppercased.
    pub house_number: Option<String>,
    /// Postcode with whitespace removed.
    pub postcode: Option<String>,
    /// Postal town.
    pub city: Option<String>,
}

/// A normalised registry record. Immutable once built by the normaliser.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub(crate) kind: AddressKind,
    pub(crate) name: String,
    pub(crate) house_number: Option<String>,
    pub(crate) postcode: String,
    pub(crate) city: String,
    pub(crate) district: Option<String>,
    pub(crate) housename: Option<String>,
    pub(crate) point: Coord<f64>,
}

impl SourceRecord {
    /// Street or place.
    #[must_use]
    pub const fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Street or place name.
    #[must_use]
    pub fn street_or_place(&self) -> &str {
        &self.name
    }

    /// House number as it will be tagged.
    #[must_use]
    pub fn house_number(&self) -> Option<&str> {
        self.house_number.as_deref()
    }

    /// Postal code.
    #[must_use]
    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    /// Postal town.
    #[must_use]
    pub fn city(&self) -> &str {
        &self.city
    }

    /// Position rounded to six decimals.
    #[must_use]
    pub const fn point(&self) -> Coord<f64> {
        self.point
    }

    /// Direct-match key.
    #[must_use]
    pub fn match_key(&self) -> MatchKey {
        MatchKey {
            street_or_place: Some(self.name.clone()),
            house_number: self.house_number.as_deref().map(fold_house_number),
            postcode: Some(self.postcode.clone()),
            city: Some(self.city.clone()),
        }
    }

    /// House number folded for comparison.
    #[must_use]
    pub fn folded_house_number(&self) -> Option<String> {
        self.house_number.as_deref().map(fold_house_number)
    }

    /// Address tags this record asserts.
    ///
    /// # Examples
    /// ```
    /// use addrsync_core::{RawAddress, SourceNormalizer};
    ///
    /// let raw = RawAddress {
    ///     name: "Storgata".into(),
    ///     number: Some("4".into()),
    ///     letter: Some("a".into()),
    ///     postcode: Some("0155".into()),
    ///     city: Some("Oslo".into()),
    ///     lon: 10.742,
    ///     lat: 59.911,
    ///     ..RawAddress::default()
    /// };
    /// let normalized = SourceNormalizer::default().normalize_all(&[raw]);
    /// let tags = normalized.records[0].tags();
    /// assert_eq!(tags["addr:street"], "Storgata");
    /// assert_eq!(tags["addr:housenumber"], "4A");
    /// ```
    #[must_use]
    pub fn tags(&self) -> Tags {
        let mut out = Tags::new();
        out.insert(self.kind.tag_key().to_owned(), self.name.clone());
        if let Some(number) = &self.house_number {
            out.insert(tags::HOUSENUMBER.to_owned(), number.clone());
        }
        if let Some(district) = &self.district {
            out.insert(tags::DISTRICT.to_owned(), district.clone());
        }
        out.insert(tags::POSTCODE.to_owned(), self.postcode.clone());
        out.insert(tags::CITY.to_owned(), self.city.clone());
        if let Some(housename) = &self.housename {
            out.insert(tags::HOUSENAME.to_owned(), housename.clone());
        }
        out
    }
}

/// Trim and collapse internal whitespace; `None` when nothing remains.
#[must_use]
pub fn normalize_text(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Remove all whitespace and uppercase letters ("12 b" becomes "12B").
#[must_use]
pub fn fold_house_number(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Remove all whitespace from a postcode ("114 53" becomes "11453").
#[must_use]
pub fn fold_postcode(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Match key derived from destination tags.
///
/// The name comes from `addr:street`, falling back to `addr:place`.
#[must_use]
pub fn key_from_tags(tags: &Tags) -> MatchKey {
    let text = |key: &str| tags.get(key).and_then(|value| normalize_text(value));
    MatchKey {
        street_or_place: text(tags::STREET).or_else(|| text(tags::PLACE)),
        house_number: tags
            .get(tags::HOUSENUMBER)
            .map(|value| fold_house_number(value))
            .filter(|value| !value.is_empty()),
        postcode: tags
            .get(tags::POSTCODE)
            .map(|value| fold_postcode(value))
            .filter(|value| !value.is_empty()),
        city: text(tags::CITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("  Nedre   Storgate ", Some("Nedre Storgate"))]
    #[case("\t", None)]
    #[case("", None)]
    fn collapses_whitespace(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_text(input).as_deref(), expected);
    }

    #[rstest]
    #[case("12 b", "12B")]
    #[case("4A", "4A")]
    #[case(" 7 U1", "7U1")]
    fn folds_house_numbers(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(fold_house_number(input), expected);
    }

    #[rstest]
    fn tag_key_prefers_street_over_place() {
        let tags: Tags = [
            (tags::STREET, "Storgata"),
            (tags::PLACE, "Nordre Li"),
            (tags::HOUSENUMBER, "4 a"),
            (tags::POSTCODE, "01 55"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        let key = key_from_tags(&tags);
        assert_eq!(key.street_or_place.as_deref(), Some("Storgata"));
        assert_eq!(key.house_number.as_deref(), Some("4A"));
        assert_eq!(key.postcode.as_deref(), Some("0155"));
        assert_eq!(key.city, None);
    }

    #[rstest]
    fn unset_component_differs_from_empty() {
        let mut tags = Tags::new();
        tags.insert(tags::PLACE.to_owned(), "Nordre Li".to_owned());
        tags.insert(tags::CITY.to_owned(), "   ".to_owned());
        let key = key_from_tags(&tags);
        assert_eq!(key.street_or_place.as_deref(), Some("Nordre Li"));
        assert_eq!(key.city, None);
        assert_ne!(key.city, Some(String::new()));
    }
}
