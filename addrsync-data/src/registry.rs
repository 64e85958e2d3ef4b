//! Registry extract decoding.

use std::io::Read;

use addrsync_core::RawAddress;
use thiserror::Error;

/// Errors raised while decoding a registry extract.
#[derive(Debug, Error)]
pub enum RegistryDecodeError {
    /// The extract is not a JSON array of records.
    #[error("malformed registry extract: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a JSON array of raw registry records.
///
/// Field validation happens later in the normaliser, which reports bad
/// records individually instead of failing the whole extract.
///
/// # Errors
/// Returns [`RegistryDecodeError`] when the input is not a JSON array of
/// objects.
pub fn decode_registry_extract<R: Read>(reader: R) -> Result<Vec<RawAddress>, RegistryDecodeError> {
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use addrsync_core::AddressKind;
    use rstest::rstest;

    #[rstest]
    fn decodes_street_and_place_records() {
        let json = r#"[
            {"name": "Storgata", "number": "4", "letter": "a",
             "postcode": "0155", "city": "OSLO", "lon": 10.742, "lat": 59.911},
            {"kind": "place", "name": "Nordre Li", "farm": "Østre",
             "number": "1", "postcode": "2838", "city": "SNERTINGDAL",
             "lon": 10.4, "lat": 60.8}
        ]"#;
        let records = decode_registry_extract(json.as_bytes()).expect("decode");
        assert_eq!(records.len(), 2);
        let street = records.first().expect("street record");
        assert_eq!(street.kind, AddressKind::Street);
        assert_eq!(street.letter.as_deref(), Some("a"));
        let place = records.get(1).expect("place record");
        assert_eq!(place.kind, AddressKind::Place);
        assert_eq!(place.farm.as_deref(), Some("Østre"));
    }

    #[rstest]
    fn missing_fields_default() {
        let records = decode_registry_extract(r#"[{"name": "Storgata"}]"#.as_bytes())
            .expect("decode");
        let record = records.first().expect("record");
        assert_eq!(record.postcode, None);
        assert!((record.lon - 0.0).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case::object(r#"{"name": "Storgata"}"#)]
    #[case::truncated(r#"[{"name": "#)]
    fn malformed_extracts_fail(#[case] json: &str) {
        assert!(decode_registry_extract(json.as_bytes()).is_err());
    }
}
