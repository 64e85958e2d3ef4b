//! Overpass JSON decoding.
//!
//! Accepts the output of `out meta` and `out center meta` queries: an object
//! whose `elements` array holds nodes with `lat`/`lon`, ways with `nodes`
//! and relations with `members`. Ways and relations may carry a `center`.

use std::io::Read;

use addrsync_core::{ElementKind, ElementMeta, ElementRef, Geometry, Member, Tags, TargetElement};
use geo::Coord;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while decoding an Overpass document.
#[derive(Debug, Error)]
pub enum SnapshotDecodeError {
    /// The document is not valid JSON of the expected shape.
    #[error("malformed Overpass document: {0}")]
    Json(#[from] serde_json::Error),
    /// An element has a type other than node, way or relation.
    #[error("element {id} has unsupported type {kind:?}")]
    UnknownType {
        /// Identifier of the offending element.
        id: i64,
        /// Type string found.
        kind: String,
    },
    /// A node lacks `lat` or `lon`.
    #[error("node {id} has no coordinate")]
    MissingCoordinate {
        /// Identifier of the offending node.
        id: i64,
    },
}

#[derive(Debug, Deserialize)]
struct OverpassDocument {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<LatLon>,
    #[serde(default)]
    nodes: Vec<i64>,
    #[serde(default)]
    members: Vec<OverpassMember>,
    #[serde(default)]
    tags: Tags,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    user: String,
    #[serde(default)]
    uid: u64,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    changeset: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

impl From<LatLon> for Coord<f64> {
    fn from(value: LatLon) -> Self {
        Self {
            x: value.lon,
            y: value.lat,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OverpassMember {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "ref")]
    reference: i64,
    #[serde(default)]
    role: String,
}

fn parse_kind(kind: &str, id: i64) -> Result<ElementKind, SnapshotDecodeError> {
    match kind {
        "node" => Ok(ElementKind::Node),
        "way" => Ok(ElementKind::Way),
        "relation" => Ok(ElementKind::Relation),
        other => Err(SnapshotDecodeError::UnknownType {
            id,
            kind: other.to_owned(),
        }),
    }
}

impl OverpassElement {
    fn into_target(self) -> Result<TargetElement, SnapshotDecodeError> {
        let geometry = match parse_kind(&self.kind, self.id)? {
            ElementKind::Node => match (self.lon, self.lat) {
                (Some(x), Some(y)) => Geometry::Point(Coord { x, y }),
                _ => return Err(SnapshotDecodeError::MissingCoordinate { id: self.id }),
            },
            ElementKind::Way => Geometry::Way {
                nodes: self.nodes,
                center: self.center.map(Coord::from),
            },
            ElementKind::Relation => Geometry::Relation {
                members: self
                    .members
                    .into_iter()
                    .map(|member| {
                        let kind = parse_kind(&member.kind, member.reference)?;
                        Ok(Member {
                            element: ElementRef {
                                kind,
                                id: member.reference,
                            },
                            role: member.role,
                        })
                    })
                    .collect::<Result<_, SnapshotDecodeError>>()?,
                center: self.center.map(Coord::from),
            },
        };
        Ok(TargetElement {
            id: self.id,
            meta: ElementMeta {
                version: self.version,
                user: self.user,
                uid: self.uid,
                timestamp: self.timestamp,
                changeset: self.changeset,
            },
            geometry,
            tags: self.tags,
        })
    }
}

/// Decode an Overpass JSON document into destination elements.
///
/// Element order is preserved; the index sorts elements itself.
///
/// # Errors
/// Returns [`SnapshotDecodeError`] for malformed JSON, unknown element types
/// or nodes without a coordinate.
///
/// # Examples
/// ```
/// use addrsync_data::decode_overpass_snapshot;
///
/// let json = r#"{"elements":[{"type":"node","id":1,"lat":59.9,"lon":10.7}]}"#;
/// let elements = decode_overpass_snapshot(json.as_bytes()).expect("valid document");
/// assert_eq!(elements.len(), 1);
/// ```
pub fn decode_overpass_snapshot<R: Read>(
    reader: R,
) -> Result<Vec<TargetElement>, SnapshotDecodeError> {
    let document: OverpassDocument = serde_json::from_reader(reader)?;
    document
        .elements
        .into_iter()
        .map(OverpassElement::into_target)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DOCUMENT: &str = r#"{
        "version": 0.6,
        "elements": [
            {
                "type": "node", "id": 11, "lat": 59.911, "lon": 10.742,
                "version": 3, "user": "mapper", "uid": 42,
                "timestamp": "2024-01-01T00:00:00Z", "changeset": 7,
                "tags": {"addr:street": "Storgata", "addr:housenumber": "4A"}
            },
            {
                "type": "way", "id": 12, "nodes": [1, 2, 3, 1],
                "center": {"lat": 59.912, "lon": 10.743},
                "tags": {"building": "yes", "addr:street": "Storgata"}
            },
            {
                "type": "relation", "id": 13,
                "members": [
                    {"type": "way", "ref": 12, "role": "outer"},
                    {"type": "node", "ref": 11, "role": ""}
                ]
            }
        ]
    }"#;

    #[rstest]
    fn decodes_all_three_kinds() {
        let elements = decode_overpass_snapshot(DOCUMENT.as_bytes()).expect("decode");
        let refs: Vec<_> = elements.iter().map(TargetElement::element_ref).collect();
        assert_eq!(
            refs,
            vec![
                ElementRef::node(11),
                ElementRef::way(12),
                ElementRef::relation(13)
            ]
        );
    }

    #[rstest]
    fn node_carries_meta_and_position() {
        let elements = decode_overpass_snapshot(DOCUMENT.as_bytes()).expect("decode");
        let node = elements.first().expect("node");
        assert_eq!(node.location(), Some(Coord { x: 10.742, y: 59.911 }));
        assert_eq!(node.meta.version, 3);
        assert_eq!(node.meta.changeset, 7);
        assert_eq!(node.tags.get("addr:housenumber").map(String::as_str), Some("4A"));
    }

    #[rstest]
    fn way_centre_becomes_location() {
        let elements = decode_overpass_snapshot(DOCUMENT.as_bytes()).expect("decode");
        let way = elements.get(1).expect("way");
        assert_eq!(way.location(), Some(Coord { x: 10.743, y: 59.912 }));
        assert_eq!(way.references().len(), 4);
    }

    #[rstest]
    fn relation_members_keep_kind_and_role() {
        let elements = decode_overpass_snapshot(DOCUMENT.as_bytes()).expect("decode");
        let relation = elements.get(2).expect("relation");
        assert_eq!(
            relation.references(),
            vec![ElementRef::way(12), ElementRef::node(11)]
        );
    }

    #[rstest]
    #[case::element(r#"{"elements":[{"type":"area","id":5}]}"#)]
    #[case::member(
        r#"{"elements":[{"type":"relation","id":5,"members":[{"type":"area","ref":1}]}]}"#
    )]
    fn unknown_types_are_rejected(#[case] json: &str) {
        let err = decode_overpass_snapshot(json.as_bytes()).expect_err("unknown type");
        assert!(matches!(err, SnapshotDecodeError::UnknownType { kind, .. } if kind == "area"));
    }

    #[rstest]
    fn node_without_coordinate_is_rejected() {
        let json = r#"{"elements":[{"type":"node","id":5,"lat":59.9}]}"#;
        let err = decode_overpass_snapshot(json.as_bytes()).expect_err("missing lon");
        assert!(matches!(err, SnapshotDecodeError::MissingCoordinate { id: 5 }));
    }

    #[rstest]
    fn empty_document_decodes_to_nothing() {
        let elements = decode_overpass_snapshot("{}".as_bytes()).expect("decode");
        assert!(elements.is_empty());
    }
}
