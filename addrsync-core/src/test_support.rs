//! Test-only builders and in-memory collaborators used by unit, behaviour
//! and property tests.

use std::{collections::HashMap, sync::Mutex};

use geo::Coord;

use crate::{
    ChangeSink, CollaboratorError, DestinationSnapshot, ElementMeta, Geometry, RawAddress,
    RegistrySource, RoutedDocument, SnapshotSource, SourceNormalizer, SourceRecord, Tags,
    TargetElement, UnitId, distance::EARTH_RADIUS_M,
};

/// Postcode used by [`address_tags`] and [`raw_address`].
pub const POSTCODE: &str = "0155";
/// City used by [`address_tags`] and [`raw_address`].
pub const CITY: &str = "Oslo";

/// Build a tag map from string pairs.
#[must_use]
pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

/// Complete street address in [`POSTCODE`] [`CITY`].
#[must_use]
pub fn address_tags(street: &str, number: &str) -> Tags {
    tags(&[
        ("addr:street", street),
        ("addr:housenumber", number),
        ("addr:postcode", POSTCODE),
        ("addr:city", CITY),
    ])
}

/// A version 1 node.
#[must_use]
pub fn node(id: i64, lon: f64, lat: f64, tags: Tags) -> TargetElement {
    TargetElement {
        id,
        meta: meta(),
        geometry: Geometry::Point(Coord { x: lon, y: lat }),
        tags,
    }
}

/// A version 1 way over `nodes`.
#[must_use]
pub fn way(id: i64, nodes: Vec<i64>, tags: Tags) -> TargetElement {
    TargetElement {
        id,
        meta: meta(),
        geometry: Geometry::Way {
            nodes,
            center: None,
        },
        tags,
    }
}

fn meta() -> ElementMeta {
    ElementMeta {
        version: 1,
        user: "mapper".to_owned(),
        uid: 42,
        timestamp: "2024-01-01T00:00:00Z".to_owned(),
        changeset: 7,
    }
}

/// Point `metres` due north of `point`.
#[must_use]
pub fn offset_north(point: Coord<f64>, metres: f64) -> Coord<f64> {
    Coord {
        x: point.x,
        y: point.y + (metres / EARTH_RADIUS_M).to_degrees(),
    }
}

/// Registry row for a street address in [`POSTCODE`] [`CITY`].
#[must_use]
pub fn raw_address(street: &str, number: &str, lon: f64, lat: f64) -> RawAddress {
    RawAddress {
        name: street.to_owned(),
        number: Some(number.to_owned()),
        postcode: Some(POSTCODE.to_owned()),
        city: Some(CITY.to_owned()),
        lon,
        lat,
        ..RawAddress::default()
    }
}

/// Normalised record for a street address in [`POSTCODE`] [`CITY`].
///
/// # Panics
/// Panics when the inputs do not form a valid record.
#[must_use]
pub fn record(street: &str, number: &str, point: Coord<f64>) -> SourceRecord {
    let raw = raw_address(street, number, point.x, point.y);
    match SourceNormalizer::default().normalize(&raw) {
        Ok((record, _)) => record,
        Err(reason) => panic!("invalid test record: {reason}"),
    }
}

/// In-memory registry keyed by unit id.
#[derive(Debug, Default, Clone)]
pub struct MemoryRegistry {
    units: HashMap<UnitId, Vec<RawAddress>>,
}

impl MemoryRegistry {
    /// Add the extract of a unit.
    #[must_use]
    pub fn with_unit(mut self, unit: &str, records: Vec<RawAddress>) -> Self {
        self.units.insert(UnitId::from(unit), records);
        self
    }
}

impl RegistrySource for MemoryRegistry {
    fn fetch_registry(&self, unit: &UnitId) -> Result<Vec<RawAddress>, CollaboratorError> {
        self.units
            .get(unit)
            .cloned()
            .ok_or_else(|| CollaboratorError::UnknownUnit { unit: unit.clone() })
    }
}

/// In-memory snapshots; unknown units yield an empty snapshot.
#[derive(Debug, Default, Clone)]
pub struct MemorySnapshots {
    units: HashMap<UnitId, DestinationSnapshot>,
}

impl MemorySnapshots {
    /// Add the snapshot of a unit.
    #[must_use]
    pub fn with_unit(mut self, unit: &str, snapshot: DestinationSnapshot) -> Self {
        self.units.insert(UnitId::from(unit), snapshot);
        self
    }
}

impl SnapshotSource for MemorySnapshots {
    fn fetch_snapshot(&self, unit: &UnitId) -> Result<DestinationSnapshot, CollaboratorError> {
        Ok(self.units.get(unit).cloned().unwrap_or_default())
    }
}

/// Sink that keeps every delivered document.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<RoutedDocument>>,
}

impl RecordingSink {
    /// Documents delivered so far.
    #[must_use]
    pub fn documents(&self) -> Vec<RoutedDocument> {
        self.delivered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Labels of delivered documents in delivery order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.documents()
            .into_iter()
            .map(|routed| routed.document.label)
            .collect()
    }
}

impl ChangeSink for RecordingSink {
    fn deliver(&self, routed: &RoutedDocument) -> Result<(), CollaboratorError> {
        self.delivered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(routed.clone());
        Ok(())
    }
}
