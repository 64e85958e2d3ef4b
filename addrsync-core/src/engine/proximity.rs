//! Spatial pool of unmatched clean nodes used by the proximity pass.

use geo::Coord;
use rstar::{RTree, primitives::GeomWithData};

use crate::{TargetIndex, distance::search_envelope, distance_m};

type Entry = GeomWithData<[f64; 2], usize>;

/// R-tree over the slots of clean nodes left after the direct pass.
///
/// The tree itself is never mutated; callers pass the consumed markers so a
/// node taken by an earlier record is skipped.
pub(super) struct CandidatePool {
    tree: RTree<Entry>,
}

fn is_consumed(consumed: &[bool], slot: usize) -> bool {
    consumed.get(slot).copied().unwrap_or(true)
}

impl CandidatePool {
    pub(super) fn build(index: &TargetIndex, consumed: &[bool]) -> Self {
        let entries = index
            .elements()
            .iter()
            .enumerate()
            .filter(|(slot, _)| index.is_clean(*slot) && !is_consumed(consumed, *slot))
            .filter_map(|(slot, element)| {
                element
                    .location()
                    .map(|point| Entry::new([point.x, point.y], slot))
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.tree.size()
    }

    /// Closest unconsumed node within `radius_m` whose folded house number
    /// equals `house_number`.
    ///
    /// Ties on distance go to the lowest slot, so the result does not depend
    /// on the tree's internal layout.
    pub(super) fn nearest(
        &self,
        index: &TargetIndex,
        consumed: &[bool],
        point: Coord<f64>,
        house_number: &str,
        radius_m: f64,
    ) -> Option<(usize, f64)> {
        self.tree
            .locate_in_envelope_intersecting(&search_envelope(point, radius_m))
            .filter(|entry| !is_consumed(consumed, entry.data))
            .filter(|entry| index.folded_house_number(entry.data) == Some(house_number))
            .map(|entry| {
                let [x, y] = *entry.geom();
                (entry.data, distance_m(point, Coord { x, y }))
            })
            .filter(|(_, distance)| *distance <= radius_m)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }
}
