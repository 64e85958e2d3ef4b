//! Three-pass matching of registry records against destination elements.
//!
//! 1. **Direct**: look up the key index and accept hits within the sanity
//!    bound.
//! 2. **Proximity**: pair each remaining record that has a house number with
//!    the nearest remaining clean node carrying the same number, or create a
//!    node.
//! 3. **Residual**: delete or clear stale clean nodes and strip address tags
//!    from other elements.
//!
//! Every record and every indexed element is consumed by exactly one
//! operation. Consumption is tracked with markers; no candidate collection
//! is mutated while it is being scanned.

use std::collections::HashMap;

use log::{debug, warn};

use crate::{
    ChangeBatch, DestinationSnapshot, EngineConfig, MatchKey, SourceRecord, TargetElement,
    TargetIndex, UnitId, distance_m,
    tags::{merge_address, strip_address_tags},
};

mod proximity;

use proximity::CandidatePool;

/// What each pass achieved for one unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchStats {
    /// Records paired through the key index.
    pub direct: usize,
    /// Records paired with a nearby node.
    pub proximity: usize,
    /// Records sharing a key with a later record.
    pub duplicate_keys: usize,
    /// Key hits rejected for lying beyond the sanity bound.
    pub rejected_far: usize,
    /// Non-address elements left alone because of an opt-out note.
    pub opted_out: usize,
}

/// Batch and statistics produced by [`MatchEngine::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Operations for the unit.
    pub batch: ChangeBatch,
    /// Pass statistics.
    pub stats: MatchStats,
}

/// Runs the three passes over one unit.
#[derive(Debug, Clone, Copy)]
pub struct MatchEngine<'a> {
    index: &'a TargetIndex,
    config: &'a EngineConfig,
}

struct Consumed {
    records: Vec<bool>,
    targets: Vec<bool>,
}

impl Consumed {
    fn new(records: usize, targets: usize) -> Self {
        Self {
            records: vec![false; records],
            targets: vec![false; targets],
        }
    }

    fn record(&self, i: usize) -> bool {
        self.records.get(i).copied().unwrap_or(true)
    }

    fn target(&self, slot: usize) -> bool {
        self.targets.get(slot).copied().unwrap_or(true)
    }

    fn take(&mut self, record: usize, slot: Option<usize>) {
        if let Some(done) = self.records.get_mut(record) {
            *done = true;
        }
        if let Some(done) = slot.and_then(|slot| self.targets.get_mut(slot)) {
            *done = true;
        }
    }

    fn take_target(&mut self, slot: usize) {
        if let Some(done) = self.targets.get_mut(slot) {
            *done = true;
        }
    }
}

impl<'a> MatchEngine<'a> {
    /// Prepare to match against `index`.
    #[must_use]
    pub const fn new(index: &'a TargetIndex, config: &'a EngineConfig) -> Self {
        Self { index, config }
    }

    /// Match `records` and return the resulting batch.
    #[must_use]
    pub fn run(&self, unit: UnitId, records: &[SourceRecord]) -> MatchOutcome {
        let mut batch = ChangeBatch::new(unit);
        let mut stats = MatchStats::default();
        let mut consumed = Consumed::new(records.len(), self.index.len());

        self.direct_pass(records, &mut batch, &mut stats, &mut consumed);
        self.proximity_pass(records, &mut batch, &mut stats, &mut consumed);
        self.residual_pass(&mut batch, &mut stats, &mut consumed);
        self.attach_context(&mut batch);

        debug!(
            "unit {}: {} direct, {} proximity, {} change(s)",
            batch.unit(),
            stats.direct,
            stats.proximity,
            batch.change_count()
        );
        MatchOutcome { batch, stats }
    }

    fn direct_pass(
        &self,
        records: &[SourceRecord],
        batch: &mut ChangeBatch,
        stats: &mut MatchStats,
        consumed: &mut Consumed,
    ) {
        let keys: Vec<MatchKey> = records.iter().map(SourceRecord::match_key).collect();
        let mut last: HashMap<&MatchKey, usize> = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if last.insert(key, i).is_some() {
                stats.duplicate_keys += 1;
                warn!(
                    "duplicate registry address {} {}; the later record takes the direct match",
                    key.street_or_place.as_deref().unwrap_or_default(),
                    key.house_number.as_deref().unwrap_or_default()
                );
            }
        }

        for ((i, record), key) in records.iter().enumerate().zip(&keys) {
            if last.get(key) != Some(&i) {
                continue;
            }
            let Some(slot) = self.index.lookup(key) else {
                continue;
            };
            if consumed.target(slot)
                || !self.index.is_clean(slot)
                || self.index.key(slot) != Some(key)
            {
                continue;
            }
            let Some(element) = self.index.element(slot) else {
                continue;
            };
            let Some(location) = element.location() else {
                continue;
            };
            let distance = distance_m(record.point(), location);
            if distance > self.config.sanity_bound_m {
                stats.rejected_far += 1;
                debug!(
                    "ignoring key hit on node {} {distance:.0} m away",
                    element.id
                );
                continue;
            }
            self.settle(batch, i, record, slot, element, distance);
            consumed.take(i, Some(slot));
            stats.direct += 1;
        }
    }

    fn proximity_pass(
        &self,
        records: &[SourceRecord],
        batch: &mut ChangeBatch,
        stats: &mut MatchStats,
        consumed: &mut Consumed,
    ) {
        let pool = CandidatePool::build(self.index, &consumed.targets);
        debug!("proximity pool holds {} clean node(s)", pool.len());

        for (i, record) in records.iter().enumerate() {
            if consumed.record(i) {
                continue;
            }
            // A record without a house number never takes over a nearby node.
            let hit = record.folded_house_number().and_then(|number| {
                pool.nearest(
                    self.index,
                    &consumed.targets,
                    record.point(),
                    &number,
                    self.config.max_relocation_m,
                )
            });
            let Some((slot, element, distance)) = hit.and_then(|(slot, distance)| {
                self.index
                    .element(slot)
                    .map(|element| (slot, element, distance))
            }) else {
                batch.push_create(record.point(), record.tags(), i);
                consumed.take(i, None);
                continue;
            };
            self.settle(batch, i, record, slot, element, distance);
            consumed.take(i, Some(slot));
            stats.proximity += 1;
        }
    }

    fn residual_pass(
        &self,
        batch: &mut ChangeBatch,
        stats: &mut MatchStats,
        consumed: &mut Consumed,
    ) {
        for (slot, element) in self.index.elements().iter().enumerate() {
            if consumed.target(slot) {
                continue;
            }
            consumed.take_target(slot);
            let owned = self.index.has_parent(slot);

            if self.index.is_clean(slot) {
                if owned {
                    batch.push_clear(element);
                } else {
                    batch.push_delete(element, owned);
                }
                continue;
            }

            let opted_out = self.index.opts_out(
                slot,
                &self.config.opt_out_tag,
                &self.config.opt_out_marker,
            );
            let stripped = strip_address_tags(element.kind(), &element.tags);
            if stripped.removed_address && !opted_out {
                if stripped.meaningful || owned {
                    batch.push_strip(element, stripped.tags);
                } else {
                    batch.push_delete(element, owned);
                }
            } else {
                batch.push_output(element, None);
                if opted_out {
                    stats.opted_out += 1;
                }
            }
        }
    }

    /// Apply a matched record to its destination node.
    ///
    /// Within the exact threshold the node keeps its position. Beyond it the
    /// node moves, unless a way or relation uses it: then it is emptied and a
    /// new node carries the address.
    fn settle(
        &self,
        batch: &mut ChangeBatch,
        i: usize,
        record: &SourceRecord,
        slot: usize,
        element: &TargetElement,
        distance: f64,
    ) {
        let tags = merge_address(&element.tags, &record.tags());
        if distance <= self.config.exact_threshold_m {
            if tags == element.tags {
                batch.push_output(element, Some(i));
            } else {
                batch.push_modify(element, tags, None, Some(i));
            }
        } else if self.index.has_parent(slot) {
            batch.push_clear(element);
            batch.push_create(record.point(), tags, i);
        } else {
            batch.push_modify(element, tags, Some(record.point()), Some(i));
        }
    }

    fn attach_context(&self, batch: &mut ChangeBatch) {
        let references: Vec<_> = batch
            .operations()
            .iter()
            .filter_map(crate::Operation::target)
            .flat_map(TargetElement::references)
            .collect();
        let mut unresolved = 0_usize;
        for reference in references {
            let Some(child) = self.index.child(&reference) else {
                if !self.index.contains(&reference) {
                    unresolved += 1;
                }
                continue;
            };
            batch.add_context(child);
        }
        if unresolved > 0 && self.index.has_children() {
            warn!(
                "unit {}: {unresolved} child reference(s) missing from the snapshot",
                batch.unit()
            );
        }
    }
}

/// Reconcile one unit: index the snapshot and run the three passes.
///
/// Deterministic for identical inputs. An empty snapshot yields a pure
/// creation batch.
///
/// # Examples
/// ```
/// use addrsync_core::{
///     DestinationSnapshot, EngineConfig, RawAddress, SourceNormalizer, UnitId, reconcile,
/// };
///
/// let raw = RawAddress {
///     name: "Storgata".into(),
///     number: Some("4A".into()),
///     postcode: Some("0155".into()),
///     city: Some("Oslo".into()),
///     lon: 10.742,
///     lat: 59.911,
///     ..RawAddress::default()
/// };
/// let records = SourceNormalizer::default().normalize_all(&[raw]).records;
/// let batch = reconcile(
///     UnitId::from("0301"),
///     &records,
///     &DestinationSnapshot::empty(),
///     &EngineConfig::default(),
/// );
/// assert_eq!(batch.counters().added, 1);
/// ```
#[must_use]
pub fn reconcile(
    unit: UnitId,
    records: &[SourceRecord],
    snapshot: &DestinationSnapshot,
    config: &EngineConfig,
) -> ChangeBatch {
    let index = TargetIndex::build(snapshot);
    MatchEngine::new(&index, config).run(unit, records).batch
}
