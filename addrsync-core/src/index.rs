//! Per-unit index over destination elements.
//!
//! A [`TargetIndex`] is built once from a [`DestinationSnapshot`] and then
//! only read. Elements are held in a stable order (kind, then id) and
//! addressed by their position ("slot") in that order, which is the
//! iteration order every pass relies on.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::{
    DestinationSnapshot, ElementKind, ElementRef, MatchKey, TargetElement,
    record::key_from_tags,
    tags::is_clean,
};

/// Immutable lookup structures for one unit's destination elements.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    elements: Vec<TargetElement>,
    clean: Vec<bool>,
    owned: Vec<bool>,
    keys: Vec<Option<MatchKey>>,
    direct: HashMap<MatchKey, usize>,
    children: HashMap<ElementRef, TargetElement>,
}

impl TargetIndex {
    /// Index a snapshot.
    ///
    /// Elements are ordered by kind and id; a repeated element keeps its
    /// first occurrence. Ownership is computed from the references of every
    /// address element and every element of the ownership superset.
    ///
    /// # Examples
    /// ```
    /// use addrsync_core::{DestinationSnapshot, TargetIndex};
    ///
    /// let index = TargetIndex::build(&DestinationSnapshot::empty());
    /// assert!(index.is_empty());
    /// ```
    #[must_use]
    pub fn build(snapshot: &DestinationSnapshot) -> Self {
        let mut elements = snapshot.elements.clone();
        elements.sort_by_key(TargetElement::element_ref);
        let before = elements.len();
        elements.dedup_by_key(|element| element.element_ref());
        if elements.len() < before {
            warn!(
                "snapshot repeated {} element(s); keeping first occurrences",
                before - elements.len()
            );
        }

        let referenced: HashSet<ElementRef> = elements
            .iter()
            .chain(snapshot.parents.iter())
            .flat_map(TargetElement::references)
            .collect();

        let clean: Vec<bool> = elements
            .iter()
            .map(|element| is_clean(element.kind(), &element.tags))
            .collect();
        let owned = elements
            .iter()
            .map(|element| referenced.contains(&element.element_ref()))
            .collect();

        let mut keys = Vec::with_capacity(elements.len());
        let mut direct = HashMap::new();
        for (slot, element) in elements.iter().enumerate() {
            if element.kind() != ElementKind::Node {
                keys.push(None);
                continue;
            }
            let key = key_from_tags(&element.tags);
            if let Some(previous) = direct.insert(key.clone(), slot) {
                debug!(
                    "index key collision: node {} replaces slot {previous}",
                    element.id
                );
            }
            keys.push(Some(key));
        }

        let children = snapshot
            .children
            .iter()
            .filter(|child| {
                elements
                    .binary_search_by_key(&child.element_ref(), TargetElement::element_ref)
                    .is_err()
            })
            .map(|child| (child.element_ref(), child.clone()))
            .collect();

        debug!(
            "indexed {} element(s): {} clean, {} direct keys",
            elements.len(),
            clean.iter().filter(|c| **c).count(),
            direct.len()
        );

        Self {
            elements,
            clean,
            owned,
            keys,
            direct,
            children,
        }
    }

    /// Number of indexed elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when the snapshot held no address elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements in slot order.
    #[must_use]
    pub fn elements(&self) -> &[TargetElement] {
        &self.elements
    }

    /// Element at `slot`.
    #[must_use]
    pub fn element(&self, slot: usize) -> Option<&TargetElement> {
        self.elements.get(slot)
    }

    /// Whether the element at `slot` is a clean address node.
    #[must_use]
    pub fn is_clean(&self, slot: usize) -> bool {
        self.clean.get(slot).copied().unwrap_or(false)
    }

    /// Whether another element references the element at `slot`.
    #[must_use]
    pub fn has_parent(&self, slot: usize) -> bool {
        self.owned.get(slot).copied().unwrap_or(false)
    }

    /// Match key of the node at `slot`; `None` for ways and relations.
    #[must_use]
    pub fn key(&self, slot: usize) -> Option<&MatchKey> {
        self.keys.get(slot).and_then(Option::as_ref)
    }

    /// Slot of the node last indexed under `key`.
    #[must_use]
    pub fn lookup(&self, key: &MatchKey) -> Option<usize> {
        self.direct.get(key).copied()
    }

    /// One-level child of a way or relation, when the snapshot supplied it.
    #[must_use]
    pub fn child(&self, reference: &ElementRef) -> Option<&TargetElement> {
        self.children.get(reference)
    }

    /// Whether `reference` is one of the indexed address elements.
    #[must_use]
    pub fn contains(&self, reference: &ElementRef) -> bool {
        self.elements
            .binary_search_by_key(reference, TargetElement::element_ref)
            .is_ok()
    }

    /// True when the snapshot supplied any one-level children.
    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// House number of the node at `slot` folded for comparison.
    pub(crate) fn folded_house_number(&self, slot: usize) -> Option<&str> {
        self.key(slot).and_then(|key| key.house_number.as_deref())
    }

    /// True when the element at `slot` carries an opt-out marker.
    pub(crate) fn opts_out(&self, slot: usize, tag: &str, marker: &str) -> bool {
        self.element(slot)
            .and_then(|element| element.tags.get(tag))
            .is_some_and(|value| value.contains(marker))
    }
}
