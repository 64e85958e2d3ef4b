//! Operations produced by the matcher and the per-unit batch holding them.

use std::{collections::BTreeMap, fmt};

use geo::Coord;

use crate::{ElementRef, Tags, TargetElement};

/// Identifier of an administrative unit, such as a municipality number.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UnitId(String);

impl UnitId {
    /// Wrap a unit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A node that does not exist yet in the destination dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    /// Position of the node.
    pub location: Coord<f64>,
    /// Tags of the node.
    pub tags: Tags,
}

/// One decision about a source record or destination element.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create a node for a source record.
    Create {
        /// Node to create.
        node: NewNode,
        /// Position of the source record in the unit's record list.
        source: usize,
    },
    /// Replace the tags of an element and optionally move a node.
    Modify {
        /// Element as found in the snapshot.
        element: TargetElement,
        /// Complete new tag set.
        tags: Tags,
        /// New node position, when it moves.
        location: Option<Coord<f64>>,
        /// Source record applied, if any.
        source: Option<usize>,
    },
    /// Remove an element.
    Delete {
        /// Element as found in the snapshot.
        element: TargetElement,
    },
    /// Pass an element through unchanged.
    Output {
        /// Element as found in the snapshot.
        element: TargetElement,
        /// Source record confirming the element, if any.
        source: Option<usize>,
    },
}

impl Operation {
    /// Destination element this operation consumes.
    #[must_use]
    pub const fn target(&self) -> Option<&TargetElement> {
        match self {
            Self::Create { .. } => None,
            Self::Modify { element, .. }
            | Self::Delete { element }
            | Self::Output { element, .. } => Some(element),
        }
    }

    /// Source record this operation consumes.
    #[must_use]
    pub const fn source(&self) -> Option<usize> {
        match self {
            Self::Create { source, .. } => Some(*source),
            Self::Modify { source, .. } | Self::Output { source, .. } => *source,
            Self::Delete { .. } => None,
        }
    }

    /// True for operations that change the destination dataset.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Output { .. })
    }
}

/// Running totals of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchCounters {
    /// Nodes created.
    pub added: usize,
    /// Address elements retagged, moved or cleared.
    pub modified: usize,
    /// Elements deleted.
    pub deleted: usize,
    /// Non-address elements that lost their address tags.
    pub removed_tags: usize,
    /// All changes.
    pub total: usize,
    /// Elements passed through unchanged.
    pub unchanged: usize,
}

/// Ordered operations for one unit plus counters.
///
/// Operations are append-only. The `push_*` methods are the only way to add
/// them, which keeps the counters consistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    unit: UnitId,
    operations: Vec<Operation>,
    counters: BatchCounters,
    context: BTreeMap<ElementRef, TargetElement>,
}

impl ChangeBatch {
    /// Empty batch for `unit`.
    #[must_use]
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            ..Self::default()
        }
    }

    /// Unit the batch was built for.
    #[must_use]
    pub const fn unit(&self) -> &UnitId {
        &self.unit
    }

    /// Operations in emission order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Counters.
    #[must_use]
    pub const fn counters(&self) -> BatchCounters {
        self.counters
    }

    /// Number of changes.
    #[must_use]
    pub const fn change_count(&self) -> usize {
        self.counters.total
    }

    /// True when the batch holds no changes (only pass-through elements).
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        self.counters.total == 0
    }

    /// Children of ways and relations in this batch, keyed by reference.
    #[must_use]
    pub const fn context(&self) -> &BTreeMap<ElementRef, TargetElement> {
        &self.context
    }

    pub(crate) fn push_create(&mut self, location: Coord<f64>, tags: Tags, source: usize) {
        self.counters.added += 1;
        self.counters.total += 1;
        self.operations.push(Operation::Create {
            node: NewNode { location, tags },
            source,
        });
    }

    pub(crate) fn push_modify(
        &mut self,
        element: &TargetElement,
        tags: Tags,
        location: Option<Coord<f64>>,
        source: Option<usize>,
    ) {
        self.counters.modified += 1;
        self.counters.total += 1;
        self.operations.push(Operation::Modify {
            element: element.clone(),
            tags,
            location,
            source,
        });
    }

    /// Remove every tag from an address node while keeping its geometry.
    pub(crate) fn push_clear(&mut self, element: &TargetElement) {
        self.push_modify(element, Tags::new(), None, None);
    }

    /// Record the removal of address tags from a non-address element.
    pub(crate) fn push_strip(&mut self, element: &TargetElement, tags: Tags) {
        self.counters.removed_tags += 1;
        self.counters.total += 1;
        self.operations.push(Operation::Modify {
            element: element.clone(),
            tags,
            location: None,
            source: None,
        });
    }

    /// Record the deletion of an element.
    ///
    /// # Panics
    /// Panics when `owned` is true. Deleting an element referenced by a way
    /// or relation would corrupt the destination dataset, so reaching this
    /// is a logic error in the caller.
    pub(crate) fn push_delete(&mut self, element: &TargetElement, owned: bool) {
        assert!(
            !owned,
            "ambiguous ownership: refusing to delete {} which has a parent",
            element.element_ref()
        );
        self.counters.deleted += 1;
        self.counters.total += 1;
        self.operations.push(Operation::Delete {
            element: element.clone(),
        });
    }

    pub(crate) fn push_output(&mut self, element: &TargetElement, source: Option<usize>) {
        self.counters.unchanged += 1;
        self.operations.push(Operation::Output {
            element: element.clone(),
            source,
        });
    }

    pub(crate) fn add_context(&mut self, child: &TargetElement) {
        self.context
            .entry(child.element_ref())
            .or_insert_with(|| child.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{address_tags, node};
    use rstest::{fixture, rstest};

    #[fixture]
    fn element() -> TargetElement {
        node(1, 10.742, 59.911, address_tags("Storgata", "4A"))
    }

    #[rstest]
    fn counters_track_operations(element: TargetElement) {
        let mut batch = ChangeBatch::new(UnitId::from("0301"));
        batch.push_clear(&element);
        batch.push_create(Coord { x: 10.0, y: 59.0 }, Tags::new(), 0);
        batch.push_strip(&element, Tags::new());
        batch.push_output(&element, None);
        batch.push_delete(&element, false);

        let counters = batch.counters();
        assert_eq!(counters.added, 1);
        assert_eq!(counters.modified, 1);
        assert_eq!(counters.removed_tags, 1);
        assert_eq!(counters.deleted, 1);
        assert_eq!(counters.unchanged, 1);
        assert_eq!(counters.total, 4);
        assert_eq!(batch.operations().len(), 5);
        assert_eq!(
            batch.operations().iter().filter(|op| op.is_change()).count(),
            batch.change_count()
        );
    }

    #[rstest]
    #[should_panic(expected = "ambiguous ownership")]
    fn deleting_an_owned_element_panics(element: TargetElement) {
        let mut batch = ChangeBatch::new(UnitId::from("0301"));
        batch.push_delete(&element, true);
    }

    #[rstest]
    fn operations_report_what_they_consume(element: TargetElement) {
        let create = Operation::Create {
            node: NewNode {
                location: Coord { x: 0.0, y: 0.0 },
                tags: Tags::new(),
            },
            source: 3,
        };
        assert_eq!(create.source(), Some(3));
        assert!(create.target().is_none());

        let delete = Operation::Delete { element };
        assert_eq!(delete.source(), None);
        assert_eq!(delete.target().map(TargetElement::element_ref), Some(ElementRef::node(1)));
    }
}
