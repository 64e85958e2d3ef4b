//! Destination dataset elements as delivered by a map snapshot.

use std::fmt;

use geo::Coord;

use crate::Tags;

/// Kind of a destination element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementKind {
    /// A point.
    Node,
    /// An ordered list of nodes.
    Way,
    /// A collection of typed members.
    Relation,
}

impl ElementKind {
    /// Lowercase name used by the destination dataset.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed element identifier. Ids are only unique within one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementRef {
    /// Element kind.
    pub kind: ElementKind,
    /// Identifier; negative for elements not yet created.
    pub id: i64,
}

impl ElementRef {
    /// Reference a node.
    #[must_use]
    pub const fn node(id: i64) -> Self {
        Self {
            kind: ElementKind::Node,
            id,
        }
    }

    /// Reference a way.
    #[must_use]
    pub const fn way(id: i64) -> Self {
        Self {
            kind: ElementKind::Way,
            id,
        }
    }

    /// Reference a relation.
    #[must_use]
    pub const fn relation(id: i64) -> Self {
        Self {
            kind: ElementKind::Relation,
            id,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Versioning metadata the destination system requires to accept an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ElementMeta {
    /// Element version.
    pub version: u32,
    /// Name of the last editor.
    pub user: String,
    /// Numeric id of the last editor.
    pub uid: u64,
    /// ISO 8601 timestamp of the last edit.
    pub timestamp: String,
    /// Change-set that produced the current version.
    pub changeset: u64,
}

/// Member of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Member {
    /// Referenced element.
    pub element: ElementRef,
    /// Role within the relation; may be empty.
    pub role: String,
}

/// Shape of an element.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Geometry {
    /// A node position.
    Point(Coord<f64>),
    /// A way with its node list and an optional centre point.
    Way {
        /// Ordered node ids.
        nodes: Vec<i64>,
        /// Centre point reported by the snapshot, if any.
        center: Option<Coord<f64>>,
    },
    /// A relation with its members and an optional centre point.
    Relation {
        /// Ordered members.
        members: Vec<Member>,
        /// Centre point reported by the snapshot, if any.
        center: Option<Coord<f64>>,
    },
}

/// An element of the destination dataset.
///
/// # Examples
/// ```
/// use addrsync_core::{ElementKind, ElementMeta, Geometry, Tags, TargetElement};
/// use geo::Coord;
///
/// let node = TargetElement {
///     id: 42,
///     meta: ElementMeta::default(),
///     geometry: Geometry::Point(Coord { x: 10.742, y: 59.911 }),
///     tags: Tags::new(),
/// };
/// assert_eq!(node.kind(), ElementKind::Node);
/// assert!(node.references().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetElement {
    /// Identifier within the element kind.
    pub id: i64,
    /// Versioning metadata.
    pub meta: ElementMeta,
    /// Position or member list.
    pub geometry: Geometry,
    /// Tags.
    pub tags: Tags,
}

impl TargetElement {
    /// Kind derived from the geometry.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self.geometry {
            Geometry::Point(_) => ElementKind::Node,
            Geometry::Way { .. } => ElementKind::Way,
            Geometry::Relation { .. } => ElementKind::Relation,
        }
    }

    /// Typed reference to this element.
    #[must_use]
    pub const fn element_ref(&self) -> ElementRef {
        ElementRef {
            kind: self.kind(),
            id: self.id,
        }
    }

    /// Node position or the reported centre of a way or relation.
    #[must_use]
    pub const fn location(&self) -> Option<Coord<f64>> {
        match &self.geometry {
            Geometry::Point(point) => Some(*point),
            Geometry::Way { center, .. } | Geometry::Relation { center, .. } => *center,
        }
    }

    /// Elements this element references one level down.
    #[must_use]
    pub fn references(&self) -> Vec<ElementRef> {
        match &self.geometry {
            Geometry::Point(_) => Vec::new(),
            Geometry::Way { nodes, .. } => nodes.iter().copied().map(ElementRef::node).collect(),
            Geometry::Relation { members, .. } => {
                members.iter().map(|member| member.element).collect()
            }
        }
    }
}

/// Elements delivered for one unit.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DestinationSnapshot {
    /// Elements carrying at least one address tag.
    pub elements: Vec<TargetElement>,
    /// Superset of elements scanned only for ownership references.
    pub parents: Vec<TargetElement>,
    /// Elements one level below ways and relations, used as output context.
    pub children: Vec<TargetElement>,
}

impl DestinationSnapshot {
    /// Snapshot without any destination elements.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            elements: Vec::new(),
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Snapshot holding only address elements.
    #[must_use]
    pub const fn new(elements: Vec<TargetElement>) -> Self {
        Self {
            elements,
            parents: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Attach the ownership superset.
    #[must_use]
    pub fn with_parents(mut self, parents: Vec<TargetElement>) -> Self {
        self.parents = parents;
        self
    }

    /// Attach one-level children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<TargetElement>) -> Self {
        self.children = children;
        self
    }

    /// True when there is nothing to reconcile against.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn way(id: i64, nodes: Vec<i64>) -> TargetElement {
        TargetElement {
            id,
            meta: ElementMeta::default(),
            geometry: Geometry::Way {
                nodes,
                center: None,
            },
            tags: Tags::new(),
        }
    }

    #[rstest]
    fn way_references_its_nodes() {
        let element = way(7, vec![1, 2, 1]);
        assert_eq!(element.kind(), ElementKind::Way);
        assert_eq!(
            element.references(),
            vec![ElementRef::node(1), ElementRef::node(2), ElementRef::node(1)]
        );
        assert_eq!(element.location(), None);
    }

    #[rstest]
    fn relation_references_typed_members() {
        let element = TargetElement {
            id: 9,
            meta: ElementMeta::default(),
            geometry: Geometry::Relation {
                members: vec![
                    Member {
                        element: ElementRef::way(7),
                        role: "outer".into(),
                    },
                    Member {
                        element: ElementRef::node(7),
                        role: String::new(),
                    },
                ],
                center: Some(Coord { x: 1.0, y: 2.0 }),
            },
            tags: Tags::new(),
        };
        assert_eq!(
            element.references(),
            vec![ElementRef::way(7), ElementRef::node(7)]
        );
        assert_eq!(element.location(), Some(Coord { x: 1.0, y: 2.0 }));
        assert_eq!(element.element_ref().to_string(), "relation 9");
    }

    #[rstest]
    fn snapshot_builders_fill_sections() {
        let snapshot = DestinationSnapshot::empty()
            .with_parents(vec![way(1, vec![3])])
            .with_children(vec![way(2, vec![])]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.parents.len(), 1);
        assert_eq!(snapshot.children.len(), 1);
    }
}
