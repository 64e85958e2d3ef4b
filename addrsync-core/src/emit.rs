//! Rendering batches into change documents and routing them.
//!
//! A [`ChangeDocument`] is the unit of upload. It gathers one or more
//! batches, numbers created nodes with document-local placeholder ids and
//! adds one level of context for way and relation edits. [`ChangeEmitter`]
//! then decides whether the document may be uploaded or must be handled
//! manually; a document is never split.

use std::collections::HashSet;

use log::{info, warn};

use crate::{
    ChangeBatch, ElementKind, ElementMeta, ElementRef, EngineConfig, Geometry, Member, Operation,
    Tags, TargetElement, UnitId, tags::REVIEW_DELETE,
};

/// Action recorded for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChangeAction {
    /// New element with a placeholder id.
    Create,
    /// Existing element with new tags or position.
    Modify,
    /// Existing element to remove.
    Delete,
    /// Unchanged element included for context.
    Output,
}

/// Every attribute the destination system needs to apply an entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EmittedElement {
    /// Element kind.
    pub kind: ElementKind,
    /// Element id, negative for created nodes.
    pub id: i64,
    /// Versioning metadata; absent for created nodes.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub meta: Option<ElementMeta>,
    /// Node latitude.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub lat: Option<f64>,
    /// Node longitude.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub lon: Option<f64>,
    /// Way node ids.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub nodes: Vec<i64>,
    /// Relation members.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
    pub members: Vec<Member>,
    /// Tags after the change.
    #[cfg_attr(feature = "serde", serde(default))]
    pub tags: Tags,
}

impl EmittedElement {
    fn existing(element: &TargetElement, tags: Tags, location: Option<geo::Coord<f64>>) -> Self {
        let (point, nodes, members) = match &element.geometry {
            Geometry::Point(point) => (Some(location.unwrap_or(*point)), Vec::new(), Vec::new()),
            Geometry::Way { nodes, .. } => (None, nodes.clone(), Vec::new()),
            Geometry::Relation { members, .. } => (None, Vec::new(), members.clone()),
        };
        Self {
            kind: element.kind(),
            id: element.id,
            meta: Some(element.meta.clone()),
            lat: point.map(|p| p.y),
            lon: point.map(|p| p.x),
            nodes,
            members,
            tags,
        }
    }

    /// Typed reference to the element.
    #[must_use]
    pub const fn element_ref(&self) -> ElementRef {
        ElementRef {
            kind: self.kind,
            id: self.id,
        }
    }
}

/// One line of a change document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeEntry {
    /// What to do.
    pub action: ChangeAction,
    /// Element to do it to.
    pub element: EmittedElement,
}

/// Entries for one upload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeDocument {
    /// Name of the document, usually the unit or group id.
    pub label: String,
    /// Units whose batches the document holds.
    pub units: Vec<UnitId>,
    /// Entries in batch order.
    pub entries: Vec<ChangeEntry>,
    /// Changes held by the batches. Deletions rendered for review still
    /// count.
    pub change_count: usize,
}

/// Where a document goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Routing {
    /// Nothing to change; the document is kept for audit only.
    NoChanges,
    /// Within budget; may be uploaded as one change-set.
    Upload,
    /// Over budget; must be reviewed and uploaded by hand.
    ManualUpload,
}

/// A document and its routing decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedDocument {
    /// The rendered document.
    pub document: ChangeDocument,
    /// Routing decision.
    pub routing: Routing,
}

/// Renders batches and applies the change budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEmitter {
    first_placeholder_id: i64,
    budget: usize,
    manual_review: bool,
}

impl ChangeEmitter {
    /// Emitter using the placeholder origin, budget and review mode from
    /// `config`.
    #[must_use]
    pub const fn new(config: &EngineConfig) -> Self {
        Self {
            first_placeholder_id: config.first_placeholder_id,
            budget: config.change_budget,
            manual_review: config.manual_review,
        }
    }

    /// Render `batches` into a single document and route it.
    ///
    /// Placeholder ids restart at the configured origin for every document.
    /// In review mode deletions become [`ChangeAction::Output`] entries
    /// tagged `DELETE=yes`.
    ///
    /// # Examples
    /// ```
    /// use addrsync_core::{ChangeBatch, ChangeEmitter, EngineConfig, Routing, UnitId};
    ///
    /// let emitter = ChangeEmitter::new(&EngineConfig::default());
    /// let routed = emitter.emit("0301", &[ChangeBatch::new(UnitId::from("0301"))]);
    /// assert_eq!(routed.routing, Routing::NoChanges);
    /// assert!(routed.document.entries.is_empty());
    /// ```
    #[must_use]
    pub fn emit(&self, label: impl Into<String>, batches: &[ChangeBatch]) -> RoutedDocument {
        let mut entries = Vec::new();
        let mut next_id = self.first_placeholder_id;
        let mut emitted: HashSet<ElementRef> = batches
            .iter()
            .flat_map(ChangeBatch::operations)
            .filter_map(Operation::target)
            .map(TargetElement::element_ref)
            .collect();

        for batch in batches {
            for operation in batch.operations() {
                entries.push(render(operation, &mut next_id, self.manual_review));
                let Some(target) = operation.target() else {
                    continue;
                };
                if target.kind() == ElementKind::Node {
                    continue;
                }
                for reference in target.references() {
                    let Some(child) = batch.context().get(&reference) else {
                        continue;
                    };
                    if emitted.insert(reference) {
                        entries.push(ChangeEntry {
                            action: ChangeAction::Output,
                            element: EmittedElement::existing(child, child.tags.clone(), None),
                        });
                    }
                }
            }
        }

        let change_count = batches.iter().map(ChangeBatch::change_count).sum();
        let document = ChangeDocument {
            label: label.into(),
            units: batches.iter().map(|batch| batch.unit().clone()).collect(),
            entries,
            change_count,
        };
        self.route(document)
    }

    /// Decide where `document` goes.
    ///
    /// In review mode every document with changes goes to manual upload.
    #[must_use]
    pub fn route(&self, document: ChangeDocument) -> RoutedDocument {
        let routing = if document.change_count == 0 {
            Routing::NoChanges
        } else if self.manual_review {
            info!("{}: {} change(s) held for review", document.label, document.change_count);
            Routing::ManualUpload
        } else if document.change_count > self.budget {
            warn!(
                "{}: {} changes exceed the budget of {}; routing to manual upload",
                document.label, document.change_count, self.budget
            );
            Routing::ManualUpload
        } else {
            info!("{}: {} change(s) ready for upload", document.label, document.change_count);
            Routing::Upload
        };
        RoutedDocument { document, routing }
    }
}

fn render(operation: &Operation, next_id: &mut i64, manual_review: bool) -> ChangeEntry {
    match operation {
        Operation::Create { node, .. } => {
            let id = *next_id;
            *next_id -= 1;
            ChangeEntry {
                action: ChangeAction::Create,
                element: EmittedElement {
                    kind: ElementKind::Node,
                    id,
                    meta: None,
                    lat: Some(node.location.y),
                    lon: Some(node.location.x),
                    nodes: Vec::new(),
                    members: Vec::new(),
                    tags: node.tags.clone(),
                },
            }
        }
        Operation::Modify {
            element,
            tags,
            location,
            ..
        } => ChangeEntry {
            action: ChangeAction::Modify,
            element: EmittedElement::existing(element, tags.clone(), *location),
        },
        Operation::Delete { element } if manual_review => {
            let mut tags = element.tags.clone();
            tags.insert(REVIEW_DELETE.to_owned(), "yes".to_owned());
            ChangeEntry {
                action: ChangeAction::Output,
                element: EmittedElement::existing(element, tags, None),
            }
        }
        Operation::Delete { element } => ChangeEntry {
            action: ChangeAction::Delete,
            element: EmittedElement::existing(element, element.tags.clone(), None),
        },
        Operation::Output { element, .. } => ChangeEntry {
            action: ChangeAction::Output,
            element: EmittedElement::existing(element, element.tags.clone(), None),
        },
    }
}
