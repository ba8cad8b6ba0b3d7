//! Collections and their document structure.
//!
//! The structure is only ever changed through [`CollectionStructure::add_document`]
//! and [`CollectionStructure::remove_document`], which keep node ids unique and
//! the tree acyclic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::membership::Permission;
use crate::tree::{self, DocumentNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Index,
    Title,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "index" => Ok(SortField::Index),
            "title" => Ok(SortField::Title),
            _ => Err(format!(
                "Invalid sort field '{}'. Valid options: index, title",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(format!(
                "Invalid sort direction '{}'. Valid options: asc, desc",
                s
            )),
        }
    }
}

/// Ordering policy for the children of every node in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self.field {
            SortField::Index => "index",
            SortField::Title => "title",
        };
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{} {}", field, direction)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("Document {0} is already in the collection structure")]
    DuplicateNode(Uuid),

    #[error("Parent document {0} is not in the collection structure")]
    ParentNotFound(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Permission every workspace member holds, if any.
    pub permission: Option<Permission>,
    pub sort: Sort,
    pub document_structure: Vec<DocumentNode>,
    pub created_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            permission: None,
            sort: Sort::default(),
            document_structure: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Minimal projection used when extracting document trees.
    pub fn structure(&self) -> CollectionStructure {
        CollectionStructure {
            id: self.id,
            sort: self.sort,
            document_structure: self.document_structure.clone(),
        }
    }
}

/// The id, sort policy and document tree of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStructure {
    pub id: Uuid,
    pub sort: Sort,
    pub document_structure: Vec<DocumentNode>,
}

impl CollectionStructure {
    pub fn new(id: Uuid, sort: Sort) -> Self {
        Self {
            id,
            sort,
            document_structure: Vec::new(),
        }
    }

    /// Subtree rooted at `document_id`, or `None` when the document is not
    /// part of this collection's structure.
    pub fn document_tree(&self, document_id: Uuid) -> Option<DocumentNode> {
        tree::find_subtree(&self.document_structure, document_id)
    }

    pub fn contains(&self, document_id: Uuid) -> bool {
        tree::find_node(&self.document_structure, document_id).is_some()
    }

    /// Inserts `node` at the root or below `parent`.
    ///
    /// With an index sort the node goes to `index` (appended when `None` or
    /// out of range). With a title sort `index` is ignored and the node takes
    /// its sorted position among its siblings.
    pub fn add_document(
        &mut self,
        node: DocumentNode,
        parent: Option<Uuid>,
        index: Option<usize>,
    ) -> Result<(), StructureError> {
        if let Some(duplicate) = std::iter::once(node.id)
            .chain(node.descendant_ids())
            .find(|id| self.contains(*id))
        {
            return Err(StructureError::DuplicateNode(duplicate));
        }

        let sort = self.sort;
        let siblings = match parent {
            Some(parent_id) => {
                &mut tree::find_node_mut(&mut self.document_structure, parent_id)
                    .ok_or(StructureError::ParentNotFound(parent_id))?
                    .children
            }
            None => &mut self.document_structure,
        };

        let position = match sort.field {
            SortField::Index => index.unwrap_or(siblings.len()).min(siblings.len()),
            SortField::Title => {
                let title = node.title.to_lowercase();
                siblings
                    .iter()
                    .position(|sibling| {
                        let other = sibling.title.to_lowercase();
                        match sort.direction {
                            SortDirection::Asc => other > title,
                            SortDirection::Desc => other < title,
                        }
                    })
                    .unwrap_or(siblings.len())
            }
        };
        siblings.insert(position, node);
        Ok(())
    }

    /// Detaches the node for `document_id` together with its subtree.
    pub fn remove_document(&mut self, document_id: Uuid) -> Option<DocumentNode> {
        tree::detach_node(&mut self.document_structure, document_id)
    }
}
