//! Document trees and subtree extraction.
//!
//! A collection keeps its documents as an ordered forest of [`DocumentNode`]s.
//! Node ids are unique within one collection, so the first match found by
//! [`find_subtree`] is the only match.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::StructureError;

/// One node of a collection's document structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentNode {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    pub fn new(id: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: url.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DocumentNode>) -> Self {
        self.children = children;
        self
    }

    /// Ids of every node below this one, in pre-order.
    pub fn descendant_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::new();
        let mut stack: Vec<&DocumentNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            ids.push(node.id);
            stack.extend(node.children.iter().rev());
        }
        ids
    }
}

impl Drop for DocumentNode {
    // Unlinks descendants one at a time so deep chains do not recurse.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Finds the node with `id` and returns an owned copy of its subtree.
///
/// The walk is depth-first in the forest's own child order and uses an
/// explicit stack, so deep trees cannot exhaust the call stack. Returns `None`
/// for an empty forest or an id that is not present.
pub fn find_subtree(nodes: &[DocumentNode], id: Uuid) -> Option<DocumentNode> {
    find_node(nodes, id).cloned()
}

/// Borrowing variant of [`find_subtree`].
pub fn find_node(nodes: &[DocumentNode], id: Uuid) -> Option<&DocumentNode> {
    let mut stack: Vec<&DocumentNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

/// Index path from the forest root to the node with `id`.
fn path_to(nodes: &[DocumentNode], id: Uuid) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut stack: Vec<(&DocumentNode, usize, usize)> = nodes
        .iter()
        .enumerate()
        .rev()
        .map(|(index, node)| (node, 0, index))
        .collect();
    while let Some((node, depth, index)) = stack.pop() {
        path.truncate(depth);
        path.push(index);
        if node.id == id {
            return Some(path);
        }
        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(i, child)| (child, depth + 1, i)),
        );
    }
    None
}

pub(crate) fn find_node_mut(nodes: &mut [DocumentNode], id: Uuid) -> Option<&mut DocumentNode> {
    let path = path_to(nodes, id)?;
    let (first, rest) = path.split_first()?;
    let mut node = nodes.get_mut(*first)?;
    for &index in rest {
        node = node.children.get_mut(index)?;
    }
    Some(node)
}

pub(crate) fn detach_node(nodes: &mut Vec<DocumentNode>, id: Uuid) -> Option<DocumentNode> {
    let path = path_to(nodes, id)?;
    let (last, parents) = path.split_last()?;
    let mut siblings = nodes;
    for &index in parents {
        siblings = &mut siblings.get_mut(index)?.children;
    }
    Some(siblings.remove(*last))
}

/// One node of a forest written out in pre-order, pointing at its parent.
///
/// This is the storage form of a collection structure: a flat list has no
/// nesting, so readers never hit a depth limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatNode {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub parent_id: Option<Uuid>,
}

/// Writes a forest out in pre-order.
pub fn flatten(nodes: &[DocumentNode]) -> Vec<FlatNode> {
    let mut flat = Vec::new();
    let mut stack: Vec<(&DocumentNode, Option<Uuid>)> =
        nodes.iter().rev().map(|node| (node, None)).collect();
    while let Some((node, parent_id)) = stack.pop() {
        flat.push(FlatNode {
            id: node.id,
            title: node.title.clone(),
            url: node.url.clone(),
            parent_id,
        });
        stack.extend(node.children.iter().rev().map(|child| (child, Some(node.id))));
    }
    flat
}

/// Rebuilds a forest from the output of [`flatten`].
///
/// Fails with [`StructureError::ParentNotFound`] when an entry names a parent
/// that is not one of its preceding ancestors.
pub fn unflatten(entries: Vec<FlatNode>) -> Result<Vec<DocumentNode>, StructureError> {
    let mut roots = Vec::new();
    // Chain of nodes from a root down to the most recent entry
    let mut open: Vec<DocumentNode> = Vec::new();

    for entry in entries {
        match entry.parent_id {
            Some(parent_id) => loop {
                match open.last().map(|node| node.id) {
                    Some(top) if top == parent_id => break,
                    Some(_) => close_last(&mut open, &mut roots),
                    None => return Err(StructureError::ParentNotFound(parent_id)),
                }
            },
            None => {
                while !open.is_empty() {
                    close_last(&mut open, &mut roots);
                }
            }
        }
        open.push(DocumentNode::new(entry.id, entry.title, entry.url));
    }
    while !open.is_empty() {
        close_last(&mut open, &mut roots);
    }
    Ok(roots)
}

fn close_last(open: &mut Vec<DocumentNode>, roots: &mut Vec<DocumentNode>) {
    if let Some(node) = open.pop() {
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}
