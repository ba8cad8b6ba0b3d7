//! Per-entity capability sets for the requesting user.
//!
//! Policies are computed fresh on every request and never stored. Membership
//! policies depend on the document and group they point at, so callers pass
//! every resolved entity in a single call.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::models::{Document, Group, GroupMembership, GroupRole, Permission, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Ability {
    Read,
    Comment,
    Update,
    Share,
    ManageUsers,
    Delete,
}

pub type Abilities = BTreeMap<Ability, bool>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyEntry {
    pub id: Uuid,
    pub abilities: Abilities,
}

impl PolicyEntry {
    pub fn allows(&self, ability: Ability) -> bool {
        self.abilities.get(&ability).copied().unwrap_or(false)
    }
}

/// Any entity a policy can be computed for.
#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    Document(&'a Document),
    Membership(&'a GroupMembership),
    Group(&'a Group),
}

impl Entity<'_> {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Document(document) => document.id,
            Entity::Membership(membership) => membership.id,
            Entity::Group(group) => group.id,
        }
    }
}

/// Computes one policy per distinct entity id, in first-seen order.
pub fn compute_policies(user: &User, entities: &[Entity<'_>]) -> Vec<PolicyEntry> {
    let mut documents: HashMap<Uuid, &Document> = HashMap::new();
    let mut groups: HashMap<Uuid, &Group> = HashMap::new();
    for entity in entities {
        match entity {
            Entity::Document(document) => {
                documents.entry(document.id).or_insert(*document);
            }
            Entity::Group(group) => {
                groups.entry(group.id).or_insert(*group);
            }
            Entity::Membership(_) => {}
        }
    }

    let mut seen = HashSet::new();
    entities
        .iter()
        .filter(|entity| seen.insert(entity.id()))
        .map(|entity| PolicyEntry {
            id: entity.id(),
            abilities: match entity {
                Entity::Document(document) => document_abilities(user, document),
                Entity::Group(group) => group_abilities(user, group),
                Entity::Membership(membership) => membership_abilities(
                    user,
                    membership,
                    membership.document_id.and_then(|id| documents.get(&id).copied()),
                    groups.get(&membership.group_id).copied(),
                ),
            },
        })
        .collect()
}

pub fn document_abilities(user: &User, document: &Document) -> Abilities {
    let permission = document.access.effective();
    let is_creator = document.created_by == user.id;
    let is_doc_admin = permission == Some(Permission::Admin);

    let read = user.is_admin() || permission.is_some();
    let update = !document.is_archived()
        && !user.is_viewer()
        && (user.is_admin() || permission >= Some(Permission::ReadWrite));
    let share = update && !document.is_draft();
    let manage_users = !document.is_archived() && (user.is_admin() || is_creator || is_doc_admin);
    let delete = user.is_admin() || is_creator || is_doc_admin;

    BTreeMap::from([
        (Ability::Read, read),
        (Ability::Comment, read),
        (Ability::Update, update),
        (Ability::Share, share),
        (Ability::ManageUsers, manage_users),
        (Ability::Delete, delete),
    ])
}

pub fn group_abilities(user: &User, group: &Group) -> Abilities {
    let group_admin = user.is_admin() || group.viewer_role == Some(GroupRole::Admin);

    BTreeMap::from([
        (Ability::Read, user.is_admin() || group.viewer_role.is_some()),
        (Ability::Update, group_admin),
        (Ability::ManageUsers, group_admin),
        (Ability::Delete, user.is_admin()),
    ])
}

pub fn membership_abilities(
    user: &User,
    membership: &GroupMembership,
    document: Option<&Document>,
    group: Option<&Group>,
) -> Abilities {
    debug_assert!(document.map_or(true, |d| Some(d.id) == membership.document_id));

    let document = document.map(|d| document_abilities(user, d));
    let group = group.map(|g| group_abilities(user, g));
    let allowed = |abilities: &Option<Abilities>, ability: Ability| {
        abilities
            .as_ref()
            .and_then(|a| a.get(&ability).copied())
            .unwrap_or(false)
    };

    let read = allowed(&group, Ability::Read) || allowed(&document, Ability::Read);
    let update = user.is_admin() || allowed(&document, Ability::ManageUsers);
    let delete = update || allowed(&group, Ability::Update);

    BTreeMap::from([
        (Ability::Read, read),
        (Ability::Update, update),
        (Ability::Delete, delete),
    ])
}
