use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Permission level carried by a grant. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    ReadWrite,
    Admin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::ReadWrite => write!(f, "read_write"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "read_write" | "read-write" => Ok(Permission::ReadWrite),
            "admin" => Ok(Permission::Admin),
            _ => Err(format!(
                "Invalid permission '{}'. Valid options: read, read_write, admin",
                s
            )),
        }
    }
}

/// A sharing grant between a group and a document or collection.
///
/// A grant with `source_id` set was derived from another grant (for example a
/// share on a parent document propagated to its children).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembership {
    pub id: Uuid,
    pub group_id: Uuid,
    pub document_id: Option<Uuid>,
    pub collection_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
    pub permission: Permission,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl GroupMembership {
    /// A direct grant of `document_id` to `group_id`.
    pub fn for_document(
        group_id: Uuid,
        document_id: Uuid,
        permission: Permission,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            document_id: Some(document_id),
            collection_id: None,
            source_id: None,
            permission,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// A grant on `document_id` derived from this one.
    pub fn derive_for(&self, document_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id: self.group_id,
            document_id: Some(document_id),
            collection_id: None,
            source_id: Some(self.id),
            permission: self.permission,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }

    /// True for an explicit group to document share.
    pub fn is_direct_grant(&self) -> bool {
        self.document_id.is_some() && self.source_id.is_none()
    }
}
