//! Groups and the user records that make someone a member of one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role a user holds inside a single group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Member,
    Admin,
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRole::Member => write!(f, "member"),
            GroupRole::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for GroupRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "member" => Ok(GroupRole::Member),
            "admin" => Ok(GroupRole::Admin),
            _ => Err(format!(
                "Invalid group role '{}'. Valid options: member, admin",
                s
            )),
        }
    }
}

/// A group of users that documents can be shared with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
    /// Role of the requesting user in this group, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_role: Option<GroupRole>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            member_count: 0,
            created_at: Utc::now(),
            viewer_role: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_viewer_role(mut self, role: GroupRole) -> Self {
        self.viewer_role = Some(role);
        self
    }
}

/// Links a user to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUser {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
    pub created_at: DateTime<Utc>,
}

impl GroupUser {
    pub fn new(group_id: Uuid, user_id: Uuid, role: GroupRole) -> Self {
        Self {
            group_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}
