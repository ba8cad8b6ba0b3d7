use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::membership::Permission;

/// Per-user access annotations loaded alongside a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentAccess {
    /// Permission from a direct share with the user.
    pub user_permission: Option<Permission>,
    /// Permissions from every group grant (direct or derived) reaching the user.
    pub group_permissions: Vec<Permission>,
    /// Permission the user holds on the owning collection.
    pub collection_permission: Option<Permission>,
}

impl DocumentAccess {
    /// Strongest permission across all sources.
    pub fn effective(&self) -> Option<Permission> {
        self.group_permissions
            .iter()
            .copied()
            .chain(self.user_permission)
            .chain(self.collection_permission)
            .max()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub collection_id: Option<Uuid>,
    pub parent_document_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub access: DocumentAccess,
}

impl Document {
    /// Creates a new draft document.
    pub fn new(title: impl Into<String>, created_by: Uuid) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            url: Self::url_for(id),
            collection_id: None,
            parent_document_id: None,
            created_by,
            created_at: now,
            updated_at: now,
            published_at: None,
            archived_at: None,
            access: DocumentAccess::default(),
        }
    }

    pub fn url_for(id: Uuid) -> String {
        format!("/doc/{}", id)
    }

    pub fn in_collection(mut self, collection_id: Uuid) -> Self {
        self.collection_id = Some(collection_id);
        self
    }

    pub fn with_parent(mut self, parent_document_id: Uuid) -> Self {
        self.parent_document_id = Some(parent_document_id);
        self
    }

    pub fn published(mut self) -> Self {
        self.published_at = Some(self.created_at);
        self
    }

    pub fn with_access(mut self, access: DocumentAccess) -> Self {
        self.access = access;
        self
    }

    pub fn is_draft(&self) -> bool {
        self.published_at.is_none()
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}
