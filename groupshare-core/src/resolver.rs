//! Group-based document access resolution.
//!
//! Given a user and an optional group filter, the resolver turns one page of
//! direct group grants into a self-contained snapshot: the granted documents,
//! their subtrees within their collections, the groups involved, and a policy
//! for every entity in the snapshot.
//!
//! ```text
//! grants ──► documents ──► collections ──► tree fragments ──┐
//!    └─────► groups ───────────────────────────────────────┴─► policies
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::ResolveError;
use crate::models::{CollectionStructure, Document, Group, GroupMembership, User};
use crate::policy::{compute_policies, Entity, PolicyEntry};
use crate::store::{
    CollectionResolver, DocumentResolver, GrantPage, GrantRow, MembershipStore, Page,
    ResolveOptions,
};
use crate::tree::DocumentNode;

#[derive(Debug, Clone, Copy)]
pub struct ListRequest {
    pub group_id: Option<Uuid>,
    pub page: Page,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub offset: u32,
    pub limit: u32,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipsData {
    pub groups: Vec<Group>,
    pub group_memberships: Vec<GroupMembership>,
    pub documents: Vec<Document>,
    /// One fragment per document found in its collection tree, in
    /// `documents` order.
    pub documents_structure: Vec<DocumentNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMembershipsList {
    pub pagination: Pagination,
    pub data: GroupMembershipsData,
    pub policies: Vec<PolicyEntry>,
}

/// Composes the three data-access collaborators into one read-only pipeline.
///
/// Holds no mutable state; every call rebuilds its lookup maps.
#[derive(Debug, Clone)]
pub struct AccessResolver<M, D, C> {
    memberships: M,
    documents: D,
    collections: C,
}

impl<M, D, C> AccessResolver<M, D, C>
where
    M: MembershipStore,
    D: DocumentResolver,
    C: CollectionResolver,
{
    pub fn new(memberships: M, documents: D, collections: C) -> Self {
        Self {
            memberships,
            documents,
            collections,
        }
    }

    /// Lists the documents `user` can see through direct group grants.
    pub async fn list_group_memberships(
        &self,
        user: &User,
        request: &ListRequest,
    ) -> Result<GroupMembershipsList, ResolveError> {
        let GrantPage { mut rows, total } = self
            .memberships
            .list_direct_document_grants(request.group_id, user.id, request.page)
            .await
            .inspect_err(|e| tracing::warn!(user_id = %user.id, "listing grants failed: {}", e))?;

        let fetched = rows.len();
        rows.retain(|row| row.membership.is_direct_grant());
        if rows.len() < fetched {
            tracing::warn!(
                dropped = fetched - rows.len(),
                "membership store returned grants that are not direct document grants"
            );
        }

        let groups = distinct_groups(&rows);
        let group_memberships = distinct_memberships(rows);

        let document_ids = distinct(
            group_memberships
                .iter()
                .filter_map(|membership| membership.document_id),
        );
        let documents = self.resolve_documents(&document_ids, user.id).await?;

        let collection_ids = distinct(documents.iter().filter_map(|doc| doc.collection_id));
        let collections = self.resolve_collections(&collection_ids).await?;

        let documents_structure: Vec<DocumentNode> = documents
            .iter()
            .filter_map(|doc| {
                let collection = collections.get(&doc.collection_id?)?;
                collection.document_tree(doc.id)
            })
            .collect();

        tracing::debug!(
            user_id = %user.id,
            grants = group_memberships.len(),
            groups = groups.len(),
            documents = documents.len(),
            fragments = documents_structure.len(),
            "resolved group memberships"
        );

        let entities: Vec<Entity<'_>> = documents
            .iter()
            .map(Entity::Document)
            .chain(group_memberships.iter().map(Entity::Membership))
            .chain(groups.iter().map(Entity::Group))
            .collect();
        let policies = compute_policies(user, &entities);

        Ok(GroupMembershipsList {
            pagination: Pagination {
                offset: request.page.offset,
                limit: request.page.limit,
                total: Some(total),
            },
            data: GroupMembershipsData {
                groups,
                group_memberships,
                documents,
                documents_structure,
            },
            policies,
        })
    }

    /// Resolves exactly `ids`, returned in the order of `ids`.
    async fn resolve_documents(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
    ) -> Result<Vec<Document>, ResolveError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let options = ResolveOptions {
            include_drafts: true,
        };
        let resolved = self
            .documents
            .resolve_documents(ids, user_id, options)
            .await?;

        let mut by_id: HashMap<Uuid, Document> = HashMap::with_capacity(resolved.len());
        for document in resolved {
            by_id.entry(document.id).or_insert(document);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn resolve_collections(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CollectionStructure>, ResolveError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let collections = self.collections.resolve_collections_minimal(ids).await?;
        Ok(collections
            .into_iter()
            .map(|collection| (collection.id, collection))
            .collect())
    }
}

/// Distinct values in first-seen order.
fn distinct(ids: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn distinct_groups(rows: &[GrantRow]) -> Vec<Group> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.group.id))
        .map(|row| row.group.clone())
        .collect()
}

fn distinct_memberships(rows: Vec<GrantRow>) -> Vec<GroupMembership> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .map(|row| row.membership)
        .filter(|membership| seen.insert(membership.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Collection, DocumentAccess, GroupRole, GroupUser, Permission, Sort, UserRole,
    };
    use crate::policy::Ability;
    use crate::store::StoreError;
    use chrono::{Duration, Utc};

    /// In-memory stand-in for all three data-access contracts.
    #[derive(Default)]
    struct MemoryStore {
        groups: Vec<Group>,
        group_users: Vec<GroupUser>,
        memberships: Vec<GroupMembership>,
        documents: Vec<Document>,
        collections: Vec<Collection>,
    }

    impl MemoryStore {
        fn is_member(&self, group_id: Uuid, user_id: Uuid) -> Option<GroupRole> {
            self.group_users
                .iter()
                .find(|gu| gu.group_id == group_id && gu.user_id == user_id)
                .map(|gu| gu.role)
        }

        fn grant(&mut self, group: &Group, document: &Document) -> GroupMembership {
            let mut membership =
                GroupMembership::for_document(group.id, document.id, Permission::Read, Uuid::new_v4());
            // Distinct, increasing timestamps keep the listing order obvious.
            membership.created_at = Utc::now() + Duration::seconds(self.memberships.len() as i64);
            self.memberships.push(membership.clone());
            membership
        }
    }

    impl MembershipStore for MemoryStore {
        async fn list_direct_document_grants(
            &self,
            group_id: Option<Uuid>,
            user_id: Uuid,
            page: Page,
        ) -> Result<GrantPage, StoreError> {
            let mut matching: Vec<GrantRow> = self
                .memberships
                .iter()
                .filter(|m| m.is_direct_grant())
                .filter(|m| group_id.map_or(true, |g| g == m.group_id))
                .filter_map(|m| {
                    let role = self.is_member(m.group_id, user_id)?;
                    let group = self.groups.iter().find(|g| g.id == m.group_id)?;
                    Some(GrantRow {
                        membership: m.clone(),
                        group: group.clone().with_viewer_role(role),
                    })
                })
                .collect();
            matching.sort_by_key(|row| (row.membership.created_at, row.membership.id));

            let total = matching.len() as u64;
            let rows = matching
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect();
            Ok(GrantPage { rows, total })
        }
    }

    impl DocumentResolver for MemoryStore {
        async fn resolve_documents(
            &self,
            ids: &[Uuid],
            user_id: Uuid,
            options: ResolveOptions,
        ) -> Result<Vec<Document>, StoreError> {
            Ok(self
                .documents
                .iter()
                .filter(|doc| ids.contains(&doc.id))
                .filter(|doc| options.include_drafts || !doc.is_draft())
                .map(|doc| {
                    let group_permissions = self
                        .memberships
                        .iter()
                        .filter(|m| m.document_id == Some(doc.id))
                        .filter(|m| self.is_member(m.group_id, user_id).is_some())
                        .map(|m| m.permission)
                        .collect();
                    doc.clone().with_access(DocumentAccess {
                        group_permissions,
                        ..Default::default()
                    })
                })
                .collect())
        }
    }

    impl CollectionResolver for MemoryStore {
        async fn resolve_collections_minimal(
            &self,
            ids: &[Uuid],
        ) -> Result<Vec<CollectionStructure>, StoreError> {
            Ok(self
                .collections
                .iter()
                .filter(|c| ids.contains(&c.id))
                .map(Collection::structure)
                .collect())
        }
    }

    /// Returns its rows as-is, ignoring the contract's filters.
    struct LeakyStore(Vec<GrantRow>);

    impl MembershipStore for LeakyStore {
        async fn list_direct_document_grants(
            &self,
            _group_id: Option<Uuid>,
            _user_id: Uuid,
            _page: Page,
        ) -> Result<GrantPage, StoreError> {
            Ok(GrantPage {
                rows: self.0.clone(),
                total: self.0.len() as u64,
            })
        }
    }

    struct FailingStore;

    impl MembershipStore for FailingStore {
        async fn list_direct_document_grants(
            &self,
            _group_id: Option<Uuid>,
            _user_id: Uuid,
            _page: Page,
        ) -> Result<GrantPage, StoreError> {
            Err(StoreError::new("connection refused"))
        }
    }

    struct Fixture {
        store: MemoryStore,
        user: User,
        group: Group,
        d1: Document,
        d2: Document,
        collection_id: Uuid,
    }

    /// User U in group G; G has a direct grant to D1; C1 is `[D1 -> [D2]]`.
    fn fixture() -> Fixture {
        let user = User::new("U", "u@example.com");
        let group = Group::new("G");
        let mut collection = Collection::new("C1").with_sort(Sort::default());
        let d1 = Document::new("D1", user.id).in_collection(collection.id).published();
        let d2 = Document::new("D2", user.id)
            .in_collection(collection.id)
            .with_parent(d1.id)
            .published();

        let mut structure = collection.structure();
        structure
            .add_document(DocumentNode::new(d1.id, "D1", d1.url.clone()), None, None)
            .unwrap();
        structure
            .add_document(DocumentNode::new(d2.id, "D2", d2.url.clone()), Some(d1.id), None)
            .unwrap();
        collection.document_structure = structure.document_structure;

        let mut store = MemoryStore {
            groups: vec![group.clone()],
            group_users: vec![GroupUser::new(group.id, user.id, GroupRole::Member)],
            documents: vec![d1.clone(), d2.clone()],
            collections: vec![collection.clone()],
            ..Default::default()
        };
        store.grant(&group, &d1);

        Fixture {
            store,
            user,
            group,
            d1,
            d2,
            collection_id: collection.id,
        }
    }

    fn request(group_id: Option<Uuid>, offset: u32, limit: u32) -> ListRequest {
        ListRequest {
            group_id,
            page: Page::new(offset, limit),
        }
    }

    async fn list(
        store: &MemoryStore,
        user: &User,
        request: ListRequest,
    ) -> GroupMembershipsList {
        AccessResolver::new(store, store, store)
            .list_group_memberships(user, &request)
            .await
            .unwrap()
    }

    fn ids<T>(items: &[T], id: impl Fn(&T) -> Uuid) -> Vec<Uuid> {
        items.iter().map(id).collect()
    }

    #[tokio::test]
    async fn test_single_grant_with_subtree() {
        let f = fixture();
        let result = list(&f.store, &f.user, request(None, 0, 25)).await;

        assert_eq!(ids(&result.data.documents, |d| d.id), vec![f.d1.id]);
        assert_eq!(ids(&result.data.groups, |g| g.id), vec![f.group.id]);
        assert_eq!(result.data.group_memberships.len(), 1);
        assert_eq!(result.data.documents_structure.len(), 1);

        let fragment = &result.data.documents_structure[0];
        assert_eq!(fragment.id, f.d1.id);
        assert_eq!(ids(&fragment.children, |n| n.id), vec![f.d2.id]);
        assert!(fragment.children[0].children.is_empty());

        assert_eq!(result.pagination.total, Some(1));
    }

    #[tokio::test]
    async fn test_policies_cover_every_entity_once() {
        let mut f = fixture();
        let other_group = Group::new("Other");
        f.store.groups.push(other_group.clone());
        f.store
            .group_users
            .push(GroupUser::new(other_group.id, f.user.id, GroupRole::Admin));
        let d1 = f.d1.clone();
        f.store.grant(&other_group, &d1);

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;

        let mut expected: Vec<Uuid> = ids(&result.data.documents, |d| d.id);
        expected.extend(ids(&result.data.group_memberships, |m| m.id));
        expected.extend(ids(&result.data.groups, |g| g.id));
        assert_eq!(expected.len(), 1 + 2 + 2);

        let policy_ids = ids(&result.policies, |p| p.id);
        assert_eq!(policy_ids, expected);

        // Two grants to the same document resolve it once.
        assert_eq!(result.data.documents.len(), 1);
        assert_eq!(result.data.documents_structure.len(), 1);

        let group_policy = result
            .policies
            .iter()
            .find(|p| p.id == other_group.id)
            .unwrap();
        assert!(group_policy.allows(Ability::ManageUsers));
    }

    #[tokio::test]
    async fn test_derived_grant_excluded() {
        let mut f = fixture();
        let direct = f.store.memberships[0].clone();
        f.store.memberships.push(direct.derive_for(f.d2.id));

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;

        assert_eq!(result.data.group_memberships.len(), 1);
        assert!(result
            .data
            .group_memberships
            .iter()
            .all(|m| m.is_direct_grant()));
        assert_eq!(ids(&result.data.documents, |d| d.id), vec![f.d1.id]);
    }

    #[tokio::test]
    async fn test_resolver_drops_rows_that_are_not_direct_grants() {
        let f = fixture();
        let direct = f.store.memberships[0].clone();
        let derived = direct.derive_for(f.d1.id);
        let group = f.group.clone().with_viewer_role(GroupRole::Member);
        let rows = vec![
            GrantRow {
                membership: derived,
                group: group.clone(),
            },
            GrantRow {
                membership: direct.clone(),
                group: group.clone(),
            },
            // Same grant twice, as a join fanning out would return it
            GrantRow {
                membership: direct.clone(),
                group,
            },
        ];

        let resolver = AccessResolver::new(LeakyStore(rows), &f.store, &f.store);
        let result = resolver
            .list_group_memberships(&f.user, &request(None, 0, 25))
            .await
            .unwrap();

        assert_eq!(ids(&result.data.group_memberships, |m| m.id), vec![direct.id]);
        assert_eq!(ids(&result.data.groups, |g| g.id), vec![f.group.id]);
        assert_eq!(ids(&result.data.documents, |d| d.id), vec![f.d1.id]);
        assert_eq!(result.data.documents_structure.len(), 1);

        let policy_ids: Vec<Uuid> = result.policies.iter().map(|p| p.id).collect();
        assert_eq!(distinct(policy_ids.iter().copied()), policy_ids);
        assert_eq!(policy_ids.iter().filter(|id| **id == direct.id).count(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_keeps_document_without_fragment() {
        let mut f = fixture();
        f.store.collections.clear();

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;

        assert_eq!(ids(&result.data.documents, |d| d.id), vec![f.d1.id]);
        assert_eq!(result.data.documents[0].collection_id, Some(f.collection_id));
        assert!(result.data.documents_structure.is_empty());
    }

    #[tokio::test]
    async fn test_document_missing_from_tree_or_without_collection() {
        let mut f = fixture();
        let draft = Document::new("Draft", f.user.id).in_collection(f.collection_id);
        let loose = Document::new("Loose", f.user.id).published();
        f.store.documents.push(draft.clone());
        f.store.documents.push(loose.clone());
        let group = f.group.clone();
        f.store.grant(&group, &draft);
        f.store.grant(&group, &loose);

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;

        assert_eq!(
            ids(&result.data.documents, |d| d.id),
            vec![f.d1.id, draft.id, loose.id]
        );
        assert_eq!(ids(&result.data.documents_structure, |n| n.id), vec![f.d1.id]);
    }

    #[tokio::test]
    async fn test_deleted_document_is_omitted() {
        let mut f = fixture();
        f.store.documents.retain(|d| d.id != f.d1.id);

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;

        assert_eq!(result.data.group_memberships.len(), 1);
        assert!(result.data.documents.is_empty());
        assert!(result.data.documents_structure.is_empty());
        assert_eq!(result.policies.len(), 2);
    }

    #[tokio::test]
    async fn test_fragment_roots_are_resolved_documents() {
        let mut f = fixture();
        let d2 = f.d2.clone();
        let group = f.group.clone();
        f.store.grant(&group, &d2);

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;
        let document_ids: HashSet<Uuid> = result.data.documents.iter().map(|d| d.id).collect();

        assert_eq!(result.data.documents_structure.len(), 2);
        for fragment in &result.data.documents_structure {
            assert!(document_ids.contains(&fragment.id));
        }
    }

    #[tokio::test]
    async fn test_group_filter_and_non_member() {
        let mut f = fixture();
        let foreign = Group::new("Foreign");
        f.store.groups.push(foreign.clone());
        let d2 = f.d2.clone();
        f.store.grant(&foreign, &d2);

        let all = list(&f.store, &f.user, request(None, 0, 25)).await;
        assert_eq!(ids(&all.data.groups, |g| g.id), vec![f.group.id]);

        let filtered = list(&f.store, &f.user, request(Some(foreign.id), 0, 25)).await;
        assert!(filtered.data.group_memberships.is_empty());
        assert!(filtered.data.documents.is_empty());
        assert!(filtered.policies.is_empty());
        assert_eq!(filtered.pagination.total, Some(0));
    }

    #[tokio::test]
    async fn test_pagination_is_stable_and_non_overlapping() {
        let mut f = fixture();
        let d2 = f.d2.clone();
        let group = f.group.clone();
        f.store.grant(&group, &d2);

        let first = list(&f.store, &f.user, request(None, 0, 1)).await;
        let second = list(&f.store, &f.user, request(None, 1, 1)).await;
        let both = list(&f.store, &f.user, request(None, 0, 2)).await;

        let first_ids = ids(&first.data.group_memberships, |m| m.id);
        let second_ids = ids(&second.data.group_memberships, |m| m.id);
        assert_eq!(first_ids.len(), 1);
        assert_eq!(second_ids.len(), 1);
        assert_ne!(first_ids, second_ids);

        let mut paged = first_ids.clone();
        paged.extend(second_ids);
        assert_eq!(paged, ids(&both.data.group_memberships, |m| m.id));

        let again = list(&f.store, &f.user, request(None, 0, 1)).await;
        assert_eq!(ids(&again.data.group_memberships, |m| m.id), first_ids);
        assert_eq!(first.pagination.total, Some(2));
    }

    #[tokio::test]
    async fn test_admin_sees_full_document_policy() {
        let mut f = fixture();
        f.user.role = UserRole::Admin;

        let result = list(&f.store, &f.user, request(None, 0, 25)).await;
        let doc_policy = result.policies.iter().find(|p| p.id == f.d1.id).unwrap();
        assert!(doc_policy.allows(Ability::Delete));
        assert!(doc_policy.allows(Ability::Update));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let f = fixture();
        let resolver = AccessResolver::new(FailingStore, &f.store, &f.store);

        let err = resolver
            .list_group_memberships(&f.user, &request(None, 0, 25))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::StoreUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_response_shape() {
        let f = fixture();
        let result = list(&f.store, &f.user, request(None, 0, 25)).await;
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["pagination"]["offset"], 0);
        assert_eq!(json["pagination"]["limit"], 25);
        assert!(json["data"]["groupMemberships"].is_array());
        assert_eq!(
            json["data"]["documentsStructure"][0]["id"],
            f.d1.id.to_string()
        );
        assert!(json["policies"][0]["abilities"].is_object());
    }
}
