//! Data-access contracts consumed by the access resolver.
//!
//! Implementations live with the storage engine; the resolver only sees these
//! traits, so it can be driven by SQLite in production and by in-memory fakes
//! in tests.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{CollectionStructure, Document, Group, GroupMembership};

/// A data-access call failed.
#[derive(Debug, Error)]
#[error("data store unavailable: {0}")]
pub struct StoreError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

/// Offset/limit window over a stably ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }
}

/// One direct grant together with the group it belongs to.
#[derive(Debug, Clone)]
pub struct GrantRow {
    pub membership: GroupMembership,
    pub group: Group,
}

#[derive(Debug, Clone, Default)]
pub struct GrantPage {
    pub rows: Vec<GrantRow>,
    /// Number of matching grants across all pages.
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub include_drafts: bool,
}

pub trait MembershipStore {
    /// Lists direct document grants (`document_id` set, `source_id` unset) of
    /// groups the user belongs to, optionally restricted to one group.
    ///
    /// Rows are ordered by creation time then id so that pages are stable.
    fn list_direct_document_grants(
        &self,
        group_id: Option<Uuid>,
        user_id: Uuid,
        page: Page,
    ) -> impl Future<Output = Result<GrantPage, StoreError>> + Send;
}

pub trait DocumentResolver {
    /// Loads the documents in `ids`, annotated with the user's access.
    ///
    /// Unknown ids are skipped.
    fn resolve_documents(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        options: ResolveOptions,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;
}

pub trait CollectionResolver {
    /// Loads the id, sort and document structure of the collections in `ids`.
    ///
    /// Unknown ids are skipped.
    fn resolve_collections_minimal(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<CollectionStructure>, StoreError>> + Send;
}

impl<T: MembershipStore + Sync + ?Sized> MembershipStore for &T {
    fn list_direct_document_grants(
        &self,
        group_id: Option<Uuid>,
        user_id: Uuid,
        page: Page,
    ) -> impl Future<Output = Result<GrantPage, StoreError>> + Send {
        (**self).list_direct_document_grants(group_id, user_id, page)
    }
}

impl<T: DocumentResolver + Sync + ?Sized> DocumentResolver for &T {
    fn resolve_documents(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        options: ResolveOptions,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send {
        (**self).resolve_documents(ids, user_id, options)
    }
}

impl<T: CollectionResolver + Sync + ?Sized> CollectionResolver for &T {
    fn resolve_collections_minimal(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<CollectionStructure>, StoreError>> + Send {
        (**self).resolve_collections_minimal(ids)
    }
}
