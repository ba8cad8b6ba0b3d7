//! groupshare core library
//!
//! Domain types and the group-based document access resolver shared by the
//! groupshare server and administration CLI.

pub mod error;
pub mod models;
pub mod policy;
pub mod resolver;
pub mod store;
pub mod tree;

pub use error::ResolveError;
pub use models::{
    Collection, CollectionStructure, Document, DocumentAccess, Group, GroupMembership, GroupRole,
    GroupUser, Permission, Sort, SortDirection, SortField, StructureError, User, UserRole,
};
pub use policy::{compute_policies, Ability, Entity, PolicyEntry};
pub use resolver::{
    AccessResolver, GroupMembershipsData, GroupMembershipsList, ListRequest, Pagination,
};
pub use store::{
    CollectionResolver, DocumentResolver, GrantPage, GrantRow, MembershipStore, Page,
    ResolveOptions, StoreError,
};
pub use tree::{find_subtree, flatten, unflatten, DocumentNode, FlatNode};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
