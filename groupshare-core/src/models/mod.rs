mod collection;
mod document;
mod group;
mod membership;
mod user;

pub use collection::{
    Collection, CollectionStructure, Sort, SortDirection, SortField, StructureError,
};
pub use document::{Document, DocumentAccess};
pub use group::{Group, GroupRole, GroupUser};
pub use membership::{GroupMembership, Permission};
pub use user::{User, UserRole};
