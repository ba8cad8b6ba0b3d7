//! Resolver error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by [`crate::AccessResolver`].
///
/// Missing documents, missing collections and documents absent from their
/// collection tree are handled by omission and never reach this type.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}
