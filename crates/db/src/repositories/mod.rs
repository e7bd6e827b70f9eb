//! Repository functions for data access.
//!
//! Repositories are free functions generic over the connection so the
//! same code runs inside a workflow's database transaction or on a bare
//! connection. They return [`RepoError`]; workflows map it onto the
//! application error surface.

pub mod accounts;
pub mod companies;
pub mod payments;
pub mod promotions;
pub mod route_passes;
pub mod tickets;
pub mod transactions;
pub mod transfers;
pub mod trips;

use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use farebox_shared::AppError;

/// Repository failures.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity name.
        entity: &'static str,
        /// The missing id.
        id: Uuid,
    },

    /// A stored blob failed to parse.
    #[error("Corrupt {entity} record {id}: {reason}")]
    Corrupt {
        /// Entity name.
        entity: &'static str,
        /// The offending id.
        id: Uuid,
        /// Parse failure description.
        reason: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepoError {
    /// Shorthand for a missing row.
    #[must_use]
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { .. } => Self::NotFound(err.to_string()),
            RepoError::Corrupt { .. } => Self::Internal(err.to_string()),
            RepoError::Database(e) => Self::Database(e.to_string()),
        }
    }
}
