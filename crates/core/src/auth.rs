//! Admin-role assertion collaborator.
//!
//! Role policy lives outside this engine; workflows only need a seam to
//! assert that the caller may act on a company's behalf.

use thiserror::Error;

use farebox_shared::types::CompanyId;
use farebox_shared::AppError;

use crate::ledger::CreatorScope;

/// Credentials presented by a caller.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Identity scope.
    pub scope: CreatorScope,
    /// Admin identifier, for admin-scoped credentials.
    pub admin_id: Option<uuid::Uuid>,
    /// Contact email, when known.
    pub email: Option<String>,
    /// Driver identifier, for driver-scoped credentials.
    pub driver_id: Option<uuid::Uuid>,
}

/// Raised when a caller may not perform an action for a company.
#[derive(Debug, Error)]
#[error("Credentials lack '{action}' for company {company_id}")]
pub struct AuthzError {
    /// The denied action.
    pub action: String,
    /// The company it was attempted against.
    pub company_id: CompanyId,
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

/// External role-policy collaborator.
pub trait AdminAuthz: Send + Sync {
    /// Asserts the credentials may perform `action` for `company_id`.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError` on denial.
    fn assert_admin_role(
        &self,
        credentials: &Credentials,
        action: &str,
        company_id: CompanyId,
    ) -> Result<(), AuthzError>;
}

/// Grants everything. For tests and trusted internal callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AdminAuthz for AllowAll {
    fn assert_admin_role(
        &self,
        _credentials: &Credentials,
        _action: &str,
        _company_id: CompanyId,
    ) -> Result<(), AuthzError> {
        Ok(())
    }
}

/// Denies everything. For tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl AdminAuthz for DenyAll {
    fn assert_admin_role(
        &self,
        _credentials: &Credentials,
        action: &str,
        company_id: CompanyId,
    ) -> Result<(), AuthzError> {
        Err(AuthzError {
            action: action.to_string(),
            company_id,
        })
    }
}
