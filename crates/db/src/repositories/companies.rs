//! Transport company lookup.

use sea_orm::{ConnectionTrait, EntityTrait};
use uuid::Uuid;

use farebox_shared::config::GatewayMode;

use crate::entities::companies;

use super::RepoError;

/// Loads a company.
///
/// # Errors
///
/// Returns `NotFound` when the company does not exist.
pub async fn get<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<companies::Model, RepoError> {
    companies::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| RepoError::not_found("Company", id))
}

/// The merchant destination for the configured gateway mode.
#[must_use]
pub fn merchant_destination(company: &companies::Model, mode: GatewayMode) -> Option<String> {
    match mode {
        GatewayMode::Live => company.merchant_id.clone(),
        GatewayMode::Test => company.sandbox_merchant_id.clone(),
    }
}
