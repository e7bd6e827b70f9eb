//! Database layer with `SeaORM` entities, repositories and workflow
//! orchestrators.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for the ledger schema
//! - Repository functions for data access
//! - The sale, purchase, refund and cancellation workflows, each owning
//!   its database transaction and isolation level

pub mod entities;
pub mod repositories;
pub mod workflows;

pub use repositories::RepoError;
pub use workflows::{
    RefundWorkflow, RoutePassPurchaseWorkflow, SaleWorkflow, UndoPlan,
};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use farebox_shared::config::DatabaseConfig;

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections);
    Database::connect(options).await
}
