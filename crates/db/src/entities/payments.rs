//! `SeaORM` Entity for the payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Gateway charge id, once the charge succeeds.
    pub payment_resource: Option<String>,
    /// The gateway's charge record, or its error on failure.
    pub data: Option<Json>,
    /// Carries `isMicro`.
    pub options: Json,
    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether the charge used the micro fee schedule.
    #[must_use]
    pub fn is_micro(&self) -> bool {
        self.options
            .get("isMicro")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
