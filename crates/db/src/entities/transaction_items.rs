//! `SeaORM` Entity for the transaction items table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ItemType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub item_type: ItemType,
    /// The entity the line posts against, when any.
    pub item_id: Option<Uuid>,
    /// Exactly one of debit/credit is positive; the other is null.
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub notes: Option<Json>,
}

impl Model {
    /// The debit amount, zero when this is a credit line.
    #[must_use]
    pub fn debit_amount(&self) -> Decimal {
        self.debit.unwrap_or_default()
    }

    /// The credit amount, zero when this is a debit line.
    #[must_use]
    pub fn credit_amount(&self) -> Decimal {
        self.credit.unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
