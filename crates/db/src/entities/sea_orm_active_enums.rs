//! Database enum mappings and conversions to the core domain enums.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use farebox_core::ledger;
use farebox_core::promotion::PromoScope as CorePromoScope;

/// Transaction classification.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum TransactionType {
    #[sea_orm(string_value = "ticketPurchase")]
    TicketPurchase,
    #[sea_orm(string_value = "routePassPurchase")]
    RoutePassPurchase,
    #[sea_orm(string_value = "refundPayment")]
    RefundPayment,
}

/// Line-item classification.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ItemType {
    #[sea_orm(string_value = "ticketSale")]
    TicketSale,
    #[sea_orm(string_value = "ticketRefund")]
    TicketRefund,
    #[sea_orm(string_value = "routePass")]
    RoutePass,
    #[sea_orm(string_value = "discount")]
    Discount,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "account")]
    Account,
}

/// Ticket lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum TicketStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "valid")]
    Valid,
    #[sea_orm(string_value = "void")]
    Void,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

/// Route-pass lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum RoutePassStatus {
    #[sea_orm(string_value = "valid")]
    Valid,
    #[sea_orm(string_value = "void")]
    Void,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "refunded")]
    Refunded,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Creator identity scope.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum CreatorScope {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "superadmin")]
    Superadmin,
    #[sea_orm(string_value = "driver")]
    Driver,
    #[sea_orm(string_value = "system")]
    System,
}

/// Which sale items a promotion applies to.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum PromoScope {
    #[sea_orm(string_value = "ticket")]
    Ticket,
    #[sea_orm(string_value = "routePass")]
    RoutePass,
}

impl From<ledger::TransactionType> for TransactionType {
    fn from(value: ledger::TransactionType) -> Self {
        match value {
            ledger::TransactionType::TicketPurchase => Self::TicketPurchase,
            ledger::TransactionType::RoutePassPurchase => Self::RoutePassPurchase,
            ledger::TransactionType::RefundPayment => Self::RefundPayment,
        }
    }
}

impl From<ledger::ItemType> for ItemType {
    fn from(value: ledger::ItemType) -> Self {
        match value {
            ledger::ItemType::TicketSale => Self::TicketSale,
            ledger::ItemType::TicketRefund => Self::TicketRefund,
            ledger::ItemType::RoutePass => Self::RoutePass,
            ledger::ItemType::Discount => Self::Discount,
            ledger::ItemType::Payment => Self::Payment,
            ledger::ItemType::Transfer => Self::Transfer,
            ledger::ItemType::Account => Self::Account,
        }
    }
}

impl From<ItemType> for ledger::ItemType {
    fn from(value: ItemType) -> Self {
        match value {
            ItemType::TicketSale => Self::TicketSale,
            ItemType::TicketRefund => Self::TicketRefund,
            ItemType::RoutePass => Self::RoutePass,
            ItemType::Discount => Self::Discount,
            ItemType::Payment => Self::Payment,
            ItemType::Transfer => Self::Transfer,
            ItemType::Account => Self::Account,
        }
    }
}

impl From<ledger::TicketStatus> for TicketStatus {
    fn from(value: ledger::TicketStatus) -> Self {
        match value {
            ledger::TicketStatus::Pending => Self::Pending,
            ledger::TicketStatus::Valid => Self::Valid,
            ledger::TicketStatus::Void => Self::Void,
            ledger::TicketStatus::Failed => Self::Failed,
            ledger::TicketStatus::Refunded => Self::Refunded,
        }
    }
}

impl From<TicketStatus> for ledger::TicketStatus {
    fn from(value: TicketStatus) -> Self {
        match value {
            TicketStatus::Pending => Self::Pending,
            TicketStatus::Valid => Self::Valid,
            TicketStatus::Void => Self::Void,
            TicketStatus::Failed => Self::Failed,
            TicketStatus::Refunded => Self::Refunded,
        }
    }
}

impl From<ledger::RoutePassStatus> for RoutePassStatus {
    fn from(value: ledger::RoutePassStatus) -> Self {
        match value {
            ledger::RoutePassStatus::Valid => Self::Valid,
            ledger::RoutePassStatus::Void => Self::Void,
            ledger::RoutePassStatus::Expired => Self::Expired,
            ledger::RoutePassStatus::Refunded => Self::Refunded,
            ledger::RoutePassStatus::Failed => Self::Failed,
        }
    }
}

impl From<RoutePassStatus> for ledger::RoutePassStatus {
    fn from(value: RoutePassStatus) -> Self {
        match value {
            RoutePassStatus::Valid => Self::Valid,
            RoutePassStatus::Void => Self::Void,
            RoutePassStatus::Expired => Self::Expired,
            RoutePassStatus::Refunded => Self::Refunded,
            RoutePassStatus::Failed => Self::Failed,
        }
    }
}

impl From<ledger::CreatorScope> for CreatorScope {
    fn from(value: ledger::CreatorScope) -> Self {
        match value {
            ledger::CreatorScope::User => Self::User,
            ledger::CreatorScope::Admin => Self::Admin,
            ledger::CreatorScope::Superadmin => Self::Superadmin,
            ledger::CreatorScope::Driver => Self::Driver,
            ledger::CreatorScope::System => Self::System,
        }
    }
}

impl From<PromoScope> for CorePromoScope {
    fn from(value: PromoScope) -> Self {
        match value {
            PromoScope::Ticket => Self::Ticket,
            PromoScope::RoutePass => Self::RoutePass,
        }
    }
}
