//! `SeaORM` entity definitions.

pub mod accounts;
pub mod companies;
pub mod payments;
pub mod promotions;
pub mod route_passes;
pub mod routes;
pub mod sea_orm_active_enums;
pub mod tickets;
pub mod transaction_items;
pub mod transactions;
pub mod transfers;
pub mod trip_stops;
pub mod trips;
