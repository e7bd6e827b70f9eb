//! `SeaORM` Entity for the trips table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trips")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub route_id: Uuid,
    /// Service date/time of the trip.
    pub date: DateTimeWithTimeZone,
    pub price: Decimal,
    pub seats_available: i32,
    pub is_running: bool,
    /// Booking window blob: `{windowType, windowSize}`.
    pub booking_info: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::routes::Entity",
        from = "Column::RouteId",
        to = "super::routes::Column::Id"
    )]
    Routes,
    #[sea_orm(has_many = "super::trip_stops::Entity")]
    TripStops,
}

impl Related<super::routes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Routes.def()
    }
}

impl Related<super::trip_stops::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TripStops.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
