use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "crate::dates::iso_date")]
    pub start_date: Date,
    #[serde(with = "crate::dates::iso_date")]
    pub end_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A geocoded stop; `order` is its 0-based position in the itinerary.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub location_title: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "order")]
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrip {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub start_date: Date,
    pub end_date: Date,
}
