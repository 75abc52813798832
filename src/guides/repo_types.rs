use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guide_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GuideStatus {
    Available,
    Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

/// A local guide profile (`local_guides` row).
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub bio: Option<String>,
    pub experience: i32,
    pub languages: Vec<String>,
    pub status: GuideStatus,
    /// Free-text "<start> to <end>" label of the current booking.
    pub current_trip_id: Option<String>,
    pub rating_value: f64,
    pub rating_count: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub guide_id: Uuid,
    #[serde(with = "crate::dates::iso_date")]
    pub start_date: Date,
    #[serde(with = "crate::dates::iso_date")]
    pub end_date: Date,
    pub status: BookingStatus,
    pub rating: Option<i32>,
    pub review: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailOtp {
    pub email: String,
    pub otp: String,
    pub expires_at: OffsetDateTime,
    pub verified: bool,
    pub created_at: OffsetDateTime,
}

/// Validated guide profile ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGuide {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub bio: Option<String>,
    pub experience: i32,
    pub languages: Vec<String>,
}
