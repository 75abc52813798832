use std::collections::HashSet;

use anyhow::Context;
use serde::Serialize;
use sqlx::PgPool;
use time::Date;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dates::parse_date,
    geocode::{Geocoder, Place},
    trips::{
        dto::CreateTripRequest,
        repo_types::{Location, NewTrip, Trip},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error("Missing trip fields")]
    MissingFields,
    #[error("Invalid trip dates")]
    InvalidDates,
    #[error("End date must not be before start date")]
    EndBeforeStart,
    #[error("Trip not found")]
    NotFound,
    #[error("Missing address")]
    MissingAddress,
    #[error("Geocoding is not configured")]
    GeocodingNotConfigured,
    #[error("No results found for the provided address")]
    NoMatch,
    #[error("Geocoding failed")]
    Geocoding(anyhow::Error),
    #[error("Invalid coordinates")]
    InvalidCoordinates,
    #[error("Location ids must match the trip's locations exactly")]
    ItineraryMismatch,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_new_trip(req: &CreateTripRequest) -> Result<NewTrip, TripError> {
    let (Some(title), Some(start), Some(end)) = (
        non_blank(&req.title),
        non_blank(&req.start_date),
        non_blank(&req.end_date),
    ) else {
        return Err(TripError::MissingFields);
    };
    let start_date = parse_date(start).ok_or(TripError::InvalidDates)?;
    let end_date = parse_date(end).ok_or(TripError::InvalidDates)?;
    if end_date < start_date {
        return Err(TripError::EndBeforeStart);
    }

    Ok(NewTrip {
        title: title.to_string(),
        description: non_blank(&req.description).map(str::to_string),
        image_url: non_blank(&req.image_url).map(str::to_string),
        start_date,
        end_date,
    })
}

/// Split into (upcoming, past) by start date; both newest start first.
pub fn split_by_start(mut trips: Vec<Trip>, today: Date) -> (Vec<Trip>, Vec<Trip>) {
    trips.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    trips.into_iter().partition(|t| t.start_date >= today)
}

pub async fn load_trip(db: &PgPool, user_id: Uuid, trip_id: Uuid) -> Result<Trip, TripError> {
    Trip::find_for_user(db, trip_id, user_id)
        .await?
        .ok_or(TripError::NotFound)
}

pub async fn add_location(
    db: &PgPool,
    geocoder: Option<&dyn Geocoder>,
    user_id: Uuid,
    trip_id: Uuid,
    address: &Option<String>,
) -> Result<Location, TripError> {
    let address = non_blank(address).ok_or(TripError::MissingAddress)?;
    let geocoder = geocoder.ok_or(TripError::GeocodingNotConfigured)?;

    load_trip(db, user_id, trip_id).await?;
    let point = geocoder
        .forward(address)
        .await
        .map_err(TripError::Geocoding)?
        .ok_or_else(|| {
            warn!(%address, "geocoding found nothing");
            TripError::NoMatch
        })?;

    let mut tx = db.begin().await.context("begin tx")?;
    Trip::lock_for_user_tx(&mut tx, trip_id, user_id)
        .await?
        .ok_or(TripError::NotFound)?;
    let location = Location::append_tx(&mut tx, trip_id, &point).await?;
    tx.commit().await.context("commit location")?;

    info!(%trip_id, location_id = %location.id, order = location.sort_order, "location added");
    Ok(location)
}

pub const UNKNOWN_COUNTRY: &str = "Unknown";
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Country and display address for a coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceLabel {
    pub country: String,
    pub formatted_address: String,
}

impl PlaceLabel {
    pub fn unknown() -> Self {
        Self::from(Place::default())
    }
}

impl From<Place> for PlaceLabel {
    fn from(place: Place) -> Self {
        let label = |v: Option<String>, fallback: &str| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            country: label(place.country, UNKNOWN_COUNTRY),
            formatted_address: label(place.formatted_address, UNKNOWN_LOCATION),
        }
    }
}

pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), TripError> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) {
        Ok(())
    } else {
        Err(TripError::InvalidCoordinates)
    }
}

/// Reverse lookup that never fails; anything short of a match resolves to the
/// unknown labels.
pub async fn locate(geocoder: Option<&dyn Geocoder>, lat: f64, lng: f64) -> PlaceLabel {
    let Some(geocoder) = geocoder else {
        warn!("geocoding not configured; reverse lookup skipped");
        return PlaceLabel::unknown();
    };
    match geocoder.reverse(lat, lng).await {
        Ok(Some(place)) => PlaceLabel::from(place),
        Ok(None) => PlaceLabel::unknown(),
        Err(e) => {
            warn!(error = ?e, lat, lng, "reverse geocoding failed");
            PlaceLabel::unknown()
        }
    }
}

/// The requested order must name every current location exactly once.
pub fn validate_reorder(current: &[Uuid], requested: &[Uuid]) -> Result<(), TripError> {
    let wanted: HashSet<&Uuid> = requested.iter().collect();
    let have: HashSet<&Uuid> = current.iter().collect();
    if wanted.len() != requested.len() || current.len() != requested.len() || wanted != have {
        return Err(TripError::ItineraryMismatch);
    }
    Ok(())
}

pub async fn reorder_itinerary(
    db: &PgPool,
    user_id: Uuid,
    trip_id: Uuid,
    ordered_ids: &[Uuid],
) -> Result<Vec<Location>, TripError> {
    let mut tx = db.begin().await.context("begin tx")?;
    Trip::lock_for_user_tx(&mut tx, trip_id, user_id)
        .await?
        .ok_or(TripError::NotFound)?;
    let current = Location::ids_by_trip_tx(&mut tx, trip_id).await?;
    validate_reorder(&current, ordered_ids)?;
    Location::reorder_tx(&mut tx, trip_id, ordered_ids).await?;
    tx.commit().await.context("commit reorder")?;

    info!(%trip_id, stops = ordered_ids.len(), "itinerary reordered");
    Ok(Location::list_by_trip(db, trip_id).await?)
}
