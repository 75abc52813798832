use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        AddLocationRequest, CreateTripRequest, ItineraryResponse, LocationResponse, PlaceResponse,
        ReorderRequest, ReverseGeocodeQuery, TripDetailResponse, TripListResponse, TripResponse,
    },
    repo_types::{Location, Trip},
    services::{self, TripError},
};
use crate::{
    auth::services::AuthUser,
    error::AppError,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips))
        .route("/trips/:id", get(get_trip))
        .route("/geocode/reverse", get(reverse_geocode))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/:id/locations", post(add_location))
        .route("/trips/:id/itinerary", put(reorder_itinerary))
}

impl From<TripError> for AppError {
    fn from(err: TripError) -> Self {
        match err {
            TripError::MissingFields
            | TripError::InvalidDates
            | TripError::EndBeforeStart
            | TripError::MissingAddress
            | TripError::InvalidCoordinates
            | TripError::ItineraryMismatch => AppError::BadRequest(err.to_string()),
            TripError::NotFound => AppError::NotFound(err.to_string()),
            TripError::GeocodingNotConfigured => AppError::Unavailable(err.to_string()),
            TripError::NoMatch => AppError::Upstream(err.to_string()),
            TripError::Geocoding(ref e) => {
                tracing::error!(error = ?e, "geocoding request failed");
                AppError::Upstream(err.to_string())
            }
            TripError::Store(e) => AppError::Other(e),
        }
    }
}

#[instrument(skip(state))]
pub async fn list_trips(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TripListResponse>, AppError> {
    let trips = Trip::list_by_user(&state.db, user_id).await?;
    let (upcoming, past) = services::split_by_start(trips, OffsetDateTime::now_utc().date());
    Ok(Json(TripListResponse {
        success: true,
        upcoming,
        past,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<CreateTripRequest>,
) -> Result<Json<TripResponse>, AppError> {
    let new = services::validate_new_trip(&payload).inspect_err(|e| {
        warn!(error = %e, %user_id, "rejected trip");
    })?;
    let trip = Trip::create(&state.db, user_id, &new).await?;
    info!(trip_id = %trip.id, %user_id, "trip created");
    Ok(Json(TripResponse {
        success: true,
        trip,
    }))
}

#[instrument(skip(state))]
pub async fn get_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<TripDetailResponse>, AppError> {
    let trip = services::load_trip(&state.db, user_id, id).await?;
    let locations = Location::list_by_trip(&state.db, trip.id).await?;
    Ok(Json(TripDetailResponse {
        success: true,
        trip,
        locations,
    }))
}

#[instrument(skip(state, payload))]
pub async fn add_location(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AddLocationRequest>,
) -> Result<Json<LocationResponse>, AppError> {
    let location = services::add_location(
        &state.db,
        state.geocoder.as_deref(),
        user_id,
        id,
        &payload.address,
    )
    .await?;
    Ok(Json(LocationResponse {
        success: true,
        location,
    }))
}

#[instrument(skip(state))]
pub async fn reverse_geocode(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    ApiQuery(query): ApiQuery<ReverseGeocodeQuery>,
) -> Result<Json<PlaceResponse>, AppError> {
    services::validate_coordinates(query.lat, query.lng)?;
    let place = services::locate(state.geocoder.as_deref(), query.lat, query.lng).await;
    Ok(Json(PlaceResponse {
        success: true,
        place,
    }))
}

#[instrument(skip(state, payload))]
pub async fn reorder_itinerary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ReorderRequest>,
) -> Result<Json<ItineraryResponse>, AppError> {
    let locations =
        services::reorder_itinerary(&state.db, user_id, id, &payload.location_ids).await?;
    Ok(Json(ItineraryResponse {
        success: true,
        locations,
    }))
}
