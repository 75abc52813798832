use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trips::{
    repo_types::{Location, Trip},
    services::PlaceLabel,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddLocationRequest {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub location_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub success: bool,
    pub trip: Trip,
}

#[derive(Debug, Serialize)]
pub struct TripListResponse {
    pub success: bool,
    pub upcoming: Vec<Trip>,
    pub past: Vec<Trip>,
}

#[derive(Debug, Serialize)]
pub struct TripDetailResponse {
    pub success: bool,
    pub trip: Trip,
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
pub struct LocationResponse {
    pub success: bool,
    pub location: Location,
}

#[derive(Debug, Serialize)]
pub struct ItineraryResponse {
    pub success: bool,
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
pub struct PlaceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub place: PlaceLabel,
}
