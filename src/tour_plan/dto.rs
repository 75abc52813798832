use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPlanRequest {
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub duration: String,
    pub interests: Option<String>,
    pub budget: Option<String>,
    pub travel_style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimatedCosts {
    pub accommodation: String,
    pub food: String,
    pub transportation: String,
    pub activities: String,
    pub total: String,
}

/// One itinerary day. `activities` is whatever the model produced (text or list).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlan {
    pub day: i64,
    pub activities: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPlan {
    pub destination: String,
    pub original_destination: String,
    pub summary: String,
    pub best_time_to_visit: String,
    pub places_to_visit: Vec<Place>,
    pub cultural_notes: String,
    pub transportation_tips: String,
    pub accommodation_suggestions: String,
    pub food_recommendations: String,
    pub estimated_costs: EstimatedCosts,
    pub itinerary_suggestion: Vec<DayPlan>,
}

#[derive(Debug, Serialize)]
pub struct TourPlanResponse {
    pub success: bool,
    pub data: TourPlan,
}
