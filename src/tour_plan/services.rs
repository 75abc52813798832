use serde_json::Value;
use tracing::{info, warn};

use super::{
    dto::{TourPlan, TourPlanRequest},
    llm::{CompletionClient, CompletionError, CompletionRequest},
    normalize::normalize,
};

const SYSTEM_PROMPT: &str =
    "You are a travel expert who provides detailed tour plans in JSON format.";
const TEMPERATURE: f64 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum TourPlanError {
    #[error("Invalid input. Please check your destination and duration.")]
    InvalidInput,
    #[error("API key not configured. Please contact the administrator.")]
    NotConfigured,
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("could not parse tour plan: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Input after validation: trimmed, optional fields dropped when blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanInput {
    pub destination: String,
    pub duration: String,
    pub interests: Option<String>,
    pub budget: Option<String>,
    pub travel_style: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate(req: TourPlanRequest) -> Result<PlanInput, TourPlanError> {
    let destination = req.destination.trim().to_string();
    let duration = req.duration.trim().to_string();
    if destination.chars().count() < 2 || duration.is_empty() {
        return Err(TourPlanError::InvalidInput);
    }
    Ok(PlanInput {
        destination,
        duration,
        interests: present(req.interests),
        budget: present(req.budget),
        travel_style: present(req.travel_style),
    })
}

pub fn build_prompt(input: &PlanInput) -> String {
    let mut prompt = format!(
        "Create a detailed tour plan for {} for a {} trip.\n",
        input.destination, input.duration
    );
    if let Some(interests) = &input.interests {
        prompt.push_str(&format!("The traveler is interested in: {interests}.\n"));
    }
    if let Some(budget) = &input.budget {
        prompt.push_str(&format!("Their budget is: {budget}.\n"));
    }
    if let Some(style) = &input.travel_style {
        prompt.push_str(&format!("Their preferred travel style is: {style}.\n"));
    }
    prompt.push_str(
        r#"
Please provide a detailed response in JSON format with the following structure:
{
  "destination": "Full destination name",
  "summary": "Brief overview of the destination",
  "bestTimeToVisit": "Information about the best seasons or months to visit",
  "placesToVisit": [
    {"name": "Place 1", "description": "Brief description"},
    {"name": "Place 2", "description": "Brief description"}
  ],
  "culturalNotes": "Important cultural information visitors should know",
  "transportationTips": "How to get around efficiently",
  "accommodationSuggestions": "Types of accommodations available at different price points",
  "foodRecommendations": "Must-try local dishes and dining options",
  "estimatedCosts": {
    "accommodation": "Average costs per night",
    "food": "Average daily food costs",
    "transportation": "Local transportation costs",
    "activities": "Average costs for attractions",
    "total": "Estimated total cost for the trip"
  },
  "itinerarySuggestion": [
    {"day": 1, "activities": "Detailed day 1 itinerary"},
    {"day": 2, "activities": "Detailed day 2 itinerary"}
  ]
}
"#,
    );
    prompt.push_str(&format!(
        "\nMake sure to adapt the itinerary days to match the requested duration of {}.\n\
         Provide realistic cost estimates based on the destination and budget level.\n",
        input.duration
    ));
    prompt
}

pub async fn generate_tour_plan(
    client: Option<&dyn CompletionClient>,
    req: TourPlanRequest,
) -> Result<TourPlan, TourPlanError> {
    let input = validate(req).inspect_err(|_| warn!("tour plan input rejected"))?;
    let client = client.ok_or(TourPlanError::NotConfigured)?;

    let content = client
        .complete_json(&CompletionRequest {
            system: SYSTEM_PROMPT.into(),
            prompt: build_prompt(&input),
            temperature: TEMPERATURE,
        })
        .await?;

    let raw: Value = serde_json::from_str(&content)?;
    let plan = normalize(&raw, &input.destination);
    info!(
        destination = %plan.destination,
        days = plan.itinerary_suggestion.len(),
        "tour plan generated"
    );
    Ok(plan)
}
