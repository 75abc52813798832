//! Coercion of model output into [`TourPlan`].
//!
//! The completion is untrusted: any field may be missing, `null`, or of a
//! different JSON type than the prompt asked for. Every function here is
//! total and falls back to fixed text instead of failing.

use serde_json::{Map, Value};

use super::dto::{DayPlan, EstimatedCosts, Place, TourPlan};

const NO_SUMMARY: &str = "No summary available";
const NO_BEST_TIME: &str = "Information not available";
const NO_CULTURAL_NOTES: &str = "No cultural notes available";
const NO_TRANSPORT_TIPS: &str = "No transportation tips available";
const NO_ACCOMMODATION: &str = "No accommodation suggestions available";
const NO_FOOD: &str = "No food recommendations available";
const NOT_AVAILABLE: &str = "Not available";
const NOT_SPECIFIED: &str = "Not specified";

const DISHES_LABEL: &str = "🍽️ Popular Dishes";
const DINING_LABEL: &str = "🍴 Recommended Restaurants";

/// What a field turned out to be.
enum Shape<'a> {
    Absent,
    Text(&'a str),
    List(&'a [Value]),
    Record(&'a Map<String, Value>),
    Scalar(&'a Value),
}

fn shape(value: Option<&Value>) -> Shape<'_> {
    match value {
        None | Some(Value::Null) => Shape::Absent,
        Some(Value::String(s)) => Shape::Text(s),
        Some(Value::Array(items)) => Shape::List(items),
        Some(Value::Object(map)) => Shape::Record(map),
        Some(other) => Shape::Scalar(other),
    }
}

/// Inline rendering of a value inside a formatted line.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn or_fallback(rendered: String, fallback: &str) -> String {
    if rendered.trim().is_empty() {
        fallback.to_string()
    } else {
        rendered
    }
}

fn bullets(items: &[Value]) -> String {
    items
        .iter()
        .map(|item| format!("• {}", display(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_text<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

/// Plain text field: strings as-is, structured values as JSON text.
pub fn text_or(value: Option<&Value>, fallback: &str) -> String {
    match shape(value) {
        Shape::Absent => fallback.to_string(),
        Shape::Text(s) => or_fallback(s.to_string(), fallback),
        Shape::List(_) | Shape::Record(_) | Shape::Scalar(_) => {
            value.map(Value::to_string).unwrap_or_else(|| fallback.to_string())
        }
    }
}

pub fn cost(value: Option<&Value>) -> String {
    let rendered = match shape(value) {
        Shape::Absent => return NOT_SPECIFIED.to_string(),
        Shape::Text(s) => s.trim().to_string(),
        Shape::Record(map) => map
            .iter()
            .map(|(key, v)| format!("{key}: {}", display(v)))
            .collect::<Vec<_>>()
            .join(" | "),
        Shape::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{i}: {}", display(v)))
            .collect::<Vec<_>>()
            .join(" | "),
        Shape::Scalar(v) => v.to_string(),
    };
    or_fallback(rendered, NOT_SPECIFIED)
}

fn food_item(item: &Value) -> String {
    match item {
        Value::Object(map) => {
            let name = first_text(map, &["name", "title", "restaurant"]);
            let desc = first_text(map, &["description", "desc", "details"]);
            match (name, desc) {
                (Some(name), Some(desc)) => format!("• {name}: {desc}"),
                _ => format!("• {item}"),
            }
        }
        other => format!("• {}", display(other)),
    }
}

fn section_body(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => bullets(items),
        Value::Object(map) => map
            .iter()
            .map(|(key, v)| format!("• {key}: {}", display(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => display(other),
    }
}

fn food_section(label: &str, value: &Value) -> String {
    match value {
        Value::String(_) | Value::Array(_) | Value::Object(_) => {
            format!("{label}:\n{}", section_body(value))
        }
        other => format!("{label}: {}", display(other)),
    }
}

pub fn food(value: Option<&Value>) -> String {
    let rendered = match shape(value) {
        Shape::Absent => return NO_FOOD.to_string(),
        Shape::Text(s) => s.trim().to_string(),
        Shape::List(items) => items.iter().map(food_item).collect::<Vec<_>>().join("\n"),
        Shape::Record(map) => {
            let mut parts = Vec::new();
            if let Some(dishes) = map.get("dishes").filter(|v| !v.is_null()) {
                parts.push(food_section(DISHES_LABEL, dishes));
            }
            if let Some(dining) = map.get("diningOptions").filter(|v| !v.is_null()) {
                parts.push(food_section(DINING_LABEL, dining));
            }
            for (key, v) in map {
                if key == "dishes" || key == "diningOptions" || v.is_null() {
                    continue;
                }
                parts.push(food_section(&key.replace('_', " "), v));
            }
            parts.join("\n\n")
        }
        Shape::Scalar(v) => v.to_string(),
    };
    or_fallback(rendered, NO_FOOD)
}

fn accommodation_item(item: &Value) -> String {
    match item {
        Value::Object(map) => {
            let name = first_text(map, &["name"])
                .map(str::to_string)
                .unwrap_or_else(|| item.to_string());
            match first_text(map, &["description"]) {
                Some(desc) => format!("• {name}: {desc}"),
                None => format!("• {name}"),
            }
        }
        other => format!("• {}", display(other)),
    }
}

fn accommodation_tier(tier: &str, value: &Value) -> String {
    match value {
        Value::Object(nested) => {
            let flat = nested
                .iter()
                .map(|(key, v)| format!("{key}: {}", display(v)))
                .collect::<Vec<_>>()
                .join("; ");
            format!("• {tier}: {flat}")
        }
        other => format!("• {tier}: {}", display(other)),
    }
}

pub fn accommodation(value: Option<&Value>) -> String {
    let rendered = match shape(value) {
        Shape::Absent => return NO_ACCOMMODATION.to_string(),
        Shape::Text(s) => s.trim().to_string(),
        Shape::List(items) => items
            .iter()
            .map(accommodation_item)
            .collect::<Vec<_>>()
            .join("\n"),
        Shape::Record(map) => map
            .iter()
            .map(|(tier, v)| accommodation_tier(tier, v))
            .collect::<Vec<_>>()
            .join("\n"),
        Shape::Scalar(v) => v.to_string(),
    };
    or_fallback(rendered, NO_ACCOMMODATION)
}

fn places(value: Option<&Value>) -> Vec<Place> {
    match shape(value) {
        Shape::List(items) => items
            .iter()
            .map(|place| Place {
                name: text_or(place.get("name"), NOT_AVAILABLE),
                description: text_or(place.get("description"), NOT_AVAILABLE),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn day_number(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn itinerary(value: Option<&Value>) -> Vec<DayPlan> {
    match shape(value) {
        Shape::List(items) => items
            .iter()
            .map(|entry| DayPlan {
                day: day_number(entry.get("day")),
                activities: entry.get("activities").cloned().unwrap_or(Value::Null),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Projects raw model output onto the fixed schema.
pub fn normalize(raw: &Value, original_destination: &str) -> TourPlan {
    let costs = raw.get("estimatedCosts");
    let cost_field = |name: &str| cost(costs.and_then(|c| c.get(name)));

    let destination = raw
        .get("destination")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(original_destination)
        .to_string();

    TourPlan {
        destination,
        original_destination: original_destination.to_string(),
        summary: text_or(raw.get("summary"), NO_SUMMARY),
        best_time_to_visit: text_or(raw.get("bestTimeToVisit"), NO_BEST_TIME),
        places_to_visit: places(raw.get("placesToVisit")),
        cultural_notes: text_or(raw.get("culturalNotes"), NO_CULTURAL_NOTES),
        transportation_tips: text_or(raw.get("transportationTips"), NO_TRANSPORT_TIPS),
        accommodation_suggestions: accommodation(raw.get("accommodationSuggestions")),
        food_recommendations: food(raw.get("foodRecommendations")),
        estimated_costs: EstimatedCosts {
            accommodation: cost_field("accommodation"),
            food: cost_field("food"),
            transportation: cost_field("transportation"),
            activities: cost_field("activities"),
            total: cost_field("total"),
        },
        itinerary_suggestion: itinerary(raw.get("itinerarySuggestion")),
    }
}
