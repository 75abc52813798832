use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guides::repo_types::{Booking, Guide};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub guide_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub booking_id: Option<String>,
    pub rating: Option<i64>,
    pub review: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub location: Option<String>,
}

/// `languages` arrives either as a list or as one comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Languages {
    List(Vec<String>),
    Csv(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterGuideRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    /// Number or numeric string.
    pub experience: Option<Value>,
    pub languages: Option<Languages>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendOtpRequest {
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub success: bool,
    pub guide: Guide,
    pub booking: Booking,
}

/// A booking with its guide embedded.
#[derive(Debug, Serialize)]
pub struct ActiveBooking {
    #[serde(flatten)]
    pub booking: Booking,
    pub guide: Guide,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideListResponse {
    pub success: bool,
    pub guides: Vec<Guide>,
    pub active_bookings: Vec<ActiveBooking>,
}

#[derive(Debug, Serialize)]
pub struct RegisterGuideResponse {
    pub success: bool,
    pub guide: Guide,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: &'static str) -> Self {
        Self {
            success: true,
            message: Some(message),
        }
    }
}
