use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use super::{
    dto::{
        BookRequest, BookResponse, CancelRequest, GuideListResponse, ListQuery,
        RegisterGuideRequest, RegisterGuideResponse, SendOtpRequest, StatusResponse,
        VerifyOtpRequest,
    },
    otp::OtpError,
    services::{self, GuideError},
};
use crate::{auth::services::AuthUser, error::AppError, extract::ApiJson, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/guide/list", get(list_guides))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/guide/book", post(book_guide))
        .route("/guide/cancel", post(cancel_booking))
        .route("/guide/register", post(register_guide))
        .route("/guide/send-otp", post(send_otp))
        .route("/guide/verify-otp", post(verify_otp))
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::NotFound => AppError::NotFound(err.to_string()),
            OtpError::Mismatch | OtpError::Expired => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<GuideError> for AppError {
    fn from(err: GuideError) -> Self {
        match err {
            GuideError::MissingBookingFields
            | GuideError::InvalidDates
            | GuideError::EndNotAfterStart
            | GuideError::MissingCancelFields
            | GuideError::RatingOutOfRange
            | GuideError::MissingProfileFields
            | GuideError::MissingEmail
            | GuideError::InvalidEmail
            | GuideError::EmailNotVerified => AppError::BadRequest(err.to_string()),
            GuideError::GuideNotFound | GuideError::BookingNotFound => {
                AppError::NotFound(err.to_string())
            }
            GuideError::GuideAlreadyBooked
            | GuideError::AlreadyCancelled
            | GuideError::AlreadyGuide => AppError::Conflict(err.to_string()),
            GuideError::UnknownUser => AppError::Unauthorized(err.to_string()),
            GuideError::OtpDelivery => AppError::Internal(err.to_string()),
            GuideError::Otp(otp) => otp.into(),
            GuideError::Store(e) => AppError::Other(e),
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn book_guide(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<BookRequest>,
) -> Result<Json<BookResponse>, AppError> {
    let plan = services::validate_booking(&payload).inspect_err(|e| {
        warn!(error = %e, %user_id, "rejected booking request");
    })?;

    let (guide, booking) = services::book(&state.db, state.mailer.as_deref(), user_id, plan)
        .await
        .inspect_err(|e| {
            if matches!(e, GuideError::Store(_)) {
                error!(error = %e, %user_id, "booking failed");
            }
        })?;

    Ok(Json(BookResponse {
        success: true,
        guide,
        booking,
    }))
}

#[instrument(skip(state, payload))]
pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<CancelRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let plan = services::validate_cancel(&payload).inspect_err(|e| {
        warn!(error = %e, %user_id, "rejected cancel request");
    })?;

    services::cancel_and_review(&state.db, state.mailer.as_deref(), user_id, plan).await?;
    Ok(Json(StatusResponse::ok()))
}

#[instrument(skip(state))]
pub async fn list_guides(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<GuideListResponse>, AppError> {
    let requester = user.map(|AuthUser(id)| id);
    let (guides, active_bookings) =
        services::list_guides(&state.db, query.location.as_deref(), requester).await?;

    Ok(Json(GuideListResponse {
        success: true,
        guides,
        active_bookings,
    }))
}

#[instrument(skip(state, payload))]
pub async fn register_guide(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<RegisterGuideRequest>,
) -> Result<Json<RegisterGuideResponse>, AppError> {
    let new = services::validate_registration(payload).inspect_err(|e| {
        warn!(error = %e, %user_id, "rejected guide registration");
    })?;

    let guide = services::register_guide(&state.db, user_id, new).await?;
    Ok(Json(RegisterGuideResponse {
        success: true,
        guide,
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SendOtpRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let email = services::otp_email(&payload.email)?;
    services::send_otp(&state.db, state.mailer.as_deref(), &email).await?;
    Ok(Json(StatusResponse::with_message("OTP sent")))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let email = services::otp_email(&payload.email)?;
    let code = services::submitted_code(payload.otp.as_ref());
    services::verify_otp(&state.db, &email, &code)
        .await
        .inspect_err(|e| warn!(error = %e, %email, "otp verification failed"))?;
    Ok(Json(StatusResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::services::JwtKeys};
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn error_of(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        body["error"].as_str().unwrap_or_default().to_string()
    }

    #[test]
    fn error_kinds_map_to_status_codes() {
        assert_eq!(
            AppError::from(GuideError::GuideAlreadyBooked).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(GuideError::BookingNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(GuideError::EmailNotVerified).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(GuideError::OtpDelivery).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(GuideError::Otp(OtpError::NotFound)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(GuideError::Otp(OtpError::Expired)).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn book_requires_authentication() {
        let res = build_app(AppState::fake())
            .oneshot(post(
                "/api/guide/book",
                None,
                json!({"guideId": Uuid::new_v4(), "startDate": "2025-03-01", "endDate": "2025-03-03"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_of(res).await, "User not authenticated");
    }

    #[tokio::test]
    async fn book_rejects_missing_fields_before_any_query() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let res = build_app(state)
            .oneshot(post("/api/guide/book", Some(&token), json!({"guideId": "x"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res).await, "Missing booking fields");
    }

    #[tokio::test]
    async fn cancel_rejects_out_of_range_rating() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let res = build_app(state)
            .oneshot(post(
                "/api/guide/cancel",
                Some(&token),
                json!({"bookingId": Uuid::new_v4(), "rating": 9, "review": "??"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res).await, "Rating must be between 1 and 5");
    }

    #[tokio::test]
    async fn register_requires_authentication_and_fields() {
        let res = build_app(AppState::fake())
            .oneshot(post("/api/guide/register", None, json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(Uuid::new_v4()).unwrap();
        let res = build_app(state)
            .oneshot(post(
                "/api/guide/register",
                Some(&token),
                json!({"name": "Ravi", "email": "ravi@example.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res).await, "Missing required fields");
    }

    #[tokio::test]
    async fn send_otp_requires_email() {
        let res = build_app(AppState::fake())
            .oneshot(post("/api/guide/send-otp", None, json!({})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_of(res).await, "Email required");
    }

    #[tokio::test]
    async fn malformed_json_is_reported_in_envelope() {
        let res = build_app(AppState::fake())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/guide/verify-otp")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(!error_of(res).await.is_empty());
    }
}
