use axum::{extract::State, routing::post, Json, Router};
use tracing::{error, instrument};

use super::{
    dto::{TourPlanRequest, TourPlanResponse},
    services::{generate_tour_plan, TourPlanError},
};
use crate::{auth::services::AuthUser, error::AppError, extract::ApiJson, state::AppState};

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/tour-plan", post(create_tour_plan))
}

impl From<TourPlanError> for AppError {
    fn from(err: TourPlanError) -> Self {
        match err {
            TourPlanError::InvalidInput => AppError::BadRequest(err.to_string()),
            TourPlanError::NotConfigured => AppError::Unavailable(err.to_string()),
            TourPlanError::Completion(_) | TourPlanError::Parse(_) => {
                AppError::Upstream(err.to_string())
            }
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn create_tour_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<TourPlanRequest>,
) -> Result<Json<TourPlanResponse>, AppError> {
    let plan = generate_tour_plan(state.llm.as_deref(), payload)
        .await
        .inspect_err(|e| error!(error = %e, %user_id, "tour plan generation failed"))?;
    Ok(Json(TourPlanResponse {
        success: true,
        data: plan,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::services::JwtKeys, tour_plan::services::tests::CannedCompletion};
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn plan_request(token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/tour-plan")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn requires_authentication() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(plan_request(None, json!({"destination": "Kyoto", "duration": "3 days"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["success"], false);
    }

    #[tokio::test]
    async fn returns_normalized_plan() {
        let completion = json!({
            "destination": "Bangkok, Thailand",
            "foodRecommendations": {"dishes": {"Pad Thai": "Stir-fried noodles"}},
            "estimatedCosts": {"total": {"low": "$500", "high": "$900"}},
            "itinerarySuggestion": [{"day": 1, "activities": "Grand Palace"}]
        });
        let state = AppState::fake().with_llm(Arc::new(CannedCompletion::ok(&completion.to_string())));
        let token = JwtKeys::from_ref(&state).sign_access(uuid::Uuid::new_v4()).unwrap();

        let res = build_app(state)
            .oneshot(plan_request(
                Some(&token),
                json!({"destination": "Bangkok", "duration": "1 day", "budget": "mid"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = json_body(res).await;
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert_eq!(data["destination"], "Bangkok, Thailand");
        assert_eq!(data["originalDestination"], "Bangkok");
        assert!(data["foodRecommendations"]
            .as_str()
            .unwrap()
            .contains("Pad Thai: Stir-fried noodles"));
        assert_eq!(data["estimatedCosts"]["total"], "low: $500 | high: $900");
        assert_eq!(data["estimatedCosts"]["food"], "Not specified");
        assert_eq!(data["itinerarySuggestion"][0]["day"], 1);
        assert_eq!(data["summary"], "No summary available");
    }

    #[tokio::test]
    async fn invalid_input_is_a_generic_bad_request() {
        let state = AppState::fake().with_llm(Arc::new(CannedCompletion::ok("{}")));
        let token = JwtKeys::from_ref(&state).sign_access(uuid::Uuid::new_v4()).unwrap();
        let res = build_app(state)
            .oneshot(plan_request(Some(&token), json!({"destination": "K", "duration": ""})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await["error"],
            "Invalid input. Please check your destination and duration."
        );
    }

    #[tokio::test]
    async fn missing_api_key_is_reported() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state).sign_access(uuid::Uuid::new_v4()).unwrap();
        let res = build_app(state)
            .oneshot(plan_request(Some(&token), json!({"destination": "Kyoto", "duration": "2 days"})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
