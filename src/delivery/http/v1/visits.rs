use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::delivery::http::v1::extract::{ApiJson, ApiPath};
use crate::delivery::http::v1::middleware::{require_admin, AuthenticatedUser};
use crate::domain::visit::Visit;
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    #[serde(default)]
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rating: f64,
    /// Admins may record a rating for someone else.
    pub user_id: Option<i64>,
}

#[derive(Serialize)]
pub struct RateResponse {
    pub visit: Visit,
    pub average_rating: f64,
}

#[derive(Serialize)]
pub struct AverageResponse {
    pub average_rating: f64,
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn list_visits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(restaurant_id): ApiPath<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling list visits request");

    let visits = state.visits_usecase.list_visits(restaurant_id).await?;

    Ok((StatusCode::OK, Json(visits)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn mark_attendance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(restaurant_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<AttendanceRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!(attendees = payload.user_ids.len(), "handling mark attendance request");

    let visits = state
        .visits_usecase
        .mark_attendance(restaurant_id, payload.user_ids)
        .await?;

    tracing::debug!(restaurant_id, count = visits.len(), "attendance marked successfully");
    Ok((StatusCode::OK, Json(visits)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn submit_rating(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(restaurant_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<RateRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling submit rating request");

    let rater_id = match payload.user_id {
        Some(other) if other != user.user_id => {
            require_admin(&user)?;
            other
        }
        _ => user.user_id,
    };

    let outcome = state
        .visits_usecase
        .submit_rating(restaurant_id, rater_id, payload.rating)
        .await?;

    tracing::debug!(restaurant_id, average = outcome.average_rating, "rating submitted successfully");
    Ok((
        StatusCode::OK,
        Json(RateResponse {
            visit: outcome.visit,
            average_rating: outcome.average_rating,
        }),
    ))
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn recalculate_average(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(restaurant_id): ApiPath<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling recalculate average request");

    let average_rating = state
        .visits_usecase
        .recalculate_average_rating(restaurant_id)
        .await?;

    Ok((StatusCode::OK, Json(AverageResponse { average_rating })))
}
