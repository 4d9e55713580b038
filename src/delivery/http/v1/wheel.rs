use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Deserialize;

use crate::delivery::http::v1::extract::{ApiJson, ApiQuery};
use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ActiveParams {
    #[serde(default)]
    pub exclude_fast_food: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpinRequest {
    #[serde(default)]
    pub exclude_fast_food: bool,
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn list_active(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiQuery(params): ApiQuery<ActiveParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling wheel candidates request");

    let restaurants = state.restaurants_usecase.list_active(params.exclude_fast_food).await?;

    Ok((StatusCode::OK, Json(restaurants)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn spin(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Option<ApiJson<SpinRequest>>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling wheel spin request");

    let request = payload.map(|ApiJson(r)| r).unwrap_or_default();
    let mut rng = StdRng::from_entropy();
    let restaurant = state
        .wheel_usecase
        .spin(request.exclude_fast_food, &mut rng)
        .await?;

    tracing::debug!(restaurant_id = restaurant.id, "wheel spun successfully");
    Ok((StatusCode::OK, Json(restaurant)))
}
