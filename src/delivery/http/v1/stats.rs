use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};

use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling stats request");

    let stats = state.stats_usecase.summary().await?;

    Ok((StatusCode::OK, Json(stats)))
}
