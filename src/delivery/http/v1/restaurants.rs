use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::delivery::http::v1::extract::{ApiJson, ApiPath, ApiQuery};
use crate::delivery::http::v1::middleware::{require_admin, AuthenticatedUser};
use crate::domain::restaurant::{Nomination, RestaurantPatch, RestaurantQuery, RestaurantState, SortOrder};
use crate::usecase::error::UsecaseError;
use crate::AppState;

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ListRestaurantsParams {
    pub state: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
}

impl ListRestaurantsParams {
    fn into_query(self) -> Result<RestaurantQuery, UsecaseError> {
        let state = match self.state.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(
                s.parse::<RestaurantState>()
                    .map_err(|_| UsecaseError::Validation("Invalid restaurant state".to_string()))?,
            ),
        };
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some(s) => s
                .parse::<SortOrder>()
                .map_err(|_| UsecaseError::Validation("Invalid sort order".to_string()))?,
        };
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(RestaurantQuery { state, search, sort })
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateRestaurantRequest {
    #[serde(default)]
    #[validate(length(max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub address: String,
    #[serde(default)]
    pub is_fast_food: bool,
    pub menu_link: Option<String>,
    pub photo_link: Option<String>,
    /// Admins may nominate on behalf of another user.
    pub nominated_by_user_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRestaurantRequest {
    #[validate(length(max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub is_fast_food: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub menu_link: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo_link: Option<Option<String>>,
    pub state: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub visited_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reservation_datetime: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateRestaurantRequest> for RestaurantPatch {
    fn from(r: UpdateRestaurantRequest) -> Self {
        RestaurantPatch {
            name: r.name,
            address: r.address,
            is_fast_food: r.is_fast_food,
            menu_link: r.menu_link,
            photo_link: r.photo_link,
            state: r.state,
            visited_at: r.visited_at,
            reservation_datetime: r.reservation_datetime,
        }
    }
}

#[derive(Deserialize)]
pub struct ConfirmUpcomingRequest {
    pub reservation_datetime: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct MarkVisitedRequest {
    pub visited_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn validation_error(errors: validator::ValidationErrors) -> UsecaseError {
    tracing::warn!(?errors, "validation failed");
    UsecaseError::Validation(format!("Validation error: {}", errors))
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn list_restaurants(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiQuery(params): ApiQuery<ListRestaurantsParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling list restaurants request");

    let query = params.into_query()?;
    let restaurants = state.restaurants_usecase.list(query).await?;

    tracing::debug!(count = restaurants.len(), "restaurants listed successfully");
    Ok((StatusCode::OK, Json(restaurants)))
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn get_restaurant(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling get restaurant request");

    let restaurant = state.restaurants_usecase.get(id).await?;

    Ok((StatusCode::OK, Json(restaurant)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn create_restaurant(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiJson(payload): ApiJson<CreateRestaurantRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling nominate restaurant request");

    payload.validate().map_err(validation_error)?;

    let (nominator_id, admin_id) = match payload.nominated_by_user_id {
        Some(other) if other != user.user_id => {
            require_admin(&user)?;
            (other, Some(user.user_id))
        }
        _ => (user.user_id, None),
    };

    let nomination = Nomination {
        name: payload.name,
        address: payload.address,
        is_fast_food: payload.is_fast_food,
        menu_link: payload.menu_link,
        photo_link: payload.photo_link,
    };
    let restaurant = state
        .restaurants_usecase
        .nominate(nomination, nominator_id, admin_id)
        .await?;

    tracing::debug!(restaurant_id = restaurant.id, "restaurant nominated successfully");
    Ok((StatusCode::CREATED, Json(restaurant)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn update_restaurant(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateRestaurantRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling update restaurant request");

    payload.validate().map_err(validation_error)?;

    let restaurant = state.restaurants_usecase.update(id, payload.into()).await?;

    tracing::debug!(restaurant_id = id, "restaurant updated successfully");
    Ok((StatusCode::OK, Json(restaurant)))
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn delete_restaurant(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling delete restaurant request");

    state.restaurants_usecase.delete(id).await?;

    tracing::debug!(restaurant_id = id, "restaurant deleted successfully");
    Ok((StatusCode::OK, Json(SuccessResponse { success: true })))
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn approve_restaurant(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling approve restaurant request");

    let restaurant = state.restaurants_usecase.approve(id).await?;

    Ok((StatusCode::OK, Json(restaurant)))
}

#[tracing::instrument(skip(state), fields(user_id = user.user_id))]
pub async fn reject_restaurant(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling reject restaurant request");

    state.restaurants_usecase.reject(id).await?;

    Ok((StatusCode::OK, Json(SuccessResponse { success: true })))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn confirm_upcoming(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
    payload: Option<ApiJson<ConfirmUpcomingRequest>>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling confirm upcoming request");

    let reservation = payload.and_then(|ApiJson(p)| p.reservation_datetime);
    let restaurant = state
        .restaurants_usecase
        .confirm_upcoming(id, reservation)
        .await?;

    Ok((StatusCode::OK, Json(restaurant)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = user.user_id))]
pub async fn mark_visited(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    ApiPath(id): ApiPath<i64>,
    payload: Option<ApiJson<MarkVisitedRequest>>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    tracing::debug!("handling mark visited request");

    let visited_at = payload.and_then(|ApiJson(p)| p.visited_at);
    let restaurant = state.restaurants_usecase.mark_visited(id, visited_at).await?;

    Ok((StatusCode::OK, Json(restaurant)))
}
