use chrono::{DateTime, Utc};

use crate::{
    domain::restaurant::{
        NewRestaurant, Restaurant, RestaurantQuery, RestaurantState, StateTransition,
    },
    domain::visit::Visit,
    repository::errors::RepositoryError,
};

#[cfg_attr(test, mockall::automock)]
pub trait RestaurantRepository: Send + Sync {
    async fn create(&self, restaurant: &NewRestaurant) -> Result<Restaurant, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Restaurant>, RepositoryError>;
    async fn find_all(&self, query: &RestaurantQuery) -> Result<Vec<Restaurant>, RepositoryError>;
    async fn find_active(&self, exclude_fast_food: bool) -> Result<Vec<Restaurant>, RepositoryError>;
    /// Writes the edited row only while its stored `updated_at` is still
    /// `last_seen`. Returns `None` when the row is gone or changed since.
    async fn update(
        &self,
        restaurant: &Restaurant,
        last_seen: DateTime<Utc>,
    ) -> Result<Option<Restaurant>, RepositoryError>;
    /// Returns `None` when the row is gone or no longer in the expected state.
    async fn transition(
        &self,
        transition: &StateTransition,
    ) -> Result<Option<Restaurant>, RepositoryError>;
    async fn delete(&self, id: i64) -> Result<(), RepositoryError>;
    /// Deletes only while the row is in `state`. Returns whether a row went away.
    async fn delete_in_state(&self, id: i64, state: RestaurantState) -> Result<bool, RepositoryError>;
    async fn count_by_state(&self) -> Result<Vec<(RestaurantState, i64)>, RepositoryError>;
    async fn find_top_rated(&self, limit: i64) -> Result<Vec<Restaurant>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait VisitRepository: Send + Sync {
    async fn find_by_restaurant(&self, restaurant_id: i64) -> Result<Vec<Visit>, RepositoryError>;
    async fn mark_attended(
        &self,
        restaurant_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<Visit>, RepositoryError>;
    /// Upserts the rating and recomputes the restaurant average atomically.
    /// Returns the stored visit and the new average.
    async fn save_rating(
        &self,
        restaurant_id: i64,
        user_id: i64,
        rating: f64,
    ) -> Result<(Visit, f64), RepositoryError>;
    async fn recalculate_average(&self, restaurant_id: i64) -> Result<f64, RepositoryError>;
    /// (attended visits, rated visits)
    async fn count_totals(&self) -> Result<(i64, i64), RepositoryError>;
}
