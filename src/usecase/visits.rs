use crate::domain::visit::{is_valid_rating, Visit};
use crate::usecase::contracts::{RestaurantRepository, VisitRepository};
use crate::usecase::error::{not_found_as_restaurant, UsecaseError};

pub struct VisitsUseCase<V, R>
where
    V: VisitRepository,
    R: RestaurantRepository,
{
    visit_repository: V,
    restaurant_repository: R,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingOutcome {
    pub visit: Visit,
    pub average_rating: f64,
}

impl<V, R> VisitsUseCase<V, R>
where
    V: VisitRepository,
    R: RestaurantRepository,
{
    pub fn new(visit_repository: V, restaurant_repository: R) -> Self {
        Self {
            visit_repository,
            restaurant_repository,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_visits(&self, restaurant_id: i64) -> Result<Vec<Visit>, UsecaseError> {
        tracing::debug!("listing visits");

        self.ensure_restaurant(restaurant_id).await?;
        let visits = self.visit_repository.find_by_restaurant(restaurant_id).await?;

        tracing::debug!(count = visits.len(), "visits listed");
        Ok(visits)
    }

    #[tracing::instrument(skip(self, user_ids), fields(user_count = user_ids.len()))]
    pub async fn mark_attendance(
        &self,
        restaurant_id: i64,
        user_ids: Vec<i64>,
    ) -> Result<Vec<Visit>, UsecaseError> {
        tracing::debug!("marking attendance");

        let mut user_ids = user_ids;
        user_ids.sort_unstable();
        user_ids.dedup();
        if user_ids.is_empty() {
            return Err(UsecaseError::Validation(
                "At least one user must attend".to_string(),
            ));
        }

        self.ensure_restaurant(restaurant_id).await?;
        let visits = self
            .visit_repository
            .mark_attended(restaurant_id, &user_ids)
            .await
            .map_err(not_found_as_restaurant)?;

        tracing::info!(restaurant_id, count = visits.len(), "attendance marked");
        Ok(visits)
    }

    #[tracing::instrument(skip(self))]
    pub async fn submit_rating(
        &self,
        restaurant_id: i64,
        user_id: i64,
        rating: f64,
    ) -> Result<RatingOutcome, UsecaseError> {
        tracing::debug!("submitting rating");

        if !is_valid_rating(rating) {
            return Err(UsecaseError::Validation(
                "Rating must be a positive number".to_string(),
            ));
        }

        self.ensure_restaurant(restaurant_id).await?;
        let (visit, average_rating) = self
            .visit_repository
            .save_rating(restaurant_id, user_id, rating)
            .await
            .map_err(not_found_as_restaurant)?;

        metrics::counter!("ratings_submitted_total").increment(1);
        tracing::info!(restaurant_id, user_id, rating, average_rating, "rating submitted");
        Ok(RatingOutcome {
            visit,
            average_rating,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn recalculate_average_rating(&self, restaurant_id: i64) -> Result<f64, UsecaseError> {
        tracing::debug!("recalculating average rating");

        self.ensure_restaurant(restaurant_id).await?;
        let average = self
            .visit_repository
            .recalculate_average(restaurant_id)
            .await
            .map_err(not_found_as_restaurant)?;

        tracing::debug!(restaurant_id, average, "average rating recalculated");
        Ok(average)
    }

    async fn ensure_restaurant(&self, restaurant_id: i64) -> Result<(), UsecaseError> {
        self.restaurant_repository
            .find_by_id(restaurant_id)
            .await?
            .ok_or_else(UsecaseError::restaurant_not_found)?;
        Ok(())
    }
}
