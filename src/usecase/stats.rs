use crate::domain::stats::{fill_state_counts, Stats};
use crate::usecase::contracts::{RestaurantRepository, VisitRepository};
use crate::usecase::error::UsecaseError;

const TOP_RATED_LIMIT: i64 = 5;

pub struct StatsUseCase<R, V>
where
    R: RestaurantRepository,
    V: VisitRepository,
{
    restaurant_repository: R,
    visit_repository: V,
}

impl<R, V> StatsUseCase<R, V>
where
    R: RestaurantRepository,
    V: VisitRepository,
{
    pub fn new(restaurant_repository: R, visit_repository: V) -> Self {
        Self {
            restaurant_repository,
            visit_repository,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn summary(&self) -> Result<Stats, UsecaseError> {
        tracing::debug!("building stats summary");

        let counts = self.restaurant_repository.count_by_state().await?;
        let (attended_visits, ratings) = self.visit_repository.count_totals().await?;
        let top_rated = self
            .restaurant_repository
            .find_top_rated(TOP_RATED_LIMIT)
            .await?;

        tracing::debug!(attended_visits, ratings, top_rated = top_rated.len(), "stats summary built");
        Ok(Stats {
            restaurants_by_state: fill_state_counts(&counts),
            attended_visits,
            ratings,
            top_rated,
        })
    }
}
