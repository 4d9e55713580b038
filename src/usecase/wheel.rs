use rand::{seq::SliceRandom, Rng};

use crate::domain::restaurant::Restaurant;
use crate::usecase::contracts::RestaurantRepository;
use crate::usecase::error::UsecaseError;

/// Uniform pick over the active set.
pub fn pick<'a, G>(restaurants: &'a [Restaurant], rng: &mut G) -> Option<&'a Restaurant>
where
    G: Rng + ?Sized,
{
    restaurants.choose(rng)
}

pub struct WheelUseCase<R>
where
    R: RestaurantRepository,
{
    restaurant_repository: R,
}

impl<R> WheelUseCase<R>
where
    R: RestaurantRepository,
{
    pub fn new(restaurant_repository: R) -> Self {
        Self {
            restaurant_repository,
        }
    }

    /// Picks one active restaurant without changing anything. Committing the
    /// result is a separate `confirm_upcoming` call, so a spin can be redone.
    #[tracing::instrument(skip(self, rng))]
    pub async fn spin<G>(&self, exclude_fast_food: bool, rng: &mut G) -> Result<Restaurant, UsecaseError>
    where
        G: Rng + Send + ?Sized,
    {
        tracing::debug!("spinning the wheel");

        let candidates = self
            .restaurant_repository
            .find_active(exclude_fast_food)
            .await?;
        let chosen = pick(&candidates, rng).cloned().ok_or_else(|| {
            tracing::warn!("spin attempted with no active restaurants");
            UsecaseError::Validation("No active restaurants available".to_string())
        })?;

        metrics::counter!("wheel_spins_total").increment(1);
        tracing::info!(restaurant_id = chosen.id, candidates = candidates.len(), "wheel landed");
        Ok(chosen)
    }
}
