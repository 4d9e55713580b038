use chrono::{DateTime, Utc};

use crate::domain::restaurant::{
    NewRestaurant, Nomination, Restaurant, RestaurantPatch, RestaurantQuery, RestaurantState,
    StateTransition,
};
use crate::usecase::contracts::RestaurantRepository;
use crate::usecase::error::{not_found_as_restaurant, UsecaseError};

const ONLY_PENDING_REJECTED: &str = "Only pending restaurants can be rejected";
const ONLY_ACTIVE_CONFIRMED: &str = "Only active restaurants can be confirmed as upcoming";
const ONLY_UPCOMING_VISITED: &str = "Only upcoming restaurants can be marked as visited";
const CONCURRENT_UPDATE: &str = "Restaurant was modified concurrently, please retry";

const UPDATE_ATTEMPTS: u32 = 3;

pub struct RestaurantsUseCase<R>
where
    R: RestaurantRepository,
{
    restaurant_repository: R,
}

impl<R> RestaurantsUseCase<R>
where
    R: RestaurantRepository,
{
    pub fn new(restaurant_repository: R) -> Self {
        Self {
            restaurant_repository,
        }
    }

    #[tracing::instrument(skip(self, nomination), fields(name = %nomination.name))]
    pub async fn nominate(
        &self,
        nomination: Nomination,
        nominator_id: i64,
        admin_id: Option<i64>,
    ) -> Result<Restaurant, UsecaseError> {
        tracing::debug!("nominating restaurant");

        let new_restaurant = NewRestaurant::nominate(nomination, nominator_id, admin_id)?;
        let restaurant = self.restaurant_repository.create(&new_restaurant).await?;

        metrics::counter!("nominations_total").increment(1);
        tracing::info!(restaurant_id = restaurant.id, "restaurant nominated");
        Ok(restaurant)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Restaurant, UsecaseError> {
        tracing::debug!("getting restaurant");

        self.find_existing(id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, query: RestaurantQuery) -> Result<Vec<Restaurant>, UsecaseError> {
        tracing::debug!("listing restaurants");

        let restaurants = self.restaurant_repository.find_all(&query).await?;

        tracing::debug!(count = restaurants.len(), "restaurants listed");
        Ok(restaurants)
    }

    /// The wheel's candidate set.
    #[tracing::instrument(skip(self))]
    pub async fn list_active(&self, exclude_fast_food: bool) -> Result<Vec<Restaurant>, UsecaseError> {
        tracing::debug!("listing active restaurants");

        let restaurants = self.restaurant_repository.find_active(exclude_fast_food).await?;

        tracing::debug!(count = restaurants.len(), "active restaurants listed");
        Ok(restaurants)
    }

    #[tracing::instrument(skip(self))]
    pub async fn approve(&self, id: i64) -> Result<Restaurant, UsecaseError> {
        tracing::debug!("approving restaurant");

        self.find_existing(id).await?;

        let transition = StateTransition::new(id, None, RestaurantState::Active);
        self.apply_transition(&transition, None).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn reject(&self, id: i64) -> Result<(), UsecaseError> {
        tracing::debug!("rejecting restaurant");

        let restaurant = self.find_existing(id).await?;
        if restaurant.state != RestaurantState::Pending {
            tracing::warn!(state = %restaurant.state, "reject attempted on non-pending restaurant");
            return Err(UsecaseError::InvalidTransition(ONLY_PENDING_REJECTED.to_string()));
        }

        let deleted = self
            .restaurant_repository
            .delete_in_state(id, RestaurantState::Pending)
            .await?;
        if !deleted {
            return Err(UsecaseError::InvalidTransition(ONLY_PENDING_REJECTED.to_string()));
        }

        tracing::info!(restaurant_id = id, "restaurant rejected");
        Ok(())
    }

    /// Commits a wheel pick. The restaurant must still be active, since the
    /// spin that produced it may be stale by now.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_upcoming(
        &self,
        id: i64,
        reservation_datetime: Option<DateTime<Utc>>,
    ) -> Result<Restaurant, UsecaseError> {
        tracing::debug!("confirming restaurant as upcoming");

        let restaurant = self.find_existing(id).await?;
        if restaurant.state != RestaurantState::Active {
            tracing::warn!(state = %restaurant.state, "confirm attempted on non-active restaurant");
            return Err(UsecaseError::InvalidTransition(ONLY_ACTIVE_CONFIRMED.to_string()));
        }

        let mut transition =
            StateTransition::new(id, Some(RestaurantState::Active), RestaurantState::Upcoming);
        transition.reservation_datetime = reservation_datetime;
        self.apply_transition(&transition, Some(ONLY_ACTIVE_CONFIRMED))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_visited(
        &self,
        id: i64,
        visited_at: Option<DateTime<Utc>>,
    ) -> Result<Restaurant, UsecaseError> {
        tracing::debug!("marking restaurant as visited");

        let restaurant = self.find_existing(id).await?;
        if restaurant.state != RestaurantState::Upcoming {
            tracing::warn!(state = %restaurant.state, "visit attempted on non-upcoming restaurant");
            return Err(UsecaseError::InvalidTransition(ONLY_UPCOMING_VISITED.to_string()));
        }

        let mut transition =
            StateTransition::new(id, Some(RestaurantState::Upcoming), RestaurantState::Visited);
        transition.visited_at = Some(visited_at.unwrap_or_else(Utc::now));
        self.apply_transition(&transition, Some(ONLY_UPCOMING_VISITED))
            .await
    }

    /// Admin edit. Any state may be set directly here; the named transitions
    /// are the only place preconditions are enforced. The write only lands on
    /// the row version the patch was applied to, so fields the patch leaves
    /// out keep whatever a concurrent request stored.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: i64, patch: RestaurantPatch) -> Result<Restaurant, UsecaseError> {
        tracing::debug!(?patch, "updating restaurant");

        for attempt in 1..=UPDATE_ATTEMPTS {
            let mut restaurant = self.find_existing(id).await?;
            let last_seen = restaurant.updated_at;
            restaurant.apply_patch(patch.clone(), Utc::now())?;

            if let Some(updated) = self
                .restaurant_repository
                .update(&restaurant, last_seen)
                .await?
            {
                tracing::info!(restaurant_id = id, state = %updated.state, "restaurant updated");
                return Ok(updated);
            }

            tracing::warn!(restaurant_id = id, attempt, "restaurant changed during update");
        }

        Err(UsecaseError::Conflict(CONCURRENT_UPDATE.to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), UsecaseError> {
        tracing::debug!("deleting restaurant");

        self.restaurant_repository
            .delete(id)
            .await
            .map_err(not_found_as_restaurant)?;

        tracing::info!(restaurant_id = id, "restaurant deleted");
        Ok(())
    }

    async fn find_existing(&self, id: i64) -> Result<Restaurant, UsecaseError> {
        self.restaurant_repository
            .find_by_id(id)
            .await?
            .ok_or_else(UsecaseError::restaurant_not_found)
    }

    /// A guarded write that matched nothing means the row changed after we
    /// read it: it is either gone or left the expected state.
    async fn apply_transition(
        &self,
        transition: &StateTransition,
        precondition: Option<&str>,
    ) -> Result<Restaurant, UsecaseError> {
        let updated = self.restaurant_repository.transition(transition).await?;

        match updated {
            Some(restaurant) => {
                metrics::counter!("restaurant_transitions_total", "to" => transition.to.as_str())
                    .increment(1);
                tracing::info!(restaurant_id = restaurant.id, to = %transition.to, "restaurant state changed");
                Ok(restaurant)
            }
            None => match precondition {
                Some(msg) => Err(UsecaseError::InvalidTransition(msg.to_string())),
                None => Err(UsecaseError::restaurant_not_found()),
            },
        }
    }
}
