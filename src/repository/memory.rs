//! In-process store used by tests that need real state across several
//! usecase calls. Mirrors the guarded writes of the Postgres repositories.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::{
    domain::restaurant::{
        NewRestaurant, Restaurant, RestaurantQuery, RestaurantState, SortOrder, StateTransition,
    },
    domain::visit::{average_rating, Visit},
    repository::errors::RepositoryError,
    usecase::contracts::{RestaurantRepository, VisitRepository},
};

#[derive(Default)]
struct Tables {
    restaurants: Vec<Restaurant>,
    visits: Vec<Visit>,
    next_restaurant_id: i64,
    next_visit_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
    }
}

impl Tables {
    fn restaurant_mut(&mut self, id: i64) -> Option<&mut Restaurant> {
        self.restaurants.iter_mut().find(|r| r.id == id)
    }

    fn upsert_visit(&mut self, restaurant_id: i64, user_id: i64, rating: Option<f64>) -> Visit {
        let now = Utc::now();
        if let Some(visit) = self
            .visits
            .iter_mut()
            .find(|v| v.restaurant_id == restaurant_id && v.user_id == user_id)
        {
            visit.attended = true;
            if rating.is_some() {
                visit.rating = rating;
            }
            visit.updated_at = now;
            return visit.clone();
        }

        self.next_visit_id += 1;
        let visit = Visit {
            id: self.next_visit_id,
            restaurant_id,
            user_id,
            attended: true,
            rating,
            created_at: now,
            updated_at: now,
        };
        self.visits.push(visit.clone());
        visit
    }

    fn store_average(&mut self, restaurant_id: i64) -> Result<f64, RepositoryError> {
        let average = average_rating(self.visits.iter().filter(|v| v.restaurant_id == restaurant_id));
        let restaurant = self
            .restaurant_mut(restaurant_id)
            .ok_or(RepositoryError::NotFound)?;
        restaurant.average_rating = average;
        restaurant.updated_at = Utc::now();
        Ok(average)
    }
}

impl RestaurantRepository for MemoryStore {
    async fn create(&self, restaurant: &NewRestaurant) -> Result<Restaurant, RepositoryError> {
        let mut tables = self.lock()?;
        tables.next_restaurant_id += 1;
        let now = Utc::now();
        let created = Restaurant {
            id: tables.next_restaurant_id,
            name: restaurant.name.clone(),
            address: restaurant.address.clone(),
            is_fast_food: restaurant.is_fast_food,
            menu_link: restaurant.menu_link.clone(),
            photo_link: restaurant.photo_link.clone(),
            average_rating: 0.0,
            state: restaurant.state,
            nominated_by_user_id: restaurant.nominated_by_user_id,
            created_by_admin_id: restaurant.created_by_admin_id,
            created_at: now,
            updated_at: now,
            visited_at: None,
            reservation_datetime: None,
        };
        tables.restaurants.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Restaurant>, RepositoryError> {
        Ok(self.lock()?.restaurants.iter().find(|r| r.id == id).cloned())
    }

    async fn find_all(&self, query: &RestaurantQuery) -> Result<Vec<Restaurant>, RepositoryError> {
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut found: Vec<Restaurant> = self
            .lock()?
            .restaurants
            .iter()
            .filter(|r| query.state.is_none_or(|s| r.state == s))
            .filter(|r| {
                needle.as_deref().is_none_or(|n| {
                    r.name.to_lowercase().contains(n) || r.address.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();

        match query.sort {
            SortOrder::Newest => found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))),
            SortOrder::Oldest => found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))),
            SortOrder::Name => found.sort_by_key(|r| r.name.to_lowercase()),
            SortOrder::Rating => found.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating)),
        }
        Ok(found)
    }

    async fn find_active(&self, exclude_fast_food: bool) -> Result<Vec<Restaurant>, RepositoryError> {
        Ok(self
            .lock()?
            .restaurants
            .iter()
            .filter(|r| r.state == RestaurantState::Active)
            .filter(|r| !(exclude_fast_food && r.is_fast_food))
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        restaurant: &Restaurant,
        last_seen: DateTime<Utc>,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        let mut tables = self.lock()?;
        let Some(stored) = tables.restaurant_mut(restaurant.id) else {
            return Ok(None);
        };
        if stored.updated_at != last_seen {
            return Ok(None);
        }
        let average = stored.average_rating;
        *stored = restaurant.clone();
        stored.average_rating = average;
        Ok(Some(stored.clone()))
    }

    async fn transition(
        &self,
        transition: &StateTransition,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        let mut tables = self.lock()?;
        let Some(stored) = tables.restaurant_mut(transition.id) else {
            return Ok(None);
        };
        if transition.expected.is_some_and(|s| stored.state != s) {
            return Ok(None);
        }

        stored.state = transition.to;
        if transition.visited_at.is_some() {
            stored.visited_at = transition.visited_at;
        }
        if transition.reservation_datetime.is_some() {
            stored.reservation_datetime = transition.reservation_datetime;
        }
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let before = tables.restaurants.len();
        tables.restaurants.retain(|r| r.id != id);
        if tables.restaurants.len() == before {
            return Err(RepositoryError::NotFound);
        }
        tables.visits.retain(|v| v.restaurant_id != id);
        Ok(())
    }

    async fn delete_in_state(&self, id: i64, state: RestaurantState) -> Result<bool, RepositoryError> {
        let mut tables = self.lock()?;
        let before = tables.restaurants.len();
        tables.restaurants.retain(|r| !(r.id == id && r.state == state));
        let deleted = tables.restaurants.len() < before;
        if deleted {
            tables.visits.retain(|v| v.restaurant_id != id);
        }
        Ok(deleted)
    }

    async fn count_by_state(&self) -> Result<Vec<(RestaurantState, i64)>, RepositoryError> {
        let tables = self.lock()?;
        Ok(RestaurantState::ALL
            .iter()
            .map(|s| {
                let count = tables.restaurants.iter().filter(|r| r.state == *s).count();
                (*s, i64::try_from(count).unwrap_or(i64::MAX))
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }

    async fn find_top_rated(&self, limit: i64) -> Result<Vec<Restaurant>, RepositoryError> {
        let mut visited: Vec<Restaurant> = self
            .lock()?
            .restaurants
            .iter()
            .filter(|r| r.state == RestaurantState::Visited)
            .cloned()
            .collect();
        visited.sort_by(|a, b| {
            b.average_rating
                .total_cmp(&a.average_rating)
                .then_with(|| a.name.cmp(&b.name))
        });
        visited.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(visited)
    }
}

impl VisitRepository for MemoryStore {
    async fn find_by_restaurant(&self, restaurant_id: i64) -> Result<Vec<Visit>, RepositoryError> {
        Ok(self
            .lock()?
            .visits
            .iter()
            .filter(|v| v.restaurant_id == restaurant_id)
            .cloned()
            .collect())
    }

    async fn mark_attended(
        &self,
        restaurant_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<Visit>, RepositoryError> {
        let mut tables = self.lock()?;
        tables
            .restaurant_mut(restaurant_id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(user_ids
            .iter()
            .map(|&user_id| tables.upsert_visit(restaurant_id, user_id, None))
            .collect())
    }

    async fn save_rating(
        &self,
        restaurant_id: i64,
        user_id: i64,
        rating: f64,
    ) -> Result<(Visit, f64), RepositoryError> {
        let mut tables = self.lock()?;
        tables
            .restaurant_mut(restaurant_id)
            .ok_or(RepositoryError::NotFound)?;
        let visit = tables.upsert_visit(restaurant_id, user_id, Some(rating));
        let average = tables.store_average(restaurant_id)?;
        Ok((visit, average))
    }

    async fn recalculate_average(&self, restaurant_id: i64) -> Result<f64, RepositoryError> {
        self.lock()?.store_average(restaurant_id)
    }

    async fn count_totals(&self) -> Result<(i64, i64), RepositoryError> {
        let tables = self.lock()?;
        let attended = tables.visits.iter().filter(|v| v.attended).count();
        let rated = tables
            .visits
            .iter()
            .filter(|v| v.attended && v.rating.is_some())
            .count();
        Ok((
            i64::try_from(attended).unwrap_or(i64::MAX),
            i64::try_from(rated).unwrap_or(i64::MAX),
        ))
    }
}
