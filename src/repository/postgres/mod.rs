use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};

use crate::{
    domain::restaurant::{
        NewRestaurant, Restaurant, RestaurantQuery, RestaurantState, SortOrder, StateTransition,
    },
    domain::visit::{average_rating, Visit},
    repository::errors::RepositoryError,
    usecase::contracts::{RestaurantRepository, VisitRepository},
};

const RESTAURANT_COLUMNS: &str = "id, name, address, is_fast_food, menu_link, photo_link, \
    average_rating, state, nominated_by_user_id, created_by_admin_id, created_at, updated_at, \
    visited_at, reservation_datetime";

const VISIT_COLUMNS: &str = "id, restaurant_id, user_id, attended, rating, created_at, updated_at";

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => "created_at DESC, id DESC",
        SortOrder::Oldest => "created_at ASC, id ASC",
        SortOrder::Name => "LOWER(name) ASC, id ASC",
        SortOrder::Rating => "average_rating DESC, LOWER(name) ASC",
    }
}

/// `ILIKE` pattern matching `term` anywhere, with `%`, `_` and `\` in the
/// term taken literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct PostgresRestaurantRepository {
    pool: PgPool,
}

impl PostgresRestaurantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RestaurantRepository for PostgresRestaurantRepository {
    #[tracing::instrument(skip(self, restaurant), fields(name = %restaurant.name, nominated_by = restaurant.nominated_by_user_id))]
    async fn create(&self, restaurant: &NewRestaurant) -> Result<Restaurant, RepositoryError> {
        tracing::debug!("creating restaurant");

        let query = format!(
            r#"
            INSERT INTO restaurants
                (name, address, is_fast_food, menu_link, photo_link, state,
                 nominated_by_user_id, created_by_admin_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Restaurant>(&query)
            .bind(&restaurant.name)
            .bind(&restaurant.address)
            .bind(restaurant.is_fast_food)
            .bind(restaurant.menu_link.as_deref())
            .bind(restaurant.photo_link.as_deref())
            .bind(restaurant.state.as_str())
            .bind(restaurant.nominated_by_user_id)
            .bind(restaurant.created_by_admin_id)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(restaurant_id = created.id, "restaurant created successfully");
        Ok(created)
    }

    #[tracing::instrument(skip(self), fields(restaurant_id = id))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Restaurant>, RepositoryError> {
        tracing::debug!("finding restaurant by id");

        let query = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1");
        let restaurant = sqlx::query_as::<_, Restaurant>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(restaurant)
    }

    #[tracing::instrument(skip(self))]
    async fn find_all(&self, query: &RestaurantQuery) -> Result<Vec<Restaurant>, RepositoryError> {
        tracing::debug!("listing restaurants");

        let sql = format!(
            r#"
            SELECT {RESTAURANT_COLUMNS}
            FROM restaurants
            WHERE ($1::text IS NULL OR state = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR address ILIKE $2)
            ORDER BY {}
            "#,
            order_clause(query.sort)
        );

        let restaurants = sqlx::query_as::<_, Restaurant>(&sql)
            .bind(query.state.map(|s| s.as_str()))
            .bind(query.search.as_deref().map(contains_pattern))
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = restaurants.len(), "found restaurants");
        Ok(restaurants)
    }

    #[tracing::instrument(skip(self))]
    async fn find_active(&self, exclude_fast_food: bool) -> Result<Vec<Restaurant>, RepositoryError> {
        tracing::debug!("finding active restaurants");

        let query = format!(
            r#"
            SELECT {RESTAURANT_COLUMNS}
            FROM restaurants
            WHERE state = 'active'
              AND (NOT $1 OR is_fast_food = FALSE)
            ORDER BY id
            "#
        );

        let restaurants = sqlx::query_as::<_, Restaurant>(&query)
            .bind(exclude_fast_food)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = restaurants.len(), "found active restaurants");
        Ok(restaurants)
    }

    #[tracing::instrument(skip(self, restaurant), fields(restaurant_id = restaurant.id))]
    async fn update(
        &self,
        restaurant: &Restaurant,
        last_seen: DateTime<Utc>,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        tracing::debug!("updating restaurant");

        let query = format!(
            r#"
            UPDATE restaurants
            SET name = $2, address = $3, is_fast_food = $4, menu_link = $5, photo_link = $6,
                state = $7, visited_at = $8, reservation_datetime = $9, updated_at = $10
            WHERE id = $1 AND updated_at = $11
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Restaurant>(&query)
            .bind(restaurant.id)
            .bind(&restaurant.name)
            .bind(&restaurant.address)
            .bind(restaurant.is_fast_food)
            .bind(restaurant.menu_link.as_deref())
            .bind(restaurant.photo_link.as_deref())
            .bind(restaurant.state.as_str())
            .bind(restaurant.visited_at)
            .bind(restaurant.reservation_datetime)
            .bind(restaurant.updated_at)
            .bind(last_seen)
            .fetch_optional(&self.pool)
            .await?;

        tracing::debug!(applied = updated.is_some(), "restaurant update finished");
        Ok(updated)
    }

    #[tracing::instrument(skip(self, transition), fields(restaurant_id = transition.id, to = %transition.to))]
    async fn transition(
        &self,
        transition: &StateTransition,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        tracing::debug!(expected = ?transition.expected, "applying state transition");

        let query = format!(
            r#"
            UPDATE restaurants
            SET state = $2,
                visited_at = COALESCE($4, visited_at),
                reservation_datetime = COALESCE($5, reservation_datetime),
                updated_at = NOW()
            WHERE id = $1 AND ($3::text IS NULL OR state = $3)
            RETURNING {RESTAURANT_COLUMNS}
            "#
        );

        let updated = sqlx::query_as::<_, Restaurant>(&query)
            .bind(transition.id)
            .bind(transition.to.as_str())
            .bind(transition.expected.map(|s| s.as_str()))
            .bind(transition.visited_at)
            .bind(transition.reservation_datetime)
            .fetch_optional(&self.pool)
            .await?;

        tracing::debug!(applied = updated.is_some(), "state transition finished");
        Ok(updated)
    }

    #[tracing::instrument(skip(self), fields(restaurant_id = id))]
    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        tracing::debug!("deleting restaurant");

        let result = sqlx::query(
            r#"
            DELETE FROM restaurants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(restaurant_id = id, "restaurant deleted successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, state), fields(restaurant_id = id, %state))]
    async fn delete_in_state(&self, id: i64, state: RestaurantState) -> Result<bool, RepositoryError> {
        tracing::debug!("deleting restaurant in state");

        let result = sqlx::query(
            r#"
            DELETE FROM restaurants
            WHERE id = $1 AND state = $2
            "#,
        )
        .bind(id)
        .bind(state.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self))]
    async fn count_by_state(&self) -> Result<Vec<(RestaurantState, i64)>, RepositoryError> {
        tracing::debug!("counting restaurants by state");

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT state, COUNT(*)
            FROM restaurants
            GROUP BY state
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(state, count)| {
                state
                    .parse::<RestaurantState>()
                    .map(|s| (s, count))
                    .map_err(|e| RepositoryError::DatabaseError(e.to_string()))
            })
            .collect()
    }

    #[tracing::instrument(skip(self))]
    async fn find_top_rated(&self, limit: i64) -> Result<Vec<Restaurant>, RepositoryError> {
        tracing::debug!("finding top rated restaurants");

        let query = format!(
            r#"
            SELECT {RESTAURANT_COLUMNS}
            FROM restaurants
            WHERE state = 'visited'
            ORDER BY average_rating DESC, name ASC
            LIMIT $1
            "#
        );

        let restaurants = sqlx::query_as::<_, Restaurant>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(restaurants)
    }
}

pub struct PostgresVisitRepository {
    pool: PgPool,
}

impl PostgresVisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Holds the restaurant row for the rest of the transaction, so average
/// recomputations for one restaurant read its visits one at a time.
async fn lock_restaurant(conn: &mut PgConnection, restaurant_id: i64) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM restaurants WHERE id = $1 FOR UPDATE")
        .bind(restaurant_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(())
}

/// Recomputes and stores a restaurant's average from its visit rows, on
/// whatever connection (or transaction) the caller holds.
async fn store_average(conn: &mut PgConnection, restaurant_id: i64) -> Result<f64, RepositoryError> {
    let query = format!("SELECT {VISIT_COLUMNS} FROM visits WHERE restaurant_id = $1");
    let visits = sqlx::query_as::<_, Visit>(&query)
        .bind(restaurant_id)
        .fetch_all(&mut *conn)
        .await?;

    let average = average_rating(&visits);

    let result = sqlx::query(
        r#"
        UPDATE restaurants
        SET average_rating = $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(restaurant_id)
    .bind(average)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }

    Ok(average)
}

impl VisitRepository for PostgresVisitRepository {
    #[tracing::instrument(skip(self))]
    async fn find_by_restaurant(&self, restaurant_id: i64) -> Result<Vec<Visit>, RepositoryError> {
        tracing::debug!("finding visits by restaurant");

        let query = format!(
            "SELECT {VISIT_COLUMNS} FROM visits WHERE restaurant_id = $1 ORDER BY created_at, id"
        );
        let visits = sqlx::query_as::<_, Visit>(&query)
            .bind(restaurant_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(count = visits.len(), "found visits");
        Ok(visits)
    }

    #[tracing::instrument(skip(self, user_ids), fields(user_count = user_ids.len()))]
    async fn mark_attended(
        &self,
        restaurant_id: i64,
        user_ids: &[i64],
    ) -> Result<Vec<Visit>, RepositoryError> {
        tracing::debug!("marking attendance");

        let query = format!(
            r#"
            INSERT INTO visits (restaurant_id, user_id, attended)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (restaurant_id, user_id)
            DO UPDATE SET attended = TRUE, updated_at = NOW()
            RETURNING {VISIT_COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        lock_restaurant(&mut tx, restaurant_id).await?;
        let mut visits = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            let visit = sqlx::query_as::<_, Visit>(&query)
                .bind(restaurant_id)
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
            visits.push(visit);
        }
        tx.commit().await?;

        tracing::debug!(count = visits.len(), "attendance marked");
        Ok(visits)
    }

    #[tracing::instrument(skip(self))]
    async fn save_rating(
        &self,
        restaurant_id: i64,
        user_id: i64,
        rating: f64,
    ) -> Result<(Visit, f64), RepositoryError> {
        tracing::debug!("saving rating");

        let query = format!(
            r#"
            INSERT INTO visits (restaurant_id, user_id, attended, rating)
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (restaurant_id, user_id)
            DO UPDATE SET attended = TRUE, rating = EXCLUDED.rating, updated_at = NOW()
            RETURNING {VISIT_COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        lock_restaurant(&mut tx, restaurant_id).await?;
        let visit = sqlx::query_as::<_, Visit>(&query)
            .bind(restaurant_id)
            .bind(user_id)
            .bind(rating)
            .fetch_one(&mut *tx)
            .await?;
        let average = store_average(&mut tx, restaurant_id).await?;
        tx.commit().await?;

        tracing::debug!(visit_id = visit.id, average, "rating saved");
        Ok((visit, average))
    }

    #[tracing::instrument(skip(self))]
    async fn recalculate_average(&self, restaurant_id: i64) -> Result<f64, RepositoryError> {
        tracing::debug!("recalculating average rating");

        let mut tx = self.pool.begin().await?;
        lock_restaurant(&mut tx, restaurant_id).await?;
        let average = store_average(&mut tx, restaurant_id).await?;
        tx.commit().await?;

        Ok(average)
    }

    #[tracing::instrument(skip(self))]
    async fn count_totals(&self) -> Result<(i64, i64), RepositoryError> {
        tracing::debug!("counting visit totals");

        let totals: (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE attended),
                   COUNT(*) FILTER (WHERE attended AND rating IS NOT NULL)
            FROM visits
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(totals)
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
