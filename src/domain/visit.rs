use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Visit {
    pub id: i64,
    pub restaurant_id: i64,
    pub user_id: i64,
    pub attended: bool,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ratings are any finite positive number. The UI's 1-10 scale is not
/// enforced here.
pub fn is_valid_rating(rating: f64) -> bool {
    rating.is_finite() && rating > 0.0
}

/// Mean of the ratings on attended visits; 0 when nobody has rated yet.
pub fn average_rating<'a, I>(visits: I) -> f64
where
    I: IntoIterator<Item = &'a Visit>,
{
    let (sum, count) = visits
        .into_iter()
        .filter(|v| v.attended)
        .filter_map(|v| v.rating)
        .fold((0.0_f64, 0_u32), |(sum, count), r| (sum + r, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

#[cfg(test)]
pub(crate) fn sample(restaurant_id: i64, user_id: i64, attended: bool, rating: Option<f64>) -> Visit {
    let now = Utc::now();
    Visit {
        id: user_id,
        restaurant_id,
        user_id,
        attended,
        rating,
        created_at: now,
        updated_at: now,
    }
}
