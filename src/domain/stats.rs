use serde::Serialize;

use crate::domain::restaurant::{Restaurant, RestaurantState};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateCount {
    pub state: RestaurantState,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub restaurants_by_state: Vec<StateCount>,
    pub attended_visits: i64,
    pub ratings: i64,
    pub top_rated: Vec<Restaurant>,
}

/// Zero-fills states the store reported nothing for and returns them in
/// lifecycle order.
pub fn fill_state_counts(counts: &[(RestaurantState, i64)]) -> Vec<StateCount> {
    RestaurantState::ALL
        .iter()
        .map(|state| StateCount {
            state: *state,
            count: counts
                .iter()
                .filter(|(s, _)| s == state)
                .map(|(_, c)| *c)
                .sum(),
        })
        .collect()
}
