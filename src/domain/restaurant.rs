use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestaurantState {
    Pending,
    Active,
    Upcoming,
    Visited,
}

#[derive(Debug, Error, PartialEq)]
#[error("unknown restaurant state: {0}")]
pub struct UnknownStateError(pub String);

impl RestaurantState {
    pub const ALL: [RestaurantState; 4] = [
        RestaurantState::Pending,
        RestaurantState::Active,
        RestaurantState::Upcoming,
        RestaurantState::Visited,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestaurantState::Pending => "pending",
            RestaurantState::Active => "active",
            RestaurantState::Upcoming => "upcoming",
            RestaurantState::Visited => "visited",
        }
    }
}

impl fmt::Display for RestaurantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestaurantState {
    type Err = UnknownStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RestaurantState::Pending),
            "active" => Ok(RestaurantState::Active),
            "upcoming" => Ok(RestaurantState::Upcoming),
            "visited" => Ok(RestaurantState::Visited),
            other => Err(UnknownStateError(other.to_string())),
        }
    }
}

impl TryFrom<String> for RestaurantState {
    type Error = UnknownStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub is_fast_food: bool,
    pub menu_link: Option<String>,
    pub photo_link: Option<String>,
    pub average_rating: f64,
    #[sqlx(try_from = "String")]
    pub state: RestaurantState,
    pub nominated_by_user_id: i64,
    pub created_by_admin_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub visited_at: Option<DateTime<Utc>>,
    pub reservation_datetime: Option<DateTime<Utc>>,
}

/// A nomination that has passed validation and is ready to be stored.
/// The store assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRestaurant {
    pub name: String,
    pub address: String,
    pub is_fast_food: bool,
    pub menu_link: Option<String>,
    pub photo_link: Option<String>,
    pub state: RestaurantState,
    pub nominated_by_user_id: i64,
    pub created_by_admin_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nomination {
    pub name: String,
    pub address: String,
    pub is_fast_food: bool,
    pub menu_link: Option<String>,
    pub photo_link: Option<String>,
}

/// Partial admin edit. The outer `Option` means "field supplied"; for
/// nullable columns the inner `None` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub is_fast_food: Option<bool>,
    pub menu_link: Option<Option<String>>,
    pub photo_link: Option<Option<String>>,
    pub state: Option<String>,
    pub visited_at: Option<Option<DateTime<Utc>>>,
    pub reservation_datetime: Option<Option<DateTime<Utc>>>,
}

/// A guarded state change. The store applies it only while the row is still
/// in `expected` (any state when `None`). Timestamps left as `None` keep
/// their stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub id: i64,
    pub expected: Option<RestaurantState>,
    pub to: RestaurantState,
    pub visited_at: Option<DateTime<Utc>>,
    pub reservation_datetime: Option<DateTime<Utc>>,
}

impl StateTransition {
    pub fn new(id: i64, expected: Option<RestaurantState>, to: RestaurantState) -> Self {
        Self {
            id,
            expected,
            to,
            visited_at: None,
            reservation_datetime: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Name,
    Rating,
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "name" => Ok(SortOrder::Name),
            "rating" => Ok(SortOrder::Rating),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantQuery {
    pub state: Option<RestaurantState>,
    pub search: Option<String>,
    pub sort: SortOrder,
}

#[derive(Debug, Error, PartialEq)]
pub enum RestaurantValidationError {
    #[error("Name and address are required")]
    MissingNameOrAddress,
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("Address cannot be empty")]
    EmptyAddress,
    #[error("Invalid menu link URL")]
    InvalidMenuLink,
    #[error("Invalid photo link URL")]
    InvalidPhotoLink,
    #[error("Invalid restaurant state")]
    InvalidState,
}

/// Blank links count as absent. Anything else must be an absolute http(s) URL.
fn normalize_link(link: Option<String>) -> Result<Option<String>, ()> {
    let Some(raw) = link else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {
            Ok(Some(trimmed.to_string()))
        }
        _ => Err(()),
    }
}

impl NewRestaurant {
    pub fn nominate(
        nomination: Nomination,
        nominated_by_user_id: i64,
        created_by_admin_id: Option<i64>,
    ) -> Result<Self, RestaurantValidationError> {
        let name = nomination.name.trim();
        let address = nomination.address.trim();
        if name.is_empty() || address.is_empty() {
            return Err(RestaurantValidationError::MissingNameOrAddress);
        }

        let menu_link = normalize_link(nomination.menu_link)
            .map_err(|_| RestaurantValidationError::InvalidMenuLink)?;
        let photo_link = normalize_link(nomination.photo_link)
            .map_err(|_| RestaurantValidationError::InvalidPhotoLink)?;

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            is_fast_food: nomination.is_fast_food,
            menu_link,
            photo_link,
            state: RestaurantState::Pending,
            nominated_by_user_id,
            created_by_admin_id,
        })
    }
}

impl Restaurant {
    /// Applies an admin edit in place. Nothing is modified if any field fails
    /// validation.
    pub fn apply_patch(
        &mut self,
        patch: RestaurantPatch,
        now: DateTime<Utc>,
    ) -> Result<(), RestaurantValidationError> {
        let name = match patch.name {
            Some(n) if n.trim().is_empty() => return Err(RestaurantValidationError::EmptyName),
            Some(n) => Some(n.trim().to_string()),
            None => None,
        };
        let address = match patch.address {
            Some(a) if a.trim().is_empty() => {
                return Err(RestaurantValidationError::EmptyAddress);
            }
            Some(a) => Some(a.trim().to_string()),
            None => None,
        };
        let menu_link = patch
            .menu_link
            .map(normalize_link)
            .transpose()
            .map_err(|_| RestaurantValidationError::InvalidMenuLink)?;
        let photo_link = patch
            .photo_link
            .map(normalize_link)
            .transpose()
            .map_err(|_| RestaurantValidationError::InvalidPhotoLink)?;
        let state = patch
            .state
            .as_deref()
            .map(RestaurantState::from_str)
            .transpose()
            .map_err(|_| RestaurantValidationError::InvalidState)?;

        if let Some(n) = name {
            self.name = n;
        }
        if let Some(a) = address {
            self.address = a;
        }
        if let Some(f) = patch.is_fast_food {
            self.is_fast_food = f;
        }
        if let Some(link) = menu_link {
            self.menu_link = link;
        }
        if let Some(link) = photo_link {
            self.photo_link = link;
        }
        if let Some(reservation) = patch.reservation_datetime {
            self.reservation_datetime = reservation;
        }
        if let Some(visited_at) = patch.visited_at {
            self.visited_at = visited_at;
        }
        if let Some(s) = state {
            self.state = s;
        }
        // A visited row always carries its visit time, even when the patch nulls it
        if self.state == RestaurantState::Visited && self.visited_at.is_none() {
            self.visited_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample(id: i64, state: RestaurantState) -> Restaurant {
    let now = Utc::now();
    Restaurant {
        id,
        name: format!("Restaurant {id}"),
        address: "1 Test Way".to_string(),
        is_fast_food: false,
        menu_link: None,
        photo_link: None,
        average_rating: 0.0,
        state,
        nominated_by_user_id: 1,
        created_by_admin_id: None,
        created_at: now,
        updated_at: now,
        visited_at: None,
        reservation_datetime: None,
    }
}
