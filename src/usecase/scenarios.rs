//! Lifecycle walkthroughs against the in-memory store.

use rand::{rngs::StdRng, SeedableRng};

use crate::domain::restaurant::{
    Nomination, Restaurant, RestaurantPatch, RestaurantQuery, RestaurantState, SortOrder,
};
use crate::repository::memory::MemoryStore;
use crate::usecase::contracts::RestaurantRepository;
use crate::usecase::error::UsecaseError;
use crate::usecase::restaurants::RestaurantsUseCase;
use crate::usecase::stats::StatsUseCase;
use crate::usecase::visits::VisitsUseCase;
use crate::usecase::wheel::WheelUseCase;

struct Harness {
    store: MemoryStore,
    restaurants: RestaurantsUseCase<MemoryStore>,
    visits: VisitsUseCase<MemoryStore, MemoryStore>,
    wheel: WheelUseCase<MemoryStore>,
    stats: StatsUseCase<MemoryStore, MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = MemoryStore::new();
        Self {
            restaurants: RestaurantsUseCase::new(store.clone()),
            visits: VisitsUseCase::new(store.clone(), store.clone()),
            wheel: WheelUseCase::new(store.clone()),
            stats: StatsUseCase::new(store.clone(), store.clone()),
            store,
        }
    }

    async fn nominate(&self, name: &str, is_fast_food: bool) -> Restaurant {
        self.restaurants
            .nominate(
                Nomination {
                    name: name.to_string(),
                    address: "123 Main St".to_string(),
                    is_fast_food,
                    ..Default::default()
                },
                1,
                None,
            )
            .await
            .unwrap()
    }

    async fn nominate_active(&self, name: &str, is_fast_food: bool) -> Restaurant {
        let restaurant = self.nominate(name, is_fast_food).await;
        self.restaurants.approve(restaurant.id).await.unwrap()
    }
}

#[tokio::test]
async fn test_nomination_starts_pending_with_zero_average() {
    let h = Harness::new();

    let restaurant = h.nominate("Luigi's", false).await;

    assert_eq!(restaurant.name, "Luigi's");
    assert_eq!(restaurant.state, RestaurantState::Pending);
    assert_eq!(restaurant.average_rating, 0.0);
    assert_eq!(h.restaurants.get(restaurant.id).await.unwrap(), restaurant);
}

#[tokio::test]
async fn test_blank_nominations_store_nothing() {
    let h = Harness::new();

    for (name, address) in [("", "x"), ("x", "")] {
        let err = h
            .restaurants
            .nominate(
                Nomination {
                    name: name.to_string(),
                    address: address.to_string(),
                    ..Default::default()
                },
                1,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UsecaseError::Validation(_)));
    }

    let all = h.restaurants.list(RestaurantQuery::default()).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_approve_then_missing() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;

    let approved = h.restaurants.approve(restaurant.id).await.unwrap();
    assert_eq!(approved.state, RestaurantState::Active);

    let err = h.restaurants.approve(9999).await.unwrap_err();
    assert_eq!(err.to_string(), "Restaurant not found");
}

#[tokio::test]
async fn test_two_ratings_average_to_seven() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;

    h.visits.submit_rating(restaurant.id, 7, 8.0).await.unwrap();
    let outcome = h.visits.submit_rating(restaurant.id, 9, 6.0).await.unwrap();

    assert_eq!(outcome.average_rating, 7.0);
    let stored = h.restaurants.get(restaurant.id).await.unwrap();
    assert_eq!(stored.average_rating, 7.0);
}

#[tokio::test]
async fn test_rerating_updates_the_same_visit() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;

    h.visits.submit_rating(restaurant.id, 7, 8.0).await.unwrap();
    h.visits.submit_rating(restaurant.id, 9, 6.0).await.unwrap();
    let outcome = h.visits.submit_rating(restaurant.id, 7, 10.0).await.unwrap();

    let visits = h.visits.list_visits(restaurant.id).await.unwrap();
    assert_eq!(visits.len(), 2);
    assert_eq!(outcome.average_rating, 8.0);
}

#[tokio::test]
async fn test_attendance_without_rating_leaves_average() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;

    h.visits
        .mark_attendance(restaurant.id, vec![7, 9, 11])
        .await
        .unwrap();
    h.visits.submit_rating(restaurant.id, 7, 9.0).await.unwrap();

    let average = h
        .visits
        .recalculate_average_rating(restaurant.id)
        .await
        .unwrap();
    assert_eq!(average, 9.0);

    let visits = h.visits.list_visits(restaurant.id).await.unwrap();
    assert_eq!(visits.len(), 3);
    assert!(visits.iter().all(|v| v.attended));
}

#[tokio::test]
async fn test_reject_active_keeps_row() {
    let h = Harness::new();
    let restaurant = h.nominate_active("Luigi's", false).await;

    let err = h.restaurants.reject(restaurant.id).await.unwrap_err();

    assert_eq!(err.to_string(), "Only pending restaurants can be rejected");
    assert!(h.restaurants.get(restaurant.id).await.is_ok());
}

#[tokio::test]
async fn test_reject_pending_removes_row() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;

    h.restaurants.reject(restaurant.id).await.unwrap();

    assert_eq!(
        h.restaurants.get(restaurant.id).await.unwrap_err(),
        UsecaseError::restaurant_not_found()
    );
}

#[tokio::test]
async fn test_mark_visited_on_pending_keeps_state() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;

    assert!(h.restaurants.mark_visited(restaurant.id, None).await.is_err());

    let stored = h.restaurants.get(restaurant.id).await.unwrap();
    assert_eq!(stored.state, RestaurantState::Pending);
    assert_eq!(stored.visited_at, None);
}

#[tokio::test]
async fn test_full_lifecycle_through_the_wheel() {
    let h = Harness::new();
    let burger = h.nominate_active("Burger Shack", true).await;
    let trattoria = h.nominate_active("Trattoria", false).await;
    h.nominate("Still Pending", false).await;

    let candidates = h.restaurants.list_active(true).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, trattoria.id);
    assert_eq!(h.restaurants.list_active(false).await.unwrap().len(), 2);

    let mut rng = StdRng::seed_from_u64(5);
    let picked = h.wheel.spin(true, &mut rng).await.unwrap();
    assert_eq!(picked.id, trattoria.id);
    assert_eq!(h.restaurants.get(picked.id).await.unwrap().state, RestaurantState::Active);

    let upcoming = h.restaurants.confirm_upcoming(picked.id, None).await.unwrap();
    assert_eq!(upcoming.state, RestaurantState::Upcoming);

    let visited = h.restaurants.mark_visited(picked.id, None).await.unwrap();
    assert_eq!(visited.state, RestaurantState::Visited);
    assert!(visited.visited_at.is_some());

    // Only the burger place is left on the wheel.
    let again = h.wheel.spin(false, &mut rng).await.unwrap();
    assert_eq!(again.id, burger.id);
}

#[tokio::test]
async fn test_confirm_after_delete_fails() {
    let h = Harness::new();
    let restaurant = h.nominate_active("Luigi's", false).await;
    let picked = h
        .wheel
        .spin(false, &mut StdRng::seed_from_u64(1))
        .await
        .unwrap();

    h.restaurants.delete(restaurant.id).await.unwrap();

    let err = h.restaurants.confirm_upcoming(picked.id, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Restaurant not found");
    assert_eq!(
        h.restaurants.delete(restaurant.id).await.unwrap_err().to_string(),
        "Restaurant not found"
    );
}

#[tokio::test]
async fn test_confirm_twice_fails_second_time() {
    let h = Harness::new();
    let restaurant = h.nominate_active("Luigi's", false).await;

    h.restaurants.confirm_upcoming(restaurant.id, None).await.unwrap();
    let err = h
        .restaurants
        .confirm_upcoming(restaurant.id, None)
        .await
        .unwrap_err();

    assert!(matches!(err, UsecaseError::InvalidTransition(_)));
}

#[tokio::test]
async fn test_update_escape_hatch_and_rating_protection() {
    let h = Harness::new();
    let restaurant = h.nominate("Luigi's", false).await;
    h.visits.submit_rating(restaurant.id, 7, 6.0).await.unwrap();

    let updated = h
        .restaurants
        .update(
            restaurant.id,
            RestaurantPatch {
                state: Some("visited".to_string()),
                menu_link: Some(Some("https://luigis.example/menu".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.state, RestaurantState::Visited);
    assert!(updated.visited_at.is_some());
    assert_eq!(updated.average_rating, 6.0);
    assert_eq!(updated.menu_link.as_deref(), Some("https://luigis.example/menu"));
}

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let h = Harness::new();
    h.nominate_active("Zeppoli", false).await;
    h.nominate_active("alfredo's", false).await;
    h.nominate("Pho Corner", false).await;

    let active = h
        .restaurants
        .list(RestaurantQuery {
            state: Some(RestaurantState::Active),
            sort: SortOrder::Name,
            ..Default::default()
        })
        .await
        .unwrap();
    let names: Vec<&str> = active.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["alfredo's", "Zeppoli"]);

    let searched = h
        .restaurants
        .list(RestaurantQuery {
            search: Some("pho".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].name, "Pho Corner");
}

#[tokio::test]
async fn test_stats_summary() {
    let h = Harness::new();
    let visited = h.nominate_active("Trattoria", false).await;
    h.restaurants.confirm_upcoming(visited.id, None).await.unwrap();
    h.restaurants.mark_visited(visited.id, None).await.unwrap();
    h.visits.submit_rating(visited.id, 1, 9.0).await.unwrap();
    h.visits.mark_attendance(visited.id, vec![2]).await.unwrap();
    h.nominate("Pending Place", false).await;

    let stats = h.stats.summary().await.unwrap();

    assert_eq!(stats.restaurants_by_state[0].count, 1);
    assert_eq!(stats.restaurants_by_state[3].count, 1);
    assert_eq!(stats.attended_visits, 2);
    assert_eq!(stats.ratings, 1);
    assert_eq!(stats.top_rated.len(), 1);
    assert_eq!(stats.top_rated[0].average_rating, 9.0);
}

#[tokio::test]
async fn test_stale_edit_does_not_undo_confirmation() {
    let h = Harness::new();
    let restaurant = h.nominate_active("Luigi's", false).await;
    let mut stale_edit = restaurant.clone();
    stale_edit.name = "Luigi's Trattoria".to_string();

    h.restaurants.confirm_upcoming(restaurant.id, None).await.unwrap();

    let written = h
        .store
        .update(&stale_edit, restaurant.updated_at)
        .await
        .unwrap();
    assert!(written.is_none());

    let renamed = h
        .restaurants
        .update(
            restaurant.id,
            RestaurantPatch {
                name: Some("Luigi's Trattoria".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Luigi's Trattoria");
    assert_eq!(renamed.state, RestaurantState::Upcoming);
}

#[tokio::test]
async fn test_search_treats_wildcards_literally() {
    let h = Harness::new();
    h.nominate("Pho Corner", false).await;
    h.nominate("100% Burger", false).await;

    let underscore = h
        .restaurants
        .list(RestaurantQuery {
            search: Some("_".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(underscore.is_empty());

    let percent = h
        .restaurants
        .list(RestaurantQuery {
            search: Some("100%".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].name, "100% Burger");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_ratings_both_count() {
    let h = Harness::new();
    let restaurant = h.nominate_active("Luigi's", false).await;

    let (first, second) = tokio::join!(
        h.visits.submit_rating(restaurant.id, 7, 8.0),
        h.visits.submit_rating(restaurant.id, 9, 6.0),
    );
    first.unwrap();
    second.unwrap();

    let stored = h.restaurants.get(restaurant.id).await.unwrap();
    assert_eq!(stored.average_rating, 7.0);
}
