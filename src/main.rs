mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::delivery::http::v1::middleware::auth_middleware;
use crate::delivery::http::v1::{restaurants, stats, visits, wheel};
use crate::repository::postgres::{create_pool, PostgresRestaurantRepository, PostgresVisitRepository};
use crate::usecase::error::UsecaseError;
use crate::usecase::jwt::JwtService;
use crate::usecase::restaurants::RestaurantsUseCase;
use crate::usecase::stats::StatsUseCase;
use crate::usecase::visits::VisitsUseCase;
use crate::usecase::wheel::WheelUseCase;

pub struct AppState {
    pub restaurants_usecase: RestaurantsUseCase<PostgresRestaurantRepository>,
    pub visits_usecase: VisitsUseCase<PostgresVisitRepository, PostgresRestaurantRepository>,
    pub wheel_usecase: WheelUseCase<PostgresRestaurantRepository>,
    pub stats_usecase: StatsUseCase<PostgresRestaurantRepository, PostgresVisitRepository>,
    pub jwt_service: JwtService,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.telemetry_enabled {
        let telemetry_config = telemetry::TelemetryConfig::from(&config);
        telemetry::init_telemetry_with_subscriber(&telemetry_config, env_filter)
            .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
    }

    tracing::info!("starting the wheel service");

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    tracing::info!(telemetry_enabled = config.telemetry_enabled, "config loaded");

    let pool = create_pool(&config.database_url, config.database_max_connections).await?;
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let shared_state = Arc::new(AppState {
        restaurants_usecase: RestaurantsUseCase::new(PostgresRestaurantRepository::new(pool.clone())),
        visits_usecase: VisitsUseCase::new(
            PostgresVisitRepository::new(pool.clone()),
            PostgresRestaurantRepository::new(pool.clone()),
        ),
        wheel_usecase: WheelUseCase::new(PostgresRestaurantRepository::new(pool.clone())),
        stats_usecase: StatsUseCase::new(
            PostgresRestaurantRepository::new(pool.clone()),
            PostgresVisitRepository::new(pool),
        ),
        jwt_service: JwtService::new(config.jwt_secret.clone()),
        metrics_handle,
    });

    // Everything under /api/v1 requires a bearer token; admin checks happen per handler
    let api = Router::new()
        .route(
            "/api/v1/restaurants",
            get(restaurants::list_restaurants).post(restaurants::create_restaurant),
        )
        .route(
            "/api/v1/restaurants/{id}",
            get(restaurants::get_restaurant)
                .patch(restaurants::update_restaurant)
                .delete(restaurants::delete_restaurant),
        )
        .route("/api/v1/restaurants/{id}/approve", post(restaurants::approve_restaurant))
        .route("/api/v1/restaurants/{id}/reject", post(restaurants::reject_restaurant))
        .route("/api/v1/restaurants/{id}/confirm-upcoming", post(restaurants::confirm_upcoming))
        .route("/api/v1/restaurants/{id}/mark-visited", post(restaurants::mark_visited))
        .route("/api/v1/wheel/active", get(wheel::list_active))
        .route("/api/v1/wheel/spin", post(wheel::spin))
        .route("/api/v1/visits/{restaurant_id}", get(visits::list_visits))
        .route("/api/v1/visits/{restaurant_id}/attendance", post(visits::mark_attendance))
        .route("/api/v1/visits/{restaurant_id}/rate", post(visits::submit_rating))
        .route("/api/v1/visits/{restaurant_id}/recalculate", post(visits::recalculate_average))
        .route("/api/v1/stats", get(stats::get_stats))
        .layer(middleware::from_fn_with_state(
            shared_state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(api)
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "wheel service listening");
    axum::serve(listener, router).await?;

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

async fn route_not_found() -> UsecaseError {
    UsecaseError::NotFound("Route".to_string())
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
