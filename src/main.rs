//! Aircast - an air-quality monitoring backend with history-driven forecasts.
//!
//! # API Endpoints
//!
//! - `GET /api/air` - Current conditions at a coordinate pair (persisted)
//! - `GET /api/search` - Station keyword search
//! - `GET /api/forecast` - Trend forecast for one location
//! - `GET /api/forecast/general` - Trend forecast across all locations
//! - `GET /api/stats/health` - Band percentages and daily averages
//! - `GET /api/stats/detailed` - Aggregate stats and per-location rollup
//! - `GET /health` - Health check

use std::env;
use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use aircast::api::{
    AppState, get_air, get_detailed_stats, get_forecast, get_general_forecast,
    get_health_stats, get_search, health_check,
};
use aircast::data_sources::WaqiClient;
use aircast::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:aircast.db?mode=rwc";

/// Default WAQI token. The public demo token is heavily rate limited; set
/// `AIRCAST_WAQI_TOKEN` for real use.
const DEFAULT_WAQI_TOKEN: &str = "demo";

/// Process configuration, read once at startup and passed into constructors.
/// No module holds ambient global state.
struct Config {
    port: u16,
    database_url: String,
    waqi_token: String,
}

impl Config {
    fn from_env() -> Self {
        let port = env::var("AIRCAST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let database_url =
            env::var("AIRCAST_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        let waqi_token =
            env::var("AIRCAST_WAQI_TOKEN").unwrap_or_else(|_| DEFAULT_WAQI_TOKEN.to_string());

        Self {
            port,
            database_url,
            waqi_token,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("aircast=info".parse()?))
        .init();

    let config = Config::from_env();

    info!(
        port = config.port,
        db_url = %config.database_url,
        "Starting Aircast server"
    );

    // Initialize storage
    let storage = Storage::new(&config.database_url).await?;
    info!("Database initialized");

    // Create application state
    let state = AppState {
        storage,
        provider: WaqiClient::new(&config.waqi_token),
    };

    // Build router
    let app = Router::new()
        .route("/api/air", get(get_air))
        .route("/api/search", get(get_search))
        .route("/api/forecast", get(get_forecast))
        .route("/api/forecast/general", get(get_general_forecast))
        .route("/api/stats/health", get(get_health_stats))
        .route("/api/stats/detailed", get(get_detailed_stats))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Aircast is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
