pub mod api;
mod catalog;
mod config;
mod feed;
mod geo;
mod models;
mod progress;
mod providers;
mod resolver;
mod session;
mod timeline;

use std::sync::Arc;

use axum::{routing::get, Router};
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api::AppState;
use config::Config;
use providers::geocode::GeocodeClient;
use providers::live::LiveClient;
use providers::routing::RoutingClient;
use providers::ProviderClient;
use resolver::RouteResolver;
use session::SessionManager;

#[derive(OpenApi)]
#[openapi(
    info(title = "Digimarg Trip API", version = "0.1.0"),
    paths(
        api::routes::list_routes,
        api::routes::get_route,
        api::trips::start_trip,
        api::trips::get_trip,
        api::trips::pause_trip,
        api::trips::resume_trip,
        api::trips::reset_trip,
        api::trips::clear_trip,
    ),
    components(schemas(
        api::ErrorResponse,
        api::routes::RouteSummary,
        api::routes::RouteListResponse,
        catalog::RouteRecord,
        catalog::CatalogStop,
        catalog::BusRecord,
        models::StartTripRequest,
        models::ByVehicle,
        models::ByPlaces,
        models::TripSnapshot,
        timeline::TimelineEntry,
        geo::GeoPoint,
        feed::FeedState,
        resolver::ResolveWarning,
    )),
    tags(
        (name = "routes", description = "Catalogued route information"),
        (name = "trip", description = "Trip tracking and progress")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    tracing::info!(
        average_speed_kmh = config.trip.average_speed_kmh,
        "Loaded configuration"
    );

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode explicitly enabled (all origins allowed) - DO NOT USE IN PRODUCTION");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true' for development");
    };

    // Wire up providers with a shared diagnostics channel
    let (provider_requests_tx, _) = broadcast::channel(256);
    let provider_client =
        ProviderClient::new(provider_requests_tx.clone()).expect("Failed to build HTTP client");
    let geocoder = GeocodeClient::new(provider_client.clone(), &config.geocoder);
    let routing = RoutingClient::new(provider_client.clone(), &config.router);
    let live_client = LiveClient::new(provider_client, &config.live_feed);

    let resolver = Arc::new(RouteResolver::new(geocoder, routing));
    let session = SessionManager::new(&config.trip, Some(live_client));

    let state = AppState {
        session,
        resolver,
        provider_requests_tx,
    };

    // Build the app
    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind to port 3000");

    tracing::info!("Server running on http://localhost:3000");
    tracing::info!("Swagger UI: http://localhost:3000/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

async fn root() -> &'static str {
    "Digimarg Trip API"
}
