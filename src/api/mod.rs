pub mod routes;
pub mod trips;
pub mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use crate::providers::ProviderRequestSender;
use crate::resolver::RouteResolver;
use crate::session::SessionManager;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone)]
pub struct AppState {
    pub session: SessionManager,
    pub resolver: Arc<RouteResolver>,
    /// Diagnostics channel fed by every outbound provider request
    pub provider_requests_tx: ProviderRequestSender,
}

/// Build the `/api` router.
pub fn router(state: AppState) -> Router {
    let trip_ws_state = ws::TripWsState {
        session: state.session.clone(),
    };
    let diagnostics_state = ws::DiagnosticsWsState::new(state.provider_requests_tx.clone());

    let rest = Router::new()
        .route("/routes", get(routes::list_routes))
        .route("/routes/{id}", get(routes::get_route))
        .route(
            "/trip",
            post(trips::start_trip)
                .get(trips::get_trip)
                .delete(trips::clear_trip),
        )
        .route("/trip/pause", post(trips::pause_trip))
        .route("/trip/resume", post(trips::resume_trip))
        .route("/trip/reset", post(trips::reset_trip))
        .with_state(state);

    let trip_ws = Router::new()
        .route("/ws/trip", get(ws::ws_trip))
        .with_state(trip_ws_state);
    let diagnostics_ws = Router::new()
        .route("/ws/diagnostics", get(ws::ws_backend_diagnostics))
        .with_state(diagnostics_state);

    rest.merge(trip_ws).merge(diagnostics_ws)
}
