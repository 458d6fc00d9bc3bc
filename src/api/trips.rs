use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{AppState, ErrorResponse};
use crate::models::{StartTripRequest, TripSnapshot};
use crate::resolver::ResolveError;
use crate::session::SessionError;

fn error_response(status: StatusCode, error: String) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error }))
}

fn resolve_error_response(error: ResolveError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        ResolveError::GeocodeNotFound { .. } | ResolveError::RouteNotFound => {
            StatusCode::NOT_FOUND
        }
        ResolveError::InvalidRouteData(_) | ResolveError::Provider(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, error.to_string())
}

fn session_error_response(error: SessionError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        SessionError::NoActiveTrip => StatusCode::NOT_FOUND,
        SessionError::NotPaused => StatusCode::CONFLICT,
    };
    error_response(status, error.to_string())
}

/// Start tracking a trip, replacing any active one
///
/// Exactly one of `by_vehicle` and `by_places` must be set. Resolution
/// failures are terminal: the previous trip (if any) stays untouched and no
/// new one is created.
#[utoipa::path(
    post,
    path = "/api/trip",
    request_body = StartTripRequest,
    responses(
        (status = 200, description = "Trip started", body = TripSnapshot),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 404, description = "Place or route could not be resolved", body = ErrorResponse),
        (status = 502, description = "Upstream provider failure", body = ErrorResponse)
    ),
    tag = "trip"
)]
pub async fn start_trip(
    State(state): State<AppState>,
    Json(request): Json<StartTripRequest>,
) -> Result<Json<TripSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let resolved = match (request.by_vehicle, request.by_places) {
        (Some(vehicle), None) => state.resolver.resolve_vehicle(&vehicle.bus_number),
        (None, Some(places)) => state
            .resolver
            .resolve_places(&places.from, &places.to)
            .await
            .map_err(resolve_error_response)?,
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "Exactly one of 'by_vehicle' and 'by_places' must be set".to_string(),
            ));
        }
    };

    let snapshot = state.session.start_trip(resolved, request.simulate).await;
    Ok(Json(snapshot))
}

/// Get the current trip snapshot
#[utoipa::path(
    get,
    path = "/api/trip",
    responses(
        (status = 200, description = "Current trip state", body = TripSnapshot),
        (status = 404, description = "No active trip", body = ErrorResponse)
    ),
    tag = "trip"
)]
pub async fn get_trip(
    State(state): State<AppState>,
) -> Result<Json<TripSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    state
        .session
        .snapshot()
        .await
        .map(Json)
        .ok_or_else(|| session_error_response(SessionError::NoActiveTrip))
}

/// Pause the active trip, freezing its position
#[utoipa::path(
    post,
    path = "/api/trip/pause",
    responses(
        (status = 200, description = "Trip paused", body = TripSnapshot),
        (status = 404, description = "No active trip", body = ErrorResponse)
    ),
    tag = "trip"
)]
pub async fn pause_trip(
    State(state): State<AppState>,
) -> Result<Json<TripSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    state
        .session
        .pause()
        .await
        .map(Json)
        .map_err(session_error_response)
}

/// Resume a paused trip from its last position
#[utoipa::path(
    post,
    path = "/api/trip/resume",
    responses(
        (status = 200, description = "Trip resumed", body = TripSnapshot),
        (status = 404, description = "No active trip", body = ErrorResponse),
        (status = 409, description = "Trip is not paused", body = ErrorResponse)
    ),
    tag = "trip"
)]
pub async fn resume_trip(
    State(state): State<AppState>,
) -> Result<Json<TripSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    state
        .session
        .resume()
        .await
        .map(Json)
        .map_err(session_error_response)
}

/// Restart the active trip from its origin
#[utoipa::path(
    post,
    path = "/api/trip/reset",
    responses(
        (status = 200, description = "Trip reset", body = TripSnapshot),
        (status = 404, description = "No active trip", body = ErrorResponse)
    ),
    tag = "trip"
)]
pub async fn reset_trip(
    State(state): State<AppState>,
) -> Result<Json<TripSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    state
        .session
        .reset()
        .await
        .map(Json)
        .map_err(session_error_response)
}

/// Stop tracking and discard the trip
#[utoipa::path(
    delete,
    path = "/api/trip",
    responses(
        (status = 204, description = "Trip cleared (or none existed)")
    ),
    tag = "trip"
)]
pub async fn clear_trip(State(state): State<AppState>) -> StatusCode {
    state.session.clear().await;
    StatusCode::NO_CONTENT
}
