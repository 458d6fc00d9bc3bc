use axum::extract::Path;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::ErrorResponse;
use crate::catalog::{self, RouteRecord};

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteSummary {
    pub id: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub stop_count: usize,
    pub bus_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteSummary>,
    pub count: usize,
}

/// List all catalogued routes
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "All catalogued routes", body = RouteListResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes() -> Json<RouteListResponse> {
    let routes: Vec<RouteSummary> = catalog::all_routes()
        .iter()
        .map(|route| RouteSummary {
            id: route.id.clone(),
            name: route.name.clone(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
            stop_count: route.stops.len(),
            bus_count: route.buses.len(),
        })
        .collect();
    let count = routes.len();
    Json(RouteListResponse { routes, count })
}

/// Get a catalogued route with its stops and buses
#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    params(
        ("id" = String, Path, description = "Route identifier, e.g. PB001")
    ),
    responses(
        (status = 200, description = "Route detail", body = RouteRecord),
        (status = 404, description = "Route not found", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route(
    Path(id): Path<String>,
) -> Result<Json<RouteRecord>, (StatusCode, Json<ErrorResponse>)> {
    catalog::find_route(&id)
        .map(|route| Json(route.clone()))
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Route '{}' not found", id),
                }),
            )
        })
}
