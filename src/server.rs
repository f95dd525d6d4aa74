use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::cache::ResponseCache;
use crate::config::DashboardConfig;
use crate::dashboard::{Dashboard, Landing, Notice};
use crate::ons::endpoints::{self, Endpoint};
use crate::ons::{OnsClient, PayloadSource};
use crate::registry::{ChartGrouping, RegistryEvent};
use crate::series::{NamedSeries, SeriesStats};

#[derive(Clone)]
struct AppState {
    ons_client: Arc<OnsClient>,
    dashboard: Arc<Mutex<Dashboard>>,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize)]
struct EndpointInfo {
    id: String,
    category: String,
    name: String,
    grouping: String,
    label: String,
}

impl From<&Endpoint> for EndpointInfo {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            id: endpoint.id.to_string(),
            category: endpoint.category.to_string(),
            name: endpoint.name.to_string(),
            grouping: endpoint.grouping.to_string(),
            label: endpoint.tag.to_string(),
        }
    }
}

#[derive(Serialize)]
struct CategoryInfo {
    category: String,
    endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
struct SeriesView {
    #[serde(flatten)]
    series: NamedSeries,
    stats: Option<SeriesStats>,
}

#[derive(Serialize)]
struct GroupingView {
    grouping: String,
    #[serde(flatten)]
    chart: ChartGrouping,
    stats: Vec<(String, Option<SeriesStats>)>,
}

impl GroupingView {
    fn new(grouping: &str, chart: &ChartGrouping) -> Self {
        Self {
            grouping: grouping.to_string(),
            stats: chart
                .series()
                .iter()
                .map(|s| (s.tag.to_string(), s.stats()))
                .collect(),
            chart: chart.clone(),
        }
    }
}

#[derive(Serialize)]
struct SelectionResponse {
    endpoint: String,
    landing: Landing,
}

/// GET /api/v1/endpoints
/// List the selectable ONS endpoints by category
async fn list_endpoints() -> Json<ApiResponse<Vec<CategoryInfo>>> {
    let categories = endpoints::by_category()
        .into_iter()
        .map(|(category, list)| CategoryInfo {
            category: category.to_string(),
            endpoints: list.into_iter().map(EndpointInfo::from).collect(),
        })
        .collect();

    Json(ApiResponse::success(categories))
}

/// POST /api/v1/selection/:endpoint
/// Select an endpoint: fetch through the cache and place its series
async fn select_endpoint(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
) -> Result<Json<ApiResponse<SelectionResponse>>, StatusCode> {
    let now = Utc::now();

    // The lock is released while the request is in flight
    let cached = {
        let mut dashboard = state.dashboard.lock().await;
        dashboard
            .select(&endpoint)
            .map_err(|_| StatusCode::NOT_FOUND)?;
        dashboard.fresh_payload(&endpoint, now)
    };

    let payload = match cached {
        Some(payload) => payload,
        None => {
            let outcome = state.ons_client.fetch(&endpoint).await;
            let settled = state
                .dashboard
                .lock()
                .await
                .settle_fetch(&endpoint, outcome, now);

            match settled {
                Ok(payload) => payload,
                Err(e) => {
                    error!("ONS API error for {}: {}", endpoint, e);
                    return Ok(Json(ApiResponse::error(
                        Notice::from(&e).message().to_string(),
                    )));
                }
            }
        }
    };

    let landing = state.dashboard.lock().await.land(&endpoint, payload);

    Ok(Json(ApiResponse::success(SelectionResponse {
        endpoint,
        landing,
    })))
}

/// GET /api/v1/selection
/// Endpoints currently selected
async fn list_selection(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    let dashboard = state.dashboard.lock().await;
    let selected = dashboard.selected().map(str::to_string).collect();
    Json(ApiResponse::success(selected))
}

/// DELETE /api/v1/selection/:endpoint
/// Deselect an endpoint and remove its series
async fn deselect_endpoint(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
) -> Json<ApiResponse<Vec<RegistryEvent>>> {
    let events = state.dashboard.lock().await.deselect(&endpoint);
    Json(ApiResponse::success(events))
}

/// GET /api/v1/groupings
/// List groupings that currently hold series
async fn list_groupings(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    let dashboard = state.dashboard.lock().await;
    let keys = dashboard
        .registry()
        .grouping_keys()
        .map(str::to_string)
        .collect();

    Json(ApiResponse::success(keys))
}

/// GET /api/v1/groupings/:grouping
/// Chart data of one grouping: every series on the 48-slot grid
async fn get_grouping(
    State(state): State<AppState>,
    Path(grouping): Path<String>,
) -> Result<Json<ApiResponse<GroupingView>>, StatusCode> {
    let dashboard = state.dashboard.lock().await;
    let chart = dashboard
        .registry()
        .grouping(&grouping)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiResponse::success(GroupingView::new(&grouping, chart))))
}

/// GET /api/v1/groupings/:grouping/:label
/// One series with its summary statistics
async fn get_series(
    State(state): State<AppState>,
    Path((grouping, label)): Path<(String, String)>,
) -> Result<Json<ApiResponse<SeriesView>>, StatusCode> {
    let dashboard = state.dashboard.lock().await;
    let series = dashboard
        .registry()
        .grouping(&grouping)
        .and_then(|g| g.series().iter().find(|s| s.tag.label() == label))
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiResponse::success(SeriesView {
        stats: series.stats(),
        series: series.clone(),
    })))
}

/// POST /api/v1/reset
/// Drop selection, cache and charts
async fn reset(State(state): State<AppState>) -> Json<ApiResponse<Vec<RegistryEvent>>> {
    let events = state.dashboard.lock().await.reset();
    Json(ApiResponse::success(events))
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

pub async fn start_server(config: DashboardConfig) -> anyhow::Result<()> {
    let state = AppState {
        ons_client: Arc::new(OnsClient::new(config.base_url.clone())),
        dashboard: Arc::new(Mutex::new(Dashboard::new(
            ResponseCache::new(config.cache_duration),
            config.utc_offset,
        ))),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/endpoints", get(list_endpoints))
        .route("/api/v1/selection", get(list_selection))
        .route(
            "/api/v1/selection/{endpoint}",
            post(select_endpoint).delete(deselect_endpoint),
        )
        .route("/api/v1/groupings", get(list_groupings))
        .route("/api/v1/groupings/{grouping}", get(get_grouping))
        .route("/api/v1/groupings/{grouping}/{label}", get(get_series))
        .route("/api/v1/reset", post(reset))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);
    info!("Available endpoints:");
    info!("  GET    /health");
    info!("  GET    /api/v1/endpoints");
    info!("  GET    /api/v1/selection");
    info!("  POST   /api/v1/selection/:endpoint");
    info!("  DELETE /api/v1/selection/:endpoint");
    info!("  GET    /api/v1/groupings");
    info!("  GET    /api/v1/groupings/:grouping");
    info!("  GET    /api/v1/groupings/:grouping/:label");
    info!("  POST   /api/v1/reset");

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SeriesRegistry;
    use crate::series::{SeriesTag, absent_points};

    #[test]
    fn test_grouping_view_shape() {
        let mut registry = SeriesRegistry::new();
        let mut points = absent_points();
        points[0].value = Some(10.0);
        registry.upsert("SIN", SeriesTag::Hydro, points);

        let view = GroupingView::new("SIN", registry.grouping("SIN").unwrap());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["grouping"], "SIN");
        assert_eq!(json["policy"], "Derived");
        assert_eq!(json["series"][0]["label"], "Hydro");
        assert_eq!(json["series"][1]["label"], "Total");
        assert_eq!(json["series"][1]["points"][0]["value"], 10.0);
        assert_eq!(json["stats"][0][0], "Hydro");
        assert_eq!(json["stats"][0][1]["max"], 10.0);
    }

    #[test]
    fn test_api_response_envelope() {
        let json = serde_json::to_value(ApiResponse::<()>::error("boom".to_string())).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["data"].is_null());
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_endpoint_info() {
        let info = EndpointInfo::from(endpoints::get_endpoint("Carga_Regioes_json").unwrap());
        assert_eq!(info.label, "Load");
        assert_eq!(info.grouping, "Regioes");
    }
}
