mod aggregate;
mod config;
mod error;
mod geomath;
mod providers;
mod risk;
mod sampler;
mod scoring;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::aggregate::{RouteAggregator, RouteCandidate, DEFAULT_ALPHA, DEFAULT_ALTERNATIVES};
use crate::config::Settings;
use crate::error::SafewalkError;
use crate::geomath::GeoPoint;
use crate::providers::{
    HttpReportStore, OpenWeatherClient, RoutingProvider, TomTomRoutingClient, TomTomTrafficClient,
};
use crate::scoring::{RiskBreakdown, SegmentScorer};

type LiveAggregator = RouteAggregator<OpenWeatherClient, TomTomTrafficClient, HttpReportStore>;

// Shared state for concurrency; per-request scoring holds no locks.
struct AppState {
    routing: TomTomRoutingClient,
    aggregator: LiveAggregator,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // 1. Injected provider configuration; missing credentials are fatal here.
    let settings = Settings::from_env()?;

    // 2. Live provider clients
    let weather = OpenWeatherClient::new(settings.openweather_api_key.clone())?;
    let traffic = TomTomTrafficClient::new(settings.tomtom_api_key.clone())?;
    let reports = HttpReportStore::new(settings.reports_base_url.clone())?;
    let routing = TomTomRoutingClient::new(settings.tomtom_api_key.clone())?;

    let aggregator = RouteAggregator::new(SegmentScorer::new(weather, traffic, reports));
    let shared_state = Arc::new(AppState {
        routing,
        aggregator,
    });

    // 3. CORS (allows the mobile client / local pages to talk to this API)
    let cors = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_origin(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    // 4. Router
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/route", post(calculate_route))
        .route("/zone-status", get(zone_status))
        .layer(cors)
        .with_state(shared_state);

    info!("API server running on http://{}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- API DTOs ---

#[derive(Deserialize)]
struct RouteRequest {
    origin: [f64; 2],      // [lat, lon]
    destination: [f64; 2], // [lat, lon]
    /// Safety preference: 0.0 = shortest wins, 1.0 = safest wins.
    alpha: Option<f64>,
    alternatives: Option<usize>,
    departure_time: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct RouteResponse {
    shortest: RouteSummary,
    safest: RouteSummary,
    balanced: RouteSummary,
}

#[derive(Serialize)]
struct RouteSummary {
    geometry: GeoJsonLineString,
    distance_meters: f64,
    duration_seconds: f64,
    /// Average ISC on a 0-100 display scale.
    safety_score: f64,
    optimal_cost: f64,
    unsafe_segments: Vec<UnsafeSegmentDto>,
    segments: Vec<SegmentScoreDto>,
}

#[derive(Serialize)]
struct GeoJsonLineString {
    r#type: String,
    coordinates: Vec<[f64; 2]>, // [lon, lat] standard for GeoJSON
}

#[derive(Serialize)]
struct UnsafeSegmentDto {
    index: usize,
    location: [f64; 2], // [lon, lat]
    isc: f64,
}

#[derive(Serialize)]
struct SegmentScoreDto {
    start: [f64; 2],
    end: [f64; 2],
    isc: f64,
    breakdown: RiskBreakdown,
}

#[derive(Deserialize)]
struct ZoneQuery {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct ZoneStatusResponse {
    location: [f64; 2],
    isc: f64,
    safety_score: f64,
    status: &'static str,
    breakdown: RiskBreakdown,
}

// --- Handlers ---

async fn calculate_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, SafewalkError> {
    // Input validation happens before any external call.
    let origin = GeoPoint::new(payload.origin[0], payload.origin[1])?;
    let destination = GeoPoint::new(payload.destination[0], payload.destination[1])?;
    let alpha = payload.alpha.unwrap_or(DEFAULT_ALPHA).clamp(0.0, 1.0);
    let alternatives = payload.alternatives.unwrap_or(DEFAULT_ALTERNATIVES).max(1);
    let at = payload.departure_time.unwrap_or_else(Utc::now);

    let raw_routes = state
        .routing
        .fetch_candidates(origin, destination, alternatives)
        .await
        .map_err(SafewalkError::Upstream)?;

    let ranked = state.aggregator.score_and_rank(raw_routes, alpha, at).await?;

    Ok(Json(RouteResponse {
        shortest: summarize(&ranked.shortest),
        safest: summarize(&ranked.safest),
        balanced: summarize(&ranked.balanced),
    }))
}

async fn zone_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ZoneQuery>,
) -> Result<Json<ZoneStatusResponse>, SafewalkError> {
    let point = GeoPoint::new(query.lat, query.lon)?;
    let (scored, level) = state
        .aggregator
        .scorer()
        .zone_status(point, Utc::now())
        .await;

    Ok(Json(ZoneStatusResponse {
        location: [point.lon, point.lat],
        isc: scored.isc,
        safety_score: scored.isc * 100.0,
        status: level.as_str(),
        breakdown: scored.breakdown,
    }))
}

fn summarize(candidate: &RouteCandidate) -> RouteSummary {
    RouteSummary {
        geometry: GeoJsonLineString {
            r#type: "LineString".to_string(),
            coordinates: candidate.polyline.iter().map(|p| [p.lon, p.lat]).collect(),
        },
        distance_meters: candidate.length_meters,
        duration_seconds: candidate.travel_time_seconds,
        safety_score: candidate.average_isc * 100.0,
        optimal_cost: candidate.optimal_cost,
        unsafe_segments: candidate
            .unsafe_segments
            .iter()
            .map(|s| UnsafeSegmentDto {
                index: s.index,
                location: [s.location.lon, s.location.lat],
                isc: s.isc,
            })
            .collect(),
        segments: candidate
            .segments
            .iter()
            .map(|s| SegmentScoreDto {
                start: [s.segment.start.lon, s.segment.start.lat],
                end: [s.segment.end.lon, s.segment.end.lat],
                isc: s.isc,
                breakdown: s.breakdown,
            })
            .collect(),
    }
}
