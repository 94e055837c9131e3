//! External collaborators behind traits. The scoring pipeline is generic over
//! these so tests inject fakes and never touch the network; the live
//! implementations call TomTom (routing + traffic), OpenWeather and the
//! community report store over HTTP with a fixed per-request timeout.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::geomath::{polyline_length_meters, GeoPoint};
use crate::risk::{TrafficFlow, WeatherObservation};

/// Upper bound on any single outbound provider call. A slow upstream is
/// treated the same as an unavailable one.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(3);

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const TOMTOM_TRAFFIC_URL: &str =
    "https://api.tomtom.com/traffic/services/4/flowSegmentData/absolute/10/json";
const TOMTOM_ROUTING_BASE: &str = "https://api.tomtom.com/routing/1/calculateRoute";

fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .context("building http client")
}

/// A route candidate as returned by the routing provider, already normalized
/// into a single ordered point sequence.
#[derive(Debug, Clone)]
pub struct RawRoute {
    pub polyline: Vec<GeoPoint>,
    pub length_meters: f64,
    pub travel_time_seconds: f64,
}

/// An active incident report near a location. Expiry is enforced by the
/// store; `created_at` drives the client-side recency window.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRecord {
    pub lat: f64,
    pub lon: f64,
    pub created_at: DateTime<Utc>,
}

pub trait WeatherProvider: Send + Sync {
    /// `Ok(None)` means the provider answered but had no usable data.
    fn current_conditions(
        &self,
        at: GeoPoint,
    ) -> impl Future<Output = anyhow::Result<Option<WeatherObservation>>> + Send;
}

pub trait TrafficProvider: Send + Sync {
    fn flow_near(
        &self,
        at: GeoPoint,
    ) -> impl Future<Output = anyhow::Result<Option<TrafficFlow>>> + Send;
}

pub trait ReportStore: Send + Sync {
    /// Count of active reports within `radius_deg` of `center` created at or
    /// after `since`.
    fn active_report_count(
        &self,
        center: GeoPoint,
        radius_deg: f64,
        since: DateTime<Utc>,
    ) -> impl Future<Output = anyhow::Result<usize>> + Send;
}

pub trait RoutingProvider: Send + Sync {
    fn fetch_candidates(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        alternatives: usize,
    ) -> impl Future<Output = anyhow::Result<Vec<RawRoute>>> + Send;
}

// --- OpenWeather ---

pub struct OpenWeatherClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct OwmResponse {
    main: OwmMain,
    #[serde(default = "default_visibility")]
    visibility: f64,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    wind: OwmWind,
}

#[derive(Deserialize)]
struct OwmMain {
    temp: f64,
}

#[derive(Deserialize)]
struct OwmCondition {
    main: String,
}

#[derive(Deserialize)]
struct OwmWind {
    speed: f64,
}

fn default_visibility() -> f64 {
    10_000.0
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
        })
    }
}

impl WeatherProvider for OpenWeatherClient {
    async fn current_conditions(
        &self,
        at: GeoPoint,
    ) -> anyhow::Result<Option<WeatherObservation>> {
        let response = self
            .http
            .get(OPENWEATHER_URL)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .context("openweather request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: OwmResponse = response.json().await.context("openweather payload")?;
        Ok(Some(WeatherObservation {
            temperature_c: body.main.temp,
            visibility: body.visibility,
            condition: body
                .weather
                .first()
                .map(|c| c.main.clone())
                .unwrap_or_default(),
            wind_speed: body.wind.speed,
        }))
    }
}

// --- TomTom traffic flow ---

pub struct TomTomTrafficClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowResponse {
    flow_segment_data: FlowSegmentData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowSegmentData {
    current_speed: f64,
    free_flow_speed: f64,
}

impl TomTomTrafficClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
        })
    }
}

impl TrafficProvider for TomTomTrafficClient {
    async fn flow_near(&self, at: GeoPoint) -> anyhow::Result<Option<TrafficFlow>> {
        let response = self
            .http
            .get(TOMTOM_TRAFFIC_URL)
            .query(&[
                ("point", format!("{},{}", at.lat, at.lon)),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .context("tomtom traffic request")?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: FlowResponse = response.json().await.context("tomtom traffic payload")?;
        Ok(Some(TrafficFlow {
            current_speed: body.flow_segment_data.current_speed,
            free_flow_speed: body.flow_segment_data.free_flow_speed,
        }))
    }
}

// --- Community report store ---

pub struct HttpReportStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReportStore {
    pub fn new(base_url: String) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url,
        })
    }
}

impl ReportStore for HttpReportStore {
    async fn active_report_count(
        &self,
        center: GeoPoint,
        radius_deg: f64,
        since: DateTime<Utc>,
    ) -> anyhow::Result<usize> {
        let url = format!("{}/reports/active", self.base_url.trim_end_matches('/'));
        let records: Vec<ReportRecord> = self
            .http
            .get(&url)
            .query(&[
                ("lat", center.lat.to_string()),
                ("lon", center.lon.to_string()),
                ("radius_deg", radius_deg.to_string()),
                ("since", since.to_rfc3339()),
            ])
            .send()
            .await
            .context("report store request")?
            .error_for_status()
            .context("report store status")?
            .json()
            .await
            .context("report store payload")?;

        Ok(count_relevant_reports(&records, center, radius_deg, since))
    }
}

/// The store already bounds its answer, but the recency window and radius are
/// scoring concerns, so they are re-applied here against the raw records.
pub fn count_relevant_reports(
    records: &[ReportRecord],
    center: GeoPoint,
    radius_deg: f64,
    since: DateTime<Utc>,
) -> usize {
    records
        .iter()
        .filter(|r| {
            (r.lat - center.lat).abs() <= radius_deg
                && (r.lon - center.lon).abs() <= radius_deg
                && r.created_at >= since
        })
        .count()
}

// --- TomTom routing ---

pub struct TomTomRoutingClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct RoutingResponse {
    #[serde(default)]
    routes: Vec<TomTomRoute>,
}

/// TomTom returns either a flattened `points` list or per-leg sectioned
/// geometry depending on the request shape; both are accepted.
#[derive(Deserialize)]
struct TomTomRoute {
    summary: TomTomSummary,
    #[serde(default)]
    points: Vec<TomTomPoint>,
    #[serde(default)]
    legs: Vec<TomTomLeg>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TomTomSummary {
    #[serde(default)]
    length_in_meters: f64,
    #[serde(default)]
    travel_time_in_seconds: f64,
}

#[derive(Deserialize)]
struct TomTomLeg {
    #[serde(default)]
    points: Vec<TomTomPoint>,
}

#[derive(Deserialize)]
struct TomTomPoint {
    latitude: f64,
    longitude: f64,
}

impl TomTomRoutingClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client()?,
            api_key,
        })
    }
}

impl RoutingProvider for TomTomRoutingClient {
    async fn fetch_candidates(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        alternatives: usize,
    ) -> anyhow::Result<Vec<RawRoute>> {
        let locations = format!(
            "{},{}:{},{}",
            origin.lat, origin.lon, destination.lat, destination.lon
        );
        let url = format!("{TOMTOM_ROUTING_BASE}/{locations}/json");
        let body: RoutingResponse = self
            .http
            .get(&url)
            .query(&[
                ("travelMode", "pedestrian".to_string()),
                ("maxAlternatives", alternatives.saturating_sub(1).to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .context("tomtom routing request")?
            .error_for_status()
            .context("tomtom routing status")?
            .json()
            .await
            .context("tomtom routing payload")?;

        Ok(body
            .routes
            .into_iter()
            .filter_map(normalize_route)
            .collect())
    }
}

/// Flattens whichever geometry shape the provider used into one ordered
/// GeoPoint sequence. Candidates without at least two usable points are
/// dropped here, before ranking ever sees them.
fn normalize_route(route: TomTomRoute) -> Option<RawRoute> {
    let raw_points: Vec<&TomTomPoint> = if route.points.is_empty() {
        route.legs.iter().flat_map(|leg| leg.points.iter()).collect()
    } else {
        route.points.iter().collect()
    };

    let polyline: Vec<GeoPoint> = raw_points
        .iter()
        .filter_map(|p| GeoPoint::new(p.latitude, p.longitude).ok())
        .collect();

    if polyline.len() < 2 {
        warn!("dropping route candidate with no usable geometry");
        return None;
    }

    let length_meters = if route.summary.length_in_meters > 0.0 {
        route.summary.length_in_meters
    } else {
        polyline_length_meters(&polyline)
    };

    Some(RawRoute {
        polyline,
        length_meters,
        travel_time_seconds: route.summary.travel_time_in_seconds,
    })
}
