//! Segment scoring. Combines the five risk factors into the Incident Safety
//! Coefficient (ISC) for a segment. External lookups for one segment run
//! concurrently; a failing provider is logged and replaced by its documented
//! default so the caller always receives a complete breakdown.

use chrono::{DateTime, Timelike, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::geomath::{GeoPoint, Segment};
use crate::providers::{ReportStore, TrafficProvider, WeatherProvider};
use crate::risk;

pub const LIGHTING_WEIGHT: f64 = 0.2;
pub const WEATHER_WEIGHT: f64 = 0.2;
pub const CROWD_WEIGHT: f64 = 0.15;
// Community reports are the most direct real-time signal and carry the most
// weight.
pub const REPORTS_WEIGHT: f64 = 0.3;
pub const TRAFFIC_WEIGHT: f64 = 0.15;

/// Segments are scored in parallel groups of this size; groups run
/// sequentially to bound concurrent outbound provider calls.
pub const SCORING_BATCH_SIZE: usize = 10;

/// The five independent sub-scores, each in [0, 1], 1 = safest.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RiskBreakdown {
    pub lighting: f64,
    pub weather: f64,
    pub crowd: f64,
    pub reports: f64,
    pub traffic: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub isc: f64,
    pub breakdown: RiskBreakdown,
}

/// Three-level display status for a single location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneLevel {
    Green,
    Yellow,
    Red,
}

impl ZoneLevel {
    /// Red strictly below 0.4, so an ISC of exactly 0.4 is yellow.
    pub fn from_isc(isc: f64) -> Self {
        if isc < 0.4 {
            ZoneLevel::Red
        } else if isc < 0.6 {
            ZoneLevel::Yellow
        } else {
            ZoneLevel::Green
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneLevel::Green => "green",
            ZoneLevel::Yellow => "yellow",
            ZoneLevel::Red => "red",
        }
    }
}

pub struct SegmentScorer<W, T, R> {
    weather: W,
    traffic: T,
    reports: R,
}

impl<W, T, R> SegmentScorer<W, T, R>
where
    W: WeatherProvider,
    T: TrafficProvider,
    R: ReportStore,
{
    pub fn new(weather: W, traffic: T, reports: R) -> Self {
        Self {
            weather,
            traffic,
            reports,
        }
    }

    /// Weighted ISC for one segment at the given departure time. Never fails:
    /// each provider-backed factor falls back to its documented default.
    pub async fn calculate_isc(&self, segment: Segment, at: DateTime<Utc>) -> ScoredSegment {
        let hour = at.hour();
        let lighting = risk::lighting_score(hour);
        let crowd = risk::crowd_score(hour);

        let since = at - risk::report_window();
        let (weather_result, traffic_result, reports_result) = tokio::join!(
            self.weather.current_conditions(segment.center),
            self.traffic.flow_near(segment.center),
            self.reports
                .active_report_count(segment.center, risk::REPORT_RADIUS_DEG, since),
        );

        let weather = match weather_result {
            Ok(observation) => risk::weather_score(observation.as_ref()),
            Err(err) => {
                warn!("weather lookup failed, using neutral default: {err:#}");
                risk::WEATHER_FALLBACK
            }
        };
        let traffic = match traffic_result {
            Ok(flow) => risk::traffic_score(flow),
            Err(err) => {
                warn!("traffic lookup failed, using neutral default: {err:#}");
                risk::TRAFFIC_FALLBACK
            }
        };
        let reports = match reports_result {
            Ok(count) => risk::reports_score(count),
            Err(err) => {
                warn!("report lookup failed, using conservative default: {err:#}");
                risk::REPORTS_FALLBACK
            }
        };

        let breakdown = RiskBreakdown {
            lighting,
            weather,
            crowd,
            reports,
            traffic,
        };
        let isc = (LIGHTING_WEIGHT * lighting
            + WEATHER_WEIGHT * weather
            + CROWD_WEIGHT * crowd
            + REPORTS_WEIGHT * reports
            + TRAFFIC_WEIGHT * traffic)
            .clamp(0.0, 1.0);

        ScoredSegment {
            segment,
            isc,
            breakdown,
        }
    }

    /// Scores sampled segments in fixed-size batches: members of a batch run
    /// in parallel, batches run sequentially. Output order matches input
    /// order.
    pub async fn score_segments(
        &self,
        segments: &[Segment],
        at: DateTime<Utc>,
    ) -> Vec<ScoredSegment> {
        let mut scored = Vec::with_capacity(segments.len());
        for batch in segments.chunks(SCORING_BATCH_SIZE) {
            let results = join_all(batch.iter().map(|seg| self.calculate_isc(*seg, at))).await;
            scored.extend(results);
        }
        scored
    }

    /// Single-point variant: scores a degenerate zero-length segment at the
    /// query point and classifies it.
    pub async fn zone_status(&self, point: GeoPoint, at: DateTime<Utc>) -> (ScoredSegment, ZoneLevel) {
        let scored = self.calculate_isc(Segment::at_point(point), at).await;
        let level = ZoneLevel::from_isc(scored.isc);
        (scored, level)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::RawRoute;
    use crate::risk::{TrafficFlow, WeatherObservation};
    use anyhow::anyhow;
    use chrono::TimeZone;

    pub(crate) fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 27, hour, 15, 0).unwrap()
    }

    pub(crate) fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    // Fakes implementing the provider seams.

    pub(crate) struct FailingWeather;
    impl WeatherProvider for FailingWeather {
        async fn current_conditions(
            &self,
            _at: GeoPoint,
        ) -> anyhow::Result<Option<WeatherObservation>> {
            Err(anyhow!("weather upstream down"))
        }
    }

    pub(crate) struct FailingTraffic;
    impl TrafficProvider for FailingTraffic {
        async fn flow_near(&self, _at: GeoPoint) -> anyhow::Result<Option<TrafficFlow>> {
            Err(anyhow!("traffic upstream down"))
        }
    }

    pub(crate) struct FailingReports;
    impl ReportStore for FailingReports {
        async fn active_report_count(
            &self,
            _center: GeoPoint,
            _radius_deg: f64,
            _since: DateTime<Utc>,
        ) -> anyhow::Result<usize> {
            Err(anyhow!("report store down"))
        }
    }

    pub(crate) struct QuietProviders;
    impl WeatherProvider for QuietProviders {
        async fn current_conditions(
            &self,
            _at: GeoPoint,
        ) -> anyhow::Result<Option<WeatherObservation>> {
            Ok(None)
        }
    }
    impl TrafficProvider for QuietProviders {
        async fn flow_near(&self, _at: GeoPoint) -> anyhow::Result<Option<TrafficFlow>> {
            Ok(None)
        }
    }
    impl ReportStore for QuietProviders {
        async fn active_report_count(
            &self,
            _center: GeoPoint,
            _radius_deg: f64,
            _since: DateTime<Utc>,
        ) -> anyhow::Result<usize> {
            Ok(0)
        }
    }

    /// Thunderstorm with poor visibility: weather factor 0.6 × 0.5 = 0.3.
    pub(crate) struct StormyWeather;
    impl WeatherProvider for StormyWeather {
        async fn current_conditions(
            &self,
            _at: GeoPoint,
        ) -> anyhow::Result<Option<WeatherObservation>> {
            Ok(Some(WeatherObservation {
                temperature_c: 20.0,
                visibility: 500.0,
                condition: "Thunderstorm".into(),
                wind_speed: 5.0,
            }))
        }
    }

    pub(crate) struct CountingReports(pub usize);
    impl ReportStore for CountingReports {
        async fn active_report_count(
            &self,
            _center: GeoPoint,
            _radius_deg: f64,
            _since: DateTime<Utc>,
        ) -> anyhow::Result<usize> {
            Ok(self.0)
        }
    }

    pub(crate) fn straight_route(vertices: usize, length_meters: f64) -> RawRoute {
        let polyline = (0..vertices)
            .map(|i| point(30.33 + 0.0001 * i as f64, 76.38))
            .collect();
        RawRoute {
            polyline,
            length_meters,
            travel_time_seconds: length_meters / 1.4,
        }
    }

    fn failing_scorer() -> SegmentScorer<FailingWeather, FailingTraffic, FailingReports> {
        SegmentScorer::new(FailingWeather, FailingTraffic, FailingReports)
    }

    #[tokio::test]
    async fn all_evaluators_failing_yields_exact_default_sum() {
        let scorer = failing_scorer();
        let segment = Segment::at_point(point(30.33, 76.38));
        // 21:00 — dark but before the night crowd window
        let scored = scorer.calculate_isc(segment, at_hour(21)).await;

        let expected = 0.2 * 0.6 + 0.2 * 0.5 + 0.15 * 0.7 + 0.3 * 0.8 + 0.15 * 0.7;
        assert!((scored.isc - expected).abs() < 1e-12, "isc = {}", scored.isc);
        assert_eq!(scored.breakdown.lighting, 0.6);
        assert_eq!(scored.breakdown.weather, risk::WEATHER_FALLBACK);
        assert_eq!(scored.breakdown.crowd, 0.7);
        assert_eq!(scored.breakdown.reports, risk::REPORTS_FALLBACK);
        assert_eq!(scored.breakdown.traffic, risk::TRAFFIC_FALLBACK);
    }

    #[tokio::test]
    async fn isc_stays_in_unit_interval_under_failures() {
        let scorer = failing_scorer();
        let segment = Segment::at_point(point(0.0, 0.0));
        for hour in 0..24 {
            let scored = scorer.calculate_isc(segment, at_hour(hour)).await;
            assert!((0.0..=1.0).contains(&scored.isc));
            for value in [
                scored.breakdown.lighting,
                scored.breakdown.weather,
                scored.breakdown.crowd,
                scored.breakdown.reports,
                scored.breakdown.traffic,
            ] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[tokio::test]
    async fn nearby_reports_drag_the_score_down() {
        let segment = Segment::at_point(point(30.33, 76.38));
        let at = at_hour(12);

        let calm = SegmentScorer::new(QuietProviders, QuietProviders, CountingReports(0));
        let busy = SegmentScorer::new(QuietProviders, QuietProviders, CountingReports(3));

        let calm_isc = calm.calculate_isc(segment, at).await.isc;
        let busy_isc = busy.calculate_isc(segment, at).await.isc;
        assert!(busy_isc < calm_isc);
        assert_eq!(busy.calculate_isc(segment, at).await.breakdown.reports, 0.4);
    }

    #[tokio::test]
    async fn batched_scoring_preserves_segment_order() {
        let scorer = SegmentScorer::new(QuietProviders, QuietProviders, QuietProviders);
        let segments: Vec<Segment> = (0..23)
            .map(|i| Segment::at_point(point(0.01 * f64::from(i), 0.0)))
            .collect();
        let scored = scorer.score_segments(&segments, at_hour(12)).await;
        assert_eq!(scored.len(), 23);
        for (input, output) in segments.iter().zip(&scored) {
            assert_eq!(input.center.lat, output.segment.center.lat);
        }
    }

    #[tokio::test]
    async fn zone_status_boundary_is_yellow_at_exactly_0_4() {
        assert_eq!(ZoneLevel::from_isc(0.39), ZoneLevel::Red);
        assert_eq!(ZoneLevel::from_isc(0.4), ZoneLevel::Yellow);
        assert_eq!(ZoneLevel::from_isc(0.59), ZoneLevel::Yellow);
        assert_eq!(ZoneLevel::from_isc(0.6), ZoneLevel::Green);

        // a quiet daytime zone is green end to end
        let scorer = SegmentScorer::new(QuietProviders, QuietProviders, QuietProviders);
        let (scored, level) = scorer.zone_status(point(30.33, 76.38), at_hour(12)).await;
        assert!(scored.isc > 0.6);
        assert_eq!(level, ZoneLevel::Green);
    }
}
