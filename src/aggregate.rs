//! Route-level aggregation: averages sampled segment ISCs, flags unsafe
//! segments, blends safety against distance through the alpha-weighted cost
//! function and ranks the candidate set.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::SafewalkError;
use crate::geomath::GeoPoint;
use crate::providers::{RawRoute, ReportStore, TrafficProvider, WeatherProvider};
use crate::sampler;
use crate::scoring::{ScoredSegment, SegmentScorer, ZoneLevel};

/// Segments below this ISC are flagged for the caller.
pub const UNSAFE_ISC_THRESHOLD: f64 = 0.5;
/// Route average when no segments could be scored.
pub const DEFAULT_AVERAGE_ISC: f64 = 0.5;
/// Distances at or above this normalize to 1.0 in the cost function.
pub const DISTANCE_NORMALIZATION_METERS: f64 = 10_000.0;
/// Default safety/distance trade-off, favouring safety.
pub const DEFAULT_ALPHA: f64 = 0.7;
/// Default number of candidates requested from the routing provider.
pub const DEFAULT_ALTERNATIVES: usize = 3;

/// A sampled segment that fell below the unsafe threshold.
#[derive(Debug, Clone, Copy)]
pub struct UnsafeSegment {
    /// Index into the sampled segment list.
    pub index: usize,
    pub location: GeoPoint,
    pub isc: f64,
}

/// A fully scored candidate route. Request-scoped; discarded once the
/// response is built.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub polyline: Vec<GeoPoint>,
    pub length_meters: f64,
    pub travel_time_seconds: f64,
    pub segments: Vec<ScoredSegment>,
    pub average_isc: f64,
    pub optimal_cost: f64,
    pub unsafe_segments: Vec<UnsafeSegment>,
}

/// The three named selections over a candidate set. Selections may alias the
/// same candidate.
#[derive(Debug, Clone)]
pub struct RankedRoutes {
    pub shortest: RouteCandidate,
    pub safest: RouteCandidate,
    pub balanced: RouteCandidate,
}

/// Blend of safety and distance; lower is better. Alpha is clamped, never
/// rejected.
pub fn optimal_cost(average_isc: f64, length_meters: f64, alpha: f64) -> f64 {
    let alpha = alpha.clamp(0.0, 1.0);
    let normalized_distance = (length_meters / DISTANCE_NORMALIZATION_METERS).min(1.0);
    alpha * (1.0 - average_isc) + (1.0 - alpha) * normalized_distance
}

pub struct RouteAggregator<W, T, R> {
    scorer: SegmentScorer<W, T, R>,
}

impl<W, T, R> RouteAggregator<W, T, R>
where
    W: WeatherProvider,
    T: TrafficProvider,
    R: ReportStore,
{
    pub fn new(scorer: SegmentScorer<W, T, R>) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &SegmentScorer<W, T, R> {
        &self.scorer
    }

    /// Samples and scores one candidate. Segment scoring cannot fail, so
    /// neither can this; a candidate with no scorable segments gets the
    /// neutral average.
    pub async fn score_route(
        &self,
        raw: RawRoute,
        alpha: f64,
        at: DateTime<Utc>,
    ) -> RouteCandidate {
        let sampled = sampler::sample_segments(&raw.polyline);
        let segments = self.scorer.score_segments(&sampled, at).await;

        let average_isc = if segments.is_empty() {
            DEFAULT_AVERAGE_ISC
        } else {
            segments.iter().map(|s| s.isc).sum::<f64>() / segments.len() as f64
        };

        let unsafe_segments: Vec<UnsafeSegment> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.isc < UNSAFE_ISC_THRESHOLD)
            .map(|(index, s)| UnsafeSegment {
                index,
                location: s.segment.center,
                isc: s.isc,
            })
            .collect();

        // Reporting only; no rerouting is attempted.
        if segments
            .iter()
            .any(|s| ZoneLevel::from_isc(s.isc) == ZoneLevel::Red)
        {
            warn!("unsafe area ahead on candidate route");
        }

        RouteCandidate {
            optimal_cost: optimal_cost(average_isc, raw.length_meters, alpha),
            polyline: raw.polyline,
            length_meters: raw.length_meters,
            travel_time_seconds: raw.travel_time_seconds,
            segments,
            average_isc,
            unsafe_segments,
        }
    }

    /// Scores every usable candidate and ranks the set. Zero candidates is
    /// the no-route failure.
    pub async fn score_and_rank(
        &self,
        raw_routes: Vec<RawRoute>,
        alpha: f64,
        at: DateTime<Utc>,
    ) -> Result<RankedRoutes, SafewalkError> {
        let mut candidates = Vec::with_capacity(raw_routes.len());
        for raw in raw_routes {
            candidates.push(self.score_route(raw, alpha, at).await);
        }
        rank(candidates, alpha)
    }
}

/// Selects shortest, safest and balanced. Ties break toward the earlier
/// candidate in input order.
pub fn rank(candidates: Vec<RouteCandidate>, alpha: f64) -> Result<RankedRoutes, SafewalkError> {
    if candidates.is_empty() {
        return Err(SafewalkError::NoRouteFound);
    }

    let shortest = first_best(&candidates, |c| c.length_meters, false);
    let safest = first_best(&candidates, |c| c.average_isc, true);
    let balanced = first_best(
        &candidates,
        |c| optimal_cost(c.average_isc, c.length_meters, alpha),
        false,
    );

    Ok(RankedRoutes {
        shortest: candidates[shortest].clone(),
        safest: candidates[safest].clone(),
        balanced: candidates[balanced].clone(),
    })
}

/// Index of the minimizing (or maximizing) candidate; a strict comparison
/// keeps the first occurrence on ties.
fn first_best<F>(candidates: &[RouteCandidate], key: F, maximize: bool) -> usize
where
    F: Fn(&RouteCandidate) -> f64,
{
    let mut best = 0;
    let mut best_key = key(&candidates[0]);
    for (index, candidate) in candidates.iter().enumerate().skip(1) {
        let candidate_key = key(candidate);
        let better = if maximize {
            candidate_key > best_key
        } else {
            candidate_key < best_key
        };
        if better {
            best = index;
            best_key = candidate_key;
        }
    }
    best
}
