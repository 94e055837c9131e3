//! Risk factor evaluators. Each one maps a location / time-of-day / provider
//! observation to a scalar in [0, 1] where 1.0 is safest. Evaluators are
//! independent and individually replaceable; the ones backed by an external
//! provider accept `None` (data unavailable) and return a neutral default
//! instead of failing the caller.

use chrono::Duration;

/// Neutral score when weather data is unavailable.
pub const WEATHER_FALLBACK: f64 = 0.5;
/// Conservative score when the report store lookup fails.
pub const REPORTS_FALLBACK: f64 = 0.8;
/// Neutral score when traffic data is unavailable.
pub const TRAFFIC_FALLBACK: f64 = 0.7;

/// Report search radius around a segment center, in degrees (~100 m).
pub const REPORT_RADIUS_DEG: f64 = 0.0009;

/// Reports older than this no longer influence scoring.
pub fn report_window() -> Duration {
    Duration::minutes(30)
}

/// Current conditions as reported by the weather provider.
#[derive(Debug, Clone)]
pub struct WeatherObservation {
    pub temperature_c: f64,
    pub visibility: f64,
    pub condition: String,
    pub wind_speed: f64,
}

/// Speed pair for the road nearest a segment center.
#[derive(Debug, Clone, Copy)]
pub struct TrafficFlow {
    pub current_speed: f64,
    pub free_flow_speed: f64,
}

/// Daylight hours [6, 20) score 1.0, everything else 0.6.
pub fn lighting_score(hour: u32) -> f64 {
    if (6..20).contains(&hour) { 1.0 } else { 0.6 }
}

/// Streets are emptiest late at night, busiest during commute windows.
pub fn crowd_score(hour: u32) -> f64 {
    if hour >= 22 || hour < 6 {
        0.5
    } else if (7..=9).contains(&hour) || (17..=19).contains(&hour) {
        0.9
    } else {
        0.7
    }
}

/// Multiplicative penalty model over temperature, visibility, condition group
/// and wind, clamped to [0.1, 1.0]. `None` means the provider had no data.
pub fn weather_score(observation: Option<&WeatherObservation>) -> f64 {
    let Some(obs) = observation else {
        return WEATHER_FALLBACK;
    };

    let mut score: f64 = 1.0;

    if obs.temperature_c < 0.0 || obs.temperature_c > 35.0 {
        score *= 0.7;
    } else if obs.temperature_c < 5.0 || obs.temperature_c > 30.0 {
        score *= 0.85;
    }

    if obs.visibility < 1000.0 {
        score *= 0.6;
    } else if obs.visibility < 2000.0 {
        score *= 0.75;
    } else if obs.visibility < 5000.0 {
        score *= 0.9;
    }

    score *= match obs.condition.to_ascii_lowercase().as_str() {
        "thunderstorm" => 0.5,
        "rain" | "drizzle" => 0.8,
        "snow" => 0.6,
        "fog" | "mist" => 0.7,
        _ => 1.0,
    };

    if obs.wind_speed > 20.0 {
        score *= 0.85;
    }

    score.clamp(0.1, 1.0)
}

/// Active incident reports near the segment center within the last 30 minutes.
pub fn reports_score(active_count: usize) -> f64 {
    match active_count {
        0 => 1.0,
        1 => 0.7,
        _ => 0.4,
    }
}

/// Moderate traffic is safest for pedestrians; fast-moving roads score lowest.
pub fn traffic_score(flow: Option<TrafficFlow>) -> f64 {
    let Some(flow) = flow else {
        return TRAFFIC_FALLBACK;
    };
    if flow.free_flow_speed <= 0.0 {
        return TRAFFIC_FALLBACK;
    }
    let ratio = flow.current_speed / flow.free_flow_speed;
    if ratio > 0.8 {
        0.6
    } else if ratio > 0.5 {
        0.9
    } else {
        0.7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lighting_daylight_window_boundaries() {
        assert_eq!(lighting_score(5), 0.6);
        assert_eq!(lighting_score(6), 1.0);
        assert_eq!(lighting_score(19), 1.0);
        assert_eq!(lighting_score(20), 0.6);
        assert_eq!(lighting_score(23), 0.6);
    }

    #[test]
    fn crowd_windows() {
        // night
        assert_eq!(crowd_score(22), 0.5);
        assert_eq!(crowd_score(2), 0.5);
        assert_eq!(crowd_score(5), 0.5);
        // commute peaks, inclusive on both ends
        assert_eq!(crowd_score(7), 0.9);
        assert_eq!(crowd_score(9), 0.9);
        assert_eq!(crowd_score(17), 0.9);
        assert_eq!(crowd_score(19), 0.9);
        // everything else
        assert_eq!(crowd_score(6), 0.7);
        assert_eq!(crowd_score(12), 0.7);
        assert_eq!(crowd_score(21), 0.7);
    }

    fn clear_day() -> WeatherObservation {
        WeatherObservation {
            temperature_c: 20.0,
            visibility: 10_000.0,
            condition: "Clear".into(),
            wind_speed: 3.0,
        }
    }

    #[test]
    fn weather_clear_day_is_penalty_free() {
        assert_eq!(weather_score(Some(&clear_day())), 1.0);
    }

    #[test]
    fn weather_unavailable_is_neutral() {
        assert_eq!(weather_score(None), WEATHER_FALLBACK);
    }

    #[test]
    fn weather_temperature_bands() {
        let mut obs = clear_day();
        obs.temperature_c = -3.0;
        assert!((weather_score(Some(&obs)) - 0.7).abs() < 1e-12);
        obs.temperature_c = 3.0;
        assert!((weather_score(Some(&obs)) - 0.85).abs() < 1e-12);
        obs.temperature_c = 33.0;
        assert!((weather_score(Some(&obs)) - 0.85).abs() < 1e-12);
        obs.temperature_c = 40.0;
        assert!((weather_score(Some(&obs)) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn weather_visibility_bands() {
        let mut obs = clear_day();
        obs.visibility = 500.0;
        assert!((weather_score(Some(&obs)) - 0.6).abs() < 1e-12);
        obs.visibility = 1500.0;
        assert!((weather_score(Some(&obs)) - 0.75).abs() < 1e-12);
        obs.visibility = 4000.0;
        assert!((weather_score(Some(&obs)) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn weather_condition_and_wind_penalties() {
        let mut obs = clear_day();
        obs.condition = "Thunderstorm".into();
        assert!((weather_score(Some(&obs)) - 0.5).abs() < 1e-12);
        obs.condition = "Drizzle".into();
        assert!((weather_score(Some(&obs)) - 0.8).abs() < 1e-12);
        obs.condition = "Mist".into();
        obs.wind_speed = 25.0;
        assert!((weather_score(Some(&obs)) - 0.7 * 0.85).abs() < 1e-12);
    }

    #[test]
    fn weather_stacked_penalties_clamp_at_floor() {
        let obs = WeatherObservation {
            temperature_c: -10.0,
            visibility: 200.0,
            condition: "Thunderstorm".into(),
            wind_speed: 30.0,
        };
        // 0.7 * 0.6 * 0.5 * 0.85 = 0.1785, the worst stack the model produces
        let score = weather_score(Some(&obs));
        assert!((score - 0.1785).abs() < 1e-12);
        assert!(score >= 0.1);
    }

    #[test]
    fn reports_count_mapping() {
        assert_eq!(reports_score(0), 1.0);
        assert_eq!(reports_score(1), 0.7);
        assert_eq!(reports_score(2), 0.4);
        assert_eq!(reports_score(10), 0.4);
    }

    #[test]
    fn traffic_ratio_bands() {
        let flow = |current, free| Some(TrafficFlow {
            current_speed: current,
            free_flow_speed: free,
        });
        assert_eq!(traffic_score(flow(50.0, 50.0)), 0.6);
        assert_eq!(traffic_score(flow(35.0, 50.0)), 0.9);
        assert_eq!(traffic_score(flow(40.0, 50.0)), 0.9); // 0.8 exactly is moderate
        assert_eq!(traffic_score(flow(25.0, 50.0)), 0.7); // 0.5 exactly is slow
        assert_eq!(traffic_score(flow(10.0, 50.0)), 0.7);
    }

    #[test]
    fn traffic_missing_or_degenerate_is_neutral() {
        assert_eq!(traffic_score(None), TRAFFIC_FALLBACK);
        let broken = TrafficFlow {
            current_speed: 10.0,
            free_flow_speed: 0.0,
        };
        assert_eq!(traffic_score(Some(broken)), TRAFFIC_FALLBACK);
    }
}
