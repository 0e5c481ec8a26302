use chrono::TimeDelta;
use serde::Serialize;

use crate::geodesy::haversine_mi;
use crate::gpx_types::{EnrichedTrackPoint, GeoPoint};

pub const NOT_AVAILABLE: &str = "N/A";

/// Human readable route figures shown next to the selected lake.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub distance: String,
    pub estimated_time: String,
}

impl RouteSummary {
    pub fn of<P: GeoPoint>(points: &[P], reference_speed_mph: f64) -> Self {
        Self {
            distance: distance(points),
            estimated_time: estimated_time(points, reference_speed_mph),
        }
    }
}

/// Sum of great-circle distances between consecutive points, in miles.
/// `None` for fewer than two points.
pub fn route_distance_mi<P: GeoPoint>(points: &[P]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    Some(points.windows(2).map(|w| haversine_mi(&w[0], &w[1])).sum())
}

/// `"12.34 mi"`, or `"N/A"` for fewer than two points.
pub fn distance<P: GeoPoint>(points: &[P]) -> String {
    match route_distance_mi(points) {
        Some(miles) => format!("{miles:.2} mi"),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Time to cover the route at a constant reference speed, `"1h 25m"`.
///
/// Uses the distance as displayed (two decimals) so the two figures agree.
pub fn estimated_time<P: GeoPoint>(points: &[P], reference_speed_mph: f64) -> String {
    let Some(miles) = route_distance_mi(points) else {
        return NOT_AVAILABLE.to_string();
    };
    if !(reference_speed_mph > 0.0) {
        return NOT_AVAILABLE.to_string();
    }

    let shown_miles = (miles * 100.0).round() / 100.0;
    let hours = shown_miles / reference_speed_mph;
    let mut whole_hours = hours.floor() as u64;
    let mut minutes = ((hours - hours.floor()) * 60.0).round() as u64;
    if minutes == 60 {
        whole_hours += 1;
        minutes = 0;
    }
    format!("{whole_hours}h {minutes}m")
}

/// Time between the first and last timestamps.
pub fn track_duration(points: &[EnrichedTrackPoint]) -> Option<TimeDelta> {
    let first = points.first()?.time?;
    let last = points.last()?.time?;
    let duration = last - first;
    (duration >= TimeDelta::zero()).then_some(duration)
}

/// `"{elapsed}s / {total}s"` for the point at `index`, whole seconds.
pub fn playback_label(points: &[EnrichedTrackPoint], index: usize) -> String {
    let total = track_duration(points).map_or(0, |d| d.num_seconds());
    let first = points.first().and_then(|p| p.time);
    let elapsed = match (first, points.get(index).and_then(|p| p.time)) {
        (Some(first), Some(current)) => (current - first).num_seconds().max(0),
        _ => 0,
    };
    format!("{elapsed}s / {total}s")
}
