use crate::gpx_types::{EnrichedTrackPoint, Position};

/// Fractional indices this close to a whole number are treated as that
/// index, so `index / (n - 1) * (n - 1)` lands back on `index`.
const INDEX_SNAP: f64 = 1e-9;

/// Clamp a progress value into `[0, 1]`; NaN becomes 0.
pub fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// The two sample indices bracketing `progress` and the blend factor
/// between them. `None` for an empty sequence.
pub fn bracket(len: usize, progress: f64) -> Option<(usize, usize, f64)> {
    if len == 0 {
        return None;
    }
    let last = len - 1;
    let mut exact = clamp_progress(progress) * last as f64;
    if (exact - exact.round()).abs() < INDEX_SNAP {
        exact = exact.round();
    }

    let lower = (exact.floor() as usize).min(last);
    let upper = (lower + 1).min(last);
    let t = exact - lower as f64;
    Some((lower, upper, t))
}

/// Marker position at `progress` along `points`.
///
/// Latitude and longitude are blended linearly between the bracketing
/// samples. The heading is not blended: it is the lower sample's heading,
/// or 0 when that sample has none.
pub fn interpolate(points: &[EnrichedTrackPoint], progress: f64) -> Option<Position> {
    let (lower, upper, t) = bracket(points.len(), progress)?;
    let start = &points[lower];
    let end = &points[upper];

    Some(Position {
        lat: start.lat + (end.lat - start.lat) * t,
        lon: start.lon + (end.lon - start.lon) * t,
        heading: start.heading.unwrap_or(0.0),
    })
}

/// The recent path behind the marker: up to `span` points before the lower
/// bracket index, plus that index itself.
pub fn trail(points: &[EnrichedTrackPoint], progress: f64, span: usize) -> &[EnrichedTrackPoint] {
    match bracket(points.len(), progress) {
        Some((lower, _, _)) => &points[lower.saturating_sub(span)..=lower],
        None => &[],
    }
}

/// Index of the point whose timestamp is nearest to `seconds` after the
/// first timestamped point. Ties go to the earlier index.
pub fn closest_index_for_time(points: &[EnrichedTrackPoint], seconds: f64) -> Option<usize> {
    let start = points.iter().find_map(|p| p.time)?;
    let target_ms = seconds * 1000.0;

    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let Some(time) = p.time else { continue };
        let offset_ms = (time - start).num_milliseconds() as f64;
        let diff = (offset_ms - target_ms).abs();
        if best.is_none_or(|(_, best_diff)| diff < best_diff) {
            best = Some((i, diff));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn track(coords: &[(f64, f64)]) -> Vec<EnrichedTrackPoint> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(lat, lon))| EnrichedTrackPoint {
                lat,
                lon,
                ele: None,
                time: Some(Utc.timestamp_opt(1_750_000_000 + 10 * i as i64, 0).unwrap()),
                speed: None,
                heading: if i == 0 { None } else { Some(i as f64 * 10.0) },
            })
            .collect()
    }

    #[test]
    fn test_endpoints() {
        let pts = track(&[(44.0, -93.0), (44.1, -93.1), (44.2, -93.3)]);
        let first = interpolate(&pts, 0.0).unwrap();
        assert_eq!((first.lat, first.lon), (44.0, -93.0));
        let last = interpolate(&pts, 1.0).unwrap();
        assert_eq!((last.lat, last.lon), (44.2, -93.3));
    }

    #[test]
    fn test_midpoint_blends_linearly() {
        let pts = track(&[(0.0, 0.0), (1.0, 2.0)]);
        let mid = interpolate(&pts, 0.25).unwrap();
        assert!((mid.lat - 0.25).abs() < 1e-12);
        assert!((mid.lon - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_heading_snaps_to_lower_point() {
        let pts = track(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        // first point has no heading -> 0
        assert_eq!(interpolate(&pts, 0.2).unwrap().heading, 0.0);
        assert_eq!(interpolate(&pts, 0.7).unwrap().heading, 10.0);
        assert_eq!(interpolate(&pts, 1.0).unwrap().heading, 20.0);
    }

    #[test]
    fn test_exact_index_round_trip() {
        let pts = track(&[(0.0, 0.0); 8]);
        for index in 0..8 {
            let progress = index as f64 / 7.0;
            let (lower, _, t) = bracket(pts.len(), progress).unwrap();
            assert_eq!(lower, index);
            assert_eq!(t, 0.0);
        }
    }

    #[test]
    fn test_empty_and_single() {
        assert_eq!(interpolate(&[], 0.5), None);
        assert!(trail(&[], 0.5, 10).is_empty());

        let pts = track(&[(44.0, -93.0)]);
        for progress in [0.0, 0.3, 1.0] {
            let pos = interpolate(&pts, progress).unwrap();
            assert_eq!((pos.lat, pos.lon, pos.heading), (44.0, -93.0, 0.0));
        }
    }

    #[test]
    fn test_out_of_range_progress_clamped() {
        let pts = track(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(interpolate(&pts, -3.0).unwrap().lat, 0.0);
        assert_eq!(interpolate(&pts, 7.0).unwrap().lat, 1.0);
        assert_eq!(interpolate(&pts, f64::NAN).unwrap().lat, 0.0);
    }

    #[test]
    fn test_trail_window() {
        let coords: Vec<(f64, f64)> = (0..30).map(|i| (i as f64, 0.0)).collect();
        let pts = track(&coords);

        let start = trail(&pts, 0.0, 10);
        assert_eq!(start.len(), 1);

        // exact index 14.5 -> lower 14 -> points 4..=14
        let mid = trail(&pts, 14.5 / 29.0, 10);
        assert_eq!(mid.len(), 11);
        assert_eq!(mid.first().unwrap().lat, 4.0);
        assert_eq!(mid.last().unwrap().lat, 14.0);
    }

    #[test]
    fn test_closest_index_for_time() {
        let pts = track(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        assert_eq!(closest_index_for_time(&pts, 0.0), Some(0));
        assert_eq!(closest_index_for_time(&pts, 12.0), Some(1));
        // 15 s is equidistant from 10 s and 20 s
        assert_eq!(closest_index_for_time(&pts, 15.0), Some(1));
        assert_eq!(closest_index_for_time(&pts, 500.0), Some(3));
        assert_eq!(closest_index_for_time(&[], 1.0), None);
    }

    #[test]
    fn test_closest_index_skips_untimed_points() {
        let mut pts = track(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        pts[0].time = None;
        // timeline starts at point 1
        assert_eq!(closest_index_for_time(&pts, 0.0), Some(1));
        for p in &mut pts {
            p.time = None;
        }
        assert_eq!(closest_index_for_time(&pts, 0.0), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_endpoints_match(coords in prop::collection::vec((-80.0..80.0f64, -179.0..179.0f64), 2..50)) {
                let pts = track(&coords);
                let first = interpolate(&pts, 0.0).unwrap();
                let last = interpolate(&pts, 1.0).unwrap();
                prop_assert_eq!((first.lat, first.lon), coords[0]);
                prop_assert_eq!((last.lat, last.lon), coords[coords.len() - 1]);
            }

            #[test]
            fn prop_single_point_constant(lat in -80.0..80.0f64, lon in -179.0..179.0f64, progress in 0.0..=1.0f64) {
                let pts = track(&[(lat, lon)]);
                let pos = interpolate(&pts, progress).unwrap();
                prop_assert_eq!((pos.lat, pos.lon), (lat, lon));
            }

            #[test]
            fn prop_trail_bounded(len in 1usize..60, progress in 0.0..=1.0f64) {
                let coords: Vec<(f64, f64)> = (0..len).map(|i| (i as f64 * 0.001, 0.0)).collect();
                let pts = track(&coords);
                let t = trail(&pts, progress, 10);
                prop_assert!(!t.is_empty() && t.len() <= 11);
            }
        }
    }
}
