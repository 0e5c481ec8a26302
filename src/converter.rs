use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::gpx_types::{EnrichedTrackPoint, GeoPoint, Position};
use crate::interpolate::{interpolate, trail};
use crate::options::EngineOptions;

/// Build every map overlay for the selected track.
///
/// `progress` is `None` when no playback position should be drawn. An empty
/// track yields an empty collection.
pub fn to_overlay_collection(
    points: &[EnrichedTrackPoint],
    progress: Option<f64>,
    opts: &EngineOptions,
) -> FeatureCollection {
    let mut features = Vec::new();

    if points.len() >= 2 {
        features.push(track_feature(points));
        features.extend(speed_segment_features(points, opts));
        features.extend(arrow_features(points, opts.arrow_every));
    }

    if let Some(progress) = progress {
        let recent = trail(points, progress, opts.trail_span);
        if recent.len() >= 2 {
            features.push(line_feature(recent, "trail", Map::new()));
        }
        if let Some(position) = interpolate(points, progress) {
            features.push(position_feature(&position));
        }
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// `rgb(r,0,b)` going from blue at `min` to red at `max`.
pub fn speed_color(speed: f64, min: f64, max: f64) -> String {
    let ratio = (speed - min) / (max - min);
    let clamped = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    let r = (255.0 * clamped).floor() as u8;
    let b = (255.0 * (1.0 - clamped)).floor() as u8;
    format!("rgb({r},0,{b})")
}

fn track_feature(points: &[EnrichedTrackPoint]) -> Feature {
    line_feature(points, "track", Map::new())
}

/// One two-point line per segment, coloured by the speed of its end point.
fn speed_segment_features<'a>(
    points: &'a [EnrichedTrackPoint],
    opts: &'a EngineOptions,
) -> impl Iterator<Item = Feature> + 'a {
    points.windows(2).map(move |pair| {
        let speed = pair[1].speed.unwrap_or(0.0);
        let mut props = Map::new();
        props.insert(
            "color".to_string(),
            JsonValue::String(speed_color(speed, opts.speed_color_min, opts.speed_color_max)),
        );
        props.insert("speed".to_string(), json_number(speed));
        line_feature(pair, "segment", props)
    })
}

fn arrow_features(
    points: &[EnrichedTrackPoint],
    every: usize,
) -> impl Iterator<Item = Feature> + '_ {
    let every = every.max(1);
    points
        .iter()
        .enumerate()
        .filter(move |(i, p)| i % every == 0 && p.heading.is_some_and(|h| h != 0.0))
        .filter_map(|(_, p)| p.heading.map(|heading| point_feature(p, "arrow", heading)))
}

fn position_feature(position: &Position) -> Feature {
    point_feature(position, "position", position.heading)
}

fn point_feature<P: GeoPoint>(pt: &P, overlay: &str, heading: f64) -> Feature {
    let mut props = overlay_props(overlay);
    props.insert("heading".to_string(), json_number(heading));
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(point_coords(pt)))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn line_feature<P: GeoPoint>(
    points: &[P],
    overlay: &str,
    extra: Map<String, JsonValue>,
) -> Feature {
    let coords: Vec<Vec<f64>> = points.iter().map(point_coords).collect();
    let mut props = overlay_props(overlay);
    props.extend(extra);
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coords))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

fn overlay_props(overlay: &str) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert("overlay".to_string(), JsonValue::String(overlay.to_string()));
    props
}

/// GeoJSON `[lon, lat]` order.
fn point_coords<P: GeoPoint>(pt: &P) -> Vec<f64> {
    vec![pt.lon(), pt.lat()]
}

fn json_number(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64, speed: Option<f64>, heading: Option<f64>) -> EnrichedTrackPoint {
        EnrichedTrackPoint {
            lat,
            lon,
            ele: None,
            time: None,
            speed,
            heading,
        }
    }

    fn overlays_of<'a>(fc: &'a FeatureCollection, kind: &str) -> Vec<&'a Feature> {
        fc.features
            .iter()
            .filter(|f| f.properties.as_ref().unwrap()["overlay"] == kind)
            .collect()
    }

    #[test]
    fn test_speed_color_range() {
        assert_eq!(speed_color(0.0, 0.0, 5.0), "rgb(0,0,255)");
        assert_eq!(speed_color(5.0, 0.0, 5.0), "rgb(255,0,0)");
        assert_eq!(speed_color(2.5, 0.0, 5.0), "rgb(127,0,127)");
        assert_eq!(speed_color(40.0, 0.0, 5.0), "rgb(255,0,0)");
        assert_eq!(speed_color(-1.0, 0.0, 5.0), "rgb(0,0,255)");
    }

    #[test]
    fn test_empty_track_renders_nothing() {
        let fc = to_overlay_collection(&[], Some(0.5), &EngineOptions::default());
        assert!(fc.features.is_empty());
    }

    #[test]
    fn test_single_point_only_marker() {
        let pts = vec![point(44.0, -93.0, None, None)];
        let fc = to_overlay_collection(&pts, Some(0.5), &EngineOptions::default());
        assert_eq!(fc.features.len(), 1);
        assert_eq!(overlays_of(&fc, "position").len(), 1);
    }

    #[test]
    fn test_full_overlay_set() {
        let pts = vec![
            point(44.0, -93.0, None, None),
            point(44.001, -93.0, Some(5.0), Some(0.0)),
            point(44.002, -93.001, Some(1.0), Some(315.0)),
        ];
        let fc = to_overlay_collection(&pts, Some(1.0), &EngineOptions::default());

        assert_eq!(overlays_of(&fc, "track").len(), 1);
        let segments = overlays_of(&fc, "segment");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].properties.as_ref().unwrap()["color"], "rgb(255,0,0)");
        assert_eq!(overlays_of(&fc, "trail").len(), 1);

        let marker = overlays_of(&fc, "position")[0];
        assert_eq!(marker.properties.as_ref().unwrap()["heading"], 315.0);
        match &marker.geometry.as_ref().unwrap().value {
            Value::Point(coords) => {
                assert!((coords[0] + 93.001).abs() < 1e-10); // lon
                assert!((coords[1] - 44.002).abs() < 1e-10); // lat
            }
            _ => panic!("Expected Point geometry"),
        }
    }

    #[test]
    fn test_no_position_without_progress() {
        let pts = vec![point(44.0, -93.0, None, None), point(44.001, -93.0, None, None)];
        let fc = to_overlay_collection(&pts, None, &EngineOptions::default());
        assert!(overlays_of(&fc, "position").is_empty());
        assert!(overlays_of(&fc, "trail").is_empty());
    }

    #[test]
    fn test_arrows_every_nth_with_heading() {
        let pts: Vec<EnrichedTrackPoint> = (0..31)
            .map(|i| {
                let heading = if i == 15 { Some(0.0) } else { Some(45.0) };
                point(i as f64 * 0.001, 0.0, Some(1.0), heading)
            })
            .collect();
        let fc = to_overlay_collection(&pts, None, &EngineOptions::default());
        // index 0 and 30 qualify; 15 has a zero heading
        assert_eq!(overlays_of(&fc, "arrow").len(), 2);
    }
}
