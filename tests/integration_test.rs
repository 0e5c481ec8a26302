use lake_track_wasm::converter::to_overlay_collection;
use lake_track_wasm::error::TrackError;
use lake_track_wasm::gpx_types::EnrichedTrackPoint;
use lake_track_wasm::interpolate::{closest_index_for_time, interpolate, trail};
use lake_track_wasm::load_track;
use lake_track_wasm::metrics::{RouteSummary, estimated_time, track_duration};
use lake_track_wasm::options::EngineOptions;
use lake_track_wasm::parser::{parse_preview_points, parse_track_points};

fn load_fixture(path: &str) -> Vec<u8> {
    std::fs::read(format!("tests/fixtures/{path}")).unwrap()
}

fn track(path: &str) -> Vec<EnrichedTrackPoint> {
    load_track(&load_fixture(path)).unwrap().to_vec()
}

fn overlay_count(points: &[EnrichedTrackPoint], progress: Option<f64>, kind: &str) -> usize {
    to_overlay_collection(points, progress, &EngineOptions::default())
        .features
        .iter()
        .filter(|f| f.properties.as_ref().unwrap()["overlay"] == kind)
        .count()
}

#[test]
fn test_three_point_kinematics() {
    let pts = track("three_points.gpx");
    assert_eq!(pts.len(), 3);
    assert_eq!(pts[0].ele, Some(256.0));
    assert!(pts[0].speed.is_none());
    assert!(pts[0].heading.is_none());

    let s1 = pts[1].speed.unwrap();
    let s2 = pts[2].speed.unwrap();
    assert!(s1 > s2);
    // 111.19 m in 10 s
    assert!((s1 - 24.87).abs() < 0.01, "got {s1}");
    assert!((s1 / s2 - 3.0).abs() < 1e-9);
    // due north
    assert!(pts[1].heading.unwrap().abs() < 1e-9);
}

#[test]
fn test_three_point_summary() {
    let pts = track("three_points.gpx");
    let summary = RouteSummary::of(&pts, 3.0);
    assert_eq!(summary.distance, "0.14 mi");
    assert_eq!(summary.estimated_time, "0h 3m");
    assert_eq!(track_duration(&pts).unwrap().num_seconds(), 40);
}

#[test]
fn test_interpolation_endpoints() {
    let pts = track("three_points.gpx");
    let start = interpolate(&pts, 0.0).unwrap();
    let end = interpolate(&pts, 1.0).unwrap();
    assert_eq!((start.lat, start.lon), (44.0, -93.0));
    assert_eq!((end.lat, end.lon), (44.002, -93.0));

    let quarter = interpolate(&pts, 0.25).unwrap();
    assert!((quarter.lat - 44.0005).abs() < 1e-12);
    // heading snaps to the lower sample, which has none
    assert_eq!(quarter.heading, 0.0);
}

#[test]
fn test_segments_concatenated_and_later_tracks_ignored() {
    let raw = parse_track_points(&load_fixture("multi_segment.gpx")).unwrap();
    assert_eq!(raw.len(), 4);
    assert_eq!(raw[3].lat, 45.002);
    assert_eq!(
        raw[0].time.unwrap().to_rfc3339(),
        "2025-06-01T06:00:00+00:00"
    );

    let pts = track("multi_segment.gpx");
    assert_eq!(track_duration(&pts).unwrap().num_seconds(), 360);
    // speed across the segment break is still derived
    assert!(pts[2].speed.is_some());
    // heading east on the first leg
    assert!((pts[1].heading.unwrap() - 90.0).abs() < 0.01);
}

#[test]
fn test_invalid_points_skipped() {
    let raw = parse_track_points(&load_fixture("invalid_points.gpx")).unwrap();
    let lats: Vec<f64> = raw.iter().map(|p| p.lat).collect();
    assert_eq!(lats, vec![44.0, 44.001]);
}

#[test]
fn test_no_track_points_is_parse_error() {
    let err = parse_track_points(&load_fixture("no_track.gpx")).unwrap_err();
    assert!(matches!(err, TrackError::NoTrackPoints));
    assert!(err.is_parse_error());
    assert_eq!(err.to_string(), "no track points found");

    assert!(parse_preview_points(&load_fixture("no_track.gpx"), 10).is_err());
}

#[test]
fn test_malformed_xml_is_parse_error() {
    let doc = b"<gpx><trk><trkseg><trkpt lat=\"1\" lon=\"2\"></trk></gpx>";
    let err = parse_track_points(doc).unwrap_err();
    assert!(err.is_parse_error(), "got {err:?}");
}

#[test]
fn test_single_point_track() {
    let pts = track("single_point.gpx");
    assert_eq!(pts.len(), 1);
    for progress in [0.0, 0.3, 1.0] {
        let pos = interpolate(&pts, progress).unwrap();
        assert_eq!((pos.lat, pos.lon), (44.25, -93.75));
    }
    assert_eq!(RouteSummary::of(&pts, 3.0).distance, "N/A");
    assert_eq!(estimated_time(&pts, 3.0), "N/A");
    assert_eq!(overlay_count(&pts, Some(0.5), "track"), 0);
    assert_eq!(overlay_count(&pts, Some(0.5), "position"), 1);
}

#[test]
fn test_degenerate_time_deltas() {
    let pts = track("duplicate_times.gpx");
    let speeds: Vec<Option<f64>> = pts.iter().map(|p| p.speed).collect();
    assert_eq!(speeds, vec![None, None, Some(0.0), None, None]);
    assert!(pts.iter().flat_map(|p| p.heading).all(f64::is_finite));
}

#[test]
fn test_preview_profile_decimates() {
    let preview = parse_preview_points(&load_fixture("long_track.gpx"), 10).unwrap();
    let eles: Vec<Option<f64>> = preview.iter().map(|p| p.ele).collect();
    assert_eq!(eles, vec![Some(250.0), Some(260.0), Some(270.0), Some(280.0)]);

    let full = parse_track_points(&load_fixture("long_track.gpx")).unwrap();
    assert_eq!(full.len(), 31);
}

#[test]
fn test_long_track_overlays() {
    let pts = track("long_track.gpx");
    assert_eq!(overlay_count(&pts, Some(1.0), "segment"), 30);
    // every 15th point with a heading: 15 and 30 (point 0 has none)
    assert_eq!(overlay_count(&pts, Some(1.0), "arrow"), 2);
    assert_eq!(trail(&pts, 1.0, 10).len(), 11);
    assert_eq!(trail(&pts, 0.0, 10).len(), 1);
    assert_eq!(overlay_count(&pts, Some(0.0), "trail"), 0);
}

#[test]
fn test_closest_index_for_media_time() {
    let pts = track("long_track.gpx");
    assert_eq!(closest_index_for_time(&pts, 0.0), Some(0));
    assert_eq!(closest_index_for_time(&pts, 41.0), Some(4));
    // 90 s and 100 s are equally close
    assert_eq!(closest_index_for_time(&pts, 95.0), Some(9));
    assert_eq!(closest_index_for_time(&pts, 10_000.0), Some(30));
    assert_eq!(closest_index_for_time(&track("untimed.gpx"), 5.0), None);
}
