pub mod converter;
pub mod error;
pub mod geodesy;
pub mod gpx_types;
pub mod interpolate;
pub mod kinematics;
pub mod metrics;
pub mod nearby;
pub mod options;
pub mod parser;
pub mod playback;
pub mod preview;
pub mod session;
pub mod store;
#[cfg(target_arch = "wasm32")]
pub mod web;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::gpx_types::{EnrichedTrackPoint, Track};
use crate::nearby::Lake;
use crate::options::EngineOptions;
use crate::preview::{PreviewRequest, handle_preview_request, message_id};

pub use crate::error::Result;

/// Parse a GPX file into enriched track points (speed in mph, heading in
/// degrees), returned as a JS array.
#[wasm_bindgen(js_name = parseGpx)]
pub fn parse_gpx(gpx: &[u8]) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let track = load_track(gpx)?;
    to_js(&*track)
}

/// Decimated `{lat, lon, ele}` points for a quick preview.
#[wasm_bindgen(js_name = previewGpx)]
pub fn preview_gpx(gpx: &[u8], options: JsValue) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let points = parser::parse_preview_points(gpx, opts.preview_stride)?;
    to_js(&points)
}

/// Body of the preview Web Worker: answers `{id, success, points | error}`
/// and never throws for bad GPX.
#[wasm_bindgen(js_name = previewWorkerHandle)]
pub fn preview_worker_handle(
    id: f64,
    gpx: Vec<u8>,
    options: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let id = message_id(id).ok_or_else(|| {
        JsValue::from_str(&format!("invalid preview message id: {id}"))
    })?;
    let opts = parse_options(options)?;
    let request = PreviewRequest { id, bytes: gpx };
    to_js(&handle_preview_request(&request, opts.preview_stride))
}

/// `{lat, lon, heading}` at `progress` along `points`, or `null` for an
/// empty track.
#[wasm_bindgen(js_name = interpolatePosition)]
pub fn interpolate_position(
    points: JsValue,
    progress: f64,
) -> std::result::Result<JsValue, JsValue> {
    let points: Vec<EnrichedTrackPoint> = from_js(points)?;
    to_js(&interpolate::interpolate(&points, progress))
}

/// `{distance, estimatedTime}` for a point array.
#[wasm_bindgen(js_name = routeSummary)]
pub fn route_summary(points: JsValue, options: JsValue) -> std::result::Result<JsValue, JsValue> {
    let opts = parse_options(options)?;
    let points: Vec<EnrichedTrackPoint> = from_js(points)?;
    to_js(&metrics::RouteSummary::of(&points, opts.reference_speed_mph))
}

/// Sort lakes by distance from the user, or list them all when the
/// location is unknown.
#[wasm_bindgen(js_name = rankLakes)]
pub fn rank_lakes(
    lakes: JsValue,
    lat: Option<f64>,
    lon: Option<f64>,
    radius_mi: f64,
) -> std::result::Result<JsValue, JsValue> {
    let lakes: Vec<Lake> = from_js(lakes)?;
    to_js(&nearby::rank_lakes(&lakes, lat.zip(lon), radius_mi))
}

/// Map overlays for a GPX file, returned as a GeoJSON JS object.
#[wasm_bindgen(js_name = trackOverlays)]
pub fn track_overlays(
    gpx: &[u8],
    progress: Option<f64>,
    options: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let track = load_track(gpx)?;
    let fc = converter::to_overlay_collection(&track, progress, &opts);
    to_js(&fc)
}

/// Map overlays for a GPX file, returned as a GeoJSON string.
#[wasm_bindgen(js_name = trackOverlaysString)]
pub fn track_overlays_string(
    gpx: &[u8],
    progress: Option<f64>,
    options: JsValue,
) -> std::result::Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let track = load_track(gpx)?;
    let fc = converter::to_overlay_collection(&track, progress, &opts);
    serde_json::to_string(&fc).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Full-fidelity parse followed by kinematics.
pub fn load_track(gpx: &[u8]) -> Result<Track> {
    let raw = parser::parse_track_points(gpx)?;
    Ok(kinematics::enrich(&raw).into())
}

pub(crate) fn parse_options(options: JsValue) -> std::result::Result<EngineOptions, JsValue> {
    let opts = if options.is_undefined() || options.is_null() {
        EngineOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    Ok(opts.validate()?)
}

/// Plain JS objects and arrays rather than `Map`s.
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> std::result::Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> std::result::Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}
