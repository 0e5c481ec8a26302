#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

use lake_track_wasm::{parse_gpx, preview_worker_handle, track_overlays_string};

const THREE_POINTS: &[u8] = include_bytes!("fixtures/three_points.gpx");

#[wasm_bindgen_test]
fn parse_gpx_returns_array() {
    let value = parse_gpx(THREE_POINTS).unwrap();
    let array = js_sys::Array::from(&value);
    assert_eq!(array.length(), 3);
}

#[wasm_bindgen_test]
fn worker_reports_failure_without_throwing() {
    let value = preview_worker_handle(7.0, b"<gpx/>".to_vec(), JsValue::UNDEFINED).unwrap();
    let success = js_sys::Reflect::get(&value, &JsValue::from_str("success")).unwrap();
    assert_eq!(success.as_bool(), Some(false));
    let id = js_sys::Reflect::get(&value, &JsValue::from_str("id")).unwrap();
    assert_eq!(id.as_f64(), Some(7.0));
}

#[wasm_bindgen_test]
fn overlays_string_is_geojson() {
    let json = track_overlays_string(THREE_POINTS, Some(0.5), JsValue::NULL).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["type"], "FeatureCollection");
}

#[wasm_bindgen_test]
fn bad_options_are_rejected() {
    let options = js_sys::JSON::parse(r#"{"previewStride": 0}"#).unwrap();
    assert!(preview_worker_handle(1.0, THREE_POINTS.to_vec(), options).is_err());
}

#[wasm_bindgen_test]
fn worker_rejects_bad_message_ids() {
    for id in [-1.0, 2.5, f64::NAN] {
        assert!(preview_worker_handle(id, THREE_POINTS.to_vec(), JsValue::UNDEFINED).is_err());
    }
}
