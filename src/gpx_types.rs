use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a lake as issued by the lakes/media API.
pub type LakeId = i64;

/// An immutable, shareable enriched point sequence.
pub type Track = Rc<[EnrichedTrackPoint]>;

/// Anything with a latitude and a longitude in degrees.
pub trait GeoPoint {
    fn lat(&self) -> f64;
    fn lon(&self) -> f64;
}

/// `(lat, lon)` in degrees.
impl GeoPoint for (f64, f64) {
    fn lat(&self) -> f64 {
        self.0
    }

    fn lon(&self) -> f64 {
        self.1
    }
}

/// A single `<trkpt>` exactly as read from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl RawTrackPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            time: None,
        }
    }
}

/// A track point with speed (mph) and heading (degrees, `[0, 360)`) relative
/// to its predecessor. Both are `None` for the first point and for points
/// whose time delta to the predecessor is not positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

impl From<RawTrackPoint> for EnrichedTrackPoint {
    fn from(pt: RawTrackPoint) -> Self {
        Self {
            lat: pt.lat,
            lon: pt.lon,
            ele: pt.ele,
            time: pt.time,
            speed: None,
            heading: None,
        }
    }
}

/// Decimated point produced by the preview profile; carries no time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: Option<f64>,
}

/// Interpolated marker position on the selected track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub heading: f64,
}

macro_rules! impl_geo_point {
    ($($ty:ty),*) => {
        $(impl GeoPoint for $ty {
            fn lat(&self) -> f64 {
                self.lat
            }

            fn lon(&self) -> f64 {
                self.lon
            }
        })*
    };
}

impl_geo_point!(RawTrackPoint, EnrichedTrackPoint, PreviewPoint, Position);
