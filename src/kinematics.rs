use tracing::debug;

use crate::geodesy::{MPS_TO_MPH, haversine_m, initial_bearing};
use crate::gpx_types::{EnrichedTrackPoint, RawTrackPoint};

/// Motion between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentKinematics {
    pub distance_m: f64,
    pub elapsed_s: f64,
    pub speed_mph: f64,
    pub heading: f64,
}

/// Kinematics of the segment `prev -> next`, or `None` when either timestamp
/// is missing or the elapsed time is not positive.
pub fn segment_kinematics(prev: &RawTrackPoint, next: &RawTrackPoint) -> Option<SegmentKinematics> {
    let (t0, t1) = (prev.time?, next.time?);
    let elapsed_s = (t1 - t0).as_seconds_f64();
    if elapsed_s <= 0.0 {
        return None;
    }

    let distance_m = haversine_m(prev, next);
    let speed_mph = distance_m / elapsed_s * MPS_TO_MPH;
    if !speed_mph.is_finite() {
        return None;
    }

    Some(SegmentKinematics {
        distance_m,
        elapsed_s,
        speed_mph,
        heading: initial_bearing(prev, next),
    })
}

/// Derive speed and heading for every point from its predecessor.
///
/// The output has the same length and order as the input. The first point
/// and every degenerate sample carry no kinematics.
pub fn enrich(points: &[RawTrackPoint]) -> Vec<EnrichedTrackPoint> {
    let mut enriched = Vec::with_capacity(points.len());
    let mut degenerate = 0usize;

    for (i, pt) in points.iter().enumerate() {
        let mut out = EnrichedTrackPoint::from(pt.clone());
        if i > 0 {
            match segment_kinematics(&points[i - 1], pt) {
                Some(k) => {
                    out.speed = Some(k.speed_mph);
                    out.heading = Some(k.heading);
                }
                None => {
                    degenerate += 1;
                    debug!(index = i, "degenerate sample: no usable time delta");
                }
            }
        }
        enriched.push(out);
    }

    if degenerate > 0 {
        debug!(degenerate, total = points.len(), "points without kinematics");
    }
    enriched
}
