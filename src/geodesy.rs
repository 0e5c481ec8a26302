use crate::gpx_types::GeoPoint;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const EARTH_RADIUS_MI: f64 = 3958.8;
pub const MPS_TO_MPH: f64 = 2.23694;

/// Great-circle distance on a sphere of the given radius, in the radius' unit.
pub fn haversine<A, B>(a: &A, b: &B, radius: f64) -> f64
where
    A: GeoPoint + ?Sized,
    B: GeoPoint + ?Sized,
{
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlat = (b.lat() - a.lat()).to_radians();
    let dlon = (b.lon() - a.lon()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    radius * c
}

pub fn haversine_m<A: GeoPoint + ?Sized, B: GeoPoint + ?Sized>(a: &A, b: &B) -> f64 {
    haversine(a, b, EARTH_RADIUS_M)
}

pub fn haversine_mi<A: GeoPoint + ?Sized, B: GeoPoint + ?Sized>(a: &A, b: &B) -> f64 {
    haversine(a, b, EARTH_RADIUS_MI)
}

/// Initial bearing from `a` to `b`, degrees clockwise from north in `[0, 360)`.
pub fn initial_bearing<A: GeoPoint + ?Sized, B: GeoPoint + ?Sized>(a: &A, b: &B) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlon = (b.lon() - a.lon()).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360.0
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = (44.0, -93.0);
        assert_eq!(haversine_m(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_millidegree_north() {
        let d = haversine_m(&(44.0, -93.0), &(44.001, -93.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_haversine_known_distance_miles() {
        // Paris -> London, ~213.5 mi
        let d = haversine_mi(&(48.8566, 2.3522), &(51.5074, -0.1278));
        assert!((d - 213.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = (0.0, 0.0);
        assert!(initial_bearing(&origin, &(1.0, 0.0)).abs() < 1e-9);
        assert!((initial_bearing(&origin, &(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((initial_bearing(&origin, &(-1.0, 0.0)) - 180.0).abs() < 1e-9);
        assert!((initial_bearing(&origin, &(0.0, -1.0)) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert!(normalize_degrees(-1e-20) < 360.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = (f64, f64)> {
            (-89.0..=89.0, -180.0..=180.0)
        }

        proptest! {
            #[test]
            fn prop_haversine_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((haversine_m(&a, &b) - haversine_m(&b, &a)).abs() < 1e-6);
            }

            #[test]
            fn prop_bearing_in_range(a in valid_coord(), b in valid_coord()) {
                let bearing = initial_bearing(&a, &b);
                prop_assert!((0.0..360.0).contains(&bearing));
            }
        }
    }
}
