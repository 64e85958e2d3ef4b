//! Short-range distance between WGS84 coordinates.
//!
//! Uses an equirectangular projection around the mean latitude. The error is
//! negligible over a few kilometres, which covers every comparison the
//! engine makes; do not use it for long-range measurements.

use geo::Coord;
use rstar::AABB;

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Approximate distance in metres between two `(longitude, latitude)` points.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use addrsync_core::distance_m;
///
/// let a = Coord { x: 10.742, y: 59.911 };
/// assert_eq!(distance_m(a, a), 0.0);
///
/// let north = Coord { x: 10.742, y: 59.912 };
/// let metres = distance_m(a, north);
/// assert!((metres - 111.19).abs() < 0.01);
/// ```
#[must_use]
pub fn distance_m(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let (lon1, lat1) = (a.x.to_radians(), a.y.to_radians());
    let (lon2, lat2) = (b.x.to_radians(), b.y.to_radians());
    let dx = (lon2 - lon1) * (0.5 * (lat1 + lat2)).cos();
    let dy = lat2 - lat1;
    EARTH_RADIUS_M * dx.hypot(dy)
}

/// Bounding box in degrees that contains every point within `radius_m`.
///
/// The box is padded slightly so that points exactly on the radius are never
/// excluded by the envelope test; callers still filter with [`distance_m`].
pub(crate) fn search_envelope(centre: Coord<f64>, radius_m: f64) -> AABB<[f64; 2]> {
    let padded = radius_m * 1.1 + 0.01;
    let lat_span = (padded / EARTH_RADIUS_M).to_degrees();
    let cos_lat = (centre.y.abs() + lat_span).min(89.9).to_radians().cos();
    let lon_span = lat_span / cos_lat;
    AABB::from_corners(
        [centre.x - lon_span, centre.y - lat_span],
        [centre.x + lon_span, centre.y + lat_span],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstar::Envelope;
    use rstest::rstest;

    fn offset(centre: Coord<f64>, east_m: f64, north_m: f64) -> Coord<f64> {
        let lat = centre.y + (north_m / EARTH_RADIUS_M).to_degrees();
        let mean = (0.5 * (lat + centre.y)).to_radians();
        let lon = centre.x + (east_m / (EARTH_RADIUS_M * mean.cos())).to_degrees();
        Coord { x: lon, y: lat }
    }

    #[rstest]
    #[case(0.0, 50.0)]
    #[case(50.0, 0.0)]
    #[case(30.0, 40.0)]
    fn recovers_planar_offsets(#[case] east: f64, #[case] north: f64) {
        let origin = Coord { x: 10.742, y: 59.911 };
        let target = offset(origin, east, north);
        let expected = east.hypot(north);
        let measured = distance_m(origin, target);
        assert!(
            (measured - expected).abs() < 1.0e-6,
            "expected {expected} m, measured {measured} m"
        );
    }

    #[rstest]
    fn is_symmetric() {
        let a = Coord { x: 18.06, y: 59.33 };
        let b = Coord { x: 18.0605, y: 59.3302 };
        assert!((distance_m(a, b) - distance_m(b, a)).abs() < 1.0e-9);
    }

    #[rstest]
    #[case(Coord { x: 10.742, y: 59.911 })]
    #[case(Coord { x: 24.9, y: 69.9 })]
    #[case(Coord { x: -3.7, y: -40.4 })]
    fn envelope_contains_points_on_the_radius(#[case] centre: Coord<f64>) {
        let envelope = search_envelope(centre, 25.0);
        for (east, north) in [(25.0, 0.0), (-25.0, 0.0), (0.0, 25.0), (0.0, -25.0)] {
            let point = offset(centre, east, north);
            assert!(
                envelope.contains_point(&[point.x, point.y]),
                "{point:?} should fall inside {envelope:?}"
            );
        }
        assert!(envelope.distance_2(&[centre.x, centre.y]) <= 0.0);
    }
}
