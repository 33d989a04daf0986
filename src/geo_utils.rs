//! # Geographic Utilities
//!
//! Spherical geometry used by the measurement core.
//!
//! Every function here works on a sphere of radius [`EARTH_RADIUS_METERS`]
//! and is total: degenerate input (identical points, collinear or short
//! polygons) yields zero rather than NaN or a panic.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polygon_area`] | Signed spherical area of a closed polygon |
//! | [`destination_point`] | Point at a bearing and range from a center |
//! | [`circle_points`] | Ring of points around a center (circle markers) |
//! | [`polyline_length`] | Total length of a path in meters |
//! | [`encode_polyline`] | Google encoded polyline of a path |
//!
//! ## Example
//!
//! ```rust
//! use maps_measure::{GeoPoint, geo_utils};
//!
//! let triangle = vec![
//!     GeoPoint::new(0.0, 0.0),
//!     GeoPoint::new(0.0, 0.001),
//!     GeoPoint::new(0.001, 0.0),
//! ];
//!
//! let perimeter = geo_utils::polyline_length(&triangle);
//! let area = geo_utils::polygon_area(&triangle).abs();
//! println!("{:.0}m perimeter, {:.0}m² area", perimeter, area);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Distances use the haversine of the central angle, which stays numerically
//! stable for the very short segments produced by tapping on a map.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)
//!
//! ### Spherical Excess
//!
//! The polygon area is the sum of the signed areas of the polar triangles
//! formed by each edge and the north pole. Summed over a closed ring the
//! pole contributions cancel, leaving the spherical excess of the polygon.

use std::f64::consts::{FRAC_PI_2, PI};

use geo::{Coord, LineString};

use crate::GeoPoint;

/// Mean Earth radius used for all measurements, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Precision used for Google encoded polylines (5 decimal places).
pub const POLYLINE_PRECISION: u32 = 5;

// =============================================================================
// Distance Functions
// =============================================================================

/// hav(x) = sin²(x/2)
#[inline]
fn hav(x: f64) -> f64 {
    let sin_half = (x * 0.5).sin();
    sin_half * sin_half
}

/// Inverse haversine. The argument is clamped to [0, 1].
#[inline]
fn arc_hav(x: f64) -> f64 {
    2.0 * x.clamp(0.0, 1.0).sqrt().asin()
}

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// Returns the distance in meters along a sphere of radius [`EARTH_RADIUS_METERS`].
/// The result is symmetric in its arguments and exactly zero for identical points.
///
/// # Example
///
/// ```rust
/// use maps_measure::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lng = (a.longitude - b.longitude).to_radians();

    // cos product grouped so swapping a and b yields bit-identical results
    let h = hav(lat1 - lat2) + hav(d_lng) * (lat1.cos() * lat2.cos());
    EARTH_RADIUS_METERS * arc_hav(h)
}

/// Calculate the total length of a path in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// paths return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Area Functions
// =============================================================================

/// Signed area of the triangle formed by an edge and the north pole, on the unit sphere.
///
/// `tan1`/`tan2` are `tan((π/2 - lat) / 2)` of the edge endpoints.
#[inline]
fn polar_triangle_area(tan1: f64, lng1: f64, tan2: f64, lng2: f64) -> f64 {
    let d_lng = lng1 - lng2;
    let t = tan1 * tan2;
    2.0 * (t * d_lng.sin()).atan2(1.0 + t * d_lng.cos())
}

/// Compute the signed area of a closed polygon on the sphere, in square meters.
///
/// The polygon is closed implicitly from the last point back to the first, so
/// callers should not repeat the first point. The sign depends on the winding
/// order: reversing the points negates the result, rotating them leaves it
/// unchanged. Callers that only need the magnitude use [`polygon_area_abs`].
///
/// Returns 0.0 for fewer than 3 points.
///
/// # Example
///
/// ```rust
/// use maps_measure::{GeoPoint, geo_utils};
///
/// let square = vec![
///     GeoPoint::new(0.0, 0.0),
///     GeoPoint::new(0.0, 0.01),
///     GeoPoint::new(0.01, 0.01),
///     GeoPoint::new(0.01, 0.0),
/// ];
///
/// let forward = geo_utils::polygon_area(&square);
/// let mut reversed = square.clone();
/// reversed.reverse();
/// assert!((forward + geo_utils::polygon_area(&reversed)).abs() < 1e-6);
/// ```
pub fn polygon_area(points: &[GeoPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let tan_of = |p: &GeoPoint| ((FRAC_PI_2 - p.latitude.to_radians()) / 2.0).tan();

    let last = &points[points.len() - 1];
    let mut total = 0.0;
    let mut prev_tan = tan_of(last);
    let mut prev_lng = last.longitude.to_radians();

    for point in points {
        let tan = tan_of(point);
        let lng = point.longitude.to_radians();
        total += polar_triangle_area(tan, lng, prev_tan, prev_lng);
        prev_tan = tan;
        prev_lng = lng;
    }

    let area = total * EARTH_RADIUS_METERS * EARTH_RADIUS_METERS;
    if area.is_finite() {
        area
    } else {
        0.0
    }
}

/// Absolute value of [`polygon_area`].
#[inline]
pub fn polygon_area_abs(points: &[GeoPoint]) -> f64 {
    polygon_area(points).abs()
}

// =============================================================================
// Projection Functions
// =============================================================================

/// Compute the point at `range_meters` from `center` along the initial bearing
/// `bearing_radians` (clockwise from north).
///
/// Only used to lay out circular markers; not measurement-critical.
///
/// # Example
///
/// ```rust
/// use maps_measure::{GeoPoint, geo_utils};
///
/// let origin = GeoPoint::new(0.0, 0.0);
/// let north = geo_utils::destination_point(&origin, 0.0, 1000.0);
/// assert!((geo_utils::haversine_distance(&origin, &north) - 1000.0).abs() < 1e-6);
/// ```
pub fn destination_point(center: &GeoPoint, bearing_radians: f64, range_meters: f64) -> GeoPoint {
    let distance = range_meters / EARTH_RADIUS_METERS;
    let from_lat = center.latitude.to_radians();
    let from_lng = center.longitude.to_radians();

    let cos_distance = distance.cos();
    let sin_distance = distance.sin();
    let sin_from_lat = from_lat.sin();
    let cos_from_lat = from_lat.cos();

    let sin_lat = cos_distance * sin_from_lat + sin_distance * cos_from_lat * bearing_radians.cos();
    let d_lng = (sin_distance * cos_from_lat * bearing_radians.sin())
        .atan2(cos_distance - sin_from_lat * sin_lat);

    let lat = sin_lat.clamp(-1.0, 1.0).asin();
    let lng = normalize_longitude(from_lng + d_lng);

    GeoPoint::new(lat.to_degrees(), lng.to_degrees())
}

/// Wrap a longitude in radians into [-π, π).
#[inline]
fn normalize_longitude(lng: f64) -> f64 {
    (lng + PI).rem_euclid(2.0 * PI) - PI
}

/// Ring of `segments` points at `radius_meters` around `center`, starting due north.
///
/// Returns an empty ring for zero segments.
pub fn circle_points(center: &GeoPoint, radius_meters: f64, segments: usize) -> Vec<GeoPoint> {
    if segments == 0 {
        return Vec::new();
    }
    let step = 2.0 * PI / segments as f64;
    (0..segments)
        .map(|i| destination_point(center, i as f64 * step, radius_meters))
        .collect()
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a path as a Google encoded polyline string (precision 5).
///
/// Used to keep elevation path requests compact. Returns an error message for
/// coordinates the encoder rejects (out of range).
pub fn encode_polyline(points: &[GeoPoint]) -> Result<String, String> {
    let line: LineString<f64> = points.iter().map(|p| Coord::from(*p)).collect();
    polyline::encode_coordinates(line, POLYLINE_PRECISION).map_err(|e| e.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{ChamberlainDuquetteArea, Distance, Haversine, Point, Polygon};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn sample_polygon() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(51.5000, -0.1300),
            GeoPoint::new(51.5000, -0.1200),
            GeoPoint::new(51.5080, -0.1180),
            GeoPoint::new(51.5100, -0.1260),
            GeoPoint::new(51.5050, -0.1320),
        ]
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GeoPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_symmetric() {
        let pairs = [
            (GeoPoint::new(51.5074, -0.1278), GeoPoint::new(48.8566, 2.3522)),
            (GeoPoint::new(-33.8688, 151.2093), GeoPoint::new(35.6762, 139.6503)),
            (GeoPoint::new(0.0, 179.9), GeoPoint::new(0.0, -179.9)),
            (GeoPoint::new(89.9, 0.0), GeoPoint::new(-89.9, 45.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        }
    }

    #[test]
    fn test_haversine_distance_matches_geo() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let ours = haversine_distance(&london, &paris);
        let reference = Haversine::distance(
            Point::new(london.longitude, london.latitude),
            Point::new(paris.longitude, paris.latitude),
        );
        // geo uses a 6371008.8m radius; relative difference stays below 2e-6
        assert!(((ours - reference) / reference).abs() < 2e-6);
    }

    #[test]
    fn test_haversine_antipodal_is_finite() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 180.0);
        let d = haversine_distance(&a, &b);
        assert!(d.is_finite());
        assert!(approx_eq(d, PI * EARTH_RADIUS_METERS, 1e-3));
    }

    #[test]
    fn test_polyline_length_empty_and_single() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GeoPoint::new(51.5, -0.1)]), 0.0);
    }

    #[test]
    fn test_polyline_length_two_points() {
        let track = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.001, 0.0)];
        let expected = EARTH_RADIUS_METERS * 0.001_f64.to_radians();
        assert!(approx_eq(polyline_length(&track), expected, 1e-6));
    }

    #[test]
    fn test_polygon_area_small_triangle() {
        let triangle = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.001, 0.0),
        ];
        // Right triangle with two legs of R * 0.001°, nearly planar at this size
        let leg = EARTH_RADIUS_METERS * 0.001_f64.to_radians();
        let reference = leg * leg / 2.0;
        let area = polygon_area(&triangle).abs();
        assert!(((area - reference) / reference).abs() < 0.01, "area {} vs {}", area, reference);
    }

    #[test]
    fn test_polygon_area_matches_chamberlain_duquette() {
        let ring = sample_polygon();
        let polygon = Polygon::new(
            ring.iter().map(|p| Coord::from(*p)).collect::<LineString<f64>>(),
            vec![],
        );
        let reference = polygon.chamberlain_duquette_unsigned_area();
        let area = polygon_area_abs(&ring);
        // Different radius (6378137m) and approximation, both well within 1%
        assert!(((area - reference) / reference).abs() < 0.01, "area {} vs {}", area, reference);
    }

    #[test]
    fn test_polygon_area_rotation_invariant() {
        let ring = sample_polygon();
        let base = polygon_area(&ring);
        for shift in 1..ring.len() {
            let mut rotated = ring.clone();
            rotated.rotate_left(shift);
            assert!(approx_eq(polygon_area(&rotated), base, base.abs() * 1e-9));
        }
    }

    #[test]
    fn test_polygon_area_reversal_negates() {
        let ring = sample_polygon();
        let mut reversed = ring.clone();
        reversed.reverse();
        let forward = polygon_area(&ring);
        assert!(forward != 0.0);
        assert!(approx_eq(polygon_area(&reversed), -forward, forward.abs() * 1e-9));
    }

    #[test]
    fn test_polygon_area_degenerate() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&[GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)]), 0.0);

        let same = vec![GeoPoint::new(10.0, 10.0); 4];
        assert_eq!(polygon_area(&same), 0.0);

        let collinear = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ];
        assert!(polygon_area(&collinear).abs() < 1e-3);
    }

    #[test]
    fn test_destination_point_round_trip_distance() {
        let center = GeoPoint::new(47.3769, 8.5417);
        for bearing_deg in [0.0_f64, 45.0, 90.0, 180.0, 270.0] {
            let dest = destination_point(&center, bearing_deg.to_radians(), 2500.0);
            assert!(approx_eq(haversine_distance(&center, &dest), 2500.0, 1e-6));
        }
    }

    #[test]
    fn test_destination_point_east_increases_longitude() {
        let center = GeoPoint::new(0.0, 0.0);
        let east = destination_point(&center, FRAC_PI_2, 1000.0);
        assert!(approx_eq(east.latitude, 0.0, 1e-9));
        assert!(east.longitude > 0.0);
    }

    #[test]
    fn test_destination_point_zero_range() {
        let center = GeoPoint::new(12.5, -45.25);
        let same = destination_point(&center, 1.0, 0.0);
        assert!(approx_eq(same.latitude, center.latitude, 1e-12));
        assert!(approx_eq(same.longitude, center.longitude, 1e-12));
    }

    #[test]
    fn test_circle_points() {
        let center = GeoPoint::new(51.5, -0.12);
        let ring = circle_points(&center, 50.0, 36);
        assert_eq!(ring.len(), 36);
        assert!(ring.iter().all(|p| approx_eq(haversine_distance(&center, p), 50.0, 1e-6)));
        assert!(circle_points(&center, 50.0, 0).is_empty());
    }

    #[test]
    fn test_encode_polyline_known_value() {
        // Example path from the Google polyline algorithm documentation
        let path = vec![
            GeoPoint::new(38.5, -120.2),
            GeoPoint::new(40.7, -120.95),
            GeoPoint::new(43.252, -126.453),
        ];
        assert_eq!(encode_polyline(&path).unwrap(), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }
}
