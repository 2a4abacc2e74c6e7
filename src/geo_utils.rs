//! Distance and map-fitting helpers.
//!
//! Distances are great-circle meters on the mean-radius sphere (6,371 km)
//! through the `geo` crate's haversine implementation. Coordinates are
//! WGS84 degrees.
//!
//! ```rust
//! use route_viewer::{GpsPoint, geo_utils};
//!
//! let ride = [
//!     GpsPoint::new(59.9386, 30.3141),
//!     GpsPoint::new(59.9390, 30.3160),
//!     GpsPoint::new(59.9400, 30.3180),
//! ];
//! assert!(geo_utils::polyline_length(&ride) > 200.0);
//! ```

use geo::{Distance, Haversine, Point};
use crate::{Bounds, GpsPoint};

/// Where the map opens when there is nothing to fit (north of Saint Petersburg).
pub const DEFAULT_MAP_CENTER: GpsPoint = GpsPoint {
    latitude: 60.041349,
    longitude: 30.407739,
};

// =============================================================================
// Distances
// =============================================================================

/// Haversine distance in meters.
///
/// ```rust
/// use route_viewer::{GpsPoint, geo_utils};
///
/// // A hundredth of a degree of longitude on the equator
/// let d = geo_utils::haversine_distance(&GpsPoint::new(0.0, 0.0), &GpsPoint::new(0.0, 0.01));
/// assert!((d - 1113.2).abs() < 2.0);
/// ```
#[inline]
pub fn haversine_distance(from: &GpsPoint, to: &GpsPoint) -> f64 {
    Haversine::distance(
        Point::new(from.longitude, from.latitude),
        Point::new(to.longitude, to.latitude),
    )
}

/// Sum of hops between consecutive points, 0 for fewer than two points.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|hop| haversine_distance(&hop[0], &hop[1]))
        .sum()
}

// =============================================================================
// Map fitting
// =============================================================================

/// Box a map should fit to show `points`.
///
/// With no points this is a zero-sized box on [`DEFAULT_MAP_CENTER`].
///
/// ```rust
/// use route_viewer::geo_utils::{view_bounds, DEFAULT_MAP_CENTER};
///
/// assert_eq!(view_bounds(&[]).center(), DEFAULT_MAP_CENTER);
/// ```
pub fn view_bounds(points: &[GpsPoint]) -> Bounds {
    let valid: Vec<GpsPoint> = points.iter().copied().filter(GpsPoint::is_valid).collect();
    Bounds::from_points(&valid).unwrap_or(Bounds {
        min_lat: DEFAULT_MAP_CENTER.latitude,
        max_lat: DEFAULT_MAP_CENTER.latitude,
        min_lng: DEFAULT_MAP_CENTER.longitude,
        max_lng: DEFAULT_MAP_CENTER.longitude,
    })
}
