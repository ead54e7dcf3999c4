//! Short-range geodesy on site locations.
//!
//! Both helpers use flat-earth approximations that are accurate to well
//! under one percent over the few kilometres separating mesh sites.

use meshplan_core::Location;

/// Equatorial circumference in metres.
const EARTH_CIRCUMFERENCE_M: i64 = 40_075_017;

/// Mean earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Approximate distance in metres between two locations, altitude included.
pub fn approx_distance(l1: &Location, l2: &Location) -> f64 {
    // whole metres per degree
    let length_per_deg = (EARTH_CIRCUMFERENCE_M / 360) as f64;
    let avg_latitude = ((l1.latitude + l2.latitude) / 2.0).to_radians();

    let d_lat = (l1.latitude - l2.latitude).abs() * length_per_deg;

    let mut d_long = (l1.longitude - l2.longitude).abs();
    if d_long > 180.0 {
        d_long = 360.0 - d_long;
    }
    d_long *= length_per_deg * avg_latitude.cos();

    let d_alt = (l1.altitude - l2.altitude).abs();
    (d_lat * d_lat + d_long * d_long + d_alt * d_alt).sqrt()
}

/// Bearing in degrees of `l1` as seen from `l2`, measured counter-clockwise
/// from east, in (-180, 180].
pub fn compute_angle(l1: &Location, l2: &Location) -> f64 {
    let mean_latitude = ((l1.latitude + l2.latitude) / 2.0).to_radians();
    let x = EARTH_RADIUS_M * (l1.longitude - l2.longitude).to_radians() * mean_latitude.cos();
    let y = EARTH_RADIUS_M * (l1.latitude - l2.latitude).to_radians();
    y.atan2(x).to_degrees()
}
