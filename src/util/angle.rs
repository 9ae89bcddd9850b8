//! Heading math in degrees
//!
//! All headings live in (-180, 180]. Differences are taken along the shorter
//! arc so that turning and interpolation never go "the long way round" across
//! the ±180 seam.

/// Wrap any finite angle into (-180, 180]. Non-finite input maps to 0.
pub fn normalize(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let wrapped = (deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        180.0
    } else {
        wrapped
    }
}

/// Signed difference `to - from` along the shorter arc, in (-180, 180]
pub fn shortest_diff(from: f64, to: f64) -> f64 {
    normalize(to - from)
}

/// Interpolate from `from` towards `to` by `t` along the shorter arc
pub fn lerp_angle(from: f64, to: f64, t: f64) -> f64 {
    normalize(from + shortest_diff(from, to) * t)
}
