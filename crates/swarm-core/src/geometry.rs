//! Planar Geometry
//!
//! Angle helpers over `glam::DVec2`. Headings are degrees, counter-clockwise
//! from the local x axis.

use glam::DVec2;

/// Wraps an angle into `[0, 360)`.
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Rotates a vector counter-clockwise by `degrees`.
pub fn rotate(v: DVec2, degrees: f64) -> DVec2 {
    DVec2::from_angle(degrees.to_radians()).rotate(v)
}

/// Bearing of a vector in `[0, 360)`; zero vectors have bearing 0.
pub fn bearing(v: DVec2) -> f64 {
    if v == DVec2::ZERO {
        return 0.0;
    }
    wrap_degrees(v.y.atan2(v.x).to_degrees())
}

/// Smallest absolute difference between two angles, in `[0, 180]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = wrap_degrees(a - b);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Signed turn in `(-180, 180]` that takes heading `from` onto heading `to`.
pub fn signed_turn(from: f64, to: f64) -> f64 {
    let diff = wrap_degrees(to - from);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Expresses a world-frame vector in the local frame of an agent facing `heading`.
pub fn world_to_local(v: DVec2, heading: f64) -> DVec2 {
    rotate(v, -heading)
}

/// Expresses a local-frame vector in the world frame.
pub fn local_to_world(v: DVec2, heading: f64) -> DVec2 {
    rotate(v, heading)
}

#[cfg(test)]
pub(crate) fn assert_close(actual: DVec2, expected: DVec2) {
    assert!(
        (actual - expected).length() < 1e-9,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert!(wrap_degrees(-1e-18) < 360.0);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        assert_close(rotate(DVec2::new(5.0, 0.0), 90.0), DVec2::new(0.0, 5.0));
        assert_close(rotate(DVec2::new(0.0, 5.0), -90.0), DVec2::new(5.0, 0.0));
    }

    #[test]
    fn test_bearing_and_difference() {
        assert!((bearing(DVec2::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((bearing(DVec2::new(0.0, -1.0)) - 270.0).abs() < 1e-9);
        assert!((angular_difference(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angular_difference(10.0, 190.0) - 180.0).abs() < 1e-9);
        assert!((signed_turn(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((signed_turn(10.0, 350.0) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_frame_round_trip() {
        let world = DVec2::new(3.0, -4.0);
        let local = world_to_local(world, 135.0);
        assert_close(local_to_world(local, 135.0), world);
    }
}
