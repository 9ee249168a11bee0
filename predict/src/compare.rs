//! Per-type tolerance checks between a predicted and a confirmed value.

use schema::{Quat, Value, Vec3};

/// Returns `true` when `predicted` is close enough to `confirmed` to keep.
///
/// - vectors: squared distance at most `tolerance²`
/// - rotations: `|dot| >= 1 - tolerance`
/// - poses: both of the above
/// - numbers: `|Δ| <= tolerance`
/// - everything else: exact equality
#[must_use]
pub fn within_tolerance(predicted: &Value, confirmed: &Value, tolerance: f32) -> bool {
    match (predicted, confirmed) {
        (Value::Vec3(p), Value::Vec3(c)) => vec3_close(*p, *c, tolerance),
        (Value::Quat(p), Value::Quat(c)) => quat_close(*p, *c, tolerance),
        (Value::Pose(p), Value::Pose(c)) => {
            vec3_close(p.position, c.position, tolerance)
                && quat_close(p.rotation, c.rotation, tolerance)
        }
        _ if predicted.value_type() != confirmed.value_type() => false,
        _ => match (predicted.as_f64(), confirmed.as_f64()) {
            (Some(p), Some(c)) => (p - c).abs() <= f64::from(tolerance),
            _ => predicted == confirmed,
        },
    }
}

fn vec3_close(p: Vec3, c: Vec3, tolerance: f32) -> bool {
    p.distance_sq(c) <= tolerance * tolerance
}

fn quat_close(p: Quat, c: Quat, tolerance: f32) -> bool {
    p.normalize().dot(c.normalize()).abs() >= 1.0 - tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::Pose;

    #[test]
    fn vectors_use_squared_distance() {
        let a = Value::Vec3(Vec3::new(0.0, 0.0, 0.0));
        assert!(within_tolerance(&a, &Value::Vec3(Vec3::new(0.0, 0.5, 0.0)), 0.5));
        assert!(!within_tolerance(&a, &Value::Vec3(Vec3::new(0.0, 0.51, 0.0)), 0.5));
    }

    #[test]
    fn rotations_ignore_hemisphere() {
        let q = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.4);
        assert!(within_tolerance(&Value::Quat(q), &Value::Quat(-q), 1e-4));
        let r = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.6);
        assert!(!within_tolerance(&Value::Quat(q), &Value::Quat(r), 1e-3));
    }

    #[test]
    fn poses_check_both_parts() {
        let base = Pose::new(Vec3::ZERO, Quat::IDENTITY);
        let moved = Pose::new(Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
        assert!(!within_tolerance(&Value::Pose(base), &Value::Pose(moved), 0.5));
        assert!(within_tolerance(&Value::Pose(base), &Value::Pose(base), 0.0));
    }

    #[test]
    fn scalars_use_absolute_difference() {
        assert!(within_tolerance(&Value::F32(1.0), &Value::F32(1.05), 0.1));
        assert!(!within_tolerance(&Value::F32(1.0), &Value::F32(1.2), 0.1));
        assert!(within_tolerance(&Value::I32(10), &Value::I32(11), 1.0));
        assert!(!within_tolerance(&Value::I32(10), &Value::U32(10), 1.0));
    }

    #[test]
    fn discrete_values_need_equality() {
        assert!(within_tolerance(&Value::Bool(true), &Value::Bool(true), 10.0));
        assert!(!within_tolerance(&Value::Bool(true), &Value::Bool(false), 10.0));
        assert!(!within_tolerance(&Value::from("a"), &Value::from("b"), 10.0));
    }
}
