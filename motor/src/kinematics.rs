/*!
Pure kinematic helpers used by the script builders and the motors.

Everything here is stateless and allocation free:
- constant-acceleration profiling (`delta_v`, `solve_quadratic`, `change_distance`, `segment_time`)
- yaw math in degrees (`angle_diff`, `approach_angle`, `yaw_from_vector`, `yaw_to_vector`)
- planar (XZ) helpers and the small easing functions the flyers use
*/

use crate::{
    constants::{ARRIVED_DISTANCE, EPSILON},
    types::Vec3,
};

/// Constant acceleration needed to go from `v0` to `v1` over `distance`.
///
/// `distance` must be non-zero; callers treat tiny distances as "already there".
#[inline]
pub fn delta_v(v0: f32, v1: f32, distance: f32) -> f32 {
    debug_assert!(distance != 0.0, "delta_v over zero distance");
    0.5 * (v1 * v1 - v0 * v0) / distance
}

/// Real roots of `a*x^2 + b*x + c = 0`.
///
/// Returns `(larger, smaller)` for `a > 0`. Degenerates to the linear solution when `a == 0`.
/// `None` means there is no real root; callers skip whatever clamp needed it.
pub fn solve_quadratic(a: f32, b: f32, c: f32) -> Option<(f32, f32)> {
    if a == 0.0 {
        if b != 0.0 {
            let root = -c / b;
            return Some((root, root));
        }
        if c == 0.0 {
            return Some((0.0, 0.0));
        }
        return None;
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }

    let disc = disc.sqrt();
    Some(((-b + disc) / (2.0 * a), (-b - disc) / (2.0 * a)))
}

/// Result of one [`change_distance`] step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceStep {
    /// Signed distance covered during the interval.
    pub distance: f32,
    /// Signed velocity at the end of the interval.
    pub velocity: f32,
}

/// Advance a 1D mover for `interval` seconds toward a goal `goal_distance` away.
///
/// - Close to the goal, snap to `goal_velocity` and cover the remaining distance.
/// - If braking at `accel_rate` no longer reaches `goal_velocity` in time, follow the braking curve.
/// - Otherwise accelerate (or decelerate) toward `ideal_velocity` at `accel_rate`.
///
/// Never overshoots the goal. Negative goal distances are mirrored so the math runs in positive
/// space; outputs carry the original sign.
pub fn change_distance(
    interval: f32,
    goal_distance: f32,
    goal_velocity: f32,
    cur_velocity: f32,
    ideal_velocity: f32,
    accel_rate: f32,
) -> DistanceStep {
    let (scale, goal_distance, cur_velocity) = if goal_distance < 0.0 {
        (-1.0, -goal_distance, -cur_velocity)
    } else {
        (1.0, goal_distance, cur_velocity)
    };

    if goal_distance < ARRIVED_DISTANCE {
        return DistanceStep {
            distance: goal_distance * scale,
            velocity: goal_velocity * scale,
        };
    }

    let interval = interval.max(0.0);
    let accel_rate = accel_rate.abs();

    let goal_accel = delta_v(cur_velocity, goal_velocity, goal_distance);
    let accel = if goal_accel < -accel_rate {
        // Past the braking point: follow the curve that lands exactly on the goal velocity.
        goal_accel
    } else if cur_velocity < ideal_velocity {
        accel_rate.min((ideal_velocity - cur_velocity) / interval.max(EPSILON))
    } else if cur_velocity > ideal_velocity {
        -accel_rate.min((cur_velocity - ideal_velocity) / interval.max(EPSILON))
    } else {
        0.0
    };

    let mut velocity = (cur_velocity + accel * interval).max(0.0);
    let mut distance = 0.5 * (cur_velocity + velocity) * interval;
    if distance > goal_distance {
        distance = goal_distance;
        velocity = goal_velocity;
    }

    DistanceStep {
        distance: distance * scale,
        velocity: velocity * scale,
    }
}

/// Time to cover `distance` while the speed changes linearly from `v0` to `v1`.
///
/// Returns `None` when both speeds are zero and the distance is not.
#[inline]
pub fn segment_time(distance: f32, v0: f32, v1: f32) -> Option<f32> {
    let avg = 0.5 * (v0 + v1);
    if avg <= 0.0 {
        return if distance <= 0.0 { Some(0.0) } else { None };
    }
    Some(distance / avg)
}

/// Distance needed to change speed from `from` to `to` at constant `accel`.
#[inline]
pub fn ramp_distance(from: f32, to: f32, accel: f32) -> f32 {
    let t = (to - from) / accel;
    from * t + 0.5 * accel * t * t
}

/// Wrap an angle into (-180, 180].
#[inline]
pub fn angle_normalize(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    if a > 180.0 { a - 360.0 } else { a }
}

/// Signed shortest rotation from `src` to `dest`, in (-180, 180].
#[inline]
pub fn angle_diff(dest: f32, src: f32) -> f32 {
    angle_normalize(dest - src)
}

/// Move `value` toward `target` by at most `speed` degrees along the shortest arc.
pub fn approach_angle(target: f32, value: f32, speed: f32) -> f32 {
    let speed = speed.abs();
    let delta = angle_diff(target, value);
    let out = if delta > speed {
        value + speed
    } else if delta < -speed {
        value - speed
    } else {
        target
    };
    angle_normalize(out)
}

/// Yaw (degrees) that faces along the planar part of `dir`.
///
/// Zero vectors yield 0.
#[inline]
pub fn yaw_from_vector(dir: &Vec3) -> f32 {
    if dir.x == 0.0 && dir.z == 0.0 {
        return 0.0;
    }
    (-dir.x).atan2(-dir.z).to_degrees()
}

/// Unit planar vector facing `yaw` degrees.
#[inline]
pub fn yaw_to_vector(yaw: f32) -> Vec3 {
    let r = yaw.to_radians();
    Vec3::new(-r.sin(), 0.0, -r.cos())
}

/// Right-hand vector of a planar heading (Y-up).
#[inline]
pub fn yaw_to_right(yaw: f32) -> Vec3 {
    yaw_to_vector(yaw).cross(&Vec3::y())
}

/// Planar (XZ) projection of `v`.
#[inline]
pub fn planar(v: &Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Planar (XZ) length of `v`.
#[inline]
pub fn planar_length(v: &Vec3) -> f32 {
    (v.x * v.x + v.z * v.z).sqrt()
}

/// Planar unit direction of `v`, or zero if it has no planar extent.
#[inline]
pub fn planar_dir(v: &Vec3) -> Vec3 {
    let p = planar(v);
    let len = p.norm();
    if len <= EPSILON { Vec3::zeros() } else { p / len }
}

/// Factor that decays a value to `decay_to` over `decay_time` seconds, for a step of `dt`.
#[inline]
pub fn exponential_decay(decay_to: f32, decay_time: f32, dt: f32) -> f32 {
    (decay_to.ln() / decay_time * dt).exp()
}

/// Smooth cubic remap of `val` from `[a, b]` to `[c, d]`.
pub fn simple_spline_remap(val: f32, a: f32, b: f32, c: f32, d: f32) -> f32 {
    if a == b {
        return if val >= b { d } else { c };
    }
    let t = (val - a) / (b - a);
    let s = t * t * (3.0 - 2.0 * t);
    c + (d - c) * s
}
