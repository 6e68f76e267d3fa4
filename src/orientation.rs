//! Capsule reorientation toward a target up direction.

use std::f32::consts::{PI, TAU};

use bevy::math::EulerRot;
use bevy::prelude::*;

use crate::config::InterpolationMode;

/// Euler deltas below this (radians) are treated as converged.
const EULER_SNAP_EPSILON: f32 = 1.0e-4;

/// The local up axis of a body with `rotation`.
#[inline]
pub fn local_up(rotation: Quat) -> Vec3 {
    rotation * Vec3::Y
}

/// Minimal rotation taking direction `from` onto direction `to`.
///
/// Identity for parallel input or when either vector cannot be normalized.
/// Antiparallel input yields a 180° turn about an axis perpendicular to
/// `from`, chosen deterministically.
pub fn shortest_arc(from: Vec3, to: Vec3) -> Quat {
    match (from.try_normalize(), to.try_normalize()) {
        (Some(from), Some(to)) => Quat::from_rotation_arc(from, to),
        _ => Quat::IDENTITY,
    }
}

/// Rotation that keeps the body's heading but makes its up axis `target_up`.
pub fn target_rotation(current: Quat, target_up: Vec3) -> Quat {
    (shortest_arc(local_up(current), target_up) * current).normalize()
}

/// Step `current` toward the rotation whose up axis is `target_up`.
///
/// `instant`, or an `interp_speed` of zero or less, snaps to the target.
/// Otherwise the step covers `clamp(dt × interp_speed, 0, 1)` of the remaining
/// rotation. A degenerate `target_up` leaves the rotation unchanged.
pub fn reorient(
    current: Quat,
    target_up: Vec3,
    instant: bool,
    interp_speed: f32,
    dt: f32,
    mode: InterpolationMode,
) -> Quat {
    if target_up.try_normalize().is_none() {
        return current;
    }

    let target = target_rotation(current, target_up);
    if instant || interp_speed <= 0.0 {
        return target;
    }

    let alpha = (dt * interp_speed).clamp(0.0, 1.0);
    match mode {
        InterpolationMode::Slerp => current.slerp(target, alpha).normalize(),
        InterpolationMode::RotatorInterp => interp_euler(current, target, alpha),
    }
}

/// Per-axis Euler interpolation with each delta wrapped to the short way round.
fn interp_euler(current: Quat, target: Quat, alpha: f32) -> Quat {
    let (cy, cx, cz) = current.to_euler(EulerRot::YXZ);
    let (ty, tx, tz) = target.to_euler(EulerRot::YXZ);
    let delta = Vec3::new(wrap_angle(ty - cy), wrap_angle(tx - cx), wrap_angle(tz - cz));

    if delta.abs().max_element() < EULER_SNAP_EPSILON {
        return target;
    }

    let step = delta * alpha;
    Quat::from_euler(EulerRot::YXZ, cy + step.x, cx + step.y, cz + step.z).normalize()
}

/// Wrap an angle into `[-π, π)`.
fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
