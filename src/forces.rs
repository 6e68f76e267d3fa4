//! Gravity force and jump impulse application.

use bevy::prelude::*;

use crate::backend::GravityPhysicsBackend;
use crate::gravity::{ForceMode, GravityInfo};

/// The gravity force for `info` scaled by the body's gravity scale.
pub fn gravity_force(info: &GravityInfo, scale: f32) -> Vec3 {
    let force = info.safe_direction() * info.power * scale;
    if force.is_finite() {
        force
    } else {
        Vec3::ZERO
    }
}

/// Push `force` through the backend as a continuous gravity force.
pub fn apply_gravity<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    force: Vec3,
    allow_substepping: bool,
    use_acceleration: bool,
) {
    if force == Vec3::ZERO {
        return;
    }
    B::apply_force(world, entity, force, force_mode(use_acceleration), allow_substepping);
}

/// Impulse (as a velocity change) that lifts a body `jump_height` above its
/// standing position against `gravity_power`.
///
/// `half_extent` is the body's half height; it is added to the jump height
/// so the apex is measured from the body's feet. Zero when the radicand is
/// not positive.
pub fn jump_impulse(up: Vec3, gravity_power: f32, jump_height: f32, half_extent: f32) -> Vec3 {
    let radicand = 2.0 * gravity_power * (jump_height + half_extent);
    if !(radicand > 0.0) || !radicand.is_finite() {
        return Vec3::ZERO;
    }
    up.normalize_or_zero() * radicand.sqrt()
}

/// Apply a jump impulse through the backend.
pub fn apply_jump_impulse<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    impulse: Vec3,
    use_acceleration: bool,
) {
    B::apply_impulse(world, entity, impulse, force_mode(use_acceleration));
}

fn force_mode(use_acceleration: bool) -> ForceMode {
    if use_acceleration {
        ForceMode::Acceleration
    } else {
        ForceMode::Force
    }
}
