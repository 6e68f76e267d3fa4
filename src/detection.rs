//! Ground contact detection.
//!
//! Two sweeps run below the capsule each tick, both along the body's local
//! down axis:
//!
//! - the [`GroundProbe`], a sphere slightly narrower than the capsule, answers
//!   "is the body standing on something";
//! - the [`SurfaceTrace`], a configurable line, sphere or box, finds the normal
//!   of the surface underfoot for surface-based gravity.

use bevy::prelude::*;

use crate::backend::{CapsuleDimensions, CastShape, GravityPhysicsBackend, ShapeCastRequest};
use crate::collision::CollisionData;
use crate::config::{TraceShape, MAX_TRACE_SHAPE_SCALE};
use crate::orientation::local_up;

/// Ground probe radius relative to the capsule radius.
pub const GROUND_PROBE_RADIUS_SCALE: f32 = 0.99;

/// Extra reach added to every ground cast.
pub const GROUND_CAST_MARGIN: f32 = 1.0;

/// The binary grounded check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundProbe {
    /// Probe sphere radius.
    pub radius: f32,
    /// Sweep length from the capsule centre.
    pub distance: f32,
}

impl GroundProbe {
    /// Size the probe for a capsule.
    ///
    /// The sphere starts at the capsule centre and reaches `tolerance` (plus a
    /// small margin) past the capsule's bottom tip.
    pub fn new(capsule: CapsuleDimensions, tolerance: f32) -> Self {
        let radius = capsule.radius * GROUND_PROBE_RADIUS_SCALE;
        Self {
            radius,
            distance: (capsule.half_height - radius + tolerance + GROUND_CAST_MARGIN).max(0.0),
        }
    }

    /// Build the sweep for a body at `position` with `rotation`.
    pub fn request(&self, position: Vec3, rotation: Quat) -> ShapeCastRequest {
        ShapeCastRequest::new(
            position,
            -local_up(rotation),
            self.distance,
            CastShape::Sphere { radius: self.radius },
        )
        .rotated(rotation)
    }
}

/// The surface-normal trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTrace {
    pub shape: CastShape,
    /// Sweep length from the capsule centre.
    pub distance: f32,
}

impl SurfaceTrace {
    /// Size the trace for a capsule.
    ///
    /// A line reaches `tolerance` (plus a small margin) past the bottom tip.
    /// Spheres and boxes get an extent of `radius × scale` and a sweep
    /// shortened by that extent, so their leading face reaches the same depth.
    pub fn new(shape: TraceShape, capsule: CapsuleDimensions, tolerance: f32, scale: f32) -> Self {
        let reach = capsule.half_height + tolerance + GROUND_CAST_MARGIN;
        let extent = capsule.radius * scale.clamp(0.0, MAX_TRACE_SHAPE_SCALE);

        let shape = match shape {
            TraceShape::Line => CastShape::Ray,
            TraceShape::Sphere => CastShape::Sphere { radius: extent },
            TraceShape::Box => CastShape::Cube { half_extent: extent },
        };

        Self {
            shape,
            distance: (reach - shape.extent()).max(0.0),
        }
    }

    /// Build the sweep for a body at `position` with `rotation`.
    pub fn request(&self, position: Vec3, rotation: Quat) -> ShapeCastRequest {
        ShapeCastRequest::new(position, -local_up(rotation), self.distance, self.shape)
            .rotated(rotation)
    }
}

/// Run the ground probe for `entity`.
pub fn probe_ground<B: GravityPhysicsBackend>(
    world: &World,
    entity: Entity,
    probe: &GroundProbe,
    rotation: Quat,
) -> Option<CollisionData> {
    let request = probe
        .request(B::get_position(world, entity), rotation)
        .excluding(entity)
        .with_collision_groups(B::get_collision_groups(world, entity));
    B::shapecast(world, &request)
}

/// Run the surface trace for `entity`.
///
/// Hits whose normal is unusable are discarded.
pub fn trace_surface<B: GravityPhysicsBackend>(
    world: &World,
    entity: Entity,
    trace: &SurfaceTrace,
    rotation: Quat,
) -> Option<CollisionData> {
    let request = trace
        .request(B::get_position(world, entity), rotation)
        .excluding(entity)
        .with_collision_groups(B::get_collision_groups(world, entity));
    B::shapecast(world, &request).filter(CollisionData::is_valid_blocking_hit)
}
