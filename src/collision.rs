//! Shape-cast and contact hit data.
//!
//! Every query the movement systems issue against the physics world (ground
//! probe, surface trace, physical contacts) reports its result as a
//! [`CollisionData`]. "No hit" is represented by `None` at the call site.

use bevy::prelude::*;

/// Information about a shapecast, raycast or contact hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionData {
    /// Distance travelled along the cast before the hit.
    pub distance: f32,
    /// Surface normal at the impact point.
    pub normal: Vec3,
    /// World position of the impact point.
    pub point: Vec3,
    /// Entity that was hit (if any).
    pub entity: Option<Entity>,
}

impl CollisionData {
    /// Create a hit result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// A hit whose normal can be used for orientation.
    ///
    /// Backends sometimes report a zero or non-finite normal for initially
    /// penetrating casts; those hits still block but carry no direction.
    pub fn is_valid_blocking_hit(&self) -> bool {
        self.normal.is_finite() && self.normal.length_squared() > 1.0e-6
    }
}
