//! Physics backend abstraction.
//!
//! This module defines the trait that physics backends must implement
//! to work with gravity movement. The movement systems never touch physics
//! components directly; every cast, velocity read and force goes through the
//! backend, so a different engine (or an analytic test scene) can be swapped in.

use bevy::prelude::*;

use crate::collision::CollisionData;
use crate::gravity::ForceMode;

/// Capsule size of a controlled body.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CapsuleDimensions {
    /// Capsule radius.
    pub radius: f32,
    /// Distance from the capsule centre to either tip, including the radius.
    pub half_height: f32,
}

impl CapsuleDimensions {
    /// Create capsule dimensions. `half_height` is clamped to at least `radius`.
    pub fn new(radius: f32, half_height: f32) -> Self {
        let radius = radius.max(0.0);
        Self {
            radius,
            half_height: half_height.max(radius),
        }
    }

    /// Capsule dimensions from a cylinder segment half length and a radius,
    /// as physics engines usually describe capsules.
    pub fn from_segment(segment_half_length: f32, radius: f32) -> Self {
        Self::new(radius, segment_half_length.max(0.0) + radius)
    }
}

/// Shape swept by a [`ShapeCastRequest`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CastShape {
    /// Infinitely thin ray.
    Ray,
    Sphere {
        radius: f32,
    },
    /// Axis-aligned (in the cast rotation's frame) cube.
    Cube {
        half_extent: f32,
    },
}

impl CastShape {
    /// Distance from the shape centre to its surface along the cast direction.
    pub fn extent(&self) -> f32 {
        match *self {
            CastShape::Ray => 0.0,
            CastShape::Sphere { radius } => radius,
            CastShape::Cube { half_extent } => half_extent,
        }
    }
}

/// A single sweep query against the physics world.
#[derive(Debug, Clone, Copy)]
pub struct ShapeCastRequest {
    /// Start position of the shape centre.
    pub origin: Vec3,
    /// Sweep direction (normalized).
    pub direction: Vec3,
    /// Maximum sweep distance.
    pub max_distance: f32,
    pub shape: CastShape,
    /// Shape orientation.
    pub rotation: Quat,
    /// Entity to ignore (usually the caster).
    pub exclude: Option<Entity>,
    /// Collision groups (memberships, filters) of the caster.
    pub collision_groups: Option<(u32, u32)>,
}

impl ShapeCastRequest {
    /// Create a new cast request.
    ///
    /// A direction that cannot be normalized becomes `Vec3::ZERO`; backends
    /// report no hit for it.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32, shape: CastShape) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance: max_distance.max(0.0),
            shape,
            rotation: Quat::IDENTITY,
            exclude: None,
            collision_groups: None,
        }
    }

    /// Set the shape orientation.
    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Exclude an entity from the cast.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.exclude = Some(entity);
        self
    }

    /// Filter the cast with collision groups.
    pub fn with_collision_groups(mut self, groups: Option<(u32, u32)>) -> Self {
        self.collision_groups = groups;
        self
    }
}

/// Trait for physics backend implementations.
///
/// Implement this trait to integrate a physics engine with gravity movement.
/// The backend owns the rigid body: it integrates velocity, applies forces
/// and impulses, answers shape casts and reports contacts as
/// [`ContactEvent`](crate::contact::ContactEvent)s.
///
/// # Example
///
/// For an example implementation, see the `rapier` module's `Rapier3dBackend`
/// which implements this trait for Bevy Rapier3D.
///
/// ```rust
/// use bevy::prelude::*;
/// use gravity_movement::prelude::*;
///
/// fn jump_speed<B: GravityPhysicsBackend>(world: &World, entity: Entity) -> f32 {
///     let up = B::get_rotation(world, entity) * Vec3::Y;
///     B::get_velocity(world, entity).dot(up)
/// }
/// ```
pub trait GravityPhysicsBackend: 'static + Send + Sync {
    /// The velocity component type used by this backend.
    ///
    /// Only entities carrying it are driven by the movement systems.
    type VelocityComponent: Component;

    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Sweep a shape through the world and return the first blocking hit.
    ///
    /// The returned `distance` is how far the shape centre travelled, the
    /// `point` is the contact on the hit surface and the `normal` points out
    /// of it.
    fn shapecast(world: &World, request: &ShapeCastRequest) -> Option<CollisionData>;

    /// Get the current linear velocity of an entity.
    fn get_velocity(world: &World, entity: Entity) -> Vec3;

    /// Set the linear velocity of an entity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3);

    /// Apply a continuous force over the physics step.
    ///
    /// With [`ForceMode::Acceleration`] the vector is an acceleration and the
    /// body's mass is ignored. `allow_substepping` lets the backend spread the
    /// force over its sub-steps when it has any.
    fn apply_force(
        world: &mut World,
        entity: Entity,
        force: Vec3,
        mode: ForceMode,
        allow_substepping: bool,
    );

    /// Apply an instantaneous impulse.
    ///
    /// With [`ForceMode::Acceleration`] the vector is a velocity change and the
    /// body's mass is ignored.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3, mode: ForceMode);

    /// Apply an impulse at a world-space point, possibly adding spin.
    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, point: Vec3);

    /// Get the world-space position of an entity's centre.
    fn get_position(world: &World, entity: Entity) -> Vec3;

    /// Get the world-space rotation of an entity.
    fn get_rotation(world: &World, entity: Entity) -> Quat;

    /// Teleport-rotate an entity.
    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat);

    /// Get the fixed timestep delta time.
    fn get_fixed_timestep(world: &World) -> f32;

    /// Capsule size of a controlled body, or `None` when the entity has no
    /// capsule. Bodies without a capsule are left alone.
    fn capsule_dimensions(world: &World, entity: Entity) -> Option<CapsuleDimensions>;

    /// Get the mass of an entity.
    fn get_mass(_world: &World, _entity: Entity) -> f32 {
        1.0
    }

    /// Whether the entity is a dynamic body that reacts to impulses.
    fn is_simulating_physics(_world: &World, _entity: Entity) -> bool {
        false
    }

    /// The engine's own gravity vector.
    fn ambient_gravity(_world: &World) -> Vec3 {
        Vec3::new(0.0, -crate::gravity::DEFAULT_GRAVITY_POWER, 0.0)
    }

    /// Whether the engine's own gravity acts on the entity.
    fn is_ambient_gravity_enabled(world: &World, entity: Entity) -> bool;

    /// Enable or disable the engine's own gravity for the entity.
    fn set_ambient_gravity_enabled(world: &mut World, entity: Entity, enabled: bool);

    /// Set the linear damping of an entity.
    fn set_linear_damping(_world: &mut World, _entity: Entity, _damping: f32) {}

    /// Get the collision groups for an entity (memberships, filters).
    /// Returns None if the entity doesn't have collision groups.
    fn get_collision_groups(_world: &World, _entity: Entity) -> Option<(u32, u32)> {
        None
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
