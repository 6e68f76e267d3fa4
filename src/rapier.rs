//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use std::sync::Mutex;

use bevy::ecs::system::SystemState;
use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::parry::shape::{Ball, Cuboid};
use bevy_rapier3d::prelude::*;

use crate::backend::{CapsuleDimensions, CastShape, GravityPhysicsBackend, ShapeCastRequest};
use crate::collision::CollisionData;
use crate::config::GravityMovementConfig;
use crate::contact::ContactEvent;
use crate::gravity::ForceMode;
use crate::GravityMovementSet;

/// Rapier3D physics backend for gravity movement.
///
/// This backend uses `bevy_rapier3d` for force application, velocity
/// manipulation and scene queries. Shape casts go through a cached
/// `ReadRapierContext`, so they work from exclusive systems.
pub struct Rapier3dBackend;

impl GravityPhysicsBackend for Rapier3dBackend {
    type VelocityComponent = Velocity;

    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn shapecast(world: &World, request: &ShapeCastRequest) -> Option<CollisionData> {
        if request.direction == Vec3::ZERO {
            return None;
        }

        let cast_state = world.get_resource::<RapierCastState>()?;
        let mut cast_state = cast_state.0.lock().ok()?;
        let rapier_context = cast_state.get(world);
        let context = rapier_context.single().ok()?;

        let mut filter = QueryFilter::default().exclude_sensors();
        if let Some(entity) = request.exclude {
            filter = filter.exclude_rigid_body(entity);
        }
        if let Some((memberships, filters)) = request.collision_groups {
            filter = filter.groups(CollisionGroups::new(
                Group::from_bits_truncate(memberships),
                Group::from_bits_truncate(filters),
            ));
        }

        let options = ShapeCastOptions {
            max_time_of_impact: request.max_distance,
            stop_at_penetration: false,
            ..default()
        };
        let hit = match request.shape {
            CastShape::Ray => {
                return context
                    .cast_ray_and_get_normal(
                        request.origin,
                        request.direction,
                        request.max_distance,
                        true,
                        filter,
                    )
                    .map(|(hit_entity, hit)| {
                        CollisionData::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
                    });
            }
            CastShape::Sphere { radius } => context.cast_shape(
                request.origin,
                request.rotation,
                request.direction,
                &Ball::new(radius),
                options,
                filter,
            ),
            CastShape::Cube { half_extent } => context.cast_shape(
                request.origin,
                request.rotation,
                request.direction,
                &Cuboid::new(Vec3::splat(half_extent).into()),
                options,
                filter,
            ),
        };

        hit.map(|(hit_entity, hit)| {
            let normal = hit.details.map(|d| d.normal1).unwrap_or(-request.direction);
            // Contact on the hit surface, one shape extent below the swept centre
            let center = request.origin + request.direction * hit.time_of_impact;
            let hit_point = center - normal * request.shape.extent();
            CollisionData::new(hit.time_of_impact, normal, hit_point, Some(hit_entity))
        })
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn apply_force(
        world: &mut World,
        entity: Entity,
        force: Vec3,
        mode: ForceMode,
        _allow_substepping: bool,
    ) {
        // Rapier has no per-force sub-stepping.
        let force = match mode {
            ForceMode::Acceleration => force * Self::get_mass(world, entity),
            ForceMode::Force => force,
        };
        if let Some(mut accumulator) = world.get_mut::<GravityForceAccumulator>(entity) {
            accumulator.pending += force;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(GravityForceAccumulator {
                pending: force,
                applied: Vec3::ZERO,
            });
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3, mode: ForceMode) {
        let impulse = match mode {
            ForceMode::Acceleration => impulse * Self::get_mass(world, entity),
            ForceMode::Force => impulse,
        };
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else {
            // Fallback: apply as velocity change if no ExternalImpulse component
            let mass = Self::get_mass(world, entity);
            if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                vel.linvel += impulse / mass;
            }
        }
    }

    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, point: Vec3) {
        let center = Self::get_position(world, entity);
        let torque = (point - center).cross(impulse);
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
            ext_impulse.torque_impulse += torque;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(ExternalImpulse {
                impulse,
                torque_impulse: torque,
            });
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .or_else(|| world.get::<GlobalTransform>(entity).map(|t| t.translation()))
            .unwrap_or(Vec3::ZERO)
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .or_else(|| {
                world.get::<GlobalTransform>(entity).map(|t| {
                    let (_, rotation, _) = t.to_scale_rotation_translation();
                    rotation
                })
            })
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    fn get_fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 60.0)
    }

    fn capsule_dimensions(world: &World, entity: Entity) -> Option<CapsuleDimensions> {
        world.get::<Collider>(entity).and_then(capsule_dimensions)
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.mass)
            .filter(|mass| *mass > 0.0 && mass.is_finite())
            .unwrap_or(1.0)
    }

    fn is_simulating_physics(world: &World, entity: Entity) -> bool {
        matches!(world.get::<RigidBody>(entity), Some(RigidBody::Dynamic))
    }

    fn ambient_gravity(world: &World) -> Vec3 {
        world
            .try_query::<&RapierConfiguration>()
            .and_then(|mut state| state.iter(world).next().map(|config| config.gravity))
            .unwrap_or(Vec3::new(0.0, -crate::gravity::DEFAULT_GRAVITY_POWER, 0.0))
    }

    fn is_ambient_gravity_enabled(world: &World, entity: Entity) -> bool {
        world
            .get::<GravityScale>(entity)
            .map(|scale| scale.0 != 0.0)
            .unwrap_or(true)
    }

    fn set_ambient_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        let scale = if enabled { 1.0 } else { 0.0 };
        if let Some(mut gravity_scale) = world.get_mut::<GravityScale>(entity) {
            gravity_scale.0 = scale;
        } else if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
            entity_mut.insert(GravityScale(scale));
        }
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut current) = world.get_mut::<Damping>(entity) {
            current.linear_damping = damping;
        }
    }

    fn get_collision_groups(world: &World, entity: Entity) -> Option<(u32, u32)> {
        world
            .get::<CollisionGroups>(entity)
            .map(|cg| (cg.memberships.bits(), cg.filters.bits()))
    }
}

/// Plugin that sets up Rapier3D-specific systems for gravity movement.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        let cast_state = SystemState::<ReadRapierContext<'static, 'static>>::new(app.world_mut());
        app.insert_resource(RapierCastState(Mutex::new(cast_state)));

        app.add_systems(
            FixedUpdate,
            clear_gravity_forces.in_set(GravityMovementSet::Prepare),
        );

        // Contact events must be written before the contact handler reads them.
        app.add_systems(
            FixedUpdate,
            forward_collision_events
                .in_set(GravityMovementSet::Contacts)
                .before(crate::systems::handle_contact_events::<Rapier3dBackend>),
        );

        app.add_systems(
            FixedUpdate,
            apply_gravity_forces.in_set(GravityMovementSet::Sync),
        );
    }
}

/// Cached access to the default Rapier context for shape casts issued
/// through [`GravityPhysicsBackend::shapecast`], which only sees `&World`.
#[derive(Resource)]
struct RapierCastState(Mutex<SystemState<ReadRapierContext<'static, 'static>>>);

/// Capsule dimensions of a collider, or `None` for other shapes.
pub fn capsule_dimensions(collider: &Collider) -> Option<CapsuleDimensions> {
    let capsule = collider.as_capsule()?;
    let segment = capsule.segment();
    let segment_half_length = (segment.a() - segment.b()).length() / 2.0;
    Some(CapsuleDimensions::from_segment(segment_half_length, capsule.radius()))
}

/// Gravity forces accumulated for one controlled body.
///
/// Rapier keeps `ExternalForce` until it is changed, so the force written
/// last tick is subtracted again before this tick's forces are added. Forces
/// other systems put on `ExternalForce` are left untouched.
#[derive(Component, Debug, Default, Clone, Copy)]
pub struct GravityForceAccumulator {
    /// Forces added during the current tick.
    pub pending: Vec3,
    /// Forces written to `ExternalForce` last tick.
    pub applied: Vec3,
}

/// Remove last tick's gravity forces from `ExternalForce`.
pub fn clear_gravity_forces(mut q: Query<(&mut ExternalForce, &mut GravityForceAccumulator)>) {
    for (mut ext_force, mut accumulator) in &mut q {
        ext_force.force -= accumulator.applied;
        accumulator.applied = Vec3::ZERO;
        accumulator.pending = Vec3::ZERO;
    }
}

/// Write this tick's gravity forces to `ExternalForce`.
pub fn apply_gravity_forces(mut q: Query<(&mut ExternalForce, &mut GravityForceAccumulator)>) {
    for (mut ext_force, mut accumulator) in &mut q {
        ext_force.force += accumulator.pending;
        accumulator.applied = accumulator.pending;
        accumulator.pending = Vec3::ZERO;
    }
}

/// Turn Rapier collision starts involving a controlled body into
/// [`ContactEvent`]s.
///
/// Colliders need [`ActiveEvents::COLLISION_EVENTS`] for Rapier to report
/// them; [`GravityCharacterBundle`] sets it.
pub fn forward_collision_events(
    rapier_context: ReadRapierContext,
    mut collisions: EventReader<CollisionEvent>,
    q_bodies: Query<&GlobalTransform, With<GravityMovementConfig>>,
    mut contacts: EventWriter<ContactEvent>,
) {
    let Ok(context) = rapier_context.single() else {
        collisions.clear();
        return;
    };

    for collision in collisions.read() {
        let (first, second) = match collision {
            CollisionEvent::Started(first, second, _) => (*first, *second),
            CollisionEvent::Stopped(..) => continue,
        };

        for (body, other) in [(first, second), (second, first)] {
            let Ok(body_transform) = q_bodies.get(body) else {
                continue;
            };
            let Some(pair) = context.contact_pair(body, other) else {
                continue;
            };
            let Some(manifold) = pair.manifolds().next() else {
                continue;
            };

            // Manifold normals point from the pair's first collider to its second.
            let normal = if pair.collider1() == body {
                -manifold.normal()
            } else {
                manifold.normal()
            };
            let point = manifold
                .solver_contact(0)
                .map(|contact| contact.point())
                .unwrap_or_else(|| body_transform.translation());

            contacts.write(ContactEvent {
                body,
                other,
                normal,
                point,
            });
        }
    }
}

/// Bundle for creating a gravity-driven character with Rapier3D physics.
///
/// This bundle provides all the Rapier3D components a controlled body needs:
/// the rigid body, velocity tracking, external forces and impulses, damping,
/// mass properties, an ambient gravity scale and collision event reporting.
/// The capsule collider is added separately.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use gravity_movement::prelude::*;
///
/// fn spawn_player(mut commands: Commands, planet: Entity) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 1200.0, 0.0),
///         GravityMovementConfig::planet_walker(),
///         MovementState::new().with_planet(planet),
///         GravityCharacterBundle::new(),
///         Collider::capsule_y(40.0, 30.0),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::Dynamic`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED`]; orientation is driven by
///   the movement systems, not by contact torques
/// - `damping`: linear 0.01 (the airborne default), angular 1.0
/// - `gravity_scale`: 1.0; switched off for non-default gravity modes
/// - `active_events`: [`ActiveEvents::COLLISION_EVENTS`]
#[derive(Bundle)]
pub struct GravityCharacterBundle {
    pub rigid_body: RigidBody,
    pub velocity: Velocity,
    pub external_force: ExternalForce,
    pub external_impulse: ExternalImpulse,
    pub locked_axes: LockedAxes,
    pub damping: Damping,
    pub mass_properties: ReadMassProperties,
    pub gravity_scale: GravityScale,
    pub active_events: ActiveEvents,
    pub accumulator: GravityForceAccumulator,
}

impl Default for GravityCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl GravityCharacterBundle {
    /// Create a dynamic character bundle with rotation locked against contacts.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping {
                linear_damping: 0.01,
                angular_damping: 1.0,
            },
            // Rapier will update this based on collider after first physics step
            mass_properties: ReadMassProperties::default(),
            gravity_scale: GravityScale(1.0),
            active_events: ActiveEvents::COLLISION_EVENTS,
            accumulator: GravityForceAccumulator::default(),
        }
    }

    /// Set the rigid body type for the character.
    ///
    /// # Example
    ///
    /// ```ignore
    /// // Kinematic character for scripted movement
    /// let bundle = GravityCharacterBundle::new().with_body(RigidBody::KinematicVelocityBased);
    /// ```
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set the angular damping. Linear damping is managed by the movement
    /// systems from [`DampingConfig`](crate::config::DampingConfig).
    pub fn with_angular_damping(mut self, angular: f32) -> Self {
        self.damping.angular_damping = angular;
        self
    }

    /// Set which axes should be locked for the rigid body.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}
