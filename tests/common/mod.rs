//! Analytic test backend.
//!
//! Bodies never move on their own: velocities, forces and impulses are only
//! recorded so tests can check exactly what the movement systems asked for.
//! Shape casts are answered against infinite planes in [`TestScene`].

#![allow(dead_code)]

use bevy::prelude::*;
use gravity_movement::backend::NoOpBackendPlugin;
use gravity_movement::prelude::*;

pub const DT: f32 = 1.0 / 60.0;

/// A capsule of radius 30 reaching 50 from its centre.
pub const CAPSULE: CapsuleDimensions = CapsuleDimensions {
    radius: 30.0,
    half_height: 50.0,
};

/// Physics state of a test body. Doubles as the backend's velocity component.
#[derive(Component, Debug, Clone)]
pub struct TestBody {
    pub velocity: Vec3,
    pub mass: f32,
    pub dynamic: bool,
    pub ambient_gravity: bool,
    pub linear_damping: f32,
    /// Forces applied during the last tick.
    pub forces: Vec<(Vec3, ForceMode)>,
    /// Every impulse applied since spawn.
    pub impulses: Vec<(Vec3, ForceMode)>,
    pub point_impulses: Vec<(Vec3, Vec3)>,
}

impl Default for TestBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            mass: 1.0,
            dynamic: true,
            ambient_gravity: true,
            linear_damping: 0.0,
            forces: Vec::new(),
            impulses: Vec::new(),
            point_impulses: Vec::new(),
        }
    }
}

impl TestBody {
    pub fn with_mass(mass: f32) -> Self {
        Self {
            mass,
            ..default()
        }
    }
}

#[derive(Component, Debug, Clone, Copy)]
pub struct TestCapsule(pub CapsuleDimensions);

/// An infinite plane.
#[derive(Debug, Clone, Copy)]
pub struct TestPlane {
    pub point: Vec3,
    pub normal: Vec3,
    pub entity: Option<Entity>,
}

#[derive(Resource, Debug, Default, Clone)]
pub struct TestScene {
    pub planes: Vec<TestPlane>,
}

impl TestScene {
    pub fn ground() -> Self {
        Self {
            planes: vec![TestPlane {
                point: Vec3::ZERO,
                normal: Vec3::Y,
                entity: None,
            }],
        }
    }

    pub fn plane(point: Vec3, normal: Vec3) -> Self {
        Self {
            planes: vec![TestPlane {
                point,
                normal: normal.normalize(),
                entity: None,
            }],
        }
    }
}

pub struct TestBackend;

impl GravityPhysicsBackend for TestBackend {
    type VelocityComponent = TestBody;

    fn plugin() -> impl Plugin {
        NoOpBackendPlugin
    }

    fn shapecast(world: &World, request: &ShapeCastRequest) -> Option<CollisionData> {
        let scene = world.get_resource::<TestScene>()?;
        let extent = request.shape.extent();

        scene
            .planes
            .iter()
            .filter(|plane| plane.entity.is_none() || plane.entity != request.exclude)
            .filter_map(|plane| {
                let separation = (request.origin - plane.point).dot(plane.normal);
                let closing_rate = -request.direction.dot(plane.normal);
                if separation < 0.0 || closing_rate <= 0.0 {
                    return None;
                }
                let distance = ((separation - extent) / closing_rate).max(0.0);
                (distance <= request.max_distance).then(|| {
                    let point = request.origin + request.direction * distance - plane.normal * extent;
                    CollisionData::new(distance, plane.normal, point, plane.entity)
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<TestBody>(entity)
            .map(|body| body.velocity)
            .unwrap_or(Vec3::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn apply_force(
        world: &mut World,
        entity: Entity,
        force: Vec3,
        mode: ForceMode,
        _allow_substepping: bool,
    ) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.forces.push((force, mode));
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec3, mode: ForceMode) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            let delta = match mode {
                ForceMode::Acceleration => impulse,
                ForceMode::Force => impulse / body.mass,
            };
            body.velocity += delta;
            body.impulses.push((impulse, mode));
        }
    }

    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, point: Vec3) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.point_impulses.push((impulse, point));
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec3 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .unwrap_or(Vec3::ZERO)
    }

    fn get_rotation(world: &World, entity: Entity) -> Quat {
        world
            .get::<Transform>(entity)
            .map(|t| t.rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    fn set_rotation(world: &mut World, entity: Entity, rotation: Quat) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.rotation = rotation;
        }
    }

    fn get_fixed_timestep(_world: &World) -> f32 {
        DT
    }

    fn capsule_dimensions(world: &World, entity: Entity) -> Option<CapsuleDimensions> {
        world.get::<TestCapsule>(entity).map(|capsule| capsule.0)
    }

    fn get_mass(world: &World, entity: Entity) -> f32 {
        world.get::<TestBody>(entity).map(|body| body.mass).unwrap_or(1.0)
    }

    fn is_simulating_physics(world: &World, entity: Entity) -> bool {
        world.get::<TestBody>(entity).is_some_and(|body| body.dynamic)
    }

    fn is_ambient_gravity_enabled(world: &World, entity: Entity) -> bool {
        world
            .get::<TestBody>(entity)
            .is_some_and(|body| body.ambient_gravity)
    }

    fn set_ambient_gravity_enabled(world: &mut World, entity: Entity, enabled: bool) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.ambient_gravity = enabled;
        }
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut body) = world.get_mut::<TestBody>(entity) {
            body.linear_damping = damping;
        }
    }
}

/// Create an app with the movement plugin on the test backend.
pub fn create_test_app(scene: TestScene) -> App {
    let mut app = App::new();
    app.add_plugins(GravityMovementPlugin::<TestBackend>::default());
    app.insert_resource(scene);
    app
}

/// Spawn a controlled capsule.
pub fn spawn_body(app: &mut App, transform: Transform, config: GravityMovementConfig) -> Entity {
    app.world_mut()
        .spawn((transform, config, TestBody::default(), TestCapsule(CAPSULE)))
        .id()
}

/// Spawn a body that attracts controlled bodies.
pub fn spawn_planet(app: &mut App, position: Vec3, source: GravitySource) -> Entity {
    app.world_mut()
        .spawn((Transform::from_translation(position), source))
        .id()
}

/// Run one fixed tick. Forces recorded by earlier ticks are dropped first.
pub fn tick(app: &mut App) {
    let mut q_bodies = app.world_mut().query::<&mut TestBody>();
    for mut body in q_bodies.iter_mut(app.world_mut()) {
        body.forces.clear();
    }
    app.world_mut().run_schedule(FixedUpdate);
}

/// Run N fixed ticks.
pub fn run_ticks(app: &mut App, ticks: usize) {
    for _ in 0..ticks {
        tick(app);
    }
}

pub fn body(app: &App, entity: Entity) -> &TestBody {
    app.world()
        .get::<TestBody>(entity)
        .expect("entity should have a TestBody")
}

pub fn state(app: &App, entity: Entity) -> &MovementState {
    app.world()
        .get::<MovementState>(entity)
        .expect("entity should have a MovementState")
}

pub fn up(app: &App, entity: Entity) -> Vec3 {
    app.world()
        .get::<Transform>(entity)
        .map(|t| t.rotation * Vec3::Y)
        .expect("entity should have a Transform")
}
