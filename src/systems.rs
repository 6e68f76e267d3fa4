//! Gravity movement systems.
//!
//! These systems run the per-tick state machine of every controlled body.
//! They are generic over the physics backend to allow different physics
//! engines to be used.
//!
//! Order within a fixed tick (see [`GravityMovementSet`](crate::GravityMovementSet)):
//! configuration sanitising, contact response, intent handling, the gravity
//! tick itself, walking, and finally marker synchronisation.

use bevy::ecs::event::EventCursor;
use bevy::prelude::*;

use crate::backend::{CapsuleDimensions, GravityPhysicsBackend};
use crate::collision::CollisionData;
use crate::config::{GravityMovementConfig, JumpPolicy, VerticalOrientation};
use crate::contact::{respond_to_contact, ContactEvent, ContactInput};
use crate::detection::{probe_ground, trace_surface, GroundProbe, SurfaceTrace};
use crate::forces::{apply_gravity, apply_jump_impulse, gravity_force, jump_impulse};
use crate::gravity::{
    resolve_gravity, GlobalGravity, GravityInfo, GravityMode, GravityResolution, GravitySource,
    GravitySources,
};
use crate::intent::{MovementIntent, PendingJump};
use crate::orientation::{local_up, reorient};
use crate::state::{Airborne, Grounded, MovementState};

/// Airborne time after which a body bound to a planet gets grounded damping
/// back, so long falls toward a planet do not build up unbounded speed.
const PLANET_FALL_DAMPING_DELAY: f32 = 1.0;

/// Replace invalid configuration values with usable ones.
///
/// Runs whenever a config is added or changed. The body keeps moving with the
/// sanitised values; the problem is reported once as a warning.
pub fn sanitize_configs(
    mut q_configs: Query<(Entity, &mut GravityMovementConfig), Changed<GravityMovementConfig>>,
) {
    for (entity, mut config) in &mut q_configs {
        if let Err(err) = config.validate() {
            warn!("gravity movement config on {entity} is invalid ({err}); using sanitized values");
            *config = config.sanitized();
        }
    }
}

/// Respond to contacts reported by the physics backend.
///
/// Records the hit, cancels lateral velocity on hard landings, marks what the
/// body landed on and pushes dynamic bodies out of the way.
pub fn handle_contact_events<B: GravityPhysicsBackend>(
    world: &mut World,
    mut cursor: Local<EventCursor<ContactEvent>>,
) {
    let Some(events) = world.get_resource::<Events<ContactEvent>>() else {
        return;
    };
    let contacts: Vec<ContactEvent> = cursor.read(events).copied().collect();

    for contact in contacts {
        if world.get_entity(contact.other).is_err() {
            continue;
        }
        let Some(interaction) = world
            .get::<GravityMovementConfig>(contact.body)
            .map(|config| config.physics_interaction)
        else {
            continue;
        };
        let Some(mut state) = world.get::<MovementState>(contact.body).cloned() else {
            continue;
        };
        if !state.initialized {
            continue;
        }

        let input = ContactInput {
            other: contact.other,
            normal: contact.normal,
            point: contact.point,
            velocity: B::get_velocity(world, contact.body),
            up: local_up(B::get_rotation(world, contact.body)),
            gravity_direction: state.gravity_direction(),
            body_position: B::get_position(world, contact.body),
            other_position: B::get_position(world, contact.other),
            other_mass: B::get_mass(world, contact.other),
            other_simulating: B::is_simulating_physics(world, contact.other),
            other_is_gravity_source: world.get::<GravitySource>(contact.other).is_some(),
        };
        let response = respond_to_contact(&input, &interaction);

        if let Some(velocity) = response.corrected_velocity {
            B::set_velocity(world, contact.body, velocity);
        }
        if let Some((impulse, point)) = response.push {
            B::apply_impulse_at_point(world, contact.other, impulse, point);
        }

        let hit = CollisionData::new(0.0, contact.normal, contact.point, Some(contact.other));
        state.apply_contact_response(&response, hit);

        if state.debug_enabled {
            debug!(
                "contact {} -> {}: normal {:?}, landed {}, push {:?}",
                contact.body,
                contact.other,
                contact.normal,
                response.landed_on.is_some(),
                response.push
            );
        }

        if let Some(mut stored) = world.get_mut::<MovementState>(contact.body) {
            *stored = state;
        }
    }
}

/// Turn jump and sprint input edges into commands.
pub fn process_movement_intents<B: GravityPhysicsBackend>(world: &mut World) {
    let entities: Vec<Entity> = world
        .query_filtered::<Entity, (With<MovementIntent>, With<B::VelocityComponent>)>()
        .iter(world)
        .collect();

    for entity in entities {
        let Some(mut intent) = world.get_mut::<MovementIntent>(entity) else {
            continue;
        };
        let jump = intent.take_jump_edge();
        let sprint = intent.take_sprint_edge();

        if jump {
            request_jump::<B>(world, entity);
        }

        let Some(multiplier) = world
            .get::<GravityMovementConfig>(entity)
            .map(|config| config.sprint_multiplier)
        else {
            continue;
        };
        if let Some(mut state) = world.get_mut::<MovementState>(entity) {
            match sprint {
                Some(true) => {
                    state.start_sprint(multiplier);
                }
                Some(false) => {
                    state.stop_sprint();
                }
                None => {}
            }
        }
    }
}

/// Run one gravity movement tick for every controlled body.
pub fn update_gravity_movement<B: GravityPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, GravityMovementConfig)> = world
        .query_filtered::<(Entity, &GravityMovementConfig), (
            With<MovementState>,
            With<B::VelocityComponent>,
        )>()
        .iter(world)
        .map(|(e, config)| (e, config.clone()))
        .collect();

    let dt = B::get_fixed_timestep(world);

    for (entity, config) in entities {
        let Some(mut state) = world.get::<MovementState>(entity).cloned() else {
            continue;
        };
        tick_body::<B>(world, entity, &config, &mut state, dt);
        if let Some(mut stored) = world.get_mut::<MovementState>(entity) {
            *stored = state;
        }
    }
}

/// One tick of the state machine for one body.
fn tick_body<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &mut MovementState,
    dt: f32,
) {
    let Some(capsule) = B::capsule_dimensions(world, entity) else {
        if !state.inert_reported {
            warn!("{entity} has gravity movement but no capsule; leaving it alone");
            state.inert_reported = true;
        }
        return;
    };

    let rotation = B::get_rotation(world, entity);
    if !state.initialized {
        state.initialize(config, rotation);
        state.request_gravity_immediate_update();
        let ambient = config.gravity_mode == GravityMode::Default && config.gravity_scale != 0.0;
        B::set_ambient_gravity_enabled(world, entity, ambient);
        B::set_linear_damping(world, entity, config.damping.airborne);
        debug!("gravity movement initialized for {entity} in {:?} mode", config.gravity_mode);
    }
    state.current_capsule_rotation = rotation;
    state.current_trace_shape_scale = config
        .trace_shape_scale
        .clamp(0.0, crate::config::MAX_TRACE_SHAPE_SCALE);
    state.clock += dt;

    validate_references(world, state);

    // Ground probe.
    let probe = GroundProbe::new(capsule, config.ground_tolerance);
    let ground = probe_ground::<B>(world, entity, &probe, rotation);
    state.record_ground_probe(ground, dt);
    if !state.is_airborne && state.falling_speed(B::get_velocity(world, entity)) <= 0.0 {
        state.is_jumping = false;
    }
    if state.debug_enabled || config.debug_traces {
        debug!("ground probe for {entity}: {:?} ({} s airborne)", ground, state.time_airborne);
    }

    update_damping::<B>(world, entity, config, state);
    reset_velocity_on_switch::<B>(world, entity, config, state);

    // Gravity selection.
    let mut has_gravity = true;
    let vertical = config.vertical_orientation(state.is_airborne);
    if !state.is_airborne && config.standing_orientation == VerticalOrientation::SurfaceNormal {
        let surface = trace_standing_surface::<B>(world, entity, config, state, capsule, rotation);
        state.traced_surface_hit = surface;
        if let Some(hit) = surface {
            let sources = gravity_sources::<B>(world, entity, config, state, Some(hit.normal));
            if let GravityResolution::Resolved(info) =
                resolve_gravity(GravityMode::SurfaceBased, &sources)
            {
                adopt_gravity::<B>(world, entity, config, state, GravityMode::SurfaceBased, info);
            }
        }
    } else if vertical == VerticalOrientation::GravityDirection
        && (state.pending_immediate_gravity_update
            || state.awaiting_gravity_source
            || !state.is_airborne
            || state.time_airborne > config.gravity_switch_delay)
    {
        let sources = gravity_sources::<B>(world, entity, config, state, None);
        match resolve_gravity(config.gravity_mode, &sources) {
            GravityResolution::Resolved(info) => {
                if state.pending_immediate_gravity_update {
                    state.pending_immediate_gravity_update = false;
                    B::set_linear_damping(world, entity, config.damping.airborne);
                }
                state.awaiting_gravity_source = false;
                adopt_gravity::<B>(world, entity, config, state, config.gravity_mode, info);
            }
            GravityResolution::NoGravity => {
                state.pending_immediate_gravity_update = false;
                state.awaiting_gravity_source = true;
                has_gravity = false;
                if state.debug_enabled || config.debug_traces {
                    debug!("no gravity source for {entity}; skipping gravity this tick");
                }
            }
        }
    }

    if has_gravity {
        orient_and_pull::<B>(world, entity, config, state, rotation, dt);
    }

    // Delayed jump.
    if let Some(pending) = state.pending_jump {
        if pending.is_due(state.clock) {
            state.pending_jump = None;
            if jump_allowed(config, state) {
                launch_jump::<B>(world, entity, config, state, capsule);
            }
        }
    }
}

/// Turn toward the current gravity and apply its force.
fn orient_and_pull<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &mut MovementState,
    rotation: Quat,
    dt: f32,
) {
    let orientation = state.current_orientation;
    let new_rotation = reorient(
        rotation,
        -state.current_gravity.safe_direction(),
        orientation.instant,
        orientation.interp_speed,
        dt,
        config.orientation.interpolation_mode,
    );
    if new_rotation != rotation {
        B::set_rotation(world, entity, new_rotation);
    }
    state.current_capsule_rotation = new_rotation;

    // Default mode is integrated by the backend itself.
    if state.current_mode != GravityMode::Default {
        let info = state.current_gravity;
        let force = gravity_force(&info, config.gravity_scale);
        apply_gravity::<B>(world, entity, force, info.use_substepping, info.is_acceleration());
    }
}

/// Clear entity ids whose targets no longer exist.
fn validate_references(world: &World, state: &mut MovementState) {
    if let Some(other) = state.standing_on {
        if world.get_entity(other).is_err() {
            state.clear_standing_on();
        }
    }
    if let Some(planet) = state.planet {
        if world.get::<GravitySource>(planet).is_none() {
            state.clear_planet();
            state.request_gravity_immediate_update();
        }
    }
}

fn update_damping<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &MovementState,
) {
    let long_planet_fall = state.time_airborne > PLANET_FALL_DAMPING_DELAY
        && state.planet.is_some()
        && !state.is_jumping;

    let damping = if !state.is_airborne || long_planet_fall {
        config.damping.grounded
    } else {
        config.damping.airborne
    };
    B::set_linear_damping(world, entity, damping);
}

/// Zero velocity once per airborne episode when the switch delay elapses.
fn reset_velocity_on_switch<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &mut MovementState,
) {
    if !config.reset_velocity_on_gravity_switch || state.pending_immediate_gravity_update {
        return;
    }

    if !state.is_airborne {
        state.can_reset_gravity_on_airborne = true;
    } else if state.can_reset_gravity_on_airborne
        && state.time_airborne >= config.gravity_switch_delay
    {
        B::set_velocity(world, entity, Vec3::ZERO);
        state.can_reset_gravity_on_airborne = false;
    }
}

fn trace_standing_surface<B: GravityPhysicsBackend>(
    world: &World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &MovementState,
    capsule: CapsuleDimensions,
    rotation: Quat,
) -> Option<CollisionData> {
    let hit = if config.use_capsule_hit {
        state.contact_hit.filter(CollisionData::is_valid_blocking_hit)
    } else {
        let trace = SurfaceTrace::new(
            config.trace_shape,
            capsule,
            config.ground_tolerance,
            state.current_trace_shape_scale,
        );
        trace_surface::<B>(world, entity, &trace, rotation)
    };

    if state.debug_enabled || config.debug_traces {
        debug!("surface trace for {entity}: {:?}", hit);
    }
    hit
}

fn gravity_sources<B: GravityPhysicsBackend>(
    world: &World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &MovementState,
    surface_normal: Option<Vec3>,
) -> GravitySources {
    GravitySources {
        ambient: B::ambient_gravity(world),
        custom: config.custom_gravity,
        global: world
            .get_resource::<GlobalGravity>()
            .map(GlobalGravity::get)
            .unwrap_or_default(),
        point: state.planet.and_then(|planet| {
            world
                .get::<GravitySource>(planet)
                .map(|source| (*source, B::get_position(world, planet)))
        }),
        surface: config.surface_based_gravity,
        surface_normal,
        position: B::get_position(world, entity),
    }
}

/// Store a resolved gravity and keep the backend's ambient gravity in step
/// with the mode.
fn adopt_gravity<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &mut MovementState,
    mode: GravityMode,
    info: GravityInfo,
) {
    if state.current_mode != mode {
        debug!("{entity} switched gravity mode {:?} -> {:?}", state.current_mode, mode);
    }
    state.current_gravity = info;
    state.current_mode = mode;
    state.current_orientation = config.orientation.for_mode(mode);

    let ambient_wanted = mode == GravityMode::Default && config.gravity_scale != 0.0;
    if B::is_ambient_gravity_enabled(world, entity) != ambient_wanted {
        B::set_ambient_gravity_enabled(world, entity, ambient_wanted);
        if mode == GravityMode::Default && !ambient_wanted {
            B::set_velocity(world, entity, Vec3::ZERO);
        }
    }
}

fn jump_allowed(config: &GravityMovementConfig, state: &MovementState) -> bool {
    config.can_jump && state.initialized && !state.is_airborne
}

fn launch_jump<B: GravityPhysicsBackend>(
    world: &mut World,
    entity: Entity,
    config: &GravityMovementConfig,
    state: &mut MovementState,
    capsule: CapsuleDimensions,
) {
    let impulse = jump_impulse(
        state.up(),
        state.gravity_power(config.gravity_scale),
        config.jump_height,
        capsule.half_height,
    );
    apply_jump_impulse::<B>(world, entity, impulse, state.current_gravity.is_acceleration());
    state.is_jumping = true;
    debug!("{entity} jumped with impulse {impulse:?}");
}

/// Make a body jump.
///
/// Returns `false`, changing nothing, when jumping is disabled, the body is
/// airborne, has no capsule or has not been ticked yet. With a delayed jump
/// policy the impulse is scheduled instead of applied, and a second request
/// during the wind-up is refused.
pub fn request_jump<B: GravityPhysicsBackend>(world: &mut World, entity: Entity) -> bool {
    let Some(config) = world.get::<GravityMovementConfig>(entity).cloned() else {
        return false;
    };
    let Some(capsule) = B::capsule_dimensions(world, entity) else {
        return false;
    };
    let Some(mut state) = world.get::<MovementState>(entity).cloned() else {
        return false;
    };
    if !jump_allowed(&config, &state) {
        return false;
    }

    match config.jump_policy {
        JumpPolicy::Immediate => launch_jump::<B>(world, entity, &config, &mut state, capsule),
        JumpPolicy::Delayed { wind_up } => {
            if state.pending_jump.is_some() {
                return false;
            }
            state.pending_jump = Some(PendingJump::new(state.clock, wind_up));
        }
    }

    if let Some(mut stored) = world.get_mut::<MovementState>(entity) {
        *stored = state;
    }
    true
}

/// Zero a body's velocity.
pub fn stop_movement_immediately<B: GravityPhysicsBackend>(world: &mut World, entity: Entity) {
    B::set_velocity(world, entity, Vec3::ZERO);
}

/// Accelerate bodies toward their walking intent.
///
/// Input is projected onto the plane perpendicular to the body's up axis;
/// velocity along the up axis is left to gravity and jumps. While airborne,
/// acceleration is scaled by `air_control` and there is no braking.
pub fn apply_walk_movement<B: GravityPhysicsBackend>(world: &mut World) {
    let entities: Vec<(Entity, GravityMovementConfig, MovementIntent, MovementState)> = world
        .query_filtered::<(
            Entity,
            &GravityMovementConfig,
            &MovementIntent,
            &MovementState,
        ), With<B::VelocityComponent>>()
        .iter(world)
        .filter(|(_, _, _, state)| state.initialized)
        .map(|(e, config, intent, state)| (e, config.clone(), intent.clone(), state.clone()))
        .collect();

    let dt = B::get_fixed_timestep(world);

    for (entity, config, intent, state) in entities {
        if B::capsule_dimensions(world, entity).is_none() {
            continue;
        }
        if state.is_airborne && !intent.is_walking() {
            continue;
        }

        let up = state.up();
        let velocity = B::get_velocity(world, entity);
        let vertical = up * velocity.dot(up);
        let lateral = velocity - vertical;

        let input = intent.effective_direction();
        let planar = input.reject_from_normalized(up).normalize_or_zero() * input.length();
        let target = planar * state.max_speed;

        let accel = if state.is_airborne {
            config.acceleration * config.air_control
        } else {
            config.acceleration
        };
        let change = (target - lateral).clamp_length_max(accel * dt);
        if change.length_squared() <= f32::EPSILON {
            continue;
        }

        B::set_velocity(world, entity, vertical + lateral + change);
    }
}

/// Sync [`Grounded`]/[`Airborne`] markers with the movement state.
pub fn sync_state_markers(
    mut commands: Commands,
    q_states: Query<(Entity, &MovementState, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, state, has_grounded, has_airborne) in &q_states {
        if !state.initialized {
            continue;
        }

        if !state.is_airborne && !has_grounded {
            commands.entity(entity).insert(Grounded);
            commands.entity(entity).remove::<Airborne>();
        } else if state.is_airborne && !has_airborne {
            commands.entity(entity).insert(Airborne);
            commands.entity(entity).remove::<Grounded>();
        }
    }
}
