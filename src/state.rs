//! Movement state.
//!
//! [`MovementState`] is the per-body record the tick system reads and writes:
//! the gravity currently applied, ground contact, sprinting, jumping and the
//! bound planet. [`Grounded`] and [`Airborne`] mirror its ground flag as
//! marker components so gameplay systems can filter on them.

use bevy::prelude::*;

use crate::collision::CollisionData;
use crate::config::{GravityMovementConfig, OrientationInfo, MAX_TRACE_SHAPE_SCALE};
use crate::contact::ContactResponse;
use crate::gravity::{GravityInfo, GravityMode};
use crate::intent::PendingJump;
use crate::orientation::local_up;

/// Marker component indicating the character is grounded.
///
/// Added automatically when the ground probe hits something. Removed when the
/// character becomes airborne.
///
/// This is a marker component - it has no data, just indicates state.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use gravity_movement::prelude::*;
///
/// // Grounded is a marker component - just use it in queries
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Mutually exclusive with [`Grounded`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Per-body movement state.
///
/// Owned by exactly one controlled body. The entity ids it holds
/// (`standing_on`, `planet`) do not keep their targets alive; ids whose
/// entity is gone are cleared on the next tick.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct MovementState {
    // === Gravity ===
    /// Gravity applied on the last tick it was resolved.
    pub current_gravity: GravityInfo,
    /// Mode `current_gravity` was resolved with.
    pub current_mode: GravityMode,
    /// Orientation behaviour of `current_mode`.
    pub current_orientation: OrientationInfo,
    /// Gravity will be re-resolved on the next tick regardless of the switch delay.
    pub pending_immediate_gravity_update: bool,
    /// The last resolution found no gravity; keep re-resolving every tick.
    pub awaiting_gravity_source: bool,
    /// The next airborne episode may zero velocity when the switch delay elapses.
    pub can_reset_gravity_on_airborne: bool,
    /// Bound point-gravity source.
    pub planet: Option<Entity>,

    // === Ground Contact ===
    pub is_airborne: bool,
    /// Seconds since the ground probe last hit. Exactly 0 while grounded.
    pub time_airborne: f32,
    /// Ground probe hit.
    #[reflect(ignore)]
    pub standing_surface_hit: Option<CollisionData>,
    /// Surface trace hit.
    #[reflect(ignore)]
    pub traced_surface_hit: Option<CollisionData>,
    /// Last physical contact.
    #[reflect(ignore)]
    pub contact_hit: Option<CollisionData>,
    /// Entity last landed on.
    pub standing_on: Option<Entity>,
    pub is_standing_on_gravity_source: bool,

    // === Orientation ===
    pub current_capsule_rotation: Quat,
    /// Surface trace extent relative to the capsule radius, in `[0, 1)`.
    pub current_trace_shape_scale: f32,

    // === Locomotion ===
    pub is_sprinting: bool,
    /// Walk speed saved while sprinting.
    pub saved_walk_speed: f32,
    /// Current maximum walking speed.
    pub max_speed: f32,
    pub is_jumping: bool,
    #[reflect(ignore)]
    pub pending_jump: Option<PendingJump>,

    // === Bookkeeping ===
    pub debug_enabled: bool,
    /// Simulation time accumulated by this body's ticks.
    pub clock: f32,
    pub initialized: bool,
    /// A missing capsule has been reported.
    pub inert_reported: bool,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            current_gravity: GravityInfo::default(),
            current_mode: GravityMode::Default,
            current_orientation: OrientationInfo::default(),
            pending_immediate_gravity_update: false,
            awaiting_gravity_source: false,
            can_reset_gravity_on_airborne: true,
            planet: None,
            is_airborne: true,
            time_airborne: 0.0,
            standing_surface_hit: None,
            traced_surface_hit: None,
            contact_hit: None,
            standing_on: None,
            is_standing_on_gravity_source: false,
            current_capsule_rotation: Quat::IDENTITY,
            current_trace_shape_scale: 0.0,
            is_sprinting: false,
            saved_walk_speed: 0.0,
            max_speed: 0.0,
            is_jumping: false,
            pending_jump: None,
            debug_enabled: false,
            clock: 0.0,
            initialized: false,
            inert_reported: false,
        }
    }
}

impl MovementState {
    /// Create an uninitialised state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a state already bound to a planet.
    pub fn with_planet(planet: Entity) -> Self {
        Self {
            planet: Some(planet),
            ..default()
        }
    }

    /// Initialise from configuration and the body's current rotation.
    ///
    /// Gravity starts out pointing down the body's up axis so the first tick
    /// does not rotate a body that was spawned upright.
    pub fn initialize(&mut self, config: &GravityMovementConfig, rotation: Quat) {
        let up = local_up(rotation);

        self.current_mode = config.gravity_mode;
        self.current_orientation = config.orientation.for_mode(config.gravity_mode);
        self.current_gravity = GravityInfo::default().with_direction(-up).sanitized();
        self.current_capsule_rotation = rotation;
        self.current_trace_shape_scale = config.trace_shape_scale.clamp(0.0, MAX_TRACE_SHAPE_SCALE);
        self.max_speed = config.max_speed;
        self.saved_walk_speed = config.max_speed;
        self.is_sprinting = false;
        self.initialized = true;
    }

    /// Record a ground probe result for a tick of length `dt`.
    ///
    /// A hit grounds the body and resets `time_airborne` to exactly 0; a miss
    /// adds `dt`.
    pub fn record_ground_probe(&mut self, hit: Option<CollisionData>, dt: f32) {
        self.is_airborne = hit.is_none();
        self.standing_surface_hit = hit;
        if self.is_airborne {
            self.time_airborne += dt.max(0.0);
        } else {
            self.time_airborne = 0.0;
        }
    }

    /// Apply the state changes of a contact.
    pub fn apply_contact_response(&mut self, response: &ContactResponse, hit: CollisionData) {
        self.contact_hit = Some(hit);
        if let Some(other) = response.landed_on {
            self.is_jumping = false;
            self.standing_on = Some(other);
            self.is_standing_on_gravity_source = response.landed_on_gravity_source;
        }
    }

    /// Forget the entity last landed on.
    pub fn clear_standing_on(&mut self) {
        self.standing_on = None;
        self.is_standing_on_gravity_source = false;
    }

    // === Sprint ===

    /// Start sprinting at `multiplier` times the walk speed.
    ///
    /// Refused (returns `false`) while airborne or already sprinting.
    pub fn start_sprint(&mut self, multiplier: f32) -> bool {
        if self.is_airborne || self.is_sprinting {
            return false;
        }
        self.saved_walk_speed = self.max_speed;
        self.max_speed *= multiplier.max(0.0);
        self.is_sprinting = true;
        true
    }

    /// Stop sprinting and restore the saved walk speed exactly.
    pub fn stop_sprint(&mut self) -> bool {
        if !self.is_sprinting {
            return false;
        }
        self.max_speed = self.saved_walk_speed;
        self.is_sprinting = false;
        true
    }

    pub fn is_sprinting(&self) -> bool {
        self.is_sprinting
    }

    // === Gravity Commands ===

    /// Re-resolve gravity on the next tick even mid-air.
    pub fn request_gravity_immediate_update(&mut self) {
        self.pending_immediate_gravity_update = true;
    }

    /// Bind a point-gravity source and re-resolve gravity on the next tick.
    pub fn set_current_planet(&mut self, planet: Entity) {
        self.planet = Some(planet);
        self.pending_immediate_gravity_update = true;
    }

    /// Unbind the point-gravity source.
    pub fn clear_planet(&mut self) {
        self.planet = None;
    }

    pub fn current_planet(&self) -> Option<Entity> {
        self.planet
    }

    pub fn enable_debugging(&mut self) {
        self.debug_enabled = true;
    }

    pub fn disable_debugging(&mut self) {
        self.debug_enabled = false;
    }

    // === Queries ===

    /// Applied gravity magnitude, including the gravity scale.
    pub fn gravity_power(&self, gravity_scale: f32) -> f32 {
        self.current_gravity.power * gravity_scale
    }

    pub fn gravity_direction(&self) -> Vec3 {
        self.current_gravity.safe_direction()
    }

    /// The part of `velocity` along the gravity axis.
    pub fn falling_velocity(&self, velocity: Vec3) -> Vec3 {
        velocity.project_onto_normalized(self.gravity_direction())
    }

    /// Speed along the gravity axis; positive when moving against gravity.
    pub fn falling_speed(&self, velocity: Vec3) -> f32 {
        -velocity.dot(self.gravity_direction())
    }

    /// The part of `velocity` perpendicular to the body's up axis.
    pub fn movement_velocity(&self, velocity: Vec3) -> Vec3 {
        velocity.reject_from_normalized(local_up(self.current_capsule_rotation))
    }

    /// Walking speed: the magnitude of [`Self::movement_velocity`].
    pub fn current_walk_speed(&self, velocity: Vec3) -> f32 {
        self.movement_velocity(velocity).length()
    }

    pub fn time_airborne(&self) -> f32 {
        self.time_airborne
    }

    pub fn is_moving_on_ground(&self) -> bool {
        !self.is_airborne
    }

    pub fn is_falling(&self) -> bool {
        self.is_airborne
    }

    /// The body's up axis.
    pub fn up(&self) -> Vec3 {
        local_up(self.current_capsule_rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceShape;
    use crate::gravity::ForceMode;
    use approx::assert_relative_eq;

    fn hit() -> CollisionData {
        CollisionData::new(50.0, Vec3::Y, Vec3::ZERO, None)
    }

    fn grounded_state() -> MovementState {
        let mut state = MovementState::new();
        state.initialize(&GravityMovementConfig::default(), Quat::IDENTITY);
        state.record_ground_probe(Some(hit()), 1.0 / 60.0);
        state
    }

    #[test]
    fn new_state_is_airborne_and_uninitialized() {
        let state = MovementState::new();
        assert!(state.is_airborne);
        assert!(!state.initialized);
        assert_eq!(state.time_airborne, 0.0);
    }

    #[test]
    fn initialize_points_gravity_down_body_axis() {
        let rotation = Quat::from_rotation_arc(Vec3::Y, Vec3::X);
        let mut state = MovementState::new();
        let config = GravityMovementConfig::default().with_trace_shape(TraceShape::Sphere, 3.0);
        state.initialize(&config, rotation);

        assert!((state.gravity_direction() - Vec3::NEG_X).length() < 1.0e-5);
        assert_eq!(state.current_capsule_rotation, rotation);
        assert!(state.current_trace_shape_scale < 1.0);
        assert_eq!(state.max_speed, 500.0);
        assert!(state.initialized);
    }

    #[test]
    fn time_airborne_accumulates_and_resets() {
        let mut state = MovementState::new();
        let dt = 0.25;

        for i in 1..=4 {
            state.record_ground_probe(None, dt);
            assert_relative_eq!(state.time_airborne, dt * i as f32);
            assert!(state.is_falling());
        }

        state.record_ground_probe(Some(hit()), dt);
        assert_eq!(state.time_airborne, 0.0);
        assert!(state.is_moving_on_ground());
        assert_eq!(state.standing_surface_hit, Some(hit()));
    }

    #[test]
    fn sprint_round_trip_restores_walk_speed() {
        let mut state = grounded_state();
        let base = state.max_speed;

        assert!(state.start_sprint(2.0));
        assert_eq!(state.max_speed, base * 2.0);
        assert!(state.is_sprinting());

        assert!(state.stop_sprint());
        assert_eq!(state.max_speed, base);
        assert!(!state.is_sprinting());
    }

    #[test]
    fn sprint_refused_while_airborne_or_sprinting() {
        let mut state = MovementState::new();
        state.initialize(&GravityMovementConfig::default(), Quat::IDENTITY);
        assert!(!state.start_sprint(2.0));

        let mut state = grounded_state();
        assert!(state.start_sprint(2.0));
        assert!(!state.start_sprint(3.0));
        assert_eq!(state.max_speed, 1000.0);
    }

    #[test]
    fn stop_sprint_without_sprint_is_noop() {
        let mut state = grounded_state();
        assert!(!state.stop_sprint());
        assert_eq!(state.max_speed, 500.0);
    }

    #[test]
    fn set_current_planet_requests_immediate_update() {
        let mut state = MovementState::new();
        let planet = Entity::from_raw(3);

        state.set_current_planet(planet);
        assert_eq!(state.current_planet(), Some(planet));
        assert!(state.pending_immediate_gravity_update);

        state.clear_planet();
        assert_eq!(state.current_planet(), None);
    }

    #[test]
    fn velocity_queries_use_gravity_frame() {
        let mut state = grounded_state();
        state.current_gravity = GravityInfo::new(980.0, Vec3::NEG_Y, ForceMode::Acceleration, true);
        let velocity = Vec3::new(3.0, -4.0, 0.0);

        assert_eq!(state.falling_velocity(velocity), Vec3::new(0.0, -4.0, 0.0));
        assert_eq!(state.falling_speed(velocity), -4.0);
        assert_eq!(state.movement_velocity(velocity), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(state.current_walk_speed(velocity), 3.0);
        assert_eq!(state.gravity_power(2.0), 1960.0);
    }

    #[test]
    fn landing_contact_stops_jump() {
        let mut state = grounded_state();
        state.is_jumping = true;
        let other = Entity::from_raw(11);
        let response = ContactResponse {
            landed_on: Some(other),
            landed_on_gravity_source: true,
            ..default()
        };

        state.apply_contact_response(&response, hit());

        assert!(!state.is_jumping);
        assert_eq!(state.standing_on, Some(other));
        assert!(state.is_standing_on_gravity_source);
        assert_eq!(state.contact_hit, Some(hit()));
    }

    #[test]
    fn debugging_toggles() {
        let mut state = MovementState::new();
        state.enable_debugging();
        assert!(state.debug_enabled);
        state.disable_debugging();
        assert!(!state.debug_enabled);
    }
}
