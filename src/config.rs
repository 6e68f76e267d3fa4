//! Movement configuration components.
//!
//! This module defines everything a designer tunes on a gravity-driven
//! character: the gravity mode and its custom values, per-mode orientation
//! interpolation, ground tracing, jumping, walking, damping and how hard the
//! character shoves the dynamic bodies it runs into.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gravity::{GravityInfo, GravityMode};
use crate::intent::MovementIntent;
use crate::state::MovementState;

/// Largest usable trace-shape scale. A scale of 1 would make the trace shape
/// as wide as the capsule and start every cast in penetration.
pub const MAX_TRACE_SHAPE_SCALE: f32 = 1.0 - 1.0e-3;

/// How the capsule rotation approaches its target.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Per-axis Euler angle interpolation.
    #[default]
    RotatorInterp,
    /// Spherical linear interpolation.
    Slerp,
}

/// Shape used for the surface-normal trace.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceShape {
    /// A ray.
    Line,
    /// A sphere of `radius × trace_shape_scale`.
    #[default]
    Sphere,
    /// A cube with half extent `radius × trace_shape_scale`.
    Box,
}

/// What the character's up axis follows.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalOrientation {
    /// Oppose the resolved gravity direction.
    #[default]
    GravityDirection,
    /// Follow the normal of the surface underfoot.
    SurfaceNormal,
}

/// When a requested jump leaves the ground.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum JumpPolicy {
    /// The impulse is applied on request.
    #[default]
    Immediate,
    /// The impulse is applied `wind_up` seconds after the request.
    Delayed {
        /// Wind-up time in seconds.
        wind_up: f32,
    },
}

/// Orientation behaviour for one gravity mode.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationInfo {
    /// Snap to the target rotation instead of interpolating.
    pub instant: bool,
    /// Interpolation speed (1/s). Must be positive unless `instant` is set.
    pub interp_speed: f32,
}

impl Default for OrientationInfo {
    fn default() -> Self {
        Self {
            instant: false,
            interp_speed: 5.0,
        }
    }
}

impl OrientationInfo {
    /// Snap instantly.
    pub fn instant() -> Self {
        Self {
            instant: true,
            ..default()
        }
    }

    /// Interpolate at `speed`.
    pub fn interpolated(speed: f32) -> Self {
        Self {
            instant: false,
            interp_speed: speed,
        }
    }
}

/// Orientation behaviour per gravity mode.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationSettings {
    pub default_gravity: OrientationInfo,
    pub point_gravity: OrientationInfo,
    pub custom_gravity: OrientationInfo,
    pub global_custom_gravity: OrientationInfo,
    pub surface_based_gravity: OrientationInfo,
    /// Interpolation used when a mode is not instant.
    pub interpolation_mode: InterpolationMode,
}

impl OrientationSettings {
    /// The orientation behaviour for `mode`.
    pub fn for_mode(&self, mode: GravityMode) -> OrientationInfo {
        match mode {
            GravityMode::Default => self.default_gravity,
            GravityMode::Point => self.point_gravity,
            GravityMode::Custom => self.custom_gravity,
            GravityMode::GlobalCustom => self.global_custom_gravity,
            GravityMode::SurfaceBased => self.surface_based_gravity,
        }
    }

    fn all_mut(&mut self) -> [(GravityMode, &mut OrientationInfo); 5] {
        [
            (GravityMode::Default, &mut self.default_gravity),
            (GravityMode::Point, &mut self.point_gravity),
            (GravityMode::Custom, &mut self.custom_gravity),
            (GravityMode::GlobalCustom, &mut self.global_custom_gravity),
            (GravityMode::SurfaceBased, &mut self.surface_based_gravity),
        ]
    }
}

/// Push-back applied to dynamic bodies the character runs into.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsInteractionConfig {
    /// Whether contacts push other bodies at all.
    pub enabled: bool,
    /// Impulse per unit of horizontal speed.
    pub force_factor: f32,
    /// Multiply the impulse by the other body's mass.
    pub scaled_to_mass: bool,
    /// Push bodies the character lands squarely on top of.
    pub allow_downward_force: bool,
    /// Lateral speed above which a near-vertical contact cancels lateral velocity.
    pub hard_landing_speed: f32,
}

impl Default for PhysicsInteractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force_factor: 0.25,
            scaled_to_mass: true,
            allow_downward_force: false,
            hard_landing_speed: 100.0,
        }
    }
}

/// Linear damping applied by ground state.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingConfig {
    pub grounded: f32,
    pub airborne: f32,
}

impl Default for DampingConfig {
    fn default() -> Self {
        Self {
            grounded: 0.5,
            airborne: 0.01,
        }
    }
}

/// Rejected configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    /// A numeric field is NaN or infinite.
    #[error("{field} must be finite")]
    NonFinite { field: &'static str },
    /// A numeric field that must be non-negative is negative.
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f32 },
    /// A numeric field lies outside its allowed range.
    #[error("{field} must lie in [{min}, {max}] (got {value})")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// An interpolated orientation has a non-positive speed.
    #[error("orientation for {mode:?} gravity interpolates at non-positive speed {speed}")]
    InterpolationSpeed { mode: GravityMode, speed: f32 },
}

/// Configuration for a gravity-driven character.
///
/// Adding this component also adds [`MovementState`] and [`MovementIntent`].
#[derive(Component, Reflect, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[require(MovementState, MovementIntent)]
#[serde(default)]
pub struct GravityMovementConfig {
    // === Gravity ===
    /// Multiplier on every applied gravity force. Zero disables gravity and a
    /// negative scale reverses it.
    pub gravity_scale: f32,
    /// Which gravity source the character follows.
    pub gravity_mode: GravityMode,
    /// Gravity used in [`GravityMode::Custom`].
    pub custom_gravity: GravityInfo,
    /// Power and force mode used in [`GravityMode::SurfaceBased`]. The
    /// direction is replaced by the traced surface normal.
    pub surface_based_gravity: GravityInfo,
    /// Seconds airborne before gravity is re-resolved.
    pub gravity_switch_delay: f32,
    /// Zero velocity once per airborne episode when the switch delay elapses.
    pub reset_velocity_on_gravity_switch: bool,

    // === Orientation ===
    pub orientation: OrientationSettings,
    /// Up-axis policy while grounded.
    pub standing_orientation: VerticalOrientation,
    /// Up-axis policy while airborne.
    pub falling_orientation: VerticalOrientation,

    // === Ground Tracing ===
    /// Extra distance below the capsule still counted as ground.
    pub ground_tolerance: f32,
    pub trace_shape: TraceShape,
    /// Trace shape size relative to the capsule radius, in `[0, 1)`.
    pub trace_shape_scale: f32,
    /// Use the last physical contact instead of a second trace.
    pub use_capsule_hit: bool,

    // === Jumping ===
    pub can_jump: bool,
    /// Target apex height above the standing position.
    pub jump_height: f32,
    pub jump_policy: JumpPolicy,

    // === Walking ===
    /// Maximum walking speed (units/second).
    pub max_speed: f32,
    /// Walking acceleration (units/second²).
    pub acceleration: f32,
    /// Max speed multiplier while sprinting.
    pub sprint_multiplier: f32,
    /// Fraction of `acceleration` available while airborne (0.0-1.0).
    pub air_control: f32,

    // === Physics ===
    pub damping: DampingConfig,
    pub physics_interaction: PhysicsInteractionConfig,

    // === Debug ===
    /// Log every trace result for this character.
    pub debug_traces: bool,
}

impl Default for GravityMovementConfig {
    fn default() -> Self {
        Self {
            // Gravity
            gravity_scale: 1.0,
            gravity_mode: GravityMode::Default,
            custom_gravity: GravityInfo::default(),
            surface_based_gravity: GravityInfo::default(),
            gravity_switch_delay: 0.5,
            reset_velocity_on_gravity_switch: false,

            // Orientation
            orientation: OrientationSettings::default(),
            standing_orientation: VerticalOrientation::GravityDirection,
            falling_orientation: VerticalOrientation::GravityDirection,

            // Ground tracing
            ground_tolerance: 20.0,
            trace_shape: TraceShape::Sphere,
            trace_shape_scale: 0.75,
            use_capsule_hit: false,

            // Jumping
            can_jump: true,
            jump_height: 300.0,
            jump_policy: JumpPolicy::Immediate,

            // Walking
            max_speed: 500.0,
            acceleration: 2048.0,
            sprint_multiplier: 2.0,
            air_control: 0.5,

            // Physics
            damping: DampingConfig::default(),
            physics_interaction: PhysicsInteractionConfig::default(),

            debug_traces: false,
        }
    }
}

impl GravityMovementConfig {
    /// A character that walks around planets: point gravity, surface-normal
    /// standing orientation and a quick reorientation when switching planets.
    pub fn planet_walker() -> Self {
        Self {
            gravity_mode: GravityMode::Point,
            standing_orientation: VerticalOrientation::SurfaceNormal,
            orientation: OrientationSettings {
                point_gravity: OrientationInfo::interpolated(8.0),
                surface_based_gravity: OrientationInfo::interpolated(10.0),
                interpolation_mode: InterpolationMode::Slerp,
                ..default()
            },
            ..default()
        }
    }

    /// A character whose up axis snaps to gravity immediately.
    pub fn snappy() -> Self {
        let mut config = Self::default();
        for (_, info) in config.orientation.all_mut() {
            *info = OrientationInfo::instant();
        }
        config.gravity_switch_delay = 0.0;
        config
    }

    /// The vertical orientation policy for the given ground state.
    #[inline]
    pub fn vertical_orientation(&self, is_airborne: bool) -> VerticalOrientation {
        if is_airborne {
            self.falling_orientation
        } else {
            self.standing_orientation
        }
    }

    /// Builder: set gravity mode.
    pub fn with_gravity_mode(mut self, mode: GravityMode) -> Self {
        self.gravity_mode = mode;
        self
    }

    /// Builder: set gravity scale.
    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Builder: set custom gravity (also switches to [`GravityMode::Custom`]).
    pub fn with_custom_gravity(mut self, gravity: GravityInfo) -> Self {
        self.custom_gravity = gravity;
        self.gravity_mode = GravityMode::Custom;
        self
    }

    /// Builder: set surface-based gravity power and force mode.
    pub fn with_surface_based_gravity(mut self, gravity: GravityInfo) -> Self {
        self.surface_based_gravity = gravity;
        self
    }

    /// Builder: set the gravity switch delay.
    pub fn with_gravity_switch_delay(mut self, delay: f32) -> Self {
        self.gravity_switch_delay = delay;
        self
    }

    /// Builder: zero velocity when gravity is re-resolved mid-air.
    pub fn with_reset_velocity_on_gravity_switch(mut self, reset: bool) -> Self {
        self.reset_velocity_on_gravity_switch = reset;
        self
    }

    /// Builder: set orientation settings.
    pub fn with_orientation(mut self, orientation: OrientationSettings) -> Self {
        self.orientation = orientation;
        self
    }

    /// Builder: set standing and falling vertical orientation.
    pub fn with_vertical_orientation(
        mut self,
        standing: VerticalOrientation,
        falling: VerticalOrientation,
    ) -> Self {
        self.standing_orientation = standing;
        self.falling_orientation = falling;
        self
    }

    /// Builder: set ground tolerance.
    pub fn with_ground_tolerance(mut self, tolerance: f32) -> Self {
        self.ground_tolerance = tolerance;
        self
    }

    /// Builder: set surface trace shape and scale.
    pub fn with_trace_shape(mut self, shape: TraceShape, scale: f32) -> Self {
        self.trace_shape = shape;
        self.trace_shape_scale = scale;
        self
    }

    /// Builder: reuse the last contact hit as the surface trace.
    pub fn with_capsule_hit(mut self, enabled: bool) -> Self {
        self.use_capsule_hit = enabled;
        self
    }

    /// Builder: set jump height.
    pub fn with_jump_height(mut self, height: f32) -> Self {
        self.jump_height = height;
        self
    }

    /// Builder: enable or disable jumping.
    pub fn with_can_jump(mut self, can_jump: bool) -> Self {
        self.can_jump = can_jump;
        self
    }

    /// Builder: set jump policy.
    pub fn with_jump_policy(mut self, policy: JumpPolicy) -> Self {
        self.jump_policy = policy;
        self
    }

    /// Builder: set movement parameters.
    pub fn with_movement(mut self, max_speed: f32, acceleration: f32) -> Self {
        self.max_speed = max_speed;
        self.acceleration = acceleration;
        self
    }

    /// Builder: set sprint multiplier.
    pub fn with_sprint_multiplier(mut self, multiplier: f32) -> Self {
        self.sprint_multiplier = multiplier;
        self
    }

    /// Builder: set air control.
    pub fn with_air_control(mut self, air_control: f32) -> Self {
        self.air_control = air_control;
        self
    }

    /// Builder: set damping values.
    pub fn with_damping(mut self, grounded: f32, airborne: f32) -> Self {
        self.damping = DampingConfig { grounded, airborne };
        self
    }

    /// Builder: set physics interaction.
    pub fn with_physics_interaction(mut self, interaction: PhysicsInteractionConfig) -> Self {
        self.physics_interaction = interaction;
        self
    }

    /// Builder: log trace results.
    pub fn with_debug_traces(mut self, enabled: bool) -> Self {
        self.debug_traces = enabled;
        self
    }

    /// Check every value, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Negative scales reverse gravity and are allowed.
        if !self.gravity_scale.is_finite() {
            return Err(ConfigError::NonFinite { field: "gravity_scale" });
        }

        let non_negative = [
            ("gravity_switch_delay", self.gravity_switch_delay),
            ("ground_tolerance", self.ground_tolerance),
            ("jump_height", self.jump_height),
            ("max_speed", self.max_speed),
            ("acceleration", self.acceleration),
            ("sprint_multiplier", self.sprint_multiplier),
            ("damping.grounded", self.damping.grounded),
            ("damping.airborne", self.damping.airborne),
            ("physics_interaction.force_factor", self.physics_interaction.force_factor),
            (
                "physics_interaction.hard_landing_speed",
                self.physics_interaction.hard_landing_speed,
            ),
            ("custom_gravity.power", self.custom_gravity.power),
            ("surface_based_gravity.power", self.surface_based_gravity.power),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }

        let ranged = [
            ("trace_shape_scale", self.trace_shape_scale, 0.0, MAX_TRACE_SHAPE_SCALE),
            ("air_control", self.air_control, 0.0, 1.0),
        ];
        for (field, value, min, max) in ranged {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
            if !(min..=max).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        if let JumpPolicy::Delayed { wind_up } = self.jump_policy {
            if !wind_up.is_finite() {
                return Err(ConfigError::NonFinite { field: "jump_policy.wind_up" });
            }
            if wind_up < 0.0 {
                return Err(ConfigError::Negative {
                    field: "jump_policy.wind_up",
                    value: wind_up,
                });
            }
        }

        let mut orientation = self.orientation;
        for (mode, info) in orientation.all_mut() {
            if !info.instant && !(info.interp_speed > 0.0 && info.interp_speed.is_finite()) {
                return Err(ConfigError::InterpolationSpeed {
                    mode,
                    speed: info.interp_speed,
                });
            }
        }

        Ok(())
    }

    /// A copy with every invalid value replaced by a usable one.
    ///
    /// Non-finite values fall back to the default, negative values other than
    /// the gravity scale clamp to zero, ranged values clamp into range, and interpolated orientations with
    /// a non-positive speed become instant.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut config = self.clone();

        let non_negative = |value: f32, fallback: f32| {
            if value.is_finite() {
                value.max(0.0)
            } else {
                fallback
            }
        };

        if !config.gravity_scale.is_finite() {
            config.gravity_scale = defaults.gravity_scale;
        }
        config.gravity_switch_delay =
            non_negative(config.gravity_switch_delay, defaults.gravity_switch_delay);
        config.ground_tolerance = non_negative(config.ground_tolerance, defaults.ground_tolerance);
        config.jump_height = non_negative(config.jump_height, defaults.jump_height);
        config.max_speed = non_negative(config.max_speed, defaults.max_speed);
        config.acceleration = non_negative(config.acceleration, defaults.acceleration);
        config.sprint_multiplier =
            non_negative(config.sprint_multiplier, defaults.sprint_multiplier);
        config.damping.grounded = non_negative(config.damping.grounded, defaults.damping.grounded);
        config.damping.airborne = non_negative(config.damping.airborne, defaults.damping.airborne);
        config.physics_interaction.force_factor = non_negative(
            config.physics_interaction.force_factor,
            defaults.physics_interaction.force_factor,
        );
        config.physics_interaction.hard_landing_speed = non_negative(
            config.physics_interaction.hard_landing_speed,
            defaults.physics_interaction.hard_landing_speed,
        );
        config.custom_gravity = config.custom_gravity.sanitized();
        config.surface_based_gravity = config.surface_based_gravity.sanitized();

        config.trace_shape_scale = if config.trace_shape_scale.is_finite() {
            config.trace_shape_scale.clamp(0.0, MAX_TRACE_SHAPE_SCALE)
        } else {
            defaults.trace_shape_scale
        };
        config.air_control = if config.air_control.is_finite() {
            config.air_control.clamp(0.0, 1.0)
        } else {
            defaults.air_control
        };

        if let JumpPolicy::Delayed { wind_up } = config.jump_policy {
            config.jump_policy = JumpPolicy::Delayed {
                wind_up: non_negative(wind_up, 0.0),
            };
        }

        for (_, info) in config.orientation.all_mut() {
            if !info.instant && !(info.interp_speed > 0.0 && info.interp_speed.is_finite()) {
                info.instant = true;
            }
        }

        config
    }
}
