//! Gravity sources and the gravity resolver.
//!
//! A body's gravity comes from one of five [`GravityMode`]s. The resolver is a
//! single `match` over the mode that turns the available sources into a
//! sanitized [`GravityInfo`], or reports that no gravity applies this tick.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Gravity direction used whenever a configured or computed direction is
/// unusable (zero length, NaN or infinite).
pub const ENGINE_DOWN: Vec3 = Vec3::NEG_Y;

/// Default gravity magnitude (units/s²).
pub const DEFAULT_GRAVITY_POWER: f32 = 980.0;

/// How a gravity vector is fed to the physics backend.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceMode {
    /// Mass-independent: the vector is an acceleration (or velocity change).
    #[default]
    Acceleration,
    /// Mass-dependent: the vector is a force (or momentum change).
    Force,
}

/// Selects how a body's gravity is resolved each tick.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GravityMode {
    /// The physics backend's own ambient gravity.
    #[default]
    Default,
    /// A statically configured gravity vector.
    Custom,
    /// The world-wide [`GlobalGravity`] value.
    GlobalCustom,
    /// Toward a bound [`GravitySource`] (planet).
    Point,
    /// Against the normal of the surface the body stands on.
    SurfaceBased,
}

/// A gravity magnitude, direction and application mode.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityInfo {
    /// Gravity magnitude, before the body's gravity scale.
    pub power: f32,
    /// Gravity direction. Normalized before use.
    pub direction: Vec3,
    /// Whether the gravity is applied as an acceleration or a force.
    pub force_mode: ForceMode,
    /// Whether the backend may sub-step the force.
    pub use_substepping: bool,
}

impl Default for GravityInfo {
    fn default() -> Self {
        Self {
            power: DEFAULT_GRAVITY_POWER,
            direction: ENGINE_DOWN,
            force_mode: ForceMode::Acceleration,
            use_substepping: true,
        }
    }
}

impl GravityInfo {
    /// Create a gravity value.
    pub fn new(power: f32, direction: Vec3, force_mode: ForceMode, use_substepping: bool) -> Self {
        Self {
            power,
            direction,
            force_mode,
            use_substepping,
        }
    }

    /// Builder: set the direction.
    pub fn with_direction(mut self, direction: Vec3) -> Self {
        self.direction = direction;
        self
    }

    /// Builder: set the power.
    pub fn with_power(mut self, power: f32) -> Self {
        self.power = power;
        self
    }

    /// The normalized direction, or [`ENGINE_DOWN`] if the stored direction
    /// cannot be normalized.
    pub fn safe_direction(&self) -> Vec3 {
        safe_normalize(self.direction, ENGINE_DOWN)
    }

    /// A copy with a unit-length, finite direction and a finite, non-negative
    /// power.
    pub fn sanitized(self) -> Self {
        Self {
            power: if self.power.is_finite() { self.power.max(0.0) } else { 0.0 },
            direction: self.safe_direction(),
            ..self
        }
    }

    /// Whether the gravity is applied as an acceleration.
    pub fn is_acceleration(&self) -> bool {
        self.force_mode == ForceMode::Acceleration
    }
}

/// Normalize `v`, returning `fallback` for zero-length or non-finite input.
pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize().unwrap_or(fallback)
}

/// World-wide gravity shared by every body in [`GravityMode::GlobalCustom`].
///
/// Writes always replace the whole value, so a reader sees either the old or
/// the new gravity, never a mix of the two.
#[derive(Resource, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Resource)]
pub struct GlobalGravity(GravityInfo);

impl GlobalGravity {
    /// Create the resource with an initial value.
    pub fn new(info: GravityInfo) -> Self {
        Self(info)
    }

    /// The current global gravity.
    pub fn get(&self) -> GravityInfo {
        self.0
    }

    /// Replace the global gravity.
    pub fn set(&mut self, info: GravityInfo) {
        self.0 = info;
    }

    /// Replace the global gravity with a copy using `power`, clamped to zero.
    pub fn set_power(&mut self, power: f32) {
        self.set(GravityInfo {
            power: power.max(0.0),
            ..self.0
        });
    }

    /// Replace the global gravity with a copy using `direction`.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.set(GravityInfo { direction, ..self.0 });
    }

    /// Replace the global gravity with a copy using `force_mode`.
    pub fn set_force_mode(&mut self, force_mode: ForceMode) {
        self.set(GravityInfo { force_mode, ..self.0 });
    }
}

/// How a [`GravitySource`]'s pull changes with distance.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum GravityFalloff {
    /// Same power at any distance.
    #[default]
    Constant,
    /// Power scaled by `reference_radius / distance`.
    Linear,
    /// Power scaled by `(reference_radius / distance)²`.
    InverseSquare,
}

/// A body that attracts toward its centre, e.g. a planet.
///
/// Bind a character to one with [`crate::state::MovementState::set_current_planet`]
/// and use [`GravityMode::Point`].
#[derive(Component, Reflect, Debug, Clone, Copy, Serialize, Deserialize)]
#[reflect(Component)]
pub struct GravitySource {
    /// Gravity magnitude at `reference_radius` from the centre.
    pub power: f32,
    /// Force mode of the produced gravity.
    pub force_mode: ForceMode,
    /// Whether the produced gravity may be sub-stepped.
    pub use_substepping: bool,
    /// Distance attenuation.
    pub falloff: GravityFalloff,
    /// Distance at which `power` applies unattenuated (usually the surface).
    pub reference_radius: f32,
}

impl Default for GravitySource {
    fn default() -> Self {
        Self {
            power: DEFAULT_GRAVITY_POWER,
            force_mode: ForceMode::Acceleration,
            use_substepping: true,
            falloff: GravityFalloff::Constant,
            reference_radius: 1.0,
        }
    }
}

impl GravitySource {
    /// A constant-power source.
    pub fn new(power: f32) -> Self {
        Self { power, ..default() }
    }

    /// Builder: set the falloff and the radius at which `power` is exact.
    pub fn with_falloff(mut self, falloff: GravityFalloff, reference_radius: f32) -> Self {
        self.falloff = falloff;
        self.reference_radius = reference_radius;
        self
    }

    /// Gravity felt at `position` from a source centred at `center`.
    pub fn gravity_at(&self, center: Vec3, position: Vec3) -> GravityInfo {
        let offset = center - position;
        let distance = offset.length();
        let ratio = if distance > f32::EPSILON {
            (self.reference_radius / distance).max(0.0)
        } else {
            1.0
        };
        let power = match self.falloff {
            GravityFalloff::Constant => self.power,
            GravityFalloff::Linear => self.power * ratio,
            GravityFalloff::InverseSquare => self.power * ratio * ratio,
        };

        GravityInfo::new(
            power,
            safe_normalize(offset, ENGINE_DOWN),
            self.force_mode,
            self.use_substepping,
        )
    }
}

/// Everything the resolver may draw gravity from for one body.
#[derive(Debug, Clone, Copy)]
pub struct GravitySources {
    /// The backend's ambient gravity vector.
    pub ambient: Vec3,
    /// Statically configured custom gravity.
    pub custom: GravityInfo,
    /// Current world-wide gravity.
    pub global: GravityInfo,
    /// Bound point source and its centre, if one exists.
    pub point: Option<(GravitySource, Vec3)>,
    /// Configured surface-based gravity.
    pub surface: GravityInfo,
    /// Normal of the surface the body currently stands on.
    pub surface_normal: Option<Vec3>,
    /// Body position.
    pub position: Vec3,
}

/// Output of [`resolve_gravity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GravityResolution {
    /// Gravity to orient to and apply.
    Resolved(GravityInfo),
    /// No gravity applies this tick; skip orientation and force.
    NoGravity,
}

/// Resolve the gravity for `mode` from `sources`.
///
/// Every resolved direction is unit length and finite. [`GravityMode::Point`]
/// with no bound source yields [`GravityResolution::NoGravity`]; it does not
/// fall back to the default gravity.
pub fn resolve_gravity(mode: GravityMode, sources: &GravitySources) -> GravityResolution {
    let info = match mode {
        GravityMode::Default => {
            let power = sources.ambient.length();
            GravityInfo::new(
                if power.is_finite() { power } else { 0.0 },
                safe_normalize(sources.ambient, ENGINE_DOWN),
                ForceMode::Acceleration,
                true,
            )
        }
        GravityMode::Custom => sources.custom,
        GravityMode::GlobalCustom => sources.global,
        GravityMode::Point => match sources.point {
            Some((source, center)) => source.gravity_at(center, sources.position),
            None => return GravityResolution::NoGravity,
        },
        GravityMode::SurfaceBased => match sources.surface_normal {
            Some(normal) => sources.surface.with_direction(-normal),
            None => sources.surface,
        },
    };

    GravityResolution::Resolved(info.sanitized())
}
