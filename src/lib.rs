//! # `gravity_movement`
//!
//! Custom-gravity capsule character movement with a physics backend abstraction.
//!
//! This crate drives a capsule-shaped rigid body whose gravity can:
//! - follow the physics engine's own gravity
//! - point along a fixed custom vector, or a world-wide [`GlobalGravity`](gravity::GlobalGravity)
//! - pull toward a planet ([`GravitySource`](gravity::GravitySource))
//! - oppose the normal of the surface the character stands on
//!
//! The body's up axis is continuously reoriented against the active gravity.
//! Ground detection, jumping, sprinting, walking and pushing dynamic bodies
//! all work in that reoriented frame.
//!
//! ## Architecture
//!
//! Each fixed tick runs the following system sets in order:
//! 1. [`GravityMovementSet::Prepare`]: invalid configuration is sanitised
//! 2. [`GravityMovementSet::Contacts`]: backend contact events are answered
//! 3. [`GravityMovementSet::Intents`]: jump and sprint input edges become commands
//! 4. [`GravityMovementSet::Tick`]: ground probe, gravity resolution,
//!    reorientation, gravity force and delayed jumps
//! 5. [`GravityMovementSet::Movement`]: walking toward the movement intent
//! 6. [`GravityMovementSet::Sync`]: [`Grounded`](state::Grounded) /
//!    [`Airborne`](state::Airborne) markers
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use gravity_movement::prelude::*;
//!
//! // Configuration for a character that walks around planets
//! let config = GravityMovementConfig::planet_walker().with_jump_height(200.0);
//! assert_eq!(config.validate(), Ok(()));
//!
//! // Spawned together with a physics body, the config pulls in
//! // `MovementState` and `MovementIntent` automatically.
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod collision;
pub mod config;
pub mod contact;
pub mod detection;
pub mod forces;
pub mod gravity;
pub mod intent;
pub mod orientation;
pub mod state;
pub mod systems;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{CapsuleDimensions, CastShape, GravityPhysicsBackend, ShapeCastRequest};
    pub use crate::collision::CollisionData;
    pub use crate::config::{
        ConfigError, DampingConfig, GravityMovementConfig, InterpolationMode, JumpPolicy,
        OrientationInfo, OrientationSettings, PhysicsInteractionConfig, TraceShape,
        VerticalOrientation,
    };
    pub use crate::contact::ContactEvent;
    pub use crate::gravity::{
        ForceMode, GlobalGravity, GravityFalloff, GravityInfo, GravityMode, GravitySource,
    };
    pub use crate::intent::MovementIntent;
    pub use crate::state::{Airborne, Grounded, MovementState};
    pub use crate::systems::{request_jump, stop_movement_immediately};
    pub use crate::{GravityMovementPlugin, GravityMovementSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{GravityCharacterBundle, Rapier3dBackend};
}

/// System sets of the gravity movement pipeline, chained in this order in
/// `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GravityMovementSet {
    Prepare,
    Contacts,
    Intents,
    Tick,
    Movement,
    Sync,
}

/// Main plugin for gravity movement.
///
/// This plugin is generic over a physics backend `B` which provides the actual
/// physics operations (shape casts, force application, etc.).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use gravity_movement::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(GravityMovementPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct GravityMovementPlugin<B: backend::GravityPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::GravityPhysicsBackend> Default for GravityMovementPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::GravityPhysicsBackend> Plugin for GravityMovementPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::GravityMovementConfig>();
        app.register_type::<config::OrientationSettings>();
        app.register_type::<config::OrientationInfo>();
        app.register_type::<config::PhysicsInteractionConfig>();
        app.register_type::<config::DampingConfig>();
        app.register_type::<gravity::GravityInfo>();
        app.register_type::<gravity::GravitySource>();
        app.register_type::<gravity::GlobalGravity>();
        app.register_type::<intent::MovementIntent>();
        app.register_type::<state::MovementState>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();

        app.init_resource::<gravity::GlobalGravity>();
        app.add_event::<contact::ContactEvent>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                GravityMovementSet::Prepare,
                GravityMovementSet::Contacts,
                GravityMovementSet::Intents,
                GravityMovementSet::Tick,
                GravityMovementSet::Movement,
                GravityMovementSet::Sync,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                systems::sanitize_configs.in_set(GravityMovementSet::Prepare),
                systems::handle_contact_events::<B>.in_set(GravityMovementSet::Contacts),
                systems::process_movement_intents::<B>.in_set(GravityMovementSet::Intents),
                systems::update_gravity_movement::<B>.in_set(GravityMovementSet::Tick),
                systems::apply_walk_movement::<B>.in_set(GravityMovementSet::Movement),
                systems::sync_state_markers.in_set(GravityMovementSet::Sync),
            ),
        );
    }
}
