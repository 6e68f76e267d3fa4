//! Movement intent components.
//!
//! Intents represent the desired movement from player input or AI. The
//! movement systems read these intents and turn them into velocity changes,
//! jumps and sprint toggles relative to the character's current gravity frame.

use bevy::prelude::*;

/// Desired movement for a gravity-driven character.
///
/// Directions are in world space; the walking system projects them onto the
/// plane perpendicular to the character's up axis, so "forward" stays on the
/// ground whichever way gravity points.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use gravity_movement::prelude::*;
///
/// let mut intent = MovementIntent::new();
/// intent.set_direction(Vec3::new(2.0, 0.0, 0.0));
/// assert!(intent.is_walking());
/// assert_eq!(intent.direction, Vec3::X);
///
/// intent.clear();
/// assert!(!intent.is_walking());
/// ```
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct MovementIntent {
    /// Desired walking direction in world space, length at most 1.
    pub direction: Vec3,
    /// Speed multiplier for walking (0.0 to 1.0).
    pub walk_speed: f32,
    /// Whether the jump action is currently held.
    ///
    /// A jump is requested on the frame this changes from `false` to `true`.
    pub jump_pressed: bool,
    /// Whether the sprint action is currently held.
    ///
    /// Sprinting starts on the rising edge and stops on the falling edge.
    pub sprint_pressed: bool,
    /// Previous tick's `jump_pressed` state (for edge detection).
    pub(crate) jump_pressed_prev: bool,
    /// Previous tick's `sprint_pressed` state (for edge detection).
    pub(crate) sprint_pressed_prev: bool,
}

impl Default for MovementIntent {
    fn default() -> Self {
        Self {
            direction: Vec3::ZERO,
            walk_speed: 1.0,
            jump_pressed: false,
            sprint_pressed: false,
            jump_pressed_prev: false,
            sprint_pressed_prev: false,
        }
    }
}

impl MovementIntent {
    /// Create a new empty movement intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the walking direction. Longer vectors are clamped to length 1;
    /// non-finite input clears the direction.
    pub fn set_direction(&mut self, direction: Vec3) {
        self.direction = if direction.is_finite() {
            direction.clamp_length_max(1.0)
        } else {
            Vec3::ZERO
        };
    }

    /// Set the walk speed multiplier (0.0 to 1.0).
    pub fn set_walk_speed(&mut self, multiplier: f32) {
        self.walk_speed = multiplier.clamp(0.0, 1.0);
    }

    /// Clear the walking direction.
    pub fn clear(&mut self) {
        self.direction = Vec3::ZERO;
    }

    /// Check if there's meaningful walking input.
    pub fn is_walking(&self) -> bool {
        self.direction.length_squared() > 1.0e-6
    }

    /// Direction scaled by the walk speed multiplier.
    pub fn effective_direction(&self) -> Vec3 {
        self.direction * self.walk_speed
    }

    /// Set the jump state.
    ///
    /// Call this every frame with the current input state. A jump is requested
    /// on the rising edge only, so holding the button does not bunny-hop.
    ///
    /// # Example
    /// ```rust,ignore
    /// intent.set_jump_pressed(keyboard.pressed(KeyCode::Space));
    /// ```
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    /// Set the sprint state.
    pub fn set_sprint_pressed(&mut self, pressed: bool) {
        self.sprint_pressed = pressed;
    }

    /// Consume a jump rising edge, if one happened since the last call.
    pub(crate) fn take_jump_edge(&mut self) -> bool {
        let edge = self.jump_pressed && !self.jump_pressed_prev;
        self.jump_pressed_prev = self.jump_pressed;
        edge
    }

    /// Consume a sprint state change: `Some(true)` on press, `Some(false)` on
    /// release.
    pub(crate) fn take_sprint_edge(&mut self) -> Option<bool> {
        let changed = self.sprint_pressed != self.sprint_pressed_prev;
        self.sprint_pressed_prev = self.sprint_pressed;
        changed.then_some(self.sprint_pressed)
    }
}

/// A jump waiting for its wind-up to finish.
///
/// Stored in [`MovementState`](crate::state::MovementState); fires once the
/// body's simulation clock reaches `fire_at`.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct PendingJump {
    /// Body clock time at which the impulse is applied.
    pub fire_at: f32,
}

impl PendingJump {
    /// A jump requested at `now` that fires after `wind_up` seconds.
    pub fn new(now: f32, wind_up: f32) -> Self {
        Self {
            fire_at: now + wind_up.max(0.0),
        }
    }

    /// Whether the wind-up has elapsed at `now`.
    pub fn is_due(&self, now: f32) -> bool {
        now >= self.fire_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== MovementIntent Tests ====================

    #[test]
    fn movement_intent_new() {
        let intent = MovementIntent::new();
        assert_eq!(intent.direction, Vec3::ZERO);
        assert_eq!(intent.walk_speed, 1.0);
        assert!(!intent.jump_pressed);
        assert!(!intent.sprint_pressed);
    }

    #[test]
    fn movement_intent_set_direction_clamps_length() {
        let mut intent = MovementIntent::new();
        intent.set_direction(Vec3::new(0.0, 0.0, 0.5));
        assert_eq!(intent.direction, Vec3::new(0.0, 0.0, 0.5));

        intent.set_direction(Vec3::new(0.0, 0.0, -5.0));
        assert!((intent.direction - Vec3::NEG_Z).length() < 1.0e-6);

        intent.set_direction(Vec3::splat(f32::NAN));
        assert_eq!(intent.direction, Vec3::ZERO);
    }

    #[test]
    fn movement_intent_speed_multiplier() {
        let mut intent = MovementIntent::new();
        intent.set_direction(Vec3::X);
        intent.set_walk_speed(0.5);
        assert_eq!(intent.effective_direction(), Vec3::new(0.5, 0.0, 0.0));

        intent.set_walk_speed(2.0);
        assert_eq!(intent.walk_speed, 1.0);
    }

    #[test]
    fn movement_intent_is_walking() {
        let mut intent = MovementIntent::new();
        assert!(!intent.is_walking());

        intent.set_direction(Vec3::Z);
        assert!(intent.is_walking());

        intent.set_direction(Vec3::splat(0.0001));
        assert!(!intent.is_walking());
    }

    #[test]
    fn jump_edge_fires_once_per_press() {
        let mut intent = MovementIntent::new();
        intent.set_jump_pressed(true);

        assert!(intent.take_jump_edge());
        assert!(!intent.take_jump_edge());

        intent.set_jump_pressed(false);
        assert!(!intent.take_jump_edge());

        intent.set_jump_pressed(true);
        assert!(intent.take_jump_edge());
    }

    #[test]
    fn sprint_edge_reports_press_and_release() {
        let mut intent = MovementIntent::new();
        assert_eq!(intent.take_sprint_edge(), None);

        intent.set_sprint_pressed(true);
        assert_eq!(intent.take_sprint_edge(), Some(true));
        assert_eq!(intent.take_sprint_edge(), None);

        intent.set_sprint_pressed(false);
        assert_eq!(intent.take_sprint_edge(), Some(false));
    }

    // ==================== PendingJump Tests ====================

    #[test]
    fn pending_jump_fires_after_wind_up() {
        let jump = PendingJump::new(2.0, 0.5);

        assert!(!jump.is_due(2.25));
        assert!(jump.is_due(2.5));
        assert!(jump.is_due(3.0));
    }

    #[test]
    fn pending_jump_negative_wind_up_is_immediate() {
        let jump = PendingJump::new(1.0, -3.0);
        assert!(jump.is_due(1.0));
    }
}
