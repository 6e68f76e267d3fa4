//! Contact response.
//!
//! Physics backends report touches between a controlled body and the world as
//! [`ContactEvent`]s. [`respond_to_contact`] turns one contact into a
//! [`ContactResponse`] without touching the world; the contact system then
//! applies the corrected velocity and push impulse through the backend and the
//! state changes through
//! [`MovementState::apply_contact_response`](crate::state::MovementState::apply_contact_response).

use bevy::prelude::*;

use crate::config::PhysicsInteractionConfig;

/// Contacts whose normal is within this cosine of the up axis count as
/// landing on top of the other body.
pub const LANDING_NORMAL_DOT: f32 = 0.75;

/// Contacts whose normal is within this cosine of the up axis push straight
/// down on the other body.
pub const DOWNWARD_PUSH_NORMAL_DOT: f32 = 0.99;

/// A controlled body touched another entity.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ContactEvent {
    /// The controlled body.
    pub body: Entity,
    /// The entity it touched.
    pub other: Entity,
    /// Contact normal pointing out of `other` toward `body`.
    pub normal: Vec3,
    /// World-space contact point.
    pub point: Vec3,
}

/// Everything [`respond_to_contact`] needs to know about one contact.
#[derive(Debug, Clone, Copy)]
pub struct ContactInput {
    pub other: Entity,
    /// Contact normal pointing out of the other entity.
    pub normal: Vec3,
    pub point: Vec3,
    /// Body linear velocity.
    pub velocity: Vec3,
    /// Body up axis.
    pub up: Vec3,
    /// Current gravity direction.
    pub gravity_direction: Vec3,
    pub body_position: Vec3,
    pub other_position: Vec3,
    pub other_mass: f32,
    /// Whether the other entity is a dynamic body.
    pub other_simulating: bool,
    /// Whether the other entity is a gravity source.
    pub other_is_gravity_source: bool,
}

/// Changes caused by one contact.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactResponse {
    /// New body velocity, when a hard landing cancelled lateral motion.
    pub corrected_velocity: Option<Vec3>,
    /// Entity the body landed on.
    pub landed_on: Option<Entity>,
    /// Whether the entity landed on is a gravity source.
    pub landed_on_gravity_source: bool,
    /// Impulse and application point for the other body.
    pub push: Option<(Vec3, Vec3)>,
}

/// Compute the response to one contact.
pub fn respond_to_contact(
    input: &ContactInput,
    interaction: &PhysicsInteractionConfig,
) -> ContactResponse {
    let mut response = ContactResponse::default();

    let up = input.up.normalize_or_zero();
    let normal = input.normal.normalize_or_zero();
    let facing = normal.dot(up);

    if facing > LANDING_NORMAL_DOT {
        let vertical = up * input.velocity.dot(up);
        let lateral = input.velocity - vertical;
        if lateral.length() > interaction.hard_landing_speed {
            response.corrected_velocity = Some(vertical);
        }
        response.landed_on = Some(input.other);
        response.landed_on_gravity_source = input.other_is_gravity_source;
    }

    if interaction.enabled && input.other_simulating {
        let pushes_down = facing > DOWNWARD_PUSH_NORMAL_DOT;
        if !pushes_down || interaction.allow_downward_force {
            response.push = push_impulse(input, interaction).map(|impulse| (impulse, input.point));
        }
    }

    response
}

/// Impulse the body's horizontal motion transfers to the other body.
fn push_impulse(input: &ContactInput, interaction: &PhysicsInteractionConfig) -> Option<Vec3> {
    let gravity = input.gravity_direction.try_normalize()?;

    let movement = input.velocity.reject_from_normalized(gravity);
    let speed = movement.length();
    if speed <= f32::EPSILON {
        return None;
    }

    let toward_other = (input.other_position - input.body_position)
        .reject_from_normalized(gravity)
        .normalize_or_zero();
    let direction = ((toward_other + movement / speed) * 0.5).try_normalize()?;

    let mut strength = speed * interaction.force_factor;
    if interaction.scaled_to_mass {
        strength *= input.other_mass.max(0.0);
    }

    let impulse = direction * strength;
    (impulse.is_finite() && impulse != Vec3::ZERO).then_some(impulse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn input() -> ContactInput {
        ContactInput {
            other: Entity::from_raw(9),
            normal: Vec3::X,
            point: Vec3::new(0.5, 0.0, 0.0),
            velocity: Vec3::new(200.0, 0.0, 0.0),
            up: Vec3::Y,
            gravity_direction: Vec3::NEG_Y,
            body_position: Vec3::ZERO,
            other_position: Vec3::new(1.0, 0.0, 0.0),
            other_mass: 2.0,
            other_simulating: true,
            other_is_gravity_source: false,
        }
    }

    #[test]
    fn side_contact_pushes_other_body() {
        let response = respond_to_contact(&input(), &PhysicsInteractionConfig::default());
        let (impulse, point) = response.push.expect("push expected");

        // 200 speed × 0.25 factor × 2 mass along +X.
        assert_relative_eq!(impulse.x, 100.0, epsilon = 1.0e-3);
        assert_relative_eq!(impulse.y, 0.0);
        assert_eq!(point, Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(response.landed_on, None);
        assert_eq!(response.corrected_velocity, None);
    }

    #[test]
    fn push_direction_blends_offset_and_motion() {
        let mut contact = input();
        contact.other_position = Vec3::new(0.0, 0.0, 1.0);
        let response = respond_to_contact(&contact, &PhysicsInteractionConfig::default());
        let (impulse, _) = response.push.expect("push expected");

        let direction = impulse.normalize();
        assert_relative_eq!(direction.x, direction.z, epsilon = 1.0e-5);
        assert_relative_eq!(direction.y, 0.0);
    }

    #[test]
    fn unscaled_push_ignores_mass() {
        let interaction = PhysicsInteractionConfig {
            scaled_to_mass: false,
            ..default()
        };
        let (impulse, _) = respond_to_contact(&input(), &interaction).push.expect("push expected");

        assert_relative_eq!(impulse.length(), 50.0, epsilon = 1.0e-3);
    }

    #[test]
    fn downward_push_is_suppressed_by_default() {
        let mut contact = input();
        contact.normal = Vec3::Y;
        let response = respond_to_contact(&contact, &PhysicsInteractionConfig::default());

        assert_eq!(response.push, None);
        assert_eq!(response.landed_on, Some(contact.other));
    }

    #[test]
    fn downward_push_allowed_when_configured() {
        let mut contact = input();
        contact.normal = Vec3::Y;
        let interaction = PhysicsInteractionConfig {
            allow_downward_force: true,
            ..default()
        };

        assert!(respond_to_contact(&contact, &interaction).push.is_some());
    }

    #[test]
    fn static_or_disabled_contacts_do_not_push() {
        let mut contact = input();
        contact.other_simulating = false;
        assert_eq!(respond_to_contact(&contact, &default()).push, None);

        let disabled = PhysicsInteractionConfig {
            enabled: false,
            ..default()
        };
        assert_eq!(respond_to_contact(&input(), &disabled).push, None);
    }

    #[test]
    fn hard_landing_cancels_lateral_velocity() {
        let mut contact = input();
        contact.normal = Vec3::new(0.0, 1.0, 0.2);
        contact.velocity = Vec3::new(150.0, -300.0, 0.0);
        let response = respond_to_contact(&contact, &PhysicsInteractionConfig::default());

        assert_eq!(response.corrected_velocity, Some(Vec3::new(0.0, -300.0, 0.0)));
        assert_eq!(response.landed_on, Some(contact.other));
    }

    #[test]
    fn slow_landing_keeps_velocity() {
        let mut contact = input();
        contact.normal = Vec3::Y;
        contact.velocity = Vec3::new(50.0, -300.0, 0.0);

        assert_eq!(
            respond_to_contact(&contact, &PhysicsInteractionConfig::default()).corrected_velocity,
            None
        );
    }

    #[test]
    fn landing_reports_gravity_source() {
        let mut contact = input();
        contact.normal = Vec3::Y;
        contact.other_is_gravity_source = true;

        assert!(respond_to_contact(&contact, &PhysicsInteractionConfig::default()).landed_on_gravity_source);
    }
}
