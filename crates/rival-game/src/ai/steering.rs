//! Steering behaviors: pure functions from spatial relationships to a force.
//!
//! Every force returned here is already limited to the agent's `max_force`.

use glam::Vec3;
use rand::Rng;

/// Kinematic state consumed by the steering functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringAgent {
    pub position: Vec3,
    pub velocity: Vec3,
    pub max_speed: f32,
    pub max_force: f32,
}

/// A circular obstacle to steer around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringObstacle {
    pub position: Vec3,
    pub radius: f32,
}

/// Persistent state for [`wander`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WanderState {
    /// Current angle on the wander circle, radians.
    pub angle: f32,
    /// Distance of the circle center ahead of the agent.
    pub circle_distance: f32,
    pub circle_radius: f32,
    /// Maximum drift of `angle` per call, radians.
    pub angle_change: f32,
}

impl Default for WanderState {
    fn default() -> Self {
        Self {
            angle: 0.0,
            circle_distance: 2.0,
            circle_radius: 1.0,
            angle_change: 0.5,
        }
    }
}

/// Rescale `force` to exactly `max_force` when it is longer.
pub fn limit(force: Vec3, max_force: f32) -> Vec3 {
    if force.length_squared() > max_force * max_force {
        force.normalize_or_zero() * max_force
    } else {
        force
    }
}

pub fn seek(agent: &SteeringAgent, target: Vec3) -> Vec3 {
    let desired = (target - agent.position).normalize_or_zero() * agent.max_speed;
    limit(desired - agent.velocity, agent.max_force)
}

pub fn flee(agent: &SteeringAgent, target: Vec3) -> Vec3 {
    let desired = (agent.position - target).normalize_or_zero() * agent.max_speed;
    limit(desired - agent.velocity, agent.max_force)
}

/// Look-ahead time used by [`pursue`] and [`evade`].
fn prediction_time(agent: &SteeringAgent, target_position: Vec3) -> f32 {
    if agent.max_speed <= 0.0 {
        return 0.0;
    }
    agent.position.distance(target_position) / agent.max_speed
}

/// Seek where the target will be after `distance / max_speed` seconds.
pub fn pursue(agent: &SteeringAgent, target_position: Vec3, target_velocity: Vec3) -> Vec3 {
    let t = prediction_time(agent, target_position);
    seek(agent, target_position + target_velocity * t)
}

/// Flee from where the target will be after `distance / max_speed` seconds.
pub fn evade(agent: &SteeringAgent, target_position: Vec3, target_velocity: Vec3) -> Vec3 {
    let t = prediction_time(agent, target_position);
    flee(agent, target_position + target_velocity * t)
}

/// Seek that slows down linearly inside `slowing_radius`.
pub fn arrive(agent: &SteeringAgent, target: Vec3, slowing_radius: f32) -> Vec3 {
    let offset = target - agent.position;
    let distance = offset.length();
    if distance <= f32::EPSILON {
        return limit(-agent.velocity, agent.max_force);
    }
    let speed = if slowing_radius > 0.0 && distance < slowing_radius {
        agent.max_speed * (distance / slowing_radius)
    } else {
        agent.max_speed
    };
    let desired = offset / distance * speed;
    limit(desired - agent.velocity, agent.max_force)
}

/// Random drift on a circle projected ahead of the current heading.
pub fn wander<R: Rng>(agent: &SteeringAgent, state: &mut WanderState, rng: &mut R) -> Vec3 {
    let heading = agent.velocity.normalize_or_zero();
    let heading = if heading == Vec3::ZERO { Vec3::X } else { heading };
    let center = heading * state.circle_distance;

    let displacement = Vec3::new(state.angle.cos(), 0.0, state.angle.sin()) * state.circle_radius;
    state.angle += rng.gen_range(-1.0f32..=1.0) * state.angle_change;

    limit(center + displacement, agent.max_force)
}

/// Inverse-distance weighted push away from every point closer than `radius`,
/// averaged over the contributing points.
fn repulsion(position: Vec3, others: impl Iterator<Item = (Vec3, f32)>) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0u32;
    for (other, radius) in others {
        let away = position - other;
        let distance = away.length();
        if distance <= f32::EPSILON || distance >= radius {
            continue;
        }
        sum += away / distance / distance;
        count += 1;
    }
    if count == 0 {
        Vec3::ZERO
    } else {
        sum / count as f32
    }
}

/// Push away from obstacles whose surface lies within `detection_radius`.
pub fn avoid_obstacles(
    agent: &SteeringAgent,
    obstacles: &[SteeringObstacle],
    detection_radius: f32,
) -> Vec3 {
    let force = repulsion(
        agent.position,
        obstacles
            .iter()
            .map(|o| (o.position, detection_radius + o.radius)),
    );
    limit(force, agent.max_force)
}

/// Push away from neighbors closer than `radius`.
pub fn separate(agent: &SteeringAgent, neighbors: &[Vec3], radius: f32) -> Vec3 {
    let force = repulsion(agent.position, neighbors.iter().map(|&n| (n, radius)));
    limit(force, agent.max_force)
}
