//! Multi-agent separation and local collision queries for AI groups.

use std::collections::BTreeMap;

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::steering::{self, SteeringAgent};

/// Weight of the separation force relative to the desired velocity.
const SEPARATION_WEIGHT: f32 = 1.5;

/// One agent tracked by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CrowdAgent {
    pub position: Vec3,
    pub velocity: Vec3,
    pub target: Option<Vec3>,
    /// Velocity chosen by the agent's own steering. Takes precedence over `target`.
    pub preferred_velocity: Option<Vec3>,
    pub max_speed: f32,
    pub radius: f32,
}

impl CrowdAgent {
    pub fn new(position: Vec3, max_speed: f32, radius: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            target: None,
            preferred_velocity: None,
            max_speed,
            radius,
        }
    }
}

/// Registry of agents keyed by entity id. Iteration order is by id.
#[derive(Resource, Debug, Clone)]
pub struct CrowdCoordinator {
    agents: BTreeMap<u64, CrowdAgent>,
    separation_radius: f32,
}

impl CrowdCoordinator {
    pub fn new(separation_radius: f32) -> Self {
        Self {
            agents: BTreeMap::new(),
            separation_radius,
        }
    }

    pub fn add_agent(&mut self, id: u64, agent: CrowdAgent) {
        self.agents.insert(id, agent);
    }

    pub fn remove_agent(&mut self, id: u64) -> Option<CrowdAgent> {
        self.agents.remove(&id)
    }

    pub fn agent(&self, id: u64) -> Option<&CrowdAgent> {
        self.agents.get(&id)
    }

    pub fn agent_mut(&mut self, id: u64) -> Option<&mut CrowdAgent> {
        self.agents.get_mut(&id)
    }

    pub fn set_target(&mut self, id: u64, target: Option<Vec3>) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.target = target;
        }
    }

    pub fn set_preferred_velocity(&mut self, id: u64, velocity: Option<Vec3>) {
        if let Some(agent) = self.agents.get_mut(&id) {
            agent.preferred_velocity = velocity;
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Ids of all registered agents.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.agents.keys().copied()
    }

    /// Steer every agent toward its preferred velocity, or else seek its target,
    /// add separation, clamp to max speed, then integrate positions by `dt`.
    ///
    /// Velocities are computed from a snapshot of the positions at the start of the
    /// step, so the result does not depend on iteration order.
    pub fn update(&mut self, dt: f32) {
        let positions: Vec<(u64, Vec3)> = self
            .agents
            .iter()
            .map(|(&id, a)| (id, a.position))
            .collect();

        for (&id, agent) in self.agents.iter_mut() {
            let steering_agent = SteeringAgent {
                position: agent.position,
                velocity: agent.velocity,
                max_speed: agent.max_speed,
                max_force: agent.max_speed,
            };

            // Seek is evaluated from rest, which makes its force the desired velocity.
            let desired = match (agent.preferred_velocity, agent.target) {
                (Some(velocity), _) => velocity,
                (None, Some(target)) => steering::seek(
                    &SteeringAgent {
                        velocity: Vec3::ZERO,
                        ..steering_agent
                    },
                    target,
                ),
                (None, None) => Vec3::ZERO,
            };

            let neighbors: Vec<Vec3> = positions
                .iter()
                .filter(|(other, _)| *other != id)
                .map(|&(_, p)| p)
                .collect();
            let separation =
                steering::separate(&steering_agent, &neighbors, self.separation_radius);

            agent.velocity = (desired + separation * SEPARATION_WEIGHT).clamp_length_max(agent.max_speed);
        }

        for agent in self.agents.values_mut() {
            agent.position += agent.velocity * dt;
        }
    }

    /// True if any two agents overlap (distance below the sum of their radii).
    pub fn check_collisions(&self) -> bool {
        !self.colliding_pairs().is_empty()
    }

    /// Every overlapping pair, lower id first.
    pub fn colliding_pairs(&self) -> Vec<(u64, u64)> {
        let agents: Vec<(&u64, &CrowdAgent)> = self.agents.iter().collect();
        let mut pairs = Vec::new();
        for (i, (id_a, a)) in agents.iter().enumerate() {
            for (id_b, b) in agents.iter().skip(i + 1) {
                if a.position.distance(b.position) < a.radius + b.radius {
                    pairs.push((**id_a, **id_b));
                }
            }
        }
        pairs
    }
}
