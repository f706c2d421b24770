//! AI tick system: evaluates every brain against a snapshot and writes intents back.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use tracing::trace;

use crate::components::*;

use super::boss::{self, BossContext};
use super::crowd::{CrowdAgent, CrowdCoordinator};
use super::grunt::{self, GruntContext};
use super::steering::{self, SteeringAgent};
use super::tentacle::{self, TentacleApproach, TentacleCommand, TentacleContext};

/// Collision radius of a tentacle inside the crowd.
const TENTACLE_RADIUS: f32 = 0.5;

/// Brain snapshot for evaluation.
struct BrainSnapshot {
    entity: Entity,
    id: u64,
    position: Vec3,
    velocity: Vec3,
    brain: Brain,
}

/// Tentacle intent, resolved through the crowd before it becomes a velocity.
struct TentacleMove {
    entity: Entity,
    id: u64,
    position: Vec3,
    target: Vec3,
    speed: f32,
    /// Output of the steering behavior, before separation.
    desired: Vec3,
}

enum Action {
    Grunt {
        velocity_x: f32,
        state: CharacterState,
    },
    Boss {
        velocity: Vec3,
        snap_y: Option<f32>,
        state: CharacterState,
    },
    Tentacle {
        state: CharacterState,
    },
}

/// Runs one FSM step for every entity with a `Brain`.
///
/// Brains are evaluated in id order so the RNG draws are reproducible for a given seed.
pub fn system_ai_tick<R: Rng>(world: &mut World, rng: &mut R, dt: f32) {
    // Step 1: Snapshot player positions and velocities
    let players: Vec<(Vec3, Vec3)> = {
        let mut q = world.query::<(&Position, Option<&Velocity>, &Faction)>();
        q.iter(world)
            .filter(|(_, _, faction)| **faction == Faction::Player)
            .map(|(pos, vel, _)| (pos.0, vel.map(|v| v.0).unwrap_or_default()))
            .collect()
    };

    // Step 2: Snapshot every brain
    let mut snapshots: Vec<BrainSnapshot> = {
        let mut q = world.query::<(Entity, &EntityId, &Position, Option<&Velocity>, &Brain)>();
        q.iter(world)
            .map(|(entity, id, pos, vel, brain)| BrainSnapshot {
                entity,
                id: id.0,
                position: pos.0,
                velocity: vel.map(|v| v.0).unwrap_or_default(),
                brain: brain.clone(),
            })
            .collect()
    };
    snapshots.sort_by_key(|s| s.id);

    // Step 3: Evaluate transitions
    let mut actions: Vec<(Entity, Brain, Action)> = Vec::with_capacity(snapshots.len());
    let mut tentacle_moves: Vec<TentacleMove> = Vec::new();

    for mut snap in snapshots {
        let nearest_with_velocity = nearest_player(&players, snap.position);
        let nearest = nearest_with_velocity.map(|(p, _)| p);
        let action = match &mut snap.brain {
            Brain::Grunt(brain) => {
                let ctx = GruntContext {
                    player_distance: nearest.map(|p| p.distance(snap.position)),
                    player_dx: nearest.map(|p| p.x - snap.position.x).unwrap_or(0.0),
                };
                let (next, cmd) = grunt::transition(brain, &ctx, rng.gen());
                if next != brain.state {
                    trace!("Grunt {} {:?} -> {:?}", snap.id, brain.state, next);
                }
                brain.state = next;
                Action::Grunt {
                    velocity_x: cmd.velocity_x,
                    state: cmd.character_state,
                }
            }
            Brain::Boss(brain) => {
                let ctx = BossContext {
                    position: snap.position,
                    player_position: nearest,
                };
                let cmd = boss::transition(brain, &ctx, dt, rng.gen());
                Action::Boss {
                    velocity: cmd.velocity,
                    snap_y: cmd.snap_y,
                    state: cmd.character_state,
                }
            }
            Brain::Tentacle(brain) => {
                let ctx = TentacleContext {
                    position: snap.position,
                    player_position: nearest,
                };
                let cmd = tentacle::transition(brain, &ctx, dt);
                let target_velocity = nearest_with_velocity.map(|(_, v)| v).unwrap_or_default();
                tentacle_moves.push(TentacleMove {
                    entity: snap.entity,
                    id: snap.id,
                    position: snap.position,
                    target: cmd.target,
                    speed: cmd.speed,
                    desired: tentacle_velocity(&cmd, snap.position, snap.velocity, target_velocity),
                });
                Action::Tentacle {
                    state: cmd.character_state,
                }
            }
        };
        actions.push((snap.entity, snap.brain, action));
    }

    // Step 4: Resolve tentacle velocities through the crowd
    let tentacle_velocities = steer_crowd(world, &tentacle_moves, dt);

    // Step 5: Apply outputs to ECS state
    for (entity, brain, action) in actions {
        if let Some(mut stored) = world.get_mut::<Brain>(entity) {
            *stored = brain;
        }
        let state = match action {
            Action::Grunt { velocity_x, state } => {
                if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                    vel.0.x = velocity_x;
                }
                state
            }
            Action::Boss {
                velocity,
                snap_y,
                state,
            } => {
                if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
                    vel.0 = velocity;
                }
                if let Some(y) = snap_y {
                    if let Some(mut pos) = world.get_mut::<Position>(entity) {
                        pos.0.y = y;
                    }
                }
                state
            }
            Action::Tentacle { state } => {
                let velocity = tentacle_velocities
                    .iter()
                    .find(|(e, _)| *e == entity)
                    .map(|(_, v)| *v);
                if let (Some(v), Some(mut vel)) = (velocity, world.get_mut::<Velocity>(entity)) {
                    vel.0 = v;
                }
                state
            }
        };
        if let Some(mut cs) = world.get_mut::<CharacterState>(entity) {
            *cs = state;
        }
    }
}

/// Sync tentacles into the crowd, step it, and return the resulting velocities.
///
/// Agents whose entity no longer has a tentacle brain are dropped first.
fn steer_crowd(world: &mut World, moves: &[TentacleMove], dt: f32) -> Vec<(Entity, Vec3)> {
    let Some(mut crowd) = world.get_resource_mut::<CrowdCoordinator>() else {
        return Vec::new();
    };

    let stale: Vec<u64> = crowd
        .ids()
        .filter(|id| !moves.iter().any(|m| m.id == *id))
        .collect();
    for id in stale {
        crowd.remove_agent(id);
    }

    for mv in moves {
        match crowd.agent_mut(mv.id) {
            Some(agent) => {
                agent.position = mv.position;
                agent.max_speed = mv.speed;
            }
            None => crowd.add_agent(mv.id, CrowdAgent::new(mv.position, mv.speed, TENTACLE_RADIUS)),
        }
        crowd.set_target(mv.id, Some(mv.target));
        crowd.set_preferred_velocity(mv.id, Some(mv.desired));
    }

    crowd.update(dt);

    moves
        .iter()
        .filter_map(|mv| crowd.agent(mv.id).map(|a| (mv.entity, a.velocity)))
        .collect()
}

/// Velocity a tentacle wants this tick: its current velocity plus one step of the
/// steering force for the commanded approach, capped at the commanded speed.
fn tentacle_velocity(
    cmd: &TentacleCommand,
    position: Vec3,
    velocity: Vec3,
    target_velocity: Vec3,
) -> Vec3 {
    let agent = SteeringAgent {
        position,
        velocity,
        max_speed: cmd.speed,
        max_force: cmd.speed,
    };
    let force = match cmd.approach {
        TentacleApproach::Seek => steering::seek(&agent, cmd.target),
        TentacleApproach::Pursue => steering::pursue(&agent, cmd.target, target_velocity),
        TentacleApproach::Arrive { slowing_radius } => {
            steering::arrive(&agent, cmd.target, slowing_radius)
        }
    };
    (velocity + force).clamp_length_max(cmd.speed)
}

/// Nearest player `(position, velocity)` to `from`, if any player exists.
fn nearest_player(players: &[(Vec3, Vec3)], from: Vec3) -> Option<(Vec3, Vec3)> {
    players.iter().copied().min_by(|a, b| {
        a.0.distance_squared(from)
            .partial_cmp(&b.0.distance_squared(from))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::boss::{BossBrain, BossState};
    use crate::ai::grunt::{GruntBrain, GruntState};
    use crate::ai::tentacle::{TentacleBrain, TentacleState};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn world_with_player(at: Vec3) -> World {
        let mut world = World::new();
        world.insert_resource(CrowdCoordinator::new(2.0));
        world.spawn((
            EntityId(1),
            Position(at),
            Velocity::default(),
            CharacterState::Run,
            Faction::Player,
        ));
        world
    }

    fn spawn_brain(world: &mut World, id: u64, at: Vec3, brain: Brain) -> Entity {
        world
            .spawn((
                EntityId(id),
                Position(at),
                Velocity::default(),
                CharacterState::Stand,
                Faction::Enemy,
                brain,
            ))
            .id()
    }

    #[test]
    fn grunt_chases_nearby_player() {
        let mut world = world_with_player(Vec3::ZERO);
        let grunt = spawn_brain(
            &mut world,
            2,
            Vec3::new(5.0, 0.0, 0.0),
            Brain::Grunt(GruntBrain::default()),
        );
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);

        assert!((world.get::<Velocity>(grunt).unwrap().0.x + 4.0).abs() < 0.01);
        assert_eq!(*world.get::<CharacterState>(grunt).unwrap(), CharacterState::Run);
        match world.get::<Brain>(grunt).unwrap() {
            Brain::Grunt(b) => assert_eq!(b.state, GruntState::Chase),
            other => panic!("unexpected brain {other:?}"),
        }
    }

    #[test]
    fn grunt_idles_without_player() {
        let mut world = World::new();
        world.insert_resource(CrowdCoordinator::new(2.0));
        let grunt = spawn_brain(&mut world, 2, Vec3::ZERO, Brain::Grunt(GruntBrain::default()));
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);
        assert_eq!(*world.get::<CharacterState>(grunt).unwrap(), CharacterState::Stand);
        assert!(world.get::<Velocity>(grunt).unwrap().0.x.abs() < 0.01);
    }

    #[test]
    fn grunt_keeps_vertical_velocity() {
        let mut world = world_with_player(Vec3::ZERO);
        let grunt = spawn_brain(
            &mut world,
            2,
            Vec3::new(5.0, 3.0, 0.0),
            Brain::Grunt(GruntBrain::default()),
        );
        world.get_mut::<Velocity>(grunt).unwrap().0.y = -7.0;
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);
        assert!((world.get::<Velocity>(grunt).unwrap().0.y + 7.0).abs() < 0.01);
    }

    #[test]
    fn boss_pinned_at_slam_floor() {
        let mut world = world_with_player(Vec3::ZERO);
        let boss = spawn_brain(
            &mut world,
            2,
            Vec3::new(3.0, 0.4, 0.0),
            Brain::Boss(BossBrain {
                state: BossState::Slam,
                ..Default::default()
            }),
        );
        world.get_mut::<Velocity>(boss).unwrap().0 = Vec3::new(0.0, -25.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        system_ai_tick(&mut world, &mut rng, 0.016);

        assert!((world.get::<Position>(boss).unwrap().0.y - 1.0).abs() < 0.01);
        assert_eq!(world.get::<Velocity>(boss).unwrap().0, Vec3::ZERO);
        assert_eq!(*world.get::<CharacterState>(boss).unwrap(), CharacterState::Stun);
    }

    #[test]
    fn tentacle_registers_with_crowd_and_tracks() {
        let mut world = world_with_player(Vec3::new(6.0, 0.0, 0.0));
        let tentacle = spawn_brain(
            &mut world,
            5,
            Vec3::ZERO,
            Brain::Tentacle(TentacleBrain::new(Vec3::ZERO, 3.0, 0.0)),
        );
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);

        assert!(world.resource::<CrowdCoordinator>().agent(5).is_some());
        let vel = world.get::<Velocity>(tentacle).unwrap().0;
        assert!(vel.x > 0.0);
        assert!(vel.length() <= 4.5 + 0.01);
        match world.get::<Brain>(tentacle).unwrap() {
            Brain::Tentacle(b) => assert_eq!(b.state, TentacleState::Tracking),
            other => panic!("unexpected brain {other:?}"),
        }
    }

    #[test]
    fn tracking_tentacle_leads_moving_player() {
        let mut world = world_with_player(Vec3::new(6.0, 0.0, 0.0));
        let mut q = world.query::<(&Faction, &mut Velocity)>();
        for (_, mut vel) in q.iter_mut(&mut world) {
            vel.0 = Vec3::new(0.0, 0.0, 3.0);
        }
        let tentacle = spawn_brain(
            &mut world,
            5,
            Vec3::ZERO,
            Brain::Tentacle(TentacleBrain::new(Vec3::ZERO, 3.0, 0.0)),
        );
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);

        // Aims at where the player will be, not where it is.
        let vel = world.get::<Velocity>(tentacle).unwrap().0;
        assert!(vel.z > 1.0);
        assert!((vel.length() - 4.5).abs() < 0.01);
    }

    #[test]
    fn retracting_tentacle_brakes_near_anchor() {
        let mut world = world_with_player(Vec3::new(50.0, 0.0, 0.0));
        let mut brain = TentacleBrain::new(Vec3::ZERO, 3.0, 0.0);
        brain.state = TentacleState::Retracting;
        let tentacle = spawn_brain(&mut world, 5, Vec3::new(1.0, 0.0, 0.0), Brain::Tentacle(brain));
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);

        // Half of tracking speed at half the slowing radius.
        let vel = world.get::<Velocity>(tentacle).unwrap().0;
        assert!((vel.x + 2.25).abs() < 0.01);
        assert!(vel.y.abs() < 0.01);
    }

    #[test]
    fn despawned_tentacle_leaves_crowd() {
        let mut world = world_with_player(Vec3::new(50.0, 0.0, 0.0));
        let tentacle = spawn_brain(
            &mut world,
            5,
            Vec3::ZERO,
            Brain::Tentacle(TentacleBrain::new(Vec3::ZERO, 3.0, 0.0)),
        );
        let mut rng = StdRng::seed_from_u64(1);
        system_ai_tick(&mut world, &mut rng, 0.016);
        assert_eq!(world.resource::<CrowdCoordinator>().len(), 1);

        world.despawn(tentacle);
        system_ai_tick(&mut world, &mut rng, 0.016);
        assert!(world.resource::<CrowdCoordinator>().is_empty());
    }

    #[test]
    fn nearest_player_picks_closest() {
        let players = [
            (Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO),
            (Vec3::new(-2.0, 0.0, 0.0), Vec3::X),
        ];
        assert_eq!(
            nearest_player(&players, Vec3::ZERO),
            Some((Vec3::new(-2.0, 0.0, 0.0), Vec3::X))
        );
        assert_eq!(nearest_player(&[], Vec3::ZERO), None);
    }
}
