//! Scripted player intents for headless sessions.

use glam::Vec3;
use rival_game::components::*;
use rival_game::error::SimError;
use rival_game::game_world::GameWorld;
use rival_game::physics;
use tracing::trace;

const RUN_SPEED: f32 = 8.0;
const JUMP_SPEED: f32 = 10.0;
/// Horizontal distance at which the player swings at an enemy.
const MELEE_RANGE: f32 = 1.4;
/// Horizontal distance at which obstacles are reacted to.
const OBSTACLE_RANGE: f32 = 1.6;
/// Ability casts target enemies within this distance.
const CAST_RANGE: f32 = 10.0;
/// Look this far ahead for the edge of the current platform.
const EDGE_LOOKAHEAD: f32 = 1.0;
/// Heal below this fraction of max health.
const HEAL_THRESHOLD: f32 = 0.5;

/// Stat order points are spent in.
const STAT_ROTATION: [StatKind; 4] = [
    StatKind::Structure,
    StatKind::Ignition,
    StatKind::Flow,
    StatKind::Logic,
];

/// What the player does this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Run,
    Jump,
    Slide,
    Attack,
}

/// Drives one player entity.
pub struct Autopilot {
    player: u64,
    spent_points: usize,
}

impl Autopilot {
    pub fn new(player: u64) -> Self {
        Self {
            player,
            spent_points: 0,
        }
    }

    /// Pick and apply this tick's intent, cast abilities, and spend stat points.
    pub fn drive(&mut self, gw: &mut GameWorld) -> Result<Intent, SimError> {
        let Some(position) = gw.position(self.player) else {
            return Err(SimError::UnknownEntity(self.player));
        };
        let grounded = gw.is_grounded(self.player);
        let intent = decide(gw, position, grounded);

        let velocity = gw.velocity(self.player).unwrap_or_default();
        match intent {
            Intent::Run | Intent::Attack | Intent::Slide => {
                gw.set_velocity(self.player, Vec3::new(RUN_SPEED, velocity.y, velocity.z))?;
            }
            Intent::Jump => {
                gw.set_velocity(self.player, Vec3::new(RUN_SPEED, JUMP_SPEED, velocity.z))?;
            }
        }
        let state = match intent {
            Intent::Run if !grounded && gw.state(self.player) == Some(CharacterState::Jump) => {
                CharacterState::Jump
            }
            Intent::Run => CharacterState::Run,
            Intent::Jump => CharacterState::Jump,
            Intent::Slide => CharacterState::Slide,
            Intent::Attack => CharacterState::Attack,
        };
        gw.set_state(self.player, state)?;

        self.cast(gw, position);
        self.spend_points(gw)?;
        Ok(intent)
    }

    fn cast(&self, gw: &mut GameWorld, position: Vec3) {
        let low_health = match (gw.health(self.player), self.max_health(gw)) {
            (Some(health), Some(max)) => health < max * HEAL_THRESHOLD,
            _ => false,
        };
        if low_health {
            if let Err(e) = gw.use_ability(self.player, self.player, "flow_mend") {
                trace!("flow_mend not cast: {}", e);
            }
        }

        let Some(target) = nearest_enemy(gw, position, CAST_RANGE) else {
            return;
        };
        for ability in ["logic_spike", "ignition_strike"] {
            match gw.use_ability(self.player, target, ability) {
                Ok(_) => break,
                Err(e) => trace!("{} not cast: {}", ability, e),
            }
        }
    }

    fn max_health(&self, gw: &GameWorld) -> Option<f32> {
        let entity = gw.entity(self.player)?;
        gw.world.get::<Stats>(entity).map(|s| s.structure)
    }

    fn spend_points(&mut self, gw: &mut GameWorld) -> Result<(), SimError> {
        let points = gw.level(self.player).map(|l| l.stat_points).unwrap_or(0);
        for _ in 0..points {
            let kind = STAT_ROTATION[self.spent_points % STAT_ROTATION.len()];
            gw.spend_stat_point(self.player, kind)?;
            self.spent_points += 1;
        }
        Ok(())
    }
}

/// Choose an intent from what lies just ahead of the player.
fn decide(gw: &mut GameWorld, position: Vec3, grounded: bool) -> Intent {
    if nearest_enemy(gw, position, MELEE_RANGE).is_some() {
        return Intent::Attack;
    }

    let obstacle = {
        let mut q = gw.world.query::<(&Position, &ObstacleType)>();
        q.iter(&gw.world)
            .filter(|(pos, _)| {
                let dx = pos.0.x - position.x;
                (0.0..OBSTACLE_RANGE).contains(&dx)
            })
            .map(|(_, kind)| *kind)
            .next()
    };
    match obstacle {
        Some(ObstacleType::High) => return Intent::Slide,
        Some(ObstacleType::Low) if grounded => return Intent::Jump,
        _ => {}
    }

    if grounded {
        let platforms = physics::collect_platforms(&mut gw.world);
        let ahead = position + Vec3::new(EDGE_LOOKAHEAD, 0.0, 0.0);
        if physics::ground_height_at(&platforms, ahead).is_none() {
            return Intent::Jump;
        }
    }
    Intent::Run
}

/// Id of the closest enemy within `range` of `position`.
fn nearest_enemy(gw: &mut GameWorld, position: Vec3, range: f32) -> Option<u64> {
    let mut q = gw.world.query::<(&EntityId, &Position, &Faction)>();
    q.iter(&gw.world)
        .filter(|(_, _, faction)| **faction == Faction::Enemy)
        .map(|(id, pos, _)| (id.0, pos.0.distance(position)))
        .filter(|(_, d)| *d <= range)
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(id, _)| id)
}
