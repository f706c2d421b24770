//! ECS components for every simulated entity (player, enemies, platforms, pickups).

use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::ai::boss::BossBrain;
use crate::ai::grunt::GruntBrain;
use crate::ai::tentacle::TentacleBrain;

/// Stable simulation identity, independent of bevy's `Entity` generation.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// What an entity was spawned as.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Ally,
    Grunt,
    Boss,
    Tentacle,
    Platform,
    Obstacle,
    Collectible,
}

impl EntityKind {
    /// Kinds that only live near the camera and are culled once left behind.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Grunt | Self::Boss | Self::Tentacle | Self::Obstacle | Self::Collectible
        )
    }
}

/// Position in world units.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Position(pub Vec3);

/// Velocity in world units per second.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity(pub Vec3);

/// Whether the entity rested on a platform after the last physics step.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct OnGround(pub bool);

/// Movement/combat stance, written by input or AI before the tick.
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CharacterState {
    #[default]
    Stand,
    Run,
    Sprint,
    Jump,
    Slide,
    Attack,
    Block,
    Stun,
}

impl CharacterState {
    /// Standing and blocking entities bleed off horizontal speed.
    pub fn applies_drag(self) -> bool {
        matches!(self, Self::Stand | Self::Block)
    }
}

/// Which side an entity fights on.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Player,
    Ally,
    Enemy,
    Neutral,
}

impl Faction {
    /// Player and allies deal melee damage to enemies.
    pub fn attacks_enemies(self) -> bool {
        matches!(self, Self::Player | Self::Ally)
    }
}

/// Current hit points. Max health is `Stats::structure`.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Health(pub f32);

/// Character attributes. `structure` doubles as max health.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub structure: f32,
    pub ignition: f32,
    pub logic: f32,
    pub flow: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            structure: 100.0,
            ignition: 10.0,
            logic: 10.0,
            flow: 10.0,
        }
    }
}

/// One of the four allocatable attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Structure,
    Ignition,
    Logic,
    Flow,
}

impl Stats {
    /// Mutable access to a single attribute.
    pub fn get_mut(&mut self, kind: StatKind) -> &mut f32 {
        match kind {
            StatKind::Structure => &mut self.structure,
            StatKind::Ignition => &mut self.ignition,
            StatKind::Logic => &mut self.logic,
            StatKind::Flow => &mut self.flow,
        }
    }
}

/// Progression record. `xp` is progress inside the current level.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub current: u32,
    pub xp: u64,
    pub next_level_xp: u64,
    pub stat_points: u32,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            current: 1,
            xp: 0,
            next_level_xp: crate::progression::calculate_xp_required(1),
            stat_points: 0,
        }
    }
}

/// Static sloped collision segment. Immutable once spawned.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct PlatformData {
    pub length: f32,
    /// Unitless tilt; one unit is roughly 15 degrees.
    pub slope: f32,
    pub width: f32,
}

/// Obstacle height class.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleType {
    /// Knee-high; jump over it.
    Low,
    /// Overhead; slide under it.
    High,
}

/// A single ability cooldown, in wall-clock milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cooldown {
    pub ability_id: String,
    pub ends_at: u64,
}

/// All cooldowns currently tracked for a caster.
#[derive(Component, Debug, Clone, Default)]
pub struct Cooldowns(pub Vec<Cooldown>);

impl Cooldowns {
    /// Entry for `ability_id`, if one is tracked.
    pub fn find(&self, ability_id: &str) -> Option<&Cooldown> {
        self.0.iter().find(|c| c.ability_id == ability_id)
    }
}

/// Resource spent by abilities.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Energy {
    pub current: f32,
    pub max: f32,
}

/// Score and XP granted to whoever defeats this entity.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounty {
    pub score: u64,
    pub xp: u64,
}

/// Pickup granting XP and score on contact with the player.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collectible {
    pub xp: u64,
    pub score: u64,
}

/// Marker: ignores gravity and platform collision.
#[derive(Component, Debug)]
pub struct Flying;

/// Tick when this entity last took melee damage.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct LastDamageTick(pub Option<u64>);

/// Id of the last entity whose ability damaged this one.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastHitBy(pub u64);

/// AI behavior record. Each variant carries its own FSM state and tuning.
#[derive(Component, Debug, Clone)]
pub enum Brain {
    Grunt(GruntBrain),
    Boss(BossBrain),
    Tentacle(TentacleBrain),
}
