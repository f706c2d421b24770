//! Simulation tuning. Every field has a default so partial TOML works.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimConfig {
    /// Seed for the simulation RNG (crits, AI rolls, spawning).
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub combat: CombatConfig,
    #[serde(default)]
    pub progression: ProgressionConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub spawn: SpawnConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicsConfig {
    /// Vertical acceleration (negative is down), units/s².
    #[serde(default = "default_gravity")]
    pub gravity: f32,
    /// Largest step accepted by a single tick, in seconds.
    #[serde(default = "default_max_delta")]
    pub max_delta: f32,
    /// Platforms ending further than this behind the camera are removed.
    #[serde(default = "default_cleanup_threshold")]
    pub cleanup_threshold: f32,
    #[serde(default = "default_true")]
    pub camera_follows_player: bool,
}

fn default_gravity() -> f32 {
    -30.0
}

fn default_max_delta() -> f32 {
    0.1
}

fn default_cleanup_threshold() -> f32 {
    100.0
}

fn default_true() -> bool {
    true
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            max_delta: default_max_delta(),
            cleanup_threshold: default_cleanup_threshold(),
            camera_follows_player: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CombatConfig {
    /// Flat damage added before attributes.
    #[serde(default = "default_base_damage")]
    pub base_damage: f32,
    /// Ticks a defender ignores melee damage after being hit.
    #[serde(default = "default_invulnerability_ticks")]
    pub invulnerability_ticks: u64,
    /// Damage dealt by running into an obstacle.
    #[serde(default = "default_obstacle_damage")]
    pub obstacle_damage: f32,
    #[serde(default = "default_bounty_score")]
    pub default_bounty_score: u64,
    #[serde(default = "default_bounty_xp")]
    pub default_bounty_xp: u64,
}

fn default_base_damage() -> f32 {
    10.0
}

fn default_invulnerability_ticks() -> u64 {
    10
}

fn default_obstacle_damage() -> f32 {
    10.0
}

fn default_bounty_score() -> u64 {
    100
}

fn default_bounty_xp() -> u64 {
    50
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_damage: default_base_damage(),
            invulnerability_ticks: default_invulnerability_ticks(),
            obstacle_damage: default_obstacle_damage(),
            default_bounty_score: default_bounty_score(),
            default_bounty_xp: default_bounty_xp(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressionConfig {
    /// Multiplier applied to every XP award.
    #[serde(default = "default_xp_multiplier")]
    pub xp_multiplier: f32,
}

fn default_xp_multiplier() -> f32 {
    1.0
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_multiplier: default_xp_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Radius used by the crowd coordinator's separation force.
    #[serde(default = "default_separation_radius")]
    pub separation_radius: f32,
}

fn default_separation_radius() -> f32 {
    2.0
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            separation_radius: default_separation_radius(),
        }
    }
}

/// Configuration for spawning enemies and pickups ahead of the camera.
#[derive(Debug, Clone, Deserialize)]
pub struct SpawnConfig {
    /// Ticks between spawn attempts. 0 disables spawning.
    #[serde(default = "default_spawn_interval")]
    pub interval_ticks: u64,
    /// Maximum live enemies.
    #[serde(default = "default_enemy_cap")]
    pub enemy_cap: u32,
    /// How far ahead of the camera new entities appear.
    #[serde(default = "default_distance_ahead")]
    pub distance_ahead: f32,
    /// Entities further than this behind the camera are despawned.
    #[serde(default = "default_despawn_behind")]
    pub despawn_behind: f32,
    /// Probability that a spawn attempt produces a collectible instead of an enemy.
    #[serde(default = "default_collectible_chance")]
    pub collectible_chance: f32,
}

fn default_spawn_interval() -> u64 {
    90
}

fn default_enemy_cap() -> u32 {
    6
}

fn default_distance_ahead() -> f32 {
    30.0
}

fn default_despawn_behind() -> f32 {
    40.0
}

fn default_collectible_chance() -> f32 {
    0.35
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            interval_ticks: default_spawn_interval(),
            enemy_cap: default_enemy_cap(),
            distance_ahead: default_distance_ahead(),
            despawn_behind: default_despawn_behind(),
            collectible_chance: default_collectible_chance(),
        }
    }
}
