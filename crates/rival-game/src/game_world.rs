//! ECS game world: bevy_ecs World, entity management, tick order, and event bus.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::ability::{self, AbilityEffect, AbilityRegistry, Caster, Clock, EffectType, SystemClock, Target};
use crate::ai::boss::BossBrain;
use crate::ai::crowd::CrowdCoordinator;
use crate::ai::grunt::GruntBrain;
use crate::ai::system::system_ai_tick;
use crate::ai::tentacle::TentacleBrain;
use crate::combat;
use crate::components::*;
use crate::config::{CombatConfig, SimConfig};
use crate::error::{AbilityError, SimError};
use crate::physics;
use crate::progression;
use crate::spawning;

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Outgoing events queued by systems for presentation layers to drain.
#[derive(Resource, Default)]
pub struct OutgoingEvents {
    pub events: Vec<GameEvent>,
}

/// Number of ticks run so far.
#[derive(Resource, Default)]
pub struct TickCounter(pub u64);

/// Thread-safe entity id allocator.
#[derive(Resource)]
pub struct EntityIdAllocator {
    next: AtomicU64,
}

impl EntityIdAllocator {
    pub fn new(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    /// Allocate the next unique entity id.
    pub fn allocate(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Current value (next id that will be allocated).
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Stable id → bevy entity.
#[derive(Resource, Default)]
pub struct EntityIndex(pub HashMap<u64, Entity>);

/// Entities queued for removal at the end of the tick.
#[derive(Resource, Default, Debug)]
pub struct PendingRemovals(Vec<Entity>);

impl PendingRemovals {
    pub fn push(&mut self, entity: Entity) {
        self.0.push(entity);
    }

    pub fn extend(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.0.extend(entities);
    }

    pub fn entities(&self) -> &[Entity] {
        &self.0
    }

    fn take(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.0)
    }
}

/// World x the camera is centered on.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct CameraFocus {
    pub x: f32,
}

/// Session score.
#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct Score(pub u64);

#[derive(Resource, Default, Debug, Clone, Copy)]
pub struct Session {
    pub game_over: bool,
}

// ---------------------------------------------------------------------------
// Game events (simulation → presentation)
// ---------------------------------------------------------------------------

/// Kind of floating combat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatEventKind {
    Damage,
    Heal,
    Xp,
    Item,
}

impl CombatEventKind {
    pub fn color(self) -> &'static str {
        match self {
            Self::Damage => "#ff4444",
            Self::Heal => "#44ff44",
            Self::Xp => "#44aaff",
            Self::Item => "#44ff88",
        }
    }
}

/// Color of critical damage text.
pub const CRITICAL_COLOR: &str = "#ffaa00";

/// Presentation-ready combat feedback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatEvent {
    pub kind: CombatEventKind,
    /// Entity the text is shown over.
    pub target: u64,
    pub value: f32,
    pub message: String,
    pub color: &'static str,
}

impl CombatEvent {
    pub fn new(kind: CombatEventKind, target: u64, value: f32, message: String) -> Self {
        Self {
            kind,
            target,
            value,
            message,
            color: kind.color(),
        }
    }

    /// Damage text, highlighted when critical.
    pub fn damage(target: u64, amount: f32, critical: bool) -> Self {
        if critical {
            Self {
                color: CRITICAL_COLOR,
                ..Self::new(CombatEventKind::Damage, target, amount, format!("CRIT! -{amount:.0}"))
            }
        } else {
            Self::new(CombatEventKind::Damage, target, amount, format!("-{amount:.0}"))
        }
    }
}

/// Events produced by the game world.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    Spawned { id: u64, kind: EntityKind },
    Combat(CombatEvent),
    /// `by` is `None` when the killer is gone or unknown.
    Defeated { id: u64, by: Option<u64> },
    ScoreChanged { score: u64 },
    LevelUp { id: u64, level: u32 },
    AbilityUsed { caster: u64, target: u64, ability: String },
    GameOver { score: u64 },
    EntityRemoved { id: u64 },
}

// ---------------------------------------------------------------------------
// Spawning helpers (shared with the spawning systems)
// ---------------------------------------------------------------------------

/// Spawn `bundle` with a fresh `EntityId` and `kind`, index it, and emit `Spawned`.
pub fn spawn_tracked(world: &mut World, kind: EntityKind, bundle: impl Bundle) -> u64 {
    let id = world.resource::<EntityIdAllocator>().allocate();
    let entity = world.spawn((EntityId(id), kind, bundle)).id();
    world.resource_mut::<EntityIndex>().0.insert(id, entity);
    world
        .resource_mut::<OutgoingEvents>()
        .events
        .push(GameEvent::Spawned { id, kind });
    id
}

pub fn spawn_grunt_in(world: &mut World, position: Vec3, combat: &CombatConfig) -> u64 {
    let stats = Stats::default();
    spawn_tracked(
        world,
        EntityKind::Grunt,
        (
            Position(position),
            Velocity::default(),
            CharacterState::Stand,
            OnGround(false),
            Faction::Enemy,
            Health(stats.structure),
            stats,
            LastDamageTick::default(),
            Bounty {
                score: combat.default_bounty_score,
                xp: combat.default_bounty_xp,
            },
            Brain::Grunt(GruntBrain::default()),
        ),
    )
}

pub fn spawn_collectible_in(world: &mut World, position: Vec3, collectible: Collectible) -> u64 {
    spawn_tracked(
        world,
        EntityKind::Collectible,
        (Position(position), collectible),
    )
}

// ---------------------------------------------------------------------------
// GameWorld
// ---------------------------------------------------------------------------

/// The simulation: entity store plus everything a tick needs.
pub struct GameWorld {
    pub world: World,
    config: SimConfig,
    rng: StdRng,
    clock: Box<dyn Clock>,
    abilities: AbilityRegistry,
}

impl GameWorld {
    /// Create a world whose cooldowns follow the system clock.
    pub fn new(config: SimConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Create a world whose cooldowns follow `clock`.
    pub fn with_clock(config: SimConfig, clock: impl Clock + 'static) -> Self {
        let mut world = World::new();
        world.insert_resource(OutgoingEvents::default());
        world.insert_resource(TickCounter::default());
        world.insert_resource(EntityIdAllocator::new(1));
        world.insert_resource(EntityIndex::default());
        world.insert_resource(PendingRemovals::default());
        world.insert_resource(CameraFocus::default());
        world.insert_resource(Score::default());
        world.insert_resource(Session::default());
        world.insert_resource(CrowdCoordinator::new(config.ai.separation_radius));

        Self {
            world,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            clock: Box::new(clock),
            abilities: AbilityRegistry::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn abilities(&self) -> &AbilityRegistry {
        &self.abilities
    }

    pub fn abilities_mut(&mut self) -> &mut AbilityRegistry {
        &mut self.abilities
    }

    /// Run one tick: camera → physics → AI → combat → cooldowns → progression →
    /// spawning, then apply queued removals. Does nothing once the game is over.
    pub fn tick(&mut self, delta: f32) {
        if self.is_game_over() {
            return;
        }
        let dt = physics::clamp_delta(delta, self.config.physics.max_delta);
        self.world.resource_mut::<TickCounter>().0 += 1;

        if self.config.physics.camera_follows_player {
            system_camera_follow(&mut self.world);
        }
        let camera_x = self.camera_x();

        physics::system_physics(&mut self.world, &self.config.physics, dt);
        physics::system_cleanup_platforms(
            &mut self.world,
            camera_x,
            self.config.physics.cleanup_threshold,
        );
        system_ai_tick(&mut self.world, &mut self.rng, dt);
        combat::system_combat(&mut self.world, &mut self.rng, &self.config);

        if !self.is_game_over() {
            let now = self.clock.now_ms();
            ability::system_update_cooldowns(&mut self.world, now);
            ability::system_regenerate_energy(&mut self.world, dt);
            progression::system_update_progression(&mut self.world);
            spawning::system_spawn_ahead(&mut self.world, &mut self.rng, &self.config);
            spawning::system_despawn_behind(
                &mut self.world,
                camera_x,
                self.config.spawn.despawn_behind,
            );
        }

        self.flush_removals();
    }

    /// Despawn everything queued on `PendingRemovals`. Returns how many entities
    /// were removed.
    pub fn flush_removals(&mut self) -> usize {
        let mut pending = self.world.resource_mut::<PendingRemovals>().take();
        pending.sort();
        pending.dedup();

        let mut events = Vec::new();
        for &entity in &pending {
            if !self.world.entities().contains(entity) {
                continue;
            }
            let id = self.world.get::<EntityId>(entity).map(|e| e.0);
            self.world.despawn(entity);
            if let Some(id) = id {
                self.world.resource_mut::<EntityIndex>().0.remove(&id);
                self.world.resource_mut::<CrowdCoordinator>().remove_agent(id);
                events.push(GameEvent::EntityRemoved { id });
            }
        }

        let removed = events.len();
        self.world.resource_mut::<OutgoingEvents>().events.extend(events);
        removed
    }

    /// Drain all pending outgoing events.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.world.resource_mut::<OutgoingEvents>().events)
    }

    pub fn current_tick(&self) -> u64 {
        self.world.resource::<TickCounter>().0
    }

    pub fn score(&self) -> u64 {
        self.world.resource::<Score>().0
    }

    pub fn is_game_over(&self) -> bool {
        self.world.resource::<Session>().game_over
    }

    pub fn camera_x(&self) -> f32 {
        self.world.resource::<CameraFocus>().x
    }

    pub fn set_camera_x(&mut self, x: f32) {
        self.world.resource_mut::<CameraFocus>().x = x;
    }

    /// Bevy entity for a stable id.
    pub fn entity(&self, id: u64) -> Option<Entity> {
        self.world.resource::<EntityIndex>().0.get(&id).copied()
    }

    fn require(&self, id: u64) -> Result<Entity, SimError> {
        self.entity(id).ok_or(SimError::UnknownEntity(id))
    }

    /// Number of live entities of `kind`.
    pub fn count(&mut self, kind: EntityKind) -> usize {
        let mut q = self.world.query::<&EntityKind>();
        q.iter(&self.world).filter(|k| **k == kind).count()
    }

    // -- Spawning ----------------------------------------------------------

    /// Spawn the player. Its max health comes from default stats.
    pub fn spawn_player(&mut self, position: Vec3) -> u64 {
        let stats = Stats::default();
        spawn_tracked(
            &mut self.world,
            EntityKind::Player,
            (
                Position(position),
                Velocity::default(),
                CharacterState::Stand,
                OnGround(false),
                Faction::Player,
                Health(stats.structure),
                stats,
                Level::default(),
                Cooldowns::default(),
                Energy {
                    current: 100.0,
                    max: 100.0,
                },
                LastDamageTick::default(),
            ),
        )
    }

    pub fn spawn_ally(&mut self, position: Vec3) -> u64 {
        let stats = Stats::default();
        spawn_tracked(
            &mut self.world,
            EntityKind::Ally,
            (
                Position(position),
                Velocity::default(),
                CharacterState::Stand,
                OnGround(false),
                Faction::Ally,
                Health(stats.structure),
                stats,
                Level::default(),
                Cooldowns::default(),
                LastDamageTick::default(),
            ),
        )
    }

    pub fn spawn_grunt(&mut self, position: Vec3) -> u64 {
        spawn_grunt_in(&mut self.world, position, &self.config.combat)
    }

    pub fn spawn_boss(&mut self, position: Vec3) -> u64 {
        let stats = Stats {
            structure: 500.0,
            ignition: 15.0,
            logic: 20.0,
            flow: 5.0,
        };
        spawn_tracked(
            &mut self.world,
            EntityKind::Boss,
            (
                Position(position),
                Velocity::default(),
                CharacterState::Run,
                Faction::Enemy,
                Health(stats.structure),
                stats,
                LastDamageTick::default(),
                Bounty { score: 1_000, xp: 400 },
                Brain::Boss(BossBrain::default()),
                Flying,
            ),
        )
    }

    /// Spawn one tentacle orbiting `anchor`, starting at `angle` radians.
    pub fn spawn_tentacle(&mut self, anchor: Vec3, patrol_radius: f32, angle: f32) -> u64 {
        let brain = TentacleBrain::new(anchor, patrol_radius, angle);
        let start = anchor + Vec3::new(angle.cos(), 0.0, angle.sin()) * patrol_radius;
        let stats = Stats {
            structure: 40.0,
            ignition: 5.0,
            logic: 5.0,
            flow: 0.0,
        };
        spawn_tracked(
            &mut self.world,
            EntityKind::Tentacle,
            (
                Position(start),
                Velocity::default(),
                CharacterState::Run,
                Faction::Enemy,
                Health(stats.structure),
                stats,
                LastDamageTick::default(),
                Bounty { score: 50, xp: 20 },
                Brain::Tentacle(brain),
                Flying,
            ),
        )
    }

    /// Spawn `count` tentacles evenly spaced around `anchor`.
    pub fn spawn_tentacle_swarm(&mut self, anchor: Vec3, count: usize, patrol_radius: f32) -> Vec<u64> {
        (0..count)
            .map(|i| {
                let angle = std::f32::consts::TAU * i as f32 / count as f32;
                self.spawn_tentacle(anchor, patrol_radius, angle)
            })
            .collect()
    }

    /// Spawn a static platform whose walkable surface starts at `origin`.
    pub fn spawn_platform(&mut self, origin: Vec3, data: PlatformData) -> Result<u64, SimError> {
        if !(data.length.is_finite() && data.length > 0.0) {
            return Err(SimError::InvalidPlatform(data.length));
        }
        Ok(spawn_tracked(
            &mut self.world,
            EntityKind::Platform,
            (Position(origin), data),
        ))
    }

    pub fn spawn_obstacle(&mut self, position: Vec3, kind: ObstacleType) -> u64 {
        spawn_tracked(
            &mut self.world,
            EntityKind::Obstacle,
            (Position(position), kind),
        )
    }

    pub fn spawn_collectible(&mut self, position: Vec3, collectible: Collectible) -> u64 {
        spawn_collectible_in(&mut self.world, position, collectible)
    }

    /// Queue an entity for removal at the end of the next tick.
    pub fn despawn(&mut self, id: u64) -> Result<(), SimError> {
        let entity = self.require(id)?;
        self.world.resource_mut::<PendingRemovals>().push(entity);
        Ok(())
    }

    // -- Intents and queries -----------------------------------------------

    pub fn set_velocity(&mut self, id: u64, velocity: Vec3) -> Result<(), SimError> {
        let entity = self.require(id)?;
        let mut vel = self
            .world
            .get_mut::<Velocity>(entity)
            .ok_or(SimError::MissingComponent(id, "Velocity"))?;
        vel.0 = velocity;
        Ok(())
    }

    pub fn set_state(&mut self, id: u64, state: CharacterState) -> Result<(), SimError> {
        let entity = self.require(id)?;
        let mut current = self
            .world
            .get_mut::<CharacterState>(entity)
            .ok_or(SimError::MissingComponent(id, "CharacterState"))?;
        *current = state;
        Ok(())
    }

    pub fn position(&self, id: u64) -> Option<Vec3> {
        self.world.get::<Position>(self.entity(id)?).map(|p| p.0)
    }

    pub fn velocity(&self, id: u64) -> Option<Vec3> {
        self.world.get::<Velocity>(self.entity(id)?).map(|v| v.0)
    }

    pub fn state(&self, id: u64) -> Option<CharacterState> {
        self.world.get::<CharacterState>(self.entity(id)?).copied()
    }

    pub fn health(&self, id: u64) -> Option<f32> {
        self.world.get::<Health>(self.entity(id)?).map(|h| h.0)
    }

    pub fn level(&self, id: u64) -> Option<Level> {
        self.world.get::<Level>(self.entity(id)?).copied()
    }

    pub fn is_grounded(&self, id: u64) -> bool {
        self.entity(id)
            .and_then(|e| self.world.get::<OnGround>(e))
            .is_some_and(|g| g.0)
    }

    // -- Progression -------------------------------------------------------

    /// Add XP (scaled by the configured multiplier). Levels are reconciled on the
    /// next tick.
    pub fn award_xp(&mut self, id: u64, amount: u64) -> Result<(), SimError> {
        let entity = self.require(id)?;
        let multiplier = self.config.progression.xp_multiplier;
        let mut level = self
            .world
            .get_mut::<Level>(entity)
            .ok_or(SimError::MissingComponent(id, "Level"))?;
        progression::award_xp(&mut level, amount, multiplier);
        Ok(())
    }

    pub fn spend_stat_point(&mut self, id: u64, kind: StatKind) -> Result<(), SimError> {
        let entity = self.require(id)?;
        let mut query = self.world.query::<(&mut Level, &mut Stats)>();
        let (mut level, mut stats) = query
            .get_mut(&mut self.world, entity)
            .map_err(|_| SimError::MissingComponent(id, "Level/Stats"))?;
        progression::spend_stat_point(&mut level, &mut stats, kind)
    }

    // -- Abilities ---------------------------------------------------------

    /// Cast `ability_id` from `caster` on `target`: check the cooldown, execute,
    /// then start the cooldown. Nothing changes when it fails.
    pub fn use_ability(
        &mut self,
        caster: u64,
        target: u64,
        ability_id: &str,
    ) -> Result<AbilityEffect, SimError> {
        let ability = self
            .abilities
            .get(ability_id)
            .cloned()
            .ok_or_else(|| AbilityError::UnknownAbility(ability_id.to_string()))?;
        let caster_entity = self.require(caster)?;
        let target_entity = self.require(target)?;
        let now = self.clock.now_ms();

        let cooldowns = self
            .world
            .get::<Cooldowns>(caster_entity)
            .map(|c| c.0.clone())
            .unwrap_or_default();
        let mut energy = self.world.get::<Energy>(caster_entity).copied();
        let mut health = self.world.get::<Health>(target_entity).copied();
        let stats = self.world.get::<Stats>(target_entity).copied();

        let effect = ability::execute_ability(
            Caster {
                cooldowns: &cooldowns,
                energy: energy.as_mut(),
            },
            Target {
                health: health.as_mut(),
                stats: stats.as_ref(),
            },
            &ability,
            now,
        )?;

        if let (Some(value), Some(mut stored)) = (energy, self.world.get_mut::<Energy>(caster_entity)) {
            *stored = value;
        }
        if let (Some(value), Some(mut stored)) = (health, self.world.get_mut::<Health>(target_entity)) {
            *stored = value;
        }

        let cooldown = ability::apply_cooldown(&ability, now);
        match self.world.get_mut::<Cooldowns>(caster_entity) {
            Some(mut cooldowns) => ability::insert_cooldown(&mut cooldowns.0, cooldown),
            None => {
                self.world
                    .entity_mut(caster_entity)
                    .insert(Cooldowns(vec![cooldown]));
            }
        }

        let text = match effect.effect_type {
            EffectType::Damage => {
                if caster != target {
                    self.world.entity_mut(target_entity).insert(LastHitBy(caster));
                }
                CombatEvent::damage(target, effect.amount, false)
            }
            EffectType::Heal => CombatEvent::new(
                CombatEventKind::Heal,
                target,
                effect.amount,
                format!("+{:.0}", effect.amount),
            ),
        };

        debug!("Entity {} used {} on {}", caster, ability.id, target);
        let mut events = self.world.resource_mut::<OutgoingEvents>();
        events.events.push(GameEvent::AbilityUsed {
            caster,
            target,
            ability: ability.id,
        });
        events.events.push(GameEvent::Combat(text));

        Ok(effect)
    }

    /// Milliseconds before `ability_id` is usable again by `id`.
    pub fn cooldown_remaining(&self, id: u64, ability_id: &str) -> u64 {
        let now = self.clock.now_ms();
        self.entity(id)
            .and_then(|e| self.world.get::<Cooldowns>(e))
            .map(|c| ability::remaining_cooldown(c.find(ability_id), now))
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Systems (manual, called by GameWorld::tick)
// ---------------------------------------------------------------------------

/// Center the camera on the player with the lowest id.
fn system_camera_follow(world: &mut World) {
    let player_x = {
        let mut q = world.query::<(&EntityId, &Position, &Faction)>();
        q.iter(world)
            .filter(|(_, _, faction)| **faction == Faction::Player)
            .min_by_key(|(id, _, _)| id.0)
            .map(|(_, pos, _)| pos.0.x)
    };
    if let Some(x) = player_x {
        world.resource_mut::<CameraFocus>().x = x;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
