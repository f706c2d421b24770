//! Combat: damage and critical-hit formula, proximity boxes, and the per-tick
//! melee/pickup/obstacle resolver.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use tracing::debug;

use crate::components::*;
use crate::config::SimConfig;
use crate::game_world::{
    CombatEvent, CombatEventKind, GameEvent, OutgoingEvents, PendingRemovals, Score, Session,
    TickCounter,
};
use crate::progression;

// ---------------------------------------------------------------------------
// Damage formula
// ---------------------------------------------------------------------------

/// Critical hit damage multiplier.
pub const CRITICAL_MULTIPLIER: f32 = 1.5;

/// Crit chance before `flow` is added.
pub const BASE_CRITICAL_CHANCE: f32 = 0.05;

/// Crit chance gained per point of `flow`.
pub const CRITICAL_CHANCE_PER_FLOW: f32 = 0.01;

pub const MAX_CRITICAL_CHANCE: f32 = 0.5;

/// Fraction of melee damage that gets through a block.
pub const BLOCK_FACTOR: f32 = 0.5;

/// Outcome of one melee exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatResult {
    pub damage: f32,
    pub critical: bool,
}

/// Chance in `[0, 0.5]` that `attacker` lands a critical hit.
pub fn critical_chance(attacker: &Stats) -> f32 {
    (BASE_CRITICAL_CHANCE + CRITICAL_CHANCE_PER_FLOW * attacker.flow).clamp(0.0, MAX_CRITICAL_CHANCE)
}

/// Resolve one hit. `roll` is uniform in `[0, 1)`.
///
/// Pipeline: base + 2 × ignition − ½ × defender logic (at least 1) → ×critical → round.
pub fn resolve_combat(attacker: &Stats, defender: &Stats, base_damage: f32, roll: f32) -> CombatResult {
    let power = base_damage + 2.0 * attacker.ignition;
    let mut damage = (power - 0.5 * defender.logic).max(1.0);

    let critical = roll < critical_chance(attacker);
    if critical {
        damage *= CRITICAL_MULTIPLIER;
    }

    CombatResult {
        damage: damage.round(),
        critical,
    }
}

/// Damage after the defender's stance is taken into account.
pub fn apply_block(damage: f32, defender_state: CharacterState) -> f32 {
    if defender_state == CharacterState::Block {
        damage * BLOCK_FACTOR
    } else {
        damage
    }
}

// ---------------------------------------------------------------------------
// Proximity
// ---------------------------------------------------------------------------

/// Per-axis melee reach: wide on x, tall on y, tight on depth.
pub const MELEE_REACH: Vec3 = Vec3::new(1.5, 2.0, 1.0);

/// Per-axis pickup reach for collectibles.
pub const PICKUP_REACH: Vec3 = Vec3::new(1.0, 2.0, 1.0);

/// Player body height while upright.
pub const PLAYER_HEIGHT: f32 = 1.8;

/// Player body height while sliding.
pub const SLIDE_HEIGHT: f32 = 0.9;

/// Horizontal half-extent of an obstacle along x.
pub const OBSTACLE_HALF_LENGTH: f32 = 0.75;

/// Half-extent of an obstacle along z.
pub const OBSTACLE_HALF_DEPTH: f32 = 1.0;

/// True if every axis of `a - b` is strictly inside `reach`.
pub fn within_box(a: Vec3, b: Vec3, reach: Vec3) -> bool {
    let d = (a - b).abs();
    d.x < reach.x && d.y < reach.y && d.z < reach.z
}

/// Vertical band `[bottom, top]` covered by an obstacle standing at `base_y`.
pub fn obstacle_band(kind: ObstacleType, base_y: f32) -> (f32, f32) {
    match kind {
        ObstacleType::Low => (base_y, base_y + 1.0),
        ObstacleType::High => (base_y + 1.4, base_y + 3.0),
    }
}

/// True if a player at `player` in `state` runs into the obstacle.
pub fn hits_obstacle(player: Vec3, state: CharacterState, obstacle: Vec3, kind: ObstacleType) -> bool {
    if (player.x - obstacle.x).abs() >= OBSTACLE_HALF_LENGTH
        || (player.z - obstacle.z).abs() >= OBSTACLE_HALF_DEPTH
    {
        return false;
    }
    let height = if state == CharacterState::Slide {
        SLIDE_HEIGHT
    } else {
        PLAYER_HEIGHT
    };
    let (bottom, top) = obstacle_band(kind, obstacle.y);
    player.y < top && player.y + height > bottom
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Per-pass copy of everything that can hit or be hit.
struct Combatant {
    entity: Entity,
    id: u64,
    position: Vec3,
    faction: Faction,
    state: CharacterState,
    stats: Stats,
    health: Option<f32>,
    last_damage: Option<u64>,
    last_hit_by: Option<u64>,
    bounty: Bounty,
    hit: bool,
    defeated: bool,
}

impl Combatant {
    fn is_attacking(&self) -> bool {
        self.faction.attacks_enemies()
            && (self.state == CharacterState::Attack
                || (self.faction == Faction::Player && self.state == CharacterState::Sprint))
    }

    fn can_be_hit(&self, tick: u64, window: u64) -> bool {
        !self.defeated
            && self
                .last_damage
                .map_or(true, |last| tick.saturating_sub(last) >= window)
    }

    /// Apply `damage`. Returns `true` if this hit is lethal; entities without
    /// health are defeated by any hit.
    fn take_hit(&mut self, damage: f32, tick: u64) -> bool {
        self.last_damage = Some(tick);
        self.hit = true;
        match &mut self.health {
            Some(health) => {
                *health -= damage;
                *health <= 0.0
            }
            None => true,
        }
    }
}

/// Everything a pass produces, applied once the scan is over.
#[derive(Default)]
struct PassOutput {
    events: Vec<GameEvent>,
    removals: Vec<Entity>,
    xp_awards: Vec<(Entity, u64)>,
    score_gain: u64,
}

impl PassOutput {
    /// Queue `defender` for removal and hand its bounty to `by`, if known.
    ///
    /// An enemy that dies with no known killer is removed without paying out.
    fn defeat(&mut self, defender: &Combatant, by: Option<(Entity, u64)>) {
        debug!("Entity {} defeated by {:?}", defender.id, by.map(|(_, id)| id));
        self.removals.push(defender.entity);
        self.events.push(GameEvent::Defeated {
            id: defender.id,
            by: by.map(|(_, id)| id),
        });
        if let Some((entity, id)) = by {
            self.score_gain += defender.bounty.score;
            self.xp_awards.push((entity, defender.bounty.xp));
            self.events.push(GameEvent::Combat(CombatEvent::new(
                CombatEventKind::Xp,
                id,
                defender.bounty.xp as f32,
                format!("+{} XP", defender.bounty.xp),
            )));
        }
    }

    /// Queue a fallen ally for removal. Allies carry no bounty.
    fn fall(&mut self, ally: &Combatant, by: Option<u64>) {
        debug!("Ally {} fell to {:?}", ally.id, by);
        self.removals.push(ally.entity);
        self.events.push(GameEvent::Defeated { id: ally.id, by });
    }
}

/// Resolve melee, pickups, and obstacle hits for one tick.
///
/// Every removal is queued on `PendingRemovals`. Once the player dies the pass
/// stops, the session is marked over, and later ticks skip this system.
pub fn system_combat<R: Rng>(world: &mut World, rng: &mut R, config: &SimConfig) {
    if world.resource::<Session>().game_over {
        return;
    }
    let tick = world.resource::<TickCounter>().0;
    let window = config.combat.invulnerability_ticks;
    let default_bounty = Bounty {
        score: config.combat.default_bounty_score,
        xp: config.combat.default_bounty_xp,
    };

    // Step 1: Snapshot combatants, ordered by id so rolls are reproducible
    let mut cs: Vec<Combatant> = {
        let mut q = world.query_filtered::<(
            Entity,
            &EntityId,
            &Position,
            &Faction,
            Option<&CharacterState>,
            Option<&Stats>,
            Option<&Health>,
            Option<&LastDamageTick>,
            Option<&LastHitBy>,
            Option<&Bounty>,
        ), Without<PlatformData>>();
        q.iter(world)
            .map(
                |(entity, id, pos, faction, state, stats, health, ldt, hit_by, bounty)| Combatant {
                    entity,
                    id: id.0,
                    position: pos.0,
                    faction: *faction,
                    state: state.copied().unwrap_or_default(),
                    stats: stats.copied().unwrap_or_default(),
                    health: health.map(|h| h.0),
                    last_damage: ldt.and_then(|l| l.0),
                    last_hit_by: hit_by.map(|h| h.0),
                    bounty: bounty.copied().unwrap_or(default_bounty),
                    hit: false,
                    defeated: false,
                },
            )
            .collect()
    };
    cs.sort_by_key(|c| c.id);

    let mut out = PassOutput::default();
    let mut game_over = false;

    // Step 2: Combatants already brought down by ability damage
    for d in 0..cs.len() {
        if !cs[d].health.is_some_and(|h| h <= 0.0) {
            continue;
        }
        match cs[d].faction {
            Faction::Player => {
                debug!("Player {} found at {:?} health", cs[d].id, cs[d].health);
                game_over = true;
            }
            Faction::Ally => {
                cs[d].defeated = true;
                out.fall(&cs[d], cs[d].last_hit_by);
            }
            Faction::Enemy => {
                let by = cs[d]
                    .last_hit_by
                    .and_then(|id| cs.iter().find(|c| c.id == id))
                    .map(|c| (c.entity, c.id));
                cs[d].defeated = true;
                out.defeat(&cs[d], by);
            }
            Faction::Neutral => {}
        }
    }

    // Step 3: Player and allies strike enemies
    for a in 0..cs.len() {
        if game_over {
            break;
        }
        if cs[a].defeated || !cs[a].is_attacking() {
            continue;
        }
        for d in 0..cs.len() {
            if a == d
                || cs[d].faction != Faction::Enemy
                || !cs[d].can_be_hit(tick, window)
                || !within_box(cs[a].position, cs[d].position, MELEE_REACH)
            {
                continue;
            }
            let result = resolve_combat(&cs[a].stats, &cs[d].stats, config.combat.base_damage, rng.gen());
            let damage = apply_block(result.damage, cs[d].state);
            let lethal = cs[d].take_hit(damage, tick);
            out.events
                .push(GameEvent::Combat(CombatEvent::damage(cs[d].id, damage, result.critical)));

            if lethal {
                cs[d].defeated = true;
                out.defeat(&cs[d], Some((cs[a].entity, cs[a].id)));
            }
        }
    }

    // Step 4: Enemies strike players that are not attacking
    'players: for p in 0..cs.len() {
        if game_over {
            break;
        }
        if cs[p].faction != Faction::Player || cs[p].is_attacking() {
            continue;
        }
        for e in 0..cs.len() {
            if !cs[p].can_be_hit(tick, window) {
                break;
            }
            if cs[e].faction != Faction::Enemy
                || cs[e].defeated
                || cs[e].state == CharacterState::Stun
                || !within_box(cs[p].position, cs[e].position, MELEE_REACH)
            {
                continue;
            }
            let result = resolve_combat(&cs[e].stats, &cs[p].stats, config.combat.base_damage, rng.gen());
            let damage = apply_block(result.damage, cs[p].state);
            let lethal = cs[p].take_hit(damage, tick);
            out.events
                .push(GameEvent::Combat(CombatEvent::damage(cs[p].id, damage, result.critical)));
            if lethal {
                game_over = true;
                break 'players;
            }
        }
    }

    // Step 5: Collectibles and obstacles
    if !game_over {
        let players: Vec<usize> = (0..cs.len())
            .filter(|&i| cs[i].faction == Faction::Player)
            .collect();

        let collectibles: Vec<(Entity, Vec3, Collectible)> = {
            let mut q = world.query::<(Entity, &Position, &Collectible)>();
            q.iter(world).map(|(e, pos, c)| (e, pos.0, *c)).collect()
        };
        for (entity, position, collectible) in collectibles {
            let Some(&p) = players
                .iter()
                .find(|&&p| within_box(cs[p].position, position, PICKUP_REACH))
            else {
                continue;
            };
            out.removals.push(entity);
            out.score_gain += collectible.score;
            out.xp_awards.push((cs[p].entity, collectible.xp));
            out.events.push(GameEvent::Combat(CombatEvent::new(
                CombatEventKind::Item,
                cs[p].id,
                collectible.score as f32,
                format!("+{}", collectible.score),
            )));
        }

        let obstacles: Vec<(Entity, Vec3, ObstacleType)> = {
            let mut q = world.query::<(Entity, &Position, &ObstacleType)>();
            q.iter(world).map(|(e, pos, kind)| (e, pos.0, *kind)).collect()
        };
        'obstacles: for (entity, position, kind) in obstacles {
            let Some(&p) = players
                .iter()
                .find(|&&p| hits_obstacle(cs[p].position, cs[p].state, position, kind))
            else {
                continue;
            };
            out.removals.push(entity);
            let damage = config.combat.obstacle_damage;
            let lethal = cs[p].take_hit(damage, tick);
            out.events
                .push(GameEvent::Combat(CombatEvent::damage(cs[p].id, damage, false)));
            if lethal {
                game_over = true;
                break 'obstacles;
            }
        }
    }

    // Step 6: Apply results to ECS state
    for c in cs.iter().filter(|c| c.hit) {
        if let (Some(value), Some(mut health)) = (c.health, world.get_mut::<Health>(c.entity)) {
            health.0 = value;
        }
        if let Some(mut ldt) = world.get_mut::<LastDamageTick>(c.entity) {
            ldt.0 = c.last_damage;
        }
    }

    for (entity, xp) in out.xp_awards {
        if let Some(mut level) = world.get_mut::<Level>(entity) {
            progression::award_xp(&mut level, xp, config.progression.xp_multiplier);
        }
    }

    let score = {
        let mut score = world.resource_mut::<Score>();
        score.0 += out.score_gain;
        score.0
    };
    if out.score_gain > 0 {
        out.events.push(GameEvent::ScoreChanged { score });
    }

    if game_over {
        debug!("Player defeated at tick {} with score {}", tick, score);
        world.resource_mut::<Session>().game_over = true;
        out.events.push(GameEvent::GameOver { score });
    }

    world.resource_mut::<PendingRemovals>().extend(out.removals);
    world.resource_mut::<OutgoingEvents>().events.extend(out.events);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
