//! Progression: XP curve, level reconciliation, stat points.

use bevy_ecs::prelude::*;
use tracing::debug;

use crate::components::{EntityId, Health, Level, StatKind, Stats};
use crate::error::SimError;
use crate::game_world::{CombatEvent, CombatEventKind, GameEvent, OutgoingEvents};

/// Highest reachable level.
pub const MAX_LEVEL: u32 = 30;

/// Stat points granted per level gained.
pub const STAT_POINTS_PER_LEVEL: u32 = 3;

// ---------------------------------------------------------------------------
// XP formulas
// ---------------------------------------------------------------------------

/// XP needed to advance from `level` to `level + 1`: `floor(100 * level^1.5)`.
pub fn calculate_xp_required(level: u32) -> u64 {
    (100.0 * f64::from(level).powf(1.5)).floor() as u64
}

/// Add `amount * multiplier` XP. Negative or non-finite multipliers award nothing.
pub fn award_xp(level: &mut Level, amount: u64, multiplier: f32) {
    let scaled = amount as f64 * f64::from(multiplier);
    if scaled.is_finite() && scaled > 0.0 {
        level.xp = level.xp.saturating_add(scaled.round() as u64);
    }
}

/// Convert accumulated XP into levels. Returns the number of levels gained.
///
/// Handles several level-ups in one call. At [`MAX_LEVEL`] the XP is clamped to
/// `next_level_xp - 1` and nothing more is granted.
pub fn reconcile(level: &mut Level) -> u32 {
    let mut gained = 0;
    while level.xp >= level.next_level_xp && level.current < MAX_LEVEL {
        level.xp -= level.next_level_xp;
        level.current += 1;
        level.stat_points += STAT_POINTS_PER_LEVEL;
        level.next_level_xp = calculate_xp_required(level.current);
        gained += 1;
    }
    if level.current >= MAX_LEVEL && level.xp >= level.next_level_xp {
        level.xp = level.next_level_xp.saturating_sub(1);
    }
    gained
}

/// Progress within the current level (0.0 .. 1.0).
pub fn xp_progress(level: &Level) -> f32 {
    if level.next_level_xp == 0 {
        return 0.0;
    }
    (level.xp as f32 / level.next_level_xp as f32).clamp(0.0, 1.0)
}

/// Move one unspent stat point into `kind`. Raising structure raises max health only.
pub fn spend_stat_point(level: &mut Level, stats: &mut Stats, kind: StatKind) -> Result<(), SimError> {
    if level.stat_points == 0 {
        return Err(SimError::NoStatPoints);
    }
    level.stat_points -= 1;
    *stats.get_mut(kind) += 1.0;
    Ok(())
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Reconcile every entity with a `Level`, fully healing those that level up.
pub fn system_update_progression(world: &mut World) {
    let mut events = Vec::new();

    let mut query = world.query::<(&EntityId, &mut Level, Option<&Stats>, Option<&mut Health>)>();
    for (id, mut level, stats, health) in query.iter_mut(world) {
        if level.xp < level.next_level_xp {
            continue;
        }
        let gained = reconcile(&mut level);
        if gained == 0 {
            continue;
        }

        if let Some(mut health) = health {
            health.0 = stats.copied().unwrap_or_default().structure;
        }

        debug!("Entity {} reached level {}", id.0, level.current);
        events.push(GameEvent::LevelUp {
            id: id.0,
            level: level.current,
        });
        events.push(GameEvent::Combat(CombatEvent::new(
            CombatEventKind::Xp,
            id.0,
            level.current as f32,
            "LEVEL UP!".into(),
        )));
    }

    world.resource_mut::<OutgoingEvents>().events.extend(events);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
