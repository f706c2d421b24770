//! Ability execution and wall-clock cooldowns.
//!
//! Execution and cooldown application are separate steps: [`execute_ability`] only
//! checks the cooldown list and applies the effect, [`apply_cooldown`] produces the
//! entry the caller stores afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bevy_ecs::prelude::*;
use serde::Deserialize;

use crate::components::{Cooldown, Cooldowns, Energy, Health, Stats};
use crate::error::AbilityError;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of wall-clock milliseconds for cooldowns.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

// ---------------------------------------------------------------------------
// Abilities
// ---------------------------------------------------------------------------

/// What an ability does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectType {
    Damage,
    Heal,
}

/// Definition of a castable ability.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Ability {
    pub id: String,
    pub cost: f32,
    pub cooldown_ms: u64,
    pub effect_type: EffectType,
    pub effect_value: f32,
}

/// Applied effect of a successful execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityEffect {
    pub effect_type: EffectType,
    /// Health actually added (heal) or removed (damage).
    pub amount: f32,
    pub target_health: f32,
}

/// The caster-side inputs of an execution.
pub struct Caster<'a> {
    pub cooldowns: &'a [Cooldown],
    pub energy: Option<&'a mut Energy>,
}

/// The target-side inputs of an execution.
pub struct Target<'a> {
    pub health: Option<&'a mut Health>,
    pub stats: Option<&'a Stats>,
}

/// Execute `ability` from `caster` on `target` at wall-clock time `now`.
///
/// Fails without spending or applying anything if the ability is on cooldown, the
/// caster lacks energy, or the target has no health. Damage is not floored at zero;
/// heals are clamped to the target's max health.
pub fn execute_ability(
    caster: Caster<'_>,
    target: Target<'_>,
    ability: &Ability,
    now: u64,
) -> Result<AbilityEffect, AbilityError> {
    let entry = caster
        .cooldowns
        .iter()
        .find(|c| c.ability_id == ability.id);
    if is_on_cooldown(entry, now) {
        return Err(AbilityError::OnCooldown);
    }

    if let Some(energy) = &caster.energy {
        if energy.current < ability.cost {
            return Err(AbilityError::InsufficientEnergy {
                needed: ability.cost,
                available: energy.current,
            });
        }
    }

    let health = target.health.ok_or(AbilityError::TargetHasNoHealth)?;

    if let Some(energy) = caster.energy {
        energy.current -= ability.cost;
    }

    let before = health.0;
    match ability.effect_type {
        EffectType::Damage => {
            health.0 -= ability.effect_value;
        }
        EffectType::Heal => {
            let max = target.stats.copied().unwrap_or_default().structure;
            health.0 = (health.0 + ability.effect_value).min(max.max(before));
        }
    }

    Ok(AbilityEffect {
        effect_type: ability.effect_type,
        amount: (health.0 - before).abs(),
        target_health: health.0,
    })
}

/// Cooldown entry for `ability` started at `now`.
pub fn apply_cooldown(ability: &Ability, now: u64) -> Cooldown {
    Cooldown {
        ability_id: ability.id.clone(),
        ends_at: now.saturating_add(ability.cooldown_ms),
    }
}

/// Store `cooldown`, replacing any existing entry for the same ability.
pub fn insert_cooldown(cooldowns: &mut Vec<Cooldown>, cooldown: Cooldown) {
    cooldowns.retain(|c| c.ability_id != cooldown.ability_id);
    cooldowns.push(cooldown);
}

/// Drop entries that expired before `now`.
pub fn update_cooldowns(cooldowns: &mut Vec<Cooldown>, now: u64) {
    cooldowns.retain(|c| now <= c.ends_at);
}

/// `None` counts as not on cooldown.
pub fn is_on_cooldown(entry: Option<&Cooldown>, now: u64) -> bool {
    entry.is_some_and(|c| now < c.ends_at)
}

/// Milliseconds until `entry` expires; zero when absent or already expired.
pub fn remaining_cooldown(entry: Option<&Cooldown>, now: u64) -> u64 {
    entry.map(|c| c.ends_at.saturating_sub(now)).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Known abilities, looked up by id.
#[derive(Debug, Clone)]
pub struct AbilityRegistry {
    abilities: Vec<Ability>,
}

impl Default for AbilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityRegistry {
    /// Registry with the built-in abilities.
    pub fn new() -> Self {
        Self {
            abilities: vec![
                Ability {
                    id: "ignition_strike".into(),
                    cost: 20.0,
                    cooldown_ms: 2_000,
                    effect_type: EffectType::Damage,
                    effect_value: 35.0,
                },
                Ability {
                    id: "logic_spike".into(),
                    cost: 35.0,
                    cooldown_ms: 6_000,
                    effect_type: EffectType::Damage,
                    effect_value: 60.0,
                },
                Ability {
                    id: "flow_mend".into(),
                    cost: 25.0,
                    cooldown_ms: 5_000,
                    effect_type: EffectType::Heal,
                    effect_value: 30.0,
                },
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&Ability> {
        self.abilities.iter().find(|a| a.id == id)
    }

    /// Add or replace an ability definition.
    pub fn register(&mut self, ability: Ability) {
        self.abilities.retain(|a| a.id != ability.id);
        self.abilities.push(ability);
    }

    pub fn all(&self) -> &[Ability] {
        &self.abilities
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Energy regained per second by every caster.
pub const ENERGY_REGEN_PER_SECOND: f32 = 5.0;

/// Prune expired cooldowns on every caster.
pub fn system_update_cooldowns(world: &mut World, now: u64) {
    let mut query = world.query::<&mut Cooldowns>();
    for mut cooldowns in query.iter_mut(world) {
        if !cooldowns.0.is_empty() {
            update_cooldowns(&mut cooldowns.0, now);
        }
    }
}

/// Refill every `Energy` pool toward its max.
pub fn system_regenerate_energy(world: &mut World, dt: f32) {
    let mut query = world.query::<&mut Energy>();
    for mut energy in query.iter_mut(world) {
        if energy.current < energy.max {
            energy.current = (energy.current + ENERGY_REGEN_PER_SECOND * dt).min(energy.max);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn strike() -> Ability {
        Ability {
            id: "strike".into(),
            cost: 10.0,
            cooldown_ms: 1_000,
            effect_type: EffectType::Damage,
            effect_value: 25.0,
        }
    }

    fn mend(value: f32) -> Ability {
        Ability {
            id: "mend".into(),
            cost: 0.0,
            cooldown_ms: 500,
            effect_type: EffectType::Heal,
            effect_value: value,
        }
    }

    fn cast(
        cooldowns: &[Cooldown],
        health: &mut Health,
        stats: Option<&Stats>,
        ability: &Ability,
        now: u64,
    ) -> Result<AbilityEffect, AbilityError> {
        execute_ability(
            Caster {
                cooldowns,
                energy: None,
            },
            Target {
                health: Some(health),
                stats,
            },
            ability,
            now,
        )
    }

    #[test]
    fn damage_subtracts_without_floor() {
        let mut health = Health(10.0);
        let effect = cast(&[], &mut health, None, &strike(), 0).unwrap();
        assert!((health.0 + 15.0).abs() < 0.001);
        assert!((effect.amount - 25.0).abs() < 0.001);
        assert_eq!(effect.effect_type, EffectType::Damage);
    }

    #[test]
    fn heal_clamped_to_structure() {
        let mut health = Health(90.0);
        let stats = Stats {
            structure: 100.0,
            ..Stats::default()
        };
        let effect = cast(&[], &mut health, Some(&stats), &mend(100.0), 0).unwrap();
        assert!((health.0 - 100.0).abs() < 0.001);
        assert!((effect.amount - 10.0).abs() < 0.001);
    }

    #[test]
    fn cooldown_blocks_then_expires() {
        let ability = strike();
        let mut cooldowns = Vec::new();
        let mut health = Health(100.0);

        cast(&cooldowns, &mut health, None, &ability, 1_000).unwrap();
        insert_cooldown(&mut cooldowns, apply_cooldown(&ability, 1_000));

        let err = cast(&cooldowns, &mut health, None, &ability, 1_000).unwrap_err();
        assert_eq!(err, AbilityError::OnCooldown);
        assert_eq!(err.to_string(), "Ability is on cooldown");
        assert!((health.0 - 75.0).abs() < 0.001, "failed cast must not apply");

        cast(&cooldowns, &mut health, None, &ability, 2_001).unwrap();
        assert!((health.0 - 50.0).abs() < 0.001);
    }

    #[test]
    fn execution_does_not_add_cooldown() {
        let cooldowns: Vec<Cooldown> = Vec::new();
        let mut health = Health(100.0);
        cast(&cooldowns, &mut health, None, &strike(), 0).unwrap();
        assert!(cooldowns.is_empty());
    }

    #[test]
    fn energy_spent_only_on_success() {
        let ability = strike();
        let mut energy = Energy {
            current: 15.0,
            max: 100.0,
        };
        let mut health = Health(100.0);
        execute_ability(
            Caster {
                cooldowns: &[],
                energy: Some(&mut energy),
            },
            Target {
                health: Some(&mut health),
                stats: None,
            },
            &ability,
            0,
        )
        .unwrap();
        assert!((energy.current - 5.0).abs() < 0.001);

        let err = execute_ability(
            Caster {
                cooldowns: &[],
                energy: Some(&mut energy),
            },
            Target {
                health: Some(&mut health),
                stats: None,
            },
            &ability,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, AbilityError::InsufficientEnergy { .. }));
        assert!((energy.current - 5.0).abs() < 0.001);
        assert!((health.0 - 75.0).abs() < 0.001);
    }

    #[test]
    fn target_without_health_fails() {
        let result = execute_ability(
            Caster {
                cooldowns: &[],
                energy: None,
            },
            Target {
                health: None,
                stats: None,
            },
            &strike(),
            0,
        );
        assert_eq!(result, Err(AbilityError::TargetHasNoHealth));
    }

    #[test]
    fn cooldown_queries() {
        let entry = Cooldown {
            ability_id: "strike".into(),
            ends_at: 5_000,
        };
        assert!(is_on_cooldown(Some(&entry), 4_999));
        assert!(!is_on_cooldown(Some(&entry), 5_000));
        assert!(!is_on_cooldown(None, 0));
        assert_eq!(remaining_cooldown(Some(&entry), 4_000), 1_000);
        assert_eq!(remaining_cooldown(Some(&entry), 6_000), 0);
        assert_eq!(remaining_cooldown(None, 6_000), 0);
    }

    #[test]
    fn update_filters_expired() {
        let mut cooldowns = vec![
            Cooldown {
                ability_id: "a".into(),
                ends_at: 100,
            },
            Cooldown {
                ability_id: "b".into(),
                ends_at: 300,
            },
        ];
        update_cooldowns(&mut cooldowns, 200);
        assert_eq!(cooldowns.len(), 1);
        assert_eq!(cooldowns[0].ability_id, "b");
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let ability = strike();
        let mut cooldowns = vec![apply_cooldown(&ability, 0)];
        insert_cooldown(&mut cooldowns, apply_cooldown(&ability, 500));
        assert_eq!(cooldowns.len(), 1);
        assert_eq!(cooldowns[0].ends_at, 1_500);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(100);
        assert_eq!(clock.now_ms(), 100);
    }

    #[test]
    fn energy_regenerates_to_max() {
        let mut world = World::new();
        let e = world
            .spawn(Energy {
                current: 98.0,
                max: 100.0,
            })
            .id();
        system_regenerate_energy(&mut world, 0.2);
        assert!((world.get::<Energy>(e).unwrap().current - 99.0).abs() < 0.001);
        system_regenerate_energy(&mut world, 10.0);
        assert!((world.get::<Energy>(e).unwrap().current - 100.0).abs() < 0.001);
    }

    #[test]
    fn system_prunes_cooldowns() {
        let mut world = World::new();
        let e = world
            .spawn(Cooldowns(vec![apply_cooldown(&strike(), 0)]))
            .id();
        system_update_cooldowns(&mut world, 1_000);
        assert_eq!(world.get::<Cooldowns>(e).unwrap().0.len(), 1);
        system_update_cooldowns(&mut world, 1_001);
        assert!(world.get::<Cooldowns>(e).unwrap().0.is_empty());
    }

    #[test]
    fn registry_lookup() {
        let mut registry = AbilityRegistry::new();
        assert!(registry.get("flow_mend").is_some());
        assert!(registry.get("nonexistent").is_none());
        let builtin = registry.all().len();
        registry.register(strike());
        assert_eq!(registry.get("strike").unwrap().cooldown_ms, 1_000);
        assert_eq!(registry.all().len(), builtin + 1);

        // Re-registering replaces instead of duplicating.
        registry.register(strike());
        assert_eq!(registry.all().len(), builtin + 1);
    }
}
