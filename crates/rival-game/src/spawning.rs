//! Spawning ahead of the camera and culling behind it.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;
use tracing::trace;

use crate::components::*;
use crate::config::SimConfig;
use crate::game_world::{self, CameraFocus, PendingRemovals, TickCounter};
use crate::physics;

/// Height at which collectibles float above the ground.
const COLLECTIBLE_HOVER: f32 = 1.0;

/// XP and score granted by a spawned collectible.
const SPAWNED_COLLECTIBLE: Collectible = Collectible { xp: 25, score: 50 };

/// Periodically spawn a grunt or a collectible `spawn.distance_ahead` units ahead of
/// the camera, standing on the highest platform there. Returns the new id.
pub fn system_spawn_ahead<R: Rng>(world: &mut World, rng: &mut R, config: &SimConfig) -> Option<u64> {
    let tick = world.resource::<TickCounter>().0;
    if tick == 0 || !tick.is_multiple_of(config.spawn.interval_ticks) {
        return None;
    }

    let enemies = {
        let mut q = world.query::<&Faction>();
        q.iter(world).filter(|f| **f == Faction::Enemy).count()
    };
    if enemies >= config.spawn.enemy_cap as usize {
        return None;
    }

    let x = world.resource::<CameraFocus>().x + config.spawn.distance_ahead;
    let platforms = physics::collect_platforms(world);
    let Some(ground) = physics::ground_height_at(&platforms, Vec3::new(x, 0.0, 0.0)) else {
        trace!("No platform under x {}, skipping spawn", x);
        return None;
    };

    let id = if rng.gen::<f32>() < config.spawn.collectible_chance {
        game_world::spawn_collectible_in(
            world,
            Vec3::new(x, ground + COLLECTIBLE_HOVER, 0.0),
            SPAWNED_COLLECTIBLE,
        )
    } else {
        game_world::spawn_grunt_in(world, Vec3::new(x, ground, 0.0), &config.combat)
    };
    Some(id)
}

/// Queue transient entities more than `distance` behind `camera_x` for removal.
/// Returns how many were queued.
pub fn system_despawn_behind(world: &mut World, camera_x: f32, distance: f32) -> usize {
    let behind: Vec<Entity> = {
        let mut q = world.query::<(Entity, &Position, &EntityKind)>();
        q.iter(world)
            .filter(|(_, pos, kind)| kind.is_transient() && pos.0.x < camera_x - distance)
            .map(|(entity, _, _)| entity)
            .collect()
    };
    let count = behind.len();
    if count > 0 {
        world.resource_mut::<PendingRemovals>().extend(behind);
    }
    count
}
