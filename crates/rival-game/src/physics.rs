//! Platform physics: gravity, drag, integration, sloped ground snapping, and
//! trailing platform cleanup.

use bevy_ecs::prelude::*;
use glam::Vec3;
use tracing::trace;

use crate::components::*;
use crate::config::PhysicsConfig;
use crate::game_world::PendingRemovals;

/// Radians of tilt per slope unit (about 15 degrees).
pub const SLOPE_TO_RADIANS: f32 = 0.26;

/// How far outside a platform's span an entity may be and still be tested.
pub const BROAD_PHASE_MARGIN: f32 = 0.5;

/// Snap distance while jumping.
pub const LANDING_SNAP: f32 = 0.1;

/// Snap distance for every other state.
pub const WALKING_SNAP: f32 = 1.0;

/// Horizontal velocity multiplier per tick while standing or blocking.
pub const DRAG_FACTOR: f32 = 0.8;

/// Horizontal speeds below this are zeroed while drag applies.
pub const DRAG_EPSILON: f32 = 0.1;

/// Static collision segment as seen by the physics step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformShape {
    /// Left end of the walkable surface.
    pub origin: Vec3,
    pub data: PlatformData,
}

/// Clamp a frame delta into `[0, max_delta]`. Non-finite deltas become zero.
pub fn clamp_delta(delta: f32, max_delta: f32) -> f32 {
    if !delta.is_finite() || delta <= 0.0 {
        return 0.0;
    }
    delta.min(max_delta.max(0.0))
}

/// Surface height of `platform` under `at`, or `None` when `at` is outside it.
///
/// The local offset is clamped to the sloped span, so the 0.5 unit margin on either
/// end extends the end heights rather than the slope.
pub fn platform_ground_height(platform: &PlatformShape, at: Vec3) -> Option<f32> {
    let angle = platform.data.slope * SLOPE_TO_RADIANS;
    let span = (platform.data.length * angle.cos()).max(0.0);
    let dx = at.x - platform.origin.x;
    if dx < -BROAD_PHASE_MARGIN || dx > span + BROAD_PHASE_MARGIN {
        return None;
    }
    if platform.data.width > 0.0 && (at.z - platform.origin.z).abs() > platform.data.width / 2.0 {
        return None;
    }
    Some(platform.origin.y + dx.clamp(0.0, span) * angle.tan())
}

/// Highest surface among `platforms` under `at`.
pub fn ground_height_at(platforms: &[PlatformShape], at: Vec3) -> Option<f32> {
    platforms
        .iter()
        .filter_map(|p| platform_ground_height(p, at))
        .reduce(f32::max)
}

/// Kinematic inputs of one body for a single step.
#[derive(Debug, Clone, Copy)]
pub struct BodyStep {
    pub state: CharacterState,
    pub flying: bool,
    pub gravity: f32,
    pub dt: f32,
}

/// Advance one body by `step.dt`. Returns `true` when it ends up grounded.
///
/// A body lands when it is not rising, it started the step no further than
/// [`WALKING_SNAP`] below the surface, and it ends within the snap distance of its
/// state above it.
pub fn step_body(
    position: &mut Vec3,
    velocity: &mut Vec3,
    step: &BodyStep,
    platforms: &[PlatformShape],
) -> bool {
    if !step.flying {
        velocity.y += step.gravity * step.dt;
    }

    if step.state.applies_drag() {
        velocity.x *= DRAG_FACTOR;
        if velocity.x.abs() < DRAG_EPSILON {
            velocity.x = 0.0;
        }
    }

    let before_y = position.y;
    *position += *velocity * step.dt;

    if step.flying || velocity.y > 0.0 {
        return false;
    }

    let Some(ground) = ground_height_at(platforms, *position) else {
        return false;
    };
    if before_y < ground - WALKING_SNAP {
        return false;
    }

    let snap = if step.state == CharacterState::Jump {
        LANDING_SNAP
    } else {
        WALKING_SNAP
    };
    if position.y - ground <= snap {
        position.y = ground;
        velocity.y = 0.0;
        true
    } else {
        false
    }
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Snapshot every platform in the world.
pub fn collect_platforms(world: &mut World) -> Vec<PlatformShape> {
    let mut query = world.query::<(&Position, &PlatformData)>();
    query
        .iter(world)
        .map(|(pos, data)| PlatformShape {
            origin: pos.0,
            data: *data,
        })
        .collect()
}

/// Step every dynamic body (anything with a `Velocity`) against the platform set.
pub fn system_physics(world: &mut World, config: &PhysicsConfig, delta: f32) {
    let dt = clamp_delta(delta, config.max_delta);
    if dt == 0.0 {
        return;
    }
    let platforms = collect_platforms(world);

    let mut query = world.query_filtered::<(
        &EntityId,
        &mut Position,
        &mut Velocity,
        Option<&CharacterState>,
        Option<&mut OnGround>,
        Has<Flying>,
    ), Without<PlatformData>>();

    for (id, mut pos, mut vel, state, on_ground, flying) in query.iter_mut(world) {
        if !vel.0.is_finite() {
            trace!("Entity {} had a non-finite velocity, zeroing", id.0);
            vel.0 = Vec3::ZERO;
        }
        let step = BodyStep {
            state: state.copied().unwrap_or_default(),
            flying,
            gravity: config.gravity,
            dt,
        };
        let grounded = step_body(&mut pos.0, &mut vel.0, &step, &platforms);
        if let Some(mut on_ground) = on_ground {
            on_ground.0 = grounded;
        }
    }
}

/// Queue platforms ending more than `threshold` behind `camera_x` for removal.
/// Returns how many were queued.
pub fn system_cleanup_platforms(world: &mut World, camera_x: f32, threshold: f32) -> usize {
    let stale: Vec<Entity> = {
        let mut query = world.query::<(Entity, &Position, &PlatformData)>();
        query
            .iter(world)
            .filter(|(_, pos, data)| pos.0.x + data.length < camera_x - threshold)
            .map(|(entity, _, _)| entity)
            .collect()
    };
    let count = stale.len();
    if count > 0 {
        trace!("Queueing {} platforms behind camera x {}", count, camera_x);
        world.resource_mut::<PendingRemovals>().extend(stale);
    }
    count
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(x: f32, y: f32, length: f32) -> PlatformShape {
        PlatformShape {
            origin: Vec3::new(x, y, 0.0),
            data: PlatformData {
                length,
                slope: 0.0,
                width: 0.0,
            },
        }
    }

    fn step(state: CharacterState, dt: f32) -> BodyStep {
        BodyStep {
            state,
            flying: false,
            gravity: -30.0,
            dt,
        }
    }

    #[test]
    fn delta_clamping() {
        assert!((clamp_delta(0.5, 0.1) - 0.1).abs() < 0.0001);
        assert!((clamp_delta(0.016, 0.1) - 0.016).abs() < 0.0001);
        assert_eq!(clamp_delta(-1.0, 0.1), 0.0);
        assert_eq!(clamp_delta(f32::NAN, 0.1), 0.0);
        assert_eq!(clamp_delta(f32::INFINITY, 0.1), 0.0);
    }

    #[test]
    fn sloped_ground_height() {
        let platform = PlatformShape {
            origin: Vec3::ZERO,
            data: PlatformData {
                length: 20.0,
                slope: 1.0,
                width: 0.0,
            },
        };
        let h = platform_ground_height(&platform, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        assert!((h - 10.0 * 0.26f32.tan()).abs() < 0.001);
    }

    #[test]
    fn broad_phase_margin() {
        let platform = flat(0.0, 2.0, 10.0);
        assert!(platform_ground_height(&platform, Vec3::new(-0.4, 0.0, 0.0)).is_some());
        assert!(platform_ground_height(&platform, Vec3::new(-0.6, 0.0, 0.0)).is_none());
        assert!(platform_ground_height(&platform, Vec3::new(10.4, 0.0, 0.0)).is_some());
        assert!(platform_ground_height(&platform, Vec3::new(10.6, 0.0, 0.0)).is_none());
    }

    #[test]
    fn width_limits_depth() {
        let mut platform = flat(0.0, 0.0, 10.0);
        platform.data.width = 4.0;
        assert!(platform_ground_height(&platform, Vec3::new(5.0, 0.0, 1.9)).is_some());
        assert!(platform_ground_height(&platform, Vec3::new(5.0, 0.0, 2.1)).is_none());
    }

    #[test]
    fn highest_platform_wins() {
        let platforms = [flat(0.0, 0.0, 10.0), flat(2.0, 3.0, 4.0), flat(0.0, 1.0, 10.0)];
        assert_eq!(ground_height_at(&platforms, Vec3::new(3.0, 0.0, 0.0)), Some(3.0));
        assert_eq!(ground_height_at(&platforms, Vec3::new(8.0, 0.0, 0.0)), Some(1.0));
        assert_eq!(ground_height_at(&platforms, Vec3::new(50.0, 0.0, 0.0)), None);
    }

    #[test]
    fn falling_body_snaps_to_ground() {
        let platforms = [flat(-5.0, 0.0, 10.0)];
        let mut pos = Vec3::new(0.0, 0.5, 0.0);
        let mut vel = Vec3::new(0.0, -10.0, 0.0);
        let grounded = step_body(&mut pos, &mut vel, &step(CharacterState::Stand, 1.0 / 60.0), &platforms);
        assert!(grounded);
        assert!(pos.y.abs() < 0.0001);
        assert!(vel.y.abs() < 0.0001);
    }

    #[test]
    fn gravity_accumulates_while_airborne() {
        let mut pos = Vec3::new(0.0, 50.0, 0.0);
        let mut vel = Vec3::ZERO;
        let s = step(CharacterState::Run, 0.1);
        step_body(&mut pos, &mut vel, &s, &[]);
        assert!((vel.y + 3.0).abs() < 0.001);
        step_body(&mut pos, &mut vel, &s, &[]);
        assert!((vel.y + 6.0).abs() < 0.001);
        assert!(pos.y < 50.0);
    }

    #[test]
    fn flying_ignores_gravity_and_ground() {
        let platforms = [flat(-5.0, 0.0, 10.0)];
        let mut pos = Vec3::new(0.0, 0.5, 0.0);
        let mut vel = Vec3::new(1.0, -1.0, 0.0);
        let s = BodyStep {
            flying: true,
            ..step(CharacterState::Run, 0.1)
        };
        assert!(!step_body(&mut pos, &mut vel, &s, &platforms));
        assert!((vel.y + 1.0).abs() < 0.001);
        assert!((pos.y - 0.4).abs() < 0.001);
    }

    #[test]
    fn drag_only_when_standing_or_blocking() {
        let mut pos = Vec3::new(0.0, 10.0, 0.0);
        let mut vel = Vec3::new(5.0, 0.0, 0.0);
        step_body(&mut pos, &mut vel, &step(CharacterState::Stand, 0.01), &[]);
        assert!((vel.x - 4.0).abs() < 0.001);
        step_body(&mut pos, &mut vel, &step(CharacterState::Run, 0.01), &[]);
        assert!((vel.x - 4.0).abs() < 0.001);
        step_body(&mut pos, &mut vel, &step(CharacterState::Block, 0.01), &[]);
        assert!((vel.x - 3.2).abs() < 0.001);

        vel.x = 0.11;
        step_body(&mut pos, &mut vel, &step(CharacterState::Stand, 0.01), &[]);
        assert_eq!(vel.x, 0.0);
    }

    #[test]
    fn jump_uses_tight_snap() {
        let platforms = [flat(-5.0, 0.0, 10.0)];

        let mut pos = Vec3::new(0.0, 0.6, 0.0);
        let mut vel = Vec3::ZERO;
        assert!(!step_body(&mut pos, &mut vel, &step(CharacterState::Jump, 0.001), &platforms));
        assert!(pos.y > 0.5);

        let mut pos = Vec3::new(0.0, 0.6, 0.0);
        let mut vel = Vec3::ZERO;
        assert!(step_body(&mut pos, &mut vel, &step(CharacterState::Run, 0.001), &platforms));
        assert_eq!(pos.y, 0.0);
    }

    #[test]
    fn rising_body_is_not_snapped() {
        let platforms = [flat(-5.0, 0.0, 10.0)];
        let mut pos = Vec3::new(0.0, 0.05, 0.0);
        let mut vel = Vec3::new(0.0, 12.0, 0.0);
        assert!(!step_body(&mut pos, &mut vel, &step(CharacterState::Run, 0.016), &platforms));
        assert!(vel.y > 0.0);
    }

    #[test]
    fn body_below_surface_is_not_lifted() {
        let platforms = [flat(-5.0, 5.0, 10.0)];
        let mut pos = Vec3::new(0.0, 2.0, 0.0);
        let mut vel = Vec3::new(0.0, -1.0, 0.0);
        assert!(!step_body(&mut pos, &mut vel, &step(CharacterState::Run, 0.016), &platforms));
        assert!(pos.y < 2.0);
    }

    fn spawn_platform(world: &mut World, end_x: f32) -> Entity {
        world
            .spawn((
                EntityId(end_x as u64),
                Position(Vec3::new(end_x - 10.0, 0.0, 0.0)),
                PlatformData {
                    length: 10.0,
                    slope: 0.0,
                    width: 0.0,
                },
            ))
            .id()
    }

    #[test]
    fn cleanup_removes_only_far_behind() {
        let mut world = World::new();
        world.insert_resource(PendingRemovals::default());
        let a = spawn_platform(&mut world, 10.0);
        spawn_platform(&mut world, 120.0);
        spawn_platform(&mut world, 220.0);

        assert_eq!(system_cleanup_platforms(&mut world, 200.0, 100.0), 1);
        assert_eq!(world.resource::<PendingRemovals>().entities(), &[a]);
    }

    #[test]
    fn system_steps_dynamic_bodies_only() {
        let mut world = World::new();
        world.insert_resource(PendingRemovals::default());
        spawn_platform(&mut world, 10.0);
        let body = world
            .spawn((
                EntityId(1),
                Position(Vec3::new(5.0, 0.5, 0.0)),
                Velocity(Vec3::new(0.0, -10.0, 0.0)),
                CharacterState::Run,
                OnGround(false),
            ))
            .id();
        let still = world.spawn((EntityId(2), Position(Vec3::new(5.0, 9.0, 0.0)))).id();

        system_physics(&mut world, &PhysicsConfig::default(), 1.0 / 60.0);

        assert!(world.get::<Position>(body).unwrap().0.y.abs() < 0.0001);
        assert!(world.get::<OnGround>(body).unwrap().0);
        assert!((world.get::<Position>(still).unwrap().0.y - 9.0).abs() < 0.0001);
    }

    #[test]
    fn system_clamps_large_delta() {
        let mut world = World::new();
        let body = world
            .spawn((EntityId(1), Position(Vec3::new(0.0, 100.0, 0.0)), Velocity::default()))
            .id();
        system_physics(&mut world, &PhysicsConfig::default(), 5.0);
        // One 0.1 s step at -30 u/s²
        assert!((world.get::<Velocity>(body).unwrap().0.y + 3.0).abs() < 0.001);
    }
}
