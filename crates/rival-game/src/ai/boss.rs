//! Boss FSM: hover ahead of the player on a sine wave, occasionally slam down.

use glam::Vec3;

use crate::components::CharacterState;

/// Gain pulling the boss toward its hover point.
const HOVER_GAIN: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BossState {
    #[default]
    Hover,
    Slam,
}

/// Behavior record for a boss enemy.
#[derive(Debug, Clone, PartialEq)]
pub struct BossBrain {
    pub state: BossState,
    /// Seconds spent alive; drives the hover oscillation.
    pub elapsed: f32,
    /// Horizontal offset ahead of the player while hovering.
    pub hover_offset_x: f32,
    pub hover_height: f32,
    pub hover_amplitude: f32,
    /// Angular frequency of the hover wave, rad/s.
    pub hover_frequency: f32,
    /// Per-tick chance of starting a slam.
    pub slam_chance: f32,
    pub slam_speed: f32,
    /// Height at which a slam bottoms out.
    pub slam_floor: f32,
    /// Per-tick chance of returning to Hover while at the floor.
    pub recover_chance: f32,
}

impl Default for BossBrain {
    fn default() -> Self {
        Self {
            state: BossState::Hover,
            elapsed: 0.0,
            hover_offset_x: 8.0,
            hover_height: 6.0,
            hover_amplitude: 1.5,
            hover_frequency: 2.0,
            slam_chance: 0.005,
            slam_speed: 25.0,
            slam_floor: 1.0,
            recover_chance: 0.5,
        }
    }
}

/// What the boss sees this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossContext {
    pub position: Vec3,
    pub player_position: Option<Vec3>,
}

/// Movement written back to the entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossCommand {
    pub velocity: Vec3,
    /// Set when the slam bottoms out and the boss is pinned to the floor.
    pub snap_y: Option<f32>,
    pub character_state: CharacterState,
}

/// Pure transition. Advances `elapsed` by `dt`; `roll` is uniform in `[0, 1)`.
pub fn transition(brain: &mut BossBrain, ctx: &BossContext, dt: f32, roll: f32) -> BossCommand {
    brain.elapsed += dt;

    match brain.state {
        BossState::Hover => {
            let anchor_x = ctx
                .player_position
                .map(|p| p.x + brain.hover_offset_x)
                .unwrap_or(ctx.position.x);
            let target_y =
                brain.hover_height + (brain.elapsed * brain.hover_frequency).sin() * brain.hover_amplitude;
            let velocity = Vec3::new(
                (anchor_x - ctx.position.x) * HOVER_GAIN,
                (target_y - ctx.position.y) * HOVER_GAIN,
                0.0,
            );

            if ctx.player_position.is_some() && roll < brain.slam_chance {
                brain.state = BossState::Slam;
            }
            BossCommand {
                velocity,
                snap_y: None,
                character_state: CharacterState::Run,
            }
        }
        BossState::Slam => {
            if ctx.position.y <= brain.slam_floor {
                if roll < brain.recover_chance {
                    brain.state = BossState::Hover;
                }
                BossCommand {
                    velocity: Vec3::ZERO,
                    snap_y: Some(brain.slam_floor),
                    character_state: CharacterState::Stun,
                }
            } else {
                BossCommand {
                    velocity: Vec3::new(0.0, -brain.slam_speed, 0.0),
                    snap_y: None,
                    character_state: CharacterState::Attack,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(position: Vec3, player: Vec3) -> BossContext {
        BossContext {
            position,
            player_position: Some(player),
        }
    }

    #[test]
    fn hover_tracks_point_ahead_of_player() {
        let mut brain = BossBrain::default();
        let cmd = transition(
            &mut brain,
            &ctx(Vec3::new(0.0, 6.0, 0.0), Vec3::new(10.0, 0.0, 0.0)),
            0.0,
            0.9,
        );
        // Hover target is x = 18
        assert!((cmd.velocity.x - 36.0).abs() < 0.001);
        assert_eq!(brain.state, BossState::Hover);
    }

    #[test]
    fn hover_height_oscillates() {
        let mut brain = BossBrain::default();
        let at = Vec3::new(18.0, 6.0, 0.0);
        let player = Vec3::new(10.0, 0.0, 0.0);
        let up = transition(&mut brain, &ctx(at, player), std::f32::consts::FRAC_PI_4, 0.9);
        assert!(up.velocity.y > 0.0, "sin peaks first");
        let down = transition(&mut brain, &ctx(at, player), std::f32::consts::FRAC_PI_2, 0.9);
        assert!(down.velocity.y < 0.0);
    }

    #[test]
    fn slam_starts_on_low_roll() {
        let mut brain = BossBrain::default();
        transition(&mut brain, &ctx(Vec3::new(0.0, 6.0, 0.0), Vec3::ZERO), 0.016, 0.001);
        assert_eq!(brain.state, BossState::Slam);

        let cmd = transition(&mut brain, &ctx(Vec3::new(0.0, 6.0, 0.0), Vec3::ZERO), 0.016, 0.9);
        assert!(cmd.velocity.x.abs() < 0.001);
        assert!((cmd.velocity.y + 25.0).abs() < 0.001);
    }

    #[test]
    fn slam_bottoms_out_and_recovers() {
        let mut brain = BossBrain {
            state: BossState::Slam,
            ..Default::default()
        };
        let floor = Vec3::new(0.0, 0.5, 0.0);
        let cmd = transition(&mut brain, &ctx(floor, Vec3::ZERO), 0.016, 0.9);
        assert_eq!(cmd.snap_y, Some(1.0));
        assert_eq!(cmd.velocity, Vec3::ZERO);
        assert_eq!(brain.state, BossState::Slam);

        transition(&mut brain, &ctx(floor, Vec3::ZERO), 0.016, 0.1);
        assert_eq!(brain.state, BossState::Hover);
    }

    #[test]
    fn no_player_never_slams() {
        let mut brain = BossBrain::default();
        let c = BossContext {
            position: Vec3::new(0.0, 6.0, 0.0),
            player_position: None,
        };
        transition(&mut brain, &c, 0.016, 0.0);
        assert_eq!(brain.state, BossState::Hover);
    }
}
