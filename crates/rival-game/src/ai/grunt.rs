//! Grunt FSM: Idle → Chase → Attack, with a probabilistic exit from Attack.

use crate::components::CharacterState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GruntState {
    #[default]
    Idle,
    Chase,
    Attack,
}

/// Behavior record for a grunt enemy.
#[derive(Debug, Clone, PartialEq)]
pub struct GruntBrain {
    pub state: GruntState,
    /// Idle → Chase when the player is closer than this.
    pub detection_radius: f32,
    /// Chase → Attack when horizontal distance is below this.
    pub melee_range: f32,
    pub chase_speed: f32,
    /// Per-tick chance of leaving Attack.
    pub attack_exit_chance: f32,
}

impl Default for GruntBrain {
    fn default() -> Self {
        Self {
            state: GruntState::Idle,
            detection_radius: 10.0,
            melee_range: 1.5,
            chase_speed: 4.0,
            attack_exit_chance: 0.02,
        }
    }
}

/// What the grunt sees this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GruntContext {
    /// Distance to the nearest player, if any.
    pub player_distance: Option<f32>,
    /// Signed `player.x - grunt.x`.
    pub player_dx: f32,
}

/// Movement written back to the entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GruntCommand {
    pub velocity_x: f32,
    pub character_state: CharacterState,
}

/// Pure transition. `roll` is uniform in `[0, 1)`.
pub fn transition(brain: &GruntBrain, ctx: &GruntContext, roll: f32) -> (GruntState, GruntCommand) {
    let leash = brain.detection_radius * 2.0;
    let next = match brain.state {
        GruntState::Idle => match ctx.player_distance {
            Some(d) if d < brain.detection_radius => GruntState::Chase,
            _ => GruntState::Idle,
        },
        GruntState::Chase => match ctx.player_distance {
            Some(d) if d > leash => GruntState::Idle,
            None => GruntState::Idle,
            Some(_) if ctx.player_dx.abs() < brain.melee_range => GruntState::Attack,
            Some(_) => GruntState::Chase,
        },
        GruntState::Attack => {
            if roll < brain.attack_exit_chance {
                GruntState::Idle
            } else {
                GruntState::Attack
            }
        }
    };

    let command = match next {
        GruntState::Idle => GruntCommand {
            velocity_x: 0.0,
            character_state: CharacterState::Stand,
        },
        GruntState::Chase => GruntCommand {
            velocity_x: ctx.player_dx.signum() * brain.chase_speed,
            character_state: CharacterState::Run,
        },
        GruntState::Attack => GruntCommand {
            velocity_x: 0.0,
            character_state: CharacterState::Attack,
        },
    };

    (next, command)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(distance: Option<f32>, dx: f32) -> GruntContext {
        GruntContext {
            player_distance: distance,
            player_dx: dx,
        }
    }

    #[test]
    fn idle_detects_player() {
        let brain = GruntBrain::default();
        let (state, cmd) = transition(&brain, &ctx(Some(5.0), -5.0), 0.5);
        assert_eq!(state, GruntState::Chase);
        assert!((cmd.velocity_x + 4.0).abs() < 0.001);
        assert_eq!(cmd.character_state, CharacterState::Run);
    }

    #[test]
    fn idle_ignores_distant_player() {
        let brain = GruntBrain::default();
        let (state, _) = transition(&brain, &ctx(Some(15.0), 15.0), 0.5);
        assert_eq!(state, GruntState::Idle);
        let (state, _) = transition(&brain, &ctx(None, 0.0), 0.5);
        assert_eq!(state, GruntState::Idle);
    }

    #[test]
    fn chase_enters_attack_in_melee_range() {
        let brain = GruntBrain {
            state: GruntState::Chase,
            ..Default::default()
        };
        let (state, cmd) = transition(&brain, &ctx(Some(1.2), 1.0), 0.5);
        assert_eq!(state, GruntState::Attack);
        assert_eq!(cmd.character_state, CharacterState::Attack);
        assert!(cmd.velocity_x.abs() < 0.001);
    }

    #[test]
    fn chase_gives_up_beyond_leash() {
        let brain = GruntBrain {
            state: GruntState::Chase,
            ..Default::default()
        };
        let (state, _) = transition(&brain, &ctx(Some(25.0), 25.0), 0.5);
        assert_eq!(state, GruntState::Idle);
    }

    #[test]
    fn attack_exit_is_probabilistic() {
        let brain = GruntBrain {
            state: GruntState::Attack,
            ..Default::default()
        };
        let (stay, _) = transition(&brain, &ctx(Some(1.0), 1.0), 0.5);
        assert_eq!(stay, GruntState::Attack);
        let (leave, cmd) = transition(&brain, &ctx(Some(1.0), 1.0), 0.01);
        assert_eq!(leave, GruntState::Idle);
        assert_eq!(cmd.character_state, CharacterState::Stand);
    }
}
