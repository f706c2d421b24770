//! Tentacle swarm FSM: patrol around an anchor, track and lunge at the player,
//! then retract to the anchor and wait out a cooldown.

use glam::Vec3;

use crate::components::CharacterState;

/// Distance at which a lunge counts as having connected.
const CONTACT_DISTANCE: f32 = 0.75;

/// Distance at which a retracting tentacle counts as home.
const HOME_DISTANCE: f32 = 0.5;

/// A retracting tentacle starts braking inside this distance of its anchor.
const RETRACT_SLOWING_RADIUS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TentacleState {
    #[default]
    Patrol,
    Tracking,
    Attacking,
    Retracting,
}

/// Behavior record for one tentacle of a swarm.
#[derive(Debug, Clone, PartialEq)]
pub struct TentacleBrain {
    pub state: TentacleState,
    pub anchor: Vec3,
    pub patrol_radius: f32,
    /// Current angle around the anchor, radians.
    pub patrol_angle: f32,
    pub patrol_speed: f32,
    pub tracking_speed: f32,
    pub detection_range: f32,
    pub attack_range: f32,
    pub attack_speed: f32,
    /// Seconds between lunges.
    pub attack_cooldown: f32,
    /// Seconds left before the next lunge is allowed.
    pub cooldown_timer: f32,
}

impl TentacleBrain {
    pub fn new(anchor: Vec3, patrol_radius: f32, patrol_angle: f32) -> Self {
        Self {
            state: TentacleState::Patrol,
            anchor,
            patrol_radius,
            patrol_angle,
            patrol_speed: 3.0,
            tracking_speed: 4.5,
            detection_range: 12.0,
            attack_range: 4.0,
            attack_speed: 12.0,
            attack_cooldown: 2.0,
            cooldown_timer: 0.0,
        }
    }

    fn patrol_point(&self) -> Vec3 {
        self.anchor
            + Vec3::new(self.patrol_angle.cos(), 0.0, self.patrol_angle.sin()) * self.patrol_radius
    }
}

/// What the tentacle sees this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TentacleContext {
    pub position: Vec3,
    pub player_position: Option<Vec3>,
}

/// Steering behavior used to close on the command target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TentacleApproach {
    Seek,
    /// Lead the target by its velocity.
    Pursue,
    /// Brake linearly inside `slowing_radius`.
    Arrive { slowing_radius: f32 },
}

/// Where the tentacle wants to go, how fast, and how it gets there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TentacleCommand {
    pub target: Vec3,
    pub speed: f32,
    pub approach: TentacleApproach,
    pub character_state: CharacterState,
}

/// Pure transition over the tentacle's own record.
pub fn transition(brain: &mut TentacleBrain, ctx: &TentacleContext, dt: f32) -> TentacleCommand {
    brain.cooldown_timer = (brain.cooldown_timer - dt).max(0.0);
    let distance = ctx.player_position.map(|p| ctx.position.distance(p));

    brain.state = match brain.state {
        TentacleState::Patrol => match distance {
            Some(d) if d < brain.detection_range && brain.cooldown_timer <= 0.0 => {
                TentacleState::Tracking
            }
            _ => TentacleState::Patrol,
        },
        TentacleState::Tracking => match distance {
            Some(d) if d < brain.attack_range => TentacleState::Attacking,
            Some(d) if d <= brain.detection_range => TentacleState::Tracking,
            _ => TentacleState::Retracting,
        },
        TentacleState::Attacking => match distance {
            Some(d) if d > CONTACT_DISTANCE && d <= brain.attack_range * 1.5 => {
                TentacleState::Attacking
            }
            _ => {
                brain.cooldown_timer = brain.attack_cooldown;
                TentacleState::Retracting
            }
        },
        TentacleState::Retracting => {
            if ctx.position.distance(brain.anchor) < HOME_DISTANCE {
                TentacleState::Patrol
            } else {
                TentacleState::Retracting
            }
        }
    };

    match (brain.state, ctx.player_position) {
        (TentacleState::Tracking, Some(player)) => TentacleCommand {
            target: player,
            speed: brain.tracking_speed,
            approach: TentacleApproach::Pursue,
            character_state: CharacterState::Run,
        },
        (TentacleState::Attacking, Some(player)) => TentacleCommand {
            target: player,
            speed: brain.attack_speed,
            approach: TentacleApproach::Pursue,
            character_state: CharacterState::Attack,
        },
        (TentacleState::Retracting, _) => TentacleCommand {
            target: brain.anchor,
            speed: brain.tracking_speed,
            approach: TentacleApproach::Arrive {
                slowing_radius: RETRACT_SLOWING_RADIUS,
            },
            character_state: CharacterState::Run,
        },
        _ => {
            if brain.patrol_radius > 0.0 {
                brain.patrol_angle += brain.patrol_speed / brain.patrol_radius * dt;
            }
            TentacleCommand {
                target: brain.patrol_point(),
                speed: brain.patrol_speed,
                approach: TentacleApproach::Seek,
                character_state: CharacterState::Run,
            }
        }
    }
}
