//! Simulation-level errors.

use thiserror::Error;

/// Why an ability could not be executed. Nothing is spent or applied on failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AbilityError {
    #[error("Ability is on cooldown")]
    OnCooldown,

    #[error("not enough energy: need {needed}, have {available}")]
    InsufficientEnergy { needed: f32, available: f32 },

    #[error("target has no health")]
    TargetHasNoHealth,

    #[error("unknown ability: {0}")]
    UnknownAbility(String),
}

/// Errors from world-level operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("unknown entity id: {0}")]
    UnknownEntity(u64),

    #[error("entity {0} is missing a {1} component")]
    MissingComponent(u64, &'static str),

    #[error("platform length must be positive, got {0}")]
    InvalidPlatform(f32),

    #[error("no stat points to spend")]
    NoStatPoints,

    #[error(transparent)]
    Ability(#[from] AbilityError),
}
