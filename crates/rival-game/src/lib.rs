//! Gameplay simulation: ECS entity store, sloped-platform physics, combat,
//! abilities, progression, and enemy AI, stepped one frame at a time.

pub mod ability;
pub mod ai;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod game_world;
pub mod physics;
pub mod progression;
pub mod spawning;
