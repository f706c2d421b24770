//! NPC behavior: per-kind FSMs, steering, crowd separation, and the AI tick system.

pub mod boss;
pub mod crowd;
pub mod grunt;
pub mod steering;
pub mod system;
pub mod tentacle;
