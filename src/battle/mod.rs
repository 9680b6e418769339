pub mod abilities;
pub mod ai;
pub mod arena;
pub mod arena_tags;
pub mod battler_tags;
pub mod calculators;
pub mod commands;
pub mod damage;
pub mod engine;
pub mod events;
pub mod items;
pub mod move_effects;
pub mod phase;
pub mod state;
pub mod stats;
pub mod targeting;
pub mod turn_orchestrator;
pub mod weather;

#[cfg(test)]
pub(crate) mod tests;
