//! Rogue Battle
//!
//! The battle simulation core of a roguelike monster-battling game: a phase
//! queue that resolves moves, abilities, held items, statuses, weather,
//! terrain and arena tags in a deterministic order.
//!
//! The engine never formats text or waits on animations. It emits
//! `BattleEvent`s that carry localization keys and stops at phase boundaries
//! when the host asks it to.

// --- MODULE DECLARATIONS ---
pub mod battle;
pub mod config;
pub mod data;
pub mod errors;
pub mod pokemon;
pub mod replay;
pub mod snapshot;

// --- PUBLIC API RE-EXPORTS ---

// --- From the `schema` crate ---
pub use schema::{
    AbilityId, ArenaTagSide, ArenaTagType, BattleStat, BattleStyle, BattleType, BiomeId, HeldItemId,
    MoveCategory, MoveData, MoveId, PokemonType, SpeciesData, SpeciesId, Stat, StatusEffect,
    TerrainType, WeatherType,
};

// --- From this crate's modules (`src/`) ---

// Driving a battle.
pub use battle::ai::{Behavior, ScoringAi};
pub use battle::engine::BattleEngine;
pub use battle::events::{BattleEvent, EventBus, KeyLocalizer, LocalizedMessage, Localizer};
pub use battle::phase::{AwaitingInput, Phase, PhaseQueue};
pub use battle::state::{BattleOutcome, BattleRng, BattleState, BattlerIndex, GameState, PlayerAction, Side};

// Combatants.
pub use pokemon::{build_party, Pokemon, PokemonId, PokemonSpec, StatusCondition};

// Configuration and data.
pub use config::{BattleConfig, BattleOverrides};
pub use data::GameData;

// Persistence.
pub use replay::{ReplayLog, TurnCommands};
pub use snapshot::{resume_engine, BattleSnapshot};

// Crate-specific error and result types.
pub use errors::{
    BattleError, BattleResult, BattleStateError, DataError, SnapshotError, ValidationError,
    ValidationResult,
};
