//! Compact battle recordings.
//!
//! A replay stores the config, both parties and every input the player gave.
//! Enemy decisions come from the deterministic AI, so feeding the same inputs
//! to a fresh engine with the same seed reproduces the same event stream.

use crate::battle::engine::BattleEngine;
use crate::battle::phase::AwaitingInput;
use crate::battle::state::{BattlerIndex, PlayerAction};
use crate::config::BattleConfig;
use crate::data::GameData;
use crate::errors::{BattleResult, SnapshotError};
use crate::pokemon::{build_party, PokemonSpec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PLAYER_FIRST_ID: u32 = 1;
const ENEMY_FIRST_ID: u32 = 101;

/// One input as the engine received it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TurnCommands {
    Commands(Vec<(BattlerIndex, PlayerAction)>),
    Replacement { index: BattlerIndex, party_slot: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplayLog {
    pub seed: u64,
    pub config: BattleConfig,
    pub player: Vec<PokemonSpec>,
    pub enemy: Vec<PokemonSpec>,
    pub turns: Vec<TurnCommands>,
}

impl ReplayLog {
    pub fn new(config: BattleConfig, player: Vec<PokemonSpec>, enemy: Vec<PokemonSpec>) -> Self {
        Self {
            seed: config.seed,
            config,
            player,
            enemy,
            turns: Vec::new(),
        }
    }

    /// A fresh engine for this battle, run up to its first prompt.
    pub fn start(&self, data: Arc<GameData>) -> BattleResult<BattleEngine> {
        let player = build_party(&self.player, PLAYER_FIRST_ID, &data)?;
        let enemy = build_party(&self.enemy, ENEMY_FIRST_ID, &data)?;
        let config = BattleConfig {
            seed: self.seed,
            ..self.config.clone()
        };
        let mut engine = BattleEngine::new(config, data, player, enemy);
        let input = engine.run_until_input()?;
        settle(&mut engine, input)?;
        Ok(engine)
    }

    /// Play a turn and record it once the engine accepted every command.
    pub fn play_turn(
        &mut self,
        engine: &mut BattleEngine,
        commands: Vec<(BattlerIndex, PlayerAction)>,
    ) -> BattleResult<AwaitingInput> {
        for (index, action) in &commands {
            engine.validate_command(*index, action)?;
        }
        let input = engine.play_turn(commands.clone())?;
        self.turns.push(TurnCommands::Commands(commands));
        settle(engine, input)
    }

    pub fn submit_replacement(
        &mut self,
        engine: &mut BattleEngine,
        index: BattlerIndex,
        party_slot: usize,
    ) -> BattleResult<AwaitingInput> {
        engine.submit_replacement(index, party_slot)?;
        self.turns.push(TurnCommands::Replacement { index, party_slot });
        let input = engine.run_until_input()?;
        settle(engine, input)
    }

    /// Re-run the whole recording on a fresh engine.
    pub fn replay(&self, data: Arc<GameData>) -> BattleResult<BattleEngine> {
        let mut engine = self.start(data)?;
        for turn in &self.turns {
            let input = match turn {
                TurnCommands::Commands(commands) => engine.play_turn(commands.clone())?,
                TurnCommands::Replacement { index, party_slot } => {
                    engine.submit_replacement(*index, *party_slot)?;
                    engine.run_until_input()?
                }
            };
            settle(&mut engine, input)?;
        }
        log::debug!("replayed {} inputs, {} rng draws", self.turns.len(), engine.rng_draws());
        Ok(engine)
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        postcard::to_allocvec(self).map_err(|err| SnapshotError::Encode(err.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        postcard::from_bytes(bytes).map_err(|err| SnapshotError::Decode(err.to_string()))
    }
}

/// Step through animation boundaries until the engine needs a real decision.
fn settle(engine: &mut BattleEngine, mut input: AwaitingInput) -> BattleResult<AwaitingInput> {
    while input == AwaitingInput::Animation {
        input = engine.run_until_input()?;
    }
    Ok(input)
}
