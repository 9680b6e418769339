use crate::battle::arena::Arena;
use crate::config::{BattleConfig, BattleOverrides};
use crate::errors::{BattleResult, BattleStateError};
use crate::pokemon::{Pokemon, PokemonId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schema::{ArenaTagSide, BattleStyle, BattleType, MoveId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A position on the field. The ordinal doubles as the tie-break order.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub enum BattlerIndex {
    Player,
    Player2,
    Enemy,
    Enemy2,
}

impl BattlerIndex {
    pub const ALL: [BattlerIndex; 4] = [
        BattlerIndex::Player,
        BattlerIndex::Player2,
        BattlerIndex::Enemy,
        BattlerIndex::Enemy2,
    ];

    pub fn new(side: Side, slot: usize) -> Option<Self> {
        match (side, slot) {
            (Side::Player, 0) => Some(BattlerIndex::Player),
            (Side::Player, 1) => Some(BattlerIndex::Player2),
            (Side::Enemy, 0) => Some(BattlerIndex::Enemy),
            (Side::Enemy, 1) => Some(BattlerIndex::Enemy2),
            _ => None,
        }
    }

    pub fn side(self) -> Side {
        match self {
            BattlerIndex::Player | BattlerIndex::Player2 => Side::Player,
            BattlerIndex::Enemy | BattlerIndex::Enemy2 => Side::Enemy,
        }
    }

    pub fn slot(self) -> usize {
        match self {
            BattlerIndex::Player | BattlerIndex::Enemy => 0,
            BattlerIndex::Player2 | BattlerIndex::Enemy2 => 1,
        }
    }

    /// The other position on the same side.
    pub fn ally(self) -> BattlerIndex {
        match self {
            BattlerIndex::Player => BattlerIndex::Player2,
            BattlerIndex::Player2 => BattlerIndex::Player,
            BattlerIndex::Enemy => BattlerIndex::Enemy2,
            BattlerIndex::Enemy2 => BattlerIndex::Enemy,
        }
    }

    pub fn is_player(self) -> bool {
        self.side() == Side::Player
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Player,
    Enemy,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Player => 0,
            Side::Enemy => 1,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Player => Side::Enemy,
            Side::Enemy => Side::Player,
        }
    }

    pub fn arena_side(self) -> ArenaTagSide {
        match self {
            Side::Player => ArenaTagSide::Player,
            Side::Enemy => ArenaTagSide::Enemy,
        }
    }
}

/// One side of the field: the party and which party members are out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleSide {
    pub party: Vec<Pokemon>,
    /// Field slot -> party slot.
    pub active: Vec<Option<usize>>,
}

impl BattleSide {
    pub fn new(party: Vec<Pokemon>, field_size: usize) -> Self {
        Self {
            party,
            active: vec![None; field_size],
        }
    }

    pub fn active_pokemon(&self, slot: usize) -> Option<&Pokemon> {
        let party_slot = (*self.active.get(slot)?)?;
        self.party.get(party_slot)
    }

    pub fn active_pokemon_mut(&mut self, slot: usize) -> Option<&mut Pokemon> {
        let party_slot = (*self.active.get(slot)?)?;
        self.party.get_mut(party_slot)
    }

    pub fn is_active(&self, party_slot: usize) -> bool {
        self.active.contains(&Some(party_slot))
    }

    /// Party slots that could be switched in right now.
    pub fn reserves(&self) -> Vec<usize> {
        self.party
            .iter()
            .enumerate()
            .filter(|(slot, pokemon)| !pokemon.is_fainted() && !self.is_active(*slot))
            .map(|(slot, _)| slot)
            .collect()
    }

    pub fn has_reserve(&self) -> bool {
        !self.reserves().is_empty()
    }

    pub fn all_fainted(&self) -> bool {
        self.party.iter().all(|pokemon| pokemon.is_fainted())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    PlayerVictory,
    EnemyVictory,
    Draw,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    WaitingForCommands,
    TurnInProgress,
    WaitingForReplacement(BattlerIndex),
    Ended(BattleOutcome),
}

/// What a combatant was told to do this turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    UseMove {
        slot: usize,
        #[serde(default)]
        target: Option<BattlerIndex>,
    },
    /// Used when every move is out of PP.
    Struggle,
    Switch {
        party_slot: usize,
    },
    Forfeit,
    /// Filled in by the engine for charge turns and recharges.
    Locked {
        move_id: Option<MoveId>,
        targets: Vec<BattlerIndex>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleState {
    pub battle_id: String,
    pub wave: u32,
    pub battle_type: BattleType,
    pub style: BattleStyle,
    pub sides: [BattleSide; 2],
    pub arena: Arena,
    pub turn: u32,
    pub game_state: GameState,
    pub pending_actions: BTreeMap<BattlerIndex, PlayerAction>,
    #[serde(default)]
    pub overrides: BattleOverrides,
}

impl BattleState {
    pub fn new(
        id: String,
        config: &BattleConfig,
        player_party: Vec<Pokemon>,
        enemy_party: Vec<Pokemon>,
    ) -> Self {
        let field_size = config.style.field_size();
        Self {
            battle_id: id,
            wave: config.wave,
            battle_type: config.battle_type,
            style: config.style,
            sides: [
                BattleSide::new(player_party, field_size),
                BattleSide::new(enemy_party, field_size),
            ],
            arena: Arena::new(config.biome),
            turn: 0,
            game_state: GameState::TurnInProgress,
            pending_actions: BTreeMap::new(),
            overrides: config.overrides.clone(),
        }
    }

    pub fn is_double(&self) -> bool {
        self.style == BattleStyle::Double
    }

    pub fn field_size(&self) -> usize {
        self.style.field_size()
    }

    pub fn side(&self, side: Side) -> &BattleSide {
        &self.sides[side.index()]
    }

    pub fn side_mut(&mut self, side: Side) -> &mut BattleSide {
        &mut self.sides[side.index()]
    }

    /// The Pokemon occupying a field position, fainted or not.
    pub fn pokemon(&self, index: BattlerIndex) -> Option<&Pokemon> {
        self.side(index.side()).active_pokemon(index.slot())
    }

    pub fn pokemon_mut(&mut self, index: BattlerIndex) -> Option<&mut Pokemon> {
        self.side_mut(index.side()).active_pokemon_mut(index.slot())
    }

    /// Like `pokemon`, but a missing combatant is a hard error.
    pub fn active(&self, index: BattlerIndex) -> BattleResult<&Pokemon> {
        self.pokemon(index)
            .ok_or_else(|| BattleStateError::NoActivePokemon(index).into())
    }

    pub fn active_mut(&mut self, index: BattlerIndex) -> BattleResult<&mut Pokemon> {
        self.pokemon_mut(index)
            .ok_or_else(|| BattleStateError::NoActivePokemon(index).into())
    }

    /// True if a live Pokemon with this id still stands at `index`.
    pub fn is_still_active(&self, index: BattlerIndex, id: PokemonId) -> bool {
        self.pokemon(index)
            .map(|pokemon| pokemon.id == id && !pokemon.is_fainted())
            .unwrap_or(false)
    }

    /// Field positions holding a non-fainted Pokemon, in field order.
    pub fn active_indices(&self) -> Vec<BattlerIndex> {
        BattlerIndex::ALL
            .into_iter()
            .filter(|index| index.slot() < self.field_size())
            .filter(|index| {
                self.pokemon(*index)
                    .map(|pokemon| !pokemon.is_fainted())
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn opponents_of(&self, index: BattlerIndex) -> Vec<BattlerIndex> {
        self.active_indices()
            .into_iter()
            .filter(|other| other.side() != index.side())
            .collect()
    }

    pub fn ally_of(&self, index: BattlerIndex) -> Option<BattlerIndex> {
        let ally = index.ally();
        self.active_indices().into_iter().find(|other| *other == ally)
    }

    pub fn find_by_id(&self, id: PokemonId) -> Option<BattlerIndex> {
        BattlerIndex::ALL
            .into_iter()
            .filter(|index| index.slot() < self.field_size())
            .find(|index| {
                self.pokemon(*index)
                    .map(|pokemon| pokemon.id == id)
                    .unwrap_or(false)
            })
    }
}

#[derive(Debug, Clone)]
enum RngSource {
    Seeded(StdRng),
    Scripted { outcomes: Vec<u32>, index: usize },
}

/// Every random roll in a battle goes through here, tagged with a reason.
///
/// The order of draws is part of the simulation contract: replays with the
/// same seed and the same commands must consume rolls in the same order.
#[derive(Debug, Clone)]
pub struct BattleRng {
    source: RngSource,
    draws: u64,
}

impl BattleRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: RngSource::Seeded(StdRng::seed_from_u64(seed)),
            draws: 0,
        }
    }

    pub fn new_random() -> Self {
        let mut rng = rand::rng();
        Self::from_seed(rng.random())
    }

    /// Scripted outcomes are clamped into each requested range.
    pub fn new_for_test(outcomes: Vec<u32>) -> Self {
        Self {
            source: RngSource::Scripted { outcomes, index: 0 },
            draws: 0,
        }
    }

    /// Uniform integer in `0..range`.
    pub fn rand_int(&mut self, range: u32, reason: &str) -> u32 {
        if range <= 1 {
            return 0;
        }
        let outcome = match &mut self.source {
            RngSource::Seeded(rng) => rng.random_range(0..range),
            RngSource::Scripted { outcomes, index } => {
                if *index >= outcomes.len() {
                    panic!(
                        "BattleRng exhausted! Tried to get a value for: '{}'. Need more random values.",
                        reason
                    );
                }
                let outcome = outcomes[*index].min(range - 1);
                *index += 1;
                outcome
            }
        };
        self.draws += 1;
        log::trace!("[RNG] #{} consumed {} (of {}) for: {}", self.draws, outcome, range, reason);
        outcome
    }

    /// Uniform integer in `min..=max`.
    pub fn rand_range(&mut self, min: u32, max: u32, reason: &str) -> u32 {
        min + self.rand_int(max - min + 1, reason)
    }

    /// Percent roll. Certain and impossible outcomes consume nothing.
    pub fn chance(&mut self, percent: u8, reason: &str) -> bool {
        match percent {
            0 => false,
            p if p >= 100 => true,
            p => self.rand_int(100, reason) < p as u32,
        }
    }

    /// Number of values drawn so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}
