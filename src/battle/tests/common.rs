use crate::battle::engine::BattleEngine;
use crate::battle::state::{BattleRng, BattleState};
use crate::config::BattleConfig;
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::{Pokemon, PokemonId, StatusCondition};
use schema::{AbilityId, HeldItemId, MoveId, SpeciesId, StatusEffect};
use std::sync::{Arc, OnceLock};

static TEST_DATA: OnceLock<Arc<GameData>> = OnceLock::new();

/// The embedded tables, parsed once per test binary.
pub fn test_data() -> Arc<GameData> {
    TEST_DATA
        .get_or_init(|| match GameData::embedded() {
            Ok(data) => Arc::new(data),
            Err(err) => panic!("Failed to load embedded game data: {}", err),
        })
        .clone()
}

/// A builder for creating test Pokemon instances with common defaults.
///
/// # Example
/// ```ignore
/// let pokemon = TestPokemonBuilder::new(SpeciesId::Pikachu, 25)
///     .with_moves(vec![MoveId::Tackle])
///     .with_status(StatusEffect::Paralysis)
///     .build();
/// ```
pub struct TestPokemonBuilder {
    species: SpeciesId,
    level: u8,
    moves: Option<Vec<MoveId>>,
    status: Option<StatusCondition>,
    current_hp: Option<u16>,
    ability: Option<AbilityId>,
    passive: Option<AbilityId>,
    items: Vec<(HeldItemId, u8)>,
    boss_segments: u8,
}

impl TestPokemonBuilder {
    /// Creates a new builder for a given species and level.
    pub fn new(species: SpeciesId, level: u8) -> Self {
        Self {
            species,
            level,
            moves: None,
            status: None,
            current_hp: None,
            ability: None,
            passive: None,
            items: Vec::new(),
            boss_segments: 1,
        }
    }

    /// Sets the moves for the test Pokemon. Defaults to Tackle.
    pub fn with_moves(mut self, moves: Vec<MoveId>) -> Self {
        self.moves = Some(moves);
        self
    }

    /// Sets the status condition, bypassing type immunities.
    pub fn with_status(mut self, status: StatusEffect) -> Self {
        self.status = Some(StatusCondition {
            effect: status,
            turns: 0,
        });
        self
    }

    pub fn with_status_turns(mut self, status: StatusEffect, turns: u8) -> Self {
        self.status = Some(StatusCondition {
            effect: status,
            turns,
        });
        self
    }

    /// Sets the current HP for the test Pokemon. If not set, HP will be max.
    pub fn with_hp(mut self, hp: u16) -> Self {
        self.current_hp = Some(hp);
        self
    }

    pub fn with_ability(mut self, ability: AbilityId) -> Self {
        self.ability = Some(ability);
        self
    }

    /// `AbilityId::None` disables the species passive.
    pub fn with_passive(mut self, passive: AbilityId) -> Self {
        self.passive = Some(passive);
        self
    }

    pub fn with_item(mut self, item: HeldItemId, stacks: u8) -> Self {
        self.items.push((item, stacks));
        self
    }

    pub fn with_boss_segments(mut self, segments: u8) -> Self {
        self.boss_segments = segments;
        self
    }

    /// Builds the `Pokemon`. Ids are assigned by `create_test_battle`.
    pub fn build(self) -> Pokemon {
        let data = test_data();
        let species_data = match data.species(self.species) {
            Ok(species) => species,
            Err(err) => panic!("Failed to load species data for {:?}: {}", self.species, err),
        };
        let moves = self.moves.unwrap_or_else(|| vec![MoveId::Tackle]);

        let mut pokemon = match Pokemon::new(PokemonId(0), species_data, self.level, &moves, &data) {
            Ok(pokemon) => pokemon,
            Err(err) => panic!("Failed to build {:?}: {}", self.species, err),
        };

        pokemon.status = self.status;
        if let Some(ability) = self.ability {
            pokemon.ability = ability;
        }
        if let Some(passive) = self.passive {
            pokemon.passive = passive;
            pokemon.passive_enabled = passive != AbilityId::None;
        }
        for (item, stacks) in self.items {
            let max_stack = data.item(item).map(|record| record.max_stack).unwrap_or(1);
            pokemon.give_item(item, stacks, max_stack);
        }
        if self.boss_segments > 1 {
            pokemon.boss_segments = self.boss_segments;
            pokemon.boss_segment_index = self.boss_segments - 1;
        }
        if let Some(hp) = self.current_hp {
            let max = pokemon.max_hp();
            pokemon.take_damage(max.saturating_sub(hp));
            pokemon.turn_data.damage_taken = 0;
        }

        pokemon
    }
}

/// Player Pokemon get ids 1.., enemy Pokemon 101.., so tests can tell them apart.
fn number_parties(player: &mut [Pokemon], enemy: &mut [Pokemon]) {
    for (offset, pokemon) in player.iter_mut().enumerate() {
        pokemon.id = PokemonId(1 + offset as u32);
    }
    for (offset, pokemon) in enemy.iter_mut().enumerate() {
        pokemon.id = PokemonId(101 + offset as u32);
    }
}

/// A battle state with the leading Pokemon of each party already on the field.
pub fn create_battle_with_config(
    config: &BattleConfig,
    mut player: Vec<Pokemon>,
    mut enemy: Vec<Pokemon>,
) -> BattleState {
    number_parties(&mut player, &mut enemy);
    let mut state = BattleState::new("test_battle".to_string(), config, player, enemy);
    for side in state.sides.iter_mut() {
        let field_size = side.active.len();
        for slot in 0..field_size.min(side.party.len()) {
            side.active[slot] = Some(slot);
        }
    }
    state
}

/// Creates a standard singles battle state for testing.
pub fn create_test_battle(player: Vec<Pokemon>, enemy: Vec<Pokemon>) -> BattleState {
    create_battle_with_config(&BattleConfig::default(), player, enemy)
}

pub fn create_double_battle(player: Vec<Pokemon>, enemy: Vec<Pokemon>) -> BattleState {
    let config = BattleConfig {
        style: schema::BattleStyle::Double,
        ..BattleConfig::default()
    };
    create_battle_with_config(&config, player, enemy)
}

/// A config whose random outcomes are pinned: no crits, max damage roll,
/// every move hits.
pub fn pinned_config() -> BattleConfig {
    let mut config = BattleConfig::default();
    config.overrides.critical_hits = Some(false);
    config.overrides.always_hit = true;
    config.overrides.damage_roll = Some(100);
    config
}

/// An engine over the given parties that has not started yet.
pub fn create_test_engine(
    config: BattleConfig,
    mut player: Vec<Pokemon>,
    mut enemy: Vec<Pokemon>,
) -> BattleEngine {
    number_parties(&mut player, &mut enemy);
    BattleEngine::with_rng(config, test_data(), player, enemy, predictable_rng())
}

/// A `BattleRng` preloaded with a long run of 50s, enough for several turns.
pub fn predictable_rng() -> BattleRng {
    BattleRng::new_for_test(vec![50; 500])
}

/// Helper function to assert that a Result is Ok and return the value.
/// Provides clear error messages in tests when functions unexpectedly fail.
pub fn assert_ok<T>(result: BattleResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok but got error: {}", err),
    }
}
