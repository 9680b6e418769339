use crate::errors::{BattleResult, DataError};
use schema::{
    AbilityData, AbilityId, HeldItemData, HeldItemId, MoveData, MoveId, SpeciesData, SpeciesId,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const MOVES_RON: &str = include_str!("../data/moves.ron");
const SPECIES_RON: &str = include_str!("../data/species.ron");
const ABILITIES_RON: &str = include_str!("../data/abilities.ron");
const ITEMS_RON: &str = include_str!("../data/items.ron");

/// Read-only static tables shared by every battle of a session.
///
/// Built once and handed to the engine by reference; nothing in the
/// engine reaches for a global table.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    moves: HashMap<MoveId, MoveData>,
    species: HashMap<SpeciesId, SpeciesData>,
    abilities: HashMap<AbilityId, AbilityData>,
    items: HashMap<HeldItemId, HeldItemData>,
}

/// Raw RON text for each table.
pub struct DataSources<'a> {
    pub moves: &'a str,
    pub species: &'a str,
    pub abilities: &'a str,
    pub items: &'a str,
}

impl GameData {
    /// Parse the tables compiled into the binary.
    pub fn embedded() -> BattleResult<Self> {
        Self::from_sources(DataSources {
            moves: MOVES_RON,
            species: SPECIES_RON,
            abilities: ABILITIES_RON,
            items: ITEMS_RON,
        })
    }

    /// Load the tables from `moves.ron`, `species.ron`, `abilities.ron` and
    /// `items.ron` inside `data_path`.
    pub fn load_from_dir(data_path: &Path) -> BattleResult<Self> {
        let read = |file: &'static str| -> BattleResult<String> {
            let path = data_path.join(file);
            fs::read_to_string(&path).map_err(|err| {
                DataError::Malformed {
                    table: file,
                    details: format!("{}: {}", path.display(), err),
                }
                .into()
            })
        };

        let moves = read("moves.ron")?;
        let species = read("species.ron")?;
        let abilities = read("abilities.ron")?;
        let items = read("items.ron")?;

        Self::from_sources(DataSources {
            moves: &moves,
            species: &species,
            abilities: &abilities,
            items: &items,
        })
    }

    pub fn from_sources(sources: DataSources<'_>) -> BattleResult<Self> {
        let moves: Vec<MoveData> = parse_table("moves", sources.moves)?;
        let species: Vec<SpeciesData> = parse_table("species", sources.species)?;
        let abilities: Vec<AbilityData> = parse_table("abilities", sources.abilities)?;
        let items: Vec<HeldItemData> = parse_table("items", sources.items)?;

        let data = Self {
            moves: moves
                .into_iter()
                .map(|mut record| {
                    record.index_effects();
                    (record.id, record)
                })
                .collect(),
            species: species.into_iter().map(|record| (record.id, record)).collect(),
            abilities: abilities
                .into_iter()
                .map(|mut record| {
                    record.index_effects();
                    (record.id, record)
                })
                .collect(),
            items: items.into_iter().map(|record| (record.id, record)).collect(),
        };

        log::debug!(
            "loaded {} moves, {} species, {} abilities, {} items",
            data.moves.len(),
            data.species.len(),
            data.abilities.len(),
            data.items.len()
        );
        Ok(data)
    }

    pub fn move_data(&self, id: MoveId) -> BattleResult<&MoveData> {
        self.moves
            .get(&id)
            .ok_or_else(|| DataError::MoveNotFound(id).into())
    }

    pub fn species(&self, id: SpeciesId) -> BattleResult<&SpeciesData> {
        self.species
            .get(&id)
            .ok_or_else(|| DataError::SpeciesNotFound(id).into())
    }

    pub fn ability(&self, id: AbilityId) -> BattleResult<&AbilityData> {
        self.abilities
            .get(&id)
            .ok_or_else(|| DataError::AbilityNotFound(id).into())
    }

    pub fn item(&self, id: HeldItemId) -> BattleResult<&HeldItemData> {
        self.items
            .get(&id)
            .ok_or_else(|| DataError::ItemNotFound(id).into())
    }

    /// Max PP for a move, or 0 if the move is unknown.
    pub fn max_pp(&self, id: MoveId) -> u8 {
        self.moves.get(&id).map(|data| data.pp).unwrap_or(0)
    }

    /// Insert or replace a move record. Used by tests that need bespoke moves.
    pub fn insert_move(&mut self, mut record: MoveData) {
        record.index_effects();
        self.moves.insert(record.id, record);
    }
}

fn parse_table<T: DeserializeOwned>(table: &'static str, source: &str) -> BattleResult<Vec<T>> {
    ron::from_str(source).map_err(|err| {
        DataError::Malformed {
            table,
            details: err.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_embedded_tables_cover_every_id() {
        let data = GameData::embedded().expect("embedded data parses");

        for id in MoveId::iter() {
            assert!(data.move_data(id).is_ok(), "missing move {:?}", id);
        }
        for id in SpeciesId::iter() {
            assert!(data.species(id).is_ok(), "missing species {:?}", id);
        }
        for id in AbilityId::iter() {
            assert!(data.ability(id).is_ok(), "missing ability {:?}", id);
        }
        for id in HeldItemId::iter() {
            assert!(data.item(id).is_ok(), "missing item {:?}", id);
        }
    }

    #[test]
    fn test_species_abilities_exist() {
        let data = GameData::embedded().expect("embedded data parses");
        for id in SpeciesId::iter() {
            let species = data.species(id).unwrap();
            for ability in species.abilities.iter().chain(std::iter::once(&species.passive)) {
                assert!(data.ability(*ability).is_ok());
            }
        }
    }

    #[test]
    fn test_malformed_table_is_reported() {
        let result = GameData::from_sources(DataSources {
            moves: "[ (id: NotAMove) ]",
            species: "[]",
            abilities: "[]",
            items: "[]",
        });
        assert!(matches!(
            result,
            Err(crate::errors::BattleError::Data(DataError::Malformed { table: "moves", .. }))
        ));
    }
}
