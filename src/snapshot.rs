//! Save snapshots of a battle between turns.
//!
//! Snapshots are JSON (`serde_json`). Tag and status records are unions
//! discriminated by a `kind` field, and every optional field falls back to a
//! default so older saves keep loading.

use crate::battle::arena::{Arena, TerrainState, WeatherState};
use crate::battle::arena_tags::{ArenaTag, DelayedHit};
use crate::battle::battler_tags::{BattlerTag, TagData};
use crate::battle::engine::BattleEngine;
use crate::battle::phase::{Phase, PhaseQueue};
use crate::battle::state::{BattleRng, BattleSide, BattleState};
use crate::config::BattleConfig;
use crate::data::GameData;
use crate::errors::{BattleResult, SnapshotError};
use crate::pokemon::{HeldItem, Pokemon, PokemonId, StatusCondition};
use schema::{
    AbilityId, ArenaTagSide, ArenaTagType, BattleStyle, BattleType, BattlerTagType, BiomeId, MoveId,
    SpeciesId, StatusEffect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn one() -> u8 {
    1
}

fn default_ivs() -> [u8; 6] {
    [15; 6]
}

// --- Arena ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum ArenaTagSnapshot {
    /// Entry hazards: layered, never time out.
    Hazard {
        tag_type: ArenaTagType,
        #[serde(default)]
        side: ArenaTagSide,
        #[serde(default = "one")]
        layers: u8,
        #[serde(default)]
        source_id: Option<PokemonId>,
    },
    /// Screens, rooms and other counted effects.
    Timed {
        tag_type: ArenaTagType,
        #[serde(default)]
        side: ArenaTagSide,
        #[serde(default)]
        turns_left: u8,
        #[serde(default)]
        source_move: Option<MoveId>,
        #[serde(default)]
        source_id: Option<PokemonId>,
    },
    /// A hit waiting to land on one field position.
    Delayed {
        #[serde(default)]
        side: ArenaTagSide,
        #[serde(default)]
        turns_left: u8,
        source_move: MoveId,
        #[serde(default)]
        source_id: Option<PokemonId>,
        #[serde(default)]
        slot: u8,
        damage: u16,
    },
    /// Neutralizing Gas and the battlers on the field emitting it.
    Suppression {
        #[serde(default)]
        sources: Vec<PokemonId>,
        #[serde(default)]
        source_id: Option<PokemonId>,
    },
}

impl ArenaTagSnapshot {
    fn capture(tag: &ArenaTag) -> Self {
        match tag.tag_type {
            ArenaTagType::NeutralizingGas => ArenaTagSnapshot::Suppression {
                sources: tag.sources.clone(),
                source_id: tag.source_id,
            },
            ArenaTagType::DelayedAttack => match (tag.delayed, tag.source_move) {
                (Some(hit), Some(source_move)) => ArenaTagSnapshot::Delayed {
                    side: tag.side,
                    turns_left: tag.turn_count,
                    source_move,
                    source_id: tag.source_id,
                    slot: hit.slot,
                    damage: hit.damage,
                },
                _ => ArenaTagSnapshot::Timed {
                    tag_type: tag.tag_type,
                    side: tag.side,
                    turns_left: tag.turn_count,
                    source_move: tag.source_move,
                    source_id: tag.source_id,
                },
            },
            ArenaTagType::Spikes
            | ArenaTagType::ToxicSpikes
            | ArenaTagType::StealthRock
            | ArenaTagType::StickyWeb => ArenaTagSnapshot::Hazard {
                tag_type: tag.tag_type,
                side: tag.side,
                layers: tag.layers,
                source_id: tag.source_id,
            },
            _ => ArenaTagSnapshot::Timed {
                tag_type: tag.tag_type,
                side: tag.side,
                turns_left: tag.turn_count,
                source_move: tag.source_move,
                source_id: tag.source_id,
            },
        }
    }

    fn restore(&self) -> ArenaTag {
        match self {
            ArenaTagSnapshot::Hazard {
                tag_type,
                side,
                layers,
                source_id,
            } => {
                let mut tag = ArenaTag::new(*tag_type, 0, None, *source_id, *side);
                tag.layers = (*layers).clamp(1, tag_type.max_layers());
                tag
            }
            ArenaTagSnapshot::Timed {
                tag_type,
                side,
                turns_left,
                source_move,
                source_id,
            } => ArenaTag::new(*tag_type, *turns_left, *source_move, *source_id, *side),
            ArenaTagSnapshot::Delayed {
                side,
                turns_left,
                source_move,
                source_id,
                slot,
                damage,
            } => {
                let mut tag = ArenaTag::new(
                    ArenaTagType::DelayedAttack,
                    *turns_left,
                    Some(*source_move),
                    *source_id,
                    *side,
                );
                tag.delayed = Some(DelayedHit {
                    slot: *slot,
                    damage: *damage,
                });
                tag
            }
            ArenaTagSnapshot::Suppression { sources, source_id } => {
                let mut tag = ArenaTag::new(ArenaTagType::NeutralizingGas, 0, None, *source_id, ArenaTagSide::Both);
                if !sources.is_empty() {
                    tag.sources = sources.clone();
                }
                tag
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ArenaSnapshot {
    #[serde(default)]
    pub biome: BiomeId,
    #[serde(default)]
    pub weather: Option<WeatherState>,
    #[serde(default)]
    pub terrain: Option<TerrainState>,
    #[serde(default)]
    pub tags: Vec<ArenaTagSnapshot>,
}

impl ArenaSnapshot {
    /// Quick Guard style protections are dropped.
    pub fn capture(arena: &Arena) -> Self {
        Self {
            biome: arena.biome,
            weather: arena.weather,
            terrain: arena.terrain,
            tags: arena
                .tags
                .iter()
                .filter(|tag| tag.is_serializable())
                .map(ArenaTagSnapshot::capture)
                .collect(),
        }
    }

    pub fn restore(&self) -> Arena {
        let mut arena = Arena::new(self.biome);
        arena.weather = self.weather;
        arena.terrain = self.terrain;
        for snapshot in &self.tags {
            let tag = snapshot.restore();
            // One tag per (type, side), or per position for delayed attacks.
            let slot = tag.delayed.map(|hit| hit.slot);
            if !arena.tags.iter().any(|present| {
                present.tag_type == tag.tag_type
                    && present.side == tag.side
                    && present.delayed.map(|hit| hit.slot) == slot
            }) {
                arena.tags.push(tag);
            }
        }
        arena
    }
}

// --- Pokemon ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum StatusSnapshot {
    Burn,
    Poison,
    Paralysis,
    Freeze,
    Sleep {
        #[serde(default)]
        turns: u8,
    },
    Toxic {
        #[serde(default)]
        counter: u8,
    },
}

impl From<StatusCondition> for StatusSnapshot {
    fn from(status: StatusCondition) -> Self {
        match status.effect {
            StatusEffect::Burn => StatusSnapshot::Burn,
            StatusEffect::Poison => StatusSnapshot::Poison,
            StatusEffect::Paralysis => StatusSnapshot::Paralysis,
            StatusEffect::Freeze => StatusSnapshot::Freeze,
            StatusEffect::Sleep => StatusSnapshot::Sleep { turns: status.turns },
            StatusEffect::Toxic => StatusSnapshot::Toxic {
                counter: status.turns,
            },
        }
    }
}

impl From<StatusSnapshot> for StatusCondition {
    fn from(snapshot: StatusSnapshot) -> Self {
        let (effect, turns) = match snapshot {
            StatusSnapshot::Burn => (StatusEffect::Burn, 0),
            StatusSnapshot::Poison => (StatusEffect::Poison, 0),
            StatusSnapshot::Paralysis => (StatusEffect::Paralysis, 0),
            StatusSnapshot::Freeze => (StatusEffect::Freeze, 0),
            StatusSnapshot::Sleep { turns } => (StatusEffect::Sleep, turns),
            StatusSnapshot::Toxic { counter } => (StatusEffect::Toxic, counter),
        };
        StatusCondition { effect, turns }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattlerTagSnapshot {
    pub tag_type: BattlerTagType,
    #[serde(default)]
    pub turns_left: u8,
    #[serde(default)]
    pub source_move: Option<MoveId>,
    #[serde(default)]
    pub source_id: Option<PokemonId>,
    #[serde(default)]
    pub data: TagData,
}

impl BattlerTagSnapshot {
    fn restore(&self) -> BattlerTag {
        BattlerTag::new(self.tag_type, self.source_move, self.source_id)
            .with_turns(self.turns_left)
            .with_data(self.data.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MoveSnapshot {
    pub move_id: MoveId,
    pub pp: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PokemonSnapshot {
    pub id: PokemonId,
    pub species: SpeciesId,
    #[serde(default)]
    pub form_index: u8,
    pub level: u8,
    #[serde(default = "default_ivs")]
    pub ivs: [u8; 6],
    pub hp: u16,
    #[serde(default)]
    pub status: Option<StatusSnapshot>,
    pub moves: Vec<MoveSnapshot>,
    /// `None` keeps the species ability.
    #[serde(default)]
    pub ability: Option<AbilityId>,
    #[serde(default)]
    pub passive_enabled: Option<bool>,
    #[serde(default)]
    pub held_items: Vec<HeldItem>,
    #[serde(default = "one")]
    pub boss_segments: u8,
    #[serde(default)]
    pub boss_segment_index: u8,
    #[serde(default)]
    pub stat_stages: [i8; 7],
    #[serde(default)]
    pub tags: Vec<BattlerTagSnapshot>,
}

impl PokemonSnapshot {
    pub fn capture(pokemon: &Pokemon) -> Self {
        Self {
            id: pokemon.id,
            species: pokemon.species,
            form_index: pokemon.form_index,
            level: pokemon.level,
            ivs: pokemon.ivs,
            hp: pokemon.current_hp(),
            status: pokemon.status.map(StatusSnapshot::from),
            moves: pokemon
                .moveset
                .iter()
                .map(|slot| MoveSnapshot {
                    move_id: slot.move_id,
                    pp: slot.pp,
                })
                .collect(),
            ability: Some(pokemon.ability),
            passive_enabled: Some(pokemon.passive_enabled),
            held_items: pokemon.held_items.clone(),
            boss_segments: pokemon.boss_segments,
            boss_segment_index: pokemon.boss_segment_index,
            stat_stages: pokemon.summon_data.stat_stages,
            tags: pokemon
                .summon_data
                .tags
                .iter()
                .filter(|tag| tag.is_serializable())
                .map(|tag| BattlerTagSnapshot {
                    tag_type: tag.tag_type,
                    turns_left: tag.turn_count,
                    source_move: tag.source_move,
                    source_id: tag.source_id,
                    data: tag.data.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild the Pokemon from species data, then lay the saved state on top.
    pub fn restore(&self, data: &GameData) -> BattleResult<Pokemon> {
        let species = data.species(self.species)?;
        let moves: Vec<MoveId> = self.moves.iter().map(|slot| slot.move_id).collect();
        let mut pokemon = Pokemon::new(self.id, species, self.level, &moves, data)?;

        pokemon.ivs = self.ivs;
        let stats = Pokemon::calculate_stats(
            species.base_stats_for_form(self.form_index).as_array(),
            self.level,
            &self.ivs,
        );
        pokemon.apply_form(self.form_index, stats, species.types_for_form(self.form_index).to_vec());
        pokemon.hp = self.hp.min(pokemon.max_hp());
        pokemon.status = self.status.map(StatusCondition::from);

        for (slot, saved) in pokemon.moveset.iter_mut().zip(&self.moves) {
            slot.pp = saved.pp.min(slot.max_pp);
        }
        if let Some(ability) = self.ability {
            pokemon.ability = ability;
        }
        if let Some(enabled) = self.passive_enabled {
            pokemon.passive_enabled = enabled && pokemon.passive != AbilityId::None;
        }
        pokemon.held_items = self.held_items.clone();
        pokemon.boss_segments = self.boss_segments.max(1);
        pokemon.boss_segment_index = self.boss_segment_index.min(pokemon.boss_segments - 1);
        pokemon.summon_data.stat_stages = self.stat_stages.map(|stage| stage.clamp(-6, 6));
        for tag in &self.tags {
            pokemon.add_tag(tag.restore());
        }
        Ok(pokemon)
    }
}

// --- Battle ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SideSnapshot {
    pub party: Vec<PokemonSnapshot>,
    /// Field slot -> party slot.
    #[serde(default)]
    pub active: Vec<Option<usize>>,
}

impl SideSnapshot {
    fn capture(side: &BattleSide) -> Self {
        Self {
            party: side.party.iter().map(PokemonSnapshot::capture).collect(),
            active: side.active.clone(),
        }
    }

    fn restore(&self, data: &GameData, field_size: usize) -> BattleResult<BattleSide> {
        let party = self
            .party
            .iter()
            .map(|pokemon| pokemon.restore(data))
            .collect::<BattleResult<Vec<_>>>()?;
        let mut side = BattleSide::new(party, field_size);
        for (slot, saved) in side.active.iter_mut().zip(&self.active) {
            *slot = saved.filter(|party_slot| *party_slot < side.party.len());
        }
        Ok(side)
    }
}

/// Everything needed to resume a battle at the next command prompt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattleSnapshot {
    pub battle_id: String,
    #[serde(default = "first_wave")]
    pub wave: u32,
    #[serde(default)]
    pub battle_type: BattleType,
    #[serde(default)]
    pub style: BattleStyle,
    #[serde(default)]
    pub turn: u32,
    #[serde(default)]
    pub arena: ArenaSnapshot,
    pub player: SideSnapshot,
    pub enemy: SideSnapshot,
}

fn first_wave() -> u32 {
    1
}

impl BattleSnapshot {
    pub fn capture(state: &BattleState) -> Self {
        Self {
            battle_id: state.battle_id.clone(),
            wave: state.wave,
            battle_type: state.battle_type,
            style: state.style,
            turn: state.turn,
            arena: ArenaSnapshot::capture(&state.arena),
            player: SideSnapshot::capture(&state.sides[0]),
            enemy: SideSnapshot::capture(&state.sides[1]),
        }
    }

    pub fn restore(&self, config: &BattleConfig, data: &GameData) -> BattleResult<BattleState> {
        let field_size = self.style.field_size();
        let mut state = BattleState::new(self.battle_id.clone(), config, Vec::new(), Vec::new());
        state.wave = self.wave;
        state.battle_type = self.battle_type;
        state.style = self.style;
        state.turn = self.turn;
        state.arena = self.arena.restore();
        state.sides = [
            self.player.restore(data, field_size)?,
            self.enemy.restore(data, field_size)?,
        ];
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|err| SnapshotError::Encode(err.to_string()))
    }

    pub fn from_json(source: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(source).map_err(|err| SnapshotError::Decode(err.to_string()))
    }
}

/// Resume a saved battle at its next command prompt. The RNG is reseeded from
/// the config seed and the saved turn.
pub fn resume_engine(
    config: BattleConfig,
    data: Arc<GameData>,
    snapshot: &BattleSnapshot,
) -> BattleResult<BattleEngine> {
    let state = snapshot.restore(&config, &data)?;
    let rng = BattleRng::from_seed(config.seed.wrapping_add(snapshot.turn as u64));
    let mut queue = PhaseQueue::new();
    queue.push_back(Phase::CommandSelection);
    log::debug!("resuming {} at turn {}", snapshot.battle_id, snapshot.turn);
    Ok(BattleEngine::from_parts(config, data, state, queue, rng))
}
