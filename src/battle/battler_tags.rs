use crate::battle::abilities;
use crate::battle::commands::BattleCommand;
use crate::battle::damage::confusion_damage;
use crate::battle::events::{ActionPreventionReason, DamageSource};
use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use crate::battle::stats::is_grounded;
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::PokemonId;
use schema::{
    ArenaTagType, BattlerTagLapseType, BattlerTagType, MoveId, PokemonType, StatusEffect,
    TerrainType,
};
use serde::{Deserialize, Serialize};

/// Kind-specific payload carried by a battler tag.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "kind")]
pub enum TagData {
    #[default]
    None,
    Seeded {
        source: BattlerIndex,
    },
    Charging {
        move_id: MoveId,
        move_slot: Option<usize>,
        targets: Vec<BattlerIndex>,
    },
    Substitute {
        hp: u16,
    },
}

/// Outcome of giving a tag one chance to count down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagLapse {
    Kept,
    Expired,
    AlreadyLapsed,
    NotApplicable,
    Missing,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BattlerTag {
    pub tag_type: BattlerTagType,
    /// Turns left. 0 means the tag stays until something removes it.
    pub turn_count: u8,
    pub lapse_types: Vec<BattlerTagLapseType>,
    #[serde(default)]
    pub source_move: Option<MoveId>,
    #[serde(default)]
    pub source_id: Option<PokemonId>,
    #[serde(default)]
    pub data: TagData,
    /// (lapse type, turn) pairs already consumed this turn.
    #[serde(skip)]
    lapsed: Vec<(BattlerTagLapseType, u32)>,
}

impl BattlerTag {
    pub fn new(
        tag_type: BattlerTagType,
        source_move: Option<MoveId>,
        source_id: Option<PokemonId>,
    ) -> Self {
        Self {
            tag_type,
            turn_count: default_turn_count(tag_type),
            lapse_types: default_lapse_types(tag_type).to_vec(),
            source_move,
            source_id,
            data: TagData::None,
            lapsed: Vec::new(),
        }
    }

    pub fn with_turns(mut self, turn_count: u8) -> Self {
        self.turn_count = turn_count;
        self
    }

    pub fn with_data(mut self, data: TagData) -> Self {
        self.data = data;
        self
    }

    /// Single-turn protections are never saved.
    pub fn is_serializable(&self) -> bool {
        !matches!(
            self.tag_type,
            BattlerTagType::Protected
                | BattlerTagType::Enduring
                | BattlerTagType::Flinched
                | BattlerTagType::MagicCoat
        )
    }

    /// Count down once for `lapse_type`. A second call in the same turn is a no-op.
    pub fn lapse(&mut self, lapse_type: BattlerTagLapseType, turn: u32) -> TagLapse {
        if !self.lapse_types.contains(&lapse_type) {
            return TagLapse::NotApplicable;
        }
        if self.lapsed.contains(&(lapse_type, turn)) {
            return TagLapse::AlreadyLapsed;
        }
        self.lapsed.retain(|(_, lapsed_turn)| *lapsed_turn == turn);
        self.lapsed.push((lapse_type, turn));

        if self.turn_count == 0 {
            return TagLapse::Kept;
        }
        self.turn_count -= 1;
        if self.turn_count == 0 {
            TagLapse::Expired
        } else {
            TagLapse::Kept
        }
    }
}

fn default_turn_count(tag_type: BattlerTagType) -> u8 {
    match tag_type {
        BattlerTagType::Flinched
        | BattlerTagType::Recharging
        | BattlerTagType::Charging
        | BattlerTagType::Protected
        | BattlerTagType::Enduring
        | BattlerTagType::MagicCoat
        | BattlerTagType::Flying
        | BattlerTagType::Underground => 1,
        BattlerTagType::AlwaysCrit | BattlerTagType::Drowsy => 2,
        BattlerTagType::Confused => 4,
        BattlerTagType::Trapped => 5,
        BattlerTagType::PerishSong => 4,
        BattlerTagType::SlowStart => 5,
        BattlerTagType::Seeded
        | BattlerTagType::Substitute
        | BattlerTagType::CritBoost
        | BattlerTagType::IgnoreFlying
        | BattlerTagType::Commanded
        | BattlerTagType::Nightmare
        | BattlerTagType::FireBoost => 0,
    }
}

fn default_lapse_types(tag_type: BattlerTagType) -> &'static [BattlerTagLapseType] {
    use BattlerTagLapseType::*;
    match tag_type {
        BattlerTagType::Flinched => &[PreMove, TurnEnd],
        BattlerTagType::Confused | BattlerTagType::Recharging => &[PreMove],
        BattlerTagType::Flying | BattlerTagType::Underground => &[MoveEffect],
        BattlerTagType::Seeded
        | BattlerTagType::Protected
        | BattlerTagType::Enduring
        | BattlerTagType::MagicCoat
        | BattlerTagType::Trapped
        | BattlerTagType::AlwaysCrit
        | BattlerTagType::SlowStart
        | BattlerTagType::Drowsy
        | BattlerTagType::Nightmare
        | BattlerTagType::PerishSong => &[TurnEnd],
        BattlerTagType::Charging
        | BattlerTagType::Substitute
        | BattlerTagType::CritBoost
        | BattlerTagType::IgnoreFlying
        | BattlerTagType::Commanded
        | BattlerTagType::FireBoost => &[Custom],
    }
}

/// Whether `tag_type` may be added to `target` right now.
pub fn can_add_tag(
    state: &BattleState,
    data: &GameData,
    target: BattlerIndex,
    tag_type: BattlerTagType,
    from_foe: bool,
) -> BattleResult<bool> {
    let pokemon = state.active(target)?;
    if pokemon.has_tag(tag_type) {
        return Ok(false);
    }

    let side_guarded = from_foe
        && state
            .arena
            .has_tag_on_side(ArenaTagType::Safeguard, target.side().arena_side());
    let misty = state.arena.terrain_type() == Some(TerrainType::Misty)
        && is_grounded(state, data, target)?;

    let allowed = match tag_type {
        BattlerTagType::Seeded => !pokemon.has_type(PokemonType::Grass),
        BattlerTagType::Nightmare => pokemon.has_status(StatusEffect::Sleep),
        BattlerTagType::Confused => !side_guarded && !misty,
        BattlerTagType::Drowsy => {
            let electric = state.arena.terrain_type() == Some(TerrainType::Electric)
                && is_grounded(state, data, target)?;
            pokemon.status.is_none()
                && !side_guarded
                && !misty
                && !electric
                && !abilities::blocks_status(state, data, target, StatusEffect::Sleep)?
        }
        BattlerTagType::Trapped => !pokemon.has_type(PokemonType::Ghost),
        _ => true,
    };
    Ok(allowed)
}

/// Checks made before a battler's move executes. Returns the commands to run and
/// the reason the move is cancelled, if it is.
pub fn pre_move_checks(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    rng: &mut BattleRng,
) -> BattleResult<(Vec<BattleCommand>, Option<ActionPreventionReason>)> {
    let pokemon = state.active(index)?;
    let mut commands = Vec::new();

    if pokemon.has_tag(BattlerTagType::Commanded) {
        return Ok((commands, Some(ActionPreventionReason::Commanded)));
    }

    if pokemon.has_tag(BattlerTagType::Recharging) {
        commands.push(BattleCommand::RemoveBattlerTag {
            target: index,
            tag_type: BattlerTagType::Recharging,
        });
        return Ok((commands, Some(ActionPreventionReason::Recharging)));
    }

    if pokemon.has_tag(BattlerTagType::Flinched) {
        commands.push(BattleCommand::RemoveBattlerTag {
            target: index,
            tag_type: BattlerTagType::Flinched,
        });
        return Ok((commands, Some(ActionPreventionReason::Flinched)));
    }

    if let Some(confusion) = pokemon.get_tag(BattlerTagType::Confused) {
        let expiring = confusion.turn_count == 1;
        commands.push(BattleCommand::LapseBattlerTag {
            target: index,
            tag_type: BattlerTagType::Confused,
            lapse: BattlerTagLapseType::PreMove,
        });
        if !expiring {
            let hits_self = match state.overrides.status_activation {
                Some(forced) => forced,
                None => rng.rand_int(3, "confusion self-hit") == 0,
            };
            if hits_self {
                let damage = confusion_damage(state, data, index)?;
                commands.push(BattleCommand::DealIndirectDamage {
                    target: index,
                    amount: damage,
                    source: DamageSource::Confusion,
                });
                return Ok((commands, Some(ActionPreventionReason::Confused)));
            }
        }
    }

    Ok((commands, None))
}

/// Residual effects of every turn-end tag on one battler, followed by the countdown.
pub fn turn_end_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    rng: &mut BattleRng,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(index)?;
    let mut commands = Vec::new();
    if pokemon.is_fainted() {
        return Ok(commands);
    }
    let guarded = abilities::blocks_indirect_damage(state, data, index)?;

    for tag in &pokemon.summon_data.tags {
        if !tag.lapse_types.contains(&BattlerTagLapseType::TurnEnd) {
            continue;
        }
        match tag.tag_type {
            BattlerTagType::Seeded if !guarded => {
                let damage = pokemon.max_hp_fraction(1, 8).min(pokemon.current_hp());
                commands.push(BattleCommand::DealIndirectDamage {
                    target: index,
                    amount: damage,
                    source: DamageSource::Tag(BattlerTagType::Seeded),
                });
                if let TagData::Seeded { source } = tag.data {
                    // The seeder's position is healed only if someone alive stands there.
                    if state.pokemon(source).is_some_and(|p| !p.is_fainted()) {
                        commands.push(BattleCommand::Heal {
                            target: source,
                            amount: damage,
                        });
                    }
                }
            }
            BattlerTagType::Trapped if !guarded => {
                commands.push(BattleCommand::DealIndirectDamage {
                    target: index,
                    amount: pokemon.max_hp_fraction(1, 8),
                    source: DamageSource::Tag(BattlerTagType::Trapped),
                });
            }
            BattlerTagType::Nightmare => {
                if !pokemon.has_status(StatusEffect::Sleep) {
                    commands.push(BattleCommand::RemoveBattlerTag {
                        target: index,
                        tag_type: BattlerTagType::Nightmare,
                    });
                    continue;
                }
                if !guarded {
                    commands.push(BattleCommand::DealIndirectDamage {
                        target: index,
                        amount: pokemon.max_hp_fraction(1, 4),
                        source: DamageSource::Tag(BattlerTagType::Nightmare),
                    });
                }
            }
            BattlerTagType::PerishSong if tag.turn_count == 1 => {
                commands.push(BattleCommand::Faint { target: index });
            }
            BattlerTagType::Drowsy if tag.turn_count == 1 => {
                if pokemon.can_set_status(StatusEffect::Sleep)
                    && !abilities::blocks_status(state, data, index, StatusEffect::Sleep)?
                {
                    let turns = rng.rand_range(2, 4, "yawn sleep turns") as u8;
                    commands.push(BattleCommand::SetStatus {
                        target: index,
                        status: StatusEffect::Sleep,
                        turns,
                    });
                }
            }
            _ => {}
        }
        commands.push(BattleCommand::LapseBattlerTag {
            target: index,
            tag_type: tag.tag_type,
            lapse: BattlerTagLapseType::TurnEnd,
        });
    }

    Ok(commands)
}
