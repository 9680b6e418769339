use crate::battle::abilities;
use crate::battle::commands::BattleCommand;
use crate::battle::events::{BattleEvent, DamageSource};
use crate::battle::state::{BattleState, BattlerIndex, Side};
use crate::battle::stats::{is_grounded, stat_change_commands};
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::PokemonId;
use schema::{
    ArenaTagSide, ArenaTagType, BattleStat, MoveCategory, MoveId, PokemonType, StatusEffect,
    TerrainType,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArenaTag {
    pub tag_type: ArenaTagType,
    #[serde(default)]
    pub side: ArenaTagSide,
    /// Turns left. 0 means the tag stays until removed.
    #[serde(default)]
    pub turn_count: u8,
    #[serde(default = "one")]
    pub layers: u8,
    #[serde(default)]
    pub source_move: Option<MoveId>,
    #[serde(default)]
    pub source_id: Option<PokemonId>,
    /// Battlers on the field keeping a suppression tag alive.
    #[serde(default)]
    pub sources: Vec<PokemonId>,
    #[serde(default)]
    pub delayed: Option<DelayedHit>,
}

/// A hit locked in by a delayed attack, waiting for its turn.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedHit {
    /// Field position on the tag's side.
    pub slot: u8,
    pub damage: u16,
}

fn one() -> u8 {
    1
}

impl ArenaTag {
    pub fn new(
        tag_type: ArenaTagType,
        turn_count: u8,
        source_move: Option<MoveId>,
        source_id: Option<PokemonId>,
        side: ArenaTagSide,
    ) -> Self {
        Self {
            tag_type,
            side,
            turn_count,
            layers: 1,
            source_move,
            source_id,
            sources: match tag_type {
                ArenaTagType::NeutralizingGas => source_id.into_iter().collect(),
                _ => Vec::new(),
            },
            delayed: None,
        }
    }

    /// True on the turn end a delayed attack lands.
    pub fn is_due(&self) -> bool {
        self.delayed.is_some() && self.turn_count == 1
    }

    /// Count down one turn. Returns false once the tag has run out.
    pub fn lapse(&mut self) -> bool {
        if self.turn_count < 1 {
            return true;
        }
        self.turn_count -= 1;
        self.turn_count > 0
    }

    pub fn is_serializable(&self) -> bool {
        self.tag_type.is_serializable()
    }
}

/// Duration for a freshly placed tag. Screens are extended by the setter's item.
pub fn default_turns(tag_type: ArenaTagType) -> u8 {
    match tag_type {
        ArenaTagType::Spikes
        | ArenaTagType::ToxicSpikes
        | ArenaTagType::StealthRock
        | ArenaTagType::StickyWeb
        | ArenaTagType::NeutralizingGas => 0,
        ArenaTagType::Tailwind
        | ArenaTagType::FireGrassPledge
        | ArenaTagType::WaterFirePledge
        | ArenaTagType::GrassWaterPledge => 4,
        ArenaTagType::QuickGuard | ArenaTagType::WideGuard => 1,
        ArenaTagType::DelayedAttack => 3,
        ArenaTagType::Reflect
        | ArenaTagType::LightScreen
        | ArenaTagType::AuroraVeil
        | ArenaTagType::TrickRoom
        | ArenaTagType::Gravity
        | ArenaTagType::Mist
        | ArenaTagType::Safeguard
        | ArenaTagType::LuckyChant
        | ArenaTagType::MudSport
        | ArenaTagType::WaterSport => 5,
    }
}

/// Screen multiplier on the defender's side. Crits and Infiltrator ignore screens.
pub fn screen_multiplier(
    state: &BattleState,
    data: &GameData,
    attacker: BattlerIndex,
    defender: BattlerIndex,
    category: MoveCategory,
    is_crit: bool,
) -> BattleResult<f64> {
    if is_crit || category == MoveCategory::Status {
        return Ok(1.0);
    }
    let side = defender.side().arena_side();
    let screened = state
        .arena
        .tags
        .iter()
        .filter(|tag| tag.side == side)
        .any(|tag| match tag.tag_type {
            ArenaTagType::Reflect => category == MoveCategory::Physical,
            ArenaTagType::LightScreen => category == MoveCategory::Special,
            ArenaTagType::AuroraVeil => true,
            _ => false,
        });
    if !screened || abilities::ignores_screens(state, data, attacker)? {
        return Ok(1.0);
    }
    Ok(if state.is_double() { 2.0 / 3.0 } else { 0.5 })
}

/// Power multiplier from Mud Sport / Water Sport.
pub fn sport_multiplier(state: &BattleState, move_type: PokemonType) -> f64 {
    let weakened = match move_type {
        PokemonType::Electric => state.arena.has_tag(ArenaTagType::MudSport),
        PokemonType::Fire => state.arena.has_tag(ArenaTagType::WaterSport),
        _ => false,
    };
    if weakened {
        1.0 / 3.0
    } else {
        1.0
    }
}

/// Secondary effect chance multiplier for a side under the rainbow.
pub fn secondary_chance_multiplier(state: &BattleState, side: Side) -> u8 {
    if state
        .arena
        .has_tag_on_side(ArenaTagType::WaterFirePledge, side.arena_side())
    {
        2
    } else {
        1
    }
}

/// Hazard effects on a battler entering the field, in hazard placement order.
pub fn entry_hazard_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(index)?;
    let side = index.side().arena_side();
    let grounded = is_grounded(state, data, index)?;
    let guarded = abilities::blocks_indirect_damage(state, data, index)?;
    let mut commands = Vec::new();

    for tag in state.arena.tags.iter().filter(|tag| tag.side == side) {
        match tag.tag_type {
            ArenaTagType::Spikes if grounded && !guarded => {
                let denominator = match tag.layers {
                    1 => 8,
                    2 => 6,
                    _ => 4,
                };
                commands.push(BattleCommand::DealIndirectDamage {
                    target: index,
                    amount: pokemon.max_hp_fraction(1, denominator),
                    source: DamageSource::Hazard(ArenaTagType::Spikes),
                });
            }
            ArenaTagType::StealthRock if !guarded => {
                let effectiveness = PokemonType::effectiveness_against(PokemonType::Rock, pokemon.types());
                let amount = (pokemon.max_hp() as f64 * effectiveness / 8.0).floor() as u16;
                if amount > 0 {
                    commands.push(BattleCommand::DealIndirectDamage {
                        target: index,
                        amount,
                        source: DamageSource::Hazard(ArenaTagType::StealthRock),
                    });
                }
            }
            ArenaTagType::ToxicSpikes if grounded => {
                if pokemon.has_type(PokemonType::Poison) {
                    commands.push(BattleCommand::RemoveArenaTag {
                        tag_type: ArenaTagType::ToxicSpikes,
                        side,
                    });
                    continue;
                }
                let status = if tag.layers >= 2 {
                    StatusEffect::Toxic
                } else {
                    StatusEffect::Poison
                };
                let safeguarded = state.arena.has_tag_on_side(ArenaTagType::Safeguard, side);
                let misty = state.arena.terrain_type() == Some(TerrainType::Misty);
                if pokemon.can_set_status(status)
                    && !safeguarded
                    && !misty
                    && !abilities::blocks_status(state, data, index, status)?
                {
                    commands.push(BattleCommand::SetStatus {
                        target: index,
                        status,
                        turns: 0,
                    });
                }
            }
            ArenaTagType::StickyWeb if grounded => {
                commands.extend(stat_change_commands(
                    state,
                    data,
                    None,
                    index,
                    BattleStat::Speed,
                    -1,
                )?);
            }
            _ => {}
        }
    }

    Ok(commands)
}

/// Turn-end damage from the sea of fire to every non-Fire battler on its side.
pub fn turn_end_commands(state: &BattleState, data: &GameData) -> BattleResult<Vec<BattleCommand>> {
    let mut commands = Vec::new();
    for tag in &state.arena.tags {
        if tag.tag_type != ArenaTagType::FireGrassPledge {
            continue;
        }
        for index in state.active_indices() {
            if tag.side != ArenaTagSide::Both && tag.side != index.side().arena_side() {
                continue;
            }
            let pokemon = state.active(index)?;
            if pokemon.has_type(PokemonType::Fire)
                || abilities::blocks_indirect_damage(state, data, index)?
            {
                continue;
            }
            commands.push(BattleCommand::DealIndirectDamage {
                target: index,
                amount: pokemon.max_hp_fraction(1, 8),
                source: DamageSource::ArenaTag(ArenaTagType::FireGrassPledge),
            });
        }
    }
    Ok(commands)
}

/// Delayed attacks due this turn end, each on whoever now stands at its position.
pub fn delayed_attack_commands(state: &BattleState) -> Vec<BattleCommand> {
    let mut commands = Vec::new();
    for tag in state.arena.tags.iter().filter(|tag| tag.is_due()) {
        let (Some(hit), Some(move_used)) = (tag.delayed, tag.source_move) else {
            continue;
        };
        let side = match tag.side {
            ArenaTagSide::Player => Side::Player,
            ArenaTagSide::Enemy => Side::Enemy,
            ArenaTagSide::Both => continue,
        };
        let Some(target) = BattlerIndex::new(side, hit.slot as usize) else {
            continue;
        };
        if state.pokemon(target).map_or(true, |pokemon| pokemon.is_fainted()) {
            continue;
        }
        commands.push(BattleCommand::EmitEvent(BattleEvent::DelayedAttackLanded { target, move_used }));
        commands.push(if hit.damage == 0 {
            BattleCommand::EmitEvent(BattleEvent::MoveNoEffect { target, move_used })
        } else {
            BattleCommand::DealDamage {
                target,
                amount: hit.damage,
            }
        });
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ArenaTagType::Spikes, 0)]
    #[case(ArenaTagType::Reflect, 5)]
    #[case(ArenaTagType::Tailwind, 4)]
    #[case(ArenaTagType::GrassWaterPledge, 4)]
    #[case(ArenaTagType::WideGuard, 1)]
    #[case(ArenaTagType::DelayedAttack, 3)]
    fn test_default_turns(#[case] tag_type: ArenaTagType, #[case] expected: u8) {
        assert_eq!(default_turns(tag_type), expected);
    }

    #[test]
    fn test_lapse_counts_down() {
        let mut tag = ArenaTag::new(ArenaTagType::Mist, 2, None, None, ArenaTagSide::Player);
        assert!(tag.lapse());
        assert!(!tag.lapse());

        let mut hazard = ArenaTag::new(ArenaTagType::StealthRock, 0, None, None, ArenaTagSide::Enemy);
        assert!(hazard.lapse());
    }

    #[test]
    fn test_all_serializable_tags_round_trip() {
        use strum::IntoEnumIterator;
        for tag_type in ArenaTagType::iter().filter(|t| t.is_serializable()) {
            let mut tag = ArenaTag::new(tag_type, 3, Some(MoveId::Tackle), Some(PokemonId(9)), ArenaTagSide::Enemy);
            tag.layers = tag_type.max_layers();
            let json = serde_json::to_string(&tag).unwrap();
            let back: ArenaTag = serde_json::from_str(&json).unwrap();
            assert_eq!(back, tag);
        }
    }

    #[test]
    fn test_missing_fields_default() {
        let tag: ArenaTag = serde_json::from_str(r#"{"tag_type":"Spikes"}"#).unwrap();
        assert_eq!(tag.side, ArenaTagSide::Both);
        assert_eq!(tag.layers, 1);
        assert_eq!(tag.turn_count, 0);
        assert_eq!(tag.source_id, None);
    }
}
