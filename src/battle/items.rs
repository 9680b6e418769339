use crate::battle::arena::DEFAULT_WEATHER_TURNS;
use crate::battle::commands::BattleCommand;
use crate::battle::events::{BattleEvent, DamageSource};
use crate::battle::state::{BattleState, BattlerIndex};
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::Pokemon;
use schema::{HeldItemEffect, HeldItemEffectKind, HeldItemId, Stat, WeatherType};

/// Enabled items of the holder with their stack counts.
fn held<'a>(
    pokemon: &'a Pokemon,
    data: &'a GameData,
    kind: HeldItemEffectKind,
) -> impl Iterator<Item = BattleResult<(HeldItemId, u8, &'a HeldItemEffect)>> + 'a {
    pokemon
        .held_items
        .iter()
        .filter(|item| item.enabled && item.stack_count > 0)
        .flat_map(move |item| match data.item(item.id) {
            Ok(record) => record
                .effects_of(kind)
                .map(|effect| Ok((item.id, item.stack_count, effect)))
                .collect::<Vec<_>>(),
            Err(err) => vec![Err(err)],
        })
}

pub fn stat_multiplier(pokemon: &Pokemon, data: &GameData, stat: Stat) -> BattleResult<f64> {
    let mut multiplier = 1.0;
    for entry in held(pokemon, data, HeldItemEffectKind::StatMultiplier) {
        if let (_, _, HeldItemEffect::StatMultiplier { stat: boosted, percent }) = entry? {
            if *boosted == stat {
                multiplier *= *percent as f64 / 100.0;
            }
        }
    }
    Ok(multiplier)
}

/// Extra crit stages, one per stack.
pub fn crit_stages(pokemon: &Pokemon, data: &GameData) -> BattleResult<u8> {
    let mut stages = 0u8;
    for entry in held(pokemon, data, HeldItemEffectKind::CritStage) {
        if let (_, stacks, HeldItemEffect::CritStage(per_stack)) = entry? {
            stages = stages.saturating_add(per_stack.saturating_mul(stacks));
        }
    }
    Ok(stages)
}

pub fn accuracy_multiplier(pokemon: &Pokemon, data: &GameData) -> BattleResult<f64> {
    let mut multiplier = 1.0;
    for entry in held(pokemon, data, HeldItemEffectKind::AccuracyMultiplier) {
        if let (_, _, HeldItemEffect::AccuracyMultiplier(percent)) = entry? {
            multiplier *= *percent as f64 / 100.0;
        }
    }
    Ok(multiplier)
}

/// Life Orb style boost, with the recoil divisor paid after the move.
pub fn damage_boost(pokemon: &Pokemon, data: &GameData) -> BattleResult<Option<(HeldItemId, f64, u16)>> {
    for entry in held(pokemon, data, HeldItemEffectKind::DamageBoostWithRecoil) {
        if let (
            id,
            _,
            HeldItemEffect::DamageBoostWithRecoil {
                percent,
                recoil_divisor,
            },
        ) = entry?
        {
            return Ok(Some((id, *percent as f64 / 100.0, *recoil_divisor)));
        }
    }
    Ok(None)
}

/// Percent chance to flinch the target of a damaging hit.
pub fn flinch_chance(pokemon: &Pokemon, data: &GameData) -> BattleResult<u8> {
    let mut chance = 0u8;
    for entry in held(pokemon, data, HeldItemEffectKind::FlinchChance) {
        if let (_, stacks, HeldItemEffect::FlinchChance(per_stack)) = entry? {
            chance = chance.saturating_add(per_stack.saturating_mul(stacks));
        }
    }
    Ok(chance.min(100))
}

/// Focus Band style survival chance, with the item that grants it.
pub fn survive_chance(pokemon: &Pokemon, data: &GameData) -> BattleResult<Option<(HeldItemId, u8)>> {
    for entry in held(pokemon, data, HeldItemEffectKind::SurviveChance) {
        if let (id, stacks, HeldItemEffect::SurviveChance(per_stack)) = entry? {
            return Ok(Some((id, per_stack.saturating_mul(stacks).min(100))));
        }
    }
    Ok(None)
}

/// Screen duration for a setter holding Light Clay.
pub fn screen_turns(pokemon: &Pokemon, data: &GameData, default: u8) -> BattleResult<u8> {
    for entry in held(pokemon, data, HeldItemEffectKind::ExtendScreens) {
        if let (_, _, HeldItemEffect::ExtendScreens(turns)) = entry? {
            return Ok(*turns);
        }
    }
    Ok(default)
}

/// Weather duration for a setter, extended by the matching rock.
pub fn weather_turns(pokemon: &Pokemon, data: &GameData, weather: WeatherType) -> BattleResult<u8> {
    for entry in held(pokemon, data, HeldItemEffectKind::ExtendWeather) {
        if let (_, _, HeldItemEffect::ExtendWeather { weather: extended, turns }) = entry? {
            if *extended == weather {
                return Ok(*turns);
            }
        }
    }
    Ok(DEFAULT_WEATHER_TURNS)
}

pub fn multi_hit_minimum(pokemon: &Pokemon, data: &GameData) -> BattleResult<Option<u8>> {
    for entry in held(pokemon, data, HeldItemEffectKind::MultiHitMinimum) {
        if let (_, _, HeldItemEffect::MultiHitMinimum(minimum)) = entry? {
            return Ok(Some(*minimum));
        }
    }
    Ok(None)
}

/// Leftovers heal, scaled by stacks.
pub fn turn_end_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(index)?;
    let mut commands = Vec::new();
    if pokemon.is_fainted() || pokemon.is_full_hp() {
        return Ok(commands);
    }
    for entry in held(pokemon, data, HeldItemEffectKind::TurnEndHeal) {
        if let (id, stacks, HeldItemEffect::TurnEndHeal { sixteenths }) = entry? {
            commands.push(BattleCommand::EmitEvent(BattleEvent::ItemActivated {
                battler: index,
                item: id,
            }));
            commands.push(BattleCommand::Heal {
                target: index,
                amount: pokemon.max_hp_fraction(*sixteenths as u16 * stacks as u16, 16),
            });
        }
    }
    Ok(commands)
}

/// Threshold berries, checked after the holder takes damage.
pub fn after_damage_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
) -> BattleResult<Vec<BattleCommand>> {
    let Some(pokemon) = state.pokemon(index).filter(|p| !p.is_fainted()) else {
        return Ok(Vec::new());
    };
    let mut commands = Vec::new();
    for entry in held(pokemon, data, HeldItemEffectKind::HealAtThreshold) {
        if let (
            id,
            _,
            HeldItemEffect::HealAtThreshold {
                threshold_percent,
                heal_percent,
            },
        ) = entry?
        {
            if pokemon.current_hp() as u32 * 100 <= pokemon.max_hp() as u32 * *threshold_percent as u32 {
                commands.push(BattleCommand::ConsumeItem {
                    target: index,
                    item: id,
                });
                commands.push(BattleCommand::Heal {
                    target: index,
                    amount: pokemon.max_hp_fraction(*heal_percent as u16, 100),
                });
                break;
            }
        }
    }
    Ok(commands)
}

/// Life Orb recoil after a move that dealt damage.
pub fn after_move_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    magic_guard: bool,
) -> BattleResult<Vec<BattleCommand>> {
    let Some(pokemon) = state.pokemon(index).filter(|p| !p.is_fainted()) else {
        return Ok(Vec::new());
    };
    match damage_boost(pokemon, data)? {
        Some((id, _, divisor)) if !magic_guard => Ok(vec![BattleCommand::DealIndirectDamage {
            target: index,
            amount: pokemon.max_hp_fraction(1, divisor),
            source: DamageSource::Item(id),
        }]),
        _ => Ok(Vec::new()),
    }
}
