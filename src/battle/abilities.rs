use crate::battle::arena::DEFAULT_TERRAIN_TURNS;
use crate::battle::battler_tags::BattlerTag;
use crate::battle::commands::BattleCommand;
use crate::battle::events::BattleEvent;
use crate::battle::items;
use crate::battle::phase::PendingAbility;
use crate::battle::state::{BattleState, BattlerIndex};
use crate::battle::stats::{effective_speed, stat_change_commands};
use crate::data::GameData;
use crate::errors::BattleResult;
use schema::{
    AbilityCondition, AbilityEffect, AbilityEffectKind, AbilityId, AbilityTrigger, ArenaTagSide,
    ArenaTagType, BattlerTagType, ImmunityAbsorb, MoveCategory, PokemonType, StatusEffect,
};

/// What a conditional modifier may need to know about the hit being resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitContext {
    pub category: MoveCategory,
    pub effectiveness: f64,
}

fn holds_suppression_source(state: &BattleState, index: BattlerIndex) -> bool {
    state
        .pokemon(index)
        .map(|pokemon| pokemon.abilities().contains(&AbilityId::NeutralizingGas))
        .unwrap_or(false)
}

/// Inert abilities: stripped by an effect, or silenced by Neutralizing Gas
/// unless the holder is a gas source itself.
pub fn is_suppressed(state: &BattleState, index: BattlerIndex) -> BattleResult<bool> {
    let pokemon = state.active(index)?;
    if pokemon.ability_suppressed {
        return Ok(true);
    }
    Ok(state.arena.has_tag(ArenaTagType::NeutralizingGas) && !holds_suppression_source(state, index))
}

fn breaks_abilities(state: &BattleState, data: &GameData, attacker: BattlerIndex) -> BattleResult<bool> {
    if is_suppressed(state, attacker)? {
        return Ok(false);
    }
    for ability in state.active(attacker)?.abilities() {
        if data.ability(ability)?.has_effect(AbilityEffectKind::IgnoreAbilities) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Every live effect of `kind` on the holder's ability and passive.
///
/// `attacker` is the battler whose move is being resolved against the holder;
/// Mold Breaker on that attacker skips breakable abilities.
pub fn effects<'a>(
    state: &BattleState,
    data: &'a GameData,
    index: BattlerIndex,
    kind: AbilityEffectKind,
    attacker: Option<BattlerIndex>,
) -> BattleResult<Vec<(AbilityId, &'a AbilityEffect)>> {
    let mut found = Vec::new();
    if is_suppressed(state, index)? {
        return Ok(found);
    }
    let broken = match attacker {
        Some(attacker) if attacker != index => breaks_abilities(state, data, attacker)?,
        _ => false,
    };
    for ability in state.active(index)?.abilities() {
        let record = data.ability(ability)?;
        if !record.has_effect(kind) || (broken && record.breakable) {
            continue;
        }
        found.extend(record.effects_of(kind).map(|effect| (ability, effect)));
    }
    Ok(found)
}

pub fn has_effect(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    kind: AbilityEffectKind,
    attacker: Option<BattlerIndex>,
) -> BattleResult<bool> {
    Ok(!effects(state, data, index, kind, attacker)?.is_empty())
}

pub fn blocks_status(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    status: StatusEffect,
) -> BattleResult<bool> {
    Ok(effects(state, data, index, AbilityEffectKind::StatusImmunity, None)?
        .into_iter()
        .any(|(_, effect)| matches!(effect, AbilityEffect::StatusImmunity(list) if list.contains(&status))))
}

/// Magic Guard.
pub fn blocks_indirect_damage(state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<bool> {
    has_effect(state, data, index, AbilityEffectKind::BlockIndirectDamage, None)
}

pub fn ignores_screens(state: &BattleState, data: &GameData, attacker: BattlerIndex) -> BattleResult<bool> {
    has_effect(state, data, attacker, AbilityEffectKind::IgnoreScreens, None)
}

/// The holder's absorbing immunity to a move type, if one applies.
pub fn type_immunity(
    state: &BattleState,
    data: &GameData,
    defender: BattlerIndex,
    attacker: BattlerIndex,
    move_type: PokemonType,
) -> BattleResult<Option<(AbilityId, ImmunityAbsorb)>> {
    let found = effects(state, data, defender, AbilityEffectKind::TypeImmunity, Some(attacker))?
        .into_iter()
        .find_map(|(ability, effect)| match effect {
            AbilityEffect::TypeImmunity {
                move_type: immune,
                absorb,
            } if *immune == move_type => Some((ability, *absorb)),
            _ => None,
        });
    Ok(found)
}

/// The first live ability of `kind` on the holder.
fn first_ability(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    kind: AbilityEffectKind,
    attacker: Option<BattlerIndex>,
) -> BattleResult<Option<AbilityId>> {
    Ok(effects(state, data, index, kind, attacker)?
        .first()
        .map(|(ability, _)| *ability))
}

/// Protean and Libero: the user turns into the type of the move it is about to use.
pub fn type_change_commands(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    move_type: PokemonType,
) -> BattleResult<Vec<BattleCommand>> {
    if state.active(user)?.types() == [move_type] {
        return Ok(Vec::new());
    }
    let Some(ability) = first_ability(state, data, user, AbilityEffectKind::TypeChangeOnMove, None)? else {
        return Ok(Vec::new());
    };
    Ok(vec![
        BattleCommand::EmitEvent(BattleEvent::AbilityActivated { battler: user, ability }),
        BattleCommand::SetTypes {
            target: user,
            types: vec![move_type],
        },
    ])
}

/// Magic Bounce on the target of a status move. Mold Breaker gets through.
pub fn bounces_status_moves(
    state: &BattleState,
    data: &GameData,
    target: BattlerIndex,
    attacker: BattlerIndex,
) -> BattleResult<Option<AbilityId>> {
    first_ability(state, data, target, AbilityEffectKind::ReflectStatusMoves, Some(attacker))
}

/// Wimp Out and Emergency Exit.
pub fn emergency_exit(state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<Option<AbilityId>> {
    first_ability(state, data, index, AbilityEffectKind::EmergencyExit, None)
}

pub fn condition_met(
    state: &BattleState,
    index: BattlerIndex,
    condition: &AbilityCondition,
    hit: Option<&HitContext>,
) -> BattleResult<bool> {
    let pokemon = state.active(index)?;
    let met = match condition {
        AbilityCondition::Always => true,
        AbilityCondition::Weather(weathers) => state
            .arena
            .weather_type()
            .is_some_and(|weather| weathers.contains(&weather)),
        AbilityCondition::HasStatus => pokemon.status.is_some(),
        AbilityCondition::ItemLost => pokemon.item_lost,
        AbilityCondition::FullHp => pokemon.is_full_hp(),
        AbilityCondition::SuperEffective => hit.is_some_and(|hit| hit.effectiveness > 1.0),
        AbilityCondition::NotVeryEffective => {
            hit.is_some_and(|hit| hit.effectiveness > 0.0 && hit.effectiveness < 1.0)
        }
        AbilityCondition::PhysicalMove => hit.is_some_and(|hit| hit.category == MoveCategory::Physical),
    };
    Ok(met)
}

// --- Summon triggers ---

/// Summon-time abilities of the battlers that just entered, in field order,
/// ability before passive.
pub fn post_summon_triggers(
    state: &BattleState,
    data: &GameData,
    indices: &[BattlerIndex],
) -> BattleResult<Vec<PendingAbility>> {
    let mut pending = Vec::new();
    for index in indices {
        let Some(pokemon) = state.pokemon(*index).filter(|p| !p.is_fainted()) else {
            continue;
        };
        for ability in pokemon.abilities() {
            if data.ability(ability)?.has_trigger(AbilityTrigger::PostSummon) {
                pending.push(PendingAbility {
                    index: *index,
                    pokemon_id: pokemon.id,
                    ability,
                });
            }
        }
    }
    Ok(pending)
}

/// Position in `pending` of the trigger that resolves next: priority tier,
/// then current effective speed, then field position. Stale entries are ignored.
pub fn next_trigger(
    state: &BattleState,
    data: &GameData,
    pending: &[PendingAbility],
) -> BattleResult<Option<usize>> {
    let mut best: Option<(usize, i8, u32, BattlerIndex)> = None;
    for (position, trigger) in pending.iter().enumerate() {
        if !state.is_still_active(trigger.index, trigger.pokemon_id) {
            continue;
        }
        let priority = data.ability(trigger.ability)?.priority;
        let speed = effective_speed(state, data, trigger.index)?;
        let better = match best {
            None => true,
            Some((_, best_priority, best_speed, best_index)) => {
                (priority, speed) > (best_priority, best_speed)
                    || ((priority, speed) == (best_priority, best_speed) && trigger.index < best_index)
            }
        };
        if better {
            best = Some((position, priority, speed, trigger.index));
        }
    }
    Ok(best.map(|(position, ..)| position))
}

/// Commands for one summon-time ability. Empty when nothing would change.
pub fn post_summon_commands(
    state: &BattleState,
    data: &GameData,
    trigger: PendingAbility,
) -> BattleResult<Vec<BattleCommand>> {
    let index = trigger.index;
    if !state.is_still_active(index, trigger.pokemon_id) || is_suppressed(state, index)? {
        return Ok(Vec::new());
    }
    let pokemon = state.active(index)?;
    let record = data.ability(trigger.ability)?;
    let mut commands = Vec::new();

    for effect in record
        .effects
        .iter()
        .filter(|effect| effect.trigger() == AbilityTrigger::PostSummon)
    {
        match effect {
            AbilityEffect::SummonWeather(weather) => {
                let current = state.arena.weather_type();
                let blocked = current.is_some_and(|current| current.is_primal() && !weather.is_primal());
                if current != Some(*weather) && !blocked {
                    commands.push(BattleCommand::SetWeather {
                        weather: Some(*weather),
                        turns: items::weather_turns(pokemon, data, *weather)?,
                    });
                }
            }
            AbilityEffect::SummonTerrain(terrain) => {
                if state.arena.terrain_type() != Some(*terrain) {
                    commands.push(BattleCommand::SetTerrain {
                        terrain: Some(*terrain),
                        turns: DEFAULT_TERRAIN_TURNS,
                    });
                }
            }
            AbilityEffect::SuppressAbilities => {
                commands.push(BattleCommand::AddArenaTag {
                    tag_type: ArenaTagType::NeutralizingGas,
                    side: ArenaTagSide::Both,
                    turns: 0,
                    source_move: None,
                    source_id: Some(pokemon.id),
                });
            }
            AbilityEffect::SlowStart(turns) => {
                if !pokemon.has_tag(BattlerTagType::SlowStart) {
                    commands.push(BattleCommand::AddBattlerTag {
                        target: index,
                        tag: BattlerTag::new(BattlerTagType::SlowStart, None, Some(pokemon.id))
                            .with_turns(*turns),
                    });
                }
            }
            AbilityEffect::SummonStatChange { stat, delta } => {
                for opponent in state.opponents_of(index) {
                    commands.extend(stat_change_commands(
                        state,
                        data,
                        Some(index),
                        opponent,
                        *stat,
                        *delta,
                    )?);
                }
            }
            _ => {}
        }
    }

    if !commands.is_empty() {
        log::debug!("{:?} activates {:?}", index, trigger.ability);
        commands.insert(
            0,
            BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
                battler: index,
                ability: trigger.ability,
            }),
        );
    }
    Ok(commands)
}

// --- Turn end ---

/// Speed Boost only fires for a battler that acted this turn.
pub fn turn_end_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(index)?;
    let mut commands = Vec::new();
    if pokemon.is_fainted() || is_suppressed(state, index)? {
        return Ok(commands);
    }

    for ability in pokemon.abilities() {
        let record = data.ability(ability)?;
        for effect in record
            .effects
            .iter()
            .filter(|effect| effect.trigger() == AbilityTrigger::TurnEnd)
        {
            let mut produced = match effect {
                AbilityEffect::TurnEndStatChange { stat, delta } if pokemon.turn_data.acted => {
                    stat_change_commands(state, data, Some(index), index, *stat, *delta)?
                }
                AbilityEffect::WeatherHeal { weather, sixteenths } => {
                    let active = state
                        .arena
                        .weather_type()
                        .is_some_and(|current| weather.contains(&current));
                    if active && !pokemon.is_full_hp() {
                        vec![BattleCommand::Heal {
                            target: index,
                            amount: pokemon.max_hp_fraction(*sixteenths as u16, 16),
                        }]
                    } else {
                        Vec::new()
                    }
                }
                _ => Vec::new(),
            };
            if !produced.is_empty() {
                commands.push(BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
                    battler: index,
                    ability,
                }));
                commands.append(&mut produced);
            }
        }
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::events::EventBus;
    use crate::battle::tests::common::{create_test_battle, test_data, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{SpeciesId, WeatherType};

    #[test]
    fn test_neutralizing_gas_spares_its_sources() {
        let data = test_data();
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Weezing, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Kyogre, 50).build()],
        );
        let mut bus = EventBus::new();
        state.arena.add_tag(
            ArenaTagType::NeutralizingGas,
            0,
            None,
            None,
            ArenaTagSide::Both,
            &mut bus,
        );
        assert!(!is_suppressed(&state, BattlerIndex::Player).unwrap());
        assert!(is_suppressed(&state, BattlerIndex::Enemy).unwrap());
        assert!(has_effect(&state, &data, BattlerIndex::Player, AbilityEffectKind::Levitate, None).unwrap());
    }

    #[test]
    fn test_mold_breaker_ignores_breakable_abilities() {
        let data = test_data();
        let state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50)
                .with_ability(AbilityId::MoldBreaker)
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Jolteon, 50).build()],
        );
        let absorbed = type_immunity(
            &state,
            &data,
            BattlerIndex::Enemy,
            BattlerIndex::Player,
            PokemonType::Electric,
        )
        .unwrap();
        assert_eq!(absorbed, None);

        let unbroken = effects(&state, &data, BattlerIndex::Enemy, AbilityEffectKind::TypeImmunity, None).unwrap();
        assert_eq!(unbroken.len(), 1);
    }

    #[test]
    fn test_conditions() {
        let state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).with_hp(10).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
        );
        let physical = HitContext {
            category: MoveCategory::Physical,
            effectiveness: 0.5,
        };
        assert!(condition_met(&state, BattlerIndex::Player, &AbilityCondition::PhysicalMove, Some(&physical)).unwrap());
        assert!(condition_met(&state, BattlerIndex::Player, &AbilityCondition::NotVeryEffective, Some(&physical)).unwrap());
        assert!(!condition_met(&state, BattlerIndex::Player, &AbilityCondition::FullHp, None).unwrap());
        assert!(condition_met(&state, BattlerIndex::Enemy, &AbilityCondition::FullHp, None).unwrap());
        assert!(!condition_met(
            &state,
            BattlerIndex::Player,
            &AbilityCondition::Weather(vec![WeatherType::Rain]),
            None
        )
        .unwrap());
    }

    #[test]
    fn test_next_trigger_prefers_priority_then_speed() {
        let data = test_data();
        let state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Kyogre, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Weezing, 50).build()],
        );
        let pending = post_summon_triggers(&state, &data, &[BattlerIndex::Player, BattlerIndex::Enemy]).unwrap();
        assert_eq!(pending.len(), 2);
        // Weezing is slower, but Neutralizing Gas sits in a higher tier.
        let next = next_trigger(&state, &data, &pending).unwrap().unwrap();
        assert_eq!(pending[next].ability, AbilityId::NeutralizingGas);
    }

    #[test]
    fn test_weather_ability_is_silent_when_weather_is_already_set() {
        let data = test_data();
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Kyogre, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
        );
        let mut bus = EventBus::new();
        state.arena.set_weather(Some(WeatherType::Rain), 5, &mut bus);
        let trigger = PendingAbility {
            index: BattlerIndex::Player,
            pokemon_id: state.active(BattlerIndex::Player).unwrap().id,
            ability: AbilityId::Drizzle,
        };
        assert!(post_summon_commands(&state, &data, trigger).unwrap().is_empty());
    }

    #[test]
    fn test_speed_boost_requires_acting() {
        let data = test_data();
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50)
                .with_ability(AbilityId::SpeedBoost)
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
        );
        assert!(turn_end_commands(&state, &data, BattlerIndex::Player).unwrap().is_empty());

        state.active_mut(BattlerIndex::Player).unwrap().turn_data.acted = true;
        let commands = turn_end_commands(&state, &data, BattlerIndex::Player).unwrap();
        assert_eq!(commands.len(), 2);
        assert!(matches!(
            commands[1],
            BattleCommand::ChangeStatStage {
                delta: 1,
                ..
            }
        ));
    }
}
