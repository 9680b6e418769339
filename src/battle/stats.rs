use crate::battle::abilities::{self, condition_met};
use crate::battle::commands::BattleCommand;
use crate::battle::events::{BattleEvent, StatBlockReason};
use crate::battle::items;
use crate::battle::state::{BattleState, BattlerIndex};
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::{stat_stage_multiplier, MAX_STAT_STAGE, MIN_STAT_STAGE};
use schema::{
    AbilityEffect, AbilityEffectKind, ArenaTagType, BattleStat, BattlerTagType, PokemonType, Stat,
    StatusEffect, WeatherType,
};

/// A stat after stages, held items, abilities and field modifiers.
///
/// `stage` is passed in so callers can drop stages (moves that ignore them,
/// critical hits ignoring unfavourable stages).
pub fn effective_stat(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    stat: Stat,
    stage: i8,
) -> BattleResult<u32> {
    let pokemon = state.active(index)?;
    let mut value = pokemon.stat(stat) as f64;
    if stat != Stat::Hp {
        value *= stat_stage_multiplier(stage);
    }

    value *= items::stat_multiplier(pokemon, data, stat)?;

    for (_, effect) in abilities::effects(state, data, index, AbilityEffectKind::StatMultiplier, None)? {
        if let AbilityEffect::StatMultiplier {
            stat: boosted,
            percent,
            condition,
        } = effect
        {
            if *boosted == stat && condition_met(state, index, condition, None)? {
                value *= *percent as f64 / 100.0;
            }
        }
    }

    if pokemon.has_tag(BattlerTagType::SlowStart) && matches!(stat, Stat::Attack | Stat::Speed) {
        value *= 0.5;
    }

    match (state.arena.weather_type(), stat) {
        (Some(WeatherType::Sandstorm), Stat::SpDefense) if pokemon.has_type(PokemonType::Rock) => {
            value *= 1.5;
        }
        (Some(WeatherType::Snow), Stat::Defense) if pokemon.has_type(PokemonType::Ice) => {
            value *= 1.5;
        }
        _ => {}
    }

    Ok((value.floor() as u32).max(1))
}

/// Speed used for turn order and ability ordering.
pub fn effective_speed(state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<u32> {
    let pokemon = state.active(index)?;
    let stage = pokemon.stat_stage(BattleStat::Speed);
    let mut speed = effective_stat(state, data, index, Stat::Speed, stage)? as f64;

    if pokemon.has_status(StatusEffect::Paralysis) {
        speed *= 0.5;
    }
    let side = index.side().arena_side();
    if state.arena.has_tag_on_side(ArenaTagType::Tailwind, side) {
        speed *= 2.0;
    }
    if state.arena.has_tag_on_side(ArenaTagType::GrassWaterPledge, side) {
        speed *= 0.25;
    }

    Ok((speed.floor() as u32).max(1))
}

/// Fastest first (slowest first under Trick Room); ties by field position.
pub fn speed_order(
    state: &BattleState,
    data: &GameData,
    indices: &[BattlerIndex],
) -> BattleResult<Vec<BattlerIndex>> {
    let trick_room = state.arena.has_tag(ArenaTagType::TrickRoom);
    let mut keyed = Vec::with_capacity(indices.len());
    for index in indices {
        keyed.push((*index, effective_speed(state, data, *index)?));
    }
    keyed.sort_by(|a, b| {
        let by_speed = if trick_room { a.1.cmp(&b.1) } else { b.1.cmp(&a.1) };
        by_speed.then_with(|| a.0.cmp(&b.0))
    });
    Ok(keyed.into_iter().map(|(index, _)| index).collect())
}

/// Whether ground-based effects (hazards, terrain) reach this battler.
pub fn is_grounded(state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<bool> {
    let pokemon = state.active(index)?;
    if state.arena.has_tag(ArenaTagType::Gravity) || pokemon.has_tag(BattlerTagType::IgnoreFlying) {
        return Ok(true);
    }
    if pokemon.has_type(PokemonType::Flying) || pokemon.has_tag(BattlerTagType::Flying) {
        return Ok(false);
    }
    Ok(!abilities::has_effect(state, data, index, AbilityEffectKind::Levitate, None)?)
}

/// Commands for a stat stage change, honouring caps, Mist, Substitute and
/// stat-drop abilities. `source` is the battler causing the change; `None`
/// means the field (hazards) and counts as a foe.
pub fn stat_change_commands(
    state: &BattleState,
    data: &GameData,
    source: Option<BattlerIndex>,
    target: BattlerIndex,
    stat: BattleStat,
    delta: i8,
) -> BattleResult<Vec<BattleCommand>> {
    stat_change_inner(state, data, source, target, stat, delta, true)
}

fn stat_change_inner(
    state: &BattleState,
    data: &GameData,
    source: Option<BattlerIndex>,
    target: BattlerIndex,
    stat: BattleStat,
    delta: i8,
    allow_reflect: bool,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(target)?;
    let from_foe = source.map_or(true, |source| source.side() != target.side());
    let blocked = |reason| {
        vec![BattleCommand::EmitEvent(BattleEvent::StatChangeBlocked {
            target,
            stat,
            reason,
        })]
    };

    if delta < 0 && from_foe {
        if source.is_some() && pokemon.has_tag(BattlerTagType::Substitute) {
            return Ok(blocked(StatBlockReason::Substitute));
        }
        if state
            .arena
            .has_tag_on_side(ArenaTagType::Mist, target.side().arena_side())
        {
            return Ok(blocked(StatBlockReason::Mist));
        }
        let clear_body =
            abilities::effects(state, data, target, AbilityEffectKind::BlockStatDrops, source)?;
        if let Some((ability, _)) = clear_body.first() {
            let mut commands = vec![BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
                battler: target,
                ability: *ability,
            })];
            commands.extend(blocked(StatBlockReason::Ability(*ability)));
            return Ok(commands);
        }
        if allow_reflect {
            let mirror =
                abilities::effects(state, data, target, AbilityEffectKind::ReflectStatDrops, source)?;
            if let (Some((ability, _)), Some(source)) = (mirror.first(), source) {
                if source != target && state.pokemon(source).is_some_and(|p| !p.is_fainted()) {
                    let mut commands = vec![BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
                        battler: target,
                        ability: *ability,
                    })];
                    commands.extend(stat_change_inner(
                        state,
                        data,
                        Some(target),
                        source,
                        stat,
                        delta,
                        false,
                    )?);
                    return Ok(commands);
                }
            }
        }
    }

    let stage = pokemon.stat_stage(stat);
    if delta > 0 && stage >= MAX_STAT_STAGE {
        return Ok(blocked(StatBlockReason::AtMaximum));
    }
    if delta < 0 && stage <= MIN_STAT_STAGE {
        return Ok(blocked(StatBlockReason::AtMinimum));
    }

    Ok(vec![BattleCommand::ChangeStatStage {
        target,
        stat,
        delta,
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, test_data, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{AbilityId, ArenaTagSide, SpeciesId};

    fn pikachu_vs(species: SpeciesId) -> BattleState {
        create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
            vec![TestPokemonBuilder::new(species, 50).build()],
        )
    }

    #[test]
    fn test_speed_modifiers_stack() {
        let data = test_data();
        let mut state = pikachu_vs(SpeciesId::Snorlax);
        assert_eq!(effective_speed(&state, &data, BattlerIndex::Player).unwrap(), 102);
        assert_eq!(effective_speed(&state, &data, BattlerIndex::Enemy).unwrap(), 42);

        state
            .active_mut(BattlerIndex::Enemy)
            .unwrap()
            .set_status(StatusEffect::Paralysis, 0);
        assert_eq!(effective_speed(&state, &data, BattlerIndex::Enemy).unwrap(), 21);

        let mut bus = crate::battle::events::EventBus::new();
        state.arena.add_tag(ArenaTagType::Tailwind, 4, None, None, ArenaTagSide::Player, &mut bus);
        assert_eq!(effective_speed(&state, &data, BattlerIndex::Player).unwrap(), 204);
        assert_eq!(effective_speed(&state, &data, BattlerIndex::Enemy).unwrap(), 21);
    }

    #[test]
    fn test_slow_start_halves_attack_and_speed() {
        let data = test_data();
        let mut state = pikachu_vs(SpeciesId::Regigigas);
        let before = effective_speed(&state, &data, BattlerIndex::Enemy).unwrap();
        assert_eq!(before, 112);
        state
            .active_mut(BattlerIndex::Enemy)
            .unwrap()
            .add_tag(crate::battle::battler_tags::BattlerTag::new(BattlerTagType::SlowStart, None, None));
        assert_eq!(effective_speed(&state, &data, BattlerIndex::Enemy).unwrap(), 56);
    }

    #[test]
    fn test_speed_order_ties_break_by_position() {
        let data = test_data();
        let state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
        );
        let order = speed_order(&state, &data, &[BattlerIndex::Enemy, BattlerIndex::Player]).unwrap();
        assert_eq!(order, vec![BattlerIndex::Player, BattlerIndex::Enemy]);
    }

    #[test]
    fn test_stat_change_at_cap_reports_no_change() {
        let data = test_data();
        let mut state = pikachu_vs(SpeciesId::Snorlax);
        state
            .active_mut(BattlerIndex::Player)
            .unwrap()
            .set_stat_stage(BattleStat::Attack, 6);
        let commands = stat_change_commands(
            &state,
            &data,
            Some(BattlerIndex::Player),
            BattlerIndex::Player,
            BattleStat::Attack,
            2,
        )
        .unwrap();
        assert_eq!(
            commands,
            vec![BattleCommand::EmitEvent(BattleEvent::StatChangeBlocked {
                target: BattlerIndex::Player,
                stat: BattleStat::Attack,
                reason: StatBlockReason::AtMaximum,
            })]
        );
    }

    #[test]
    fn test_mist_blocks_foe_drops_only() {
        let data = test_data();
        let mut state = pikachu_vs(SpeciesId::Snorlax);
        let mut bus = crate::battle::events::EventBus::new();
        state.arena.add_tag(ArenaTagType::Mist, 5, None, None, ArenaTagSide::Player, &mut bus);

        let from_foe = stat_change_commands(
            &state,
            &data,
            Some(BattlerIndex::Enemy),
            BattlerIndex::Player,
            BattleStat::Defense,
            -1,
        )
        .unwrap();
        assert!(matches!(
            from_foe.as_slice(),
            [BattleCommand::EmitEvent(BattleEvent::StatChangeBlocked {
                reason: StatBlockReason::Mist,
                ..
            })]
        ));

        let self_inflicted = stat_change_commands(
            &state,
            &data,
            Some(BattlerIndex::Player),
            BattlerIndex::Player,
            BattleStat::Defense,
            -1,
        )
        .unwrap();
        assert_eq!(
            self_inflicted,
            vec![BattleCommand::ChangeStatStage {
                target: BattlerIndex::Player,
                stat: BattleStat::Defense,
                delta: -1,
            }]
        );
    }

    #[test]
    fn test_mirror_armor_reflects_drop() {
        let data = test_data();
        let state = pikachu_vs(SpeciesId::Corviknight);
        let commands = stat_change_commands(
            &state,
            &data,
            Some(BattlerIndex::Player),
            BattlerIndex::Enemy,
            BattleStat::Attack,
            -1,
        )
        .unwrap();
        assert_eq!(
            commands,
            vec![
                BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
                    battler: BattlerIndex::Enemy,
                    ability: AbilityId::MirrorArmor,
                }),
                BattleCommand::ChangeStatStage {
                    target: BattlerIndex::Player,
                    stat: BattleStat::Attack,
                    delta: -1,
                },
            ]
        );
    }

    #[test]
    fn test_levitate_and_flying_are_airborne() {
        let data = test_data();
        let mut state = pikachu_vs(SpeciesId::Weezing);
        assert!(is_grounded(&state, &data, BattlerIndex::Player).unwrap());
        assert!(!is_grounded(&state, &data, BattlerIndex::Enemy).unwrap());

        let mut bus = crate::battle::events::EventBus::new();
        state.arena.add_tag(ArenaTagType::Gravity, 5, None, None, ArenaTagSide::Both, &mut bus);
        assert!(is_grounded(&state, &data, BattlerIndex::Enemy).unwrap());
    }
}
