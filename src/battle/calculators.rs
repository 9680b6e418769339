use crate::battle::abilities::{self, condition_met, HitContext};
use crate::battle::items;
use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::accuracy_stage_multiplier;
use schema::{
    AbilityEffect, AbilityEffectKind, ArenaTagType, BattleStat, BattlerTagType, MoveData, MoveEffect,
    MoveEffectKind, MultiHitType,
};

/// Roll whether `move_data` connects with `target`.
///
/// Guaranteed hits (overrides, moves without accuracy, field moves, No Guard,
/// weather-sure moves) consume no roll. A semi-invulnerable target dodges
/// unless the move is listed as reaching it.
pub fn move_hits(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
    rng: &mut BattleRng,
) -> BattleResult<bool> {
    if state.overrides.always_hit || move_data.target.is_field() || user == target {
        return Ok(true);
    }
    let Some(base_accuracy) = move_data.accuracy else {
        return Ok(true);
    };
    if abilities::has_effect(state, data, user, AbilityEffectKind::AlwaysHit, None)?
        || abilities::has_effect(state, data, target, AbilityEffectKind::AlwaysHit, None)?
    {
        return Ok(true);
    }

    let defender = state.active(target)?;
    if let Some(hiding) = defender.is_semi_invulnerable() {
        let reaches = move_data.effects.iter().any(|effect| {
            matches!(effect, MoveEffect::HitsSemiInvulnerable { tag, .. } if *tag == hiding)
        });
        if !reaches {
            return Ok(false);
        }
    }

    if let Some(MoveEffect::AlwaysHitsInWeather(weathers)) =
        move_data.effect(MoveEffectKind::AlwaysHitsInWeather)
    {
        if state
            .arena
            .weather_type()
            .is_some_and(|weather| weathers.contains(&weather))
        {
            return Ok(true);
        }
    }

    let attacker = state.active(user)?;
    let stage = (attacker.stat_stage(BattleStat::Accuracy) - defender.stat_stage(BattleStat::Evasion))
        .clamp(-6, 6);
    let mut accuracy = base_accuracy as f64 * accuracy_stage_multiplier(stage);

    let hit = HitContext {
        category: move_data.category,
        effectiveness: 1.0,
    };
    for (_, effect) in abilities::effects(state, data, user, AbilityEffectKind::AccuracyMultiplier, None)? {
        if let AbilityEffect::AccuracyMultiplier { percent, condition } = effect {
            if condition_met(state, user, condition, Some(&hit))? {
                accuracy *= *percent as f64 / 100.0;
            }
        }
    }
    accuracy *= items::accuracy_multiplier(attacker, data)?;
    if state.arena.has_tag(ArenaTagType::Gravity) {
        accuracy *= 5.0 / 3.0;
    }

    let roll = rng.rand_int(100, "accuracy");
    Ok((roll as f64) < accuracy)
}

/// Critical hit stage to 1-in-N odds.
fn crit_denominator(stage: u8) -> u32 {
    match stage {
        0 => 24,
        1 => 8,
        2 => 2,
        _ => 1,
    }
}

pub fn is_critical_hit(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
    rng: &mut BattleRng,
) -> BattleResult<bool> {
    if let Some(forced) = state.overrides.critical_hits {
        return Ok(forced);
    }
    if state
        .arena
        .has_tag_on_side(ArenaTagType::LuckyChant, target.side().arena_side())
        || abilities::has_effect(state, data, target, AbilityEffectKind::BlockCrits, Some(user))?
    {
        return Ok(false);
    }

    let attacker = state.active(user)?;
    if move_data.has_effect(MoveEffectKind::AlwaysCrit) || attacker.has_tag(BattlerTagType::AlwaysCrit) {
        return Ok(true);
    }

    let mut stage = 0u8;
    if move_data.has_effect(MoveEffectKind::HighCrit) {
        stage += 1;
    }
    if attacker.has_tag(BattlerTagType::CritBoost) {
        stage += 2;
    }
    for (_, effect) in abilities::effects(state, data, user, AbilityEffectKind::CritStage, None)? {
        if let AbilityEffect::CritStage(extra) = effect {
            stage = stage.saturating_add(*extra);
        }
    }
    stage = stage.saturating_add(items::crit_stages(attacker, data)?);

    Ok(rng.rand_int(crit_denominator(stage), "critical hit") == 0)
}

/// Number of strikes for this use of the move.
///
/// 2-5 hit moves roll r in 0..16: r >= 10 gives 2, r >= 4 gives 3, r >= 2
/// gives 4, otherwise 5. Skill Link always gives 5 and Loaded Dice 4 or 5.
/// Parental Bond turns a single-strike damaging move into two strikes.
pub fn hit_count(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    move_data: &MoveData,
    target_count: usize,
    rng: &mut BattleRng,
) -> BattleResult<u8> {
    let Some(MoveEffect::MultiHit(multi_hit)) = move_data.effect(MoveEffectKind::MultiHit) else {
        let second_strike = move_data.is_damaging()
            && target_count == 1
            && abilities::has_effect(state, data, user, AbilityEffectKind::SecondStrike, None)?;
        return Ok(if second_strike { 2 } else { 1 });
    };

    let hits = match multi_hit {
        MultiHitType::Two => 2,
        MultiHitType::Three => 3,
        MultiHitType::Ten => 10,
        MultiHitType::TwoToFive => {
            let attacker = state.active(user)?;
            if let Some(forced) = state.overrides.multi_hit_count {
                forced.clamp(2, 5)
            } else if abilities::has_effect(state, data, user, AbilityEffectKind::MaxMultiHit, None)? {
                5
            } else if let Some(minimum) = items::multi_hit_minimum(attacker, data)? {
                minimum + rng.rand_int((5 - minimum.min(5)) as u32 + 1, "loaded dice hits") as u8
            } else {
                match rng.rand_int(16, "multi-hit count") {
                    r if r >= 10 => 2,
                    r if r >= 4 => 3,
                    r if r >= 2 => 4,
                    _ => 5,
                }
            }
        }
    };
    Ok(hits)
}

/// Whether every strike after the first rolls accuracy again.
pub fn checks_every_hit(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    move_data: &MoveData,
) -> BattleResult<bool> {
    let checks = move_data.has_effect(MoveEffectKind::CheckEveryHit)
        || matches!(
            move_data.effect(MoveEffectKind::MultiHit),
            Some(MoveEffect::MultiHit(MultiHitType::Ten))
        );
    Ok(checks && !abilities::has_effect(state, data, user, AbilityEffectKind::MaxMultiHit, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, test_data, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::{AbilityId, HeldItemId, MoveId, SpeciesId};

    fn battle(attacker: TestPokemonBuilder) -> BattleState {
        create_test_battle(
            vec![attacker.build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
        )
    }

    #[test]
    fn test_accuracy_roll_against_threshold() {
        let data = test_data();
        let state = battle(TestPokemonBuilder::new(SpeciesId::Pikachu, 50));
        let thunder = data.move_data(MoveId::Thunder).unwrap();

        let mut rng = BattleRng::new_for_test(vec![69]);
        assert!(move_hits(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, thunder, &mut rng).unwrap());
        let mut rng = BattleRng::new_for_test(vec![70]);
        assert!(!move_hits(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, thunder, &mut rng).unwrap());
    }

    #[test]
    fn test_sure_hits_consume_no_roll() {
        let data = test_data();
        let mut state = battle(TestPokemonBuilder::new(SpeciesId::Pikachu, 50).with_ability(AbilityId::NoGuard));
        let mut rng = BattleRng::new_for_test(vec![]);
        let blizzard = data.move_data(MoveId::Blizzard).unwrap();
        assert!(move_hits(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, blizzard, &mut rng).unwrap());

        state.active_mut(BattlerIndex::Player).unwrap().ability = AbilityId::None;
        let mut bus = crate::battle::events::EventBus::new();
        state.arena.set_weather(Some(schema::WeatherType::Snow), 5, &mut bus);
        assert!(move_hits(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, blizzard, &mut rng).unwrap());
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_semi_invulnerable_target_dodges() {
        let data = test_data();
        let mut state = battle(TestPokemonBuilder::new(SpeciesId::Pikachu, 50));
        state
            .active_mut(BattlerIndex::Enemy)
            .unwrap()
            .add_tag(crate::battle::battler_tags::BattlerTag::new(BattlerTagType::Underground, None, None));
        let mut rng = BattleRng::new_for_test(vec![0, 0]);
        let tackle = data.move_data(MoveId::Tackle).unwrap();
        let earthquake = data.move_data(MoveId::Earthquake).unwrap();
        assert!(!move_hits(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, tackle, &mut rng).unwrap());
        assert!(move_hits(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, earthquake, &mut rng).unwrap());
    }

    #[rstest]
    #[case(0, 5)]
    #[case(2, 4)]
    #[case(4, 3)]
    #[case(9, 3)]
    #[case(10, 2)]
    #[case(15, 2)]
    fn test_two_to_five_distribution(#[case] roll: u32, #[case] expected: u8) {
        let data = test_data();
        let state = battle(TestPokemonBuilder::new(SpeciesId::Cloyster, 50).with_ability(AbilityId::None));
        let icicle_spear = data.move_data(MoveId::IcicleSpear).unwrap();
        let mut rng = BattleRng::new_for_test(vec![roll]);
        assert_eq!(
            hit_count(&state, &data, BattlerIndex::Player, icicle_spear, 1, &mut rng).unwrap(),
            expected
        );
    }

    #[test]
    fn test_skill_link_and_loaded_dice() {
        let data = test_data();
        let icicle_spear = data.move_data(MoveId::IcicleSpear).unwrap();
        let mut rng = BattleRng::new_for_test(vec![0]);

        let linked = battle(TestPokemonBuilder::new(SpeciesId::Cloyster, 50).with_ability(AbilityId::SkillLink));
        assert_eq!(hit_count(&linked, &data, BattlerIndex::Player, icicle_spear, 1, &mut rng).unwrap(), 5);
        assert_eq!(rng.draws(), 0);

        let dice = battle(
            TestPokemonBuilder::new(SpeciesId::Cloyster, 50)
                .with_ability(AbilityId::None)
                .with_item(HeldItemId::LoadedDice, 1),
        );
        assert_eq!(hit_count(&dice, &data, BattlerIndex::Player, icicle_spear, 1, &mut rng).unwrap(), 4);
    }

    #[test]
    fn test_parental_bond_adds_a_strike() {
        let data = test_data();
        let state = battle(TestPokemonBuilder::new(SpeciesId::Kangaskhan, 50).with_ability(AbilityId::ParentalBond));
        let mut rng = BattleRng::new_for_test(vec![]);
        let tackle = data.move_data(MoveId::Tackle).unwrap();
        let growl = data.move_data(MoveId::Growl).unwrap();
        assert_eq!(hit_count(&state, &data, BattlerIndex::Player, tackle, 1, &mut rng).unwrap(), 2);
        assert_eq!(hit_count(&state, &data, BattlerIndex::Player, growl, 1, &mut rng).unwrap(), 1);
    }

    #[test]
    fn test_crit_odds() {
        let data = test_data();
        let state = battle(TestPokemonBuilder::new(SpeciesId::Pikachu, 50));
        let tackle = data.move_data(MoveId::Tackle).unwrap();

        let mut rng = BattleRng::new_for_test(vec![0, 1]);
        assert!(is_critical_hit(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, tackle, &mut rng).unwrap());
        assert!(!is_critical_hit(&state, &data, BattlerIndex::Player, BattlerIndex::Enemy, tackle, &mut rng).unwrap());
        assert_eq!(crit_denominator(1), 8);
        assert_eq!(crit_denominator(4), 1);
    }
}
