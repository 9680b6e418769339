#[cfg(test)]
mod tests {
    use crate::battle::events::BattleEvent;
    use crate::battle::state::{BattlerIndex, PlayerAction};
    use crate::battle::tests::common::{create_test_engine, pinned_config, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::{BattleStat, MoveId, SpeciesId};

    fn damage_to_enemy(events: &[BattleEvent]) -> Vec<u16> {
        events
            .iter()
            .filter_map(|event| match event {
                BattleEvent::DamageDealt {
                    target: BattlerIndex::Enemy,
                    damage,
                    ..
                } => Some(*damage),
                _ => None,
            })
            .collect()
    }

    #[rstest]
    #[case::plain_target(SpeciesId::Snorlax, false, 0)]
    #[case::forced_critical_hit(SpeciesId::Snorlax, true, 0)]
    #[case::multiscale_at_full_hp(SpeciesId::Dragonite, false, 0)]
    #[case::raised_defenses(SpeciesId::Golem, false, 6)]
    #[case::lowered_defenses(SpeciesId::Blastoise, true, -6)]
    fn test_dragon_rage_always_deals_forty(
        #[case] target: SpeciesId,
        #[case] force_crit: bool,
        #[case] defense_stage: i8,
    ) {
        // Arrange
        let mut config = pinned_config();
        if force_crit {
            config.overrides.critical_hits = Some(true);
        }
        let mut engine = create_test_engine(
            config,
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50)
                .with_moves(vec![MoveId::DragonRage])
                .build()],
            vec![TestPokemonBuilder::new(target, 50)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        engine.run_until_input().unwrap();
        let defender = engine.state_mut().active_mut(BattlerIndex::Enemy).unwrap();
        defender.set_stat_stage(BattleStat::Defense, defense_stage);
        defender.set_stat_stage(BattleStat::SpDefense, defense_stage);
        let hp_before = defender.current_hp();

        // Act
        engine
            .play_turn(vec![(
                BattlerIndex::Player,
                PlayerAction::UseMove {
                    slot: 0,
                    target: Some(BattlerIndex::Enemy),
                },
            )])
            .unwrap();

        // Assert
        assert_eq!(damage_to_enemy(engine.events()), vec![40]);
        let defender = engine.state().active(BattlerIndex::Enemy).unwrap();
        assert_eq!(defender.current_hp(), hp_before - 40);
    }

    #[rstest]
    #[case(MoveId::SeismicToss, 50)]
    #[case(MoveId::SeismicToss, 30)]
    fn test_level_damage_matches_the_user_level(#[case] move_id: MoveId, #[case] level: u8) {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, level)
                .with_moves(vec![move_id])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        engine.run_until_input().unwrap();

        // Act
        engine
            .play_turn(vec![(
                BattlerIndex::Player,
                PlayerAction::UseMove {
                    slot: 0,
                    target: Some(BattlerIndex::Enemy),
                },
            )])
            .unwrap();

        // Assert
        assert_eq!(damage_to_enemy(engine.events()), vec![level as u16]);
    }

    #[test]
    fn test_super_fang_halves_current_hp() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Rattata, 50)
                .with_moves(vec![MoveId::SuperFang])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_hp(101)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        engine.run_until_input().unwrap();

        // Act
        engine
            .play_turn(vec![(
                BattlerIndex::Player,
                PlayerAction::UseMove {
                    slot: 0,
                    target: Some(BattlerIndex::Enemy),
                },
            )])
            .unwrap();

        // Assert
        assert_eq!(damage_to_enemy(engine.events()), vec![50]);
    }
}
