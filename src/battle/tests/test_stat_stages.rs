#[cfg(test)]
mod tests {
    use crate::battle::events::{BattleEvent, MoveFailureReason, StatBlockReason};
    use crate::battle::state::{BattlerIndex, PlayerAction, Side};
    use crate::battle::tests::common::{create_test_engine, pinned_config, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{BattleStat, MoveId, SpeciesId};

    fn use_move(slot: usize) -> PlayerAction {
        PlayerAction::UseMove { slot, target: None }
    }

    #[test]
    fn test_swords_dance_stops_at_plus_six() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50)
                .with_moves(vec![MoveId::SwordsDance])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        engine.run_until_input().unwrap();

        // Act
        for _ in 0..3 {
            engine.play_turn(vec![(BattlerIndex::Player, use_move(0))]).unwrap();
        }
        engine.take_events();
        engine.play_turn(vec![(BattlerIndex::Player, use_move(0))]).unwrap();

        // Assert
        let machamp = engine.state().active(BattlerIndex::Player).unwrap();
        assert_eq!(machamp.stat_stage(BattleStat::Attack), 6);
        let events = engine.events();
        assert!(events.contains(&BattleEvent::StatChangeBlocked {
            target: BattlerIndex::Player,
            stat: BattleStat::Attack,
            reason: StatBlockReason::AtMaximum,
        }));
        assert!(events.contains(&BattleEvent::MoveFailed {
            user: BattlerIndex::Player,
            move_used: MoveId::SwordsDance,
            reason: MoveFailureReason::NothingToChange,
        }));
        assert!(!events
            .iter()
            .any(|event| matches!(event, BattleEvent::StatStageChanged { .. })));
    }

    #[test]
    fn test_switching_out_clears_stages() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![
                TestPokemonBuilder::new(SpeciesId::Machamp, 50)
                    .with_moves(vec![MoveId::SwordsDance])
                    .build(),
                TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build(),
            ],
            vec![TestPokemonBuilder::new(SpeciesId::Blastoise, 50)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        engine.run_until_input().unwrap();
        engine.play_turn(vec![(BattlerIndex::Player, use_move(0))]).unwrap();
        assert_eq!(
            engine
                .state()
                .active(BattlerIndex::Player)
                .unwrap()
                .stat_stage(BattleStat::Attack),
            2
        );

        // Act
        engine
            .play_turn(vec![(BattlerIndex::Player, PlayerAction::Switch { party_slot: 1 })])
            .unwrap();

        // Assert
        let side = engine.state().side(Side::Player);
        assert_eq!(side.active[0], Some(1));
        assert_eq!(side.party[0].stat_stage(BattleStat::Attack), 0);
        assert!(engine.events().contains(&BattleEvent::PokemonSwitched {
            battler: BattlerIndex::Player,
            old_pokemon: SpeciesId::Machamp,
            new_pokemon: SpeciesId::Snorlax,
        }));
    }
}
