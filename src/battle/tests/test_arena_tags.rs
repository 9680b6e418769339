#[cfg(test)]
mod tests {
    use crate::battle::events::{BattleEvent, DamageSource};
    use crate::battle::state::{BattlerIndex, PlayerAction, Side};
    use crate::battle::tests::common::{create_test_engine, pinned_config, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{ArenaTagSide, ArenaTagType, BattleStat, MoveId, SpeciesId};

    fn use_move(slot: usize, target: Option<BattlerIndex>) -> PlayerAction {
        PlayerAction::UseMove { slot, target }
    }

    fn spikes_events(events: &[BattleEvent]) -> Vec<(u8, bool)> {
        events
            .iter()
            .filter_map(|event| match event {
                BattleEvent::ArenaTagAdded {
                    tag: ArenaTagType::Spikes,
                    side: ArenaTagSide::Enemy,
                    layers,
                    at_max,
                } => Some((*layers, *at_max)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_spikes_stack_to_three_layers() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Spikes])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Blastoise, 50)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        engine.run_until_input().unwrap();

        // Act
        for _ in 0..4 {
            engine
                .play_turn(vec![(BattlerIndex::Player, use_move(0, None))])
                .unwrap();
        }

        // Assert
        assert_eq!(
            spikes_events(engine.events()),
            vec![(1, false), (2, false), (3, false), (3, true)]
        );
        let failed = engine
            .events()
            .iter()
            .any(|event| matches!(event, BattleEvent::MoveFailed { move_used: MoveId::Spikes, .. }));
        assert!(!failed);
        let spikes = engine
            .state()
            .arena
            .tags
            .iter()
            .find(|tag| tag.tag_type == ArenaTagType::Spikes)
            .unwrap();
        assert_eq!(spikes.side, ArenaTagSide::Enemy);
        assert_eq!(spikes.layers, 3);
    }

    #[test]
    fn test_spikes_hurt_a_grounded_switch_in() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Spikes, MoveId::Splash])
                .build()],
            vec![
                TestPokemonBuilder::new(SpeciesId::Rattata, 50)
                    .with_moves(vec![MoveId::SwordsDance])
                    .build(),
                TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build(),
            ],
        )
        .without_enemy_ai();
        engine.run_until_input().unwrap();
        engine
            .play_turn(vec![
                (BattlerIndex::Player, use_move(0, None)),
                (BattlerIndex::Enemy, use_move(0, None)),
            ])
            .unwrap();

        // Act
        engine
            .play_turn(vec![
                (BattlerIndex::Player, use_move(1, None)),
                (BattlerIndex::Enemy, PlayerAction::Switch { party_slot: 1 }),
            ])
            .unwrap();

        // Assert
        let side = engine.state().side(Side::Enemy);
        let expected = side.party[1].max_hp_fraction(1, 8);
        assert_eq!(side.party[0].stat_stage(BattleStat::Attack), 0);
        assert_eq!(side.party[1].current_hp(), side.party[1].max_hp() - expected);
        assert!(engine.events().contains(&BattleEvent::IndirectDamage {
            target: BattlerIndex::Enemy,
            source: DamageSource::Hazard(ArenaTagType::Spikes),
            damage: expected,
            remaining_hp: side.party[1].current_hp(),
        }));
    }

    #[test]
    fn test_brick_break_only_clears_the_target_side() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50)
                .with_moves(vec![MoveId::Reflect, MoveId::BrickBreak])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Reflect, MoveId::Splash])
                .build()],
        )
        .without_enemy_ai();
        engine.run_until_input().unwrap();
        engine
            .play_turn(vec![
                (BattlerIndex::Player, use_move(0, None)),
                (BattlerIndex::Enemy, use_move(0, None)),
            ])
            .unwrap();
        let arena = &engine.state().arena;
        assert!(arena.has_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Player));
        assert!(arena.has_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Enemy));

        // Act
        engine
            .play_turn(vec![
                (BattlerIndex::Player, use_move(1, Some(BattlerIndex::Enemy))),
                (BattlerIndex::Enemy, use_move(1, None)),
            ])
            .unwrap();

        // Assert
        let arena = &engine.state().arena;
        assert!(arena.has_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Player));
        assert!(!arena.has_tag_on_side(ArenaTagType::Reflect, ArenaTagSide::Enemy));
        assert!(engine.events().contains(&BattleEvent::ArenaTagRemoved {
            tag: ArenaTagType::Reflect,
            side: ArenaTagSide::Enemy,
        }));
    }

    #[test]
    fn test_defog_lowers_evasion_and_clears_foe_screens() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Defog, MoveId::Splash])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Blastoise, 50)
                .with_moves(vec![MoveId::LightScreen, MoveId::Splash])
                .build()],
        )
        .without_enemy_ai();
        engine.run_until_input().unwrap();
        engine
            .play_turn(vec![
                (BattlerIndex::Player, use_move(1, None)),
                (BattlerIndex::Enemy, use_move(0, None)),
            ])
            .unwrap();
        assert!(engine
            .state()
            .arena
            .has_tag_on_side(ArenaTagType::LightScreen, ArenaTagSide::Enemy));

        // Act
        engine
            .play_turn(vec![
                (BattlerIndex::Player, use_move(0, Some(BattlerIndex::Enemy))),
                (BattlerIndex::Enemy, use_move(1, None)),
            ])
            .unwrap();

        // Assert
        let blastoise = engine.state().active(BattlerIndex::Enemy).unwrap();
        assert_eq!(blastoise.stat_stage(BattleStat::Evasion), -1);
        assert!(!engine
            .state()
            .arena
            .has_tag_on_side(ArenaTagType::LightScreen, ArenaTagSide::Enemy));
        assert!(engine.events().contains(&BattleEvent::ArenaTagRemoved {
            tag: ArenaTagType::LightScreen,
            side: ArenaTagSide::Enemy,
        }));
    }
}
