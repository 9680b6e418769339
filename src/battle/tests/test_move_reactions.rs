#[cfg(test)]
mod tests {
    use crate::battle::events::{BattleEvent, MoveFailureReason};
    use crate::battle::phase::AwaitingInput;
    use crate::battle::state::{BattlerIndex, PlayerAction};
    use crate::battle::tests::common::{assert_ok, create_test_engine, pinned_config, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{AbilityId, MoveId, PokemonType, SpeciesId, StatusEffect};

    fn use_move(slot: usize, target: BattlerIndex) -> PlayerAction {
        PlayerAction::UseMove {
            slot,
            target: Some(target),
        }
    }

    fn magikarp() -> TestPokemonBuilder {
        TestPokemonBuilder::new(SpeciesId::Magikarp, 50).with_moves(vec![MoveId::Splash])
    }

    /// A Snorlax a few HP above half, so one Tackle takes it below.
    fn snorlax_above_half(ability: AbilityId) -> TestPokemonBuilder {
        let max_hp = TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build().max_hp();
        TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
            .with_ability(ability)
            .with_hp(max_hp / 2 + 5)
    }

    // --- Protean ---

    #[test]
    fn test_protean_takes_the_type_of_the_move_once() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50)
                .with_ability(AbilityId::Protean)
                .build()],
            vec![magikarp().build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));
        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));

        // Assert
        let pikachu = engine.state().active(BattlerIndex::Player).unwrap();
        assert_eq!(pikachu.types(), &[PokemonType::Normal]);
        let activations = engine
            .events()
            .iter()
            .filter(|event| {
                **event
                    == BattleEvent::AbilityActivated {
                        battler: BattlerIndex::Player,
                        ability: AbilityId::Protean,
                    }
            })
            .count();
        assert_eq!(activations, 1);
        assert!(engine.events().contains(&BattleEvent::TypesChanged {
            target: BattlerIndex::Player,
            types: vec![PokemonType::Normal],
        }));
    }

    // --- Magic Bounce / Magic Coat ---

    #[test]
    fn test_magic_bounce_sends_thunder_wave_back() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::ThunderWave])
                .build()],
            vec![magikarp().with_ability(AbilityId::MagicBounce).build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));

        // Assert
        let state = engine.state();
        assert!(state.active(BattlerIndex::Player).unwrap().has_status(StatusEffect::Paralysis));
        assert_eq!(state.active(BattlerIndex::Enemy).unwrap().status, None);
        assert!(engine.events().contains(&BattleEvent::MoveReflected {
            user: BattlerIndex::Enemy,
            target: BattlerIndex::Player,
            move_used: MoveId::ThunderWave,
        }));
    }

    #[test]
    fn test_mold_breaker_gets_past_magic_bounce() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_ability(AbilityId::MoldBreaker)
                .with_moves(vec![MoveId::ThunderWave])
                .build()],
            vec![magikarp().with_ability(AbilityId::MagicBounce).build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));

        // Assert
        assert!(engine
            .state()
            .active(BattlerIndex::Enemy)
            .unwrap()
            .has_status(StatusEffect::Paralysis));
        assert!(!engine
            .events()
            .iter()
            .any(|event| matches!(event, BattleEvent::MoveReflected { .. })));
    }

    #[test]
    fn test_magic_coat_reflects_for_the_turn_it_is_used() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::WillOWisp])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Magikarp, 50)
                .with_moves(vec![MoveId::MagicCoat])
                .build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));

        // Assert
        let state = engine.state();
        assert!(state.active(BattlerIndex::Player).unwrap().has_status(StatusEffect::Burn));
        let magikarp = state.active(BattlerIndex::Enemy).unwrap();
        assert_eq!(magikarp.status, None);
        assert!(!magikarp.has_tag(schema::BattlerTagType::MagicCoat));
    }

    // --- Wimp Out / Emergency Exit ---

    #[test]
    fn test_wimp_out_leaves_before_its_own_move() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
            vec![snorlax_above_half(AbilityId::WimpOut).build(), magikarp().build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        let input = assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));

        // Assert
        assert_eq!(input, AwaitingInput::Commands);
        let state = engine.state();
        assert_eq!(state.active(BattlerIndex::Enemy).unwrap().species, SpeciesId::Magikarp);
        let snorlax = &state.sides[1].party[0];
        assert!(!snorlax.is_fainted());
        assert!(snorlax.current_hp() * 2 <= snorlax.max_hp());
        assert!(state.active(BattlerIndex::Player).unwrap().is_full_hp());
        assert!(engine.events().contains(&BattleEvent::AbilityActivated {
            battler: BattlerIndex::Enemy,
            ability: AbilityId::WimpOut,
        }));
    }

    #[test]
    fn test_emergency_exit_asks_the_player_for_a_replacement() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![
                snorlax_above_half(AbilityId::EmergencyExit).build(),
                TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build(),
            ],
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        let input = assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));
        assert_eq!(input, AwaitingInput::Replacement(BattlerIndex::Player));
        assert_ok(engine.submit_replacement(BattlerIndex::Player, 1));
        let input = assert_ok(engine.run_until_input());

        // Assert
        assert_eq!(input, AwaitingInput::Commands);
        let state = engine.state();
        assert_eq!(state.active(BattlerIndex::Player).unwrap().species, SpeciesId::Pikachu);
        assert!(state.active(BattlerIndex::Enemy).unwrap().is_full_hp());
    }

    #[test]
    fn test_emergency_exit_stays_without_a_reserve() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
            vec![snorlax_above_half(AbilityId::EmergencyExit).build()],
        );
        assert_ok(engine.run_until_input());

        // Act
        let input = assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));

        // Assert
        assert_eq!(input, AwaitingInput::Commands);
        assert_eq!(
            engine.state().active(BattlerIndex::Enemy).unwrap().species,
            SpeciesId::Snorlax
        );
        assert!(!engine.events().contains(&BattleEvent::AbilityActivated {
            battler: BattlerIndex::Enemy,
            ability: AbilityId::EmergencyExit,
        }));
    }

    // --- Future Sight ---

    #[test]
    fn test_future_sight_lands_two_turns_later() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50)
                .with_moves(vec![MoveId::FutureSight, MoveId::Splash])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Splash])
                .build()],
        );
        assert_ok(engine.run_until_input());
        let max_hp = engine.state().active(BattlerIndex::Enemy).unwrap().max_hp();

        // Act / Assert
        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));
        let pending = engine.state().arena.delayed_attack_at(BattlerIndex::Enemy).unwrap();
        let damage = pending.delayed.unwrap().damage;
        assert!(damage > 0);
        assert_eq!(engine.state().active(BattlerIndex::Enemy).unwrap().current_hp(), max_hp);

        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(0, BattlerIndex::Enemy))]));
        assert!(engine.events().contains(&BattleEvent::MoveFailed {
            user: BattlerIndex::Player,
            move_used: MoveId::FutureSight,
            reason: MoveFailureReason::AttackPending,
        }));
        assert_eq!(engine.state().active(BattlerIndex::Enemy).unwrap().current_hp(), max_hp);

        assert_ok(engine.play_turn(vec![(BattlerIndex::Player, use_move(1, BattlerIndex::Player))]));
        assert!(engine.events().contains(&BattleEvent::DelayedAttackLanded {
            target: BattlerIndex::Enemy,
            move_used: MoveId::FutureSight,
        }));
        assert_eq!(
            engine.state().active(BattlerIndex::Enemy).unwrap().current_hp(),
            max_hp - damage
        );
        assert!(engine.state().arena.delayed_attack_at(BattlerIndex::Enemy).is_none());
    }
}
