#[cfg(test)]
mod tests {
    use crate::battle::events::BattleEvent;
    use crate::battle::phase::AwaitingInput;
    use crate::battle::state::{BattlerIndex, PlayerAction};
    use crate::battle::tests::common::{create_test_engine, pinned_config, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{AbilityId, ArenaTagType, BattlerTagType, SpeciesId, WeatherType};

    fn weather_changes(events: &[BattleEvent]) -> Vec<Option<WeatherType>> {
        events
            .iter()
            .filter_map(|event| match event {
                BattleEvent::WeatherChanged { new, .. } => Some(*new),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_slow_start_lets_the_slower_weather_setter_go_last() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Kyogre, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Regigigas, 50).build()],
        );

        // Act
        engine.run_until_input().unwrap();

        // Assert
        assert_eq!(
            weather_changes(engine.events()),
            vec![Some(WeatherType::Rain), Some(WeatherType::Sunny)]
        );
        assert_eq!(engine.state().arena.weather_type(), Some(WeatherType::Sunny));
        assert!(engine
            .state()
            .active(BattlerIndex::Enemy)
            .unwrap()
            .has_tag(BattlerTagType::SlowStart));
    }

    #[test]
    fn test_neutralizing_gas_silences_a_faster_weather_setter() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Pelipper, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Weezing, 50).build()],
        );

        // Act
        engine.run_until_input().unwrap();

        // Assert
        assert!(engine.state().arena.has_tag(ArenaTagType::NeutralizingGas));
        assert_eq!(engine.state().arena.weather_type(), None);
        assert_eq!(weather_changes(engine.events()), Vec::new());
        assert!(!engine.events().contains(&BattleEvent::AbilityActivated {
            battler: BattlerIndex::Player,
            ability: AbilityId::Drizzle,
        }));
    }

    #[test]
    fn test_gas_outlasts_the_foe_it_knocks_out() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Weezing, 50).build()],
            vec![
                TestPokemonBuilder::new(SpeciesId::Snorlax, 50).with_hp(1).build(),
                TestPokemonBuilder::new(SpeciesId::Pelipper, 50).build(),
            ],
        );
        engine.run_until_input().unwrap();
        let tackle = PlayerAction::UseMove {
            slot: 0,
            target: Some(BattlerIndex::Enemy),
        };

        // Act
        let input = engine.play_turn(vec![(BattlerIndex::Player, tackle)]).unwrap();

        // Assert
        assert_eq!(input, AwaitingInput::Commands);
        assert!(engine.events().contains(&BattleEvent::PokemonFainted {
            battler: BattlerIndex::Enemy,
            pokemon: SpeciesId::Snorlax,
        }));
        assert_eq!(
            engine.state().active(BattlerIndex::Enemy).unwrap().species,
            SpeciesId::Pelipper
        );
        assert!(engine.state().arena.has_tag(ArenaTagType::NeutralizingGas));
        assert_eq!(engine.state().arena.weather_type(), None);
        assert!(!engine.events().contains(&BattleEvent::AbilityActivated {
            battler: BattlerIndex::Enemy,
            ability: AbilityId::Drizzle,
        }));
    }

    #[test]
    fn test_intimidate_lowers_the_foe_on_entry() {
        // Arrange
        let mut engine = create_test_engine(
            pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Gyarados, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );

        // Act
        engine.run_until_input().unwrap();

        // Assert
        let machamp = engine.state().active(BattlerIndex::Enemy).unwrap();
        assert_eq!(machamp.stat_stage(schema::BattleStat::Attack), -1);
        assert!(engine.events().contains(&BattleEvent::AbilityActivated {
            battler: BattlerIndex::Player,
            ability: AbilityId::Intimidate,
        }));
    }
}
