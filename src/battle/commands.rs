use crate::battle::battler_tags::{BattlerTag, TagData, TagLapse};
use crate::battle::events::{BattleEvent, DamageSource, EventBus};
use crate::battle::phase::{Phase, PhaseQueue};
use crate::battle::state::{BattleState, BattlerIndex, GameState};
use crate::errors::{BattleResult, BattleStateError};
use crate::pokemon::{PokemonId, TurnMove};
use schema::{
    ArenaTagSide, ArenaTagType, BattleStat, BattlerTagLapseType, BattlerTagType, HeldItemId,
    MoveId, MoveResult, PokemonType, StatusEffect, TerrainType, WeatherType,
};

/// Atomic commands representing final state changes
#[derive(Debug, Clone, PartialEq)]
pub enum BattleCommand {
    // Battle flow
    SetGameState(GameState),
    EmitEvent(BattleEvent),
    /// Runs before anything already queued.
    PushPhase(Phase),
    QueuePhase(Phase),

    // HP
    DealDamage {
        target: BattlerIndex,
        amount: u16,
    },
    DealIndirectDamage {
        target: BattlerIndex,
        amount: u16,
        source: DamageSource,
    },
    DamageSubstitute {
        target: BattlerIndex,
        amount: u16,
    },
    Heal {
        target: BattlerIndex,
        amount: u16,
    },
    Faint {
        target: BattlerIndex,
    },

    // Status and stat stages
    SetStatus {
        target: BattlerIndex,
        status: StatusEffect,
        turns: u8,
    },
    CureStatus {
        target: BattlerIndex,
    },
    SetStatusTurns {
        target: BattlerIndex,
        turns: u8,
    },
    ChangeStatStage {
        target: BattlerIndex,
        stat: BattleStat,
        delta: i8,
    },

    // Battler tags
    AddBattlerTag {
        target: BattlerIndex,
        tag: BattlerTag,
    },
    RemoveBattlerTag {
        target: BattlerIndex,
        tag_type: BattlerTagType,
    },
    LapseBattlerTag {
        target: BattlerIndex,
        tag_type: BattlerTagType,
        lapse: BattlerTagLapseType,
    },

    // Arena
    AddArenaTag {
        tag_type: ArenaTagType,
        side: ArenaTagSide,
        turns: u8,
        source_move: Option<MoveId>,
        source_id: Option<PokemonId>,
    },
    RemoveArenaTag {
        tag_type: ArenaTagType,
        side: ArenaTagSide,
    },
    /// Lock in a hit on `target`'s position that lands when the tag runs out.
    ScheduleDelayedAttack {
        target: BattlerIndex,
        move_id: MoveId,
        source_id: PokemonId,
        damage: u16,
    },
    SetWeather {
        weather: Option<WeatherType>,
        turns: u8,
    },
    SetTerrain {
        terrain: Option<TerrainType>,
        turns: u8,
    },

    // Pokemon bookkeeping
    DeductPp {
        target: BattlerIndex,
        slot: usize,
    },
    RecordMove {
        target: BattlerIndex,
        entry: TurnMove,
    },
    SetProtectStreak {
        target: BattlerIndex,
        streak: u8,
    },
    SetTypes {
        target: BattlerIndex,
        types: Vec<PokemonType>,
    },
    ConsumeItem {
        target: BattlerIndex,
        item: HeldItemId,
    },
    ChangeForm {
        target: BattlerIndex,
        form: u8,
        stats: [u16; 6],
        types: Vec<PokemonType>,
    },
    SwitchPokemon {
        index: BattlerIndex,
        party_slot: usize,
    },
    RemoveFromField {
        index: BattlerIndex,
    },
}

/// Execute a batch of commands in order. The first failure aborts the batch.
pub fn execute_command_batch(
    commands: Vec<BattleCommand>,
    state: &mut BattleState,
    bus: &mut EventBus,
    queue: &mut PhaseQueue,
) -> BattleResult<()> {
    for command in commands {
        execute_command(command, state, bus, queue)?;
    }
    Ok(())
}

/// Apply damage that went through the boss segment clamp, then report any
/// segment that broke.
fn execute_damage(
    target: BattlerIndex,
    amount: u16,
    source: Option<DamageSource>,
    state: &mut BattleState,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let pokemon = state.active_mut(target)?;
    if pokemon.is_fainted() {
        return Ok(());
    }
    let (amount, crossed) = pokemon.clamp_to_boss_segment(amount);
    let dealt = pokemon.take_damage(amount);
    let remaining_hp = pokemon.current_hp();

    bus.push(match source {
        Some(source) => BattleEvent::IndirectDamage {
            target,
            source,
            damage: dealt,
            remaining_hp,
        },
        None => BattleEvent::DamageDealt {
            target,
            damage: dealt,
            remaining_hp,
        },
    });

    if crossed {
        pokemon.boss_segment_index -= 1;
        let boosted_stat = pokemon.highest_stat();
        let segments_left = pokemon.boss_segment_index;
        bus.push(BattleEvent::BossSegmentBroken {
            battler: target,
            segments_left,
            boosted_stat,
        });
        if let Some(stat) = boosted_stat.battle_stat() {
            let (old_stage, new_stage) = pokemon.change_stat_stage(stat, 1);
            if old_stage != new_stage {
                bus.push(BattleEvent::StatStageChanged {
                    target,
                    stat,
                    old_stage,
                    new_stage,
                });
            }
        }
    }
    Ok(())
}

pub fn execute_command(
    command: BattleCommand,
    state: &mut BattleState,
    bus: &mut EventBus,
    queue: &mut PhaseQueue,
) -> BattleResult<()> {
    match command {
        BattleCommand::SetGameState(game_state) => {
            state.game_state = game_state;
        }
        BattleCommand::EmitEvent(event) => bus.push(event),
        BattleCommand::PushPhase(phase) => queue.push_front(phase),
        BattleCommand::QueuePhase(phase) => queue.push_back(phase),

        // --- HP ---
        BattleCommand::DealDamage { target, amount } => {
            execute_damage(target, amount, None, state, bus)?;
        }
        BattleCommand::DealIndirectDamage {
            target,
            amount,
            source,
        } => {
            execute_damage(target, amount, Some(source), state, bus)?;
        }
        BattleCommand::DamageSubstitute { target, amount } => {
            let pokemon = state.active_mut(target)?;
            let broke = match pokemon.get_tag_mut(BattlerTagType::Substitute) {
                Some(tag) => {
                    let hp = match &mut tag.data {
                        TagData::Substitute { hp } => hp,
                        _ => {
                            return Err(BattleStateError::InconsistentState(
                                "substitute tag without hp".to_string(),
                            )
                            .into())
                        }
                    };
                    *hp = hp.saturating_sub(amount);
                    *hp == 0
                }
                None => return Ok(()),
            };
            bus.push(BattleEvent::SubstituteDamaged {
                target,
                damage: amount,
            });
            if broke {
                pokemon.remove_tag(BattlerTagType::Substitute);
                bus.push(BattleEvent::BattlerTagRemoved {
                    target,
                    tag: BattlerTagType::Substitute,
                });
            }
        }
        BattleCommand::Heal { target, amount } => {
            // The position may have emptied or fainted since the heal was planned.
            let Some(pokemon) = state.pokemon_mut(target) else {
                return Ok(());
            };
            let restored = pokemon.heal(amount);
            if restored > 0 {
                bus.push(BattleEvent::PokemonHealed {
                    target,
                    amount: restored,
                    new_hp: pokemon.current_hp(),
                });
            }
        }
        BattleCommand::Faint { target } => {
            let pokemon = state.active_mut(target)?;
            let hp = pokemon.current_hp();
            pokemon.take_damage(hp);
        }

        // --- Status and stages ---
        BattleCommand::SetStatus {
            target,
            status,
            turns,
        } => {
            if state.active_mut(target)?.set_status(status, turns) {
                bus.push(BattleEvent::StatusApplied { target, status });
            }
        }
        BattleCommand::CureStatus { target } => {
            if let Some(status) = state.active_mut(target)?.cure_status() {
                bus.push(BattleEvent::StatusCured { target, status });
            }
        }
        BattleCommand::SetStatusTurns { target, turns } => {
            if let Some(status) = state.active_mut(target)?.status.as_mut() {
                status.turns = turns;
            }
        }
        BattleCommand::ChangeStatStage {
            target,
            stat,
            delta,
        } => {
            let (old_stage, new_stage) = state.active_mut(target)?.change_stat_stage(stat, delta);
            if old_stage != new_stage {
                bus.push(BattleEvent::StatStageChanged {
                    target,
                    stat,
                    old_stage,
                    new_stage,
                });
            }
        }

        // --- Battler tags ---
        BattleCommand::AddBattlerTag { target, tag } => {
            let tag_type = tag.tag_type;
            if state.active_mut(target)?.add_tag(tag) {
                bus.push(BattleEvent::BattlerTagAdded {
                    target,
                    tag: tag_type,
                });
            }
        }
        BattleCommand::RemoveBattlerTag { target, tag_type } => {
            if state.active_mut(target)?.remove_tag(tag_type).is_some() {
                bus.push(BattleEvent::BattlerTagRemoved {
                    target,
                    tag: tag_type,
                });
            }
        }
        BattleCommand::LapseBattlerTag {
            target,
            tag_type,
            lapse,
        } => {
            let turn = state.turn;
            if state.active_mut(target)?.lapse_tag(tag_type, lapse, turn) == TagLapse::Expired {
                bus.push(BattleEvent::BattlerTagRemoved {
                    target,
                    tag: tag_type,
                });
            }
        }

        // --- Arena ---
        BattleCommand::AddArenaTag {
            tag_type,
            side,
            turns,
            source_move,
            source_id,
        } => {
            state
                .arena
                .add_tag(tag_type, turns, source_move, source_id, side, bus);
        }
        BattleCommand::RemoveArenaTag { tag_type, side } => {
            state.arena.remove_tag_on_side(tag_type, side, bus);
        }
        BattleCommand::ScheduleDelayedAttack {
            target,
            move_id,
            source_id,
            damage,
        } => {
            state
                .arena
                .schedule_delayed_attack(target, move_id, source_id, damage, bus);
        }
        BattleCommand::SetWeather { weather, turns } => {
            state.arena.set_weather(weather, turns, bus);
        }
        BattleCommand::SetTerrain { terrain, turns } => {
            state.arena.set_terrain(terrain, turns, bus);
        }

        // --- Bookkeeping ---
        BattleCommand::DeductPp { target, slot } => {
            let pokemon = state.active_mut(target)?;
            let move_slot = pokemon
                .moveset
                .get_mut(slot)
                .ok_or(BattleStateError::InvalidMoveSlot(target, slot))?;
            move_slot.use_pp();
        }
        BattleCommand::RecordMove { target, entry } => {
            let pokemon = state.active_mut(target)?;
            pokemon.turn_data.failed_last_move =
                matches!(entry.result, MoveResult::Fail | MoveResult::Miss);
            pokemon.push_move_history(entry);
        }
        BattleCommand::SetProtectStreak { target, streak } => {
            state.active_mut(target)?.summon_data.protect_streak = streak;
        }
        BattleCommand::SetTypes { target, types } => {
            state.active_mut(target)?.set_types(types.clone());
            bus.push(BattleEvent::TypesChanged { target, types });
        }
        BattleCommand::ConsumeItem { target, item } => {
            if state.active_mut(target)?.consume_item(item) {
                bus.push(BattleEvent::ItemConsumed {
                    battler: target,
                    item,
                });
            }
        }
        BattleCommand::ChangeForm {
            target,
            form,
            stats,
            types,
        } => {
            let pokemon = state.active_mut(target)?;
            pokemon.apply_form(form, stats, types);
            bus.push(BattleEvent::FormChanged {
                battler: target,
                pokemon: pokemon.species,
                form,
            });
        }
        BattleCommand::SwitchPokemon { index, party_slot } => {
            execute_switch(index, party_slot, state, bus)?;
        }
        BattleCommand::RemoveFromField { index } => {
            let side = state.side_mut(index.side());
            if let Some(pokemon) = side.active_pokemon_mut(index.slot()) {
                pokemon.reset_summon_data();
            }
            if let Some(slot) = side.active.get_mut(index.slot()) {
                *slot = None;
            }
        }
    }
    Ok(())
}

/// Put `party_slot` on the field at `index`, recalling whoever stands there.
fn execute_switch(
    index: BattlerIndex,
    party_slot: usize,
    state: &mut BattleState,
    bus: &mut EventBus,
) -> BattleResult<()> {
    let side = state.side_mut(index.side());
    let incoming_species = side
        .party
        .get(party_slot)
        .map(|pokemon| pokemon.species)
        .ok_or(BattleStateError::InvalidPartySlot(party_slot))?;

    let outgoing_species = match side.active_pokemon_mut(index.slot()) {
        Some(outgoing) => {
            outgoing.reset_summon_data();
            outgoing.reset_turn_data();
            Some(outgoing.species)
        }
        None => None,
    };

    let slot = side
        .active
        .get_mut(index.slot())
        .ok_or(BattleStateError::NoActivePokemon(index))?;
    *slot = Some(party_slot);

    let incoming = &mut side.party[party_slot];
    incoming.reset_summon_data();
    incoming.reset_turn_data();

    bus.push(match outgoing_species {
        Some(old_pokemon) => BattleEvent::PokemonSwitched {
            battler: index,
            old_pokemon,
            new_pokemon: incoming_species,
        },
        None => BattleEvent::PokemonSummoned {
            battler: index,
            pokemon: incoming_species,
        },
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::SpeciesId;

    fn singles() -> BattleState {
        create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50)
                .with_moves(vec![MoveId::Thunderbolt])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_moves(vec![MoveId::Tackle])
                .build()],
        )
    }

    #[test]
    fn test_deal_damage_command() {
        let mut state = singles();
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();
        let initial_hp = state.active(BattlerIndex::Enemy).unwrap().current_hp();

        execute_command_batch(
            vec![BattleCommand::DealDamage {
                target: BattlerIndex::Enemy,
                amount: 20,
            }],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();

        assert_eq!(
            state.active(BattlerIndex::Enemy).unwrap().current_hp(),
            initial_hp - 20
        );
        assert_eq!(
            bus.events(),
            &[BattleEvent::DamageDealt {
                target: BattlerIndex::Enemy,
                damage: 20,
                remaining_hp: initial_hp - 20,
            }]
        );
    }

    #[test]
    fn test_heal_skips_fainted_target() {
        let mut state = singles();
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();

        execute_command_batch(
            vec![
                BattleCommand::Faint {
                    target: BattlerIndex::Player,
                },
                BattleCommand::Heal {
                    target: BattlerIndex::Player,
                    amount: 30,
                },
            ],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();

        assert!(state.active(BattlerIndex::Player).unwrap().is_fainted());
        assert!(bus.is_empty(), "no heal event for a fainted Pokemon");
    }

    #[test]
    fn test_boss_segment_break_boosts_highest_stat() {
        let mut state = singles();
        {
            let boss = state.active_mut(BattlerIndex::Enemy).unwrap();
            boss.boss_segments = 2;
            boss.boss_segment_index = 1;
        }
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();
        let max_hp = state.active(BattlerIndex::Enemy).unwrap().max_hp();

        execute_command_batch(
            vec![BattleCommand::DealDamage {
                target: BattlerIndex::Enemy,
                amount: max_hp,
            }],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();

        let boss = state.active(BattlerIndex::Enemy).unwrap();
        assert!(!boss.is_fainted(), "damage stops at the segment boundary");
        assert_eq!(boss.boss_segment_index, 0);
        // Snorlax's best non-HP stat is Attack / SpDef (tie keeps Attack).
        assert_eq!(boss.stat_stage(BattleStat::Attack), 1);
        assert!(bus
            .events()
            .iter()
            .any(|event| matches!(event, BattleEvent::BossSegmentBroken { segments_left: 0, .. })));
    }

    #[test]
    fn test_substitute_absorbs_then_breaks() {
        let mut state = singles();
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();
        let tag = BattlerTag::new(BattlerTagType::Substitute, Some(MoveId::Substitute), None)
            .with_data(TagData::Substitute { hp: 25 });

        execute_command_batch(
            vec![
                BattleCommand::AddBattlerTag {
                    target: BattlerIndex::Player,
                    tag,
                },
                BattleCommand::DamageSubstitute {
                    target: BattlerIndex::Player,
                    amount: 10,
                },
            ],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();
        let pokemon = state.active(BattlerIndex::Player).unwrap();
        assert_eq!(
            pokemon.get_tag(BattlerTagType::Substitute).map(|t| t.data.clone()),
            Some(TagData::Substitute { hp: 15 })
        );

        execute_command_batch(
            vec![BattleCommand::DamageSubstitute {
                target: BattlerIndex::Player,
                amount: 40,
            }],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();
        assert!(!state
            .active(BattlerIndex::Player)
            .unwrap()
            .has_tag(BattlerTagType::Substitute));
    }

    #[test]
    fn test_switch_resets_outgoing_summon_data() {
        let mut state = create_test_battle(
            vec![
                TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build(),
                TestPokemonBuilder::new(SpeciesId::Blastoise, 50).build(),
            ],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
        );
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();

        execute_command_batch(
            vec![
                BattleCommand::ChangeStatStage {
                    target: BattlerIndex::Player,
                    stat: BattleStat::Attack,
                    delta: 2,
                },
                BattleCommand::SwitchPokemon {
                    index: BattlerIndex::Player,
                    party_slot: 1,
                },
            ],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();

        assert_eq!(state.side(BattlerIndex::Player.side()).active, vec![Some(1)]);
        assert_eq!(state.sides[0].party[0].stat_stage(BattleStat::Attack), 0);
        assert_eq!(
            bus.events().last(),
            Some(&BattleEvent::PokemonSwitched {
                battler: BattlerIndex::Player,
                old_pokemon: SpeciesId::Pikachu,
                new_pokemon: SpeciesId::Blastoise,
            })
        );
    }

    #[test]
    fn test_phase_commands_target_queue_ends() {
        let mut state = singles();
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();
        queue.push_back(Phase::TurnEnd);

        execute_command_batch(
            vec![
                BattleCommand::PushPhase(Phase::CheckVictory),
                BattleCommand::QueuePhase(Phase::CommandSelection),
            ],
            &mut state,
            &mut bus,
            &mut queue,
        )
        .unwrap();

        let order: Vec<Phase> = queue.iter().cloned().collect();
        assert_eq!(
            order,
            vec![Phase::CheckVictory, Phase::TurnEnd, Phase::CommandSelection]
        );
    }
}
