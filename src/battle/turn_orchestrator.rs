use crate::battle::abilities;
use crate::battle::arena_tags;
use crate::battle::battler_tags::{self, BattlerTag, TagData};
use crate::battle::calculators::{checks_every_hit, hit_count, is_critical_hit, move_hits};
use crate::battle::commands::{execute_command_batch, BattleCommand};
use crate::battle::damage::{calculate_damage, fixed_damage, resolve_move_type, type_effectiveness, DamageContext};
use crate::battle::events::{ActionPreventionReason, BattleEvent, DamageSource, EventBus, MoveFailureReason};
use crate::battle::items;
use crate::battle::move_effects::{
    apply_effects, hit_damage_commands, kings_rock_commands, EffectContext, EffectTiming,
};
use crate::battle::phase::{determine_action_order, AwaitingInput, HitTarget, PendingAbility, Phase, PhaseQueue};
use crate::battle::state::{
    BattleOutcome, BattleRng, BattleState, BattlerIndex, GameState, PlayerAction, Side,
};
use crate::battle::stats::speed_order;
use crate::battle::targeting::resolve_targets;
use crate::battle::weather;
use crate::data::GameData;
use crate::errors::{BattleResult, BattleStateError};
use crate::pokemon::{Pokemon, PokemonId, TurnMove};
use schema::{
    ArenaTagType, BattlerTagType, FormChangeTrigger, ImmunityAbsorb, MoveData, MoveEffect, MoveEffectKind,
    MoveFlag, MoveId, MoveResult, PokemonType, StatusEffect, WeatherType,
};

/// Percent chance a frozen battler thaws when it tries to move.
pub const THAW_CHANCE: u8 = 20;
/// The toxic counter stops growing at 15/16 of max HP per turn.
pub const TOXIC_COUNTER_CAP: u8 = 15;

/// Everything a phase handler reads and mutates.
pub struct PhaseContext<'a> {
    pub state: &'a mut BattleState,
    pub data: &'a GameData,
    pub bus: &'a mut EventBus,
    pub queue: &'a mut PhaseQueue,
    pub rng: &'a mut BattleRng,
}

impl PhaseContext<'_> {
    fn run(&mut self, commands: Vec<BattleCommand>) -> BattleResult<()> {
        if commands.is_empty() {
            return Ok(());
        }
        execute_command_batch(commands, self.state, self.bus, self.queue)
    }
}

/// What the driver does after a phase ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Continue,
    Await(AwaitingInput),
}

/// Execute one phase, then schedule faint handling for anyone it knocked out.
pub fn execute_phase(phase: Phase, ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    log::debug!("turn {}: {:?}", ctx.state.turn, phase);
    let outcome = match phase {
        Phase::NewBattle => handle_new_battle(ctx)?,
        Phase::Summon { index, party_slot } => {
            ctx.run(vec![BattleCommand::SwitchPokemon { index, party_slot }])?;
            PhaseOutcome::Continue
        }
        Phase::PostSummon { indices } => handle_post_summon(ctx, indices)?,
        Phase::AbilityTriggers { pending } => handle_ability_triggers(ctx, pending)?,
        Phase::CommandSelection => handle_command_selection(ctx)?,
        Phase::TurnStart => handle_turn_start(ctx)?,
        Phase::Move {
            user,
            user_id,
            move_id,
            move_slot,
            target,
        } => handle_move(ctx, HitTarget { index: user, id: user_id }, move_id, move_slot, target)?,
        Phase::MoveEffect {
            user,
            user_id,
            move_id,
            targets,
        } => handle_move_effect(ctx, HitTarget { index: user, id: user_id }, move_id, targets)?,
        Phase::MoveHit {
            user,
            user_id,
            move_id,
            targets,
            hit,
            total,
            dealt_damage,
        } => handle_move_hit(
            ctx,
            HitTarget { index: user, id: user_id },
            move_id,
            targets,
            hit,
            total,
            dealt_damage,
        )?,
        Phase::MoveEnd {
            user,
            user_id,
            move_id,
            targets,
            result,
            dealt_damage,
        } => handle_move_end(
            ctx,
            HitTarget { index: user, id: user_id },
            move_id,
            targets,
            result,
            dealt_damage,
        )?,
        Phase::Faint { index } => handle_faint(ctx, index)?,
        Phase::SwitchPrompt { index } => handle_switch_prompt(ctx, index)?,
        Phase::EmergencySwitch { index, pokemon_id } => handle_emergency_switch(ctx, index, pokemon_id)?,
        Phase::Switch { index, party_slot } => handle_switch(ctx, index, party_slot)?,
        Phase::FormChange { index, form } => handle_form_change(ctx, index, form)?,
        Phase::WeatherEffect => handle_weather_effect(ctx)?,
        Phase::TurnEnd => handle_turn_end(ctx)?,
        Phase::CheckVictory => handle_check_victory(ctx)?,
        Phase::BattleEnd { outcome } => handle_battle_end(ctx, outcome)?,
    };
    if !matches!(ctx.state.game_state, GameState::Ended(_)) {
        queue_faints(ctx.state, ctx.queue);
    }
    Ok(outcome)
}

/// Schedule a Faint phase for every battler at 0 HP that still stands on the field.
fn queue_faints(state: &BattleState, queue: &mut PhaseQueue) {
    for index in BattlerIndex::ALL {
        if index.slot() >= state.field_size() {
            continue;
        }
        let fainted = state.pokemon(index).is_some_and(|pokemon| pokemon.is_fainted());
        if fainted && !queue.has_faint_for(index) {
            queue.push_after_move(Phase::Faint { index });
        }
    }
}

fn standing(state: &BattleState, index: BattlerIndex) -> bool {
    state.pokemon(index).is_some_and(|pokemon| !pokemon.is_fainted())
}

// --- Battle start and summoning ---

fn handle_new_battle(ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    ctx.bus.push(BattleEvent::BattleStarted {
        wave: ctx.state.wave,
        battle_type: ctx.state.battle_type,
        double: ctx.state.is_double(),
    });

    let mut commands = Vec::new();
    if let Some(weather) = ctx.state.overrides.starting_weather {
        commands.push(BattleCommand::SetWeather {
            weather: Some(weather),
            turns: 0,
        });
    }
    if let Some(terrain) = ctx.state.overrides.starting_terrain {
        commands.push(BattleCommand::SetTerrain {
            terrain: Some(terrain),
            turns: 0,
        });
    }
    ctx.run(commands)?;

    let mut entering = Vec::new();
    for side in [Side::Player, Side::Enemy] {
        let mut reserves = ctx.state.side(side).reserves().into_iter();
        for slot in 0..ctx.state.field_size() {
            let Some(index) = BattlerIndex::new(side, slot) else {
                continue;
            };
            if ctx.state.pokemon(index).is_some() {
                continue;
            }
            let Some(party_slot) = reserves.next() else {
                break;
            };
            ctx.queue.push_back(Phase::Summon { index, party_slot });
            entering.push(index);
        }
    }
    ctx.queue.push_back(Phase::PostSummon { indices: entering });
    ctx.queue.push_back(Phase::CommandSelection);
    Ok(PhaseOutcome::Continue)
}

fn handle_post_summon(ctx: &mut PhaseContext, indices: Vec<BattlerIndex>) -> BattleResult<PhaseOutcome> {
    for index in &indices {
        if standing(ctx.state, *index) {
            let commands = arena_tags::entry_hazard_commands(ctx.state, ctx.data, *index)?;
            ctx.run(commands)?;
        }
    }
    let pending = abilities::post_summon_triggers(ctx.state, ctx.data, &indices)?;
    if !pending.is_empty() {
        ctx.queue.push_front(Phase::AbilityTriggers { pending });
    }
    Ok(PhaseOutcome::Continue)
}

/// Resolve the best-ordered trigger only. The rest are re-ranked afterwards,
/// since an activation can change everyone else's speed.
fn handle_ability_triggers(
    ctx: &mut PhaseContext,
    mut pending: Vec<PendingAbility>,
) -> BattleResult<PhaseOutcome> {
    let Some(position) = abilities::next_trigger(ctx.state, ctx.data, &pending)? else {
        return Ok(PhaseOutcome::Continue);
    };
    let trigger = pending.remove(position);
    let commands = abilities::post_summon_commands(ctx.state, ctx.data, trigger)?;
    ctx.run(commands)?;
    if !pending.is_empty() {
        ctx.queue.push_front(Phase::AbilityTriggers { pending });
    }
    Ok(PhaseOutcome::Continue)
}

// --- Turn flow ---

/// The action a battler is committed to by a charge or a recharge.
pub fn locked_action(state: &BattleState, index: BattlerIndex) -> BattleResult<Option<PlayerAction>> {
    let pokemon = state.active(index)?;
    if pokemon.has_tag(BattlerTagType::Recharging) {
        return Ok(Some(PlayerAction::Locked {
            move_id: None,
            targets: Vec::new(),
        }));
    }
    if let Some(TagData::Charging { move_id, targets, .. }) =
        pokemon.get_tag(BattlerTagType::Charging).map(|tag| &tag.data)
    {
        return Ok(Some(PlayerAction::Locked {
            move_id: Some(*move_id),
            targets: targets.clone(),
        }));
    }
    Ok(None)
}

fn handle_command_selection(ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    let mut missing = false;
    for index in ctx.state.active_indices() {
        if ctx.state.pending_actions.contains_key(&index) {
            continue;
        }
        match locked_action(ctx.state, index)? {
            Some(action) => {
                ctx.state.pending_actions.insert(index, action);
            }
            None => missing = true,
        }
    }

    if missing {
        ctx.run(vec![BattleCommand::SetGameState(GameState::WaitingForCommands)])?;
        ctx.queue.push_front(Phase::CommandSelection);
        return Ok(PhaseOutcome::Await(AwaitingInput::Commands));
    }
    ctx.queue.push_front(Phase::TurnStart);
    Ok(PhaseOutcome::Continue)
}

fn handle_turn_start(ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    ctx.state.turn += 1;
    let turn = ctx.state.turn;
    ctx.run(vec![
        BattleCommand::SetGameState(GameState::TurnInProgress),
        BattleCommand::EmitEvent(BattleEvent::TurnStarted { turn }),
    ])?;
    for index in ctx.state.active_indices() {
        let pokemon = ctx.state.active_mut(index)?;
        pokemon.reset_turn_data();
        pokemon.summon_data.turns_on_field += 1;
    }

    let order = determine_action_order(ctx.state, ctx.data)?;
    ctx.state.pending_actions.clear();

    let mut phases = Vec::with_capacity(order.len() + 3);
    for (index, action) in order {
        let Some(pokemon) = ctx.state.pokemon(index) else {
            continue;
        };
        let user_id = pokemon.id;
        let phase = match action {
            PlayerAction::Forfeit => {
                let outcome = match index.side() {
                    Side::Player => BattleOutcome::EnemyVictory,
                    Side::Enemy => BattleOutcome::PlayerVictory,
                };
                log::debug!("{:?} forfeits", index);
                ctx.queue.push_front(Phase::BattleEnd { outcome });
                return Ok(PhaseOutcome::Continue);
            }
            PlayerAction::Switch { party_slot } => Phase::Switch { index, party_slot },
            PlayerAction::UseMove { slot, target } => {
                let Some(move_slot) = pokemon.move_slot(slot) else {
                    log::warn!("{:?} has no move in slot {}", index, slot);
                    continue;
                };
                Phase::Move {
                    user: index,
                    user_id,
                    move_id: move_slot.move_id,
                    move_slot: Some(slot),
                    target,
                }
            }
            PlayerAction::Struggle => Phase::Move {
                user: index,
                user_id,
                move_id: MoveId::Struggle,
                move_slot: None,
                target: None,
            },
            PlayerAction::Locked { move_id, targets } => Phase::Move {
                user: index,
                user_id,
                move_id: move_id
                    .or_else(|| pokemon.last_move().map(|entry| entry.move_id))
                    .unwrap_or(MoveId::Struggle),
                move_slot: None,
                target: targets.first().copied(),
            },
        };
        phases.push(phase);
    }

    phases.extend([Phase::WeatherEffect, Phase::TurnEnd, Phase::CommandSelection]);
    for phase in phases {
        ctx.queue.push_back(phase);
    }
    Ok(PhaseOutcome::Continue)
}

// --- Move resolution ---

fn fail_move(
    ctx: &mut PhaseContext,
    user: BattlerIndex,
    move_id: MoveId,
    reason: MoveFailureReason,
) -> BattleResult<PhaseOutcome> {
    let turn = ctx.state.turn;
    ctx.run(vec![
        BattleCommand::EmitEvent(BattleEvent::MoveFailed {
            user,
            move_used: move_id,
            reason,
        }),
        BattleCommand::SetProtectStreak {
            target: user,
            streak: 0,
        },
        BattleCommand::RecordMove {
            target: user,
            entry: TurnMove {
                move_id,
                targets: Vec::new(),
                result: MoveResult::Fail,
                turn,
            },
        },
    ])?;
    Ok(PhaseOutcome::Continue)
}

/// Sleep, freeze and paralysis checks made before a battler moves.
fn status_prevention(ctx: &mut PhaseContext, user: BattlerIndex) -> BattleResult<Option<ActionPreventionReason>> {
    let Some(status) = ctx.state.active(user)?.status else {
        return Ok(None);
    };
    let forced = ctx.state.overrides.status_activation;
    match status.effect {
        StatusEffect::Sleep => {
            if status.turns <= 1 {
                ctx.run(vec![BattleCommand::CureStatus { target: user }])?;
                return Ok(None);
            }
            ctx.run(vec![BattleCommand::SetStatusTurns {
                target: user,
                turns: status.turns - 1,
            }])?;
            Ok(Some(ActionPreventionReason::Asleep))
        }
        StatusEffect::Freeze => {
            let thaws = match forced {
                Some(stays_frozen) => !stays_frozen,
                None => ctx.rng.chance(THAW_CHANCE, "thaw"),
            };
            if thaws {
                ctx.run(vec![BattleCommand::CureStatus { target: user }])?;
                return Ok(None);
            }
            Ok(Some(ActionPreventionReason::Frozen))
        }
        StatusEffect::Paralysis => {
            let fully_paralyzed = match forced {
                Some(forced) => forced,
                None => ctx.rng.rand_int(4, "full paralysis") == 0,
            };
            Ok(fully_paralyzed.then_some(ActionPreventionReason::Paralyzed))
        }
        _ => Ok(None),
    }
}

/// Drop a charge, a pending recharge and any semi-invulnerability.
fn clear_locked_move_commands(state: &BattleState, user: BattlerIndex) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(user)?;
    Ok([
        BattlerTagType::Charging,
        BattlerTagType::Recharging,
        BattlerTagType::Flying,
        BattlerTagType::Underground,
    ]
    .into_iter()
    .filter(|tag_type| pokemon.has_tag(*tag_type))
    .map(|tag_type| BattleCommand::RemoveBattlerTag { target: user, tag_type })
    .collect())
}

fn handle_move(
    ctx: &mut PhaseContext,
    mover: HitTarget,
    move_id: MoveId,
    move_slot: Option<usize>,
    target: Option<BattlerIndex>,
) -> BattleResult<PhaseOutcome> {
    if !ctx.state.is_still_active(mover.index, mover.id) {
        return Ok(PhaseOutcome::Continue);
    }
    let user = mover.index;
    let data = ctx.data;
    let move_data = data.move_data(move_id)?;
    ctx.state.active_mut(user)?.turn_data.acted = true;

    let charged = ctx
        .state
        .active(user)?
        .get_tag(BattlerTagType::Charging)
        .and_then(|tag| match &tag.data {
            TagData::Charging { move_id: charged, targets, .. } if *charged == move_id => Some(targets.clone()),
            _ => None,
        });

    let mut prevented = status_prevention(ctx, user)?;
    if prevented.is_none() {
        let (commands, reason) = battler_tags::pre_move_checks(ctx.state, data, user, ctx.rng)?;
        ctx.run(commands)?;
        prevented = reason;
    }
    if let Some(reason) = prevented {
        log::debug!("{:?} could not move: {:?}", user, reason);
        ctx.bus.push(BattleEvent::ActionPrevented { battler: user, reason });
        if standing(ctx.state, user) {
            let commands = clear_locked_move_commands(ctx.state, user)?;
            ctx.run(commands)?;
        }
        return Ok(PhaseOutcome::Continue);
    }

    if charged.is_none() {
        if let Some(slot) = move_slot {
            let pp = ctx.state.active(user)?.move_slot(slot).map_or(0, |known| known.pp);
            if pp == 0 {
                return fail_move(ctx, user, move_id, MoveFailureReason::NoPpRemaining);
            }
        }
    }

    let species = ctx.state.active(user)?.species;
    ctx.bus.push(BattleEvent::MoveUsed {
        user,
        pokemon: species,
        move_used: move_id,
    });
    if charged.is_none() {
        if let Some(slot) = move_slot {
            ctx.run(vec![BattleCommand::DeductPp { target: user, slot }])?;
        }
    }

    if move_data.has_effect(MoveEffectKind::FirstTurnOnly) && ctx.state.active(user)?.summon_data.turns_on_field > 1 {
        return fail_move(ctx, user, move_id, MoveFailureReason::NotFirstTurn);
    }
    let move_type = resolve_move_type(ctx.state, data, user, move_data)?;
    if move_data.is_damaging() && weather::weather_cancels_move(ctx.state, move_type) {
        return fail_move(ctx, user, move_id, MoveFailureReason::WeatherBlocked);
    }
    if move_id != MoveId::Struggle {
        let commands = abilities::type_change_commands(ctx.state, data, user, move_type)?;
        ctx.run(commands)?;
    }

    let mut chosen = target;
    if let Some(stored) = &charged {
        chosen = stored.first().copied().or(target);
        let commands = clear_locked_move_commands(ctx.state, user)?;
        ctx.run(commands)?;
    } else if let Some(MoveEffect::Charge { tag, instant_in_sun }) = move_data.effect(MoveEffectKind::Charge) {
        let sunny = matches!(
            ctx.state.arena.weather_type(),
            Some(WeatherType::Sunny | WeatherType::HarshSun)
        );
        if !(*instant_in_sun && sunny) {
            let targets = resolve_targets(ctx.state, user, move_data.target, target, ctx.rng);
            let mut commands = vec![BattleCommand::AddBattlerTag {
                target: user,
                tag: BattlerTag::new(BattlerTagType::Charging, Some(move_id), Some(mover.id)).with_data(
                    TagData::Charging {
                        move_id,
                        move_slot,
                        targets,
                    },
                ),
            }];
            if let Some(tag_type) = tag {
                commands.push(BattleCommand::AddBattlerTag {
                    target: user,
                    tag: BattlerTag::new(*tag_type, Some(move_id), Some(mover.id)),
                });
            }
            commands.push(BattleCommand::EmitEvent(BattleEvent::MoveCharging {
                user,
                move_used: move_id,
            }));
            ctx.run(commands)?;
            return Ok(PhaseOutcome::Continue);
        }
    }

    let indices = resolve_targets(ctx.state, user, move_data.target, chosen, ctx.rng);
    let targets: Vec<HitTarget> = indices
        .into_iter()
        .filter_map(|index| {
            ctx.state
                .pokemon(index)
                .map(|pokemon| HitTarget { index, id: pokemon.id })
        })
        .collect();
    if targets.is_empty() {
        return fail_move(ctx, user, move_id, MoveFailureReason::NoTarget);
    }
    if move_data.has_effect(MoveEffectKind::DelayedAttack) {
        return foresee_attack(ctx, mover, move_data, targets[0].index);
    }
    ctx.queue.push_front(Phase::MoveEffect {
        user,
        user_id: mover.id,
        move_id,
        targets,
    });
    Ok(PhaseOutcome::Continue)
}

/// Future Sight and Doom Desire: the damage is rolled now and lands on the
/// target's position when the arena tag runs out.
fn foresee_attack(
    ctx: &mut PhaseContext,
    mover: HitTarget,
    move_data: &MoveData,
    target: BattlerIndex,
) -> BattleResult<PhaseOutcome> {
    let user = mover.index;
    if ctx.state.arena.delayed_attack_at(target).is_some() {
        return fail_move(ctx, user, move_data.id, MoveFailureReason::AttackPending);
    }
    let damage_ctx = DamageContext {
        user,
        target,
        move_data,
        is_crit: false,
        hit: 0,
        target_count: 1,
    };
    let damage = calculate_damage(ctx.state, ctx.data, &damage_ctx, ctx.rng)?.damage;
    ctx.run(vec![BattleCommand::ScheduleDelayedAttack {
        target,
        move_id: move_data.id,
        source_id: mover.id,
        damage,
    }])?;
    ctx.queue.push_front(Phase::MoveEnd {
        user,
        user_id: mover.id,
        move_id: move_data.id,
        targets: vec![target],
        result: MoveResult::Success,
        dealt_damage: false,
    });
    Ok(PhaseOutcome::Continue)
}

/// Protection, Quick Guard, Wide Guard, Psychic Terrain and Commander.
fn is_blocked(
    ctx: &mut PhaseContext,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
) -> BattleResult<bool> {
    let defender = ctx.state.active(target)?;
    let side = target.side().arena_side();
    let protected = !move_data.has_flag(MoveFlag::IgnoreProtect)
        && (defender.has_tag(BattlerTagType::Protected)
            || (move_data.priority > 0 && ctx.state.arena.has_tag_on_side(ArenaTagType::QuickGuard, side))
            || (move_data.target.is_spread() && ctx.state.arena.has_tag_on_side(ArenaTagType::WideGuard, side)));
    if protected {
        ctx.bus.push(BattleEvent::Protected { target });
        return Ok(true);
    }
    if weather::terrain_blocks_priority(ctx.state, ctx.data, user, target, move_data.priority)? {
        ctx.bus.push(BattleEvent::MoveFailed {
            user,
            move_used: move_data.id,
            reason: MoveFailureReason::TerrainBlocked,
        });
        return Ok(true);
    }
    if defender.has_tag(BattlerTagType::Commanded) {
        ctx.bus.push(BattleEvent::MoveNoEffect {
            target,
            move_used: move_data.id,
        });
        return Ok(true);
    }
    Ok(false)
}

/// Absorbing abilities first, then the type chart. Fixed-damage moves only
/// consult the chart when flagged to.
fn is_immune(
    ctx: &mut PhaseContext,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
    move_type: PokemonType,
) -> BattleResult<bool> {
    if let Some((ability, absorb)) = abilities::type_immunity(ctx.state, ctx.data, target, user, move_type)? {
        let defender = ctx.state.active(target)?;
        let mut commands = vec![BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
            battler: target,
            ability,
        })];
        match absorb {
            ImmunityAbsorb::HealPercent(percent) if !defender.is_full_hp() => {
                commands.push(BattleCommand::Heal {
                    target,
                    amount: defender.max_hp_fraction(percent as u16, 100),
                });
            }
            ImmunityAbsorb::FireBoost if !defender.has_tag(BattlerTagType::FireBoost) => {
                commands.push(BattleCommand::AddBattlerTag {
                    target,
                    tag: BattlerTag::new(BattlerTagType::FireBoost, None, Some(defender.id)),
                });
            }
            _ => {}
        }
        ctx.run(commands)?;
        return Ok(true);
    }

    let consults_chart = move_data.has_flag(MoveFlag::RespectTypeImmunity)
        || (move_data.is_damaging() && !move_data.is_fixed_damage());
    if consults_chart && type_effectiveness(ctx.state, ctx.data, user, target, move_data, move_type)? == 0.0 {
        ctx.bus.push(BattleEvent::MoveNoEffect {
            target,
            move_used: move_data.id,
        });
        return Ok(true);
    }
    Ok(false)
}

fn handle_move_effect(
    ctx: &mut PhaseContext,
    mover: HitTarget,
    move_id: MoveId,
    targets: Vec<HitTarget>,
) -> BattleResult<PhaseOutcome> {
    if !ctx.state.is_still_active(mover.index, mover.id) {
        return Ok(PhaseOutcome::Continue);
    }
    let user = mover.index;
    let data = ctx.data;
    let move_data = data.move_data(move_id)?;
    let move_type = resolve_move_type(ctx.state, data, user, move_data)?;

    let mut landed = Vec::with_capacity(targets.len());
    let mut missed = false;
    let mut reflected = false;
    for target in targets {
        if !ctx.state.is_still_active(target.index, target.id) {
            continue;
        }
        if target.index == user || move_data.target.is_field() {
            landed.push(target);
            continue;
        }
        if is_blocked(ctx, user, target.index, move_data)? {
            continue;
        }
        if reflect_status_move(ctx, mover, target.index, move_data)? {
            reflected = true;
            continue;
        }
        if is_immune(ctx, user, target.index, move_data, move_type)? {
            continue;
        }
        if !move_hits(ctx.state, data, user, target.index, move_data, ctx.rng)? {
            ctx.bus.push(BattleEvent::MoveMissed {
                user,
                target: target.index,
                move_used: move_id,
            });
            missed = true;
            continue;
        }
        landed.push(target);
    }

    let Some(first) = landed.first().map(|target| target.index) else {
        ctx.queue.push_front(Phase::MoveEnd {
            user,
            user_id: mover.id,
            move_id,
            targets: Vec::new(),
            result: match (reflected, missed) {
                (true, _) => MoveResult::Success,
                (false, true) => MoveResult::Miss,
                (false, false) => MoveResult::Fail,
            },
            dealt_damage: false,
        });
        return Ok(PhaseOutcome::Continue);
    };

    let effect_ctx = EffectContext {
        data,
        user,
        target: first,
        move_data,
        damage_dealt: 0,
        first_target: true,
    };
    let outcome = apply_effects(EffectTiming::BeforeHits, &effect_ctx, ctx.state, ctx.rng)?;
    ctx.run(outcome.commands)?;

    let total = if move_data.is_damaging() {
        hit_count(ctx.state, data, user, move_data, landed.len(), ctx.rng)?
    } else {
        1
    };
    ctx.queue.push_front(Phase::MoveHit {
        user,
        user_id: mover.id,
        move_id,
        targets: landed,
        hit: 0,
        total,
        dealt_damage: false,
    });
    Ok(PhaseOutcome::Continue)
}

/// Magic Coat and Magic Bounce send a reflectable status move back at its
/// user. A reflected move is not reflected again. Returns true when the move
/// bounced.
fn reflect_status_move(
    ctx: &mut PhaseContext,
    mover: HitTarget,
    target: BattlerIndex,
    move_data: &MoveData,
) -> BattleResult<bool> {
    if move_data.is_damaging() || !move_data.has_flag(MoveFlag::Reflectable) {
        return Ok(false);
    }
    let defender = ctx.state.active(target)?;
    if defender.is_semi_invulnerable().is_some() {
        return Ok(false);
    }
    let coated = defender.has_tag(BattlerTagType::MagicCoat);
    let bounce = if coated {
        None
    } else {
        abilities::bounces_status_moves(ctx.state, ctx.data, target, mover.index)?
    };
    if !coated && bounce.is_none() {
        return Ok(false);
    }

    if let Some(ability) = bounce {
        ctx.bus.push(BattleEvent::AbilityActivated { battler: target, ability });
    }
    ctx.bus.push(BattleEvent::MoveReflected {
        user: target,
        target: mover.index,
        move_used: move_data.id,
    });
    let move_type = resolve_move_type(ctx.state, ctx.data, target, move_data)?;
    if !is_immune(ctx, target, mover.index, move_data, move_type)? {
        resolve_status_move(ctx, target, move_data, &[mover])?;
    }
    Ok(true)
}

/// Apply a status move to every target. It fails when nothing took hold.
fn resolve_status_move(
    ctx: &mut PhaseContext,
    user: BattlerIndex,
    move_data: &MoveData,
    targets: &[HitTarget],
) -> BattleResult<MoveResult> {
    let mut applied = move_data.effects.is_empty();
    let mut failure = None;
    for (position, target) in targets.iter().enumerate() {
        let effect_ctx = EffectContext {
            data: ctx.data,
            user,
            target: target.index,
            move_data,
            damage_dealt: 0,
            first_target: position == 0,
        };
        let outcome = apply_effects(EffectTiming::PerHit, &effect_ctx, ctx.state, ctx.rng)?;
        applied |= outcome.applied;
        failure = failure.or(outcome.failure);
        ctx.run(outcome.commands)?;
    }
    if applied {
        return Ok(MoveResult::Success);
    }
    ctx.bus.push(BattleEvent::MoveFailed {
        user,
        move_used: move_data.id,
        reason: failure.unwrap_or(MoveFailureReason::NothingToChange),
    });
    Ok(MoveResult::Fail)
}

/// One strike on every remaining target: accuracy (for moves that check each
/// hit), crit, damage, then per-hit effects and items.
fn handle_move_hit(
    ctx: &mut PhaseContext,
    mover: HitTarget,
    move_id: MoveId,
    targets: Vec<HitTarget>,
    hit: u8,
    total: u8,
    dealt_damage: bool,
) -> BattleResult<PhaseOutcome> {
    if !ctx.state.is_still_active(mover.index, mover.id) {
        return Ok(PhaseOutcome::Continue);
    }
    let user = mover.index;
    let data = ctx.data;
    let move_data = data.move_data(move_id)?;
    let indices: Vec<BattlerIndex> = targets.iter().map(|target| target.index).collect();
    let live: Vec<HitTarget> = targets
        .iter()
        .copied()
        .filter(|target| ctx.state.is_still_active(target.index, target.id))
        .collect();

    if !move_data.is_damaging() {
        let result = resolve_status_move(ctx, user, move_data, &live)?;
        ctx.queue.push_front(Phase::MoveEnd {
            user,
            user_id: mover.id,
            move_id,
            targets: indices,
            result,
            dealt_damage: false,
        });
        return Ok(PhaseOutcome::Continue);
    }

    let mut dealt_any = dealt_damage;
    let mut struck = false;
    let mut stop = false;
    for (position, target) in live.iter().map(|target| target.index).enumerate() {
        if hit > 0
            && checks_every_hit(ctx.state, data, user, move_data)?
            && !move_hits(ctx.state, data, user, target, move_data, ctx.rng)?
        {
            ctx.bus.push(BattleEvent::MoveMissed {
                user,
                target,
                move_used: move_id,
            });
            stop = true;
            continue;
        }

        let base_ctx = DamageContext {
            user,
            target,
            move_data,
            is_crit: false,
            hit,
            target_count: targets.len(),
        };
        let fixed = fixed_damage(ctx.state, &base_ctx)?;
        let is_crit = fixed.is_none() && is_critical_hit(ctx.state, data, user, target, move_data, ctx.rng)?;
        let damage_ctx = DamageContext { is_crit, ..base_ctx };
        let (amount, effectiveness) = match fixed {
            Some(amount) => (amount, None),
            None => {
                let breakdown = calculate_damage(ctx.state, data, &damage_ctx, ctx.rng)?;
                (breakdown.damage, Some(breakdown.effectiveness))
            }
        };
        if effectiveness == Some(0.0) {
            ctx.bus.push(BattleEvent::MoveNoEffect {
                target,
                move_used: move_id,
            });
            continue;
        }

        let hp_before = ctx.state.active(target)?.current_hp();
        let strike = hit_damage_commands(ctx.state, data, user, target, move_data, amount, ctx.rng)?;
        ctx.run(strike.commands)?;
        struck = true;
        if is_crit {
            ctx.bus.push(BattleEvent::CriticalHit { target });
        }
        if let Some(multiplier) = effectiveness.filter(|multiplier| hit == 0 && *multiplier != 1.0) {
            ctx.bus.push(BattleEvent::TypeEffectiveness { target, multiplier });
        }
        dealt_any |= strike.dealt > 0 || strike.substitute_hit;
        if let Some(defender) = ctx.state.pokemon_mut(target) {
            defender.turn_data.damage_taken = defender.turn_data.damage_taken.saturating_add(strike.dealt);
        }

        let effect_ctx = EffectContext {
            data,
            user,
            target,
            move_data,
            damage_dealt: strike.dealt,
            first_target: position == 0 && hit == 0,
        };
        let outcome = apply_effects(EffectTiming::PerHit, &effect_ctx, ctx.state, ctx.rng)?;
        ctx.run(outcome.commands)?;
        let commands = kings_rock_commands(ctx.state, data, user, target, move_data, ctx.rng)?;
        ctx.run(commands)?;
        let commands = items::after_damage_commands(ctx.state, data, target)?;
        ctx.run(commands)?;
        if target != user {
            check_emergency_exit(ctx, target, hp_before)?;
        }

        if !ctx.state.is_still_active(mover.index, mover.id) {
            stop = true;
            break;
        }
    }

    let any_target_left = live
        .iter()
        .any(|target| ctx.state.is_still_active(target.index, target.id));
    if !stop && any_target_left && hit + 1 < total {
        ctx.queue.push_front(Phase::MoveHit {
            user,
            user_id: mover.id,
            move_id,
            targets,
            hit: hit + 1,
            total,
            dealt_damage: dealt_any,
        });
        return Ok(PhaseOutcome::Continue);
    }

    if let Some(pokemon) = ctx.state.pokemon_mut(user) {
        pokemon.turn_data.hit_count = hit + u8::from(struck);
    }
    ctx.queue.push_front(Phase::MoveEnd {
        user,
        user_id: mover.id,
        move_id,
        targets: indices,
        result: MoveResult::Success,
        dealt_damage: dealt_any,
    });
    Ok(PhaseOutcome::Continue)
}

/// Wimp Out and Emergency Exit: a hit that takes the holder from above half HP
/// to half or below sends it back once the move is over.
fn check_emergency_exit(ctx: &mut PhaseContext, target: BattlerIndex, hp_before: u16) -> BattleResult<()> {
    let Some(pokemon) = ctx.state.pokemon(target).filter(|pokemon| !pokemon.is_fainted()) else {
        return Ok(());
    };
    let max_hp = pokemon.max_hp() as u32;
    let crossed = hp_before as u32 * 2 > max_hp && pokemon.current_hp() as u32 * 2 <= max_hp;
    let pokemon_id = pokemon.id;
    if !crossed || !ctx.state.side(target.side()).has_reserve() {
        return Ok(());
    }
    let Some(ability) = abilities::emergency_exit(ctx.state, ctx.data, target)? else {
        return Ok(());
    };
    ctx.bus.push(BattleEvent::AbilityActivated { battler: target, ability });
    ctx.queue.push_after_move(Phase::EmergencySwitch {
        index: target,
        pokemon_id,
    });
    Ok(())
}

/// Form changes due after a move: every battler whose HP now sits on the
/// other side of its form's threshold.
pub fn form_change_phases(state: &BattleState, data: &GameData) -> BattleResult<Vec<Phase>> {
    let mut phases = Vec::new();
    for index in state.active_indices() {
        let pokemon = state.active(index)?;
        let species = data.species(pokemon.species)?;
        let wanted = species
            .forms
            .iter()
            .position(|form| match form.trigger {
                FormChangeTrigger::HpAtOrBelowHalf => pokemon.current_hp() <= pokemon.max_hp() / 2,
            })
            .map_or(0, |position| position as u8 + 1);
        if wanted != pokemon.form_index {
            phases.push(Phase::FormChange { index, form: wanted });
        }
    }
    Ok(phases)
}

fn handle_move_end(
    ctx: &mut PhaseContext,
    mover: HitTarget,
    move_id: MoveId,
    targets: Vec<BattlerIndex>,
    result: MoveResult,
    dealt_damage: bool,
) -> BattleResult<PhaseOutcome> {
    let user = mover.index;
    let Some(pokemon) = ctx.state.pokemon(user).filter(|pokemon| pokemon.id == mover.id) else {
        return Ok(PhaseOutcome::Continue);
    };
    let data = ctx.data;
    let move_data = data.move_data(move_id)?;
    let fainted = pokemon.is_fainted();
    let hits = pokemon.turn_data.hit_count;
    let keeps_streak = result == MoveResult::Success
        && (move_data.has_effect(MoveEffectKind::Protect) || move_data.has_effect(MoveEffectKind::Endure));

    let mut commands = Vec::new();
    if hits > 1 {
        commands.push(BattleCommand::EmitEvent(BattleEvent::HitCount { user, hits }));
    }
    if !keeps_streak && pokemon.summon_data.protect_streak > 0 {
        commands.push(BattleCommand::SetProtectStreak {
            target: user,
            streak: 0,
        });
    }
    commands.push(BattleCommand::RecordMove {
        target: user,
        entry: TurnMove {
            move_id,
            targets: targets.clone(),
            result,
            turn: ctx.state.turn,
        },
    });
    ctx.run(commands)?;

    if !fainted && result == MoveResult::Success {
        let effect_ctx = EffectContext {
            data,
            user,
            target: targets.first().copied().unwrap_or(user),
            move_data,
            damage_dealt: 0,
            first_target: true,
        };
        let outcome = apply_effects(EffectTiming::AfterMove, &effect_ctx, ctx.state, ctx.rng)?;
        ctx.run(outcome.commands)?;
    }
    if !fainted && dealt_damage {
        let magic_guard = abilities::blocks_indirect_damage(ctx.state, data, user)?;
        let commands = items::after_move_commands(ctx.state, data, user, magic_guard)?;
        ctx.run(commands)?;
    }

    let phases = form_change_phases(ctx.state, data)?;
    ctx.queue.push_front_all(phases);
    Ok(PhaseOutcome::Continue)
}

fn handle_form_change(ctx: &mut PhaseContext, index: BattlerIndex, form: u8) -> BattleResult<PhaseOutcome> {
    let Some(pokemon) = ctx
        .state
        .pokemon(index)
        .filter(|pokemon| !pokemon.is_fainted() && pokemon.form_index != form)
    else {
        return Ok(PhaseOutcome::Continue);
    };
    let species = ctx.data.species(pokemon.species)?;
    let stats = Pokemon::calculate_stats(
        species.base_stats_for_form(form).as_array(),
        pokemon.level,
        &pokemon.ivs,
    );
    let types = species.types_for_form(form).to_vec();
    ctx.run(vec![BattleCommand::ChangeForm {
        target: index,
        form,
        stats,
        types,
    }])?;
    Ok(PhaseOutcome::Continue)
}

// --- Fainting and switching ---

fn handle_faint(ctx: &mut PhaseContext, index: BattlerIndex) -> BattleResult<PhaseOutcome> {
    let Some(pokemon) = ctx.state.pokemon(index).filter(|pokemon| pokemon.is_fainted()) else {
        return Ok(PhaseOutcome::Continue);
    };
    let (id, species) = (pokemon.id, pokemon.species);
    log::debug!("{:?} at {:?} fainted", species, index);
    ctx.bus.push(BattleEvent::PokemonFainted {
        battler: index,
        pokemon: species,
    });
    ctx.state.arena.source_left_field(id, ctx.bus);
    ctx.queue.remove_moves_of(id);
    ctx.run(vec![BattleCommand::RemoveFromField { index }])?;

    let mut next = vec![Phase::CheckVictory];
    if ctx.state.side(index.side()).has_reserve() {
        next.push(Phase::SwitchPrompt { index });
    }
    ctx.queue.push_front_all(next);
    Ok(PhaseOutcome::Continue)
}

/// Stop for a replacement. The driver answers with a `Switch` phase.
fn handle_switch_prompt(ctx: &mut PhaseContext, index: BattlerIndex) -> BattleResult<PhaseOutcome> {
    if standing(ctx.state, index) || !ctx.state.side(index.side()).has_reserve() {
        return Ok(PhaseOutcome::Continue);
    }
    ctx.run(vec![BattleCommand::SetGameState(GameState::WaitingForReplacement(index))])?;
    Ok(PhaseOutcome::Await(AwaitingInput::Replacement(index)))
}

/// A battler leaving on its own mid-turn. Its side picks the replacement.
fn handle_emergency_switch(
    ctx: &mut PhaseContext,
    index: BattlerIndex,
    pokemon_id: PokemonId,
) -> BattleResult<PhaseOutcome> {
    if !ctx.state.is_still_active(index, pokemon_id) || !ctx.state.side(index.side()).has_reserve() {
        return Ok(PhaseOutcome::Continue);
    }
    log::debug!("{:?} at {:?} is leaving the field", pokemon_id, index);
    ctx.run(vec![BattleCommand::SetGameState(GameState::WaitingForReplacement(index))])?;
    Ok(PhaseOutcome::Await(AwaitingInput::Replacement(index)))
}

fn handle_switch(ctx: &mut PhaseContext, index: BattlerIndex, party_slot: usize) -> BattleResult<PhaseOutcome> {
    let side = ctx.state.side(index.side());
    let incoming = side
        .party
        .get(party_slot)
        .ok_or(BattleStateError::InvalidPartySlot(party_slot))?;
    if incoming.is_fainted() || side.is_active(party_slot) {
        log::warn!("switch to party slot {} at {:?} is no longer possible", party_slot, index);
        return Ok(PhaseOutcome::Continue);
    }

    if let Some(outgoing) = ctx.state.pokemon(index) {
        let id = outgoing.id;
        ctx.state.arena.source_left_field(id, ctx.bus);
        ctx.queue.remove_moves_of(id);
    }
    ctx.run(vec![
        BattleCommand::SetGameState(GameState::TurnInProgress),
        BattleCommand::SwitchPokemon { index, party_slot },
    ])?;
    ctx.queue.push_front(Phase::PostSummon { indices: vec![index] });
    Ok(PhaseOutcome::Continue)
}

// --- Turn end ---

fn handle_weather_effect(ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    let commands = weather::weather_damage_commands(ctx.state, ctx.data)?;
    ctx.run(commands)?;
    let commands = arena_tags::turn_end_commands(ctx.state, ctx.data)?;
    ctx.run(commands)?;
    Ok(PhaseOutcome::Continue)
}

/// Burn and poison damage, and the toxic counter.
pub fn status_damage_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(index)?;
    let Some(status) = pokemon.status.filter(|_| !pokemon.is_fainted()) else {
        return Ok(Vec::new());
    };
    let mut commands = Vec::new();
    let amount = match status.effect {
        StatusEffect::Burn => pokemon.max_hp_fraction(1, 16),
        StatusEffect::Poison => pokemon.max_hp_fraction(1, 8),
        StatusEffect::Toxic => {
            let counter = status.turns.saturating_add(1).min(TOXIC_COUNTER_CAP);
            commands.push(BattleCommand::SetStatusTurns {
                target: index,
                turns: counter,
            });
            pokemon.max_hp_fraction(counter as u16, 16)
        }
        _ => return Ok(commands),
    };
    if !abilities::blocks_indirect_damage(state, data, index)? {
        commands.insert(
            0,
            BattleCommand::DealIndirectDamage {
                target: index,
                amount,
                source: DamageSource::Status(status.effect),
            },
        );
    }
    Ok(commands)
}

/// Delayed attacks land first, then residual effects in current speed order,
/// then weather, terrain and arena tags count down.
fn handle_turn_end(ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    let data = ctx.data;
    let commands = arena_tags::delayed_attack_commands(ctx.state);
    ctx.run(commands)?;
    let order = speed_order(ctx.state, data, &ctx.state.active_indices())?;
    for index in order {
        if !standing(ctx.state, index) {
            continue;
        }
        let commands = weather::terrain_heal_commands(ctx.state, data, index)?;
        ctx.run(commands)?;
        let commands = items::turn_end_commands(ctx.state, data, index)?;
        ctx.run(commands)?;
        let commands = status_damage_commands(ctx.state, data, index)?;
        ctx.run(commands)?;
        if !standing(ctx.state, index) {
            continue;
        }
        let commands = battler_tags::turn_end_commands(ctx.state, data, index, ctx.rng)?;
        ctx.run(commands)?;
        if !standing(ctx.state, index) {
            continue;
        }
        let commands = abilities::turn_end_commands(ctx.state, data, index)?;
        ctx.run(commands)?;
    }

    ctx.state.arena.lapse_weather(ctx.bus);
    ctx.state.arena.lapse_terrain(ctx.bus);
    ctx.state.arena.lapse_tags(ctx.bus);
    ctx.bus.push(BattleEvent::TurnEnded { turn: ctx.state.turn });
    Ok(PhaseOutcome::Continue)
}

// --- Battle end ---

fn handle_check_victory(ctx: &mut PhaseContext) -> BattleResult<PhaseOutcome> {
    let player_out = ctx.state.side(Side::Player).all_fainted();
    let enemy_out = ctx.state.side(Side::Enemy).all_fainted();
    let outcome = match (player_out, enemy_out) {
        (true, true) => BattleOutcome::Draw,
        (false, true) => BattleOutcome::PlayerVictory,
        (true, false) => BattleOutcome::EnemyVictory,
        (false, false) => return Ok(PhaseOutcome::Continue),
    };
    ctx.queue.clear();
    ctx.queue.push_front(Phase::BattleEnd { outcome });
    Ok(PhaseOutcome::Continue)
}

fn handle_battle_end(ctx: &mut PhaseContext, outcome: BattleOutcome) -> BattleResult<PhaseOutcome> {
    log::debug!("battle {} ended: {:?}", ctx.state.battle_id, outcome);
    ctx.queue.clear();
    ctx.state.pending_actions.clear();
    ctx.run(vec![
        BattleCommand::SetGameState(GameState::Ended(outcome)),
        BattleCommand::EmitEvent(BattleEvent::BattleEnded { outcome }),
    ])?;
    Ok(PhaseOutcome::Await(AwaitingInput::BattleOver(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{
        create_battle_with_config, create_test_battle, pinned_config, test_data, TestPokemonBuilder,
    };
    use pretty_assertions::assert_eq;
    use schema::SpeciesId;

    fn run_phase(state: &mut BattleState, phase: Phase, rng: &mut BattleRng) -> (PhaseOutcome, EventBus, PhaseQueue) {
        let data = test_data();
        let mut bus = EventBus::new();
        let mut queue = PhaseQueue::new();
        let outcome = {
            let mut ctx = PhaseContext {
                state,
                data: &data,
                bus: &mut bus,
                queue: &mut queue,
                rng,
            };
            execute_phase(phase, &mut ctx).unwrap()
        };
        (outcome, bus, queue)
    }

    fn tackle(state: &BattleState) -> Phase {
        Phase::Move {
            user: BattlerIndex::Player,
            user_id: state.pokemon(BattlerIndex::Player).unwrap().id,
            move_id: MoveId::Tackle,
            move_slot: Some(0),
            target: Some(BattlerIndex::Enemy),
        }
    }

    #[test]
    fn test_sleep_counts_down_then_wakes() {
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_status_turns(StatusEffect::Sleep, 2)
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        let mut rng = BattleRng::new_for_test(vec![]);

        let phase = tackle(&state);
        let (_, bus, queue) = run_phase(&mut state, phase.clone(), &mut rng);
        assert!(bus.events().contains(&BattleEvent::ActionPrevented {
            battler: BattlerIndex::Player,
            reason: ActionPreventionReason::Asleep,
        }));
        assert!(queue.is_empty());
        let snorlax = state.pokemon(BattlerIndex::Player).unwrap();
        assert_eq!(snorlax.status.map(|status| status.turns), Some(1));
        assert_eq!(snorlax.moveset[0].pp, snorlax.moveset[0].max_pp);

        let (_, bus, queue) = run_phase(&mut state, phase, &mut rng);
        assert!(bus.events().contains(&BattleEvent::StatusCured {
            target: BattlerIndex::Player,
            status: StatusEffect::Sleep,
        }));
        assert!(matches!(queue.peek(), Some(Phase::MoveEffect { .. })));
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_forced_full_paralysis_skips_the_roll() {
        let mut config = pinned_config();
        config.overrides.status_activation = Some(true);
        let mut state = create_battle_with_config(
            &config,
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_status(StatusEffect::Paralysis)
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        let mut rng = BattleRng::new_for_test(vec![]);
        let phase = tackle(&state);
        let (_, bus, _) = run_phase(&mut state, phase, &mut rng);
        assert!(bus.events().contains(&BattleEvent::ActionPrevented {
            battler: BattlerIndex::Player,
            reason: ActionPreventionReason::Paralyzed,
        }));
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_toxic_damage_grows_each_turn() {
        let data = test_data();
        let state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50)
                .with_status_turns(StatusEffect::Toxic, 1)
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        let snorlax = state.pokemon(BattlerIndex::Player).unwrap();
        let commands = status_damage_commands(&state, &data, BattlerIndex::Player).unwrap();
        assert_eq!(
            commands,
            vec![
                BattleCommand::DealIndirectDamage {
                    target: BattlerIndex::Player,
                    amount: snorlax.max_hp_fraction(2, 16),
                    source: DamageSource::Status(StatusEffect::Toxic),
                },
                BattleCommand::SetStatusTurns {
                    target: BattlerIndex::Player,
                    turns: 2,
                },
            ]
        );
    }

    #[test]
    fn test_magic_guard_only_advances_the_toxic_counter() {
        let data = test_data();
        let state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Clefable, 50)
                .with_status(StatusEffect::Toxic)
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        assert_eq!(
            status_damage_commands(&state, &data, BattlerIndex::Player).unwrap(),
            vec![BattleCommand::SetStatusTurns {
                target: BattlerIndex::Player,
                turns: 1,
            }]
        );
    }

    #[test]
    fn test_charge_move_locks_in_the_next_turn() {
        let mut state = create_battle_with_config(
            &pinned_config(),
            vec![TestPokemonBuilder::new(SpeciesId::Venusaur, 50)
                .with_moves(vec![MoveId::SolarBeam])
                .build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        let mut rng = BattleRng::new_for_test(vec![]);
        let phase = Phase::Move {
            user: BattlerIndex::Player,
            user_id: state.pokemon(BattlerIndex::Player).unwrap().id,
            move_id: MoveId::SolarBeam,
            move_slot: Some(0),
            target: Some(BattlerIndex::Enemy),
        };
        let (_, bus, queue) = run_phase(&mut state, phase, &mut rng);
        assert!(queue.is_empty());
        assert!(bus.events().contains(&BattleEvent::MoveCharging {
            user: BattlerIndex::Player,
            move_used: MoveId::SolarBeam,
        }));
        assert_eq!(
            locked_action(&state, BattlerIndex::Player).unwrap(),
            Some(PlayerAction::Locked {
                move_id: Some(MoveId::SolarBeam),
                targets: vec![BattlerIndex::Enemy],
            })
        );
    }

    #[test]
    fn test_form_change_below_half_hp() {
        let data = test_data();
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Darmanitan, 50).with_hp(40).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        let phases = form_change_phases(&state, &data).unwrap();
        assert_eq!(
            phases,
            vec![Phase::FormChange {
                index: BattlerIndex::Player,
                form: 1,
            }]
        );

        let mut rng = BattleRng::new_for_test(vec![]);
        let (_, bus, _) = run_phase(&mut state, phases[0].clone(), &mut rng);
        let darmanitan = state.pokemon(BattlerIndex::Player).unwrap();
        assert_eq!(darmanitan.form_index, 1);
        assert_eq!(darmanitan.types(), &[PokemonType::Fire, PokemonType::Psychic]);
        assert!(bus.events().contains(&BattleEvent::FormChanged {
            battler: BattlerIndex::Player,
            pokemon: SpeciesId::Darmanitan,
            form: 1,
        }));
    }

    #[test]
    fn test_other_moves_reset_the_protect_streak() {
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        state
            .pokemon_mut(BattlerIndex::Player)
            .unwrap()
            .summon_data
            .protect_streak = 2;
        let phase = Phase::MoveEnd {
            user: BattlerIndex::Player,
            user_id: state.pokemon(BattlerIndex::Player).unwrap().id,
            move_id: MoveId::Tackle,
            targets: vec![BattlerIndex::Enemy],
            result: MoveResult::Success,
            dealt_damage: false,
        };
        let mut rng = BattleRng::new_for_test(vec![]);
        run_phase(&mut state, phase, &mut rng);
        let snorlax = state.pokemon(BattlerIndex::Player).unwrap();
        assert_eq!(snorlax.summon_data.protect_streak, 0);
        assert_eq!(snorlax.last_move().map(|entry| entry.move_id), Some(MoveId::Tackle));
    }

    #[test]
    fn test_last_faint_ends_the_battle() {
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).with_hp(0).build()],
        );
        let mut rng = BattleRng::new_for_test(vec![]);
        let (_, bus, queue) = run_phase(&mut state, Phase::Faint { index: BattlerIndex::Enemy }, &mut rng);
        assert!(bus.events().contains(&BattleEvent::PokemonFainted {
            battler: BattlerIndex::Enemy,
            pokemon: SpeciesId::Machamp,
        }));
        assert_eq!(queue.peek(), Some(&Phase::CheckVictory));
        assert!(state.pokemon(BattlerIndex::Enemy).is_none());

        let (_, _, queue) = run_phase(&mut state, Phase::CheckVictory, &mut rng);
        assert_eq!(
            queue.peek(),
            Some(&Phase::BattleEnd {
                outcome: BattleOutcome::PlayerVictory
            })
        );
    }
}
