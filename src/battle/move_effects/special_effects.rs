use super::{EffectContext, EffectResult};
use crate::battle::abilities;
use crate::battle::battler_tags::{BattlerTag, TagData};
use crate::battle::commands::BattleCommand;
use crate::battle::events::{DamageSource, MoveFailureReason};
use crate::battle::phase::Phase;
use crate::battle::state::{BattleRng, BattleState};
use crate::errors::BattleResult;
use schema::{BattlerTagType, MoveCategory, MoveEffect, StatusEffect, WeatherType};

/// Sleep turns set by Rest. The third move attempt wakes the user.
pub const REST_SLEEP_TURNS: u8 = 3;

fn self_tag(ctx: &EffectContext, state: &BattleState, tag_type: BattlerTagType) -> BattleResult<BattleCommand> {
    let source_id = state.active(ctx.user)?.id;
    Ok(BattleCommand::AddBattlerTag {
        target: ctx.user,
        tag: BattlerTag::new(tag_type, Some(ctx.move_data.id), Some(source_id)),
    })
}

pub(super) fn apply_recharge(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    if state.active(ctx.user)?.is_fainted() {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    Ok(EffectResult::Applied(vec![self_tag(ctx, state, BattlerTagType::Recharging)?]))
}

/// Shared by Protect and Endure: each consecutive success cuts the odds to a third.
fn streak_move(
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
    tag_type: BattlerTagType,
) -> BattleResult<EffectResult> {
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let streak = state.active(ctx.user)?.summon_data.protect_streak;
    if streak > 0 {
        let odds = 3u32.pow(streak.min(6) as u32);
        if rng.rand_int(odds, "protect streak") != 0 {
            return Ok(EffectResult::Failed(MoveFailureReason::ProtectFailed));
        }
    }
    Ok(EffectResult::Applied(vec![
        self_tag(ctx, state, tag_type)?,
        BattleCommand::SetProtectStreak {
            target: ctx.user,
            streak: streak.saturating_add(1),
        },
    ]))
}

pub(super) fn apply_protect(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    streak_move(ctx, state, rng, BattlerTagType::Protected)
}

pub(super) fn apply_endure(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    streak_move(ctx, state, rng, BattlerTagType::Enduring)
}

fn heal_user(ctx: &EffectContext, state: &BattleState, numerator: u16, denominator: u16) -> BattleResult<EffectResult> {
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let user = state.active(ctx.user)?;
    if user.is_full_hp() {
        return Ok(EffectResult::Failed(MoveFailureReason::NothingToChange));
    }
    Ok(EffectResult::Applied(vec![BattleCommand::Heal {
        target: ctx.user,
        amount: user.max_hp_fraction(numerator, denominator).max(1),
    }]))
}

pub(super) fn apply_heal(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::Heal(percent) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    heal_user(ctx, state, *percent as u16, 100)
}

/// Synthesis and Moonlight: half in clear skies, two thirds in sun, a quarter
/// in any other weather.
pub(super) fn apply_weather_heal(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let (numerator, denominator) = match state.arena.weather_type() {
        None | Some(WeatherType::StrongWinds) => (1, 2),
        Some(WeatherType::Sunny) | Some(WeatherType::HarshSun) => (2, 3),
        Some(_) => (1, 4),
    };
    heal_user(ctx, state, numerator, denominator)
}

pub(super) fn apply_rest(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let user = state.active(ctx.user)?;
    if user.is_full_hp() || user.has_status(StatusEffect::Sleep) {
        return Ok(EffectResult::Failed(MoveFailureReason::NothingToChange));
    }
    if abilities::blocks_status(state, ctx.data, ctx.user, StatusEffect::Sleep)? {
        return Ok(EffectResult::Failed(MoveFailureReason::Generic));
    }

    let mut commands = Vec::new();
    if user.status.is_some() {
        commands.push(BattleCommand::CureStatus { target: ctx.user });
    }
    commands.push(BattleCommand::SetStatus {
        target: ctx.user,
        status: StatusEffect::Sleep,
        turns: REST_SLEEP_TURNS,
    });
    commands.push(BattleCommand::Heal {
        target: ctx.user,
        amount: user.max_hp(),
    });
    Ok(EffectResult::Applied(commands))
}

/// Roar and Dragon Tail drag a random reserve onto the field. Bosses hold
/// their ground.
pub(super) fn apply_force_switch(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let failed = |reason| {
        if ctx.move_data.category == MoveCategory::Status {
            EffectResult::Failed(reason)
        } else {
            EffectResult::NoEffect(Vec::new())
        }
    };
    let target = state.active(ctx.target)?;
    if ctx.target == ctx.user || target.is_fainted() {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if target.boss_segments > 1 {
        return Ok(failed(MoveFailureReason::Generic));
    }
    let reserves = state.side(ctx.target.side()).reserves();
    if reserves.is_empty() {
        return Ok(failed(MoveFailureReason::NoReserves));
    }
    let pick = rng.rand_int(reserves.len() as u32, "forced switch") as usize;
    Ok(EffectResult::Applied(vec![BattleCommand::PushPhase(Phase::Switch {
        index: ctx.target,
        party_slot: reserves[pick],
    })]))
}

pub(super) fn apply_substitute(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let user = state.active(ctx.user)?;
    if user.has_tag(BattlerTagType::Substitute) {
        return Ok(EffectResult::Failed(MoveFailureReason::AlreadyHasTag));
    }
    let cost = user.max_hp_fraction(1, 4).max(1);
    if user.current_hp() <= cost {
        return Ok(EffectResult::Failed(MoveFailureReason::Generic));
    }
    let tag = BattlerTag::new(BattlerTagType::Substitute, Some(ctx.move_data.id), Some(user.id))
        .with_data(TagData::Substitute { hp: cost });
    Ok(EffectResult::Applied(vec![
        BattleCommand::DealIndirectDamage {
            target: ctx.user,
            amount: cost,
            source: DamageSource::Tag(BattlerTagType::Substitute),
        },
        BattleCommand::AddBattlerTag {
            target: ctx.user,
            tag,
        },
    ]))
}
