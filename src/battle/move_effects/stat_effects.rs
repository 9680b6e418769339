use super::{EffectContext, EffectResult};
use crate::battle::commands::BattleCommand;
use crate::battle::state::{BattleRng, BattleState};
use crate::battle::stats::stat_change_commands;
use crate::errors::BattleResult;
use schema::{EffectTarget, MoveEffect};

/// Raise or lower a stat stage on the user or the target.
///
/// Self-directed changes happen once per move. Stage changes on a foe pass
/// through Mist, Clear Body and Mirror Armor.
pub(super) fn apply_stat_change(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::StatChange {
        target,
        stat,
        delta,
        chance,
    } = effect
    else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if *target == EffectTarget::User && !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let index = ctx.effect_target(*target);
    if !state.pokemon(index).is_some_and(|pokemon| !pokemon.is_fainted()) {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !rng.chance(ctx.secondary_chance(state, *chance), "stat change chance") {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }

    let commands = stat_change_commands(state, ctx.data, Some(ctx.user), index, *stat, *delta)?;
    let changed = commands
        .iter()
        .any(|command| matches!(command, BattleCommand::ChangeStatStage { .. }));
    Ok(if changed {
        EffectResult::Applied(commands)
    } else {
        EffectResult::NoEffect(commands)
    })
}
