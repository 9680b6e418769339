use super::{EffectContext, EffectResult};
use crate::battle::abilities;
use crate::battle::battler_tags::{can_add_tag, BattlerTag, TagData};
use crate::battle::commands::BattleCommand;
use crate::battle::events::MoveFailureReason;
use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use crate::battle::stats::is_grounded;
use crate::errors::BattleResult;
use schema::{
    ArenaTagType, BattlerTagType, EffectTarget, MoveCategory, MoveEffect, MoveFlag, PokemonType,
    StatusEffect, TerrainType,
};

fn is_status_move(ctx: &EffectContext) -> bool {
    ctx.move_data.category == MoveCategory::Status
}

/// Whether `status` can be inflicted on `target` by this move right now.
fn can_inflict_status(
    ctx: &EffectContext,
    state: &BattleState,
    target: BattlerIndex,
    status: StatusEffect,
) -> BattleResult<bool> {
    let pokemon = state.active(target)?;
    if !pokemon.can_set_status(status) {
        return Ok(false);
    }
    if ctx.move_data.has_flag(MoveFlag::Powder) && pokemon.has_type(PokemonType::Grass) {
        return Ok(false);
    }
    if ctx.from_foe(target)
        && state
            .arena
            .has_tag_on_side(ArenaTagType::Safeguard, target.side().arena_side())
    {
        return Ok(false);
    }
    let terrain_blocks = match state.arena.terrain_type() {
        Some(TerrainType::Misty) => true,
        Some(TerrainType::Electric) => status == StatusEffect::Sleep,
        _ => false,
    };
    if terrain_blocks && is_grounded(state, ctx.data, target)? {
        return Ok(false);
    }
    Ok(!abilities::blocks_status(state, ctx.data, target, status)?)
}

pub(super) fn apply_status(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::Status {
        target,
        status,
        chance,
    } = effect
    else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if *target == EffectTarget::User && !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let index = ctx.effect_target(*target);
    let pokemon = state.active(index)?;
    if pokemon.is_fainted() {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !can_inflict_status(ctx, state, index, *status)? {
        if is_status_move(ctx) && pokemon.status.is_some() {
            return Ok(EffectResult::Failed(MoveFailureReason::AlreadyHasStatus));
        }
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !rng.chance(ctx.secondary_chance(state, *chance), "status chance") {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }

    let turns = match status {
        StatusEffect::Sleep => rng.rand_range(2, 4, "sleep turns") as u8,
        _ => 0,
    };
    Ok(EffectResult::Applied(vec![BattleCommand::SetStatus {
        target: index,
        status: *status,
        turns,
    }]))
}

/// Flinching only matters to a target that has not moved yet this turn.
pub(super) fn apply_flinch(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::Flinch(chance) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    let pokemon = state.active(ctx.target)?;
    if ctx.target == ctx.user
        || pokemon.is_fainted()
        || pokemon.turn_data.acted
        || pokemon.has_tag(BattlerTagType::Flinched)
    {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !rng.chance(ctx.secondary_chance(state, *chance), "flinch chance") {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let source_id = state.active(ctx.user)?.id;
    Ok(EffectResult::Applied(vec![BattleCommand::AddBattlerTag {
        target: ctx.target,
        tag: BattlerTag::new(BattlerTagType::Flinched, Some(ctx.move_data.id), Some(source_id)),
    }]))
}

pub(super) fn apply_confuse(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::Confuse(chance) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    let pokemon = state.active(ctx.target)?;
    if pokemon.is_fainted() {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !can_add_tag(state, ctx.data, ctx.target, BattlerTagType::Confused, ctx.from_foe(ctx.target))? {
        if is_status_move(ctx) && pokemon.has_tag(BattlerTagType::Confused) {
            return Ok(EffectResult::Failed(MoveFailureReason::AlreadyHasTag));
        }
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !rng.chance(ctx.secondary_chance(state, *chance), "confusion chance") {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    // One extra turn: the lapse that ends confusion happens before a move.
    let turns = rng.rand_range(2, 5, "confusion turns") as u8 + 1;
    let source_id = state.active(ctx.user)?.id;
    Ok(EffectResult::Applied(vec![BattleCommand::AddBattlerTag {
        target: ctx.target,
        tag: BattlerTag::new(BattlerTagType::Confused, Some(ctx.move_data.id), Some(source_id)).with_turns(turns),
    }]))
}

pub(super) fn apply_add_tag(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::AddTag { target, tag, chance } = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if *target == EffectTarget::User && !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let index = ctx.effect_target(*target);
    let pokemon = state.active(index)?;
    if pokemon.is_fainted() {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !can_add_tag(state, ctx.data, index, *tag, ctx.from_foe(index))? {
        if is_status_move(ctx) && (pokemon.has_tag(*tag) || ctx.move_data.target.is_field() || index == ctx.target) {
            return Ok(EffectResult::Failed(MoveFailureReason::AlreadyHasTag));
        }
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if !rng.chance(ctx.secondary_chance(state, *chance), "tag chance") {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }

    let source_id = state.active(ctx.user)?.id;
    let mut new_tag = BattlerTag::new(*tag, Some(ctx.move_data.id), Some(source_id));
    match tag {
        BattlerTagType::Seeded => new_tag = new_tag.with_data(TagData::Seeded { source: ctx.user }),
        BattlerTagType::Trapped => new_tag = new_tag.with_turns(rng.rand_range(4, 5, "bind turns") as u8 + 1),
        _ => {}
    }
    Ok(EffectResult::Applied(vec![BattleCommand::AddBattlerTag {
        target: index,
        tag: new_tag,
    }]))
}
