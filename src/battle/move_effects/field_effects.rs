use super::{EffectContext, EffectResult};
use crate::battle::arena::DEFAULT_TERRAIN_TURNS;
use crate::battle::arena_tags::default_turns;
use crate::battle::commands::BattleCommand;
use crate::battle::damage::pledge_combo;
use crate::battle::events::MoveFailureReason;
use crate::battle::items;
use crate::battle::state::{BattleRng, BattleState};
use crate::errors::BattleResult;
use schema::{ArenaTagSide, ArenaTagType, EffectSide, MoveEffect, WeatherType};

fn arena_side(ctx: &EffectContext, side: EffectSide) -> ArenaTagSide {
    match side {
        EffectSide::User => ctx.user.side().arena_side(),
        EffectSide::Target => ctx.user.side().opposite().arena_side(),
        EffectSide::Both => ArenaTagSide::Both,
    }
}

fn is_screen(tag: ArenaTagType) -> bool {
    matches!(
        tag,
        ArenaTagType::Reflect | ArenaTagType::LightScreen | ArenaTagType::AuroraVeil
    )
}

pub(super) fn apply_add_arena_tag(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::AddArenaTag { tag, side } = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let side = arena_side(ctx, *side);

    // A second Trick Room undoes the first.
    if *tag == ArenaTagType::TrickRoom && state.arena.has_tag_on_side(*tag, side) {
        return Ok(EffectResult::Applied(vec![BattleCommand::RemoveArenaTag {
            tag_type: *tag,
            side,
        }]));
    }
    if *tag == ArenaTagType::AuroraVeil
        && !matches!(
            state.arena.weather_type(),
            Some(WeatherType::Hail) | Some(WeatherType::Snow)
        )
    {
        return Ok(EffectResult::Failed(MoveFailureReason::WeatherBlocked));
    }
    if tag.max_layers() == 1 && state.arena.has_tag_on_side(*tag, side) {
        return Ok(EffectResult::Failed(MoveFailureReason::NothingToChange));
    }

    let user = state.active(ctx.user)?;
    let turns = if is_screen(*tag) {
        items::screen_turns(user, ctx.data, default_turns(*tag))?
    } else {
        default_turns(*tag)
    };
    Ok(EffectResult::Applied(vec![BattleCommand::AddArenaTag {
        tag_type: *tag,
        side,
        turns,
        source_move: Some(ctx.move_data.id),
        source_id: Some(user.id),
    }]))
}

pub(super) fn apply_remove_arena_tags(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::RemoveArenaTags { tags, side } = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let sides = match arena_side(ctx, *side) {
        ArenaTagSide::Both => vec![ArenaTagSide::Player, ArenaTagSide::Enemy, ArenaTagSide::Both],
        single => vec![single],
    };

    let commands: Vec<BattleCommand> = sides
        .iter()
        .flat_map(|side| tags.iter().map(move |tag| (*tag, *side)))
        .filter(|(tag, side)| state.arena.tags.iter().any(|t| t.tag_type == *tag && t.side == *side))
        .map(|(tag_type, side)| BattleCommand::RemoveArenaTag { tag_type, side })
        .collect();
    Ok(if commands.is_empty() {
        EffectResult::NoEffect(commands)
    } else {
        EffectResult::Applied(commands)
    })
}

pub(super) fn apply_set_weather(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::SetWeather(weather) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    match state.arena.weather_type() {
        Some(current) if current == *weather => {
            return Ok(EffectResult::Failed(MoveFailureReason::NothingToChange));
        }
        Some(current) if current.is_primal() && !weather.is_primal() => {
            return Ok(EffectResult::Failed(MoveFailureReason::WeatherBlocked));
        }
        _ => {}
    }
    let turns = items::weather_turns(state.active(ctx.user)?, ctx.data, *weather)?;
    Ok(EffectResult::Applied(vec![BattleCommand::SetWeather {
        weather: Some(*weather),
        turns,
    }]))
}

pub(super) fn apply_set_terrain(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::SetTerrain(terrain) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    if state.arena.terrain_type() == Some(*terrain) {
        return Ok(EffectResult::Failed(MoveFailureReason::TerrainBlocked));
    }
    Ok(EffectResult::Applied(vec![BattleCommand::SetTerrain {
        terrain: Some(*terrain),
        turns: DEFAULT_TERRAIN_TURNS,
    }]))
}

/// A pledge following an ally's different pledge this turn leaves a combined
/// field effect behind.
pub(super) fn apply_pledge(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let Some(combo) = pledge_combo(state, ctx.user, ctx.move_data.id) else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    let side = match combo {
        ArenaTagType::WaterFirePledge => ctx.user.side(),
        _ => ctx.user.side().opposite(),
    };
    Ok(EffectResult::Applied(vec![BattleCommand::AddArenaTag {
        tag_type: combo,
        side: side.arena_side(),
        turns: default_turns(combo),
        source_move: Some(ctx.move_data.id),
        source_id: Some(state.active(ctx.user)?.id),
    }]))
}
