use super::{apply_confuse, apply_flinch, apply_stat_change, apply_status, EffectContext, EffectResult};
use crate::battle::abilities;
use crate::battle::battler_tags::BattlerTag;
use crate::battle::commands::BattleCommand;
use crate::battle::events::{BattleEvent, DamageSource};
use crate::battle::items;
use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use crate::data::GameData;
use crate::errors::BattleResult;
use schema::{
    AbilityEffectKind, ArenaTagType, BattleStat, BattlerTagType, BiomeId, EffectTarget, MoveData,
    MoveEffect, MoveEffectKind, MoveFlag, StatusEffect, TerrainType,
};

/// Commands that land one strike's damage, after survival effects.
#[derive(Debug, Clone, PartialEq)]
pub struct HitDamage {
    pub commands: Vec<BattleCommand>,
    /// HP taken from the target itself.
    pub dealt: u16,
    pub substitute_hit: bool,
}

/// Turn a damage number into commands: a substitute soaks it, otherwise
/// Sturdy, Endure and Focus Band may leave the target at 1 HP.
pub fn hit_damage_commands(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
    amount: u16,
    rng: &mut BattleRng,
) -> BattleResult<HitDamage> {
    let defender = state.active(target)?;
    let mut commands = Vec::new();

    let bypasses_substitute = move_data.has_flag(MoveFlag::IgnoreSubstitute)
        || move_data.has_flag(MoveFlag::Sound)
        || abilities::has_effect(state, data, user, AbilityEffectKind::IgnoreScreens, None)?;
    if defender.has_tag(BattlerTagType::Substitute) && !bypasses_substitute && user != target {
        commands.push(BattleCommand::DamageSubstitute { target, amount });
        return Ok(HitDamage {
            commands,
            dealt: 0,
            substitute_hit: true,
        });
    }

    let hp = defender.current_hp();
    let mut amount = amount.min(hp);
    if amount == hp && hp > 0 {
        let sturdy = if defender.is_full_hp() {
            abilities::effects(state, data, target, AbilityEffectKind::Sturdy, Some(user))?
                .first()
                .map(|(ability, _)| *ability)
        } else {
            None
        };
        if let Some(ability) = sturdy {
            amount = hp - 1;
            commands.push(BattleCommand::EmitEvent(BattleEvent::AbilityActivated {
                battler: target,
                ability,
            }));
            commands.push(BattleCommand::EmitEvent(BattleEvent::Endured { target }));
        } else if defender.has_tag(BattlerTagType::Enduring) {
            amount = hp - 1;
            commands.push(BattleCommand::EmitEvent(BattleEvent::Endured { target }));
        } else if let Some((item, chance)) = items::survive_chance(defender, data)? {
            if rng.chance(chance, "focus band") {
                amount = hp - 1;
                commands.push(BattleCommand::EmitEvent(BattleEvent::ItemActivated { battler: target, item }));
                commands.push(BattleCommand::EmitEvent(BattleEvent::Endured { target }));
            }
        }
    }

    commands.push(BattleCommand::DealDamage { target, amount });
    Ok(HitDamage {
        commands,
        dealt: amount,
        substitute_hit: false,
    })
}

/// King's Rock flinch on moves that have no flinch of their own.
pub fn kings_rock_commands(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
    rng: &mut BattleRng,
) -> BattleResult<Vec<BattleCommand>> {
    if move_data.has_effect(MoveEffectKind::Flinch) || user == target {
        return Ok(Vec::new());
    }
    let chance = items::flinch_chance(state.active(user)?, data)?;
    let defender = state.active(target)?;
    if chance == 0 || defender.is_fainted() || defender.turn_data.acted || defender.has_tag(BattlerTagType::Flinched) {
        return Ok(Vec::new());
    }
    if !rng.chance(chance, "king's rock") {
        return Ok(Vec::new());
    }
    Ok(vec![BattleCommand::AddBattlerTag {
        target,
        tag: BattlerTag::new(BattlerTagType::Flinched, Some(move_data.id), Some(state.active(user)?.id)),
    }])
}

pub(super) fn apply_recoil(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::Recoil(percent) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    if ctx.damage_dealt == 0 || abilities::blocks_indirect_damage(state, ctx.data, ctx.user)? {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let amount = ((ctx.damage_dealt as u32 * *percent as u32 / 100) as u16).max(1);
    Ok(EffectResult::Applied(vec![BattleCommand::DealIndirectDamage {
        target: ctx.user,
        amount,
        source: DamageSource::Recoil,
    }]))
}

/// Struggle costs a quarter of max HP once per use, hit or not.
pub(super) fn apply_struggle_recoil(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    if !ctx.first_target {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let user = state.active(ctx.user)?;
    Ok(EffectResult::Applied(vec![BattleCommand::DealIndirectDamage {
        target: ctx.user,
        amount: user.max_hp_fraction(1, 4),
        source: DamageSource::Recoil,
    }]))
}

pub(super) fn apply_drain(
    effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let MoveEffect::Drain(percent) = effect else {
        return Ok(EffectResult::NoEffect(Vec::new()));
    };
    let user = state.active(ctx.user)?;
    if ctx.damage_dealt == 0 || user.is_fainted() || user.is_full_hp() {
        return Ok(EffectResult::NoEffect(Vec::new()));
    }
    let amount = ((ctx.damage_dealt as u32 * *percent as u32 / 100) as u16).max(1);
    Ok(EffectResult::Applied(vec![BattleCommand::Heal {
        target: ctx.user,
        amount,
    }]))
}

/// Brick Break shatters the target side's screens before it strikes.
pub(super) fn apply_break_screens(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    _rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let side = ctx.target.side().arena_side();
    let commands: Vec<BattleCommand> = [ArenaTagType::Reflect, ArenaTagType::LightScreen, ArenaTagType::AuroraVeil]
        .into_iter()
        .filter(|tag| state.arena.tags.iter().any(|present| present.tag_type == *tag && present.side == side))
        .map(|tag_type| BattleCommand::RemoveArenaTag { tag_type, side })
        .collect();
    if commands.is_empty() {
        return Ok(EffectResult::NoEffect(commands));
    }
    Ok(EffectResult::Applied(commands))
}

const SECRET_POWER_CHANCE: u8 = 30;

/// Secret Power's secondary: picked by terrain, else by biome.
pub(super) fn apply_biome_secondary(
    _effect: &MoveEffect,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectResult> {
    let status = |status| MoveEffect::Status {
        target: EffectTarget::Target,
        status,
        chance: SECRET_POWER_CHANCE,
    };
    let drop = |stat| MoveEffect::StatChange {
        target: EffectTarget::Target,
        stat,
        delta: -1,
        chance: SECRET_POWER_CHANCE,
    };
    let secondary = match state.arena.terrain_type() {
        Some(TerrainType::Electric) => status(StatusEffect::Paralysis),
        Some(TerrainType::Grassy) => status(StatusEffect::Sleep),
        Some(TerrainType::Misty) => drop(BattleStat::SpAttack),
        Some(TerrainType::Psychic) => drop(BattleStat::Speed),
        None => match state.arena.biome {
            BiomeId::Grass | BiomeId::Forest => status(StatusEffect::Sleep),
            BiomeId::Sea | BiomeId::Beach | BiomeId::Lake => drop(BattleStat::Attack),
            BiomeId::Mountain | BiomeId::Cave => MoveEffect::Flinch(SECRET_POWER_CHANCE),
            BiomeId::Desert => drop(BattleStat::Accuracy),
            BiomeId::Ice => status(StatusEffect::Freeze),
            BiomeId::Volcano => status(StatusEffect::Burn),
            BiomeId::Graveyard => MoveEffect::Confuse(SECRET_POWER_CHANCE),
            BiomeId::Space => drop(BattleStat::Defense),
            BiomeId::Town | BiomeId::Plains => status(StatusEffect::Paralysis),
        },
    };
    match &secondary {
        MoveEffect::Status { .. } => apply_status(&secondary, ctx, state, rng),
        MoveEffect::StatChange { .. } => apply_stat_change(&secondary, ctx, state, rng),
        MoveEffect::Flinch(_) => apply_flinch(&secondary, ctx, state, rng),
        _ => apply_confuse(&secondary, ctx, state, rng),
    }
}
