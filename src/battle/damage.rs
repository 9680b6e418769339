use crate::battle::abilities::{self, condition_met, HitContext};
use crate::battle::arena_tags::{screen_multiplier, sport_multiplier};
use crate::battle::items;
use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use crate::battle::stats::{effective_stat, is_grounded};
use crate::battle::weather;
use crate::data::GameData;
use crate::errors::BattleResult;
use schema::{
    AbilityEffect, AbilityEffectKind, ArenaTagType, BattleStat, BattlerTagType, MoveCategory,
    MoveData, MoveEffect, MoveEffectKind, MoveId, MoveResult, PokemonType, Stat, StatusEffect,
};
use serde::Serialize;

/// The move and hit a damage number is being worked out for.
#[derive(Debug, Clone, Copy)]
pub struct DamageContext<'a> {
    pub user: BattlerIndex,
    pub target: BattlerIndex,
    pub move_data: &'a MoveData,
    pub is_crit: bool,
    /// Zero-based strike number within one use of the move.
    pub hit: u8,
    /// How many battlers the move is landing on this turn.
    pub target_count: usize,
}

/// Every factor that went into a damage number. Multipliers are 1.0 when a
/// stage did not apply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageBreakdown {
    pub move_type: PokemonType,
    pub power: u16,
    pub attack: u32,
    pub defense: u32,
    /// Damage before any multiplier.
    pub base: u32,
    pub spread: f64,
    pub weather: f64,
    pub terrain: f64,
    pub critical: f64,
    pub random: f64,
    pub stab: f64,
    pub effectiveness: f64,
    pub burn: f64,
    pub screen: f64,
    pub ability: f64,
    pub item: f64,
    pub second_strike: f64,
    /// Sports, Flash Fire, and double damage on semi-invulnerable targets.
    pub other: f64,
    pub damage: u16,
}

impl DamageBreakdown {
    fn immune(move_type: PokemonType, power: u16) -> Self {
        Self {
            move_type,
            power,
            attack: 0,
            defense: 0,
            base: 0,
            spread: 1.0,
            weather: 1.0,
            terrain: 1.0,
            critical: 1.0,
            random: 1.0,
            stab: 1.0,
            effectiveness: 0.0,
            burn: 1.0,
            screen: 1.0,
            ability: 1.0,
            item: 1.0,
            second_strike: 1.0,
            other: 1.0,
            damage: 0,
        }
    }

    pub fn total_multiplier(&self) -> f64 {
        self.spread
            * self.weather
            * self.terrain
            * self.critical
            * self.random
            * self.stab
            * self.effectiveness
            * self.burn
            * self.screen
            * self.ability
            * self.item
            * self.second_strike
            * self.other
    }
}

// --- Type and power ---

/// The type the move hits as, after Weather Ball and Terrain Pulse.
pub fn resolve_move_type(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    move_data: &MoveData,
) -> BattleResult<PokemonType> {
    if move_data.has_effect(MoveEffectKind::WeatherPower) {
        if let Some(move_type) = weather::weather_ball_type(state) {
            return Ok(move_type);
        }
    }
    if move_data.has_effect(MoveEffectKind::TerrainPower) && is_grounded(state, data, user)? {
        if let Some(move_type) = weather::terrain_pulse_type(state) {
            return Ok(move_type);
        }
    }
    Ok(move_data.move_type)
}

fn is_pledge(move_id: MoveId) -> bool {
    matches!(move_id, MoveId::FirePledge | MoveId::WaterPledge | MoveId::GrassPledge)
}

/// The field effect produced when this pledge follows a different pledge
/// used successfully by the ally earlier in the same turn.
pub fn pledge_combo(state: &BattleState, user: BattlerIndex, move_id: MoveId) -> Option<ArenaTagType> {
    if !is_pledge(move_id) {
        return None;
    }
    let ally = state.ally_of(user)?;
    let previous = state.pokemon(ally)?.last_move()?;
    if previous.turn != state.turn || previous.result != MoveResult::Success || previous.move_id == move_id {
        return None;
    }
    match (previous.move_id, move_id) {
        (MoveId::FirePledge, MoveId::GrassPledge) | (MoveId::GrassPledge, MoveId::FirePledge) => {
            Some(ArenaTagType::FireGrassPledge)
        }
        (MoveId::WaterPledge, MoveId::FirePledge) | (MoveId::FirePledge, MoveId::WaterPledge) => {
            Some(ArenaTagType::WaterFirePledge)
        }
        (MoveId::GrassPledge, MoveId::WaterPledge) | (MoveId::WaterPledge, MoveId::GrassPledge) => {
            Some(ArenaTagType::GrassWaterPledge)
        }
        _ => None,
    }
}

/// Base power after field-dependent doubling.
pub fn base_power(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    move_data: &MoveData,
) -> BattleResult<u16> {
    let mut power = move_data.power.unwrap_or(0);
    if move_data.has_effect(MoveEffectKind::WeatherPower) && weather::weather_ball_type(state).is_some() {
        power *= 2;
    }
    if move_data.has_effect(MoveEffectKind::TerrainPower)
        && state.arena.terrain_type().is_some()
        && is_grounded(state, data, user)?
    {
        power *= 2;
    }
    if move_data.has_effect(MoveEffectKind::Pledge) && pledge_combo(state, user, move_data.id).is_some() {
        power = 150;
    }
    Ok(power)
}

fn ground_immune(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
) -> BattleResult<bool> {
    let defender = state.active(target)?;
    if state.arena.has_tag(ArenaTagType::Gravity) || defender.has_tag(BattlerTagType::IgnoreFlying) {
        return Ok(false);
    }
    Ok(defender.has_tag(BattlerTagType::Flying)
        || abilities::has_effect(state, data, target, AbilityEffectKind::Levitate, Some(user))?)
}

/// Type effectiveness of the move on the target, including Freeze-Dry,
/// Scrappy, grounding and Levitate.
pub fn type_effectiveness(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
    move_data: &MoveData,
    move_type: PokemonType,
) -> BattleResult<f64> {
    if move_type == PokemonType::Unknown {
        return Ok(1.0);
    }
    let defender = state.active(target)?;
    let grounded_by_force = state.arena.has_tag(ArenaTagType::Gravity)
        || defender.has_tag(BattlerTagType::IgnoreFlying);
    let super_effective_vs = match move_data.effect(MoveEffectKind::SuperEffectiveVs) {
        Some(MoveEffect::SuperEffectiveVs(against)) => Some(*against),
        _ => None,
    };
    let pierced: Vec<PokemonType> = abilities::effects(state, data, user, AbilityEffectKind::IgnoreTypeImmunity, None)?
        .into_iter()
        .filter_map(|(_, effect)| match effect {
            AbilityEffect::IgnoreTypeImmunity {
                move_types,
                defender_type,
            } if move_types.contains(&move_type) => Some(*defender_type),
            _ => None,
        })
        .collect();

    let mut multiplier = 1.0;
    for defending in defender.types() {
        let mut single = PokemonType::type_effectiveness(move_type, *defending);
        if super_effective_vs == Some(*defending) {
            single = 2.0;
        }
        if single == 0.0 && pierced.contains(defending) {
            single = 1.0;
        }
        if single == 0.0
            && move_type == PokemonType::Ground
            && *defending == PokemonType::Flying
            && grounded_by_force
        {
            single = 1.0;
        }
        multiplier *= single;
    }

    if move_type == PokemonType::Ground && multiplier > 0.0 && ground_immune(state, data, user, target)? {
        return Ok(0.0);
    }
    Ok(multiplier)
}

// --- Stages of the formula ---

/// floor(floor(floor(2L/5 + 2) * P * A / D) / 50) + 2
pub fn base_damage(level: u8, power: u16, attack: u32, defense: u32) -> u32 {
    let level_factor = 2 * level as u32 / 5 + 2;
    level_factor * power as u32 * attack / defense.max(1) / 50 + 2
}

/// Attack and defense used for the hit. Critical hits drop the attacker's
/// negative stages and the defender's positive ones.
pub fn attack_and_defense(state: &BattleState, data: &GameData, ctx: &DamageContext) -> BattleResult<(u32, u32)> {
    let (attack_stat, attack_stage_stat, defense_stat, defense_stage_stat) = match ctx.move_data.category {
        MoveCategory::Physical => (Stat::Attack, BattleStat::Attack, Stat::Defense, BattleStat::Defense),
        _ => (Stat::SpAttack, BattleStat::SpAttack, Stat::SpDefense, BattleStat::SpDefense),
    };
    let mut attack_stage = state.active(ctx.user)?.stat_stage(attack_stage_stat);
    let mut defense_stage = state.active(ctx.target)?.stat_stage(defense_stage_stat);
    if ctx.move_data.has_effect(MoveEffectKind::IgnoreStatStages) {
        defense_stage = 0;
    }
    if ctx.is_crit {
        attack_stage = attack_stage.max(0);
        defense_stage = defense_stage.min(0);
    }
    Ok((
        effective_stat(state, data, ctx.user, attack_stat, attack_stage)?,
        effective_stat(state, data, ctx.target, defense_stat, defense_stage)?,
    ))
}

/// Random factor in 85..=100, as a fraction.
pub fn damage_roll(state: &BattleState, rng: &mut BattleRng) -> f64 {
    let roll = match state.overrides.damage_roll {
        Some(fixed) => fixed.clamp(85, 100) as u32,
        None => 85 + rng.rand_int(16, "damage roll"),
    };
    roll as f64 / 100.0
}

pub fn critical_multiplier(state: &BattleState, data: &GameData, user: BattlerIndex, is_crit: bool) -> BattleResult<f64> {
    if !is_crit {
        return Ok(1.0);
    }
    let mut multiplier = 1.5;
    for (_, effect) in abilities::effects(state, data, user, AbilityEffectKind::CritMultiplier, None)? {
        if let AbilityEffect::CritMultiplier(percent) = effect {
            multiplier *= *percent as f64 / 100.0;
        }
    }
    Ok(multiplier)
}

pub fn stab_multiplier(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    move_type: PokemonType,
) -> BattleResult<f64> {
    if move_type == PokemonType::Unknown || !state.active(user)?.has_type(move_type) {
        return Ok(1.0);
    }
    let boosted = abilities::effects(state, data, user, AbilityEffectKind::StabBoost, None)?
        .into_iter()
        .find_map(|(_, effect)| match effect {
            AbilityEffect::StabBoost(percent) => Some(*percent as f64 / 100.0),
            _ => None,
        });
    Ok(boosted.unwrap_or(1.5))
}

/// Burned attackers deal half physical damage unless their ability bypasses it.
pub fn burn_multiplier(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    category: MoveCategory,
) -> BattleResult<f64> {
    if category != MoveCategory::Physical || !state.active(user)?.has_status(StatusEffect::Burn) {
        return Ok(1.0);
    }
    if abilities::has_effect(state, data, user, AbilityEffectKind::BypassBurnReduction, None)? {
        return Ok(1.0);
    }
    Ok(0.5)
}

/// Final multipliers from the defender's and attacker's abilities.
pub fn ability_multiplier(
    state: &BattleState,
    data: &GameData,
    ctx: &DamageContext,
    move_type: PokemonType,
    effectiveness: f64,
) -> BattleResult<f64> {
    let hit = HitContext {
        category: ctx.move_data.category,
        effectiveness,
    };
    let mut multiplier = 1.0;
    for (_, effect) in abilities::effects(
        state,
        data,
        ctx.target,
        AbilityEffectKind::ReceivedDamageMultiplier,
        Some(ctx.user),
    )? {
        if let AbilityEffect::ReceivedDamageMultiplier { percent, condition } = effect {
            if condition_met(state, ctx.target, condition, Some(&hit))? {
                multiplier *= *percent as f64 / 100.0;
            }
        }
    }
    for (_, effect) in abilities::effects(
        state,
        data,
        ctx.target,
        AbilityEffectKind::ReceivedTypeMultiplier,
        Some(ctx.user),
    )? {
        if let AbilityEffect::ReceivedTypeMultiplier { types, percent } = effect {
            if types.contains(&move_type) {
                multiplier *= *percent as f64 / 100.0;
            }
        }
    }
    for (_, effect) in abilities::effects(state, data, ctx.user, AbilityEffectKind::DealtDamageMultiplier, None)? {
        if let AbilityEffect::DealtDamageMultiplier { percent, condition } = effect {
            if condition_met(state, ctx.user, condition, Some(&hit))? {
                multiplier *= *percent as f64 / 100.0;
            }
        }
    }
    Ok(multiplier)
}

/// Parental Bond's weaker second strike.
fn second_strike_multiplier(state: &BattleState, data: &GameData, ctx: &DamageContext) -> BattleResult<f64> {
    if ctx.hit == 0 || ctx.move_data.has_effect(MoveEffectKind::MultiHit) {
        return Ok(1.0);
    }
    let percent = abilities::effects(state, data, ctx.user, AbilityEffectKind::SecondStrike, None)?
        .into_iter()
        .find_map(|(_, effect)| match effect {
            AbilityEffect::SecondStrike(percent) => Some(*percent),
            _ => None,
        });
    Ok(percent.map(|percent| percent as f64 / 100.0).unwrap_or(1.0))
}

fn other_multiplier(state: &BattleState, ctx: &DamageContext, move_type: PokemonType) -> BattleResult<f64> {
    let mut multiplier = sport_multiplier(state, move_type);
    if move_type == PokemonType::Fire && state.active(ctx.user)?.has_tag(BattlerTagType::FireBoost) {
        multiplier *= 1.5;
    }
    let defender = state.active(ctx.target)?;
    for effect in &ctx.move_data.effects {
        if let MoveEffect::HitsSemiInvulnerable {
            tag,
            double_damage: true,
        } = effect
        {
            if defender.has_tag(*tag) {
                multiplier *= 2.0;
            }
        }
    }
    Ok(multiplier)
}

// --- Entry points ---

/// Damage from moves that skip the formula, or `None` for regular moves.
pub fn fixed_damage(state: &BattleState, ctx: &DamageContext) -> BattleResult<Option<u16>> {
    let attacker = state.active(ctx.user)?;
    let defender = state.active(ctx.target)?;
    let damage = ctx.move_data.effects.iter().find_map(|effect| match effect {
        MoveEffect::FixedDamage(amount) => Some(*amount),
        MoveEffect::LevelDamage => Some(attacker.level as u16),
        MoveEffect::HalveHp => Some((defender.current_hp() / 2).max(1)),
        MoveEffect::OneHitKo => Some(defender.current_hp()),
        _ => None,
    });
    Ok(damage)
}

/// Run the full damage formula for one strike on one target.
///
/// Consumes the damage roll; the crit roll has already been made by the caller.
pub fn calculate_damage(
    state: &BattleState,
    data: &GameData,
    ctx: &DamageContext,
    rng: &mut BattleRng,
) -> BattleResult<DamageBreakdown> {
    let move_type = resolve_move_type(state, data, ctx.user, ctx.move_data)?;
    let power = base_power(state, data, ctx.user, ctx.move_data)?;
    let effectiveness = type_effectiveness(state, data, ctx.user, ctx.target, ctx.move_data, move_type)?;
    if effectiveness == 0.0 || power == 0 {
        return Ok(DamageBreakdown::immune(move_type, power));
    }

    let (attack, defense) = attack_and_defense(state, data, ctx)?;
    let level = state.active(ctx.user)?.level;
    let base = base_damage(level, power, attack, defense);

    let mut breakdown = DamageBreakdown {
        move_type,
        power,
        attack,
        defense,
        base,
        spread: if ctx.target_count > 1 { 0.75 } else { 1.0 },
        weather: weather::weather_multiplier(state, move_type),
        terrain: weather::terrain_multiplier(state, data, ctx.user, ctx.target, move_type)?,
        critical: critical_multiplier(state, data, ctx.user, ctx.is_crit)?,
        random: damage_roll(state, rng),
        stab: stab_multiplier(state, data, ctx.user, move_type)?,
        effectiveness,
        burn: burn_multiplier(state, data, ctx.user, ctx.move_data.category)?,
        screen: screen_multiplier(state, data, ctx.user, ctx.target, ctx.move_data.category, ctx.is_crit)?,
        ability: ability_multiplier(state, data, ctx, move_type, effectiveness)?,
        item: items::damage_boost(state.active(ctx.user)?, data)?
            .map(|(_, multiplier, _)| multiplier)
            .unwrap_or(1.0),
        second_strike: second_strike_multiplier(state, data, ctx)?,
        other: other_multiplier(state, ctx, move_type)?,
        damage: 0,
    };

    let damage = (base as f64 * breakdown.total_multiplier()).floor();
    breakdown.damage = (damage as u16).max(1);
    log::trace!(
        "{:?} -> {:?}: {} damage ({:?} x{:.3})",
        ctx.user,
        ctx.target,
        breakdown.damage,
        ctx.move_data.id,
        breakdown.total_multiplier()
    );
    Ok(breakdown)
}

/// Self-inflicted confusion hit: typeless 40 power physical, no crit or roll.
pub fn confusion_damage(state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<u16> {
    let pokemon = state.active(index)?;
    let attack = effective_stat(state, data, index, Stat::Attack, pokemon.stat_stage(BattleStat::Attack))?;
    let defense = effective_stat(state, data, index, Stat::Defense, pokemon.stat_stage(BattleStat::Defense))?;
    let damage = base_damage(pokemon.level, 40, attack, defense);
    Ok((damage as u16).min(pokemon.current_hp()).max(1))
}
