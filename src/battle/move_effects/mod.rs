mod damage_effects;
mod field_effects;
mod special_effects;
mod stat_effects;
mod status_effects;

use crate::battle::abilities;
use crate::battle::arena_tags::secondary_chance_multiplier;
use crate::battle::commands::BattleCommand;
use crate::battle::events::MoveFailureReason;
use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use crate::data::GameData;
use crate::errors::BattleResult;
use schema::{AbilityEffectKind, BattlerTagType, EffectTarget, MoveData, MoveEffect, MoveEffectKind, MoveFlag};

pub use self::damage_effects::{hit_damage_commands, kings_rock_commands, HitDamage};
use self::{damage_effects::*, field_effects::*, special_effects::*, stat_effects::*, status_effects::*};

/// One target of one strike of a move.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext<'a> {
    pub data: &'a GameData,
    pub user: BattlerIndex,
    pub target: BattlerIndex,
    pub move_data: &'a MoveData,
    /// Damage this strike dealt to `target`.
    pub damage_dealt: u16,
    /// User-directed effects apply once per move, on the first target.
    pub first_target: bool,
}

impl EffectContext<'_> {
    pub fn effect_target(&self, target: EffectTarget) -> BattlerIndex {
        match target {
            EffectTarget::User => self.user,
            EffectTarget::Target => self.target,
        }
    }

    fn from_foe(&self, index: BattlerIndex) -> bool {
        index.side() != self.user.side()
    }

    /// Percent chance of a secondary effect, doubled under the rainbow.
    fn secondary_chance(&self, state: &BattleState, chance: u8) -> u8 {
        let scaled = chance as u16 * secondary_chance_multiplier(state, self.user.side()) as u16;
        scaled.min(100) as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectResult {
    /// The effect took hold.
    Applied(Vec<BattleCommand>),
    /// Nothing changed: the chance missed, or the target was immune or already
    /// affected. The commands carry any "blocked" events.
    NoEffect(Vec<BattleCommand>),
    /// The move fails outright.
    Failed(MoveFailureReason),
}

/// When in a move's resolution an effect is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTiming {
    /// Once, before the first strike.
    BeforeHits,
    /// After every strike on every target.
    PerHit,
    /// Once, after the last strike, if something was hit.
    AfterMove,
    /// Read by the damage calculation or the move phase itself.
    Passive,
}

pub type EffectHandler =
    fn(&MoveEffect, &EffectContext, &BattleState, &mut BattleRng) -> BattleResult<EffectResult>;

pub fn timing(kind: MoveEffectKind) -> EffectTiming {
    match kind {
        MoveEffectKind::BreaksScreens => EffectTiming::BeforeHits,
        MoveEffectKind::Recharge => EffectTiming::AfterMove,
        kind if handler(kind).is_some() => EffectTiming::PerHit,
        _ => EffectTiming::Passive,
    }
}

/// The handler registered for an effect kind.
pub fn handler(kind: MoveEffectKind) -> Option<EffectHandler> {
    let handler: EffectHandler = match kind {
        MoveEffectKind::Recoil => apply_recoil,
        MoveEffectKind::StruggleRecoil => apply_struggle_recoil,
        MoveEffectKind::Drain => apply_drain,
        MoveEffectKind::BreaksScreens => apply_break_screens,
        MoveEffectKind::BiomeSecondary => apply_biome_secondary,

        MoveEffectKind::StatChange => apply_stat_change,

        MoveEffectKind::Status => apply_status,
        MoveEffectKind::Flinch => apply_flinch,
        MoveEffectKind::Confuse => apply_confuse,
        MoveEffectKind::AddTag => apply_add_tag,

        MoveEffectKind::AddArenaTag => apply_add_arena_tag,
        MoveEffectKind::RemoveArenaTags => apply_remove_arena_tags,
        MoveEffectKind::SetWeather => apply_set_weather,
        MoveEffectKind::SetTerrain => apply_set_terrain,
        MoveEffectKind::Pledge => apply_pledge,

        MoveEffectKind::Recharge => apply_recharge,
        MoveEffectKind::Protect => apply_protect,
        MoveEffectKind::Endure => apply_endure,
        MoveEffectKind::Heal => apply_heal,
        MoveEffectKind::WeatherHeal => apply_weather_heal,
        MoveEffectKind::Rest => apply_rest,
        MoveEffectKind::ForceSwitch => apply_force_switch,
        MoveEffectKind::Substitute => apply_substitute,
        _ => return None,
    };
    Some(handler)
}

/// Whether a substitute soaks up this effect.
fn blocked_by_substitute(effect: &MoveEffect, ctx: &EffectContext, state: &BattleState) -> BattleResult<bool> {
    let aimed_at_target = match effect {
        MoveEffect::Status { target, .. }
        | MoveEffect::StatChange { target, .. }
        | MoveEffect::AddTag { target, .. } => *target == EffectTarget::Target,
        MoveEffect::Flinch(_) | MoveEffect::Confuse(_) | MoveEffect::BiomeSecondary | MoveEffect::ForceSwitch => true,
        _ => false,
    };
    if !aimed_at_target || ctx.target == ctx.user {
        return Ok(false);
    }
    if !state.active(ctx.target)?.has_tag(BattlerTagType::Substitute) {
        return Ok(false);
    }
    let bypass = ctx.move_data.has_flag(MoveFlag::IgnoreSubstitute)
        || ctx.move_data.has_flag(MoveFlag::Sound)
        || abilities::has_effect(state, ctx.data, ctx.user, AbilityEffectKind::IgnoreScreens, None)?;
    Ok(!bypass)
}

/// What running every effect of one timing produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectOutcome {
    pub commands: Vec<BattleCommand>,
    /// At least one effect took hold.
    pub applied: bool,
    pub failure: Option<MoveFailureReason>,
}

/// Run the move's effects registered for `when`, in declaration order. The
/// first failure stops the rest.
pub fn apply_effects(
    when: EffectTiming,
    ctx: &EffectContext,
    state: &BattleState,
    rng: &mut BattleRng,
) -> BattleResult<EffectOutcome> {
    let mut outcome = EffectOutcome::default();
    for effect in &ctx.move_data.effects {
        if timing(effect.kind()) != when {
            continue;
        }
        let Some(apply) = handler(effect.kind()) else {
            continue;
        };
        if blocked_by_substitute(effect, ctx, state)? {
            continue;
        }
        match apply(effect, ctx, state, rng)? {
            EffectResult::Applied(commands) => {
                outcome.applied = true;
                outcome.commands.extend(commands);
            }
            EffectResult::NoEffect(commands) => outcome.commands.extend(commands),
            EffectResult::Failed(reason) => {
                log::debug!("{:?} failed: {:?}", ctx.move_data.id, reason);
                outcome.failure = Some(reason);
                break;
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_battle, test_data, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use schema::{MoveId, SpeciesId};

    #[test]
    fn test_registry_timings() {
        assert_eq!(timing(MoveEffectKind::BreaksScreens), EffectTiming::BeforeHits);
        assert_eq!(timing(MoveEffectKind::StatChange), EffectTiming::PerHit);
        assert_eq!(timing(MoveEffectKind::Recharge), EffectTiming::AfterMove);
        assert_eq!(timing(MoveEffectKind::FixedDamage), EffectTiming::Passive);
        assert_eq!(timing(MoveEffectKind::Charge), EffectTiming::Passive);
        assert!(handler(MoveEffectKind::MultiHit).is_none());
    }

    #[test]
    fn test_substitute_blocks_foe_secondaries() {
        let data = test_data();
        let mut state = create_test_battle(
            vec![TestPokemonBuilder::new(SpeciesId::Pikachu, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
        );
        state.active_mut(BattlerIndex::Enemy).unwrap().add_tag(
            crate::battle::battler_tags::BattlerTag::new(BattlerTagType::Substitute, None, None)
                .with_data(crate::battle::battler_tags::TagData::Substitute { hp: 50 }),
        );
        let ctx = EffectContext {
            data: &data,
            user: BattlerIndex::Player,
            target: BattlerIndex::Enemy,
            move_data: data.move_data(MoveId::ThunderWave).unwrap(),
            damage_dealt: 0,
            first_target: true,
        };
        let mut rng = BattleRng::new_for_test(vec![]);
        let outcome = apply_effects(EffectTiming::PerHit, &ctx, &state, &mut rng).unwrap();
        assert!(!outcome.applied);
        assert!(outcome.commands.is_empty());
    }
}
