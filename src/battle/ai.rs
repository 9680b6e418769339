//! Command selection for computer-controlled combatants.

use crate::battle::abilities;
use crate::battle::damage::{base_power, fixed_damage, resolve_move_type, stab_multiplier, type_effectiveness, DamageContext};
use crate::battle::state::{BattleState, BattlerIndex, PlayerAction};
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::Pokemon;
use ordered_float::OrderedFloat;
use schema::{EffectTarget, MoveData, MoveEffect, MoveTarget};

/// A trait for any system that can decide on a battle action.
pub trait Behavior {
    /// Picks this turn's action for the battler at `index`.
    fn decide_action(&self, state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<PlayerAction>;

    /// Picks which party slot replaces the fainted battler at `index`.
    fn choose_replacement(&self, state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<Option<usize>>;
}

/// Scores every usable move against every opponent and plays the best one.
/// Scores are deterministic so a replay picks the same commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoringAi;

impl ScoringAi {
    pub fn new() -> Self {
        Self
    }

    /// The core scoring logic for one move aimed at one target.
    pub fn score_move(
        &self,
        state: &BattleState,
        data: &GameData,
        user: BattlerIndex,
        target: BattlerIndex,
        move_data: &MoveData,
    ) -> BattleResult<f64> {
        let attacker = state.active(user)?;
        let defender = state.active(target)?;

        // --- Damage ---
        let mut damage_score = 0.0;
        if move_data.is_damaging() {
            let move_type = resolve_move_type(state, data, user, move_data)?;
            if abilities::type_immunity(state, data, target, user, move_type)?.is_some() {
                return Ok(-1.0);
            }
            let ctx = DamageContext {
                user,
                target,
                move_data,
                is_crit: false,
                hit: 0,
                target_count: 1,
            };
            damage_score = match fixed_damage(state, &ctx)? {
                Some(amount) => amount.min(defender.current_hp()) as f64,
                None => {
                    let effectiveness = type_effectiveness(state, data, user, target, move_data, move_type)?;
                    if effectiveness == 0.0 {
                        return Ok(-1.0);
                    }
                    let power = base_power(state, data, user, move_data)? as f64;
                    power * effectiveness * stab_multiplier(state, data, user, move_type)?
                }
            };
        }

        // --- Utility ---
        let mut utility_score = 0.0;
        for effect in &move_data.effects {
            match effect {
                MoveEffect::StatChange {
                    target: EffectTarget::User,
                    stat,
                    delta,
                    chance,
                } if *delta > 0 => {
                    let stage = attacker.stat_stage(*stat);
                    if stage < 6 {
                        let headroom = 1.0 - stage as f64 / 6.0;
                        utility_score += 20.0 * *delta as f64 * headroom * *chance as f64 / 100.0;
                    }
                }
                MoveEffect::StatChange {
                    target: EffectTarget::Target,
                    stat,
                    delta,
                    chance,
                } if *delta < 0 => {
                    if defender.stat_stage(*stat) > -6 {
                        utility_score += 15.0 * delta.unsigned_abs() as f64 * *chance as f64 / 100.0;
                    }
                }
                MoveEffect::Status {
                    target: EffectTarget::Target,
                    status,
                    chance,
                } => {
                    if defender.can_set_status(*status) {
                        utility_score += 45.0 * *chance as f64 / 100.0;
                    }
                }
                MoveEffect::Flinch(chance) => {
                    utility_score += 30.0 * *chance as f64 / 100.0;
                }
                _ => {}
            }
        }

        if !move_data.is_damaging() && utility_score < 1.0 {
            return Ok(-1.0);
        }

        let mut score = damage_score + utility_score;
        if move_data.is_damaging() {
            score *= move_data.accuracy.unwrap_or(101) as f64 / 100.0;
        }
        Ok(score)
    }

    /// How well a benched Pokemon matches up against the current opponents.
    fn score_replacement(&self, state: &BattleState, data: &GameData, candidate: &Pokemon, index: BattlerIndex) -> BattleResult<f64> {
        let mut best = 0.0f64;
        for opponent in state.opponents_of(index) {
            let defender = state.active(opponent)?;
            for known in candidate.moveset.iter().filter(|known| known.pp > 0) {
                let move_data = data.move_data(known.move_id)?;
                if !move_data.is_damaging() {
                    continue;
                }
                let effectiveness =
                    schema::PokemonType::effectiveness_against(move_data.move_type, defender.types());
                let stab = if candidate.has_type(move_data.move_type) { 1.5 } else { 1.0 };
                best = best.max(move_data.power.unwrap_or(0) as f64 * effectiveness * stab);
            }
        }
        Ok(best * candidate.hp_ratio())
    }
}

impl Behavior for ScoringAi {
    fn decide_action(&self, state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<PlayerAction> {
        let pokemon = state.active(index)?;
        let opponents = state.opponents_of(index);

        let mut best: Option<(PlayerAction, OrderedFloat<f64>)> = None;
        for (slot, known) in pokemon.moveset.iter().enumerate() {
            if known.pp == 0 || known.disabled {
                continue;
            }
            let move_data = data.move_data(known.move_id)?;
            let aims_at_foe = matches!(
                move_data.target,
                MoveTarget::NearOther | MoveTarget::NearEnemy | MoveTarget::RandomNearEnemy
            );
            let candidates: Vec<BattlerIndex> = if aims_at_foe || move_data.target.is_spread() {
                opponents.clone()
            } else {
                vec![index]
            };
            for target in candidates {
                let scored_target = if target == index {
                    opponents.first().copied().unwrap_or(index)
                } else {
                    target
                };
                let score = OrderedFloat(self.score_move(state, data, index, scored_target, move_data)?);
                // Earlier slots win ties.
                if best.as_ref().map_or(true, |(_, top)| score > *top) {
                    let target = aims_at_foe.then_some(target);
                    best = Some((PlayerAction::UseMove { slot, target }, score));
                }
            }
        }

        let action = match best {
            Some((action, _)) => action,
            None => PlayerAction::Struggle,
        };
        log::debug!("AI at {:?} chose {:?}", index, action);
        Ok(action)
    }

    fn choose_replacement(&self, state: &BattleState, data: &GameData, index: BattlerIndex) -> BattleResult<Option<usize>> {
        let side = state.side(index.side());
        let mut best: Option<(usize, OrderedFloat<f64>)> = None;
        for party_slot in side.reserves() {
            let candidate = &side.party[party_slot];
            let score = OrderedFloat(self.score_replacement(state, data, candidate, index)?);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((party_slot, score));
            }
        }
        Ok(best.map(|(party_slot, _)| party_slot))
    }
}
