use crate::battle::state::{BattleRng, BattleState, BattlerIndex};
use schema::MoveTarget;

/// Positions a player may pick for a move with this scope. Empty for moves
/// that never take an explicit target.
pub fn selectable_targets(
    state: &BattleState,
    user: BattlerIndex,
    move_target: MoveTarget,
) -> Vec<BattlerIndex> {
    match move_target {
        MoveTarget::NearOther => state
            .active_indices()
            .into_iter()
            .filter(|index| *index != user)
            .collect(),
        MoveTarget::NearEnemy => state.opponents_of(user),
        _ => Vec::new(),
    }
}

/// Resolve a move's scope to concrete battlers at execution time.
///
/// Field-directed scopes resolve to the user, since their effects are applied
/// relative to the user's side. A single target that is gone retargets to the
/// first living foe.
pub fn resolve_targets(
    state: &BattleState,
    user: BattlerIndex,
    move_target: MoveTarget,
    chosen: Option<BattlerIndex>,
    rng: &mut BattleRng,
) -> Vec<BattlerIndex> {
    let alive = |index: BattlerIndex| state.pokemon(index).is_some_and(|p| !p.is_fainted());
    match move_target {
        MoveTarget::User | MoveTarget::UserSide | MoveTarget::EnemySide | MoveTarget::BothSides => {
            vec![user]
        }
        MoveTarget::Ally => state.ally_of(user).into_iter().collect(),
        MoveTarget::NearOther | MoveTarget::NearEnemy => {
            let foes = state.opponents_of(user);
            let chosen = chosen.filter(|index| {
                *index != user
                    && alive(*index)
                    && (move_target == MoveTarget::NearOther || index.side() != user.side())
            });
            match chosen {
                Some(index) => vec![index],
                None => foes.into_iter().take(1).collect(),
            }
        }
        MoveTarget::RandomNearEnemy => {
            let foes = state.opponents_of(user);
            if foes.len() <= 1 {
                return foes;
            }
            let pick = rng.rand_int(foes.len() as u32, "random target") as usize;
            vec![foes[pick]]
        }
        MoveTarget::AllNearEnemies => state.opponents_of(user),
        MoveTarget::AllNearOthers => state
            .active_indices()
            .into_iter()
            .filter(|index| *index != user)
            .collect(),
    }
}
