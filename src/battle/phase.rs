use crate::battle::state::{BattleOutcome, BattleState, BattlerIndex, PlayerAction};
use crate::battle::stats::effective_speed;
use crate::data::GameData;
use crate::errors::BattleResult;
use crate::pokemon::PokemonId;
use schema::{AbilityId, ArenaTagType, MoveId, MoveResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A battler a move is aimed at, pinned to the Pokemon that stood there when
/// the move started.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitTarget {
    pub index: BattlerIndex,
    pub id: PokemonId,
}

/// One ability waiting to activate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAbility {
    pub index: BattlerIndex,
    pub pokemon_id: PokemonId,
    pub ability: AbilityId,
}

/// One atomically executed step of battle processing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Phase {
    NewBattle,
    Summon {
        index: BattlerIndex,
        party_slot: usize,
    },
    /// Entry hazards for the new arrivals, then their summon abilities.
    PostSummon {
        indices: Vec<BattlerIndex>,
    },
    /// Activates the best-ordered pending ability and requeues the rest.
    AbilityTriggers {
        pending: Vec<PendingAbility>,
    },
    CommandSelection,
    TurnStart,
    Move {
        user: BattlerIndex,
        user_id: PokemonId,
        move_id: MoveId,
        /// `None` for Struggle and for the second turn of a charge move.
        move_slot: Option<usize>,
        target: Option<BattlerIndex>,
    },
    MoveEffect {
        user: BattlerIndex,
        user_id: PokemonId,
        move_id: MoveId,
        targets: Vec<HitTarget>,
    },
    MoveHit {
        user: BattlerIndex,
        user_id: PokemonId,
        move_id: MoveId,
        targets: Vec<HitTarget>,
        hit: u8,
        total: u8,
        dealt_damage: bool,
    },
    MoveEnd {
        user: BattlerIndex,
        user_id: PokemonId,
        move_id: MoveId,
        targets: Vec<BattlerIndex>,
        result: MoveResult,
        dealt_damage: bool,
    },
    Faint {
        index: BattlerIndex,
    },
    SwitchPrompt {
        index: BattlerIndex,
    },
    /// Wimp Out style exit of a battler that is still standing.
    EmergencySwitch {
        index: BattlerIndex,
        pokemon_id: PokemonId,
    },
    Switch {
        index: BattlerIndex,
        party_slot: usize,
    },
    FormChange {
        index: BattlerIndex,
        form: u8,
    },
    WeatherEffect,
    TurnEnd,
    CheckVictory,
    BattleEnd {
        outcome: BattleOutcome,
    },
}

impl Phase {
    /// Phases that continue a move already in progress. Faint handling waits
    /// until these have drained.
    pub fn continues_move(&self) -> bool {
        matches!(self, Phase::MoveHit { .. } | Phase::MoveEnd { .. })
    }
}

/// Why the driver stopped.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitingInput {
    /// Every active battler without a pending action needs a command.
    Commands,
    /// The player must pick a replacement for this position.
    Replacement(BattlerIndex),
    /// A phase emitted events and animation boundaries are enabled.
    Animation,
    BattleOver(BattleOutcome),
}

/// The phase queue. `push_back` schedules, `push_front` interrupts.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PhaseQueue {
    phases: VecDeque<Phase>,
}

impl PhaseQueue {
    pub fn new() -> Self {
        Self {
            phases: VecDeque::new(),
        }
    }

    /// Adds a phase to the end of the queue.
    pub fn push_back(&mut self, phase: Phase) {
        self.phases.push_back(phase);
    }

    /// Adds a phase to the front of the queue, to be executed next.
    pub fn push_front(&mut self, phase: Phase) {
        self.phases.push_front(phase);
    }

    /// Push several phases to the front, keeping their relative order.
    pub fn push_front_all(&mut self, phases: Vec<Phase>) {
        for phase in phases.into_iter().rev() {
            self.phases.push_front(phase);
        }
    }

    pub fn pop_front(&mut self) -> Option<Phase> {
        self.phases.pop_front()
    }

    pub fn peek(&self) -> Option<&Phase> {
        self.phases.front()
    }

    pub fn clear(&mut self) {
        self.phases.clear();
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Phase> {
        self.phases.iter()
    }

    pub fn has_faint_for(&self, index: BattlerIndex) -> bool {
        self.phases
            .iter()
            .any(|phase| matches!(phase, Phase::Faint { index: queued } if *queued == index))
    }

    /// Schedule a phase behind the move currently resolving and behind any
    /// faint already waiting there.
    pub fn push_after_move(&mut self, phase: Phase) {
        let position = self
            .phases
            .iter()
            .take_while(|queued| queued.continues_move() || matches!(queued, Phase::Faint { .. }))
            .count();
        self.phases.insert(position, phase);
    }

    /// Drop every queued action of a battler that has left the field.
    pub fn remove_moves_of(&mut self, user_id: PokemonId) {
        self.phases.retain(|phase| match phase {
            Phase::Move { user_id: queued, .. } => *queued != user_id,
            _ => true,
        });
    }
}

/// Sort key for one queued action.
#[derive(Debug, Clone, Copy)]
struct ActionPriority {
    action_priority: i8,
    move_priority: i8,
    speed: u32,
}

impl ActionPriority {
    const FLEE: i8 = 10;
    const SWITCH: i8 = 6;
    const FIGHT: i8 = 0;
}

/// Order this turn's actions: action class, then move priority, then effective
/// speed (reversed under Trick Room), then field position.
pub fn determine_action_order(
    state: &BattleState,
    data: &GameData,
) -> BattleResult<Vec<(BattlerIndex, PlayerAction)>> {
    let trick_room = state.arena.has_tag(ArenaTagType::TrickRoom);
    let mut prioritized = Vec::with_capacity(state.pending_actions.len());

    for (index, action) in &state.pending_actions {
        let priority = calculate_action_priority(state, data, *index, action)?;
        prioritized.push((*index, action.clone(), priority));
    }

    prioritized.sort_by(|a, b| {
        b.2.action_priority
            .cmp(&a.2.action_priority)
            .then_with(|| b.2.move_priority.cmp(&a.2.move_priority))
            .then_with(|| {
                if trick_room {
                    a.2.speed.cmp(&b.2.speed)
                } else {
                    b.2.speed.cmp(&a.2.speed)
                }
            })
            .then_with(|| a.0.cmp(&b.0))
    });

    Ok(prioritized
        .into_iter()
        .map(|(index, action, _)| (index, action))
        .collect())
}

fn calculate_action_priority(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
    action: &PlayerAction,
) -> BattleResult<ActionPriority> {
    let priority = match action {
        PlayerAction::Forfeit => ActionPriority {
            action_priority: ActionPriority::FLEE,
            move_priority: 0,
            speed: 0,
        },
        PlayerAction::Switch { .. } => ActionPriority {
            action_priority: ActionPriority::SWITCH,
            move_priority: 0,
            speed: effective_speed(state, data, index)?,
        },
        PlayerAction::UseMove { slot, .. } => {
            let pokemon = state.active(index)?;
            let move_priority = match pokemon.move_slot(*slot) {
                Some(slot) => data.move_data(slot.move_id)?.priority,
                None => 0,
            };
            ActionPriority {
                action_priority: ActionPriority::FIGHT,
                move_priority,
                speed: effective_speed(state, data, index)?,
            }
        }
        PlayerAction::Locked { move_id, .. } => ActionPriority {
            action_priority: ActionPriority::FIGHT,
            move_priority: match move_id {
                Some(move_id) => data.move_data(*move_id)?.priority,
                None => 0,
            },
            speed: effective_speed(state, data, index)?,
        },
        PlayerAction::Struggle => ActionPriority {
            action_priority: ActionPriority::FIGHT,
            move_priority: 0,
            speed: effective_speed(state, data, index)?,
        },
    };
    Ok(priority)
}
