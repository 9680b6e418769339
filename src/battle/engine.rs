use crate::battle::ai::{Behavior, ScoringAi};
use crate::battle::events::{BattleEvent, EventBus};
use crate::battle::phase::{AwaitingInput, Phase, PhaseQueue};
use crate::battle::state::{BattleOutcome, BattleRng, BattleState, BattlerIndex, GameState, PlayerAction, Side};
use crate::battle::targeting::selectable_targets;
use crate::battle::turn_orchestrator::{execute_phase, PhaseContext, PhaseOutcome};
use crate::config::BattleConfig;
use crate::data::GameData;
use crate::errors::{BattleResult, BattleStateError, ValidationError, ValidationResult};
use crate::pokemon::Pokemon;
use schema::{BattleType, BattlerTagType, MoveId};
use std::fmt;
use std::sync::Arc;

/// Runs one battle: owns its state, phase queue, event bus and RNG, and
/// drives phases until a decision is needed from outside.
pub struct BattleEngine {
    config: BattleConfig,
    data: Arc<GameData>,
    state: BattleState,
    queue: PhaseQueue,
    bus: EventBus,
    rng: BattleRng,
    enemy_ai: Option<Box<dyn Behavior>>,
}

impl fmt::Debug for BattleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BattleEngine")
            .field("battle_id", &self.state.battle_id)
            .field("turn", &self.state.turn)
            .field("game_state", &self.state.game_state)
            .field("queued_phases", &self.queue.len())
            .finish()
    }
}

impl BattleEngine {
    /// A battle whose randomness comes from `config.seed`.
    pub fn new(config: BattleConfig, data: Arc<GameData>, player: Vec<Pokemon>, enemy: Vec<Pokemon>) -> Self {
        let rng = BattleRng::from_seed(config.seed);
        Self::with_rng(config, data, player, enemy, rng)
    }

    pub fn with_rng(
        config: BattleConfig,
        data: Arc<GameData>,
        player: Vec<Pokemon>,
        mut enemy: Vec<Pokemon>,
        rng: BattleRng,
    ) -> Self {
        apply_boss_segments(&config, &mut enemy);
        let state = BattleState::new(battle_id(&config), &config, player, enemy);
        let mut queue = PhaseQueue::new();
        queue.push_back(Phase::NewBattle);
        Self {
            config,
            data,
            state,
            queue,
            bus: EventBus::new(),
            rng,
            enemy_ai: Some(Box::new(ScoringAi::new())),
        }
    }

    /// Rebuild an engine from saved parts. The caller restores the RNG.
    pub fn from_parts(
        config: BattleConfig,
        data: Arc<GameData>,
        state: BattleState,
        queue: PhaseQueue,
        rng: BattleRng,
    ) -> Self {
        Self {
            config,
            data,
            state,
            queue,
            bus: EventBus::new(),
            rng,
            enemy_ai: Some(Box::new(ScoringAi::new())),
        }
    }

    pub fn with_enemy_behavior(mut self, behavior: Box<dyn Behavior>) -> Self {
        self.enemy_ai = Some(behavior);
        self
    }

    /// Leave enemy commands and replacements to the caller.
    pub fn without_enemy_ai(mut self) -> Self {
        self.enemy_ai = None;
        self
    }

    // --- Queries ---

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn state(&self) -> &BattleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BattleState {
        &mut self.state
    }

    pub fn queue(&self) -> &PhaseQueue {
        &self.queue
    }

    pub fn events(&self) -> &[BattleEvent] {
        self.bus.events()
    }

    pub fn take_events(&mut self) -> Vec<BattleEvent> {
        self.bus.drain()
    }

    pub fn rng_draws(&self) -> u64 {
        self.rng.draws()
    }

    pub fn outcome(&self) -> Option<BattleOutcome> {
        match self.state.game_state {
            GameState::Ended(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Positions that still need a command this turn.
    pub fn awaiting_commands(&self) -> Vec<BattlerIndex> {
        if self.state.game_state != GameState::WaitingForCommands {
            return Vec::new();
        }
        self.state
            .active_indices()
            .into_iter()
            .filter(|index| !self.state.pending_actions.contains_key(index))
            .collect()
    }

    // --- Commands ---

    /// Check a command against the current state without changing anything.
    pub fn validate_command(&self, index: BattlerIndex, action: &PlayerAction) -> ValidationResult<()> {
        if self.state.game_state != GameState::WaitingForCommands {
            return Err(ValidationError::UnexpectedInput("commands"));
        }
        let pokemon = self
            .state
            .pokemon(index)
            .ok_or(ValidationError::NoActivePokemon(index))?;
        if pokemon.is_fainted() {
            return Err(ValidationError::PokemonFainted(index));
        }
        if self.state.pending_actions.contains_key(&index) {
            return Err(ValidationError::DuplicateCommand(index));
        }

        match action {
            PlayerAction::UseMove { slot, target } => {
                let known = pokemon
                    .move_slot(*slot)
                    .ok_or(ValidationError::InvalidMoveSlot(*slot))?;
                if known.pp == 0 {
                    return Err(ValidationError::NoPpRemaining(known.move_id));
                }
                if known.disabled {
                    return Err(ValidationError::MoveDisabled(known.move_id));
                }
                if let Some(target) = target {
                    self.validate_move_target(index, known.move_id, *target)?;
                }
            }
            PlayerAction::Switch { party_slot } => {
                self.validate_switch_target(index.side(), *party_slot)?;
                let already_chosen = self.state.pending_actions.iter().any(|(other, queued)| {
                    other.side() == index.side()
                        && matches!(queued, PlayerAction::Switch { party_slot: chosen } if chosen == party_slot)
                });
                if already_chosen {
                    return Err(ValidationError::SwitchTargetActive(*party_slot));
                }
                if pokemon.has_tag(BattlerTagType::Trapped) {
                    return Err(ValidationError::Trapped(index));
                }
            }
            PlayerAction::Locked { .. } => return Err(ValidationError::UnexpectedInput("a locked action")),
            PlayerAction::Struggle | PlayerAction::Forfeit => {}
        }
        Ok(())
    }

    /// A chosen target must be standing on the field. Single-target moves also
    /// need it to be a position the user can aim at.
    fn validate_move_target(&self, user: BattlerIndex, move_id: MoveId, target: BattlerIndex) -> ValidationResult<()> {
        if !self.state.active_indices().contains(&target) {
            return Err(ValidationError::InvalidTarget(target));
        }
        let Ok(move_data) = self.data.move_data(move_id) else {
            return Ok(());
        };
        let legal = selectable_targets(&self.state, user, move_data.target);
        if !legal.is_empty() && !legal.contains(&target) {
            return Err(ValidationError::InvalidTarget(target));
        }
        Ok(())
    }

    fn validate_switch_target(&self, side: Side, party_slot: usize) -> ValidationResult<()> {
        let battle_side = self.state.side(side);
        let incoming = battle_side
            .party
            .get(party_slot)
            .ok_or(ValidationError::InvalidPartySlot(party_slot))?;
        if incoming.is_fainted() {
            return Err(ValidationError::SwitchTargetFainted(party_slot));
        }
        if battle_side.is_active(party_slot) {
            return Err(ValidationError::SwitchTargetActive(party_slot));
        }
        Ok(())
    }

    /// Record a command for this turn. Rejected commands leave the engine untouched.
    pub fn submit_command(&mut self, index: BattlerIndex, action: PlayerAction) -> BattleResult<()> {
        if let Err(err) = self.validate_command(index, &action) {
            log::warn!("rejected command {:?} for {:?}: {}", action, index, err);
            return Err(err.into());
        }
        self.state.pending_actions.insert(index, action);
        Ok(())
    }

    /// Answer a replacement prompt for `index`.
    pub fn submit_replacement(&mut self, index: BattlerIndex, party_slot: usize) -> BattleResult<()> {
        if self.state.game_state != GameState::WaitingForReplacement(index) {
            log::warn!("replacement for {:?} submitted out of turn", index);
            return Err(ValidationError::UnexpectedInput("a replacement").into());
        }
        if let Err(err) = self.validate_switch_target(index.side(), party_slot) {
            log::warn!("rejected replacement slot {} for {:?}: {}", party_slot, index, err);
            return Err(err.into());
        }
        self.queue.push_front(Phase::Switch { index, party_slot });
        self.state.game_state = GameState::TurnInProgress;
        Ok(())
    }

    // --- Driver ---

    /// Execute phases until the battle needs something from outside.
    pub fn run_until_input(&mut self) -> BattleResult<AwaitingInput> {
        loop {
            if let Some(outcome) = self.outcome() {
                return Ok(AwaitingInput::BattleOver(outcome));
            }
            let Some(phase) = self.queue.pop_front() else {
                return Err(BattleStateError::InconsistentState("phase queue ran dry".to_string()).into());
            };

            let emitted_before = self.bus.len();
            let outcome = {
                let mut ctx = PhaseContext {
                    state: &mut self.state,
                    data: &self.data,
                    bus: &mut self.bus,
                    queue: &mut self.queue,
                    rng: &mut self.rng,
                };
                execute_phase(phase, &mut ctx)?
            };

            match outcome {
                PhaseOutcome::Continue => {
                    if self.config.pause_for_animations && self.bus.len() > emitted_before {
                        return Ok(AwaitingInput::Animation);
                    }
                }
                PhaseOutcome::Await(AwaitingInput::Commands) => {
                    if !self.fill_enemy_commands()? {
                        return Ok(AwaitingInput::Commands);
                    }
                }
                PhaseOutcome::Await(AwaitingInput::Replacement(index)) => {
                    if !self.fill_enemy_replacement(index)? {
                        return Ok(AwaitingInput::Replacement(index));
                    }
                }
                PhaseOutcome::Await(input) => return Ok(input),
            }
        }
    }

    /// Let the enemy AI pick for every enemy battler still missing a command.
    /// True when no command is missing afterwards.
    fn fill_enemy_commands(&mut self) -> BattleResult<bool> {
        if let Some(ai) = &self.enemy_ai {
            for index in self.awaiting_commands() {
                if index.side() != Side::Enemy {
                    continue;
                }
                let action = ai.decide_action(&self.state, &self.data, index)?;
                let action = match self.validate_command(index, &action) {
                    Ok(()) => action,
                    Err(err) => {
                        log::warn!("AI command {:?} rejected ({}), struggling instead", action, err);
                        PlayerAction::Struggle
                    }
                };
                self.state.pending_actions.insert(index, action);
            }
        }
        Ok(self.awaiting_commands().is_empty())
    }

    fn fill_enemy_replacement(&mut self, index: BattlerIndex) -> BattleResult<bool> {
        if index.side() != Side::Enemy {
            return Ok(false);
        }
        let Some(ai) = &self.enemy_ai else {
            return Ok(false);
        };
        match ai.choose_replacement(&self.state, &self.data, index)? {
            Some(party_slot) => {
                self.submit_replacement(index, party_slot)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Submit the player's commands and run the turn they start.
    pub fn play_turn(&mut self, commands: Vec<(BattlerIndex, PlayerAction)>) -> BattleResult<AwaitingInput> {
        for (index, action) in commands {
            self.submit_command(index, action)?;
        }
        self.run_until_input()
    }

    /// Start the next wave against a new enemy party. Arena state that only
    /// lasts one battle is cleared; the player's party and the RNG carry over.
    pub fn start_next_battle(&mut self, wave: u32, battle_type: BattleType, mut enemy: Vec<Pokemon>) {
        self.config.wave = wave;
        self.config.battle_type = battle_type;
        apply_boss_segments(&self.config, &mut enemy);

        let mut player = std::mem::take(&mut self.state.sides[0].party);
        for pokemon in player.iter_mut() {
            pokemon.reset_summon_data();
            pokemon.reset_turn_data();
        }
        let mut arena = std::mem::take(&mut self.state.arena);
        arena.reset_for_new_battle(&mut self.bus);

        self.state = BattleState::new(battle_id(&self.config), &self.config, player, enemy);
        self.state.arena = arena;
        self.queue.clear();
        self.queue.push_back(Phase::NewBattle);
        log::debug!("starting wave {} ({:?})", wave, battle_type);
    }
}

fn battle_id(config: &BattleConfig) -> String {
    format!("battle-{}-{}", config.seed, config.wave)
}

/// Boss encounters split the leading enemies' HP bars into segments.
fn apply_boss_segments(config: &BattleConfig, enemy: &mut [Pokemon]) {
    if config.battle_type != BattleType::Boss || config.boss_segments <= 1 {
        return;
    }
    for boss in enemy.iter_mut().take(config.style.field_size()) {
        boss.boss_segments = config.boss_segments;
        boss.boss_segment_index = config.boss_segments - 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::tests::common::{create_test_engine, pinned_config, TestPokemonBuilder};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::SpeciesId;

    fn snorlax_vs_machamp() -> BattleEngine {
        create_test_engine(
            pinned_config(),
            vec![
                TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build(),
                TestPokemonBuilder::new(SpeciesId::Pikachu, 50).with_hp(0).build(),
                TestPokemonBuilder::new(SpeciesId::Blastoise, 50).build(),
            ],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        )
    }

    #[test]
    fn test_battle_starts_waiting_for_the_player() {
        let mut engine = snorlax_vs_machamp();
        assert_eq!(engine.run_until_input().unwrap(), AwaitingInput::Commands);
        assert_eq!(engine.awaiting_commands(), vec![BattlerIndex::Player]);
        assert!(engine.state().pending_actions.contains_key(&BattlerIndex::Enemy));
        assert!(matches!(
            engine.events().first(),
            Some(BattleEvent::BattleStarted { wave: 1, .. })
        ));
    }

    #[test]
    fn test_rejected_commands_leave_state_alone() {
        let mut engine = snorlax_vs_machamp();
        engine.run_until_input().unwrap();
        let before = engine.state().clone();

        let cases = [
            (PlayerAction::UseMove { slot: 3, target: None }, ValidationError::InvalidMoveSlot(3)),
            (PlayerAction::Switch { party_slot: 1 }, ValidationError::SwitchTargetFainted(1)),
            (PlayerAction::Switch { party_slot: 0 }, ValidationError::SwitchTargetActive(0)),
            (PlayerAction::Switch { party_slot: 7 }, ValidationError::InvalidPartySlot(7)),
        ];
        for (action, expected) in cases {
            assert_eq!(
                engine.validate_command(BattlerIndex::Player, &action),
                Err(expected)
            );
            assert!(engine.submit_command(BattlerIndex::Player, action).is_err());
        }
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn test_move_without_pp_is_rejected() {
        let mut engine = snorlax_vs_machamp();
        engine.run_until_input().unwrap();
        engine
            .state_mut()
            .pokemon_mut(BattlerIndex::Player)
            .unwrap()
            .moveset[0]
            .pp = 0;
        assert_eq!(
            engine.validate_command(BattlerIndex::Player, &PlayerAction::UseMove { slot: 0, target: None }),
            Err(ValidationError::NoPpRemaining(MoveId::Tackle))
        );
    }

    #[rstest]
    #[case::empty_position_in_singles(BattlerIndex::Enemy2)]
    #[case::tackle_aimed_at_itself(BattlerIndex::Player)]
    fn test_unreachable_targets_are_rejected(#[case] target: BattlerIndex) {
        // Arrange
        let mut engine = snorlax_vs_machamp();
        engine.run_until_input().unwrap();
        let action = PlayerAction::UseMove {
            slot: 0,
            target: Some(target),
        };

        // Act
        let result = engine.validate_command(BattlerIndex::Player, &action);

        // Assert
        assert_eq!(result, Err(ValidationError::InvalidTarget(target)));
        assert!(engine.submit_command(BattlerIndex::Player, action).is_err());
        assert_eq!(engine.awaiting_commands(), vec![BattlerIndex::Player]);
    }

    #[test]
    fn test_a_turn_runs_to_the_next_command_prompt() {
        let mut engine = snorlax_vs_machamp();
        engine.run_until_input().unwrap();
        let input = engine
            .play_turn(vec![(
                BattlerIndex::Player,
                PlayerAction::UseMove {
                    slot: 0,
                    target: Some(BattlerIndex::Enemy),
                },
            )])
            .unwrap();
        assert_eq!(input, AwaitingInput::Commands);
        assert_eq!(engine.state().turn, 1);
        let events = engine.events();
        assert!(events.contains(&BattleEvent::TurnStarted { turn: 1 }));
        assert!(events.contains(&BattleEvent::TurnEnded { turn: 1 }));
        let used = events
            .iter()
            .filter(|event| matches!(event, BattleEvent::MoveUsed { .. }))
            .count();
        assert_eq!(used, 2);
    }

    #[test]
    fn test_forfeit_ends_the_battle() {
        let mut engine = snorlax_vs_machamp();
        engine.run_until_input().unwrap();
        let input = engine
            .play_turn(vec![(BattlerIndex::Player, PlayerAction::Forfeit)])
            .unwrap();
        assert_eq!(input, AwaitingInput::BattleOver(BattleOutcome::EnemyVictory));
        assert_eq!(engine.outcome(), Some(BattleOutcome::EnemyVictory));
        assert_eq!(
            engine.validate_command(BattlerIndex::Player, &PlayerAction::Forfeit),
            Err(ValidationError::UnexpectedInput("commands"))
        );
    }

    #[test]
    fn test_animation_boundaries() {
        let mut config = pinned_config();
        config.pause_for_animations = true;
        let mut engine = create_test_engine(
            config,
            vec![TestPokemonBuilder::new(SpeciesId::Snorlax, 50).build()],
            vec![TestPokemonBuilder::new(SpeciesId::Machamp, 50).build()],
        );
        assert_eq!(engine.run_until_input().unwrap(), AwaitingInput::Animation);
        let mut steps = 0;
        while engine.run_until_input().unwrap() == AwaitingInput::Animation {
            steps += 1;
            assert!(steps < 20);
        }
        assert_eq!(engine.awaiting_commands(), vec![BattlerIndex::Player]);
    }

    #[test]
    fn test_replacement_only_when_prompted() {
        let mut engine = snorlax_vs_machamp();
        engine.run_until_input().unwrap();
        assert!(matches!(
            engine.submit_replacement(BattlerIndex::Player, 2),
            Err(crate::errors::BattleError::Validation(ValidationError::UnexpectedInput(_)))
        ));
    }
}
