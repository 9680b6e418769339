use crate::battle::state::BattlerIndex;
use schema::{AbilityId, HeldItemId, MoveId, SpeciesId};
use thiserror::Error;

/// Main error type for the rogue-battle engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleError {
    /// A submitted command broke a precondition and was rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
    /// The engine reached a state that a correct phase ordering cannot produce
    #[error("Battle state error: {0}")]
    BattleState(#[from] BattleStateError),
    /// Static data lookup or parsing failed
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// Snapshot or replay encoding failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Errors raised while validating a player or AI command.
/// The engine state is untouched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no active Pokemon at {0:?}")]
    NoActivePokemon(BattlerIndex),
    #[error("Pokemon at {0:?} has fainted and cannot act")]
    PokemonFainted(BattlerIndex),
    #[error("move slot {0} is out of range")]
    InvalidMoveSlot(usize),
    #[error("{0:?} has no PP remaining")]
    NoPpRemaining(MoveId),
    #[error("{0:?} is disabled")]
    MoveDisabled(MoveId),
    #[error("{0:?} is not a valid target for this move")]
    InvalidTarget(BattlerIndex),
    #[error("party slot {0} is out of range")]
    InvalidPartySlot(usize),
    #[error("party slot {0} holds a fainted Pokemon")]
    SwitchTargetFainted(usize),
    #[error("party slot {0} is already on the field")]
    SwitchTargetActive(usize),
    #[error("Pokemon at {0:?} is trapped and cannot switch")]
    Trapped(BattlerIndex),
    #[error("a command for {0:?} was already submitted this turn")]
    DuplicateCommand(BattlerIndex),
    #[error("the battle is not waiting for {0}")]
    UnexpectedInput(&'static str),
}

/// Errors related to battle state consistency
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BattleStateError {
    #[error("no active Pokemon at {0:?}")]
    NoActivePokemon(BattlerIndex),
    #[error("no Pokemon in party slot {0}")]
    InvalidPartySlot(usize),
    #[error("Pokemon at {0:?} has no move in slot {1}")]
    InvalidMoveSlot(BattlerIndex, usize),
    #[error("inconsistent battle state: {0}")]
    InconsistentState(String),
}

/// Errors related to static data tables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("move not found: {0:?}")]
    MoveNotFound(MoveId),
    #[error("species not found: {0:?}")]
    SpeciesNotFound(SpeciesId),
    #[error("ability not found: {0:?}")]
    AbilityNotFound(AbilityId),
    #[error("held item not found: {0:?}")]
    ItemNotFound(HeldItemId),
    #[error("malformed {table} data: {details}")]
    Malformed { table: &'static str, details: String },
}

/// Errors produced at the persistence boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
    #[error("failed to decode snapshot: {0}")]
    Decode(String),
}

/// Convenient result type for battle operations
pub type BattleResult<T> = Result<T, BattleError>;

/// Convenient result type for command validation
pub type ValidationResult<T> = Result<T, ValidationError>;
