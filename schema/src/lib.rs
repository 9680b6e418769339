// Shared data definitions for the rogue-battle engine.
// Everything here is plain data: ids, records loaded from the RON tables,
// and the type chart. Battle logic lives in the main crate.

pub use ability_data::*;
pub use battle_data::*;
pub use item_data::*;
pub use move_data::*;
pub use pokemon_types::*;
pub use species_data::*;

pub mod ability_data;
pub mod battle_data;
pub mod item_data;
pub mod move_data;
pub mod pokemon_types;
pub mod species_data;

/// Bitset over the discriminants of a fieldless effect-kind enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectKindSet(u64);

impl EffectKindSet {
    pub fn insert(&mut self, kind: usize) {
        debug_assert!(kind < 64, "effect kind index {} out of range", kind);
        self.0 |= 1 << kind;
    }

    pub fn contains(&self, kind: usize) -> bool {
        kind < 64 && self.0 & (1 << kind) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
