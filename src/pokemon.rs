use crate::battle::battler_tags::{BattlerTag, TagLapse};
use crate::battle::state::BattlerIndex;
use crate::data::GameData;
use crate::errors::BattleResult;
use schema::{
    AbilityId, BattleStat, BattlerTagLapseType, BattlerTagType, HeldItemId, MoveId, MoveResult,
    PokemonType, SpeciesData, SpeciesId, Stat, StatusEffect,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Oldest entries fall off the move history past this length.
pub const MOVE_HISTORY_LIMIT: usize = 20;

pub const MIN_STAT_STAGE: i8 = -6;
pub const MAX_STAT_STAGE: i8 = 6;

/// Unique per session. Lets phases notice that a position changed hands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PokemonId(pub u32);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PokemonMove {
    pub move_id: MoveId,
    pub pp: u8,
    pub max_pp: u8,
    #[serde(default)]
    pub disabled: bool,
}

impl PokemonMove {
    pub fn new(move_id: MoveId, max_pp: u8) -> Self {
        Self {
            move_id,
            pp: max_pp,
            max_pp,
            disabled: false,
        }
    }

    /// Use the move (decrease PP)
    pub fn use_pp(&mut self) -> bool {
        if self.pp > 0 {
            self.pp -= 1;
            true
        } else {
            false
        }
    }
}

/// A persistent status plus its turn counter (sleep turns, toxic counter).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCondition {
    pub effect: StatusEffect,
    #[serde(default)]
    pub turns: u8,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldItem {
    pub id: HeldItemId,
    pub stack_count: u8,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl HeldItem {
    pub fn new(id: HeldItemId, stack_count: u8) -> Self {
        Self {
            id,
            stack_count,
            enabled: true,
        }
    }
}

/// One entry of the move history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TurnMove {
    pub move_id: MoveId,
    pub targets: Vec<BattlerIndex>,
    pub result: MoveResult,
    pub turn: u32,
}

/// Everything that is wiped when the Pokemon leaves the field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SummonData {
    pub stat_stages: [i8; 7],
    pub tags: Vec<BattlerTag>,
    pub types: Option<Vec<PokemonType>>,
    pub ability: Option<AbilityId>,
    pub turns_on_field: u32,
    /// Consecutive successful protections.
    pub protect_streak: u8,
}

/// Everything that is wiped at the start of each turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TurnData {
    pub damage_taken: u16,
    pub hits_left: u8,
    pub hit_count: u8,
    pub acted: bool,
    pub failed_last_move: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pokemon {
    pub id: PokemonId,
    pub species: SpeciesId,
    #[serde(default)]
    pub form_index: u8,
    pub name: String,
    pub level: u8,
    pub ivs: [u8; 6],
    /// HP, ATK, DEF, SP.ATK, SP.DEF, SPD for the current form
    pub stats: [u16; 6],
    pub(crate) hp: u16,
    pub base_types: Vec<PokemonType>,
    pub moveset: Vec<PokemonMove>,
    #[serde(default)]
    pub status: Option<StatusCondition>,
    pub ability: AbilityId,
    #[serde(default = "no_ability")]
    pub passive: AbilityId,
    #[serde(default)]
    pub passive_enabled: bool,
    /// Set by effects that strip an ability; independent of which ability it is.
    #[serde(default)]
    pub ability_suppressed: bool,
    #[serde(default)]
    pub held_items: Vec<HeldItem>,
    #[serde(default)]
    pub item_lost: bool,
    #[serde(default = "one_segment")]
    pub boss_segments: u8,
    /// Segments still standing above the last one.
    #[serde(default)]
    pub boss_segment_index: u8,
    #[serde(default)]
    pub move_history: VecDeque<TurnMove>,
    #[serde(default)]
    pub summon_data: SummonData,
    #[serde(default)]
    pub turn_data: TurnData,
}

fn no_ability() -> AbilityId {
    AbilityId::None
}

fn one_segment() -> u8 {
    1
}

impl Pokemon {
    /// Create a new Pokemon from species data at full HP with max PP.
    pub fn new(
        id: PokemonId,
        species: &SpeciesData,
        level: u8,
        moves: &[MoveId],
        data: &GameData,
    ) -> BattleResult<Self> {
        let ivs = [15; 6];
        let stats = Self::calculate_stats(species.base_stats.as_array(), level, &ivs);

        let mut moveset = Vec::with_capacity(4);
        for move_id in moves.iter().take(4) {
            let move_data = data.move_data(*move_id)?;
            moveset.push(PokemonMove::new(*move_id, move_data.pp));
        }

        Ok(Self {
            id,
            species: species.id,
            form_index: 0,
            name: species.name.clone(),
            level,
            ivs,
            stats,
            hp: stats[0],
            base_types: species.types.clone(),
            moveset,
            status: None,
            ability: species.abilities.first().copied().unwrap_or(AbilityId::None),
            passive: species.passive,
            passive_enabled: species.passive != AbilityId::None,
            ability_suppressed: false,
            held_items: Vec::new(),
            item_lost: false,
            boss_segments: 1,
            boss_segment_index: 0,
            move_history: VecDeque::new(),
            summon_data: SummonData::default(),
            turn_data: TurnData::default(),
        })
    }

    /// HP = floor((2B + IV) * L / 100) + L + 10; others floor((2B + IV) * L / 100) + 5
    pub fn calculate_stats(base: [u8; 6], level: u8, ivs: &[u8; 6]) -> [u16; 6] {
        let mut stats = [0u16; 6];
        for i in 0..6 {
            let scaled = (2 * base[i] as u32 + ivs[i] as u32) * level as u32 / 100;
            let stat = if i == 0 {
                scaled + level as u32 + 10
            } else {
                scaled + 5
            };
            stats[i] = stat.min(u16::MAX as u32) as u16;
        }
        stats
    }

    // --- HP ---

    pub fn current_hp(&self) -> u16 {
        self.hp
    }

    pub fn max_hp(&self) -> u16 {
        self.stats[Stat::Hp.index()]
    }

    pub fn is_fainted(&self) -> bool {
        self.hp == 0
    }

    pub fn is_full_hp(&self) -> bool {
        self.hp == self.max_hp()
    }

    /// HP as a fraction of max.
    pub fn hp_ratio(&self) -> f64 {
        if self.max_hp() == 0 {
            return 0.0;
        }
        self.hp as f64 / self.max_hp() as f64
    }

    /// `numerator / denominator` of max HP, at least 1. Residual damage and heals use this.
    pub fn max_hp_fraction(&self, numerator: u16, denominator: u16) -> u16 {
        let amount = self.max_hp() as u32 * numerator as u32 / denominator.max(1) as u32;
        (amount as u16).max(1)
    }

    /// Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: u16) -> u16 {
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        self.turn_data.damage_taken = self.turn_data.damage_taken.saturating_add(dealt);
        dealt
    }

    /// Returns the HP actually restored. Fainted Pokemon cannot be healed.
    pub fn heal(&mut self, amount: u16) -> u16 {
        if self.is_fainted() {
            return 0;
        }
        let restored = amount.min(self.max_hp() - self.hp);
        self.hp += restored;
        restored
    }

    pub fn faint(&mut self) {
        self.hp = 0;
    }

    /// Clamp incoming damage to the next boss segment boundary.
    /// Returns the clamped damage and whether a boundary was reached.
    pub fn clamp_to_boss_segment(&self, amount: u16) -> (u16, bool) {
        if self.boss_segment_index == 0 || self.boss_segments <= 1 {
            return (amount, false);
        }
        let segment_size = self.max_hp() as f64 / self.boss_segments as f64;
        let threshold = (segment_size * self.boss_segment_index as f64).round() as u16;
        if self.hp > threshold && self.hp.saturating_sub(amount) <= threshold {
            (self.hp - threshold, true)
        } else {
            (amount, false)
        }
    }

    /// The non-HP stat with the highest raw value. Boss segment breaks boost it.
    pub fn highest_stat(&self) -> Stat {
        [
            Stat::Attack,
            Stat::Defense,
            Stat::SpAttack,
            Stat::SpDefense,
            Stat::Speed,
        ]
        .into_iter()
        .fold(Stat::Attack, |best, stat| {
            if self.stats[stat.index()] > self.stats[best.index()] {
                stat
            } else {
                best
            }
        })
    }

    // --- Stats ---

    pub fn stat(&self, stat: Stat) -> u16 {
        self.stats[stat.index()]
    }

    pub fn stat_stage(&self, stat: BattleStat) -> i8 {
        self.summon_data.stat_stages[stat.index()]
    }

    /// Set a stage directly. Returns true if it changed.
    pub fn set_stat_stage(&mut self, stat: BattleStat, stage: i8) -> bool {
        let clamped = stage.clamp(MIN_STAT_STAGE, MAX_STAT_STAGE);
        let slot = &mut self.summon_data.stat_stages[stat.index()];
        let changed = *slot != clamped;
        *slot = clamped;
        changed
    }

    /// Apply a stage delta. Returns (old, new); equal values mean "no change".
    pub fn change_stat_stage(&mut self, stat: BattleStat, delta: i8) -> (i8, i8) {
        let old = self.stat_stage(stat);
        let new = old.saturating_add(delta).clamp(MIN_STAT_STAGE, MAX_STAT_STAGE);
        self.summon_data.stat_stages[stat.index()] = new;
        (old, new)
    }

    pub fn reset_stat_stages(&mut self) {
        self.summon_data.stat_stages = [0; 7];
    }

    // --- Types ---

    pub fn types(&self) -> &[PokemonType] {
        self.summon_data
            .types
            .as_deref()
            .unwrap_or(self.base_types.as_slice())
    }

    pub fn set_types(&mut self, types: Vec<PokemonType>) {
        self.summon_data.types = Some(types);
    }

    pub fn has_type(&self, pokemon_type: PokemonType) -> bool {
        self.types().contains(&pokemon_type)
    }

    // --- Abilities ---

    /// The active ability, honouring temporary overrides.
    pub fn ability(&self) -> AbilityId {
        self.summon_data.ability.unwrap_or(self.ability)
    }

    /// Ability then passive. Suppression is decided by the ability registry.
    pub fn abilities(&self) -> Vec<AbilityId> {
        let mut abilities = vec![self.ability()];
        if self.passive_enabled && self.passive != AbilityId::None {
            abilities.push(self.passive);
        }
        abilities
    }

    // --- Status ---

    /// Type-based immunities and the one-status rule.
    pub fn can_set_status(&self, status: StatusEffect) -> bool {
        if self.status.is_some() || self.is_fainted() {
            return false;
        }
        match status {
            StatusEffect::Paralysis => !self.has_type(PokemonType::Electric),
            StatusEffect::Burn => !self.has_type(PokemonType::Fire),
            StatusEffect::Freeze => !self.has_type(PokemonType::Ice),
            StatusEffect::Poison | StatusEffect::Toxic => {
                !self.has_type(PokemonType::Poison) && !self.has_type(PokemonType::Steel)
            }
            StatusEffect::Sleep => true,
        }
    }

    /// Returns false if the status was rejected.
    pub fn set_status(&mut self, status: StatusEffect, turns: u8) -> bool {
        if !self.can_set_status(status) {
            return false;
        }
        self.status = Some(StatusCondition {
            effect: status,
            turns,
        });
        true
    }

    pub fn cure_status(&mut self) -> Option<StatusEffect> {
        self.status.take().map(|status| status.effect)
    }

    pub fn has_status(&self, status: StatusEffect) -> bool {
        self.status.map(|s| s.effect == status).unwrap_or(false)
    }

    // --- Battler tags ---

    /// Returns false if a tag of this type is already present.
    pub fn add_tag(&mut self, tag: BattlerTag) -> bool {
        if self.has_tag(tag.tag_type) {
            return false;
        }
        self.summon_data.tags.push(tag);
        true
    }

    pub fn get_tag(&self, tag_type: BattlerTagType) -> Option<&BattlerTag> {
        self.summon_data
            .tags
            .iter()
            .find(|tag| tag.tag_type == tag_type)
    }

    pub fn get_tag_mut(&mut self, tag_type: BattlerTagType) -> Option<&mut BattlerTag> {
        self.summon_data
            .tags
            .iter_mut()
            .find(|tag| tag.tag_type == tag_type)
    }

    pub fn has_tag(&self, tag_type: BattlerTagType) -> bool {
        self.get_tag(tag_type).is_some()
    }

    pub fn remove_tag(&mut self, tag_type: BattlerTagType) -> Option<BattlerTag> {
        let position = self
            .summon_data
            .tags
            .iter()
            .position(|tag| tag.tag_type == tag_type)?;
        Some(self.summon_data.tags.remove(position))
    }

    /// Count a tag down once for this lapse point. Expired tags are removed.
    pub fn lapse_tag(
        &mut self,
        tag_type: BattlerTagType,
        lapse_type: BattlerTagLapseType,
        turn: u32,
    ) -> TagLapse {
        let result = match self.get_tag_mut(tag_type) {
            Some(tag) => tag.lapse(lapse_type, turn),
            None => return TagLapse::Missing,
        };
        if result == TagLapse::Expired {
            self.remove_tag(tag_type);
        }
        result
    }

    pub fn is_semi_invulnerable(&self) -> Option<BattlerTagType> {
        self.summon_data
            .tags
            .iter()
            .map(|tag| tag.tag_type)
            .find(|tag_type| tag_type.is_semi_invulnerable())
    }

    // --- Held items ---

    /// Stacks of an enabled item; 0 when absent or disabled.
    pub fn item_count(&self, id: HeldItemId) -> u8 {
        self.held_items
            .iter()
            .filter(|item| item.id == id && item.enabled)
            .map(|item| item.stack_count)
            .sum()
    }

    pub fn give_item(&mut self, id: HeldItemId, stacks: u8, max_stack: u8) {
        match self.held_items.iter_mut().find(|item| item.id == id) {
            Some(item) => item.stack_count = (item.stack_count + stacks).min(max_stack),
            None => self.held_items.push(HeldItem::new(id, stacks.min(max_stack))),
        }
    }

    /// Remove one stack. Returns false if there was nothing to consume.
    pub fn consume_item(&mut self, id: HeldItemId) -> bool {
        let Some(position) = self.held_items.iter().position(|item| item.id == id) else {
            return false;
        };
        let item = &mut self.held_items[position];
        item.stack_count = item.stack_count.saturating_sub(1);
        if item.stack_count == 0 {
            self.held_items.remove(position);
        }
        self.item_lost = true;
        true
    }

    // --- Moves ---

    pub fn move_slot(&self, slot: usize) -> Option<&PokemonMove> {
        self.moveset.get(slot)
    }

    pub fn has_usable_move(&self) -> bool {
        self.moveset.iter().any(|m| m.pp > 0 && !m.disabled)
    }

    pub fn push_move_history(&mut self, entry: TurnMove) {
        self.move_history.push_back(entry);
        while self.move_history.len() > MOVE_HISTORY_LIMIT {
            self.move_history.pop_front();
        }
    }

    pub fn last_move(&self) -> Option<&TurnMove> {
        self.move_history.back()
    }

    // --- Lifecycle ---

    /// Called when the Pokemon leaves the field or a new battle starts.
    pub fn reset_summon_data(&mut self) {
        self.summon_data = SummonData::default();
    }

    pub fn reset_turn_data(&mut self) {
        let failed_last_move = self.turn_data.failed_last_move;
        self.turn_data = TurnData {
            failed_last_move,
            ..TurnData::default()
        };
    }

    /// Swap to another form's base stats and types, keeping damage taken.
    pub fn apply_form(&mut self, form_index: u8, stats: [u16; 6], types: Vec<PokemonType>) {
        let damage = self.max_hp() - self.hp;
        self.form_index = form_index;
        self.stats = stats;
        self.base_types = types;
        self.hp = self.max_hp().saturating_sub(damage).max(1);
    }

    /// Full restore between runs or by the session.
    pub fn restore(&mut self) {
        self.hp = self.max_hp();
        self.status = None;
        for slot in &mut self.moveset {
            slot.pp = slot.max_pp;
        }
    }
}

/// A party member as a run or a replay describes it, before ids are assigned.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PokemonSpec {
    pub species: SpeciesId,
    pub level: u8,
    pub moves: Vec<MoveId>,
    #[serde(default)]
    pub ability: Option<AbilityId>,
    #[serde(default)]
    pub held_items: Vec<(HeldItemId, u8)>,
}

impl PokemonSpec {
    pub fn new(species: SpeciesId, level: u8, moves: Vec<MoveId>) -> Self {
        Self {
            species,
            level,
            moves,
            ability: None,
            held_items: Vec::new(),
        }
    }

    pub fn with_ability(mut self, ability: AbilityId) -> Self {
        self.ability = Some(ability);
        self
    }

    pub fn with_item(mut self, item: HeldItemId, stacks: u8) -> Self {
        self.held_items.push((item, stacks));
        self
    }

    pub fn build(&self, id: PokemonId, data: &GameData) -> BattleResult<Pokemon> {
        let species = data.species(self.species)?;
        let mut pokemon = Pokemon::new(id, species, self.level, &self.moves, data)?;
        if let Some(ability) = self.ability {
            pokemon.ability = ability;
        }
        for (item, stacks) in &self.held_items {
            let max_stack = data.item(*item)?.max_stack;
            pokemon.give_item(*item, *stacks, max_stack);
        }
        Ok(pokemon)
    }
}

/// Build a party with consecutive ids starting at `first_id`.
pub fn build_party(specs: &[PokemonSpec], first_id: u32, data: &GameData) -> BattleResult<Vec<Pokemon>> {
    specs
        .iter()
        .enumerate()
        .map(|(offset, spec)| spec.build(PokemonId(first_id + offset as u32), data))
        .collect()
}

/// Stage multiplier for the five main stats: max(2, 2+s) / max(2, 2-s).
pub fn stat_stage_multiplier(stage: i8) -> f64 {
    let stage = stage.clamp(MIN_STAT_STAGE, MAX_STAT_STAGE) as f64;
    (2.0 + stage).max(2.0) / (2.0 - stage).max(2.0)
}

/// Accuracy/evasion multiplier: (3 + max(0, s)) / (3 + max(0, -s)).
pub fn accuracy_stage_multiplier(stage: i8) -> f64 {
    let stage = stage.clamp(MIN_STAT_STAGE, MAX_STAT_STAGE) as f64;
    (3.0 + stage.max(0.0)) / (3.0 + (-stage).max(0.0))
}
