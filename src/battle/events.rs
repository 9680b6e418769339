use crate::battle::state::{BattleOutcome, BattlerIndex};
use crate::errors::{BattleResult, SnapshotError};
use schema::{
    AbilityId, ArenaTagSide, ArenaTagType, BattleStat, BattleType, BattlerTagType, HeldItemId,
    MoveId, PokemonType, SpeciesId, Stat, StatusEffect, TerrainType, WeatherType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a piece of damage outside of a direct hit came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum DamageSource {
    Weather(WeatherType),
    Hazard(ArenaTagType),
    ArenaTag(ArenaTagType),
    Status(StatusEffect),
    Tag(BattlerTagType),
    Item(HeldItemId),
    Recoil,
    Confusion,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPreventionReason {
    Asleep,
    Frozen,
    Paralyzed,
    Flinched,
    Confused,
    Recharging,
    Commanded,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveFailureReason {
    NoTarget,
    NoPpRemaining,
    AlreadyHasStatus,
    AlreadyHasTag,
    NothingToChange,
    ProtectFailed,
    NotFirstTurn,
    NoReserves,
    TerrainBlocked,
    WeatherBlocked,
    /// The target's position already has a delayed attack coming.
    AttackPending,
    Generic,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatBlockReason {
    AtMaximum,
    AtMinimum,
    Mist,
    Ability(AbilityId),
    Substitute,
}

/// Every observable change the core makes. Rendering and localization
/// collaborators consume these; the core never formats user-facing text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind")]
pub enum BattleEvent {
    // Battle and turn management
    BattleStarted {
        wave: u32,
        battle_type: BattleType,
        double: bool,
    },
    TurnStarted {
        turn: u32,
    },
    TurnEnded {
        turn: u32,
    },
    BattleEnded {
        outcome: BattleOutcome,
    },

    // Field presence
    PokemonSummoned {
        battler: BattlerIndex,
        pokemon: SpeciesId,
    },
    PokemonSwitched {
        battler: BattlerIndex,
        old_pokemon: SpeciesId,
        new_pokemon: SpeciesId,
    },
    PokemonFainted {
        battler: BattlerIndex,
        pokemon: SpeciesId,
    },
    FormChanged {
        battler: BattlerIndex,
        pokemon: SpeciesId,
        form: u8,
    },

    // Moves
    MoveUsed {
        user: BattlerIndex,
        pokemon: SpeciesId,
        move_used: MoveId,
    },
    MoveCharging {
        user: BattlerIndex,
        move_used: MoveId,
    },
    MoveMissed {
        user: BattlerIndex,
        target: BattlerIndex,
        move_used: MoveId,
    },
    MoveFailed {
        user: BattlerIndex,
        move_used: MoveId,
        reason: MoveFailureReason,
    },
    MoveNoEffect {
        target: BattlerIndex,
        move_used: MoveId,
    },
    ActionPrevented {
        battler: BattlerIndex,
        reason: ActionPreventionReason,
    },
    TypeEffectiveness {
        target: BattlerIndex,
        multiplier: f64,
    },
    CriticalHit {
        target: BattlerIndex,
    },
    HitCount {
        user: BattlerIndex,
        hits: u8,
    },
    Protected {
        target: BattlerIndex,
    },
    /// `user` sent a status move back at the battler that aimed it.
    MoveReflected {
        user: BattlerIndex,
        target: BattlerIndex,
        move_used: MoveId,
    },
    DelayedAttackForeseen {
        target: BattlerIndex,
        move_used: MoveId,
    },
    DelayedAttackLanded {
        target: BattlerIndex,
        move_used: MoveId,
    },
    Endured {
        target: BattlerIndex,
    },

    // HP
    DamageDealt {
        target: BattlerIndex,
        damage: u16,
        remaining_hp: u16,
    },
    IndirectDamage {
        target: BattlerIndex,
        source: DamageSource,
        damage: u16,
        remaining_hp: u16,
    },
    SubstituteDamaged {
        target: BattlerIndex,
        damage: u16,
    },
    PokemonHealed {
        target: BattlerIndex,
        amount: u16,
        new_hp: u16,
    },
    BossSegmentBroken {
        battler: BattlerIndex,
        segments_left: u8,
        boosted_stat: Stat,
    },

    // Status and volatile tags
    StatusApplied {
        target: BattlerIndex,
        status: StatusEffect,
    },
    StatusCured {
        target: BattlerIndex,
        status: StatusEffect,
    },
    BattlerTagAdded {
        target: BattlerIndex,
        tag: BattlerTagType,
    },
    BattlerTagRemoved {
        target: BattlerIndex,
        tag: BattlerTagType,
    },
    StatStageChanged {
        target: BattlerIndex,
        stat: BattleStat,
        old_stage: i8,
        new_stage: i8,
    },
    StatChangeBlocked {
        target: BattlerIndex,
        stat: BattleStat,
        reason: StatBlockReason,
    },
    TypesChanged {
        target: BattlerIndex,
        types: Vec<PokemonType>,
    },

    // Abilities and items
    AbilityActivated {
        battler: BattlerIndex,
        ability: AbilityId,
    },
    ItemActivated {
        battler: BattlerIndex,
        item: HeldItemId,
    },
    ItemConsumed {
        battler: BattlerIndex,
        item: HeldItemId,
    },

    // Arena
    ArenaTagAdded {
        tag: ArenaTagType,
        side: ArenaTagSide,
        layers: u8,
        #[serde(default)]
        at_max: bool,
    },
    ArenaTagRemoved {
        tag: ArenaTagType,
        side: ArenaTagSide,
    },
    WeatherChanged {
        old: Option<WeatherType>,
        new: Option<WeatherType>,
        /// 0 for weathers that never run out.
        turns: u8,
    },
    TerrainChanged {
        old: Option<TerrainType>,
        new: Option<TerrainType>,
        turns: u8,
    },
}

/// A localization key plus its parameters. The host turns these into text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LocalizedMessage {
    pub key: String,
    pub params: BTreeMap<String, String>,
}

impl LocalizedMessage {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }
}

/// Anything that can render a `LocalizedMessage` as text.
pub trait Localizer {
    fn localize(&self, message: &LocalizedMessage) -> String;
}

/// Renders `key{name=value, ...}`. Used by the demo binary and in logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyLocalizer;

impl Localizer for KeyLocalizer {
    fn localize(&self, message: &LocalizedMessage) -> String {
        if message.params.is_empty() {
            return message.key.clone();
        }
        let params: Vec<String> = message
            .params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        format!("{}{{{}}}", message.key, params.join(", "))
    }
}

fn name_of<T: Into<&'static str>>(value: T) -> &'static str {
    value.into()
}

impl BattleEvent {
    /// The message a player should see for this event, if any.
    /// Returns None for silent events.
    pub fn message(&self) -> Option<LocalizedMessage> {
        let message = match self {
            // === Battle and turn management ===
            BattleEvent::BattleStarted { wave, .. } => {
                LocalizedMessage::new("battle:waveStart").with("wave", wave)
            }
            BattleEvent::TurnStarted { turn } => {
                LocalizedMessage::new("battle:turnStart").with("turn", turn)
            }
            BattleEvent::TurnEnded { .. } => return None,
            BattleEvent::BattleEnded { outcome } => match outcome {
                BattleOutcome::PlayerVictory => LocalizedMessage::new("battle:victory"),
                BattleOutcome::EnemyVictory => LocalizedMessage::new("battle:defeat"),
                BattleOutcome::Draw => LocalizedMessage::new("battle:draw"),
            },

            // === Field presence ===
            BattleEvent::PokemonSummoned { pokemon, .. } => {
                LocalizedMessage::new("battle:sendOut").with("pokemon", name_of(*pokemon))
            }
            BattleEvent::PokemonSwitched {
                old_pokemon,
                new_pokemon,
                ..
            } => LocalizedMessage::new("battle:switch")
                .with("old", name_of(*old_pokemon))
                .with("new", name_of(*new_pokemon)),
            BattleEvent::PokemonFainted { pokemon, .. } => {
                LocalizedMessage::new("battle:fainted").with("pokemon", name_of(*pokemon))
            }
            BattleEvent::FormChanged { pokemon, form, .. } => {
                LocalizedMessage::new("battle:formChange")
                    .with("pokemon", name_of(*pokemon))
                    .with("form", form)
            }

            // === Moves ===
            BattleEvent::MoveUsed {
                pokemon, move_used, ..
            } => LocalizedMessage::new("battle:useMove")
                .with("pokemon", name_of(*pokemon))
                .with("move", name_of(*move_used)),
            BattleEvent::MoveCharging { move_used, .. } => {
                LocalizedMessage::new("battle:charging").with("move", name_of(*move_used))
            }
            BattleEvent::MoveMissed { .. } => LocalizedMessage::new("battle:attackMissed"),
            BattleEvent::MoveFailed { .. } => LocalizedMessage::new("battle:attackFailed"),
            BattleEvent::MoveNoEffect { .. } => LocalizedMessage::new("battle:hitResultNoEffect"),
            BattleEvent::ActionPrevented { reason, .. } => {
                LocalizedMessage::new("battle:actionPrevented").with("reason", format!("{:?}", reason))
            }
            BattleEvent::TypeEffectiveness { multiplier, .. } => {
                if *multiplier > 1.0 {
                    LocalizedMessage::new("battle:hitResultSuperEffective")
                } else if *multiplier > 0.0 && *multiplier < 1.0 {
                    LocalizedMessage::new("battle:hitResultNotVeryEffective")
                } else {
                    return None;
                }
            }
            BattleEvent::CriticalHit { .. } => LocalizedMessage::new("battle:hitResultCriticalHit"),
            BattleEvent::HitCount { hits, .. } => {
                LocalizedMessage::new("battle:attackHitsCount").with("count", hits)
            }
            BattleEvent::Protected { .. } => LocalizedMessage::new("battle:protected"),
            BattleEvent::MoveReflected { move_used, .. } => {
                LocalizedMessage::new("battle:moveReflected").with("move", name_of(*move_used))
            }
            BattleEvent::DelayedAttackForeseen { move_used, .. } => {
                LocalizedMessage::new("battle:attackForeseen").with("move", name_of(*move_used))
            }
            BattleEvent::DelayedAttackLanded { move_used, .. } => {
                LocalizedMessage::new("battle:attackLanded").with("move", name_of(*move_used))
            }
            BattleEvent::Endured { .. } => LocalizedMessage::new("battle:endured"),

            // === HP ===
            BattleEvent::DamageDealt { .. } => return None,
            BattleEvent::IndirectDamage { source, damage, .. } => {
                LocalizedMessage::new("battle:indirectDamage")
                    .with("source", format!("{:?}", source))
                    .with("damage", damage)
            }
            BattleEvent::SubstituteDamaged { .. } => {
                LocalizedMessage::new("battle:substituteDamaged")
            }
            BattleEvent::PokemonHealed { amount, .. } => {
                LocalizedMessage::new("battle:hpRestored").with("amount", amount)
            }
            BattleEvent::BossSegmentBroken { segments_left, .. } => {
                LocalizedMessage::new("battle:bossSegmentBroken").with("left", segments_left)
            }

            // === Status and tags ===
            BattleEvent::StatusApplied { status, .. } => {
                LocalizedMessage::new("statusEffect:applied").with("status", status)
            }
            BattleEvent::StatusCured { status, .. } => {
                LocalizedMessage::new("statusEffect:cured").with("status", status)
            }
            BattleEvent::BattlerTagAdded { tag, .. } => {
                LocalizedMessage::new("battlerTags:onAdd").with("tag", name_of(*tag))
            }
            BattleEvent::BattlerTagRemoved { tag, .. } => {
                LocalizedMessage::new("battlerTags:onRemove").with("tag", name_of(*tag))
            }
            BattleEvent::StatStageChanged {
                stat,
                old_stage,
                new_stage,
                ..
            } => LocalizedMessage::new(if new_stage > old_stage {
                "battle:statRose"
            } else {
                "battle:statFell"
            })
            .with("stat", name_of(*stat))
            .with("stages", (new_stage - old_stage).abs()),
            BattleEvent::StatChangeBlocked { stat, .. } => {
                LocalizedMessage::new("battle:statWontChange").with("stat", name_of(*stat))
            }
            BattleEvent::TypesChanged { types, .. } => {
                let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                LocalizedMessage::new("battle:typeChanged").with("types", types.join("/"))
            }

            // === Abilities and items ===
            BattleEvent::AbilityActivated { ability, .. } => {
                LocalizedMessage::new("ability:activated").with("ability", name_of(*ability))
            }
            BattleEvent::ItemActivated { item, .. } => {
                LocalizedMessage::new("item:activated").with("item", name_of(*item))
            }
            BattleEvent::ItemConsumed { item, .. } => {
                LocalizedMessage::new("item:consumed").with("item", name_of(*item))
            }

            // === Arena ===
            BattleEvent::ArenaTagAdded {
                tag,
                side,
                layers,
                at_max,
            } => LocalizedMessage::new(if *at_max {
                "arenaTag:atMaxLayers"
            } else {
                "arenaTag:onAdd"
            })
            .with("tag", name_of(*tag))
            .with("side", name_of(*side))
            .with("layers", layers),
            BattleEvent::ArenaTagRemoved { tag, side } => LocalizedMessage::new("arenaTag:onRemove")
                .with("tag", name_of(*tag))
                .with("side", name_of(*side)),
            BattleEvent::WeatherChanged { new, old, .. } => match (new, old) {
                (Some(weather), _) => {
                    LocalizedMessage::new("weather:start").with("weather", name_of(*weather))
                }
                (None, Some(weather)) => {
                    LocalizedMessage::new("weather:clear").with("weather", name_of(*weather))
                }
                (None, None) => return None,
            },
            BattleEvent::TerrainChanged { new, old, .. } => match (new, old) {
                (Some(terrain), _) => {
                    LocalizedMessage::new("terrain:start").with("terrain", name_of(*terrain))
                }
                (None, Some(terrain)) => {
                    LocalizedMessage::new("terrain:clear").with("terrain", name_of(*terrain))
                }
                (None, None) => return None,
            },
        };
        Some(message)
    }
}

/// Event bus for collecting and managing battle events.
///
/// ```rust,ignore
/// bus.print_debug_with_message("Turn 3:");
/// let json = bus.to_json()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    events: Vec<BattleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: BattleEvent) {
        log::debug!("event: {:?}", event);
        self.events.push(event);
    }

    pub fn events(&self) -> &[BattleEvent] {
        &self.events
    }

    /// Take every collected event, leaving the bus empty.
    pub fn drain(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Print all events in debug format with indentation.
    pub fn print_debug(&self) {
        for event in &self.events {
            println!("  {:?}", event);
        }
    }

    /// Print all events in debug format with a custom prefix message.
    pub fn print_debug_with_message(&self, message: &str) {
        println!("{}", message);
        self.print_debug();
    }

    /// Print the localized text of every event that has one.
    pub fn print_localized(&self, localizer: &dyn Localizer) {
        for message in self.events.iter().filter_map(BattleEvent::message) {
            println!("  {}", localizer.localize(&message));
        }
    }

    /// Export the collected events for a rendering collaborator.
    pub fn to_json(&self) -> BattleResult<String> {
        serde_json::to_string(&self.events)
            .map_err(|err| SnapshotError::Encode(err.to_string()).into())
    }

    /// Return true if the event bus contains no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return the number of events in the bus.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl std::fmt::Display for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for event in &self.events {
            writeln!(f, "  {:?}", event)?;
        }
        Ok(())
    }
}
