use crate::battle_data::{BattleStat, Stat, StatusEffect, TerrainType, WeatherType};
use crate::pokemon_types::PokemonType;
use crate::EffectKindSet;
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr)]
pub enum AbilityId {
    None,
    Drizzle,
    Drought,
    SandStream,
    SnowWarning,
    ElectricSurge,
    GrassySurge,
    PsychicSurge,
    MistySurge,
    NeutralizingGas,
    SlowStart,
    Intimidate,
    Levitate,
    SkillLink,
    NoGuard,
    CompoundEyes,
    Hustle,
    Sturdy,
    MagicGuard,
    Infiltrator,
    MoldBreaker,
    Limber,
    Insomnia,
    Immunity,
    WaterVeil,
    ClearBody,
    Multiscale,
    Filter,
    SolidRock,
    ThickFat,
    TintedLens,
    Adaptability,
    SwiftSwim,
    Chlorophyll,
    SandRush,
    HugePower,
    Guts,
    Sniper,
    SuperLuck,
    SpeedBoost,
    ParentalBond,
    VoltAbsorb,
    WaterAbsorb,
    FlashFire,
    Unburden,
    MirrorArmor,
    Scrappy,
    BattleArmor,
    RainDish,
    Protean,
    Libero,
    MagicBounce,
    WimpOut,
    EmergencyExit,
}

/// Situations that gate a conditional ability modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityCondition {
    Always,
    Weather(Vec<WeatherType>),
    HasStatus,
    ItemLost,
    FullHp,
    SuperEffective,
    NotVeryEffective,
    PhysicalMove,
}

/// What happens when a move of an absorbed type hits the holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImmunityAbsorb {
    Nothing,
    HealPercent(u8),
    FireBoost,
}

/// The moment an ability effect is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityTrigger {
    PostSummon,
    TurnEnd,
    /// Queried inline while stats, accuracy or damage are computed.
    Passive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(AbilityEffectKind), derive(Hash, EnumIter, IntoStaticStr))]
pub enum AbilityEffect {
    // --- On entering the field ---
    SummonWeather(WeatherType),
    SummonTerrain(TerrainType),
    SuppressAbilities,
    SlowStart(u8),
    SummonStatChange {
        stat: BattleStat,
        delta: i8,
    },

    // --- Turn end ---
    TurnEndStatChange {
        stat: BattleStat,
        delta: i8,
    },
    WeatherHeal {
        weather: Vec<WeatherType>,
        sixteenths: u8,
    },

    // --- Passive modifiers ---
    StatMultiplier {
        stat: Stat,
        percent: u16,
        condition: AbilityCondition,
    },
    AccuracyMultiplier {
        percent: u16,
        condition: AbilityCondition,
    },
    TypeImmunity {
        move_type: PokemonType,
        absorb: ImmunityAbsorb,
    },
    Levitate,
    StatusImmunity(Vec<StatusEffect>),
    MaxMultiHit,
    AlwaysHit,
    Sturdy,
    BlockIndirectDamage,
    IgnoreScreens,
    IgnoreAbilities,
    BlockStatDrops,
    ReflectStatDrops,
    ReceivedDamageMultiplier {
        percent: u16,
        condition: AbilityCondition,
    },
    ReceivedTypeMultiplier {
        types: Vec<PokemonType>,
        percent: u16,
    },
    DealtDamageMultiplier {
        percent: u16,
        condition: AbilityCondition,
    },
    StabBoost(u16),
    CritMultiplier(u16),
    CritStage(u8),
    BlockCrits,
    SecondStrike(u8),
    IgnoreTypeImmunity {
        move_types: Vec<PokemonType>,
        defender_type: PokemonType,
    },
    BypassBurnReduction,

    // --- Move reactions ---
    /// The holder turns into the type of the move it is about to use.
    TypeChangeOnMove,
    /// Single-target status moves aimed at the holder bounce back.
    ReflectStatusMoves,
    /// The holder leaves the field when a hit drops it to half HP or below.
    EmergencyExit,
}

impl AbilityEffect {
    pub fn kind(&self) -> AbilityEffectKind {
        AbilityEffectKind::from(self)
    }

    pub fn trigger(&self) -> AbilityTrigger {
        match self {
            AbilityEffect::SummonWeather(_)
            | AbilityEffect::SummonTerrain(_)
            | AbilityEffect::SuppressAbilities
            | AbilityEffect::SlowStart(_)
            | AbilityEffect::SummonStatChange { .. } => AbilityTrigger::PostSummon,
            AbilityEffect::TurnEndStatChange { .. } | AbilityEffect::WeatherHeal { .. } => {
                AbilityTrigger::TurnEnd
            }
            _ => AbilityTrigger::Passive,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityData {
    pub id: AbilityId,
    pub name: String,
    #[serde(default)]
    pub effects: Vec<AbilityEffect>,
    /// Higher tiers activate before lower tiers regardless of speed.
    #[serde(default)]
    pub priority: i8,
    /// Mold Breaker style attackers ignore breakable abilities.
    #[serde(default)]
    pub breakable: bool,
    #[serde(skip)]
    effect_kinds: EffectKindSet,
}

impl AbilityData {
    pub fn index_effects(&mut self) {
        let mut kinds = EffectKindSet::default();
        for effect in &self.effects {
            kinds.insert(effect.kind() as usize);
        }
        self.effect_kinds = kinds;
    }

    pub fn has_effect(&self, kind: AbilityEffectKind) -> bool {
        self.effect_kinds.contains(kind as usize)
    }

    pub fn effects_of(&self, kind: AbilityEffectKind) -> impl Iterator<Item = &AbilityEffect> {
        let present = self.has_effect(kind);
        self.effects
            .iter()
            .filter(move |effect| present && effect.kind() == kind)
    }

    pub fn has_trigger(&self, trigger: AbilityTrigger) -> bool {
        self.effects.iter().any(|effect| effect.trigger() == trigger)
    }
}
