use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumCount, EnumIter, IntoStaticStr};

/// The six permanent stats of a Pokemon.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount,
)]
pub enum Stat {
    Hp,
    Attack,
    Defense,
    SpAttack,
    SpDefense,
    Speed,
}

impl Stat {
    pub fn index(self) -> usize {
        self as usize
    }

    /// The stage-carrying counterpart of this stat. HP has none.
    pub fn battle_stat(self) -> Option<BattleStat> {
        match self {
            Stat::Hp => None,
            Stat::Attack => Some(BattleStat::Attack),
            Stat::Defense => Some(BattleStat::Defense),
            Stat::SpAttack => Some(BattleStat::SpAttack),
            Stat::SpDefense => Some(BattleStat::SpDefense),
            Stat::Speed => Some(BattleStat::Speed),
        }
    }
}

/// Stats that can carry an in-battle stage modifier.
#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
pub enum BattleStat {
    Attack,
    Defense,
    SpAttack,
    SpDefense,
    Speed,
    Accuracy,
    Evasion,
}

impl BattleStat {
    pub fn index(self) -> usize {
        self as usize
    }

    /// The permanent stat backing this battle stat, if any.
    pub fn base_stat(self) -> Option<Stat> {
        match self {
            BattleStat::Attack => Some(Stat::Attack),
            BattleStat::Defense => Some(Stat::Defense),
            BattleStat::SpAttack => Some(Stat::SpAttack),
            BattleStat::SpDefense => Some(Stat::SpDefense),
            BattleStat::Speed => Some(Stat::Speed),
            BattleStat::Accuracy | BattleStat::Evasion => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum StatusEffect {
    Poison,
    Toxic,
    Paralysis,
    Sleep,
    Freeze,
    Burn,
}

impl fmt::Display for StatusEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr,
)]
pub enum WeatherType {
    Sunny,
    Rain,
    Sandstorm,
    Hail,
    Snow,
    Fog,
    HeavyRain,
    HarshSun,
    StrongWinds,
}

impl WeatherType {
    /// Primal weathers last until replaced by another primal weather.
    pub fn is_primal(self) -> bool {
        matches!(
            self,
            WeatherType::HeavyRain | WeatherType::HarshSun | WeatherType::StrongWinds
        )
    }

    pub fn is_rain(self) -> bool {
        matches!(self, WeatherType::Rain | WeatherType::HeavyRain)
    }

    pub fn is_sun(self) -> bool {
        matches!(self, WeatherType::Sunny | WeatherType::HarshSun)
    }
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr,
)]
pub enum TerrainType {
    Electric,
    Grassy,
    Psychic,
    Misty,
}

/// Side-scoped and field-wide effects owned by the arena.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr,
)]
pub enum ArenaTagType {
    Spikes,
    ToxicSpikes,
    StealthRock,
    StickyWeb,
    Reflect,
    LightScreen,
    AuroraVeil,
    TrickRoom,
    Gravity,
    Tailwind,
    Mist,
    Safeguard,
    LuckyChant,
    MudSport,
    WaterSport,
    FireGrassPledge,
    WaterFirePledge,
    GrassWaterPledge,
    QuickGuard,
    WideGuard,
    NeutralizingGas,
    /// A Future Sight style hit waiting to land on one position.
    DelayedAttack,
}

impl ArenaTagType {
    pub fn max_layers(self) -> u8 {
        match self {
            ArenaTagType::Spikes => 3,
            ArenaTagType::ToxicSpikes => 2,
            _ => 1,
        }
    }

    pub fn is_entry_hazard(self) -> bool {
        matches!(
            self,
            ArenaTagType::Spikes
                | ArenaTagType::ToxicSpikes
                | ArenaTagType::StealthRock
                | ArenaTagType::StickyWeb
        )
    }

    pub fn is_screen(self) -> bool {
        matches!(
            self,
            ArenaTagType::Reflect | ArenaTagType::LightScreen | ArenaTagType::AuroraVeil
        )
    }

    /// Single-turn protections are never written to a save snapshot.
    pub fn is_serializable(self) -> bool {
        !matches!(self, ArenaTagType::QuickGuard | ArenaTagType::WideGuard)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoStaticStr)]
pub enum ArenaTagSide {
    #[default]
    Both,
    Player,
    Enemy,
}

#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr,
)]
pub enum BattlerTagType {
    Flinched,
    Confused,
    Seeded,
    Recharging,
    Charging,
    Protected,
    Enduring,
    Trapped,
    Substitute,
    AlwaysCrit,
    CritBoost,
    IgnoreFlying,
    SlowStart,
    Commanded,
    Flying,
    Underground,
    Drowsy,
    Nightmare,
    PerishSong,
    FireBoost,
    MagicCoat,
}

impl BattlerTagType {
    pub fn is_semi_invulnerable(self) -> bool {
        matches!(self, BattlerTagType::Flying | BattlerTagType::Underground)
    }
}

/// The points in a turn at which a battler tag is given a chance to lapse.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BattlerTagLapseType {
    PreMove,
    AfterMove,
    MoveEffect,
    TurnEnd,
    Custom,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BattleType {
    #[default]
    Wild,
    Trainer,
    Boss,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BattleStyle {
    #[default]
    Single,
    Double,
}

impl BattleStyle {
    pub fn field_size(self) -> usize {
        match self {
            BattleStyle::Single => 1,
            BattleStyle::Double => 2,
        }
    }
}

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    EnumIter,
    IntoStaticStr,
)]
pub enum BiomeId {
    #[default]
    Town,
    Plains,
    Grass,
    Forest,
    Sea,
    Beach,
    Lake,
    Mountain,
    Cave,
    Desert,
    Ice,
    Volcano,
    Graveyard,
    Space,
}

/// Result classification recorded on a combatant's move history.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MoveResult {
    #[default]
    Pending,
    Success,
    Fail,
    Miss,
    Other,
}

/// Per-target outcome of a single hit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitResult {
    Effective,
    SuperEffective,
    NotVeryEffective,
    OneHitKo,
    NoEffect,
    Immune,
    Fail,
    Miss,
    Other,
}

impl HitResult {
    pub fn dealt_damage(self) -> bool {
        matches!(
            self,
            HitResult::Effective
                | HitResult::SuperEffective
                | HitResult::NotVeryEffective
                | HitResult::OneHitKo
        )
    }
}
