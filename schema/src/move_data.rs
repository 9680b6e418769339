use crate::battle_data::{
    ArenaTagType, BattleStat, BattlerTagType, StatusEffect, TerrainType, WeatherType,
};
use crate::pokemon_types::PokemonType;
use crate::EffectKindSet;
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr)]
pub enum MoveId {
    // Normal
    Tackle,
    QuickAttack,
    ExtremeSpeed,
    BodySlam,
    DoubleEdge,
    Struggle,
    Splash,
    FakeOut,
    PopulationBomb,
    ChipAway,
    SecretPower,
    WeatherBall,
    TerrainPulse,
    HyperBeam,
    SuperFang,
    Bind,
    Growl,
    Screech,
    SwordsDance,
    FocusEnergy,
    LaserFocus,
    Protect,
    Endure,
    Recover,
    Roar,
    Substitute,
    PerishSong,
    Safeguard,
    Mist,
    LuckyChant,
    QuickGuard,
    WideGuard,
    // Electric
    Thunderbolt,
    Thunder,
    ThunderWave,
    ElectricTerrain,
    // Fire
    Flamethrower,
    HeatWave,
    WillOWisp,
    FirePledge,
    SunnyDay,
    // Water
    Surf,
    WaterGun,
    WaterPledge,
    RainDance,
    WaterSport,
    // Grass
    GigaDrain,
    GrassPledge,
    SleepPowder,
    LeechSeed,
    SolarBeam,
    BulletSeed,
    Synthesis,
    GrassyTerrain,
    // Ice
    IceBeam,
    Blizzard,
    FreezeDry,
    IcicleSpear,
    Hail,
    Snowscape,
    // Ground
    Earthquake,
    Dig,
    Fissure,
    Spikes,
    MudSport,
    // Rock
    RockSlide,
    RockBlast,
    SmackDown,
    StealthRock,
    Sandstorm,
    // Fighting
    BrickBreak,
    DoubleKick,
    CloseCombat,
    DrainPunch,
    SeismicToss,
    // Psychic
    Psychic,
    Reflect,
    LightScreen,
    TrickRoom,
    Gravity,
    Rest,
    PsychicTerrain,
    MagicCoat,
    FutureSight,
    // Steel
    DoomDesire,
    // Ghost
    NightShade,
    ConfuseRay,
    Nightmare,
    // Dark
    Crunch,
    // Flying
    Fly,
    Hurricane,
    Defog,
    Tailwind,
    // Dragon
    DragonRage,
    DragonTail,
    DragonDance,
    // Poison
    Toxic,
    ToxicSpikes,
    // Bug
    StickyWeb,
    // Fairy
    MistyTerrain,
    Yawn,
    AuroraVeil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

/// Which combatants (or which part of the field) a move is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveTarget {
    User,
    Ally,
    NearOther,
    NearEnemy,
    RandomNearEnemy,
    AllNearEnemies,
    AllNearOthers,
    UserSide,
    EnemySide,
    BothSides,
}

impl MoveTarget {
    /// Spread moves lose power when they connect with more than one target.
    pub fn is_spread(self) -> bool {
        matches!(self, MoveTarget::AllNearEnemies | MoveTarget::AllNearOthers)
    }

    /// Field-directed moves skip the accuracy check entirely.
    pub fn is_field(self) -> bool {
        matches!(
            self,
            MoveTarget::User | MoveTarget::UserSide | MoveTarget::EnemySide | MoveTarget::BothSides
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveFlag {
    MakesContact,
    IgnoreProtect,
    IgnoreSubstitute,
    Sound,
    Punch,
    Powder,
    RespectTypeImmunity,
    /// Bounced back by Magic Coat and Magic Bounce.
    Reflectable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectTarget {
    User,
    Target,
}

/// Side of the field an arena effect lands on, relative to the move's user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectSide {
    User,
    Target,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiHitType {
    Two,
    Three,
    TwoToFive,
    Ten,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(MoveEffectKind), derive(Hash, EnumIter, IntoStaticStr))]
pub enum MoveEffect {
    // --- Damage shaping ---
    FixedDamage(u16),
    LevelDamage,
    HalveHp,
    OneHitKo,
    MultiHit(MultiHitType),
    CheckEveryHit,
    HighCrit,
    AlwaysCrit,
    IgnoreStatStages,
    SuperEffectiveVs(PokemonType),
    WeatherPower,
    TerrainPower,
    BiomeSecondary,
    HitsSemiInvulnerable {
        tag: BattlerTagType,
        double_damage: bool,
    },
    AlwaysHitsInWeather(Vec<WeatherType>),
    Pledge,

    // --- Applied after damage ---
    Recoil(u8),
    StruggleRecoil,
    Drain(u8),
    BreaksScreens,

    // --- Secondary effects ---
    Status {
        target: EffectTarget,
        status: StatusEffect,
        chance: u8,
    },
    StatChange {
        target: EffectTarget,
        stat: BattleStat,
        delta: i8,
        chance: u8,
    },
    Flinch(u8),
    Confuse(u8),
    AddTag {
        target: EffectTarget,
        tag: BattlerTagType,
        chance: u8,
    },

    // --- Field ---
    AddArenaTag {
        tag: ArenaTagType,
        side: EffectSide,
    },
    RemoveArenaTags {
        tags: Vec<ArenaTagType>,
        side: EffectSide,
    },
    SetWeather(WeatherType),
    SetTerrain(TerrainType),

    // --- Special ---
    Charge {
        tag: Option<BattlerTagType>,
        instant_in_sun: bool,
    },
    Recharge,
    Protect,
    Endure,
    Heal(u8),
    WeatherHeal,
    Rest,
    ForceSwitch,
    Substitute,
    FirstTurnOnly,
    /// Damage is locked in on use and lands on the target's position two turns later.
    DelayedAttack,
}

impl MoveEffect {
    pub fn kind(&self) -> MoveEffectKind {
        MoveEffectKind::from(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveData {
    pub id: MoveId,
    pub name: String,
    pub move_type: PokemonType,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: Option<u16>,
    /// `None` means the move never misses.
    #[serde(default)]
    pub accuracy: Option<u8>,
    pub pp: u8,
    #[serde(default)]
    pub priority: i8,
    pub target: MoveTarget,
    #[serde(default)]
    pub flags: Vec<MoveFlag>,
    #[serde(default)]
    pub effects: Vec<MoveEffect>,
    #[serde(skip)]
    effect_kinds: EffectKindSet,
}

impl MoveData {
    /// Rebuild the effect-kind index. Called once by the data loader.
    pub fn index_effects(&mut self) {
        let mut kinds = EffectKindSet::default();
        for effect in &self.effects {
            kinds.insert(effect.kind() as usize);
        }
        self.effect_kinds = kinds;
    }

    pub fn has_effect(&self, kind: MoveEffectKind) -> bool {
        self.effect_kinds.contains(kind as usize)
    }

    /// First effect of the given kind, if the move has one.
    pub fn effect(&self, kind: MoveEffectKind) -> Option<&MoveEffect> {
        if !self.has_effect(kind) {
            return None;
        }
        self.effects.iter().find(|effect| effect.kind() == kind)
    }

    pub fn has_flag(&self, flag: MoveFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_damaging(&self) -> bool {
        self.category != MoveCategory::Status
    }

    /// Fixed-damage moves skip the stat, type and crit pipeline.
    pub fn is_fixed_damage(&self) -> bool {
        self.has_effect(MoveEffectKind::FixedDamage)
            || self.has_effect(MoveEffectKind::LevelDamage)
            || self.has_effect(MoveEffectKind::HalveHp)
    }
}
