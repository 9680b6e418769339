use crate::battle_data::{Stat, WeatherType};
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, IntoStaticStr)]
pub enum HeldItemId {
    Leftovers,
    ChoiceBand,
    ChoiceSpecs,
    ChoiceScarf,
    LifeOrb,
    ScopeLens,
    WideLens,
    KingsRock,
    FocusBand,
    LightClay,
    DampRock,
    HeatRock,
    SmoothRock,
    IcyRock,
    LoadedDice,
    SitrusBerry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(HeldItemEffectKind), derive(Hash, IntoStaticStr))]
pub enum HeldItemEffect {
    /// Heals `sixteenths` of max HP per stack at turn end.
    TurnEndHeal { sixteenths: u8 },
    StatMultiplier { stat: Stat, percent: u16 },
    DamageBoostWithRecoil { percent: u16, recoil_divisor: u16 },
    CritStage(u8),
    AccuracyMultiplier(u16),
    /// Percent chance per stack.
    FlinchChance(u8),
    /// Percent chance per stack to survive a lethal hit at 1 HP.
    SurviveChance(u8),
    ExtendScreens(u8),
    ExtendWeather { weather: WeatherType, turns: u8 },
    MultiHitMinimum(u8),
    HealAtThreshold { threshold_percent: u8, heal_percent: u8 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeldItemData {
    pub id: HeldItemId,
    pub name: String,
    #[serde(default = "default_max_stack")]
    pub max_stack: u8,
    #[serde(default)]
    pub consumable: bool,
    #[serde(default)]
    pub effects: Vec<HeldItemEffect>,
}

fn default_max_stack() -> u8 {
    1
}

impl HeldItemData {
    pub fn effects_of(&self, kind: HeldItemEffectKind) -> impl Iterator<Item = &HeldItemEffect> {
        self.effects
            .iter()
            .filter(move |effect| HeldItemEffectKind::from(*effect) == kind)
    }
}
