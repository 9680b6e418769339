use crate::errors::{BattleResult, DataError};
use schema::{BattleStyle, BattleType, BiomeId, TerrainType, WeatherType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Per-battle settings. Every field has a default so partial RON files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Seed for the battle RNG. Daily runs share a seed.
    pub seed: u64,
    pub style: BattleStyle,
    pub battle_type: BattleType,
    pub wave: u32,
    pub biome: BiomeId,
    /// Number of HP bar segments on a boss encounter.
    pub boss_segments: u8,
    /// Yield to the caller after every phase that emitted events.
    pub pause_for_animations: bool,
    pub overrides: BattleOverrides,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            style: BattleStyle::Single,
            battle_type: BattleType::Wild,
            wave: 1,
            biome: BiomeId::Town,
            boss_segments: 1,
            pause_for_animations: false,
            overrides: BattleOverrides::default(),
        }
    }
}

/// Knobs that pin otherwise random outcomes. Tests and debug runs use these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleOverrides {
    /// `Some(false)` disables crits, `Some(true)` forces them.
    pub critical_hits: Option<bool>,
    pub always_hit: bool,
    /// Fixed damage roll in 85..=100.
    pub damage_roll: Option<u8>,
    /// Forces paralysis / confusion / sleep-style activation checks.
    pub status_activation: Option<bool>,
    pub multi_hit_count: Option<u8>,
    pub starting_weather: Option<WeatherType>,
    pub starting_terrain: Option<TerrainType>,
}

impl BattleConfig {
    pub fn from_ron(source: &str) -> BattleResult<Self> {
        ron::from_str(source).map_err(|err| {
            DataError::Malformed {
                table: "config",
                details: err.to_string(),
            }
            .into()
        })
    }

    pub fn load(path: &Path) -> BattleResult<Self> {
        let source = fs::read_to_string(path).map_err(|err| DataError::Malformed {
            table: "config",
            details: format!("{}: {}", path.display(), err),
        })?;
        Self::from_ron(&source)
    }

    pub fn is_double(&self) -> bool {
        self.style == BattleStyle::Double
    }
}
