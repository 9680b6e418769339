use crate::battle::abilities;
use crate::battle::commands::BattleCommand;
use crate::battle::events::DamageSource;
use crate::battle::state::{BattleState, BattlerIndex};
use crate::battle::stats::{is_grounded, speed_order};
use crate::data::GameData;
use crate::errors::BattleResult;
use schema::{PokemonType, TerrainType, WeatherType};

// --- Weather ---

/// Power multiplier from the current weather on a move of `move_type`.
pub fn weather_multiplier(state: &BattleState, move_type: PokemonType) -> f64 {
    match (state.arena.weather_type(), move_type) {
        (Some(weather), PokemonType::Water) if weather.is_rain() => 1.5,
        (Some(weather), PokemonType::Fire) if weather.is_rain() => 0.5,
        (Some(weather), PokemonType::Fire) if weather.is_sun() => 1.5,
        (Some(weather), PokemonType::Water) if weather.is_sun() => 0.5,
        _ => 1.0,
    }
}

/// Heavy rain evaporates Fire moves; harsh sun evaporates Water moves.
pub fn weather_cancels_move(state: &BattleState, move_type: PokemonType) -> bool {
    matches!(
        (state.arena.weather_type(), move_type),
        (Some(WeatherType::HeavyRain), PokemonType::Fire)
            | (Some(WeatherType::HarshSun), PokemonType::Water)
    )
}

fn immune_to_weather(types: &[PokemonType], weather: WeatherType) -> bool {
    match weather {
        WeatherType::Sandstorm => types
            .iter()
            .any(|t| matches!(t, PokemonType::Rock | PokemonType::Ground | PokemonType::Steel)),
        WeatherType::Hail => types.contains(&PokemonType::Ice),
        _ => true,
    }
}

/// Sandstorm and hail chip damage for every active battler, fastest first.
pub fn weather_damage_commands(state: &BattleState, data: &GameData) -> BattleResult<Vec<BattleCommand>> {
    let mut commands = Vec::new();
    let Some(weather) = state.arena.weather_type() else {
        return Ok(commands);
    };
    if !matches!(weather, WeatherType::Sandstorm | WeatherType::Hail) {
        return Ok(commands);
    }
    for index in speed_order(state, data, &state.active_indices())? {
        let pokemon = state.active(index)?;
        if immune_to_weather(pokemon.types(), weather)
            || pokemon.is_semi_invulnerable().is_some()
            || abilities::blocks_indirect_damage(state, data, index)?
        {
            continue;
        }
        commands.push(BattleCommand::DealIndirectDamage {
            target: index,
            amount: pokemon.max_hp_fraction(1, 16),
            source: DamageSource::Weather(weather),
        });
    }
    Ok(commands)
}

/// Weather Ball's type under the current weather.
pub fn weather_ball_type(state: &BattleState) -> Option<PokemonType> {
    let weather = state.arena.weather_type()?;
    let move_type = if weather.is_sun() {
        PokemonType::Fire
    } else if weather.is_rain() {
        PokemonType::Water
    } else {
        match weather {
            WeatherType::Sandstorm => PokemonType::Rock,
            WeatherType::Hail | WeatherType::Snow => PokemonType::Ice,
            _ => return None,
        }
    };
    Some(move_type)
}

// --- Terrain ---

/// The terrain's effect on a grounded user's move power, and on moves
/// landing on a grounded target.
pub fn terrain_multiplier(
    state: &BattleState,
    data: &GameData,
    attacker: BattlerIndex,
    defender: BattlerIndex,
    move_type: PokemonType,
) -> BattleResult<f64> {
    let Some(terrain) = state.arena.terrain_type() else {
        return Ok(1.0);
    };
    let boosted = match terrain {
        TerrainType::Electric => move_type == PokemonType::Electric,
        TerrainType::Grassy => move_type == PokemonType::Grass,
        TerrainType::Psychic => move_type == PokemonType::Psychic,
        TerrainType::Misty => false,
    };
    if boosted && is_grounded(state, data, attacker)? {
        return Ok(1.3);
    }
    if terrain == TerrainType::Misty
        && move_type == PokemonType::Dragon
        && is_grounded(state, data, defender)?
    {
        return Ok(0.5);
    }
    Ok(1.0)
}

/// Psychic terrain shields grounded targets from opposing priority moves.
pub fn terrain_blocks_priority(
    state: &BattleState,
    data: &GameData,
    user: BattlerIndex,
    target: BattlerIndex,
    priority: i8,
) -> BattleResult<bool> {
    Ok(state.arena.terrain_type() == Some(TerrainType::Psychic)
        && priority > 0
        && user.side() != target.side()
        && is_grounded(state, data, target)?)
}

/// Grassy terrain heal at turn end.
pub fn terrain_heal_commands(
    state: &BattleState,
    data: &GameData,
    index: BattlerIndex,
) -> BattleResult<Vec<BattleCommand>> {
    let pokemon = state.active(index)?;
    if state.arena.terrain_type() != Some(TerrainType::Grassy)
        || pokemon.is_fainted()
        || pokemon.is_full_hp()
        || !is_grounded(state, data, index)?
    {
        return Ok(Vec::new());
    }
    Ok(vec![BattleCommand::Heal {
        target: index,
        amount: pokemon.max_hp_fraction(1, 16),
    }])
}

/// Terrain Pulse's type under the current terrain.
pub fn terrain_pulse_type(state: &BattleState) -> Option<PokemonType> {
    state.arena.terrain_type().map(|terrain| match terrain {
        TerrainType::Electric => PokemonType::Electric,
        TerrainType::Grassy => PokemonType::Grass,
        TerrainType::Psychic => PokemonType::Psychic,
        TerrainType::Misty => PokemonType::Fairy,
    })
}
