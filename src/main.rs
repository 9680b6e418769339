use rogue_battle::{
    build_party, AwaitingInput, BattleConfig, BattleEngine, BattleEvent, BattleOutcome, BattleResult,
    BattleType, BattlerIndex, Behavior, GameData, KeyLocalizer, Localizer, MoveId, PokemonSpec,
    ScoringAi, Side, SpeciesId,
};
use std::path::Path;
use std::sync::Arc;

const WAVES: u32 = 3;
const TURN_LIMIT: u32 = 50;

fn player_party() -> Vec<PokemonSpec> {
    vec![
        PokemonSpec::new(
            SpeciesId::Pikachu,
            30,
            vec![MoveId::Thunderbolt, MoveId::QuickAttack, MoveId::ThunderWave],
        ),
        PokemonSpec::new(SpeciesId::Machamp, 30, vec![MoveId::BrickBreak, MoveId::SeismicToss]),
        PokemonSpec::new(SpeciesId::Snorlax, 30, vec![MoveId::Tackle, MoveId::Crunch]),
    ]
}

fn enemy_party(wave: u32) -> Vec<PokemonSpec> {
    let level = 24 + wave as u8 * 3;
    match wave {
        1 => vec![PokemonSpec::new(SpeciesId::Rattata, level, vec![MoveId::Tackle, MoveId::QuickAttack])],
        2 => vec![
            PokemonSpec::new(SpeciesId::Gyarados, level, vec![MoveId::Crunch, MoveId::Tackle]),
            PokemonSpec::new(SpeciesId::Pelipper, level, vec![MoveId::Tackle]),
        ],
        _ => vec![PokemonSpec::new(SpeciesId::Regigigas, level, vec![MoveId::Tackle, MoveId::Crunch])],
    }
}

fn print_events(engine: &mut BattleEngine, localizer: &dyn Localizer) {
    for event in engine.take_events() {
        if let Some(message) = event.message() {
            println!("  {}", localizer.localize(&message));
        }
        if let BattleEvent::TurnEnded { turn } = event {
            println!("-- end of turn {} --", turn);
        }
    }
}

/// Both sides are played by the scoring AI. Returns the battle outcome.
fn fight(engine: &mut BattleEngine, localizer: &dyn Localizer) -> BattleResult<BattleOutcome> {
    let pilot = ScoringAi::new();
    let mut input = engine.run_until_input()?;
    loop {
        print_events(engine, localizer);
        input = match input {
            AwaitingInput::BattleOver(outcome) => return Ok(outcome),
            AwaitingInput::Animation => engine.run_until_input()?,
            AwaitingInput::Commands => {
                if engine.state().turn >= TURN_LIMIT {
                    println!("Turn limit reached; forfeiting.");
                    engine.play_turn(vec![(BattlerIndex::Player, rogue_battle::PlayerAction::Forfeit)])?
                } else {
                    let mut commands = Vec::new();
                    for index in engine.awaiting_commands() {
                        commands.push((index, pilot.decide_action(engine.state(), engine.data(), index)?));
                    }
                    engine.play_turn(commands)?
                }
            }
            AwaitingInput::Replacement(index) => {
                match pilot.choose_replacement(engine.state(), engine.data(), index)? {
                    Some(party_slot) => {
                        engine.submit_replacement(index, party_slot)?;
                        engine.run_until_input()?
                    }
                    None => engine.run_until_input()?,
                }
            }
        };
    }
}

fn run() -> BattleResult<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => BattleConfig::load(Path::new(&path))?,
        None => BattleConfig {
            seed: 20240601,
            ..BattleConfig::default()
        },
    };
    let data = Arc::new(GameData::embedded()?);
    let localizer = KeyLocalizer;

    println!("Seed {}, {:?} battles", config.seed, config.style);
    let player = build_party(&player_party(), 1, &data)?;
    let enemy = build_party(&enemy_party(1), 101, &data)?;
    let mut engine = BattleEngine::new(config, Arc::clone(&data), player, enemy);

    for wave in 1..=WAVES {
        if wave > 1 {
            let battle_type = if wave == WAVES { BattleType::Boss } else { BattleType::Trainer };
            let enemy = build_party(&enemy_party(wave), 100 * wave + 1, &data)?;
            engine.start_next_battle(wave, battle_type, enemy);
        }
        println!("=== Wave {} ===", wave);
        let outcome = fight(&mut engine, &localizer)?;
        println!("Wave {} result: {:?} after {} turns", wave, outcome, engine.state().turn);
        if outcome != BattleOutcome::PlayerVictory {
            break;
        }
        for pokemon in &engine.state().side(Side::Player).party {
            println!(
                "  {} Lv.{} {}/{} HP",
                pokemon.name,
                pokemon.level,
                pokemon.current_hp(),
                pokemon.max_hp()
            );
        }
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
