// Plays batches of seeded games between AI actors, and reports how each actor fared.

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::sync::mpsc::channel;
use threadpool::ThreadPool;
use ticket_to_ride_mcts::actor::{Actor, MctsActor, RandomActor, SelectionPolicy};
use ticket_to_ride_mcts::evaluator::{Evaluator, ScoreEvaluator, UniformEvaluator};
use ticket_to_ride_mcts::game_state::GameConfig;
use ticket_to_ride_mcts::loader::MapData;
use ticket_to_ride_mcts::manager::{GameResult, Manager, ManagerConfig};
use ticket_to_ride_mcts::mcts::MctsConfig;

type SimulationResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MapName {
    Usa,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum ActorKind {
    Random,
    Mcts,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EvaluatorKind {
    Uniform,
    Score,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Map to play on
    #[arg(long, value_enum, default_value = "usa")]
    map: MapName,

    /// Actors, one per player (2 to 5), e.g. `mcts,random`
    #[arg(long, value_enum, value_delimiter = ',', default_value = "mcts,random")]
    players: Vec<ActorKind>,

    /// Number of games to play
    #[arg(short, long, default_value_t = 1)]
    games: u64,

    /// Seed of the first game; game `i` uses `seed + i`
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulations per search
    #[arg(long, default_value_t = 200)]
    simulations: u32,

    /// Evaluator guiding the searches
    #[arg(long, value_enum, default_value = "score")]
    evaluator: EvaluatorKind,

    /// Sample actions with this temperature instead of picking the most visited one
    #[arg(long)]
    temperature: Option<f32>,

    /// Games played in parallel
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Print the JSON action log of every game
    #[arg(long)]
    dump_log: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Settings shared by every game of the batch.
#[derive(Clone, Debug)]
struct Batch {
    map_data: &'static MapData,
    players: Vec<ActorKind>,
    simulations: u32,
    evaluator: EvaluatorKind,
    policy: SelectionPolicy,
    dump_log: bool,
}

#[derive(Default)]
struct ActorSummary {
    games: u64,
    wins: u64,
    total_score: i64,
}

fn build_actors(batch: &Batch, seed: u64) -> SimulationResult<Vec<Box<dyn Actor>>> {
    let mut actors: Vec<Box<dyn Actor>> = Vec::with_capacity(batch.players.len());
    for (index, kind) in batch.players.iter().enumerate() {
        let actor_seed = seed.wrapping_mul(31).wrapping_add(index as u64);
        let name = format!("{:?} #{}", kind, index).to_lowercase();
        match kind {
            ActorKind::Random => actors.push(Box::new(RandomActor::new(name, actor_seed))),
            ActorKind::Mcts => {
                let evaluator: Box<dyn Evaluator> = match batch.evaluator {
                    EvaluatorKind::Uniform => Box::new(UniformEvaluator),
                    EvaluatorKind::Score => Box::new(ScoreEvaluator::default()),
                };
                let config = MctsConfig {
                    simulations: batch.simulations,
                    seed: actor_seed,
                    ..MctsConfig::default()
                };
                actors.push(Box::new(MctsActor::new(
                    name,
                    config,
                    evaluator,
                    batch.policy,
                )?));
            }
        }
    }

    Ok(actors)
}

fn play_game(batch: &Batch, seed: u64) -> SimulationResult<(Vec<GameResult>, Option<String>)> {
    let config = ManagerConfig {
        game: GameConfig::default(),
        seed,
        ..ManagerConfig::default()
    };
    let mut manager = Manager::new(batch.map_data, build_actors(batch, seed)?, config)?;
    let results = manager.run()?;

    let action_log = if batch.dump_log {
        Some(manager.action_log_json()?)
    } else {
        None
    };
    Ok((results, action_log))
}

fn main() -> SimulationResult<()> {
    let args = Args::parse();

    let level = std::str::FromStr::from_str(&args.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    let map_data = match args.map {
        MapName::Usa => MapData::usa()?,
    };
    let batch = Batch {
        map_data,
        players: args.players.clone(),
        simulations: args.simulations,
        evaluator: args.evaluator,
        policy: args
            .temperature
            .map_or(SelectionPolicy::Greedy, SelectionPolicy::Temperature),
        dump_log: args.dump_log,
    };

    log::info!(
        "Playing {} games of {:?} on the {:?} map, with {} threads.",
        args.games,
        args.players,
        args.map,
        args.threads
    );

    let pool = ThreadPool::new(args.threads.max(1));
    let (tx, rx) = channel();
    for game in 0..args.games {
        let tx = tx.clone();
        let batch = batch.clone();
        let seed = args.seed.wrapping_add(game);

        pool.execute(move || {
            let result = play_game(&batch, seed).map_err(|err| err.to_string());
            // The receiver outlives every job.
            let _ = tx.send((game, result));
        });
    }
    drop(tx);

    let mut summaries: Vec<ActorSummary> = (0..batch.players.len())
        .map(|_| ActorSummary::default())
        .collect();
    let mut failed_games = 0;
    for (game, result) in rx.iter() {
        match result {
            Ok((results, action_log)) => {
                for result in &results {
                    let summary = &mut summaries[result.actor_index];
                    summary.games += 1;
                    summary.total_score += i64::from(result.score);
                    if result.is_winner {
                        summary.wins += 1;
                    }
                }
                log::info!(
                    "Game {} (seed {}): {}",
                    game,
                    args.seed.wrapping_add(game),
                    results
                        .iter()
                        .map(|result| format!("{} {}", result.actor, result.score))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                if let Some(action_log) = action_log {
                    println!("{}", action_log);
                }
            }
            Err(err) => {
                failed_games += 1;
                log::error!("Game {} failed: {}", game, err);
            }
        }
    }

    for (index, (kind, summary)) in batch.players.iter().zip(&summaries).enumerate() {
        if summary.games == 0 {
            continue;
        }
        log::info!(
            "{:?} #{}: {} wins out of {} games, average score {:.1}.",
            kind,
            index,
            summary.wins,
            summary.games,
            summary.total_score as f64 / summary.games as f64
        );
    }
    if failed_games > 0 {
        log::warn!("{} games failed.", failed_games);
    }

    Ok(())
}
