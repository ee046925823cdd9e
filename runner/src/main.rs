// ═══════════════════════════════════════════════════════════════════════
// Runner — CLI entry point for playing, simulating and inspecting games
// ═══════════════════════════════════════════════════════════════════════

use clap::{Parser, Subcommand};
use hexrule_agents::{make_agent, Agent, AgentKind, AgentView};
use hexrule_engine::config::RulesConfig;
use hexrule_engine::error::ActionError;
use hexrule_engine::projection::project;
use hexrule_engine::setup::GameSetup;
use hexrule_engine::turn::TurnSummary;
use hexrule_engine::types::*;
use hexrule_host::{GameHost, HostError, SnapshotStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const SEAT: ParticipantId = ParticipantId(0);

#[derive(Parser)]
#[command(name = "hexrule", about = "Hexrule turn & action engine")]
struct Cli {
    /// Rules file to use instead of the built-in rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one game, seat 0 driven through the command path by an agent
    Play {
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 16)]
        width: u32,
        #[arg(long, default_value_t = 12)]
        height: u32,
        /// Number of AI opponents
        #[arg(long, default_value_t = 1)]
        ai: usize,
        /// Agent for seat 0 and the AI seats: "random" or "heuristic"
        #[arg(short, long, default_value_t = AgentKind::Heuristic)]
        agent: AgentKind,
        #[arg(short, long, default_value_t = 30)]
        turns: u32,
    },
    /// Run many games concurrently and save them to a database
    Simulate {
        #[arg(short, long, default_value_t = 20)]
        games: u32,
        #[arg(short, long, default_value = "games.db")]
        db: PathBuf,
        /// Games in flight at once
        #[arg(short, long, default_value_t = 4)]
        parallel: usize,
        #[arg(short, long, default_value_t = 30)]
        turns: u32,
        #[arg(short, long, default_value_t = AgentKind::Heuristic)]
        agent: AgentKind,
    },
    /// List saved games, or print one game's snapshot as JSON
    Inspect {
        #[arg(short, long, default_value = "games.db")]
        db: PathBuf,
        #[arg(short, long)]
        game: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let rules = match &cli.rules {
        Some(path) => match RulesConfig::from_file(path) {
            Ok(rules) => Arc::new(rules),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
        },
        None => RulesConfig::builtin(),
    };

    let result = match cli.command {
        Commands::Play { seed, width, height, ai, agent, turns } => {
            let mut setup = GameSetup::human_vs_ai(seed, ai);
            setup.width = width;
            setup.height = height;
            cmd_play(rules, setup, agent, turns).await
        }
        Commands::Simulate { games, db, parallel, turns, agent } => {
            cmd_simulate(rules, games, &db, parallel, turns, agent).await
        }
        Commands::Inspect { db, game } => cmd_inspect(rules, &db, game),
    };
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ── Driving seat 0 ─────────────────────────────────────────────────────

fn seat_agents(setup: &GameSetup, kind: AgentKind) -> Vec<Box<dyn Agent>> {
    setup.participants.iter().enumerate()
        .filter(|(_, (_, k))| *k == ParticipantKind::Ai)
        .map(|(i, _)| make_agent(kind, ParticipantId(i as u8), setup.seed.wrapping_add(i as u64)))
        .collect()
}

/// Play seat 0's turn the way an external client would: one submitted
/// command at a time, then an explicit end-turn.
async fn play_seat_turn(
    host: &GameHost,
    game: GameId,
    agent: &mut dyn Agent,
) -> Result<Option<TurnSummary>, HostError> {
    let mut view = AgentView::new(SEAT, (*host.snapshot(game)?).clone(), host.rules().clone());
    for _ in 0..host.rules().ai_max_actions_per_turn {
        let Some(command) = agent.decide(&view) else { break };
        match host.submit(game, SEAT, command.clone(), None).await {
            Ok(response) => view.snapshot = response.snapshot().clone(),
            Err(HostError::Action(e)) => {
                warn!(game = %game, command = command.kind(), error = %e, "seat command rejected");
                match command.actor() {
                    Some(actor) => {
                        view.tried.insert(actor);
                    }
                    None => break,
                }
            }
            Err(e) => return Err(e),
        }
    }
    match host.end_turn(game, SEAT, None).await {
        Ok(response) => Ok(response.summary().cloned()),
        Err(HostError::Action(ActionError::GameFinished)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn run_game(host: &GameHost, game: GameId, mut agent: Box<dyn Agent>, turns: u32, verbose: bool) -> Result<(), HostError> {
    for _ in 0..turns {
        if host.snapshot(game)?.game.status == GameStatus::Finished {
            break;
        }
        match play_seat_turn(host, game, agent.as_mut()).await? {
            Some(summary) if verbose => print_summary(&summary),
            Some(_) => {}
            None => break,
        }
    }
    Ok(())
}

fn print_summary(s: &TurnSummary) {
    let fmt_map = |m: &ResourceMap| {
        m.iter().filter(|(_, n)| **n > 0).map(|(k, n)| format!("{k}:{n}")).collect::<Vec<_>>().join(" ")
    };
    println!(
        "turn {:>3}  ended by {}  next {}  harvested [{}]  overflow [{}]  produced {:?}  delayed {}  ai_actions {}{}",
        s.turn,
        s.ended_by,
        s.next_active,
        fmt_map(&s.harvested),
        fmt_map(&s.overflow),
        s.produced_units,
        s.delayed_productions.len(),
        s.ai_actions,
        if s.ai_timed_out { "  (AI timed out)" } else { "" },
    );
    for p in &s.eliminated {
        println!("           {p} eliminated");
    }
}

// ── Commands ───────────────────────────────────────────────────────────

async fn cmd_play(rules: Arc<RulesConfig>, setup: GameSetup, kind: AgentKind, turns: u32) -> CliResult {
    println!("=== Hexrule ===\n");
    println!("seed={} map={}x{} ai={} agent={}\n", setup.seed, setup.width, setup.height, setup.participants.len() - 1, kind);

    let host = GameHost::new(rules);
    let game = host.create_game(&setup, seat_agents(&setup, kind))?;
    run_game(&host, game, make_agent(kind, SEAT, setup.seed), turns, true).await?;

    let snap = host.snapshot(game)?;
    println!();
    match snap.game.winner {
        Some(w) if snap.game.status == GameStatus::Finished => println!("{w} wins on turn {}", snap.game.turn),
        _ => println!("stopped after turn {}", snap.game.turn - 1),
    }
    for p in &snap.participants {
        let cities = snap.cities_of(p.id).count();
        let units = snap.units.iter().filter(|u| u.owner == p.id).count();
        println!("  {:<8} cities {:>2}  units {:>2}{}", p.name, cities, units, if p.eliminated { "  (eliminated)" } else { "" });
    }
    Ok(())
}

async fn cmd_simulate(rules: Arc<RulesConfig>, games: u32, db: &Path, parallel: usize, turns: u32, kind: AgentKind) -> CliResult {
    println!("=== Simulation: {games} games, {parallel} at a time, agent={kind} ===\n");
    let host = Arc::new(GameHost::new(rules));
    let store = Arc::new(SqliteStore::new(db)?);
    let slots = Arc::new(tokio::sync::Semaphore::new(parallel.max(1)));

    let mut tasks = tokio::task::JoinSet::new();
    for g in 0..games {
        let (host, store, slots) = (host.clone(), store.clone(), slots.clone());
        tasks.spawn(async move {
            let _slot = slots.acquire_owned().await.map_err(|e| e.to_string())?;
            let seed = 42u64 + g as u64 * 1000;
            let setup = GameSetup::human_vs_ai(seed, 1);
            let game = host.create_game(&setup, seat_agents(&setup, kind)).map_err(|e| e.to_string())?;
            run_game(&host, game, make_agent(kind, SEAT, seed), turns, false).await.map_err(|e| e.to_string())?;
            host.save(game, store.as_ref()).await.map_err(|e| e.to_string())?;
            Ok::<_, String>(game)
        });
    }

    let mut errors = 0u32;
    while let Some(done) = tasks.join_next().await {
        match done {
            Ok(Ok(game)) => info!(game = %game, "simulation finished"),
            Ok(Err(e)) => {
                errors += 1;
                eprintln!("game failed: {e}");
            }
            Err(e) => {
                errors += 1;
                eprintln!("task failed: {e}");
            }
        }
    }

    let saved = store.list()?;
    let finished = saved.iter().filter(|s| s.finished).count();
    println!("\n--- Summary ({games} games, {errors} errors) ---");
    println!("  finished: {finished}, still running at turn limit: {}", saved.len() - finished);
    println!("\nGames saved to: {}", db.display());
    Ok(())
}

fn cmd_inspect(rules: Arc<RulesConfig>, db: &Path, game: Option<u64>) -> CliResult {
    let store = SqliteStore::new(db)?;
    match game {
        Some(id) => {
            let state = store.load(GameId(id))?.ok_or(HostError::GameNotFound(GameId(id)))?;
            println!("{}", serde_json::to_string_pretty(&project(&state, &rules))?);
        }
        None => {
            let saved = store.list()?;
            if saved.is_empty() {
                println!("No saved games.");
                return Ok(());
            }
            println!("{:>6} {:>6} {:>9} {:>7}  {}", "Game", "Turn", "Finished", "Winner", "Saved at");
            println!("{}", "-".repeat(52));
            for s in &saved {
                let winner = s.winner.map(|w| format!("P{w}")).unwrap_or_else(|| "-".into());
                println!("{:>6} {:>6} {:>9} {:>7}  {}", s.id.0, s.turn, s.finished, winner, s.saved_at);
            }
        }
    }
    Ok(())
}
