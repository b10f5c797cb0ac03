use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use truth_wars::clock::ManualClock;
use truth_wars::config::{CoordinatorConfig, GameConfig};
use truth_wars::content::HeadlineLibrary;
use truth_wars::engine::{
    Faction, NotificationIntent, Phase, PlayerId, RosterEntry, RoundNo, SessionId, VoteChoice,
};
use truth_wars::game::{GameCoordinator, GameCoordinatorConfig, SessionNotice};
use truth_wars::ledger::{InMemoryEventStore, LedgerWorker};

const LOG_TARGET: &str = "bin::truth_wars_sim";
const MAX_STEPS: usize = 1_000;

#[derive(Debug, Parser)]
#[command(name = "truth_wars_sim")]
#[command(about = "Play a scripted Truth Wars game against a manual clock", long_about = None)]
struct Args {
    /// Number of seated players
    #[arg(long, env = "TRUTH_WARS_PLAYERS", default_value_t = 6)]
    players: u64,

    /// Seed for role dealing and scripted voters
    #[arg(long, env = "TRUTH_WARS_SEED")]
    seed: Option<u64>,

    /// Override the round cap
    #[arg(long, env = "TRUTH_WARS_ROUNDS")]
    rounds: Option<RoundNo>,

    /// Game config as a JSON file
    #[arg(long, env = "TRUTH_WARS_CONFIG")]
    config: Option<PathBuf>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "TRUTH_WARS_LOG_JSON", default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_game_config(&args)?;
    run_simulation(args.players, config).await
}

fn load_dotenv() {
    let manifest_env_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_game_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GameConfig::from_json(&raw).context("invalid game config")?
        }
        None => GameConfig::default(),
    };
    if let Some(rounds) = args.rounds {
        config.round_cap = rounds;
        config.ability_rounds.retain(|r| *r <= rounds);
    }
    if args.seed.is_some() {
        config.rng_seed = args.seed;
    }
    Ok(config)
}

/// What the scripted players have learned from the notice feed.
#[derive(Default)]
struct TableKnowledge {
    factions: HashMap<PlayerId, Faction>,
    hints: HashMap<(PlayerId, RoundNo), bool>,
}

impl TableKnowledge {
    fn absorb(&mut self, feed: &mut broadcast::Receiver<SessionNotice>, id: SessionId) {
        while let Ok(notice) = feed.try_recv() {
            if notice.session_id != id {
                continue;
            }
            match notice.intent {
                NotificationIntent::RoleAssigned {
                    player, faction, ..
                } => {
                    self.factions.insert(player, faction);
                }
                NotificationIntent::TruthHint {
                    player,
                    round,
                    is_real,
                    ..
                } => {
                    self.hints.insert((player, round), is_real);
                }
                _ => {}
            }
        }
    }

    fn ballot(&self, player: PlayerId, round: RoundNo, rng: &mut StdRng) -> VoteChoice {
        let honest = |is_real: bool| {
            if is_real {
                VoteChoice::Trust
            } else {
                VoteChoice::Flag
            }
        };
        match (self.hints.get(&(player, round)), self.factions.get(&player)) {
            (Some(is_real), Some(Faction::Adversaries)) => honest(!*is_real),
            (Some(is_real), _) => honest(*is_real),
            (None, _) if rng.gen_bool(0.5) => VoteChoice::Trust,
            (None, _) => VoteChoice::Flag,
        }
    }
}

async fn run_simulation(players: u64, config: GameConfig) -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryEventStore::new());
    let (ledger_worker, ledger) = LedgerWorker::new(store.clone());
    let ledger_handle = ledger_worker.spawn();

    let coordinator = GameCoordinator::spawn(GameCoordinatorConfig {
        settings: CoordinatorConfig {
            auto_tick: false,
            ..CoordinatorConfig::default()
        },
        headlines: Arc::new(HeadlineLibrary::with_fallback_deck()),
        ledger,
        clock: clock.clone(),
    })
    .context("failed to start coordinator")?;

    let mut rng = config
        .rng_seed
        .map(StdRng::seed_from_u64)
        .unwrap_or_else(StdRng::from_entropy);
    let roster: Vec<RosterEntry> = (1..=players)
        .map(|id| RosterEntry::new(id, format!("player-{id}")))
        .collect();
    let mut feed = coordinator.subscribe();
    let id = coordinator
        .create_session(roster, config)
        .context("failed to create session")?;
    info!(target: LOG_TARGET, session_id = %id, players, "simulation started");

    coordinator.force_start(id, 1).await?;
    let mut knowledge = TableKnowledge::default();

    for _ in 0..MAX_STEPS {
        knowledge.absorb(&mut feed, id);
        let status = coordinator.status(id).await?;
        match status.phase {
            Phase::GameEnd => break,
            Phase::Discussion => {
                for player in 1..=players {
                    let choice = knowledge.ballot(player, status.round, &mut rng);
                    if let Err(rejection) = coordinator.submit_vote(id, player, choice).await {
                        debug!(target: LOG_TARGET, player, reason = rejection.code(), "vote skipped");
                    }
                }
            }
            Phase::GroupAccusationVote => {
                for player in 1..=players {
                    let others: Vec<PlayerId> = (1..=players).filter(|t| *t != player).collect();
                    let Some(target) = others.choose(&mut rng).copied() else {
                        continue;
                    };
                    if let Err(rejection) = coordinator.accuse(id, player, target).await {
                        debug!(target: LOG_TARGET, player, reason = rejection.code(), "accusation skipped");
                    }
                }
            }
            _ => {}
        }

        let status = coordinator.status(id).await?;
        if status.phase == Phase::GameEnd {
            break;
        }
        let step = status.seconds_remaining.unwrap_or(1).max(1);
        clock.advance(Duration::from_secs(step));
        coordinator.tick(id).await?;
    }

    let status = coordinator.status(id).await?;
    coordinator.shutdown();
    drop(coordinator);
    // the ledger worker exits once every sink is gone
    tokio::time::timeout(Duration::from_secs(5), ledger_handle)
        .await
        .context("ledger worker did not drain in time")?
        .context("ledger worker panicked")?;

    info!(
        target: LOG_TARGET,
        session_id = %id,
        records = store.len(),
        rounds = status.round,
        "simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
