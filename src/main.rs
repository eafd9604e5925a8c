use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cell_arena::game::systems::ai::generate_bot_name;
use cell_arena::{ArenaConfig, GameEvent, Simulation, Strategy};

/// Bots spawned when BOT_COUNT is unset
const DEFAULT_BOT_COUNT: usize = 8;
/// Seconds between leaderboard logs
const STATS_INTERVAL_SECS: u64 = 10;

fn env_or<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Invalid {} '{}', ignoring", name, raw);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Cell Arena v{}", env!("CARGO_PKG_VERSION"));

    let config = ArenaConfig::load_or_default();
    config.validate()?;
    let bot_count = env_or::<usize>("BOT_COUNT").unwrap_or(DEFAULT_BOT_COUNT);
    let max_ticks = env_or::<u64>("MAX_TICKS");
    info!(
        "Configuration loaded: {}x{} arena, {} bots, {} Hz",
        config.border_width, config.border_height, bot_count, config.tick_rate
    );

    let mut sim = Simulation::new(config.clone())?;
    let mut name_rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    for i in 0..bot_count {
        let strategy = match i % 3 {
            0 => Strategy::FoodHunter,
            1 => Strategy::Aggressive,
            _ => Strategy::Random,
        };
        sim.add_bot(generate_bot_name(&mut name_rng), i as u32, strategy);
    }

    let eaten_cells = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&eaten_cells);
    sim.subscribe(move |event| {
        if let GameEvent::Eaten {
            eaten_kind: cell_arena::game::state::KindTag::PlayerCell,
            ..
        } = event
        {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let mut ticker = interval(Duration::from_secs_f64(config.dt()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let stats_every = config.tick_rate as u64 * STATS_INTERVAL_SECS;
    let start = Instant::now();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Simulation loop started at {} Hz", config.tick_rate);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = sim.tick();
                let done = sim.state().tick;

                if done % stats_every == 0 {
                    let top: Vec<String> = sim
                        .state()
                        .leaderboard()
                        .into_iter()
                        .take(5)
                        .map(|(key, score)| {
                            let name = sim.state().get_player(key).map(|p| p.name.as_str()).unwrap_or("?");
                            format!("{}={:.0}", name, score)
                        })
                        .collect();
                    info!(
                        "Arena: {}s, tick {}, {} entities, {} cells eaten | Perf: {} | Top: {}",
                        start.elapsed().as_secs(),
                        summary.tick,
                        sim.state().entities.len(),
                        eaten_cells.load(Ordering::Relaxed),
                        sim.performance().status_message(),
                        top.join(", ")
                    );
                }

                if max_ticks.is_some_and(|max| done >= max) {
                    info!("Reached {} ticks", done);
                    break;
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Ctrl+C handler failed: {}", e);
                }
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Final leaderboard by team: {:?}", sim.state().team_scores());
    Ok(())
}
