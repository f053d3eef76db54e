//! Skirmish runner
//! Two AI players on islands separated by a strait, each driven by its own council

use clap::Parser;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;

use war_council::attack::AttackKind;
use war_council::core::config::{load_config, MilitaryConfig};
use war_council::core::error::Result;
use war_council::core::types::PlayerId;
use war_council::world::{EventBatch, GameEvent, ProductionQueues, SandboxWorld};
use war_council::WarCouncil;

/// Skirmish - two military AIs fight across a strait
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(about = "Run a headless two-player skirmish between military AIs")]
struct Args {
    /// Random seed for the starting army layout
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Turns to simulate
    #[arg(long, default_value_t = 600)]
    turns: u64,

    /// Starting soldiers per player
    #[arg(long, default_value_t = 12)]
    units: u32,

    /// Overrides the configured aggressiveness (0.0 to 1.0)
    #[arg(long)]
    aggressiveness: Option<f32>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

struct Side {
    council: WarCouncil,
    queues: ProductionQueues,
}

fn build_map(world: &mut SandboxWorld, rng: &mut ChaCha8Rng, units: u32) {
    let west = world.add_land(0, Vec2::new(0.0, 0.0), Vec2::new(600.0, 1000.0));
    let strait = world.add_sea(1, Vec2::new(600.0, 0.0), Vec2::new(800.0, 1000.0));
    let east = world.add_land(2, Vec2::new(800.0, 0.0), Vec2::new(1400.0, 1000.0));
    tracing::debug!(west = %west, strait = %strait, east = %east, "map laid out");

    for (player, base) in [(PlayerId(1), Vec2::new(250.0, 500.0)), (PlayerId(2), Vec2::new(1150.0, 500.0))] {
        world.spawn_structure(player, "civil_centre", base, 3);
        let towards_sea = if base.x < 700.0 { 1.0 } else { -1.0 };
        world.spawn_structure(player, "barracks", base + Vec2::new(60.0 * towards_sea, 40.0), 0);
        world.spawn_dock(player, Vec2::new(700.0 - 105.0 * towards_sea, 500.0), strait);
        for _ in 0..units {
            let offset = Vec2::new(rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0));
            if rng.gen_bool(0.25) {
                world.spawn_cavalry(player, base + offset);
            } else {
                world.spawn_soldier(player, base + offset);
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("war_council=info,skirmish=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => MilitaryConfig::default(),
    };
    if let Some(aggressiveness) = args.aggressiveness {
        config.attack.aggressiveness = aggressiveness.clamp(0.0, 1.0);
    }
    config.validate()?;

    tracing::info!(seed = args.seed, turns = args.turns, "skirmish starting");
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut world = SandboxWorld::two_player();
    build_map(&mut world, &mut rng, args.units);

    let mut sides: Vec<Side> = [PlayerId(1), PlayerId(2)]
        .into_iter()
        .map(|player| Side {
            council: WarCouncil::new(player, config.clone()),
            queues: ProductionQueues::new(),
        })
        .collect();

    let mut events = EventBatch::new();
    for _ in 0..args.turns {
        for side in &mut sides {
            let player = side.council.player();
            let mut commands = side.council.update(&world, &mut side.queues, &events);
            world.apply(player, commands.drain());
            world.start_production(player, &mut side.queues);
            for enemy in side.council.outgoing_requests() {
                world.push_event(GameEvent::AttackRequest {
                    source: player,
                    target: *enemy,
                });
            }
        }
        events = world.step();
    }

    for side in &sides {
        let attack = side.council.attack();
        let running: usize = AttackKind::ALL.iter().map(|k| attack.started(*k).len()).sum();
        let preparing: usize = AttackKind::ALL.iter().map(|k| attack.upcoming(*k).len()).sum();
        tracing::info!(
            player = %side.council.player(),
            armies = side.council.roster().len(),
            transports = side.council.naval().plans().count(),
            running,
            preparing,
            "final state"
        );
    }
    Ok(())
}
