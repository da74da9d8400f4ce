use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec2;
use tilespace_common::TileVariantId;
use tilespace_stream::{CameraView, StreamConfig, StreamEngine, StreamScheduler};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tilespace-cli", about = "CLI tool for tilespace streaming")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate info and the default configuration
    Info,
    /// Drive the engine tick-by-tick with a scripted camera
    Simulate {
        /// Number of ticks to run
        #[arg(short, long, default_value = "20")]
        ticks: u64,
        /// RNG seed for variant selection
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Camera movement per tick on X, in world units
        #[arg(long, default_value = "25.0")]
        dx: f32,
        /// Camera movement per tick on Y, in world units
        #[arg(long, default_value = "0.0")]
        dy: f32,
        /// Number of tile variants to pick from
        #[arg(long, default_value = "4")]
        variants: u32,
        /// Delete culled tiles instead of hiding them
        #[arg(long)]
        delete_culled: bool,
        /// Load the streaming config from a JSON file instead of flags
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run the engine on the periodic scheduler for a while
    Stream {
        /// How long to run, in milliseconds
        #[arg(long, default_value = "2000")]
        duration_ms: u64,
        /// Check interval, in milliseconds
        #[arg(long, default_value = "100")]
        interval_ms: u64,
    },
}

/// Camera following a scripted path; the engine reads it through the
/// [`CameraView`] seam, the driver moves it between ticks.
#[derive(Clone)]
struct ScriptedCamera {
    center: Arc<Mutex<Vec2>>,
    half: Vec2,
}

impl ScriptedCamera {
    fn new(half: Vec2) -> Self {
        Self {
            center: Arc::new(Mutex::new(Vec2::ZERO)),
            half,
        }
    }

    fn advance(&self, delta: Vec2) {
        *self.center.lock().unwrap() += delta;
    }
}

impl CameraView for ScriptedCamera {
    fn position(&self) -> Vec2 {
        *self.center.lock().unwrap()
    }

    fn pixel_size(&self) -> Vec2 {
        Vec2::new(1280.0, 720.0)
    }

    fn viewport_to_world(&self, corner: Vec2) -> Vec2 {
        let center = *self.center.lock().unwrap();
        center - self.half + 2.0 * self.half * corner
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tilespace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("stream: {}", tilespace_stream::crate_info());
            println!("world: {}", tilespace_world::crate_info());
            let defaults = serde_json::to_string_pretty(&StreamConfig::default())?;
            println!("default config:\n{defaults}");
        }
        Commands::Simulate {
            ticks,
            seed,
            dx,
            dy,
            variants,
            delete_culled,
            config,
        } => {
            let config = match config {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading config {}", path.display()))?;
                    serde_json::from_str(&text)
                        .with_context(|| format!("parsing config {}", path.display()))?
                }
                None => StreamConfig {
                    variants: (0..variants).map(TileVariantId).collect(),
                    delete_culled,
                    rng_seed: seed,
                    ..StreamConfig::default()
                },
            };

            let camera = ScriptedCamera::new(Vec2::new(40.0, 22.5));
            let mut engine = StreamEngine::new(config, Some(Box::new(camera.clone())), || None)?;

            engine.prime();
            println!(
                "primed: {} tiles, cull distance^2 = {:.0}",
                engine.world().len(),
                engine.cull_distance_sqr()
            );

            let step = Vec2::new(dx, dy);
            for tick in 1..=ticks {
                camera.advance(step);
                engine.tick();
                let stats = engine.stats();
                println!(
                    "tick {tick:3}: camera=({:.0}, {:.0}) tiles={} spawned={} hidden={} deleted={}",
                    camera.position().x,
                    camera.position().y,
                    engine.world().len(),
                    stats.tiles_spawned,
                    stats.tiles_hidden,
                    stats.tiles_deleted,
                );
            }

            let stats = engine.stats();
            println!(
                "done: {} ticks, {} evaluations, {} tiles spawned, {} live",
                stats.ticks,
                stats.evaluations,
                stats.tiles_spawned,
                engine.world().len()
            );
        }
        Commands::Stream {
            duration_ms,
            interval_ms,
        } => {
            let config = StreamConfig {
                check_interval: Duration::from_millis(interval_ms),
                variants: (0..4).map(TileVariantId).collect(),
                ..StreamConfig::default()
            };
            let camera = ScriptedCamera::new(Vec2::new(40.0, 22.5));
            let mover = camera.clone();
            let engine = StreamEngine::new(config, Some(Box::new(camera)), || None)?;

            let scheduler = StreamScheduler::spawn(engine)?;
            let start = std::time::Instant::now();
            while start.elapsed() < Duration::from_millis(duration_ms) {
                // Drift the camera right while the scheduler ticks.
                mover.advance(Vec2::new(2.0, 0.0));
                std::thread::sleep(Duration::from_millis(interval_ms / 2).max(Duration::from_millis(1)));
            }

            match scheduler.stop() {
                Some(engine) => {
                    let stats = engine.stats();
                    println!(
                        "streamed for {duration_ms}ms: {} ticks, {} evaluations, {} tiles live",
                        stats.ticks,
                        stats.evaluations,
                        engine.world().len()
                    );
                }
                None => anyhow::bail!("stream worker panicked"),
            }
        }
    }

    Ok(())
}
