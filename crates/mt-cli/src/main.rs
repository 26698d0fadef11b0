mod host;
mod simulate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

use mt_core::{
    Clock, HeadlessSurface, ManualClock, MapProvider, RenderCache, TrackerDevice, format_distance,
    scan_with_capacity,
};
use mt_store::{SettingsStore, World};

use crate::host::{LoggingAudio, render_ascii};
use crate::simulate::SimulateOptions;

const RADAR_CELLS: usize = 21;

#[derive(Parser)]
#[command(name = "mtrack", about = "Motion tracker radar: headless host and simulator")]
struct Cli {
    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan around a token and print every contact
    Scan {
        /// World description (TOML)
        #[arg(long)]
        world: PathBuf,
        #[arg(long)]
        scene: String,
        /// Reference token id
        #[arg(long)]
        token: String,
        /// Override the stored radar range
        #[arg(long)]
        max_distance: Option<f64>,
    },

    /// Step a tracker device and print its readout per frame
    Sweep {
        #[arg(long)]
        world: PathBuf,
        #[arg(long)]
        scene: String,
        #[arg(long)]
        token: String,
        #[arg(long, default_value_t = 60)]
        frames: u32,
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },

    /// Inspect or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Run every user of a world as a client on a shared broadcast bus
    Simulate {
        #[arg(long)]
        world: PathBuf,
        #[arg(long)]
        scene: String,
        #[arg(long)]
        token: String,
        /// User who opens the tracker
        #[arg(long)]
        owner: String,
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// Show the owner's tracker to everyone after opening
        #[arg(long)]
        share: bool,
        /// Seed for token movement
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print every key with its effective value
    List,
    Get {
        key: String,
    },
    /// Store a value (JSON; bare words are taken as strings)
    Set {
        key: String,
        value: String,
    },
    /// Return a key to its default
    Reset {
        key: String,
    },
}

fn open_settings() -> Result<SettingsStore> {
    let base_dir = std::env::var("MT_DATA_DIR").ok().map(PathBuf::from);
    SettingsStore::open_in(base_dir.as_deref()).context("failed to open settings store")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Scan {
            world,
            scene,
            token,
            max_distance,
        } => cmd_scan(&world, &scene, &token, max_distance),
        Commands::Sweep {
            world,
            scene,
            token,
            frames,
            fps,
        } => cmd_sweep(&world, &scene, &token, frames, fps),
        Commands::Settings { action } => cmd_settings(action),
        Commands::Simulate {
            world,
            scene,
            token,
            owner,
            seconds,
            fps,
            share,
            seed,
        } => {
            let opts = SimulateOptions {
                scene,
                token,
                owner,
                seconds,
                fps,
                share,
                seed,
            };
            cmd_simulate(&world, opts).await
        }
    }
}

fn load_world(path: &Path) -> Result<World> {
    World::load(path).with_context(|| format!("failed to load world {}", path.display()))
}

fn cmd_scan(world_path: &Path, scene_id: &str, token_id: &str, max: Option<f64>) -> Result<()> {
    let world = load_world(world_path)?;
    let mut settings = open_settings()?.load().context("failed to load settings")?;
    if let Some(max) = max {
        settings.max_distance = max;
    }

    let scene = world
        .scene(scene_id)
        .with_context(|| format!("scene '{scene_id}' not found"))?;
    let reference = scene
        .token(token_id)
        .with_context(|| format!("token '{token_id}' not found in scene '{scene_id}'"))?;
    let unit = if scene.grid.unit_label.is_empty() {
        settings.unit_fallback.as_str()
    } else {
        scene.grid.unit_label.as_str()
    };

    let result = scan_with_capacity(
        &reference.sample(&scene.grid),
        &scene.samples(),
        &scene.grid,
        settings.max_distance,
        &settings.scan_filters(),
        settings.signal_capacity,
    );

    println!(
        "scene {scene_id}, reference {token_id}, range {}",
        format_distance(settings.max_distance, unit)
    );
    for (i, signal) in result.signals.iter().enumerate() {
        println!(
            "  #{:<2} {:>10}  bearing ({:.3}, {:.3})",
            i + 1,
            format_distance(signal.distance, unit),
            signal.bearing.x,
            signal.bearing.y
        );
    }
    println!("signals: {}", result.signals.len());
    println!("nearest: {}", format_distance(result.nearest_distance, unit));
    Ok(())
}

fn cmd_sweep(world_path: &Path, scene_id: &str, token_id: &str, frames: u32, fps: u32) -> Result<()> {
    if fps == 0 {
        bail!("fps must be positive");
    }
    let world = load_world(world_path)?;
    let settings = open_settings()?.load().context("failed to load settings")?;
    if world.scene(scene_id).and_then(|s| s.token(token_id)).is_none() {
        bail!("token '{token_id}' not found in scene '{scene_id}'");
    }

    let mut device = TrackerDevice::new(settings, Arc::new(RenderCache::new()));
    let mut surface = HeadlessSurface::new();
    let mut audio = LoggingAudio::new();
    let clock = ManualClock::new();
    device.initialize(&mut surface);
    device.set_target(scene_id, Some(token_id));

    let dt = 1.0 / f64::from(fps);
    for frame in 1..=frames {
        clock.advance_secs(dt);
        let Some(report) = device.tick(dt, clock.now(), &world, &mut audio, &mut surface) else {
            break;
        };
        let cues: Vec<&str> = report.frame.cues.iter().map(|c| c.name()).collect();
        println!(
            "frame {frame:>4}  phase {:.3}  beam {:.2}  {:<10} {}",
            report.frame.phase,
            report.frame.beam_fraction,
            report.frame.readout.text,
            cues.join(" ")
        );
    }

    let radius = device.px_per_unit() * device.settings().max_distance;
    print!("{}", render_ascii(&surface, RADAR_CELLS, radius));
    println!("cues played: {}", audio.total());
    Ok(())
}

fn cmd_settings(action: SettingsAction) -> Result<()> {
    let mut store = open_settings()?;
    match action {
        SettingsAction::List => {
            for entry in store.list().context("failed to list settings")? {
                let marker = if entry.stored { "*" } else { " " };
                println!("{marker} {:<20} {}", entry.key, entry.value);
            }
        }
        SettingsAction::Get { key } => {
            println!("{}", store.get(&key)?);
        }
        SettingsAction::Set { key, value } => {
            let value: Value =
                serde_json::from_str(&value).unwrap_or_else(|_| Value::String(value.clone()));
            store.set(&key, value)?;
            println!("{key} = {}", store.get(&key)?);
        }
        SettingsAction::Reset { key } => {
            store.reset(&key)?;
            println!("{key} = {}", store.get(&key)?);
        }
    }
    Ok(())
}

async fn cmd_simulate(world_path: &Path, opts: SimulateOptions) -> Result<()> {
    let world = load_world(world_path)?;
    let settings = open_settings()?.load().context("failed to load settings")?;
    if !settings.enabled {
        println!("tracker disabled (settings: enabled = false)");
    }

    let summaries = simulate::run(world, settings, opts).await?;
    for s in &summaries {
        println!(
            "{} ({}): window={:?} opens={} closes={} frames={} waves={} pings={} readout={:?}",
            s.user,
            s.role,
            s.window,
            s.opens,
            s.closes,
            s.frames,
            s.waves,
            s.pings,
            s.last_readout
        );
        if !s.presence.is_empty() {
            let presence: Vec<String> = s
                .presence
                .iter()
                .map(|(user, v)| format!("{user}={}", v.as_str()))
                .collect();
            println!("  presence: {}", presence.join(" "));
        }
    }
    Ok(())
}
