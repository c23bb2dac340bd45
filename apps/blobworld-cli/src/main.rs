mod level;

use anyhow::{Context, bail};
use blobworld_input::{InputAggregator, InputConfig, Orientation, SourceKind};
use blobworld_kernel::{Simulation, WorldConfig, WorldModel};
use blobworld_render::{DebugTextRenderer, FramePump, RenderView};
use blobworld_session::{SessionConfig, SimulationLoop};
use clap::{Parser, Subcommand};
use glam::Vec2;
use level::LevelFile;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blobworld-cli", about = "Run and inspect blobworld levels")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default world settings
    Info,
    /// Print the built-in demo level as JSON
    DemoLevel,
    /// Run a level on the simulation thread with synthetic tilt input
    Run {
        /// Level file (JSON); the demo level is used when omitted
        #[arg(short, long)]
        level: Option<PathBuf>,
        /// Wall-clock seconds to run
        #[arg(short, long, default_value = "3")]
        seconds: f32,
        /// Sleep between simulation ticks, in milliseconds
        #[arg(long, default_value = "16")]
        tick_ms: u64,
        /// Interval between render frames, in milliseconds
        #[arg(long, default_value = "33")]
        frame_ms: u64,
        /// Input source name: gravity, acceleration or pointer
        #[arg(long, default_value = "gravity")]
        source: String,
        /// Display rotation in degrees: 0, 90, 180 or 270
        #[arg(long, default_value = "0")]
        orientation: u32,
        /// Multiplier from sample units to world units per second
        #[arg(long, default_value = "40")]
        gain: f32,
        /// Upper bound on avatar speed
        #[arg(long)]
        max_speed: Option<f32>,
        /// Print every rendered frame instead of only the last one
        #[arg(long)]
        print_frames: bool,
    },
    /// Step two fresh copies of a level with the same commands and compare
    CheckDeterminism {
        /// Level file (JSON); the demo level is used when omitted
        #[arg(short, long)]
        level: Option<PathBuf>,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "600")]
        ticks: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            let config = WorldConfig::default();
            println!("blobworld-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "world: dt={:.4}s scale={}px/m height={} solver_iterations={}",
                config.fixed_dt,
                config.pixels_per_meter,
                config.world_height,
                config.solver_iterations
            );
            println!(
                "bodies: avatar_radius={} hazard_radius={}",
                config.avatar_radius, config.hazard_radius
            );
        }
        Commands::DemoLevel => {
            println!("{}", serde_json::to_string_pretty(&LevelFile::demo())?);
        }
        Commands::Run {
            level,
            seconds,
            tick_ms,
            frame_ms,
            source,
            orientation,
            gain,
            max_speed,
            print_frames,
        } => {
            let source: SourceKind = source.parse()?;
            let orientation = Orientation::try_from(orientation)?;
            let level = LevelFile::load_or_demo(level.as_deref())?;
            run(RunOptions {
                level,
                duration: Duration::from_secs_f32(seconds.max(0.0)),
                tick: Duration::from_millis(tick_ms),
                frame: Duration::from_millis(frame_ms.max(1)),
                source,
                orientation,
                input: InputConfig { gain, max_speed },
                print_frames,
            })?;
        }
        Commands::CheckDeterminism { level, ticks } => {
            let level = LevelFile::load_or_demo(level.as_deref())?;
            check_determinism(&level, ticks)?;
        }
    }

    Ok(())
}

struct RunOptions {
    level: LevelFile,
    duration: Duration,
    tick: Duration,
    frame: Duration,
    source: SourceKind,
    orientation: Orientation,
    input: InputConfig,
    print_frames: bool,
}

/// Tilt reading that sweeps slowly around the circle.
fn synthetic_tilt(step: u64) -> [f32; 3] {
    let phase = step as f32 * 0.02;
    [phase.cos() * 5.0, phase.sin() * 3.0, 9.81]
}

fn run(opts: RunOptions) -> anyhow::Result<()> {
    let initial = opts.level.initial_state()?;
    let world = WorldModel::with_config(initial, opts.level.width, opts.level.config)?;
    let view = RenderView::new(
        Vec2::new(opts.level.config.world_height * 4.0 / 3.0, opts.level.config.world_height),
        opts.level.width,
    );

    let input = Arc::new(InputAggregator::with_config(opts.input)?);
    let mut sim = SimulationLoop::new(
        world,
        Arc::clone(&input),
        SessionConfig {
            tick_pacing: Some(opts.tick),
            ..SessionConfig::default()
        },
    );
    let field_events = sim
        .take_field_events()
        .context("field events already taken")?;
    let mut pump = FramePump::new(sim.snapshots(), DebugTextRenderer::new(), view);

    sim.start()?;
    tracing::info!(duration = ?opts.duration, "simulation running");

    let stop = Arc::new(AtomicBool::new(false));
    let producer = {
        let input = Arc::clone(&input);
        let stop = Arc::clone(&stop);
        let (source, orientation) = (opts.source, opts.orientation);
        thread::Builder::new()
            .name("blobworld-input".into())
            .spawn(move || {
                let mut step = 0;
                while !stop.load(Ordering::Relaxed) {
                    if let Err(err) = input.inject_sample(&synthetic_tilt(step), source, orientation)
                    {
                        tracing::warn!(%err, "input producer stopping");
                        break;
                    }
                    step += 1;
                    thread::sleep(Duration::from_millis(10));
                }
            })?
    };

    let started = Instant::now();
    let mut paused_once = false;
    while started.elapsed() < opts.duration {
        // Exercise the host pause path once, halfway through.
        if !paused_once && started.elapsed() >= opts.duration / 2 {
            paused_once = true;
            let (before, during) = hold_pause(&mut sim, opts.frame * 3)?;
            println!("paused at tick {before}, ticks while paused: {during}");
        }
        if let Some(frame) = pump.next_frame() {
            if opts.print_frames {
                println!("{frame}");
            }
        }
        for event in field_events.try_iter() {
            println!("field event: {event:?}");
        }
        thread::sleep(opts.frame);
    }

    stop.store(true, Ordering::Relaxed);
    let outcome = sim.terminate();
    if producer.join().is_err() {
        bail!("input producer panicked");
    }
    for event in field_events.try_iter() {
        println!("field event: {event:?}");
    }
    outcome?;

    // Pick up whatever the last ticks published.
    pump.next_frame();
    if let Some(frame) = pump.redraw() {
        println!("{frame}");
    }
    println!(
        "ticks={} frames_rendered={} frames_skipped={} samples={}",
        sim.ticks(),
        pump.frames_rendered(),
        pump.frames_skipped(),
        input.samples_accepted()
    );
    Ok(())
}

/// Pause for `hold`, then resume. Returns the tick at the pause and the
/// ticks completed while paused. A loop that already stopped on a fault
/// reports that fault instead of the refused pause.
fn hold_pause<S: Simulation>(
    sim: &mut SimulationLoop<S>,
    hold: Duration,
) -> anyhow::Result<(u64, u64)> {
    if let Err(refused) = sim.set_paused(true) {
        sim.terminate()?;
        return Err(refused.into());
    }
    let before = sim.ticks();
    thread::sleep(hold);
    let during = sim.ticks().saturating_sub(before);
    sim.set_paused(false)?;
    Ok((before, during))
}

fn check_determinism(level: &LevelFile, ticks: u64) -> anyhow::Result<()> {
    println!("Determinism check: ticks={ticks}");

    let mut runs = Vec::with_capacity(2);
    for _ in 0..2 {
        let mut world =
            WorldModel::with_config(level.initial_state()?, level.width, level.config)?;
        let input = InputAggregator::with_config(InputConfig {
            gain: 40.0,
            max_speed: None,
        })?;
        let mut hashes = Vec::with_capacity(ticks as usize);
        for step in 0..ticks {
            input.inject_sample(&synthetic_tilt(step), SourceKind::Gravity, Orientation::Deg0)?;
            world.set_avatar_velocity(input.latest_command());
            hashes.push(world.step()?.state_hash());
        }
        let events = world.drain_events();
        runs.push((hashes, events));
    }

    let (first, second) = (&runs[0], &runs[1]);
    if let Some(tick) = first.0.iter().zip(&second.0).position(|(a, b)| a != b) {
        bail!(
            "runs diverged at tick {}: {:#x} != {:#x}",
            tick + 1,
            first.0[tick],
            second.0[tick]
        );
    }
    if first.1 != second.1 {
        bail!("runs produced different field events");
    }

    println!(
        "Match: OK (final hash {:#x}, {} field events)",
        first.0.last().copied().unwrap_or_default(),
        first.1.len()
    );
    Ok(())
}
