//! main.rs — UWB locator simulator entry point
//!
//! Drives one `Receiver` with synthetic ranges on a fixed tick:
//!   1. Motion: advance the tag along its path
//!   2. Radio: range every anchor (noise, NLOS, dropouts, range limit)
//!   3. Locator: `Receiver::update` with the epoch's samples
//!   4. Telemetry: one JSON line per epoch (ground truth vs. estimate) on stdout,
//!      periodic `info!` summaries on stderr
//!
//! Time inside the locator is simulation time, so `--speed` changes the wall
//! clock pace only, never staleness behaviour.

mod scenarios;
mod tag_sim;
mod telemetry;
mod uwb_physics;

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uwb_locator::{linear_four, LocatorConfig, Receiver};
use uwb_types::{CalculationLevel, CalculationResult, UpdateLevel};

use scenarios::ScenarioConfig;
use tag_sim::{ArenaConfig, TagSim};
use telemetry::{EpochTelemetry, ErrorStats};
use uwb_physics::{RadioConfig, RadioModel};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "uwb-sim", about = "Synthetic UWB ranging harness for the locator")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Number of epochs to run (overrides [simulation].epochs)
    #[arg(long)]
    epochs: Option<u32>,
    /// Simulation speed multiplier (1.0 = real-time)
    #[arg(long, default_value = "1.0")]
    speed: f64,
    /// Calculation level: low, medium or high (overrides [locator])
    #[arg(long)]
    level: Option<String>,
    /// Scenario preset: default, high_nlos, anchor_dropout, anchor_drift, sparse_high
    #[arg(long, default_value = "default")]
    preset: String,
    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

// ── Config structs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FullConfig {
    arena:      ArenaConfig,
    simulation: SimulationConfig,
    uwb_radio:  RadioConfig,
    #[serde(default)]
    locator:    LocatorConfig,
}

#[derive(Debug, Deserialize)]
struct SimulationConfig {
    update_rate_hz: f64,
    epochs:         u32,
    /// Log a summary every this many epochs
    summary_every:  u32,
    receiver_serial: String,
}

fn load_config(path: &str) -> anyhow::Result<FullConfig> {
    let config_str = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            warn!("config {path} not readable ({e}), using built-in defaults");
            include_str!("../config.toml").to_string()
        }
    };
    toml::from_str(&config_str).with_context(|| format!("invalid config {path}"))
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uwb_simulator=info,uwb_locator=info".into()),
        )
        .init();

    let args = Args::parse();
    let cfg = load_config(&args.config)?;

    let scenario = scenarios::preset(&args.preset)
        .ok_or_else(|| anyhow!("unknown preset {:?}", args.preset))?;

    let mut locator = cfg
        .locator
        .clone()
        .with_overrides(|key| std::env::var(key).ok())
        .context("locator config")?;
    if let Some(level) = &args.level {
        locator.calculation_level = level.parse()?;
    }
    if let Some(level) = scenario.level_override() {
        locator.calculation_level = level;
    }

    let radio = RadioModel::new(&cfg.uwb_radio).context("uwb_radio noise parameters")?;
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    info!(
        "📡 UWB simulator starting — {} anchors, preset '{}', level {:?}, update {:?}",
        cfg.arena.anchors.len(),
        scenario.name,
        locator.calculation_level,
        locator.update_level,
    );

    let epochs = args.epochs.unwrap_or(cfg.simulation.epochs);
    let stats = sim_loop(&cfg, &locator, &scenario, &radio, rng, epochs, args.speed).await?;

    match stats.mean_error_m() {
        Some(mean) => info!(
            "✅ done — {} epochs, {} resolved, mean error {:.3} m, max {:.3} m, errored {:.1}%",
            stats.epochs,
            stats.resolved,
            mean,
            stats.max_error_m,
            stats.errored_fraction() * 100.0
        ),
        None => warn!("done — {} epochs, no resolved positions", stats.epochs),
    }
    Ok(())
}

// ── Simulation loop ───────────────────────────────────────────────────────────

async fn sim_loop(
    cfg: &FullConfig,
    locator: &LocatorConfig,
    scenario: &ScenarioConfig,
    radio: &RadioModel,
    mut rng: StdRng,
    epochs: u32,
    speed: f64,
) -> anyhow::Result<ErrorStats> {
    let positive = |x: f64| x.is_finite() && x > 0.0;
    if !positive(cfg.simulation.update_rate_hz) || !positive(speed) {
        return Err(anyhow!("update_rate_hz and speed must be positive"));
    }
    let epoch_s = 1.0 / cfg.simulation.update_rate_hz;
    let mut ticker = interval(Duration::from_secs_f64(epoch_s / speed));

    let mut tag = TagSim::new(&cfg.arena);
    let mut receiver = Receiver::new(cfg.simulation.receiver_serial.clone(), locator);
    for anchor in &tag.anchors {
        receiver.set_anchor_position(anchor.id, anchor.surveyed);
    }

    let start = Instant::now();
    let mut stats = ErrorStats::default();
    let mut window = ErrorStats::default();
    let summary_every = cfg.simulation.summary_every.max(1);
    let stdout = std::io::stdout();

    info!("⚙ Sim loop running at {} Hz × {speed} for {epochs} epochs", cfg.simulation.update_rate_hz);

    for epoch in 0..epochs {
        ticker.tick().await;

        tag.tick(epoch_s as f32);
        if let Some((id, offset)) = scenario.drift_at(epoch) {
            tag.drift_anchor(id, offset);
        }

        let ranges = radio.generate_epoch(tag.position, &tag.anchors, scenario, epoch, &mut rng);
        let now = start + Duration::from_secs_f64(tag.t_s as f64);
        let anchors_heard = ranges.samples.len();
        let update = receiver.update(ranges.samples, now);

        let result: CalculationResult = match (update.result, receiver.update_level()) {
            (Some(result), _) => result,
            (None, UpdateLevel::None) => *receiver.calculate(),
            (None, _) => *receiver.latest_result(),
        };

        let samples = receiver.engine().samples();
        let linear = match samples.as_slice() {
            [a, b, c, d, ..] => linear_four([a, b, c, d]),
            _ => None,
        };

        let record = EpochTelemetry {
            epoch,
            t_s: tag.t_s,
            truth: tag.position,
            error_m: result.position().map(|p| p.distance(tag.position)),
            linear_error_m: linear.map(|p| p.distance(tag.position)),
            result,
            anchors_heard,
            nlos: ranges.nlos,
            dropped: ranges.dropped,
            out_of_range: ranges.out_of_range,
            rejected: update.rejected,
        };
        debug!(epoch, events = update.events.len(), "epoch");

        {
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &record)?;
            writeln!(out)?;
        }

        stats.record(&record);
        window.record(&record);
        if (epoch + 1) % summary_every == 0 {
            log_summary(epoch + 1, locator.calculation_level, &window);
            window = ErrorStats::default();
        }
    }

    Ok(stats)
}

fn log_summary(epoch: u32, level: CalculationLevel, window: &ErrorStats) {
    let mean = window.mean_error_m().map(|m| format!("{m:.3} m")).unwrap_or_else(|| "n/a".into());
    info!(
        "epoch {epoch}: mean error {mean}, max {:.3} m, errored {:.0}%, kinds {:?}, lost {} dropped / {} out of range ({level:?})",
        window.max_error_m,
        window.errored_fraction() * 100.0,
        window.kinds,
        window.dropped,
        window.out_of_range,
    );
}
