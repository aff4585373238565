//! `dinobot` – plays the browser dino game by watching two screen boxes.
//!
//! Start-up sequence:
//!
//! 1. Loads `dinobot.toml` (writing the defaults on first run) and applies
//!    `DINOBOT_*` environment overrides.
//! 2. Prints the effective configuration and counts down so the game window
//!    can be focused.
//! 3. Presses jump once to start the game, then hands over to the control
//!    loop until **Ctrl-C**.
//! 4. Prints the final statistics.

mod config;
mod report;

use colored::Colorize;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};

use dinobot_hal::{KeyboardActuator, ScreenSampler};
use dinobot_runtime::{ControlLoop, DebugSink, StopSignal, TracingObserver, init_tracing};
use dinobot_types::DinoError;

use config::Config;
use report::ConsoleReporter;

/// Pause between the priming jump and the first scan.
const GAME_START_SETTLE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let _telemetry = init_tracing("dinobot");

    print_banner();

    let path = config::config_path(std::env::args().nth(1));
    let mut cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let cfg = Config::default();
            match config::save_to(&cfg, &path) {
                Ok(()) => println!(
                    "  {} {}",
                    "Wrote default configuration to".dimmed(),
                    path.display()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    config::apply_env_overrides(&mut cfg);

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let stop = StopSignal::new();
    let stop_handler = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping …".yellow().bold());
        stop_handler.stop();
    }) {
        error!(error = %e, "failed to install Ctrl-C handler");
    }

    match run(&cfg, &stop) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bot stopped on a fatal error");
            println!("{}: {}", "Fatal".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cfg: &Config, stop: &StopSignal) -> Result<(), DinoError> {
    let loop_config = cfg.to_loop_config()?;
    print_configuration(cfg);

    println!();
    println!("{}", "Make sure the dino game is visible where you calibrated it.".bold());
    println!("  Press Ctrl-C to stop.");
    if !countdown(stop, cfg.start_delay_secs) {
        let summary = report::not_started_summary(loop_config.poll_interval);
        println!("{}", report::summary_block(&summary, None));
        return Ok(());
    }

    let sampler = ScreenSampler::new();
    let actuator = KeyboardActuator::new()?;
    let mut bot = ControlLoop::new(loop_config, Box::new(sampler), Box::new(actuator))?
        .with_observer(Box::new(ConsoleReporter))
        .with_observer(Box::new(TracingObserver));
    if cfg.debug.enabled {
        bot = bot.with_debug_sink(DebugSink::spawn(&cfg.debug.folder, cfg.debug.every)?);
    }
    info!(run_id = %bot.run_id(), "bot assembled");

    println!("{}", "Starting game...".cyan());
    bot.prime(Instant::now());
    if stop.sleep(GAME_START_SETTLE) {
        println!("{}", "Bot is running.".green().bold());
        let result = bot.run(stop);
        let summary = bot.summary();
        println!("{}", report::summary_block(&summary, bot.debug_folder()));
        result?;
    } else {
        println!("{}", report::summary_block(&bot.summary(), bot.debug_folder()));
    }
    Ok(())
}

/// Count down `secs` seconds.  Returns `false` if interrupted.
fn countdown(stop: &StopSignal, secs: u64) -> bool {
    for remaining in (1..=secs).rev() {
        println!("  {} {remaining}…", "Starting in".dimmed());
        if !stop.sleep(Duration::from_secs(1)) {
            return false;
        }
    }
    !stop.is_stopped()
}

fn print_configuration(cfg: &Config) {
    let layout = &cfg.layout;
    println!("{}", "CONFIGURATION:".bold());
    println!(
        "   Game region: ({}, {}) to ({}, {})",
        layout.game.x,
        layout.game.y,
        layout.game.right(),
        layout.game.bottom()
    );
    println!("   Near box: {}", layout.near);
    println!("   Far box: {}", layout.far);
    println!("   Dark threshold: < {}", cfg.dark_threshold);
    println!("   Obstacle trigger: > {} dark pixels", cfg.trigger_count);
    println!("   Cooldown: {:.0} ms", cfg.cooldown_secs * 1000.0);
    println!("   Scan interval: {:.0} ms", cfg.poll_interval_secs * 1000.0);
    let debug = if cfg.debug.enabled {
        format!("enabled, every {} frames → {}/", cfg.debug.every, cfg.debug.folder.display())
            .green()
    } else {
        "disabled".yellow()
    };
    println!("   Debug images: {debug}");
}

fn print_banner() {
    println!();
    println!("{}", "=".repeat(70).bold().cyan());
    println!("{}", "  DINO GAME BOT".bold().cyan());
    println!("{}", "=".repeat(70).bold().cyan());
    println!("  {} {}", "version".dimmed(), env!("CARGO_PKG_VERSION").bold());
    println!();
}
