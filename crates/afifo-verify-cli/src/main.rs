use afifo_verify::{HarnessConfig, Orchestrator, ScenarioReport, SweepPlan};
use clap::{Parser, Subcommand};
use log::info;
use miette::{IntoDiagnostic, Result, bail};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "afifo-verify",
    version,
    about = "Dual-clock asynchronous FIFO verification harness"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scenario suite once against the behavioral FIFO model.
    Run {
        /// TOML harness configuration; command-line values override it.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        depth: Option<usize>,

        /// Data width in bits.
        #[arg(long)]
        width: Option<usize>,

        /// Randomized batches per clock mode.
        #[arg(long)]
        repetitions: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Directory receiving one VCD waveform per scenario.
        #[arg(long)]
        vcd: Option<PathBuf>,

        /// Print reports as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Run the suite across the depth/width/repetition sweep.
    Sweep {
        #[arg(long)]
        seed: Option<u64>,

        /// Print outcomes as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct RunSummary<'a> {
    seed: u64,
    depth: usize,
    width: usize,
    repetitions: usize,
    reports: &'a [ScenarioReport],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            depth,
            width,
            repetitions,
            seed,
            vcd,
            json,
        } => {
            let mut harness = match config {
                Some(path) => HarnessConfig::load(&path).into_diagnostic()?,
                None => HarnessConfig::default(),
            };
            if let Some(depth) = depth {
                harness.depth = depth;
            }
            if let Some(width) = width {
                harness.width = width;
            }
            if let Some(repetitions) = repetitions {
                harness.repetitions = repetitions;
            }
            if seed.is_some() {
                harness.seed = seed;
            }
            run(harness, vcd, json)
        }
        Command::Sweep { seed, json } => sweep(seed.unwrap_or_else(rand::random), json),
    }
}

fn run(harness: HarnessConfig, vcd: Option<PathBuf>, json: bool) -> Result<()> {
    let mut orchestrator = Orchestrator::new(harness).into_diagnostic()?;
    if let Some(dir) = vcd {
        std::fs::create_dir_all(&dir).into_diagnostic()?;
        info!("writing waveforms to {}", dir.display());
        orchestrator = orchestrator.with_waveforms(dir);
    }
    let reports = orchestrator.run_all().into_diagnostic()?;

    let config = orchestrator.config();
    if json {
        let summary = RunSummary {
            seed: orchestrator.seed(),
            depth: config.depth,
            width: config.width,
            repetitions: config.repetitions,
            reports: &reports,
        };
        println!("{}", serde_json::to_string_pretty(&summary).into_diagnostic()?);
        return Ok(());
    }

    println!(
        "depth {} width {} repetitions {} seed {}",
        config.depth,
        config.width,
        config.repetitions,
        orchestrator.seed()
    );
    for report in &reports {
        println!(
            "  PASS {:<18} {:<10} written {:>5} read {:>5} rejected {:>2} t={}ns",
            report.kind,
            report.clock_mode,
            report.words_written,
            report.words_read,
            report.rejections,
            report.sim_time
        );
    }
    Ok(())
}

fn sweep(seed: u64, json: bool) -> Result<()> {
    let plan = SweepPlan::new(seed);
    let outcomes = plan.run();

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes).into_diagnostic()?);
    } else {
        println!("sweep seed {}", plan.seed());
        for outcome in &outcomes {
            let point = &outcome.point;
            match &outcome.result {
                Ok(reports) => println!(
                    "  PASS depth {:>2} width {:>4} repetitions {:>2} ({} scenarios)",
                    point.depth,
                    point.width,
                    point.repetitions,
                    reports.len()
                ),
                Err(err) => println!(
                    "  FAIL depth {:>2} width {:>4} repetitions {:>2}: {err}",
                    point.depth, point.width, point.repetitions
                ),
            }
        }
    }

    let failed = outcomes.iter().filter(|outcome| !outcome.passed()).count();
    if failed > 0 {
        bail!("{failed} of {} sweep points failed", outcomes.len());
    }
    Ok(())
}
