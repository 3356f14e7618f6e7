use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lapdelta::telemetry::loader::drivers;
use lapdelta::{
    AnalysisConfig, LapDeltaError, analyze_lap, compare, load_laps_jsonl, select_lap,
    writer::write_report,
};
use log::{LevelFilter, debug, info};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Print debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Analysis config file, defaults to the one in the user config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a single lap
    Analyze {
        #[arg(short, long)]
        input: PathBuf,

        /// Driver code, the fastest lap of the file is used when omitted
        #[arg(short, long)]
        driver: Option<String>,

        #[arg(short, long)]
        lap: Option<u32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare the laps of two drivers
    Compare {
        #[arg(short, long)]
        input: PathBuf,

        /// File holding driver B's laps, when not in the input file
        #[arg(short, long)]
        against: Option<PathBuf>,

        #[arg(long)]
        driver_a: String,

        #[arg(long)]
        driver_b: String,

        #[arg(long)]
        lap_a: Option<u32>,

        #[arg(long)]
        lap_b: Option<u32>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the active config, or write the defaults with --init
    Config {
        #[arg(long)]
        init: bool,
    },
}

fn analyze(
    input: &Path,
    driver: Option<&str>,
    lap: Option<u32>,
    output: Option<&Path>,
    config: &AnalysisConfig,
) -> Result<(), LapDeltaError> {
    let laps = load_laps_jsonl(input)?;
    let selected = select_lap(&laps, driver, lap)?;
    let report = analyze_lap(selected, config);
    write_report(output, &report)
}

#[allow(clippy::too_many_arguments)]
fn compare_drivers(
    input: &Path,
    against: Option<&Path>,
    driver_a: &str,
    driver_b: &str,
    lap_a: Option<u32>,
    lap_b: Option<u32>,
    output: Option<&Path>,
    config: &AnalysisConfig,
) -> Result<(), LapDeltaError> {
    let laps = load_laps_jsonl(input)?;
    let other_laps = match against {
        Some(path) => load_laps_jsonl(path)?,
        None => laps.clone(),
    };
    debug!(
        "Drivers available: {:?} / {:?}",
        drivers(&laps),
        drivers(&other_laps)
    );

    let a = select_lap(&laps, Some(driver_a), lap_a)?;
    let b = select_lap(&other_laps, Some(driver_b), lap_b)?;
    let report = compare(a, b, config).ok_or_else(|| LapDeltaError::InvalidUserInput {
        field: "input".to_string(),
        reason: format!("laps of {driver_a} and {driver_b} are empty or have no speed channel"),
    })?;
    write_report(output, &report)
}

fn config_command(init: bool, path: Option<&Path>) -> Result<(), LapDeltaError> {
    if init {
        let defaults = AnalysisConfig::default();
        let written = match path {
            Some(path) => {
                defaults.save_to(path)?;
                path.to_path_buf()
            }
            None => defaults.save()?,
        };
        info!("Default config written to {:?}", written);
        println!("{}", written.display());
        return Ok(());
    }
    write_report(None, &AnalysisConfig::resolve(path)?)
}

fn run(cli: &Args) -> Result<(), LapDeltaError> {
    let config_path = cli.config.as_deref();
    match &cli.command {
        Commands::Analyze {
            input,
            driver,
            lap,
            output,
        } => analyze(
            input,
            driver.as_deref(),
            *lap,
            output.as_deref(),
            &AnalysisConfig::resolve(config_path)?,
        ),
        Commands::Compare {
            input,
            against,
            driver_a,
            driver_b,
            lap_a,
            lap_b,
            output,
        } => compare_drivers(
            input,
            against.as_deref(),
            driver_a,
            driver_b,
            *lap_a,
            *lap_b,
            output.as_deref(),
            &AnalysisConfig::resolve(config_path)?,
        ),
        Commands::Config { init } => config_command(*init, config_path),
    }
}

fn main() {
    let cli = Args::parse();
    if cli.verbose || cfg!(debug_assertions) {
        colog::default_builder()
            .filter_level(if cli.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            })
            .init();
    }

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
