use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ecg_quality::config::{AppConfig, EvaluationSettings};
use ecg_quality::dataset::DatasetWalker;
use ecg_quality::evaluate::session::SessionOutcome;
use ecg_quality::report::store::ReportStore;
use ecg_quality::report::summary::{DatasetSummary, summarize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ecg-quality", version, about = "Batch ECG signal-quality evaluation")]
struct Cli {
    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every session of a dataset and write one metrics.json per session
    Evaluate {
        /// Dataset root (iteration/subject/session directories)
        #[arg(long, env = "DATASET_DIR")]
        input: Option<PathBuf>,

        /// Output root (defaults to the dataset root)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Sampling rate in Hz applied to every session
        #[arg(long)]
        sampling_rate: Option<f64>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,

        /// Sessions with fewer samples are skipped
        #[arg(long)]
        min_samples: Option<usize>,
    },

    /// Score a single ECG.csv file
    File {
        /// Tab-separated recording with an `ecg` column
        ecg: PathBuf,

        /// Where to write the report
        #[arg(short, long)]
        output: PathBuf,

        /// Sampling rate in Hz
        #[arg(long)]
        sampling_rate: Option<f64>,
    },

    /// Show mean score and missing count per method across existing reports
    Summary {
        /// Dataset root
        #[arg(long, env = "DATASET_DIR")]
        input: Option<PathBuf>,

        /// Report root (defaults to the dataset root)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Evaluate { input, output, sampling_rate, jobs, min_samples } => {
            // Resolve input: CLI/env > config
            let input = input
                .or(config.input_dir.clone())
                .context("No dataset given. Pass --input, set DATASET_DIR or input_dir in config.")?;
            let output = output.or(config.output_dir.clone()).unwrap_or_else(|| input.clone());

            if let Some(rate) = sampling_rate {
                config.sampling_rate = rate;
            }
            if let Some(min) = min_samples {
                config.min_samples = min;
            }
            if jobs > 0 {
                config.workers = jobs;
            }
            let settings = EvaluationSettings::from_config(&config)
                .context("Invalid configuration")?;

            log::info!("Dataset: {}", input.display());
            log::info!("Reports: {}", output.display());

            let result = ecg_quality::evaluate::evaluate_dataset(
                &DatasetWalker::new(&input),
                &ReportStore::new(&output),
                &settings,
            )
            .context("Evaluation failed")?;
            println!(
                "Evaluation complete: {} sessions, {} recorded, {} skipped, {} failed",
                result.total, result.recorded, result.skipped, result.failed
            );
        }

        Commands::File { ecg, output, sampling_rate } => {
            if let Some(rate) = sampling_rate {
                config.sampling_rate = rate;
            }
            config.workers = 1;
            let settings = EvaluationSettings::from_config(&config)
                .context("Invalid configuration")?;

            let outcome = ecg_quality::evaluate::evaluate_file(&ecg, &output, &settings)
                .context("Evaluation failed")?;
            match outcome {
                SessionOutcome::Recorded => println!("Saved metrics to {}", output.display()),
                SessionOutcome::Skipped(reason) => {
                    anyhow::bail!("{} was not scored: {}", ecg.display(), reason)
                }
                SessionOutcome::Failed(reason) => {
                    anyhow::bail!("{} failed: {}", ecg.display(), reason)
                }
            }
        }

        Commands::Summary { input, output } => {
            let input = input
                .or(config.input_dir.clone())
                .context("No dataset given. Pass --input, set DATASET_DIR or input_dir in config.")?;
            let output = output.or(config.output_dir.clone()).unwrap_or_else(|| input.clone());

            let summary = summarize(&DatasetWalker::new(&input), &ReportStore::new(&output));
            if summary.reports == 0 {
                println!("No reports found. Run `ecg-quality evaluate` first.");
                return Ok(());
            }
            print_summary(&summary);
        }
    }

    Ok(())
}

/// Print per-method means with the Missing count for each.
fn print_summary(summary: &DatasetSummary) {
    println!("Dataset Summary");
    println!("===============");
    println!("Sessions:         {}", summary.sessions);
    println!("Reports:          {}", summary.reports);
    if summary.unreadable > 0 {
        println!("Unreadable:       {}", summary.unreadable);
    }
    println!();

    println!("{:<10} {:<16} {:>7} {:>9} {:>8}", "Family", "Method", "Scored", "Mean", "Missing");
    println!("{}", "-".repeat(54));

    for ((family, method), stats) in &summary.methods {
        let mean = match stats.mean() {
            Some(m) => format!("{:.3}", m),
            None => "-".to_string(),
        };
        println!(
            "{:<10} {:<16} {:>7} {:>9} {:>8}",
            family, method, stats.count, mean, stats.missing
        );
    }
}
