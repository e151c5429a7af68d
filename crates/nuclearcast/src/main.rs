use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use nuclearcast::{GenerateOptions, ProjectionFilter, Settings, Workspace, init_logging, to_json};

#[derive(Parser, Debug)]
#[command(name = "nuclearcast")]
#[command(about = "Nuclear share scenario forecasts with a microreactor adoption overlay")]
struct Args {
    /// Path to the data directory (default: ~/.nuclearcast/)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate, store and print scenario projections
    Generate {
        /// Scenario to project; repeat for several (default: conservative, base, aggressive)
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// First projected year (default: start of the horizon)
        #[arg(long)]
        start: Option<i32>,

        /// Last projected year (default: end of the horizon)
        #[arg(long)]
        end: Option<i32>,

        /// Skip the microreactor adoption overlay
        #[arg(long)]
        no_overlay: bool,

        #[arg(long)]
        pretty: bool,
    },

    /// Import historical observations from a YAML file
    ImportHistory { file: PathBuf },

    /// Print stored projections
    Scenarios {
        #[arg(short, long)]
        scenario: Option<String>,

        #[arg(long)]
        start: Option<i32>,

        #[arg(long)]
        end: Option<i32>,

        #[arg(long)]
        model_version: Option<String>,

        #[arg(long)]
        pretty: bool,
    },

    /// Retrain all models on the stored history
    Retrain {
        /// Number of cycles to run before exiting
        #[arg(long, default_value_t = 1)]
        cycles: usize,

        /// Seconds between cycles (default: retrain_interval_secs from config.yaml)
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Generate and store market insights from the history
    Insights {
        /// Print unexpired stored insights instead of generating new ones
        #[arg(long)]
        stored: bool,

        #[arg(long)]
        pretty: bool,
    },

    /// Score the history against the ensemble's drift and volatility baseline
    Evaluate {
        /// Print every stored evaluation for the ensemble version
        #[arg(long)]
        history: bool,

        #[arg(long)]
        pretty: bool,
    },

    /// Write a default config.yaml into the data directory
    Init,
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nuclearcast")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);

    // A broken config.yaml still gets logged with the default rotation
    let settings = Settings::load(&data_dir);
    let rotation = settings
        .as_ref()
        .map(|s| s.logging)
        .unwrap_or_default();
    init_logging(&data_dir, &args.log_level, rotation)?;

    if let Command::Init = args.command {
        let path = Settings::write_default(&data_dir)?;
        println!("{}", path.display());
        return Ok(());
    }

    let workspace = Workspace::with_settings(&data_dir, settings?)?;
    let today = jiff::Zoned::now().date();

    match args.command {
        Command::Generate {
            scenarios,
            start,
            end,
            no_overlay,
            pretty,
        } => {
            let rows = workspace.generate(&GenerateOptions {
                scenarios,
                start_year: start,
                end_year: end,
                include_overlay: !no_overlay,
            })?;
            println!("{}", to_json(&rows, pretty)?);
        }
        Command::ImportHistory { file } => {
            let count = workspace.import_history(&file)?;
            println!("imported {count} observation(s)");
        }
        Command::Scenarios {
            scenario,
            start,
            end,
            model_version,
            pretty,
        } => {
            let rows = workspace.stored(&ProjectionFilter {
                scenario,
                start_year: start,
                end_year: end,
                model_version,
            })?;
            println!("{}", to_json(&rows, pretty)?);
        }
        Command::Retrain {
            cycles,
            interval_secs,
        } => {
            let reports = workspace.retrain(cycles, interval_secs.map(Duration::from_secs))?;
            for (i, report) in reports.iter().enumerate() {
                println!(
                    "cycle {}: {} model(s) retrained, {} failed, {} observation(s)",
                    i + 1,
                    report.retrained.len(),
                    report.failures.len(),
                    report.observations
                );
                for failure in &report.failures {
                    println!("  {failure}");
                }
            }
        }
        Command::Insights { stored, pretty } => {
            let insights = if stored {
                workspace.stored_insights(today)?
            } else {
                workspace.insights(today)?
            };
            println!("{}", to_json(&insights, pretty)?);
        }
        Command::Evaluate { history, pretty } => {
            if history {
                println!("{}", to_json(&workspace.performance_history()?, pretty)?);
            } else {
                match workspace.evaluate(today)? {
                    Some(metrics) => println!("{}", to_json(&metrics, pretty)?),
                    None => println!("not enough history to evaluate"),
                }
            }
        }
        Command::Init => {}
    }

    tracing::info!("nuclearcast finished");
    Ok(())
}
