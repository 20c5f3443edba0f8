//! ncl: neutralize live predictions against risky features and write the
//! round's submission file.

mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ncl_common::RunConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ncl")]
#[command(author, version, about = "Era-wise feature neutralization for tournament submissions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (.toml, .yaml, .json); defaults to $NCL_CONFIG or ./ncl.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Neutralize live predictions and write the submission CSV
    Submit {
        /// Tournament round (overrides data.round)
        #[arg(short, long)]
        round: Option<u32>,

        /// Fraction of the feature exposure to remove
        #[arg(long)]
        proportion: Option<f64>,

        /// Skip Gaussian rank normalisation before neutralizing
        #[arg(long)]
        no_normalize: bool,
    },

    /// Report the features whose target correlation drifted the most
    Audit {
        /// Number of features to report (overrides audit.top_n)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ncl=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("ncl {}", env!("CARGO_PKG_VERSION"));

    let mut config: RunConfig = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Submit {
            round,
            proportion,
            no_normalize,
        } => {
            if round.is_some() {
                config.data.round = round;
            }
            if let Some(p) = proportion {
                config.neutralization.proportion = p;
            }
            if no_normalize {
                config.neutralization.normalize = false;
            }
            config.validate()?;

            let summary = pipeline::run_submission(&config)?;
            info!(
                "Submission for model {} written to {}",
                summary.model_id,
                summary.output_path.display()
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Audit { top } => {
            if let Some(n) = top {
                config.audit.top_n = n;
            }
            let report = pipeline::run_audit(&config)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::ShowConfig => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}
