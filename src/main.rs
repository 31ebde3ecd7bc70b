use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hearth::settings::EngineSettings;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "hearth",
    about = "Personal budgeting engine: income allocation, mortgage payoff, portfolio and tax estimates"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// JSON file overriding tax and partner settings
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Print the dashboard for a snapshot file.
    Summary {
        #[arg(long)]
        snapshot: PathBuf,
        /// Month to report, e.g. 2024-3 (defaults to the current month)
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

fn init_tracing() {
    let log_format = std::env::var("HEARTH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { port, settings } => {
            match EngineSettings::load_or_default(settings.as_deref()) {
                Ok(settings) => hearth::api::run_http_server(port, settings)
                    .await
                    .map_err(hearth::Error::from),
                Err(e) => Err(e),
            }
        }
        Commands::Summary {
            snapshot,
            period,
            settings,
        } => EngineSettings::load_or_default(settings.as_deref()).and_then(|settings| {
            let json = hearth::api::summary_json(&snapshot, period.as_deref(), &settings)?;
            println!("{json}");
            Ok(())
        }),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "hearth failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
