use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use retireplan::analytics::AnalyticsConfig;
use retireplan::api::{ProfileArgs, build_params, build_report, run_http_server};

#[derive(Parser, Debug)]
#[command(
    name = "retireplan",
    about = "Monte Carlo retirement projections with a planning score and recommendations"
)]
struct Cli {
    /// Analytics configuration (score weights, label bands, cash bucket).
    #[arg(long, global = true, env = "RETIREPLAN_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// Run one projection and print the report as JSON.
    Simulate(ProfileArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalyticsConfig, String> {
    match path {
        Some(path) => {
            let config = AnalyticsConfig::load(path).map_err(|e| e.to_string())?;
            info!(path = %path.display(), "loaded analytics config");
            Ok(config)
        }
        None => {
            warn!("no analytics config given, using defaults");
            Ok(AnalyticsConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port, config).await {
                eprintln!("Server error: {e}");
                return ExitCode::FAILURE;
            }
        }
        Command::Simulate(profile) => {
            let report = build_params(profile).and_then(|params| build_report(&params, &config));
            let report = match report {
                Ok(report) => report,
                Err(e) => {
                    eprintln!("Invalid input: {e}");
                    return ExitCode::FAILURE;
                }
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Failed to encode report: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
    }
    ExitCode::SUCCESS
}
