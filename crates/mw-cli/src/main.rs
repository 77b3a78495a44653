use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{CheckArgs, SourceArgs};

#[derive(Parser)]
#[command(name = "mirrorwatch")]
#[command(about = "Verify that mirror repositories keep up with the authoritative host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or replay) every catalog and report mirror divergences
    Check(CheckArgs),

    /// Build every catalog live and refresh the snapshot cache; no comparison
    Snapshot(SourceArgs),

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> ci ...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // dev convenience; silent when absent
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Check(args) => commands::check::run(args).await,
        Commands::Snapshot(args) => commands::snapshot::run(args).await,
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = mw_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
