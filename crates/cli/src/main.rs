use clap::Parser;
use shmcache::ConfigLoader;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

use commands::Commands;

#[derive(Parser)]
#[command(name = "shmcache")]
#[command(about = "Inspect and manage shared memory caches", long_about = None)]
#[command(version)]
struct Cli {
    /// Installation scope (defaults to the current directory)
    #[arg(long, global = true)]
    scope: Option<String>,

    /// Cache namespace
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// JSON configuration file (takes precedence over SHMCACHE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Lock wait limit in milliseconds; 0 waits forever
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_NAMESPACE: &str = "default";

fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;
    shmcache_utils::tracing::init("warn").map_err(|e| eyre::eyre!(e))?;

    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => ConfigLoader::load_from(Some(path), DEFAULT_NAMESPACE)?,
        None => ConfigLoader::load(DEFAULT_NAMESPACE)?,
    };
    let loaded = ConfigLoader::apply_cli_args(loaded, cli.scope, cli.namespace, cli.timeout_ms)?;
    tracing::debug!(
        source = ?loaded.source,
        scope = %loaded.config.scope,
        namespace = %loaded.config.namespace,
        "configuration resolved"
    );

    let outcome = cli.command.execute(loaded.config)?;
    Ok(outcome.exit_code())
}
