use clap::Subcommand;
use shmcache::ShmCacheConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod admin;
mod entry;

/// What a command found, mapped onto the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// `get`/`has` on an absent identifier
    Miss,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Miss => ExitCode::from(1),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a value (from the argument, --file, or stdin)
    Set {
        identifier: String,
        value: Option<String>,
        /// Read the value from a file
        #[arg(long, conflicts_with = "value")]
        file: Option<PathBuf>,
    },
    /// Write a stored value to stdout
    Get { identifier: String },
    /// Check whether an identifier is present
    Has { identifier: String },
    /// Remove one entry
    Remove { identifier: String },
    /// Remove every entry
    Flush,
    /// List registered identifiers
    List,
    /// Run garbage collection (entries never expire, so this does nothing)
    Gc,
    /// Show the semaphore state of the cache lock
    Locks {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Force the cache lock back to idle after a holder crashed
    ResetLocks,
    /// Remove all entries, the registry and the lock semaphores
    Destroy,
}

impl Commands {
    pub fn execute(self, config: ShmCacheConfig) -> eyre::Result<Outcome> {
        match self {
            Commands::Set {
                identifier,
                value,
                file,
            } => entry::set(config, &identifier, value, file),
            Commands::Get { identifier } => entry::get(config, &identifier),
            Commands::Has { identifier } => entry::has(config, &identifier),
            Commands::Remove { identifier } => entry::remove(config, &identifier),
            Commands::Flush => admin::flush(config),
            Commands::List => admin::list(config),
            Commands::Gc => admin::gc(config),
            Commands::Locks { json } => admin::locks(config, json),
            Commands::ResetLocks => admin::reset_locks(config),
            Commands::Destroy => admin::destroy(config),
        }
    }
}
