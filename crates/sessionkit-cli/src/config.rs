//! CLI + TOML configuration, merged the way the teacher's daemon resolves
//! its config: CLI flags are parsed first, an optional TOML file is
//! loaded and layered underneath (CLI wins on conflicts).

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Parser)]
#[command(name = "sessionkit-cli", about = "Demo dispatch loop over the session core")]
pub struct Args {
    /// Path to an optional TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Suspend timeout in milliseconds for the demo's `wait`-for-reply flow.
    #[arg(long)]
    pub suspend_timeout_ms: Option<u64>,

    /// Enable verbose (debug-level) logging.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    suspend_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub suspend_timeout_ms: u64,
    pub verbose: bool,
}

const DEFAULT_SUSPEND_TIMEOUT_MS: u64 = 30_000;

pub fn resolve(args: Args) -> Result<ResolvedConfig, ConfigError> {
    let file_config = match &args.config {
        Some(path) => {
            let contents =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
                    path: path.clone(),
                    source: e,
                })?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::Parse { path: path.clone(), source: e })?
        }
        None => FileConfig::default(),
    };

    let suspend_timeout_ms = args
        .suspend_timeout_ms
        .or(file_config.suspend_timeout_ms)
        .unwrap_or(DEFAULT_SUSPEND_TIMEOUT_MS);

    Ok(ResolvedConfig { suspend_timeout_ms, verbose: args.verbose })
}
