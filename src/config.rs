use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_LOG_FILE: &str = "serial_log.txt";

#[derive(Parser, Debug)]
#[clap(name = "serial-term", version, about = "Interactive serial terminal")]
pub struct Cli {
    /// Serial port (e.g., COM3, /dev/ttyUSB0)
    #[clap(long)]
    pub port: Option<String>,

    /// Baud rate (default 9600)
    #[clap(long)]
    pub baud: Option<u32>,

    /// Read timeout in milliseconds
    #[clap(long)]
    pub timeout_ms: Option<u64>,

    /// File received lines are appended to
    #[clap(long)]
    pub log_file: Option<PathBuf>,

    /// Optional TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Keep the screen contents after connecting
    #[clap(long)]
    pub no_clear: bool,
}

/// Values accepted in the configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    port: Option<String>,
    baud: Option<u32>,
    timeout_ms: Option<u64>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: Option<String>,
    pub baud: u32,
    pub timeout: Duration,
    pub log_file: PathBuf,
    pub clear_screen: bool,
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let file = match cli.config {
        Some(ref path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            parse_file_config(&content)?
        }
        None => FileConfig::default(),
    };

    Ok(merge(cli, file))
}

fn parse_file_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).context("Failed to parse config file")
}

// CLI flags take precedence over the file.
fn merge(cli: &Cli, file: FileConfig) -> Config {
    Config {
        port: cli.port.clone().or(file.port),
        baud: cli.baud.or(file.baud).unwrap_or(DEFAULT_BAUD),
        timeout: Duration::from_millis(
            cli.timeout_ms.or(file.timeout_ms).unwrap_or(DEFAULT_TIMEOUT_MS),
        ),
        log_file: cli
            .log_file
            .clone()
            .or(file.log_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        clear_screen: !cli.no_clear,
    }
}
