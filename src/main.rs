//! Topic Sync - command line runner
//!
//! Connects every topic to the configured backend, logs what arrives and
//! forwards `<topic> <payload>` lines from stdin to the matching stream.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use topic_sync::observability::{init_default_logging, init_logging, LogFormat};
use topic_sync::protocol::{Record, Topic};
use topic_sync::providers::EnvCredentials;
use topic_sync::session::{SessionManager, Subscriber};
use topic_sync::SyncConfig;
use tracing::{error, info, warn, Level};

/// Multiplexed topic session runner
#[derive(Parser)]
#[command(name = "topic-sync")]
#[command(about = "Keep per-topic streams to a sync backend open and log their records")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect all topics until interrupted
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["topic-sync.toml", "config/topic-sync.toml"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        1 => init_logging(Level::DEBUG, log_format_from_env(), false),
        _ => init_logging(Level::TRACE, log_format_from_env(), true),
    }

    info!("Starting topic-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_session(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Shutdown complete");
}

fn log_format_from_env() -> LogFormat {
    LogFormat::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
}

fn load_configuration(
    config_path: Option<&PathBuf>,
) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(SyncConfig::load_from_file(path)?);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(SyncConfig::load_from_file(&path)?);
        }
    }

    Err(
        "No configuration file found. Provide one with -c/--config or create topic-sync.toml"
            .into(),
    )
}

/// Logs every callback
struct LogSubscriber;

impl Subscriber for LogSubscriber {
    fn on_data_received(&self, topic: Topic, payload: &Record) {
        let record = serde_json::Value::Object(payload.clone());
        info!(topic = %topic, record = %record, "Record received");
    }

    fn on_connection_status_changed(&self, topic: Topic, connected: bool) {
        info!(topic = %topic, connected, "Connection status changed");
    }

    fn on_error(&self, topic: Topic, message: &str) {
        warn!(topic = %topic, "{}", message);
    }
}

async fn run_session(config: SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = Arc::new(EnvCredentials::new(config.auth.token_env.clone()));
    let manager = SessionManager::builder(config)
        .with_credentials(credentials)
        .build()?;

    let subscriber = Arc::new(LogSubscriber);
    for topic in Topic::ALL {
        manager.register_subscriber(topic, &subscriber);
    }
    manager.connect();

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("Session running; send `<topic> <payload>` lines on stdin");

    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
                break;
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => forward_line(&manager, &line),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    manager.disconnect();
    Ok(())
}

/// Split `"<topic> <payload>"` (pure function)
fn parse_command_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (topic, payload) = line.split_once(char::is_whitespace)?;
    Some((topic, payload.trim_start()))
}

fn forward_line(manager: &SessionManager, line: &str) {
    let Some((topic, payload)) = parse_command_line(line) else {
        if !line.trim().is_empty() {
            warn!("Expected `<topic> <payload>`, got: {}", line.trim());
        }
        return;
    };

    match topic.parse::<Topic>() {
        Ok(topic) => {
            manager.send(topic, payload);
        }
        Err(e) => warn!("{}", e),
    }
}

fn handle_config_command(
    config: &SyncConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        assert_eq!(
            parse_command_line("system {\"ping\":1}"),
            Some(("system", "{\"ping\":1}"))
        );
        assert_eq!(
            parse_command_line("  /clusters   {\"a\": 1} "),
            Some(("/clusters", "{\"a\": 1}"))
        );
        assert_eq!(parse_command_line("analytics"), None);
        assert_eq!(parse_command_line("   "), None);
    }

    #[test]
    fn test_cli_parses_run_and_config() {
        let cli = Cli::parse_from(["topic-sync", "-c", "x.toml", "-vv", "run"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Run));

        let cli = Cli::parse_from(["topic-sync", "config", "--show"]);
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }
}
