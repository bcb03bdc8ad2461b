//! Brain Console - Line-Oriented Front-End for the Brain Bridge
//!
//! Reads one query per line from stdin, sends it through the bridge and
//! prints the answer. Progress and backend errors are printed as they
//! arrive.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the default socket
//! brain-console
//!
//! # Custom socket path
//! brain-console --socket-path /tmp/brain.sock
//!
//! # With config file and detailed progress
//! brain-console --config ~/.config/brain-bridge/bridge.toml --verbose
//!
//! # Bridge logging
//! RUST_LOG=bridge_core=debug brain-console
//! ```
//!
//! # Commands
//!
//! - `/status`: Show the session status
//! - `/reset`: Start a fresh backend session
//! - `/help`: List commands
//! - `/quit`: Exit (also Ctrl-D or Ctrl-C)

mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use bridge_core::{
    load_config_from_path, BrainClient, BridgeError, ConfigOverrides, ErrorNotice,
};

/// Brain Console - talk to the Brain from a terminal
#[derive(Parser, Debug)]
#[command(name = "brain-console")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Unix socket the Brain backend listens on
    #[arg(short = 's', long, env = "BRAIN_BRIDGE_SOCKET", value_name = "PATH")]
    socket_path: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "BRAIN_BRIDGE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ask the backend for detailed progress
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Advisory query timeout forwarded to the backend (milliseconds)
    #[arg(short = 't', long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "BRAIN_BRIDGE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Console commands
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Query(&'a str),
    Status,
    Reset,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "" => Self::Empty,
            "/status" => Self::Status,
            "/reset" => Self::Reset,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            other if other.starts_with('/') => Self::Unknown(other),
            _ => Self::Query(line),
        }
    }
}

/// Initialize logging to stderr so answers on stdout stay clean
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("bridge_console={level},bridge_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn overrides_from(args: &Args) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    if let Some(path) = &args.socket_path {
        overrides = overrides.with_socket_path(path.clone());
    }
    if args.verbose {
        overrides = overrides.with_verbose_mode(true);
    }
    if let Some(ms) = args.timeout_ms {
        overrides = overrides.with_timeout_ms(ms);
    }
    overrides
}

/// Whether an error notice must be printed as it arrives
///
/// The one error recorded on a task travels with its answer. Anything else
/// would otherwise never reach the screen.
fn shown_live(notice: &ErrorNotice) -> bool {
    !notice.attached
}

fn register_listeners(client: &BrainClient) -> Result<()> {
    client.on_progress(|notice| eprintln!("{}", render::intent(&notice.intent)))?;
    client.on_error(|notice| {
        if shown_live(notice) {
            eprintln!("{}", render::intent(&notice.intent));
        }
    })?;
    client.on_session_reset(|status| println!("new {}", render::status(status)))?;
    client.on_session_event(|payload| info!(payload = %payload, "Session event"))?;
    Ok(())
}

async fn handle(client: &BrainClient, command: Command<'_>) -> bool {
    match command {
        Command::Empty => {}
        Command::Quit => return false,
        Command::Help => {
            println!("type a question, or one of: /status /reset /help /quit");
        }
        Command::Status => println!("{}", render::status(&client.refresh().await)),
        Command::Reset => match client.reset().await {
            Ok(_) => {}
            Err(BridgeError::SessionBusy { task_id }) => {
                println!("a query is still running ({task_id}); try again when it finishes");
            }
            Err(e) => println!("reset failed: {e}"),
        },
        Command::Unknown(name) => println!("unknown command {name}; try /help"),
        Command::Query(text) => match client.submit(text).await {
            Ok(resolution) => println!("{}", render::resolution(&resolution)),
            Err(e) => println!("{e}"),
        },
    }
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = load_config_from_path(args.config.clone()).context("Failed to load config")?;
    overrides_from(&args)
        .apply(&mut config)
        .context("Invalid configuration")?;

    info!(
        socket_path = ?config.transport.socket_path,
        source = %config.source(),
        "Connecting to Brain"
    );

    let client = BrainClient::connect(&config).await.with_context(|| {
        format!(
            "Could not reach the Brain at {}",
            config.transport.socket_path.display()
        )
    })?;
    register_listeners(&client)?;

    println!("{}", render::status(&client.current()));
    println!("type a question, or /help");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !handle(&client, Command::parse(&line)).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    if let Err(e) = client.shutdown().await {
        warn!(error = %e, "Transport did not close cleanly");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("  /status "), Command::Status);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope"));
        assert_eq!(
            Command::parse("what is /etc?"),
            Command::Query("what is /etc?")
        );
    }

    #[test]
    fn test_overrides_from_args() {
        let args = Args::parse_from(["brain-console", "--verbose", "-t", "5000"]);
        let overrides = overrides_from(&args);
        assert_eq!(overrides.verbose_mode, Some(true));
        assert_eq!(overrides.timeout_ms, Some(5000));
    }

    fn notice(task_id: Option<&str>, attached: bool) -> ErrorNotice {
        let event = bridge_core::ErrorEvent {
            error_code: bridge_core::BrainErrorCode::TaskExecutionError,
            message: "calendar tool crashed".to_string(),
            details: None,
            recoverable: false,
            timestamp: 0,
            task_id: None,
        };
        let task_id = task_id.map(bridge_core::TaskId::new);
        ErrorNotice {
            intent: bridge_core::dispatch::error_intent(task_id.as_ref(), &event),
            task_id,
            attached,
            event,
        }
    }

    #[test]
    fn test_only_recorded_task_error_waits_for_answer() {
        assert!(!shown_live(&notice(Some("task_1"), true)));
        // A second error for the same task is not carried by the answer
        assert!(shown_live(&notice(Some("task_1"), false)));
        assert!(shown_live(&notice(None, false)));
    }
}
