//! rpclb CLI
//!
//! Runs a round-robin balancer against a static address list.

mod commands;

use clap::{Parser, Subcommand};
use rpclb_core::LbConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// rpclb - client-side round-robin load balancing
#[derive(Parser, Debug)]
#[command(name = "rpclb")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Target name (overrides the config file)
    #[arg(long, global = true)]
    target: Option<String>,

    /// Backend address; repeat for several (overrides the config file)
    #[arg(long = "addr", global = true)]
    addresses: Vec<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring every backend up and print the selection sequence
    Pick {
        /// Number of selections
        #[arg(long, default_value_t = 10)]
        calls: usize,
    },

    /// Print membership events as JSON lines until Ctrl-C
    Watch,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LbConfig::from_file(path)?,
        None => LbConfig::default(),
    };
    if let Some(target) = cli.target {
        config.balancer.target = target;
    }
    if !cli.addresses.is_empty() {
        config.balancer.addresses = cli.addresses;
    }

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        parse_level(&config.logging.level)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Pick { calls } => {
            commands::pick(&config.balancer, calls).await?;
        }
        Commands::Watch => {
            commands::watch(&config.balancer).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_cli_parses_repeated_addresses() {
        let cli = Cli::parse_from([
            "rpclb",
            "--addr",
            "10.0.0.1:50051",
            "--addr",
            "10.0.0.2:50051",
            "pick",
            "--calls",
            "3",
        ]);
        assert_eq!(cli.addresses.len(), 2);
        assert!(matches!(cli.command, Commands::Pick { calls: 3 }));
    }
}
