use clap::{Parser, Subcommand};
use std::path::PathBuf;

use npc_config::{ConfigLoader, NpcConfig};

mod serve;

/// LLM-driven NPC inference backend
#[derive(Parser, Debug)]
#[command(name = "npcd", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to npc.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Listen address, overrides `server.listen`
        #[arg(long)]
        listen: Option<String>,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> npc_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        let log_level = self.log_level(&config);
        init_tracing(&config, &log_level);

        match self.command {
            Commands::Serve { listen } => serve::cmd_serve(config, listen).await,
            Commands::Config { json } => Self::cmd_config(&config, json),
            Commands::Version => Self::cmd_version(),
        }
    }

    /// --verbose > --quiet > --log-level > config
    fn log_level(&self, config: &NpcConfig) -> String {
        if self.verbose {
            "debug".into()
        } else if self.quiet {
            "error".into()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| config.logging.level.clone())
        }
    }

    fn cmd_config(config: &NpcConfig, json: bool) -> npc_core::Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(config)?
        } else {
            toml::to_string_pretty(config)
                .map_err(|e| npc_core::NpcError::Config(e.to_string()))?
        };
        println!("{rendered}");
        Ok(())
    }

    fn cmd_version() -> npc_core::Result<()> {
        println!("npcd v{}", env!("CARGO_PKG_VERSION"));
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}

/// RUST_LOG wins over the resolved level.
fn init_tracing(config: &NpcConfig, log_level: &str) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
    };
    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_listen() {
        let cli = Cli::try_parse_from(["npcd", "serve", "--listen", "0.0.0.0:9000"]).unwrap();
        assert_eq!(
            cli.command,
            Commands::Serve {
                listen: Some("0.0.0.0:9000".into())
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["npcd", "config", "--json", "--config", "/tmp/npc.toml"]).unwrap();
        assert_eq!(cli.command, Commands::Config { json: true });
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/npc.toml")));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["npcd", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = NpcConfig::default();
        config.logging.level = "warn".into();

        let cli = Cli::try_parse_from(["npcd", "version"]).unwrap();
        assert_eq!(cli.log_level(&config), "warn");

        let cli = Cli::try_parse_from(["npcd", "--log-level", "trace", "version"]).unwrap();
        assert_eq!(cli.log_level(&config), "trace");

        let cli = Cli::try_parse_from(["npcd", "--log-level", "trace", "-q", "version"]).unwrap();
        assert_eq!(cli.log_level(&config), "error");

        let cli = Cli::try_parse_from(["npcd", "-v", "version"]).unwrap();
        assert_eq!(cli.log_level(&config), "debug");
    }
}
