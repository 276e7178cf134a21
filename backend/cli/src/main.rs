mod config_cmd;
mod parse_cmd;
mod replay_cmd;
mod terminal_output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use dankcord_commands::CommandFamily;
use dankcord_config::DankConfig;
use dankcord_logging::init_logger;

use parse_cmd::ParseArgs;
use replay_cmd::ReplayArgs;

/// Console level when neither the flag nor a config sets one.
const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(name = "dankcord")]
#[command(about = "DankCord — economy bot reply correlator and parser")]
#[command(version)]
struct Cli {
    /// Log level or tracing directive (overridden by RUST_LOG; defaults to the
    /// config's log_level, else warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one reply text and print the result as JSON
    Parse {
        /// Command family (beg, search, dig, fish, hunt, crime, postmemes|pm, buy, sell)
        #[arg(short, long)]
        family: CommandFamily,
        /// Traded item, required for buy and sell
        #[arg(long)]
        item: Option<String>,
        #[arg(long, default_value_t = 1)]
        quantity: u64,
        /// Unix seconds to treat as "now" for cooldown notices
        #[arg(long)]
        now: Option<i64>,
        /// Reply text, or `-` to read stdin
        text: String,
    },
    /// Load and validate a config file
    CheckConfig {
        /// Defaults to <config dir>/dankcord/config.yaml
        path: Option<PathBuf>,
    },
    /// Correlate recorded gateway frames (JSON Lines) to a nonce and parse the reply
    Replay {
        /// Read from the echoed command when omitted
        #[arg(short, long)]
        family: Option<CommandFamily>,
        #[arg(short, long)]
        nonce: String,
        #[arg(long)]
        item: Option<String>,
        #[arg(long, default_value_t = 1)]
        quantity: u64,
        /// Milliseconds to wait for resolution after the last frame
        #[arg(long, default_value_t = 500)]
        wait_ms: u64,
        /// Config providing channel id, prefix and self user id
        #[arg(long)]
        config: Option<PathBuf>,
        frames: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let flag_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Parse {
            family,
            item,
            quantity,
            now,
            text,
        } => {
            start_logging(flag_level, None);
            parse_cmd::run(ParseArgs {
                family,
                item,
                quantity,
                now,
                text,
            })?
        }
        Commands::CheckConfig { path } => {
            start_logging(flag_level, None);
            config_cmd::run(path).await?
        }
        Commands::Replay {
            family,
            nonce,
            item,
            quantity,
            wait_ms,
            config,
            frames,
        } => {
            let config = match config {
                Some(path) => Some(dankcord_config::load_and_prepare(&path).await?),
                None => None,
            };
            start_logging(flag_level, config.as_ref());
            debug!(?config, "Replay config");
            replay_cmd::run(
                ReplayArgs {
                    frames,
                    nonce,
                    family,
                    item,
                    quantity,
                    wait: Duration::from_millis(wait_ms),
                },
                config,
            )
            .await?
        }
    }

    Ok(())
}

fn start_logging(flag_level: Option<&str>, config: Option<&DankConfig>) {
    let (log_dir, level) = logger_settings(flag_level, config);
    init_logger(log_dir, level);
}

/// Log directory and level: the flag wins over the config, which wins over
/// the CLI default.
fn logger_settings<'a>(
    flag_level: Option<&'a str>,
    config: Option<&'a DankConfig>,
) -> (Option<&'a Path>, &'a str) {
    let level = flag_level
        .or_else(|| config.map(DankConfig::log_level))
        .unwrap_or(DEFAULT_CLI_LOG_LEVEL);
    (config.and_then(DankConfig::log_dir), level)
}
