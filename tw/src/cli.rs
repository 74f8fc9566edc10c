//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::ItemId;

/// trackerwatch - keeps qBittorrent in sync with tracker pages
#[derive(Parser)]
#[command(
    name = "tw",
    about = "Watches tracker pages and keeps qBittorrent in sync when torrents are replaced",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground
    Run,

    /// Track a tracker page and add its torrent
    Add {
        /// Tracker page URL (kinozal.tv or rutracker.org)
        url: String,

        /// Download directory; defaults to the configured one
        #[arg(short, long)]
        save_path: Option<String>,
    },

    /// List tracked items
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Stop tracking an item and remove its torrent
    Remove {
        /// Item id
        id: ItemId,
    },

    /// Set how often an item is checked
    Watch {
        /// Item id
        id: ItemId,

        /// Interval in minutes; 0 stops watching
        minutes: u32,
    },

    /// List save paths used by the download client
    Paths,

    /// Print item statuses, then stream events
    Follow,

    /// Check that the daemon is running
    Ping,

    /// Stop the daemon
    Stop,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trackerwatch")
        .join("logs")
        .join("trackerwatch.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with daemon status
pub fn generate_after_help(socket_path: &Path) -> String {
    debug!(?socket_path, "generate_after_help: called");
    let daemon_running = socket_path.exists();

    let mut help = String::new();
    help.push_str("Daemon:\n");
    let daemon_icon = if daemon_running { "\u{2705}" } else { "\u{274C}" };
    let daemon_status = if daemon_running { "running" } else { "stopped" };
    help.push_str(&format!("  {} {} ({})\n", daemon_icon, daemon_status, socket_path.display()));

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for list commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["tw"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_add_with_save_path() {
        let cli = Cli::parse_from(["tw", "add", "https://kinozal.tv/details.php?id=1", "--save-path", "/data/x"]);
        match cli.command {
            Some(Command::Add { url, save_path }) => {
                assert_eq!(url, "https://kinozal.tv/details.php?id=1");
                assert_eq!(save_path.as_deref(), Some("/data/x"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_watch() {
        let cli = Cli::parse_from(["tw", "watch", "3", "15"]);
        assert!(matches!(cli.command, Some(Command::Watch { id: 3, minutes: 15 })));
    }

    #[test]
    fn test_cli_parse_list_json() {
        let cli = Cli::parse_from(["tw", "list", "--format", "json"]);
        assert!(matches!(cli.command, Some(Command::List { format: OutputFormat::Json })));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::parse_from(["tw", "ping", "-c", "/etc/tw.yml", "-l", "debug"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/tw.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_cli_rejects_bad_id() {
        assert!(Cli::try_parse_from(["tw", "remove", "abc"]).is_err());
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_after_help_reports_stopped_daemon() {
        let help = generate_after_help(Path::new("/nonexistent/daemon.sock"));
        assert!(help.contains("stopped"));
        assert!(help.contains("trackerwatch.log"));
    }
}
