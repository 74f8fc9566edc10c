//! tw - trackerwatch daemon and CLI client

use std::fs;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use trackerwatch::cli::{Cli, Command, OutputFormat, generate_after_help};
use trackerwatch::config::Config;
use trackerwatch::daemon::run_daemon;
use trackerwatch::domain::{ItemId, TrackedItem};
use trackerwatch::events::WatchEvent;
use trackerwatch::ipc::{DaemonClient, get_socket_path};
use trackerwatch::reconcile::IngestStatus;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trackerwatch")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("trackerwatch.log"))
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help(&get_socket_path()));
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let client = DaemonClient::with_socket_path(config.ipc.socket_path.clone());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Run) => run_daemon(&config).await,
        Some(Command::Add { url, save_path }) => cmd_add(&client, &url, save_path).await,
        Some(Command::List { format }) => cmd_list(&client, format).await,
        Some(Command::Remove { id }) => cmd_remove(&client, id).await,
        Some(Command::Watch { id, minutes }) => cmd_watch(&client, id, minutes).await,
        Some(Command::Paths) => cmd_paths(&client).await,
        Some(Command::Follow) => cmd_follow(&client).await,
        Some(Command::Ping) => cmd_ping(&client).await,
        Some(Command::Stop) => cmd_stop(&client).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn print_item(item: &TrackedItem) {
    let watch = if item.is_watched() {
        format!("every {} min", item.watch_interval_minutes).green()
    } else {
        "idle".dimmed()
    };
    let title = if item.display_title.is_empty() {
        &item.display_name
    } else {
        &item.display_title
    };
    println!("{:>4}  {}  [{}]", item.id, title.bold(), watch);
    println!("      {}", item.source_url);
    println!("      {}  {}", item.remote_identity.as_str().dimmed(), item.save_path);
}

async fn cmd_add(client: &DaemonClient, url: &str, save_path: Option<String>) -> Result<()> {
    let report = client.submit_url(url, save_path).await?;
    match report.status {
        IngestStatus::Added => println!("{}", "Added".green().bold()),
        IngestStatus::Duplicate => println!("{}", "Already in download client".yellow().bold()),
    }
    print_item(&report.item);
    Ok(())
}

async fn cmd_list(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let items = client.list_items().await?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Text if items.is_empty() => println!("No tracked items."),
        OutputFormat::Text => items.iter().for_each(print_item),
    }
    Ok(())
}

async fn cmd_remove(client: &DaemonClient, id: ItemId) -> Result<()> {
    client.remove_item(id).await?;
    println!("Removed item {}", id);
    Ok(())
}

async fn cmd_watch(client: &DaemonClient, id: ItemId, minutes: u32) -> Result<()> {
    client.set_watch(id, minutes).await?;
    if minutes == 0 {
        println!("Item {} is no longer watched", id);
    } else {
        println!("Item {} is checked every {} min", id, minutes);
    }
    Ok(())
}

async fn cmd_paths(client: &DaemonClient) -> Result<()> {
    for path in client.download_paths().await? {
        println!("{}", path);
    }
    Ok(())
}

async fn cmd_follow(client: &DaemonClient) -> Result<()> {
    let (statuses, mut subscription) = client.subscribe().await?;
    for status in &statuses {
        let mark = if status.last_check_success { "ok".green() } else { "failed".red() };
        println!(
            "{:>4}  {:<6}  {}  {}",
            status.item_id,
            mark,
            status.last_check_time.format("%Y-%m-%d %H:%M:%S"),
            status.source_url
        );
    }

    while let Some(event) = subscription.next_event().await? {
        match event {
            WatchEvent::ItemAdded { item } => println!("{} {}", "added".green().bold(), item.source_url),
            WatchEvent::ItemUpdated { item, previous_identity } => println!(
                "{} {} ({} -> {})",
                "updated".yellow().bold(),
                item.source_url,
                previous_identity,
                item.remote_identity
            ),
            WatchEvent::ItemRemoved { item_id } => println!("{} item {}", "removed".red().bold(), item_id),
            WatchEvent::CheckCompleted { status } => {
                let mark = if status.last_check_success { "ok".green() } else { "failed".red() };
                println!("{} item {} {}", "checked".dimmed(), status.item_id, mark);
            }
        }
    }
    println!("Daemon stopped.");
    Ok(())
}

async fn cmd_ping(client: &DaemonClient) -> Result<()> {
    match client.ping().await {
        Ok(version) => {
            println!("{} (version {})", "Daemon is running".green(), version);
            Ok(())
        }
        Err(e) => {
            println!("{}", "Daemon is not running".red());
            Err(e)
        }
    }
}

async fn cmd_stop(client: &DaemonClient) -> Result<()> {
    client.shutdown().await?;
    println!("Daemon stopping.");
    Ok(())
}
