use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "atende")]
#[command(about = "Atende — retail messaging bot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config, media directory).
    Init {
        /// Config file path (default: ATENDE_CONFIG_PATH or ~/.atende/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the conversational engine against the messaging bridge. Falls back
    /// to offline simulation when the bridge is unreachable or rejects us.
    Run {
        /// Config file path (default: ATENDE_CONFIG_PATH or ~/.atende/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Start in offline simulation without touching the bridge.
        #[arg(long)]
        offline: bool,
    },

    /// Send one message to a list of recipients, serially and rate limited.
    Broadcast {
        /// Config file path (default: ATENDE_CONFIG_PATH or ~/.atende/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Base message text, used for every recipient without an override.
        #[arg(long, short, value_name = "TEXT")]
        message: String,

        /// JSON file with the recipient list: an array of contact ids or of
        /// {"contactId": "...", "message": "..."} objects.
        #[arg(long, short, value_name = "FILE")]
        recipients: std::path::PathBuf,

        /// Seconds between sends (default from config, normally 4).
        #[arg(long, value_name = "SECS")]
        delay: Option<u64>,

        /// Simulate the broadcast offline (logs what would be sent).
        #[arg(long)]
        offline: bool,
    },

    /// Show the bridge connection status (connected, identity, battery).
    Status {
        /// Config file path (default: ATENDE_CONFIG_PATH or ~/.atende/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("atende {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run { config, offline }) => {
            if let Err(e) = run_engine(config, offline).await {
                log::error!("run failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Broadcast {
            config,
            message,
            recipients,
            delay,
            offline,
        }) => {
            if let Err(e) = run_broadcast(config, message, recipients, delay, offline).await {
                log::error!("broadcast failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Status { config }) => {
            if let Err(e) = run_status(config).await {
                log::error!("status failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_engine(
    config_path: Option<std::path::PathBuf>,
    offline: bool,
) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    log::info!("starting atende against bridge {}", config.channel.bridge_url);
    lib::runtime::run(config, path, offline).await
}

/// One entry of the recipients file: a bare contact id, or an object with an
/// optional per-recipient message override.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecipientEntry {
    Id(String),
    Target {
        #[serde(rename = "contactId")]
        contact_id: String,
        #[serde(default)]
        message: Option<String>,
    },
}

fn load_recipients(path: &std::path::Path) -> anyhow::Result<Vec<lib::dispatch::BroadcastTarget>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading recipients from {}: {}", path.display(), e))?;
    let entries: Vec<RecipientEntry> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing recipients from {}: {}", path.display(), e))?;
    Ok(entries
        .into_iter()
        .map(|e| match e {
            RecipientEntry::Id(contact_id) => lib::dispatch::BroadcastTarget {
                contact_id,
                message: None,
            },
            RecipientEntry::Target {
                contact_id,
                message,
            } => lib::dispatch::BroadcastTarget {
                contact_id,
                message,
            },
        })
        .collect())
}

async fn run_broadcast(
    config_path: Option<std::path::PathBuf>,
    message: String,
    recipients: std::path::PathBuf,
    delay: Option<u64>,
    offline: bool,
) -> anyhow::Result<()> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let targets = load_recipients(&recipients)?;
    if targets.is_empty() {
        anyhow::bail!("recipients file {} is empty", recipients.display());
    }
    let delay = delay
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| lib::config::broadcast_delay(&config));
    let job = lib::dispatch::BroadcastJob::new(message, targets, delay);
    let report = lib::runtime::run_broadcast(&config, job, offline).await?;
    println!(
        "broadcast done: {} sent, {} failed, {} attempted",
        report.sent, report.failed, report.attempted
    );
    Ok(())
}

async fn run_status(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let status = lib::runtime::channel_status(&config).await;
    println!("connected: {}", status.connected);
    if !status.identity.is_empty() {
        println!("identity:  {}", status.identity);
    }
    if let Some(battery) = status.battery {
        println!("battery:   {}%", battery);
    }
    Ok(())
}
