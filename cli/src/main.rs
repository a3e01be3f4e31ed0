use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mailbridge::config::{read_config, validate_config, ConfigOverrides};
use mailbridge::secrets::resolve_token;
use mailbridge::{
    CancellationFlag, HttpDestination, MaildirFolder, SessionCoordinator, SyncConfig,
};

/// Imports mailbox messages into CRM contact timelines without duplicates.
#[derive(Debug, Parser)]
#[command(name = "mailbridge", author, version, about)]
struct Args {
    /// Config file. Defaults to <config dir>/mailbridge/config.yaml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mailbox root folder.
    #[arg(short, long)]
    mailbox: Option<PathBuf>,

    /// Destination Web API base URL.
    #[arg(long)]
    endpoint: Option<String>,

    /// Environment variable holding the bearer token.
    #[arg(long)]
    token_env: Option<String>,

    /// File holding the bearer token.
    #[arg(long)]
    token_file: Option<String>,

    /// Internal account recorded as recipient of every imported message.
    #[arg(long)]
    owner_id: Option<String>,

    /// Only process messages from this sender.
    #[arg(long)]
    sender: Option<String>,

    /// Resolve and deduplicate without writing anything.
    #[arg(long)]
    dry_run: bool,

    /// Duplicate window in seconds.
    #[arg(long)]
    window_secs: Option<u64>,

    /// Contact queues processed concurrently.
    #[arg(long)]
    workers: Option<usize>,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mailbox_root: self.mailbox.clone(),
            endpoint: self.endpoint.clone(),
            token_env_var: self.token_env.clone(),
            token_file: self.token_file.clone(),
            owner_id: self.owner_id.clone(),
            sender_filter: self.sender.clone(),
            dry_run: self.dry_run,
            window_secs: self.window_secs,
            worker_count: self.workers,
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("mailbridge").join("config.yaml"))
}

fn build_config(args: &Args) -> Result<SyncConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| default_config_path().filter(|p| p.exists()));

    let mut config = match &path {
        Some(path) => read_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SyncConfig::default(),
    };

    config.apply_overrides(args.overrides());
    validate_config(&config).context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let config = build_config(&args)?;
    let token = resolve_token(&config.destination).context("Failed to obtain bearer token")?;
    let destination = HttpDestination::new(&config.destination, token)
        .context("Failed to set up destination client")?;

    let root = config
        .mailbox
        .root
        .clone()
        .context("No mailbox root configured")?;
    let folder = MaildirFolder::open(&root)
        .with_context(|| format!("Failed to open mailbox {}", root.display()))?;

    let cancel = CancellationFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, finishing current writes");
        handler_flag.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    info!("Starting import from {}", root.display());
    let coordinator = SessionCoordinator::new(config, Arc::new(destination));
    let summary = coordinator.run(Box::new(folder), cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary);
    }

    Ok(())
}
