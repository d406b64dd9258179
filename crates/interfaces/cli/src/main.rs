mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use daybook_config::AppConfig;
use daybook_runtime::{
    Clock, FixedClock, JobKind, JournalService, Notifier, SystemClock, indexer_from_config,
    jobs_from_config, parse_date_arg, parse_timezone, run_job, spawn_jobs,
};
use daybook_telegram::{TelegramNotifier, start_bot};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "daybook",
    version,
    about = "An org-mode journal you write to from a Telegram chat"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the Telegram bot and the scheduled jobs until Ctrl-C.
    Run,
    /// Append a message to the journal without going through Telegram.
    Append {
        /// Entry date (YYYY-MM-DD, today, yesterday); defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Print an entry the way the bot would show it.
    Read {
        /// Entry date; the most recent entry when omitted.
        date: Option<String>,
    },
    /// Run the anniversary lookback once and print the result.
    Lookback {
        /// Pretend today is this date.
        #[arg(long)]
        date: Option<String>,
    },
    /// Run the "nothing written today" check once and print the result.
    Remind {
        #[arg(long)]
        date: Option<String>,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration (secrets redacted).
    Show,
    /// Write a default configuration file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

/// Prints notifications instead of sending them.
struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    let _log_guard = logging::init(&config.telemetry)?;
    let tz = parse_timezone(&config.schedule.timezone);
    let config = Arc::new(config);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, tz).await,
        Commands::Append { date, text } => {
            let today = SystemClock::new(tz).today();
            let date = match date {
                Some(raw) => parse_date_arg(&raw, today)?,
                None => today,
            };
            let service = build_service(&config, Arc::new(FixedClock(today)));
            let receipt = service.append(date, &text.join(" ")).await?;
            println!("Saved to {} ({}).", receipt.date, receipt.path.display());
            Ok(())
        }
        Commands::Read { date } => {
            let service = build_service(&config, Arc::new(SystemClock::new(tz)));
            let text = service
                .read(date.as_deref())
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            println!("{text}");
            Ok(())
        }
        Commands::Lookback { date } => run_once(&config, tz, JobKind::Lookback, date).await,
        Commands::Remind { date } => run_once(&config, tz, JobKind::Reminder, date).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!("{}", toml::to_string_pretty(&redacted(&config))?);
                Ok(())
            }
            ConfigCommands::Init { force } => init_config(&cli.config, force),
        },
    }
}

fn build_service(config: &Arc<AppConfig>, clock: Arc<dyn Clock>) -> JournalService {
    JournalService::new(config.clone(), clock, indexer_from_config(&config.indexer))
}

async fn run(config: Arc<AppConfig>, tz: Tz) -> Result<()> {
    if config.telegram.authorized_user_id.trim().is_empty() {
        bail!("no authorized user configured ([telegram] authorized_user_id or DAYBOOK_AUTHORIZED_USER_ID)");
    }

    let service = Arc::new(build_service(&config, Arc::new(SystemClock::new(tz))));
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::from_config(&config.telegram)?);
    let jobs = jobs_from_config(&config.schedule)?;
    info!(
        journal = %service.journal().root().display(),
        timezone = %tz,
        jobs = jobs.len(),
        "daybook starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job_handles = spawn_jobs(jobs, tz, service.clone(), notifier, shutdown_rx.clone());
    let mut bot = tokio::spawn({
        let service = service.clone();
        let telegram = config.telegram.clone();
        async move { start_bot(service, &telegram, shutdown_rx).await }
    });

    let bot_result = tokio::select! {
        result = &mut bot => Some(result),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
            None
        }
    };

    let _ = shutdown_tx.send(true);
    let bot_result = match bot_result {
        Some(result) => result,
        None => bot.await,
    };
    for handle in job_handles {
        if let Err(err) = handle.await {
            warn!(?err, "scheduled job task panicked");
        }
    }

    bot_result.context("telegram task panicked")??;
    info!("daybook stopped");
    Ok(())
}

async fn run_once(config: &Arc<AppConfig>, tz: Tz, kind: JobKind, date: Option<String>) -> Result<()> {
    let today = SystemClock::new(tz).today();
    let today = match date {
        Some(raw) => parse_date_arg(&raw, today)?,
        None => today,
    };
    let service = build_service(config, Arc::new(FixedClock(today)));
    if !run_job(kind, &service, &StdoutNotifier).await? {
        info!(job = kind.name(), %today, "nothing to report");
    }
    Ok(())
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if !config.telegram.bot_token.is_empty() {
        config.telegram.bot_token = "<redacted>".to_string();
    }
    config
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    AppConfig::default().save_to(path)?;
    println!("wrote default configuration to {}", path.display());
    Ok(())
}
