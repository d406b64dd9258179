use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use daybook_config::TelegramConfig;
use daybook_runtime::{JournalService, Notifier};

/// Telegram caps messages at 4096 characters; stay well below.
pub const MAX_MESSAGE_CHARS: usize = 3500;

const HELP_TEXT: &str = "\
/r [date] - show the entry for a date (YYYY-MM-DD, today, yesterday)
/r - show the most recent entry
/help - this message

Send any other message to add it to today's entry.";

/// Long-poll the bot API and feed every message into `service` until
/// `shutdown` flips to `true`.
pub async fn start_bot(
    service: Arc<JournalService>,
    config: &TelegramConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let base_url = api_base(&config.bot_token)?;
    let client = Client::builder()
        .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
        .build()
        .context("failed to build telegram http client")?;
    let mut offset: i64 = 0;

    info!(poll_timeout_secs = config.poll_timeout_secs, "telegram bot listening for updates");

    loop {
        let result = tokio::select! {
            result = fetch_updates(&client, &base_url, offset, config.poll_timeout_secs) => result,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() { break; }
                continue;
            }
        };

        let updates = match result {
            Ok(updates) => updates,
            Err(err) => {
                let backoff = if err.to_string().contains("409") {
                    // Another instance is polling with the same token.
                    warn!("telegram 409 Conflict: another bot instance is running; retrying in 15s");
                    Duration::from_secs(15)
                } else {
                    warn!(?err, "telegram getUpdates failed; retrying in 5s");
                    Duration::from_secs(5)
                };
                if sleep_or_shutdown(backoff, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        for update in updates {
            offset = update.update_id + 1;

            let Some(message) = update.message else {
                continue;
            };
            let (Some(text), Some(from)) = (message.text, message.from) else {
                debug!(update_id = update.update_id, "ignoring non-text update");
                continue;
            };

            let chat_id = message.chat.id;
            let principal = from.id.to_string();
            let Some(reply) = handle_text(&service, &principal, &text).await else {
                continue;
            };
            for chunk in chunk_message(&reply, MAX_MESSAGE_CHARS) {
                if let Err(err) = send_message(&client, &base_url, chat_id, &chunk).await {
                    warn!(chat_id, ?err, "telegram sendMessage failed");
                }
            }
        }
    }

    info!("telegram bot stopped");
    Ok(())
}

/// Returns `true` when shutdown was requested while waiting.
async fn sleep_or_shutdown(wait: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(wait) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Read(Option<String>),
    Unknown(String),
    Text(String),
}

fn parse_command(text: &str) -> Command {
    let line = normalize_telegram_command(text);
    if !line.starts_with('/') {
        return Command::Text(line);
    }

    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, Some(rest.trim().to_string())),
        None => (line.as_str(), None),
    };
    match command {
        "/help" => Command::Help,
        "/r" => Command::Read(rest),
        // `/start` may carry a deep-link payload; it is not a date.
        "/start" => Command::Read(None),
        other => Command::Unknown(other.to_string()),
    }
}

/// Reply for one inbound message, if any.
async fn handle_text(service: &JournalService, principal: &str, text: &str) -> Option<String> {
    match parse_command(text) {
        Command::Text(line) => service.handle_message(principal, &line).await,
        Command::Read(arg) => Some(service.handle_read(principal, arg.as_deref()).await),
        Command::Help | Command::Unknown(_) if !service.config().is_authorized(principal) => {
            warn!(%principal, "rejected command from unauthorized principal");
            Some("Unauthorized.".to_string())
        }
        Command::Help => Some(HELP_TEXT.to_string()),
        Command::Unknown(command) => {
            debug!(%command, "unknown telegram command");
            Some("Unknown command. Use /help".to_string())
        }
    }
}

/// Sends scheduled notifications to the authorized user's private chat.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    chat_id: i64,
}

impl TelegramNotifier {
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let base_url = api_base(&config.bot_token)?;
        let raw_id = config.authorized_user_id.trim();
        let chat_id = raw_id
            .parse::<i64>()
            .with_context(|| format!("authorized_user_id `{raw_id}` is not a telegram user id"))?;
        Ok(Self {
            client: Client::new(),
            base_url,
            chat_id,
        })
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        for chunk in chunk_message(text, MAX_MESSAGE_CHARS) {
            send_message(&self.client, &self.base_url, self.chat_id, &chunk).await?;
        }
        Ok(())
    }
}

fn api_base(token: &str) -> Result<String> {
    let token = token.trim();
    if token.is_empty() {
        bail!("telegram bot token is not set (TELEGRAM_BOT_TOKEN or [telegram] bot_token)");
    }
    Ok(format!("https://api.telegram.org/bot{token}"))
}

async fn fetch_updates(
    client: &Client,
    base_url: &str,
    offset: i64,
    timeout_secs: u64,
) -> Result<Vec<TelegramUpdate>> {
    let url = format!("{base_url}/getUpdates");
    let response = client
        .get(url)
        .query(&[
            ("timeout", timeout_secs.to_string()),
            ("offset", offset.to_string()),
        ])
        .send()
        .await?
        .error_for_status()?;

    let payload: TelegramResponse<Vec<TelegramUpdate>> = response.json().await?;
    if !payload.ok {
        let description = payload
            .description
            .unwrap_or_else(|| "telegram getUpdates failed".to_string());
        bail!(description);
    }

    Ok(payload.result.unwrap_or_default())
}

async fn send_message(client: &Client, base_url: &str, chat_id: i64, text: &str) -> Result<()> {
    let url = format!("{base_url}/sendMessage");
    let body = SendMessageRequest {
        chat_id,
        text,
        disable_web_page_preview: true,
    };

    let response = client
        .post(url)
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

    let payload: TelegramResponse<serde_json::Value> = response.json().await?;
    if !payload.ok {
        let description = payload
            .description
            .unwrap_or_else(|| "telegram sendMessage failed".to_string());
        bail!(description);
    }

    Ok(())
}

fn normalize_telegram_command(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return trimmed.to_string();
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    let command = command
        .split_once('@')
        .map(|(base, _)| base)
        .unwrap_or(command);

    if rest.is_empty() {
        command.to_string()
    } else {
        format!("{command} {rest}")
    }
}

/// Split on line boundaries into chunks of at most `max_chars` characters.
/// A single line longer than the limit is split mid-line.
fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let mut line = line;
        while line.chars().count() > max_chars {
            if current_len > 0 {
                chunks.push(current.trim_end().to_string());
                current.clear();
                current_len = 0;
            }
            let split = line
                .char_indices()
                .nth(max_chars)
                .map(|(idx, _)| idx)
                .unwrap_or(line.len());
            chunks.push(line[..split].to_string());
            line = &line[split..];
        }

        let line_len = line.chars().count() + 1;
        if current_len > 0 && current_len + line_len > max_chars {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_len = 0;
        }
        current.push_str(line);
        current.push('\n');
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    if chunks.is_empty() {
        chunks.push(text.to_string());
    }
    chunks
}

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: TelegramChat,
    from: Option<TelegramUser>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}
