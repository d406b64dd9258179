use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Journal layout ────────────────────────────────────────────────────────────

/// How journal entries are laid out on disk.
///
/// | Layout     | Storage                                                     |
/// |------------|-------------------------------------------------------------|
/// | `document` | One org outline (`* year / ** week / *** day`) in a single file. |
/// | `daily`    | One `YYYY-MM-DD.org` file per day under a directory.        |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalLayout {
    #[default]
    Document,
    Daily,
}

/// What the read command renders in the `document` layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadScope {
    /// The requested day node, or the newest one when no date is given.
    #[default]
    Day,
    /// The whole outline document.
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token.  Overridden by `TELEGRAM_BOT_TOKEN` when set.
    pub bot_token: String,
    /// The single Telegram user id allowed to read and write the journal.
    /// Overridden by `DAYBOOK_AUTHORIZED_USER_ID` when set.
    pub authorized_user_id: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            authorized_user_id: String::new(),
            poll_timeout_secs: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub layout: JournalLayout,
    /// Outline file used by the `document` layout.
    pub document_path: String,
    /// Directory holding per-day files in the `daily` layout.
    pub daily_dir: String,
    pub read_scope: ReadScope,
    /// Leave entries from the current year out of the anniversary lookback.
    pub exclude_current_year: bool,
    /// Reply `Saved to <date>.` after each appended message.
    pub confirm_writes: bool,
    /// Upper bound on waiting for the journal lock before giving up with a
    /// "busy" reply.
    pub lock_timeout_secs: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            layout: JournalLayout::Document,
            document_path: "journal/journal.org".to_string(),
            daily_dir: "journal".to_string(),
            read_scope: ReadScope::Day,
            exclude_current_year: true,
            confirm_writes: false,
            lock_timeout_secs: 10,
        }
    }
}

// ── Schedule config ──────────────────────────────────────────────────────────

/// Cron expressions use the seven-field form with seconds first
/// (`sec min hour day-of-month month day-of-week [year]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// IANA timezone name (e.g. `"Europe/Amsterdam"`).  Decides what "today"
    /// means and when the cron jobs fire.  Falls back to UTC when the name is
    /// unrecognised.
    pub timezone: String,
    pub lookback_enabled: bool,
    pub lookback: String,
    pub reminder_enabled: bool,
    pub reminder: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            lookback_enabled: true,
            lookback: "0 1 9 * * *".to_string(),
            reminder_enabled: false,
            reminder: "0 55 20 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IndexerConfig {
    /// Command (argv) spawned after every successful write, e.g.
    /// `["php", "/var/www/html/occ", "files:scan", "--path=/me/files/Journal"]`.
    /// Empty disables re-indexing.
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Directory for daily rolling log files.  Empty logs to stderr only.
    pub log_dir: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub journal: JournalConfig,
    pub schedule: ScheduleConfig,
    pub indexer: IndexerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        // Secrets may live in the environment (or `.env`) rather than the file.
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                config.telegram.bot_token = token;
            }
        }

        if let Ok(user_id) = env::var("DAYBOOK_AUTHORIZED_USER_ID") {
            if !user_id.is_empty() {
                config.telegram.authorized_user_id = user_id;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    /// `true` when `principal` is the configured authorized user.  An empty
    /// configured id authorizes nobody.
    pub fn is_authorized(&self, principal: &str) -> bool {
        let expected = self.telegram.authorized_user_id.trim();
        !expected.is_empty() && expected == principal.trim()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
