//! Journal service: the single entry point the chat interface, the scheduler
//! and the CLI go through.
//!
//! Every storage operation runs inside one critical section (`gate`) held for
//! the whole load → mutate → save, so two events can never interleave on the
//! document.  Waiting for the gate is bounded by `journal.lock_timeout_secs`;
//! past that the caller gets [`ServiceError::Busy`] instead of hanging behind a
//! stuck write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use daybook_config::{AppConfig, JournalLayout, ReadScope};
use daybook_journal::{AppendReceipt, DayRef, Journal, JournalError, format_for_display};

use crate::clock::Clock;
use crate::indexer::Indexer;

pub const UNAUTHORIZED_REPLY: &str = "Unauthorized.";
pub const REMINDER_TEXT: &str = "You haven't written any journal entries today.";
pub const LOOKBACK_PREFIX: &str = "Found existing journal entries for today's date in previous years:";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized principal `{0}`")]
    Unauthorized(String),
    #[error("no journal entry found for {0}")]
    NotFound(NaiveDate),
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    #[error("journal is busy")]
    Busy,
    #[error(transparent)]
    Storage(#[from] JournalError),
    #[error("journal task failed: {0}")]
    Task(String),
}

impl ServiceError {
    /// Fixed reply shown to the chat user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Unauthorized(_) => UNAUTHORIZED_REPLY.to_string(),
            ServiceError::NotFound(date) => format!("No journal entry found for {date}."),
            ServiceError::InvalidDate(arg) => format!("Invalid date '{arg}'. Use YYYY-MM-DD."),
            ServiceError::Busy => "The journal is busy, please try again in a moment.".to_string(),
            ServiceError::Storage(_) | ServiceError::Task(_) => format!("⚠️ error: {self}"),
        }
    }
}

pub struct JournalService {
    config: Arc<AppConfig>,
    journal: Journal,
    clock: Arc<dyn Clock>,
    indexer: Arc<dyn Indexer>,
    gate: Arc<Mutex<()>>,
}

impl JournalService {
    pub fn new(config: Arc<AppConfig>, clock: Arc<dyn Clock>, indexer: Arc<dyn Indexer>) -> Self {
        let journal = match config.journal.layout {
            JournalLayout::Document => Journal::document(&config.journal.document_path),
            JournalLayout::Daily => Journal::daily(&config.journal.daily_dir),
        };
        Self {
            config,
            journal,
            clock,
            indexer,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ── Chat entry points ─────────────────────────────────────────────────────

    /// Inbound text message: append it to today's entry.  Returns the reply to
    /// send, if any.
    pub async fn handle_message(&self, principal: &str, text: &str) -> Option<String> {
        if let Err(err) = self.authorize(principal) {
            return Some(err.user_message());
        }

        match self.append(self.today(), text).await {
            Ok(receipt) if self.config.journal.confirm_writes => {
                Some(format!("Saved to {}.", receipt.date))
            }
            Ok(_) => None,
            Err(err) => {
                error!(?err, "failed to append journal message");
                Some(err.user_message())
            }
        }
    }

    /// Read command with an optional date argument.
    pub async fn handle_read(&self, principal: &str, arg: Option<&str>) -> String {
        if let Err(err) = self.authorize(principal) {
            return err.user_message();
        }

        match self.read(arg).await {
            Ok(text) => text,
            Err(err) => {
                if matches!(err, ServiceError::Storage(_) | ServiceError::Task(_)) {
                    error!(?err, "failed to read journal");
                }
                err.user_message()
            }
        }
    }

    fn authorize(&self, principal: &str) -> Result<(), ServiceError> {
        if self.config.is_authorized(principal) {
            Ok(())
        } else {
            warn!(%principal, "rejected message from unauthorized principal");
            Err(ServiceError::Unauthorized(principal.to_string()))
        }
    }

    // ── Operations ────────────────────────────────────────────────────────────

    /// Append `text` to the entry for `date` and trigger the indexer.
    pub async fn append(&self, date: NaiveDate, text: &str) -> Result<AppendReceipt, ServiceError> {
        let text = text.to_string();
        let receipt = self
            .with_journal(move |journal| journal.append(date, &text))
            .await?;
        self.indexer.notify(&receipt.path);
        Ok(receipt)
    }

    /// Formatted text for a read request.  Without a date the newest entry is
    /// shown, or the whole document when `read_scope = "document"`.
    pub async fn read(&self, arg: Option<&str>) -> Result<String, ServiceError> {
        let today = self.today();
        let date = arg.map(|raw| parse_date_arg(raw, today)).transpose()?;

        let whole_document =
            self.config.journal.read_scope == ReadScope::Document && self.journal.is_document();
        let raw = if whole_document {
            self.with_journal(|journal| journal.read_document())
                .await?
                .ok_or(ServiceError::NotFound(date.unwrap_or(today)))?
        } else if let Some(date) = date {
            self.with_journal(move |journal| journal.read_day(date))
                .await?
                .ok_or(ServiceError::NotFound(date))?
        } else {
            self.with_journal(|journal| journal.read_newest())
                .await?
                .map(|(_, raw)| raw)
                .ok_or(ServiceError::NotFound(today))?
        };

        let text = format_for_display(&raw);
        if text.is_empty() {
            return Ok("(empty entry)".to_string());
        }
        Ok(text)
    }

    /// Entries from earlier years on today's month and day.
    pub async fn anniversaries(&self) -> Result<Vec<DayRef>, ServiceError> {
        let today = self.today();
        let exclude_year = self
            .config
            .journal
            .exclude_current_year
            .then_some(today.year());
        self.with_journal(move |journal| journal.anniversaries(today, exclude_year))
            .await
    }

    /// Lookback notification text, or `None` when there is nothing to report.
    pub async fn lookback(&self) -> Result<Option<String>, ServiceError> {
        let found = self.anniversaries().await?;
        info!(matches = found.len(), "anniversary lookback");
        Ok(lookback_message(&found))
    }

    /// Reminder text when nothing has been written today.
    pub async fn reminder(&self) -> Result<Option<String>, ServiceError> {
        let today = self.today();
        let written = self
            .with_journal(move |journal| journal.day_exists(today))
            .await?;
        info!(%today, written, "write reminder check");
        Ok((!written).then(|| REMINDER_TEXT.to_string()))
    }

    /// Run `op` against the journal inside the critical section, on the
    /// blocking pool.  The gate guard moves into the blocking task so the
    /// section stays held until the file work is done even if the caller stops
    /// waiting.
    async fn with_journal<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&Journal) -> daybook_journal::Result<T> + Send + 'static,
    {
        let wait = Duration::from_secs(self.config.journal.lock_timeout_secs.max(1));
        let guard = tokio::time::timeout(wait, self.gate.clone().lock_owned())
            .await
            .map_err(|_| {
                warn!(wait_secs = wait.as_secs(), "timed out waiting for the journal lock");
                ServiceError::Busy
            })?;

        let journal = self.journal.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            op(&journal)
        })
        .await
        .map_err(|err| ServiceError::Task(err.to_string()))?;
        Ok(result?)
    }
}

/// Parse a read-command date: `YYYY-MM-DD`, `today` or `yesterday`.
pub fn parse_date_arg(raw: &str, today: NaiveDate) -> Result<NaiveDate, ServiceError> {
    let arg = raw.trim();
    match arg.to_ascii_lowercase().as_str() {
        "today" => return Ok(today),
        "yesterday" => {
            return today
                .pred_opt()
                .ok_or_else(|| ServiceError::InvalidDate(arg.to_string()));
        }
        _ => {}
    }
    NaiveDate::parse_from_str(arg, "%Y-%m-%d").map_err(|_| ServiceError::InvalidDate(arg.to_string()))
}

pub fn lookback_message(found: &[DayRef]) -> Option<String> {
    if found.is_empty() {
        return None;
    }
    let dates = found
        .iter()
        .map(|day| day.date.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!("{LOOKBACK_PREFIX} {dates}"))
}
