//! Cron-driven journal jobs: the anniversary lookback and the "nothing
//! written today" reminder.
//!
//! Each enabled job gets its own task that sleeps until the next fire time in
//! the configured timezone, runs, and goes back to sleep.  A failed run is
//! logged and the job keeps its schedule.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use daybook_config::ScheduleConfig;

use crate::notifier::Notifier;
use crate::service::JournalService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Lookback,
    Reminder,
}

impl JobKind {
    pub fn name(self) -> &'static str {
        match self {
            JobKind::Lookback => "lookback",
            JobKind::Reminder => "reminder",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub kind: JobKind,
    pub schedule: Schedule,
}

/// Parse a six- or seven-field cron expression (seconds first).
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Schedule::from_str(expr.trim()).with_context(|| format!("invalid cron expression `{expr}`"))
}

/// The enabled jobs.  An invalid expression fails startup rather than
/// silently dropping the job.
pub fn jobs_from_config(config: &ScheduleConfig) -> Result<Vec<ScheduledJob>> {
    let mut jobs = Vec::new();
    if config.lookback_enabled {
        jobs.push(ScheduledJob {
            kind: JobKind::Lookback,
            schedule: parse_schedule(&config.lookback)?,
        });
    }
    if config.reminder_enabled {
        jobs.push(ScheduledJob {
            kind: JobKind::Reminder,
            schedule: parse_schedule(&config.reminder)?,
        });
    }
    Ok(jobs)
}

/// First fire time strictly after `after`, evaluated in `tz`.
pub fn next_fire(schedule: &Schedule, tz: Tz, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|at| at.with_timezone(&Utc))
}

/// Run one job now.  Returns whether a notification went out.
pub async fn run_job(
    kind: JobKind,
    service: &JournalService,
    notifier: &dyn Notifier,
) -> Result<bool> {
    let message = match kind {
        JobKind::Lookback => service.lookback().await?,
        JobKind::Reminder => service.reminder().await?,
    };
    let Some(message) = message else {
        info!(job = kind.name(), "nothing to notify");
        return Ok(false);
    };
    notifier
        .notify(&message)
        .await
        .with_context(|| format!("{} notification failed", kind.name()))?;
    info!(job = kind.name(), "notification sent");
    Ok(true)
}

/// Spawn one task per job.  Tasks exit when `shutdown` flips to `true` or its
/// sender is dropped.
pub fn spawn_jobs(
    jobs: Vec<ScheduledJob>,
    tz: Tz,
    service: Arc<JournalService>,
    notifier: Arc<dyn Notifier>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|job| {
            let service = service.clone();
            let notifier = notifier.clone();
            let mut rx = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let Some(at) = next_fire(&job.schedule, tz, Utc::now()) else {
                        warn!(job = job.kind.name(), "schedule has no upcoming fire time; stopping");
                        break;
                    };
                    info!(job = job.kind.name(), next = %at.with_timezone(&tz), "job scheduled");
                    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        changed = rx.changed() => {
                            if changed.is_err() || *rx.borrow() { break; }
                            continue;
                        }
                    }

                    if let Err(err) = run_job(job.kind, &service, notifier.as_ref()).await {
                        warn!(job = job.kind.name(), ?err, "scheduled job failed");
                    }
                }
                info!(job = job.kind.name(), "job stopped");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;
    use tokio::sync::watch;

    use daybook_config::{AppConfig, ScheduleConfig};

    use super::*;
    use crate::clock::FixedClock;
    use crate::indexer::NoopIndexer;
    use crate::notifier::Notifier;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn service(dir: &TempDir, today: NaiveDate) -> JournalService {
        let mut config = AppConfig::default();
        config.journal.document_path = dir.path().join("journal.org").display().to_string();
        JournalService::new(
            Arc::new(config),
            Arc::new(FixedClock(today)),
            Arc::new(NoopIndexer),
        )
    }

    #[test]
    fn default_jobs() {
        let jobs = jobs_from_config(&ScheduleConfig::default()).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::Lookback);

        let config = ScheduleConfig {
            reminder_enabled: true,
            ..ScheduleConfig::default()
        };
        let kinds: Vec<_> = jobs_from_config(&config)
            .unwrap()
            .into_iter()
            .map(|job| job.kind)
            .collect();
        assert_eq!(kinds, vec![JobKind::Lookback, JobKind::Reminder]);
    }

    #[test]
    fn invalid_expression_is_rejected() {
        let config = ScheduleConfig {
            lookback: "every morning".to_string(),
            ..ScheduleConfig::default()
        };
        let err = jobs_from_config(&config).unwrap_err();
        assert!(err.to_string().contains("every morning"));
    }

    #[test]
    fn next_fire_respects_timezone() {
        let schedule = parse_schedule("0 1 9 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 15, 7, 0, 0).unwrap();

        assert_eq!(
            next_fire(&schedule, chrono_tz::UTC, after),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 1, 0).unwrap())
        );
        // CET is UTC+1 before the March switch.
        assert_eq!(
            next_fire(&schedule, chrono_tz::Europe::Amsterdam, after),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 8, 1, 0).unwrap())
        );
    }

    #[test]
    fn next_fire_rolls_over_to_tomorrow() {
        let schedule = parse_schedule("0 55 20 * * *").unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 15, 21, 0, 0).unwrap();
        assert_eq!(
            next_fire(&schedule, chrono_tz::UTC, after),
            Some(Utc.with_ymd_and_hms(2024, 3, 16, 20, 55, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn lookback_notifies_once_when_matches_exist() {
        let dir = TempDir::new().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let service = service(&dir, today);
        let notifier = RecordingNotifier::default();

        assert!(!run_job(JobKind::Lookback, &service, &notifier).await.unwrap());

        service
            .append(NaiveDate::from_ymd_opt(2023, 3, 15).unwrap(), "last year")
            .await
            .unwrap();
        assert!(run_job(JobKind::Lookback, &service, &notifier).await.unwrap());

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].ends_with("2023-03-15"));
    }

    #[tokio::test]
    async fn reminder_stays_quiet_after_writing() {
        let dir = TempDir::new().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let service = service(&dir, today);
        let notifier = RecordingNotifier::default();

        assert!(run_job(JobKind::Reminder, &service, &notifier).await.unwrap());
        service.append(today, "wrote something").await.unwrap();
        assert!(!run_job(JobKind::Reminder, &service, &notifier).await.unwrap());
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn jobs_stop_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(service(&dir, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
        let (tx, rx) = watch::channel(false);
        let handles = spawn_jobs(
            jobs_from_config(&ScheduleConfig::default()).unwrap(),
            chrono_tz::UTC,
            service,
            Arc::new(RecordingNotifier::default()),
            rx,
        );
        tx.send(true).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
