use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use daybook_config::TelemetryConfig;

const LOG_FILE_PREFIX: &str = "daybook.log";

/// Install the global subscriber.  `RUST_LOG` wins over `telemetry.log_level`.
///
/// With `telemetry.log_dir` set, events are also written to a daily rolling
/// file; the returned guard flushes it and must live until exit.
pub fn init(telemetry: &TelemetryConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&telemetry.log_level)));

    let (file_layer, guard) = if telemetry.log_dir.trim().is_empty() {
        (None, None)
    } else {
        fs::create_dir_all(&telemetry.log_dir)
            .with_context(|| format!("failed to create log dir {}", telemetry.log_dir))?;
        let appender = tracing_appender::rolling::daily(&telemetry.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// `level` when it parses as a filter, `info` otherwise.
fn filter_directive(level: &str) -> String {
    let level = level.trim();
    match EnvFilter::try_new(level) {
        Ok(_) if !level.is_empty() => level.to_string(),
        _ => "info".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directive;

    #[test]
    fn configured_level_is_used() {
        assert_eq!(filter_directive("debug"), "debug");
        assert_eq!(filter_directive(" daybook=trace "), "daybook=trace");
    }

    #[test]
    fn garbage_level_falls_back_to_info() {
        assert_eq!(filter_directive("daybook=notalevel"), "info");
        assert_eq!(filter_directive(""), "info");
    }
}
