use anyhow::Result;
use async_trait::async_trait;

/// Outbound channel to the journal's owner (scheduled reminders, lookbacks).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}
