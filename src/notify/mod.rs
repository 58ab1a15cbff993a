pub mod slack;

pub use slack::SlackNotifier;

use anyhow::Result;

/// The notification channel, at its interface boundary: a destination
/// and a line of text. Swappable so backfills and tests can run the
/// whole pipeline without posting anywhere.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Dry-run sink: accepts everything, sends nothing.
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, channel: &str, text: &str) -> Result<()> {
        tracing::debug!(channel, text, "dry-run: notification suppressed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
