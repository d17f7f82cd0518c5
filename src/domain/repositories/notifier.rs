use crate::domain::errors::NotifyError;
use async_trait::async_trait;

/// Outbound operator notifications (trade events, reconciliation
/// heartbeats, startup/shutdown).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}
