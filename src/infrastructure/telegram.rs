//! Telegram notifier.
//!
//! The bot API flood-limits aggressively, so sends are serialized behind
//! one async lock with a minimum spacing between messages. A failed send
//! is retried a bounded number of times with backoff, then dropped; the
//! trading loop never depends on a notification going through.

use crate::domain::errors::NotifyError;
use crate::domain::repositories::Notifier;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const SEND_ATTEMPTS: u32 = 3;
const SEND_SPACING: Duration = Duration::from_millis(2_500);
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

pub struct TelegramNotifier {
    client: Client,
    token: String,
    chat_id: String,
    /// Serializes sends and carries the time of the last one.
    last_send: Mutex<Option<Instant>>,
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str) -> Self {
        TelegramNotifier {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            last_send: Mutex::new(None),
        }
    }

    async fn send_once(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Channel(e.to_string())
                }
            })?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Channel(format!(
                "telegram status {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        // Holding the lock across the whole send enforces both ordering
        // and spacing.
        let mut last = self.last_send.lock().await;
        if let Some(at) = *last {
            let since = at.elapsed();
            if since < SEND_SPACING {
                tokio::time::sleep(SEND_SPACING - since).await;
            }
        }
        let mut result = Err(NotifyError::Timeout);
        for attempt in 1..=SEND_ATTEMPTS {
            result = self.send_once(text).await;
            match &result {
                Ok(()) => break,
                Err(e) => {
                    warn!(attempt, error = %e, "telegram send failed");
                    if attempt < SEND_ATTEMPTS {
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }
        *last = Some(Instant::now());
        result
    }
}

/// Fallback when no Telegram credentials are configured: notifications
/// land in the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        debug!(message = text, "notification (no channel configured)");
        Ok(())
    }
}
