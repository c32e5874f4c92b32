//! Fire-and-forget outbound notifications.
//!
//! Services enqueue messages on an unbounded channel; a dispatcher task
//! delivers them through the Telegram Bot API. Delivery failures
//! (blocked or unreachable recipients) are logged and swallowed, never
//! escalated back into the tick that produced them.

use crate::types::Notification;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Handle for enqueuing notifications. Cheap to clone.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier plus the raw receiving end. Used by tests to
    /// observe outbound traffic directly.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn a dispatcher that delivers through the Telegram Bot API.
    pub fn telegram(token: String, api_url: String) -> Self {
        let (notifier, rx) = Self::channel();
        tokio::spawn(dispatch_loop(rx, token, api_url));
        notifier
    }

    /// Spawn a dispatcher that drops everything. Used when no bot token
    /// is configured.
    pub fn disabled() -> Self {
        let (notifier, mut rx) = Self::channel();
        tokio::spawn(async move {
            while let Some(n) = rx.recv().await {
                debug!("Notifications disabled, dropping message for {}", n.user_id);
            }
        });
        notifier
    }

    /// Enqueue a message for one recipient.
    pub fn send(&self, user_id: i64, text: impl Into<String>) {
        if self.tx.send(Notification::new(user_id, text)).is_err() {
            debug!("Notification channel closed, message for {} dropped", user_id);
        }
    }

    /// Fan out one message to many recipients. Per-recipient isolation
    /// lives in the dispatcher: one failed send never aborts the rest.
    pub fn broadcast(&self, user_ids: &[i64], text: &str) {
        for &user_id in user_ids {
            self.send(user_id, text);
        }
    }
}

async fn dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    token: String,
    api_url: String,
) {
    let client = Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new());
    let endpoint = format!("{}/bot{}/sendMessage", api_url, token);

    while let Some(notification) = rx.recv().await {
        if let Err(e) = deliver(&client, &endpoint, &notification).await {
            // The recipient may have blocked the bot. Their problem.
            warn!("Notification to {} failed: {}", notification.user_id, e);
        }
    }
}

async fn deliver(
    client: &Client,
    endpoint: &str,
    notification: &Notification,
) -> anyhow::Result<()> {
    let response = client
        .post(endpoint)
        .json(&json!({
            "chat_id": notification.user_id,
            "text": notification.text,
            "parse_mode": "Markdown",
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("Telegram API returned {}", response.status());
    }
    Ok(())
}
