use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::notify::Notifier;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const RATE_LIMIT_PER_MINUTE: u32 = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Alerts waiting for the rate limiter; newer alerts are dropped when full
pub const QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Bare `sendMessage` client
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(bot_token: String, chat_id: String, api_url: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url: api_url.unwrap_or_else(|| TELEGRAM_API_BASE.to_string()),
            bot_token,
            chat_id,
        })
    }

    /// Post one message, surfacing transport or API failures
    pub async fn send(&self, text: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url.trim_end_matches('/'),
            self.bot_token
        );
        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error ({}): {}", status, body);
        }
        Ok(())
    }
}

/// Telegram bot alerts delivered by a background task
///
/// `notify` only enqueues. The worker spends the 20/minute budget and logs
/// delivery failures. Cloneable; all clones feed the same queue. Must be
/// created inside a tokio runtime.
#[derive(Clone)]
pub struct TelegramNotifier {
    queue: mpsc::Sender<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, api_url: Option<String>) -> anyhow::Result<Self> {
        let client = TelegramClient::new(bot_token, chat_id, api_url)?;
        Ok(Self::spawn(client, QUEUE_CAPACITY))
    }

    fn spawn(client: TelegramClient, capacity: usize) -> Self {
        let (queue, mut rx) = mpsc::channel::<String>(capacity.max(1));
        let per_minute = NonZeroU32::new(RATE_LIMIT_PER_MINUTE).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                limiter.until_ready().await;
                if let Err(e) = client.send(&text).await {
                    tracing::warn!("Failed to send Telegram message: {}", e);
                }
            }
            tracing::debug!("Telegram queue closed");
        });

        Self { queue }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) {
        match self.queue.try_send(text.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Telegram queue full, dropping alert: {}", text);
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!("Telegram worker stopped, dropping alert: {}", text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;
    use tokio::time::Instant;

    fn client(url: String) -> TelegramClient {
        TelegramClient::new("TOKEN".to_string(), "42".to_string(), Some(url)).unwrap()
    }

    #[tokio::test]
    async fn test_send_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .match_body(Matcher::Json(json!({
                "chat_id": "42",
                "text": "🚀 Bot Started",
                "parse_mode": "HTML"
            })))
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        client(server.url()).send("🚀 Bot Started").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_reported_by_send() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(403)
            .with_body(r#"{"ok":false,"description":"bot was blocked"}"#)
            .create_async()
            .await;

        let err = client(server.url()).send("hi").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_notify_delivers_in_background_and_swallows_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let notifier = TelegramNotifier::spawn(client(server.url()), 8);
        notifier.notify("still running").await;

        let deadline = Instant::now() + Duration::from_secs(5);
        while !mock.matched_async().await && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_notify_does_not_wait_for_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/botTOKEN/sendMessage")
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .expect_at_least(1)
            .create_async()
            .await;

        let notifier = TelegramNotifier::spawn(client(server.url()), 4);

        // Well past both the 20/minute budget and the queue size
        let started = Instant::now();
        for i in 0..40 {
            notifier.notify(&format!("📈 Trailing Stop Updated #{}", i)).await;
        }
        assert!(started.elapsed() < Duration::from_millis(500), "notify blocked for {:?}", started.elapsed());
    }
}
