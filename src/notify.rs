use async_trait::async_trait;

/// Fire-and-forget alert channel
///
/// Implementations swallow their own failures; the trading pipeline never
/// waits on a notification outcome.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str);
}

/// Writes alerts to the log, used when no chat channel is configured
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) {
        tracing::info!(target: "obtrader::alerts", "{}", text.replace('\n', " | "));
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for std::sync::Arc<T> {
    async fn notify(&self, text: &str) {
        (**self).notify(text).await
    }
}
