use async_trait::async_trait;
use tracing::info;
use crate::domain::{models::notification::Notification, ports::Notifier};
use crate::error::AppError;

/// Used when no mail relay is configured: the intent is logged and dropped.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), AppError> {
        info!(
            recipient = %notification.recipient,
            purpose = ?notification.purpose,
            "Mail relay not configured, skipping notification"
        );
        Ok(())
    }
}
