use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};
use crate::domain::{models::notification::Notification, ports::Notifier};
use crate::error::AppError;

/// Forwards notification intents to the mail relay. Delivery runs on a
/// detached task so callers never wait on the relay.
pub struct HttpNotifier {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpNotifier {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), AppError> {
        let client = self.client.clone();
        let url = self.api_url.clone();
        let auth = format!("Bearer {}", self.api_key);

        tokio::spawn(async move {
            let res = client.post(&url)
                .header("Authorization", auth)
                .json(&notification)
                .send()
                .await;

            match res {
                Ok(res) if res.status().is_success() => {
                    info!(recipient = %notification.recipient, purpose = ?notification.purpose, "Notification handed to relay");
                }
                Ok(res) => {
                    let status = res.status();
                    let text = res.text().await.unwrap_or_default();
                    error!("Mail relay rejected notification. Status: {}, Body: {}", status, text);
                }
                Err(e) => error!("Mail relay connection error: {}", e),
            }
        });

        Ok(())
    }
}
